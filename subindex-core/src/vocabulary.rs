// Copyright 2025 AgentReplay (https://github.com/agentreplay)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Controlled vocabularies
//!
//! A vocabulary is the closed set of concepts a project may suggest, scoped to
//! one language. Vocabularies are loaded once while the registry is built and
//! then shared read-only between projects.
//!
//! # Subject files
//!
//! [`FileVocabularyLoader`] reads `<root>/<vocab>.<language>.tsv`:
//! ```text
//! <http://www.yso.fi/onto/yso/p1234>	apples
//! http://www.yso.fi/onto/yso/p5678	cherries
//! ```

use crate::error::{IndexError, Result};
use crate::suggestion::Concept;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Ordered set of valid concepts with optional labels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    id: String,
    language: String,
    concepts: BTreeMap<Concept, Option<String>>,
}

impl Vocabulary {
    pub fn new(id: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            language: language.into(),
            concepts: BTreeMap::new(),
        }
    }

    /// Build a vocabulary from (concept, label) pairs
    pub fn from_pairs<I, C, L>(id: impl Into<String>, language: impl Into<String>, pairs: I) -> Self
    where
        I: IntoIterator<Item = (C, Option<L>)>,
        C: Into<Concept>,
        L: Into<String>,
    {
        let mut vocab = Self::new(id, language);
        for (concept, label) in pairs {
            vocab.insert(concept, label.map(Into::into));
        }
        vocab
    }

    pub fn insert(&mut self, concept: impl Into<Concept>, label: Option<String>) {
        self.concepts.insert(concept.into(), label);
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn contains(&self, concept: &Concept) -> bool {
        self.concepts.contains_key(concept)
    }

    pub fn contains_id(&self, concept: &str) -> bool {
        self.concepts.contains_key(&Concept::new(concept))
    }

    pub fn label(&self, concept: &Concept) -> Option<&str> {
        self.concepts.get(concept).and_then(|l| l.as_deref())
    }

    /// Concepts in identifier order
    pub fn concepts(&self) -> impl Iterator<Item = &Concept> + '_ {
        self.concepts.keys()
    }

    pub fn len(&self) -> usize {
        self.concepts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.concepts.is_empty()
    }

    /// Keep only the scores whose concept belongs to this vocabulary
    pub fn retain_known(&self, scores: &mut HashMap<String, f64>) {
        scores.retain(|concept, _| self.contains_id(concept));
    }

    /// Parse the tab-separated subject format
    pub fn parse_tsv(id: &str, language: &str, content: &str) -> Result<Self> {
        let mut vocab = Self::new(id, language);

        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }

            let mut fields = line.splitn(2, '\t');
            let uri = fields.next().unwrap_or_default().trim();
            let uri = uri
                .strip_prefix('<')
                .and_then(|u| u.strip_suffix('>'))
                .unwrap_or(uri);
            if uri.is_empty() {
                return Err(IndexError::Config(format!(
                    "vocabulary '{}' line {}: empty concept identifier",
                    id,
                    line_no + 1
                )));
            }

            let label = fields
                .next()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string);
            vocab.insert(uri, label);
        }

        Ok(vocab)
    }
}

/// Source of vocabularies, keyed by language and vocabulary id
pub trait VocabularyLoader: Send + Sync {
    fn load(&self, language: &str, vocab_id: &str) -> Result<Vocabulary>;
}

/// Loader over vocabularies registered in memory
#[derive(Default)]
pub struct InMemoryVocabularyLoader {
    vocabularies: RwLock<HashMap<(String, String), Vocabulary>>,
}

impl InMemoryVocabularyLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, vocabulary: Vocabulary) {
        let key = (
            vocabulary.language().to_string(),
            vocabulary.id().to_string(),
        );
        self.vocabularies.write().insert(key, vocabulary);
    }

    pub fn with(self, vocabulary: Vocabulary) -> Self {
        self.insert(vocabulary);
        self
    }
}

impl VocabularyLoader for InMemoryVocabularyLoader {
    fn load(&self, language: &str, vocab_id: &str) -> Result<Vocabulary> {
        self.vocabularies
            .read()
            .get(&(language.to_string(), vocab_id.to_string()))
            .cloned()
            .ok_or_else(|| IndexError::VocabularyNotFound {
                vocab_id: vocab_id.to_string(),
                language: language.to_string(),
            })
    }
}

/// Loader reading subject files from a directory
pub struct FileVocabularyLoader {
    root: PathBuf,
}

impl FileVocabularyLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, language: &str, vocab_id: &str) -> PathBuf {
        self.root.join(format!("{}.{}.tsv", vocab_id, language))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl VocabularyLoader for FileVocabularyLoader {
    fn load(&self, language: &str, vocab_id: &str) -> Result<Vocabulary> {
        let path = self.path_for(language, vocab_id);
        if !path.exists() {
            return Err(IndexError::VocabularyNotFound {
                vocab_id: vocab_id.to_string(),
                language: language.to_string(),
            });
        }

        debug!("Loading vocabulary from {:?}", path);
        let content = std::fs::read_to_string(&path)?;
        let vocab = Vocabulary::parse_tsv(vocab_id, language, &content)?;
        info!(
            "Loaded vocabulary '{}' ({}) with {} concepts",
            vocab_id,
            language,
            vocab.len()
        );
        Ok(vocab)
    }
}

/// Loads each (language, vocabulary) pair once and shares it
pub struct SharedVocabularies<'a> {
    loader: &'a dyn VocabularyLoader,
    loaded: HashMap<(String, String), Arc<Vocabulary>>,
}

impl<'a> SharedVocabularies<'a> {
    pub fn new(loader: &'a dyn VocabularyLoader) -> Self {
        Self {
            loader,
            loaded: HashMap::new(),
        }
    }

    pub fn get(&mut self, language: &str, vocab_id: &str) -> Result<Arc<Vocabulary>> {
        let key = (language.to_string(), vocab_id.to_string());
        if let Some(vocab) = self.loaded.get(&key) {
            return Ok(Arc::clone(vocab));
        }

        let vocab = Arc::new(self.loader.load(language, vocab_id)?);
        self.loaded.insert(key, Arc::clone(&vocab));
        Ok(vocab)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_tsv() {
        let content = "# comment\n<http://ex.org/a>\tApples\nhttp://ex.org/b\n\nhttp://ex.org/c\t  \n";
        let vocab = Vocabulary::parse_tsv("ex", "en", content).unwrap();

        assert_eq!(vocab.len(), 3);
        assert_eq!(vocab.label(&Concept::new("http://ex.org/a")), Some("Apples"));
        assert_eq!(vocab.label(&Concept::new("http://ex.org/b")), None);
        assert!(vocab.contains_id("http://ex.org/c"));
        assert_eq!(vocab.language(), "en");
    }

    #[test]
    fn test_parse_tsv_rejects_empty_uri() {
        assert!(Vocabulary::parse_tsv("ex", "en", "\tlabel only\n").is_err());
    }

    #[test]
    fn test_concepts_are_ordered() {
        let vocab = Vocabulary::from_pairs("v", "en", [("c", None::<&str>), ("a", None), ("b", None)]);
        let ids: Vec<&str> = vocab.concepts().map(|c| c.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_retain_known() {
        let vocab = Vocabulary::from_pairs("v", "en", [("a", None::<&str>)]);
        let mut scores = HashMap::from([("a".to_string(), 0.5), ("z".to_string(), 0.9)]);
        vocab.retain_known(&mut scores);
        assert_eq!(scores.len(), 1);
        assert!(scores.contains_key("a"));
    }

    #[test]
    fn test_in_memory_loader() {
        let loader = InMemoryVocabularyLoader::new()
            .with(Vocabulary::from_pairs("yso", "en", [("a", None::<&str>)]));

        assert!(loader.load("en", "yso").is_ok());
        let err = loader.load("fi", "yso").unwrap_err();
        assert!(matches!(err, IndexError::VocabularyNotFound { .. }));
    }

    #[test]
    fn test_file_loader() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("yso.en.tsv")).unwrap();
        writeln!(file, "<http://ex.org/a>\tApples").unwrap();
        writeln!(file, "<http://ex.org/b>\tBananas").unwrap();

        let loader = FileVocabularyLoader::new(dir.path());
        let vocab = loader.load("en", "yso").unwrap();
        assert_eq!(vocab.len(), 2);
        assert_eq!(vocab.id(), "yso");

        assert!(matches!(
            loader.load("en", "missing"),
            Err(IndexError::VocabularyNotFound { .. })
        ));
    }

    #[test]
    fn test_shared_vocabularies_load_once() {
        let loader = InMemoryVocabularyLoader::new()
            .with(Vocabulary::from_pairs("yso", "en", [("a", None::<&str>)]));
        let mut shared = SharedVocabularies::new(&loader);

        let first = shared.get("en", "yso").unwrap();
        let second = shared.get("en", "yso").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
