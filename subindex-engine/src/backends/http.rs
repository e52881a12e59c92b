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

//! Remote classifier backend
//!
//! Request (JSON, POST to `endpoint`):
//!
//! ```json
//! {"text": "...", "limit": 10, "project": "yso-en"}
//! ```
//!
//! Response:
//!
//! ```json
//! {"results": [{"uri": "http://www.yso.fi/onto/yso/p123", "label": "apples", "score": 0.8}]}
//! ```

use super::parse_timeout;
use crate::project::ProjectSettings;
use crate::{Backend, BackendKind};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use subindex_core::{
    EngineConfig, IndexError, ProjectDefinition, Result, SuggestionList, Vocabulary,
};
use tracing::debug;

/// Parameter keys of the remote backend
pub const HTTP_KEYS: [&str; 3] = ["endpoint", "remote_project", "timeout"];

#[derive(Debug, Deserialize)]
struct RemoteResponse {
    results: Vec<RemoteResult>,
}

#[derive(Debug, Deserialize)]
struct RemoteResult {
    uri: String,
    score: f64,
}

pub struct HttpBackend {
    project_id: String,
    endpoint: String,
    remote_project: String,
    timeout: Duration,
    vocabulary: Arc<Vocabulary>,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(
        def: &ProjectDefinition,
        settings: &ProjectSettings,
        engine: &EngineConfig,
    ) -> Result<Self> {
        let endpoint = def.param("endpoint").ok_or_else(|| IndexError::MissingKey {
            project_id: def.id.clone(),
            key: "endpoint".to_string(),
        })?;
        reqwest::Url::parse(endpoint)
            .map_err(|e| IndexError::invalid_parameter(&def.id, "endpoint", e.to_string()))?;

        let timeout = parse_timeout(def, engine.remote_timeout_secs)?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IndexError::Config(format!("HTTP client for '{}': {}", def.id, e)))?;

        Ok(Self {
            project_id: settings.id.clone(),
            endpoint: endpoint.to_string(),
            remote_project: def.param("remote_project").unwrap_or(&def.id).to_string(),
            timeout,
            vocabulary: Arc::clone(&settings.vocabulary),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn call(&self, text: &str, limit: usize) -> Result<RemoteResponse> {
        let request = serde_json::json!({
            "text": text,
            "limit": limit,
            "project": self.remote_project,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| self.unavailable(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(self.unavailable(format!(
                "remote service returned {}: {}",
                status,
                error_text.trim()
            )));
        }

        response
            .json::<RemoteResponse>()
            .await
            .map_err(|e| self.unavailable(format!("malformed response: {}", e)))
    }

    fn unavailable(&self, reason: String) -> IndexError {
        IndexError::unavailable(&self.project_id, reason)
    }
}

#[async_trait]
impl Backend for HttpBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Http
    }

    async fn suggest(&self, text: &str, limit: usize) -> Result<SuggestionList> {
        if limit == 0 || text.trim().is_empty() {
            return Ok(SuggestionList::empty());
        }

        let response = tokio::time::timeout(self.timeout, self.call(text, limit))
            .await
            .map_err(|_| {
                self.unavailable(format!("no response within {:.1}s", self.timeout.as_secs_f64()))
            })??;

        debug!(
            "Remote service for {} returned {} results",
            self.project_id,
            response.results.len()
        );
        Ok(SuggestionList::from_scores(
            response.results.into_iter().map(|r| (r.uri, r.score)),
            &self.vocabulary,
            limit,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use subindex_core::{InMemoryVocabularyLoader, SharedVocabularies};

    fn backend(endpoint: &str, timeout: Option<f64>) -> Result<HttpBackend> {
        let loader = InMemoryVocabularyLoader::new().with(Vocabulary::from_pairs(
            "yso",
            "en",
            [("A", Some("apples")), ("B", Some("bananas"))],
        ));
        let mut vocabs = SharedVocabularies::new(&loader);
        let mut def = ProjectDefinition::new("maui-en", "Maui", "en", "maui", "yso")
            .with_param("endpoint", endpoint)
            .with_param("remote_project", "yso-en");
        if let Some(secs) = timeout {
            def = def.with_param("timeout", secs);
        }
        let engine = EngineConfig::default();
        let settings = ProjectSettings::resolve(&def, BackendKind::Http, &mut vocabs, &engine)?;
        HttpBackend::new(&def, &settings, &engine)
    }

    #[tokio::test]
    async fn test_translates_results() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/suggest")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "text": "apples and bananas",
                "limit": 5,
                "project": "yso-en",
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"results": [
                    {"uri": "B", "label": "bananas", "score": 0.25},
                    {"uri": "A", "label": "apples", "score": 0.75},
                    {"uri": "X", "score": 0.99}
                ]}"#,
            )
            .create_async()
            .await;

        let backend = backend(&format!("{}/suggest", server.url()), None).unwrap();
        let list = backend.suggest("apples and bananas", 5).await.unwrap();

        mock.assert_async().await;
        assert_eq!(list.len(), 2);
        assert_eq!(list.as_slice()[0].concept.as_str(), "A");
        assert_eq!(list.get("B"), Some(0.25));
    }

    #[tokio::test]
    async fn test_error_status_is_unavailable() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/suggest")
            .with_status(500)
            .with_body("internal error")
            .create_async()
            .await;

        let backend = backend(&format!("{}/suggest", server.url()), None).unwrap();
        let err = backend.suggest("apples", 5).await.unwrap_err();
        assert!(matches!(err, IndexError::BackendUnavailable { ref project_id, .. } if project_id == "maui-en"));
    }

    #[tokio::test]
    async fn test_malformed_body_is_unavailable() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/suggest")
            .with_status(200)
            .with_body(r#"{"hits": []}"#)
            .create_async()
            .await;

        let backend = backend(&format!("{}/suggest", server.url()), None).unwrap();
        assert!(backend.suggest("apples", 5).await.unwrap_err().is_unavailable());
    }

    #[tokio::test]
    async fn test_connection_failure_is_unavailable() {
        let backend = backend("http://127.0.0.1:9/suggest", Some(2.0)).unwrap();
        assert_eq!(backend.timeout(), Duration::from_secs(2));
        assert!(backend.suggest("apples", 5).await.unwrap_err().is_unavailable());
    }

    #[tokio::test]
    async fn test_empty_text_skips_the_call() {
        let backend = backend("http://127.0.0.1:9/suggest", None).unwrap();
        assert!(backend.suggest("  ", 5).await.unwrap().is_empty());
    }

    #[test]
    fn test_endpoint_validation() {
        assert!(matches!(
            backend("not a url", None),
            Err(IndexError::InvalidParameter { .. })
        ));
    }
}
