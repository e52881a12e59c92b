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

//! Subindex CLI
//!
//! Command-line interface for listing projects and requesting subject
//! suggestions.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use subindex_core::{FileVocabularyLoader, ProjectsFile, Suggestion, SuggestionList};
use subindex_engine::{
    global, FileModelProvider, Project, ProjectRegistry, RegistryContext, SuggestParams,
};
use tracing::{debug, info, Level};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "subindex")]
#[command(about = "Subindex - automated subject indexing", long_about = None)]
struct Cli {
    /// Projects configuration file
    #[arg(short, long, default_value = "projects.toml")]
    projects: PathBuf,

    /// Data directory holding trained models
    #[arg(long, default_value = "./data")]
    datadir: PathBuf,

    /// Vocabulary directory (default: <datadir>/vocabs)
    #[arg(long)]
    vocab_dir: Option<PathBuf>,

    /// Verbose mode
    #[arg(short, long)]
    verbose: bool,

    /// Output as JSON (machine-readable)
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured projects
    ListProjects,

    /// Show details of one project
    ShowProject {
        /// Project ID
        project_id: String,
    },

    /// Suggest subjects for a document read from a file or stdin
    Suggest {
        /// Project ID
        project_id: String,

        /// Maximum number of suggestions (default: the project limit)
        #[arg(long)]
        limit: Option<usize>,

        /// Minimum score
        #[arg(long)]
        threshold: Option<f64>,

        /// Document file; stdin when omitted
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so that stdout stays machine-readable
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str())),
        )
        .with_writer(std::io::stderr)
        .init();

    let registry = build_registry(&cli)?;
    global::install(registry).context("Failed to install project registry")?;

    match cli.command {
        Commands::ListProjects => list_projects(cli.json)?,

        Commands::ShowProject { project_id } => {
            let project = global::resolve(&project_id)?;
            show_project(&project, cli.json)?;
        }

        Commands::Suggest {
            project_id,
            limit,
            threshold,
            file,
        } => {
            let project = global::resolve(&project_id)?;
            let text = read_text(file.as_deref())?;
            debug!("Read {} bytes of input", text.len());

            let suggestions = project
                .suggest_with(&text, SuggestParams { limit, threshold })
                .await
                .with_context(|| format!("Suggestion request to '{}' failed", project_id))?;
            print_suggestions(&suggestions, cli.json)?;
        }
    }

    Ok(())
}

fn build_registry(cli: &Cli) -> Result<Arc<ProjectRegistry>> {
    let file = ProjectsFile::load(&cli.projects)
        .with_context(|| format!("Failed to load projects from {:?}", cli.projects))?;

    let vocab_dir = cli
        .vocab_dir
        .clone()
        .unwrap_or_else(|| cli.datadir.join("vocabs"));
    let context = RegistryContext::new(
        Arc::new(FileVocabularyLoader::new(vocab_dir)),
        Arc::new(FileModelProvider::new(&cli.datadir)),
    )
    .with_engine(file.engine.clone());

    let registry =
        ProjectRegistry::build(&file.projects, &context).context("Failed to build project registry")?;
    info!("Loaded {} projects from {:?}", registry.len(), cli.projects);
    Ok(registry)
}

fn read_text(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))
        }
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read stdin")?;
            Ok(text)
        }
    }
}

fn list_projects(json: bool) -> Result<()> {
    let registry = global::current()?;
    if json {
        let projects: Vec<serde_json::Value> = registry
            .projects()
            .iter()
            .map(|p| {
                serde_json::json!({
                    "id": p.id(),
                    "name": p.name(),
                    "language": p.language(),
                    "backend": p.kind(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&projects)?);
        return Ok(());
    }

    println!("{:<24} {:<32} {:<8} {}", "ID", "NAME", "LANG", "BACKEND");
    for project in registry.projects() {
        println!(
            "{:<24} {:<32} {:<8} {}",
            project.id(),
            project.name(),
            project.language(),
            project.kind()
        );
    }
    Ok(())
}

fn show_project(project: &Project, json: bool) -> Result<()> {
    if json {
        let details = serde_json::json!({
            "id": project.id(),
            "name": project.name(),
            "language": project.language(),
            "backend": project.kind(),
            "analyzer": project.analyzer().to_string(),
            "vocab": project.vocabulary().id(),
            "vocab_size": project.vocabulary().len(),
            "limit": project.limit(),
            "sources": project.sources(),
        });
        println!("{}", serde_json::to_string_pretty(&details)?);
        return Ok(());
    }

    println!("Project {}:", project.id());
    println!("  Name: {}", project.name());
    println!("  Language: {}", project.language());
    println!("  Backend: {}", project.kind());
    println!("  Analyzer: {}", project.analyzer());
    println!(
        "  Vocabulary: {} ({} concepts)",
        project.vocabulary().id(),
        project.vocabulary().len()
    );
    println!("  Limit: {}", project.limit());
    if !project.sources().is_empty() {
        println!("  Sources:");
        for source in project.sources() {
            println!("    {} (weight {})", source.project_id, source.weight);
        }
    }
    Ok(())
}

fn format_suggestion(suggestion: &Suggestion) -> String {
    format!(
        "<{}>\t{}\t{:.4}",
        suggestion.concept,
        suggestion.label.as_deref().unwrap_or(""),
        suggestion.score
    )
}

fn print_suggestions(suggestions: &SuggestionList, json: bool) -> Result<()> {
    for degraded in suggestions.degraded() {
        eprintln!("warning: source {} unavailable: {}", degraded.project_id, degraded.reason);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(suggestions)?);
    } else {
        for suggestion in suggestions {
            println!("{}", format_suggestion(suggestion));
        }
    }
    Ok(())
}
