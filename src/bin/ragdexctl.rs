use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use ragdex::{
    config, logging,
    processing::SourceDocument,
    search::AzureSearchService,
    service::RagService,
};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "ragdexctl", about = "Operator tooling for the ragdex index")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create or update the search index definition.
    CreateIndex {
        /// Language analyzer for title and chunk fields, e.g. `ja.microsoft`.
        #[arg(long)]
        analyzer: Option<String>,
    },
    /// Run the ingestion pipeline over local files or directories.
    Ingest {
        /// Files or directories to ingest.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Prefix prepended to every blob name, e.g. `docs/`.
        #[arg(long, default_value = "")]
        prefix: String,
        /// Base URL joined with the blob name to form the stored document URL.
        #[arg(long)]
        base_url: Option<String>,
    },
}

/// Local file paired with the blob name it is ingested under.
#[derive(Debug, PartialEq, Eq)]
struct LocalDocument {
    path: PathBuf,
    blob_name: String,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    config::init_config();
    logging::init_tracing();
    let config = config::get_config();

    match cli.command {
        Command::CreateIndex { analyzer } => {
            let search = AzureSearchService::new(config).context("failed to build search client")?;
            search
                .create_or_update_index(config.embedding_dimension, analyzer.as_deref())
                .await
                .with_context(|| format!("failed to create index {}", search.index_name()))?;
            println!("index {} is ready", search.index_name());
        }
        Command::Ingest {
            paths,
            prefix,
            base_url,
        } => {
            let service = RagService::from_config(config).context("failed to build pipeline")?;
            let documents = collect_documents(&paths, &prefix)?;
            let mut aborted = 0usize;

            for document in documents {
                let content = fs::read(&document.path)
                    .with_context(|| format!("failed to read {}", document.path.display()))?;
                let url = document_url(base_url.as_deref(), &document.blob_name, &document.path)?;
                let source = SourceDocument::new(document.blob_name.clone(), url, content);

                match service.pipeline().run(&source).await {
                    Ok(report) => println!(
                        "{}: {} indexed, {} failed",
                        document.blob_name,
                        report.indexed_count(),
                        report.failed_count()
                    ),
                    Err(err) => {
                        aborted += 1;
                        eprintln!("{}: {err}", document.blob_name);
                    }
                }
            }

            let snapshot = service.pipeline().metrics_snapshot();
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
            if aborted > 0 {
                bail!("{aborted} document(s) could not be ingested");
            }
        }
    }
    Ok(())
}

fn collect_documents(paths: &[PathBuf], prefix: &str) -> Result<Vec<LocalDocument>> {
    let mut documents = Vec::new();
    for root in paths {
        if root.is_file() {
            let file_name = root
                .file_name()
                .with_context(|| format!("{} has no file name", root.display()))?;
            documents.push(LocalDocument {
                path: root.clone(),
                blob_name: format!("{prefix}{}", file_name.to_string_lossy()),
            });
            continue;
        }
        if !root.is_dir() {
            bail!("{} does not exist", root.display());
        }

        let mut found = Vec::new();
        for entry in WalkDir::new(root).follow_links(true) {
            let entry = entry.with_context(|| format!("failed to walk {}", root.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(root)
                .with_context(|| format!("{} escaped {}", entry.path().display(), root.display()))?;
            found.push(LocalDocument {
                path: entry.path().to_path_buf(),
                blob_name: format!("{prefix}{}", blob_path(relative)),
            });
        }
        found.sort_by(|a, b| a.blob_name.cmp(&b.blob_name));
        documents.extend(found);
    }
    Ok(documents)
}

fn blob_path(relative: &Path) -> String {
    relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn document_url(base_url: Option<&str>, blob_name: &str, path: &Path) -> Result<String> {
    if let Some(base) = base_url {
        return Ok(format!("{}/{}", base.trim_end_matches('/'), blob_name));
    }
    let absolute = fs::canonicalize(path)
        .with_context(|| format!("failed to resolve {}", path.display()))?;
    Ok(format!("file://{}", absolute.display()))
}
