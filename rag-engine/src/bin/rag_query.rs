use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use rag_engine::http::HttpEmbeddingProvider;
use rag_engine::{ContextOutcome, DocumentInput, RagConfig, RagEngine, init_tracing};
use tracing::info;

/// Index text files through an HTTP embedding service and print the context
/// retrieved for one query.
#[derive(Parser, Debug)]
#[command(name = "rag-query", version, about)]
struct Cli {
    /// JSON configuration file; defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Embedding endpoint accepting `{"model", "input"}`.
    #[arg(long, env = "RAG_EMBEDDING_ENDPOINT")]
    endpoint: String,

    /// Embedding model name.
    #[arg(long, env = "RAG_EMBEDDING_MODEL")]
    model: String,

    /// Bearer token for the embedding endpoint.
    #[arg(long, env = "RAG_EMBEDDING_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Number of chunks to retrieve.
    #[arg(long)]
    top_k: Option<usize>,

    /// The query to answer.
    #[arg(long, short)]
    query: String,

    /// Text files to index.
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("rag_engine=info,rag_query=info");
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => RagConfig::from_file(path)?,
        None => RagConfig::default(),
    };

    let mut provider = HttpEmbeddingProvider::new(&cli.endpoint, &cli.model)?;
    if let Some(api_key) = &cli.api_key {
        provider = provider.with_api_key(api_key);
    }

    let engine =
        RagEngine::builder().config(config).embedding_provider(Arc::new(provider)).build()?;

    let mut documents = Vec::with_capacity(cli.files.len());
    for path in &cli.files {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        documents.push(DocumentInput::with_metadata(
            content,
            [("source", path.display().to_string())],
        ));
    }

    let report = engine.ingest_documents(documents).await;
    info!(stored = report.stored, dropped = report.dropped, "indexed files");
    if report.stored == 0 {
        bail!("no chunks were stored; check the embedding endpoint and the input files");
    }

    match engine.build_context(&cli.query, cli.top_k).await? {
        ContextOutcome::NoRelevantInformation => {
            println!("{}", ContextOutcome::NoRelevantInformation.text());
        }
        ContextOutcome::Found(context) => {
            print!("{}", context.text);
            if context.omitted > 0 {
                eprintln!("({} more result(s) did not fit the context budget)", context.omitted);
            }
        }
    }
    Ok(())
}
