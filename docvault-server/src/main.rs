use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::{Parser, Subcommand};
use docvault_rag::{EventHandler, PipelineHandler, SearchResponse, SourceFile};
use docvault_server::{ServerConfig, run_server};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "docvault")]
#[command(about = "Upload documents into vector collections and search them", long_about = None)]
struct Cli {
    #[arg(long, global = true, help = "Address to bind (overrides DOCVAULT_HOST)")]
    host: Option<String>,

    #[arg(long, global = true, help = "Port to bind (overrides DOCVAULT_PORT)")]
    port: Option<u16>,

    #[arg(long, global = true, help = "Upload staging directory (overrides DOCVAULT_UPLOAD_DIR)")]
    upload_dir: Option<PathBuf>,

    #[arg(long, global = true, help = "Chroma server URL (overrides DOCVAULT_CHROMA_URL)")]
    chroma_url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Run the HTTP service (default)")]
    Serve,

    #[command(about = "Index local files into a collection")]
    Ingest {
        #[arg(short, long, help = "Target collection")]
        collection: String,

        #[arg(required = true, help = "Text files to index; they are never deleted")]
        files: Vec<PathBuf>,
    },

    #[command(about = "Answer a query from a collection")]
    Search {
        #[arg(short, long, help = "Collection to search")]
        collection: String,

        #[arg(help = "The question to answer")]
        query: String,
    },

    #[command(about = "Check that the vector store is alive")]
    Health,

    #[command(about = "Delete every collection in the vector store")]
    Reset,
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cli_handler(config: &ServerConfig) -> anyhow::Result<PipelineHandler> {
    let pipeline = Arc::new(config.build_pipeline()?);
    Ok(PipelineHandler::new(pipeline, config.default_collection.clone()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut config = ServerConfig::from_env()?;
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(upload_dir) = cli.upload_dir {
        config.upload_dir = upload_dir;
    }
    if let Some(chroma_url) = cli.chroma_url {
        config.chroma_url = chroma_url;
    }

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_server(config).await?,
        Commands::Ingest { collection, files } => {
            let handler = cli_handler(&config)?;
            let mut sources = Vec::with_capacity(files.len());
            for path in files {
                let bytes = tokio::fs::read(&path)
                    .await
                    .with_context(|| format!("failed to read {}", path.display()))?;
                sources.push(SourceFile::borrowed(path, bytes));
            }
            let response = handler.on_upload(&collection, sources).await;
            print_json(&response)?;
            if !response.is_success() {
                anyhow::bail!("ingestion into '{collection}' failed");
            }
        }
        Commands::Search { collection, query } => {
            let handler = cli_handler(&config)?;
            let response: SearchResponse = handler.on_query(&collection, &query).await?;
            print_json(&response)?;
        }
        Commands::Health => {
            let handler = cli_handler(&config)?;
            let response = handler.health().await;
            print_json(&response)?;
            if !response.is_healthy() {
                anyhow::bail!("vector store is not reachable");
            }
        }
        Commands::Reset => {
            let handler = cli_handler(&config)?;
            let response = handler.reset().await;
            print_json(&response)?;
            if !response.is_success() {
                anyhow::bail!("reset failed");
            }
        }
    }
    Ok(())
}
