use anyhow::Context;
use clap::{Parser, Subcommand};
use docket::{
    api, config, logging,
    processing::{DocumentApi, DocumentService, UploadedFile},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;
use walkdir::WalkDir;

/// Summarize PDF collections and answer questions grounded in them.
#[derive(Parser)]
#[command(name = "docket", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API (default).
    Serve,
    /// Ingest PDF files, or every PDF under the given directories, into a new collection.
    Ingest {
        /// Name of the collection to create.
        #[arg(long, short)]
        collection: String,
        /// Files or directories to ingest.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Print the passages closest to a query.
    Search {
        /// Collection to search.
        #[arg(long, short)]
        collection: String,
        /// Free-text query.
        query: String,
    },
    /// Answer a question from a collection.
    Ask {
        /// Collection providing the context.
        #[arg(long, short)]
        collection: String,
        /// Question to answer.
        question: String,
    },
    /// List registered collections and their files.
    Collections,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_tracing();
    let config = config::init_config().context("Failed to load configuration")?;
    let service = Arc::new(
        DocumentService::from_config(config)
            .await
            .context("Failed to initialize collaborators")?,
    );

    let result = match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(service.clone()).await,
        Command::Ingest { collection, paths } => ingest(&service, &collection, &paths).await,
        Command::Search { collection, query } => {
            println!("{}", service.search(&query, &collection).await);
            Ok(())
        }
        Command::Ask {
            collection,
            question,
        } => {
            println!("{}", service.ask_question(&question, &collection).await);
            Ok(())
        }
        Command::Collections => {
            print!("{}", service.list_collections().await);
            Ok(())
        }
    };

    service.shutdown().await;
    result
}

async fn serve(service: Arc<DocumentService>) -> anyhow::Result<()> {
    let app = api::create_router(service);
    let (listener, port) = bind_listener()
        .await
        .context("Failed to bind listener")?;
    tracing::info!("Listening on http://0.0.0.0:{}", port);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(err) => {
            tracing::error!(error = %err, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}

async fn bind_listener() -> Result<(TcpListener, u16), std::io::Error> {
    use std::net::Ipv4Addr;

    let config = config::get_config();
    if let Some(port) = config.server_port {
        return TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .map(|listener| (listener, port));
    }

    const PORT_RANGE: std::ops::RangeInclusive<u16> = 4100..=4199;
    for port in PORT_RANGE {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => {
                tracing::debug!(port, "Bound server port");
                return Ok((listener, port));
            }
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port already in use; trying next");
                continue;
            }
            Err(err) => return Err(err),
        }
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::AddrNotAvailable,
        "No available port found in range 4100-4199",
    ))
}

async fn ingest(
    service: &DocumentService,
    collection: &str,
    paths: &[PathBuf],
) -> anyhow::Result<()> {
    let files = collect_pdfs(paths).await?;
    println!("{}", service.upload_files(files, collection).await);
    Ok(())
}

/// Read every explicitly named file plus each `.pdf` found under named directories.
async fn collect_pdfs(paths: &[PathBuf]) -> anyhow::Result<Vec<UploadedFile>> {
    let mut targets = Vec::new();
    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path).sort_by_file_name() {
                let entry = entry.with_context(|| format!("Failed to walk {}", path.display()))?;
                if entry.file_type().is_file() && is_pdf(entry.path()) {
                    targets.push(entry.into_path());
                }
            }
        } else {
            targets.push(path.clone());
        }
    }

    let mut files = Vec::with_capacity(targets.len());
    for target in targets {
        let bytes = tokio::fs::read(&target)
            .await
            .with_context(|| format!("Failed to read {}", target.display()))?;
        let name = target
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| target.display().to_string());
        files.push(UploadedFile::new(name, bytes));
    }
    tracing::info!(files = files.len(), "Collected documents for ingestion");
    Ok(files)
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}
