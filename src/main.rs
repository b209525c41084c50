use anyhow::Context;
use clap::Parser;
use pdfchat::{
    api, config,
    embedding::OpenAiEmbeddingClient,
    generation::OpenAiChatClient,
    logging,
    processing::{PipelineSettings, ProcessingService},
};
use std::{path::PathBuf, sync::Arc};
use tokio::net::TcpListener;

/// Chat with the contents of uploaded PDF documents.
#[derive(Debug, Parser)]
#[command(name = "pdfchat", version, about)]
struct Args {
    /// Port to listen on (overrides SERVER_PORT).
    #[arg(long)]
    port: Option<u16>,
    /// Load environment variables from this file instead of `.env`.
    #[arg(long)]
    env_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = config::init_config(args.env_file.as_deref()).context("Invalid configuration")?;
    logging::init_tracing();
    tracing::debug!(
        base_url = %config.openai_base_url,
        embedding_model = %config.embedding_model,
        chat_model = %config.chat_model,
        chunk_size = config.text_splitter_chunk_size,
        chunk_overlap = config.text_splitter_chunk_overlap,
        top_k = config.retrieval_top_k,
        server_port = ?config.server_port,
        "Loaded configuration"
    );

    let embedder = OpenAiEmbeddingClient::from_config(config)?;
    let chat = OpenAiChatClient::from_config(config)?;
    let service = ProcessingService::new(
        Arc::new(embedder),
        Arc::new(chat),
        PipelineSettings::from_config(config),
    );
    let app = api::create_router(api::AppState::new(Arc::new(service)), config.max_upload_bytes);

    let (listener, port) = bind_listener(args.port.or(config.server_port)).await?;
    tracing::info!("Listening on http://0.0.0.0:{}", port);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn bind_listener(requested: Option<u16>) -> Result<(TcpListener, u16), std::io::Error> {
    use std::net::Ipv4Addr;

    if let Some(port) = requested {
        return TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .map(|listener| (listener, port));
    }

    const PORT_RANGE: std::ops::RangeInclusive<u16> = 8501..=8599;
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
        "No available port found in range 8501-8599",
    ))
}
