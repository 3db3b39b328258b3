use anyhow::Context;
use supportkb::{
    api, config,
    embedding::get_embedding_client,
    extraction::ExtractionRouter,
    generation::HttpGenerator,
    index::HttpEntryIndex,
    ingest::IngestService,
    logging,
    repository::EntryRepository,
    retrieval::RetrievalService,
    storage::MemoryBlobStore,
    threads::MemoryThreadStore,
};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::init_config();
    logging::init_tracing();

    let blobs = Arc::new(MemoryBlobStore::new());
    let generator = Arc::new(HttpGenerator::new().context("Failed to build generation client")?);
    let index = Arc::new(HttpEntryIndex::new().context("Failed to build index client")?);
    let repository = Arc::new(EntryRepository::new(index, get_embedding_client()));
    let router = ExtractionRouter::new(generator.clone(), blobs.clone());
    let ingest = Arc::new(IngestService::new(blobs, router, repository.clone()));
    let retrieval = Arc::new(RetrievalService::new(
        repository,
        generator,
        Arc::new(MemoryThreadStore::new()),
        ingest.metrics_handle(),
    ));

    let app = api::create_router(ingest, retrieval);

    let (listener, port) = bind_listener().await.context("Failed to bind listener")?;
    tracing::info!("Listening on http://0.0.0.0:{}", port);
    axum::serve(listener, app).await?;
    Ok(())
}

/// Bind the server socket.
///
/// A configured port is binding's single candidate; without one the fallback
/// range 4200-4299 is scanned and the first free port wins. Only the
/// address-in-use error continues the scan.
async fn bind_listener() -> Result<(TcpListener, u16), std::io::Error> {
    use std::net::Ipv4Addr;

    let candidates: Vec<u16> = match config::get_config().server_port {
        Some(port) => vec![port],
        None => (4200..=4299).collect(),
    };

    let mut last_err = None;
    for port in candidates {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => return Ok((listener, port)),
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port taken, trying next candidate");
                last_err = Some(err);
            }
            Err(err) => return Err(err),
        }
    }

    Err(last_err.unwrap_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::AddrNotAvailable, "no bind candidates")
    }))
}
