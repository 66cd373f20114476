use crate::blockchain::client::ChainClient;
use crate::catalog::ContractCatalog;
use crate::blockchain::fetcher::Fetcher;
use crate::config::Config;
use crate::db;
use crate::decoder::CellCodec;
use crate::indexer::{Indexer, IndexerError};
use crate::rescan::RescanEngine;
use crate::state::AppState;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Refuses to index without interfaces and registers the stored definitions
/// with the codec.
pub(crate) async fn prepare_catalog(catalog: &ContractCatalog) -> Result<(), IndexerError> {
    let interfaces = catalog.get_interfaces().await?;
    if interfaces.is_empty() {
        return Err(IndexerError::NoInterfaces);
    }

    let definitions = catalog.register_definitions().await?;
    info!("Loaded {} contract interfaces and {} definitions", interfaces.len(), definitions);
    Ok(())
}

/// Runs the indexer until `shutdown` is cancelled or a batch fails.
///
/// Fetch workers and the rescan engine stop taking new work on shutdown, the
/// save loop commits whatever was fetched and the function returns. A failed
/// batch cancels everything and is returned; the next start resumes after the
/// last committed master block.
pub async fn run(
    config: Config,
    client: Arc<dyn ChainClient>,
    codec: Arc<dyn CellCodec>,
    shutdown: CancellationToken,
) -> Result<(), IndexerError> {
    info!("Starting chain indexer");

    let state = AppState::new(config, client, codec).await?;
    let config = &state.config;
    prepare_catalog(&state.catalog).await?;

    let indexer = Indexer::new(
        state.db_pool.clone(),
        state.message_parser(),
        state.mirror.clone(),
        config,
    );
    let checkpoint = db::block::last_master_seq_no(&state.db_pool).await?;
    let from_seq = indexer.start_seq_no(config.from_block).await?;

    let rescan = RescanEngine::new(
        state.db_pool.clone(),
        state.catalog.clone(),
        state.account_parser(),
        state.message_parser(),
        config,
    );
    let rescan_shutdown = shutdown.clone();
    let rescan_handle = tokio::spawn(async move { rescan.run(rescan_shutdown).await });

    let (sender, receiver) = mpsc::channel(config.workers * 2);
    let fetcher = Arc::new(Fetcher::new(
        state.client.clone(),
        state.account_parser(),
        config.workers,
        config.rpc_retry_delay,
    ));
    let workers = fetcher.start(from_seq, sender, shutdown.clone());

    let result = indexer.save_loop(receiver, checkpoint).await;
    if let Err(e) = &result {
        error!("Stopping after failed batch: {}", e);
        shutdown.cancel();
    }

    workers.join().await;
    if let Err(e) = rescan_handle.await {
        error!("Rescan engine panicked: {}", e);
    }

    let checkpoint = result?;
    info!("Chain indexer stopped at master block {:?}", checkpoint);
    Ok(())
}
