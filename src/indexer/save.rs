use super::{Indexer, IndexerError};
use crate::models::Block;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

const INFO_LOG_INTERVAL: Duration = Duration::from_secs(600);

/// Checks that `masters` continue `checkpoint` without gaps or repeats.
pub fn verify_sequence(checkpoint: Option<u32>, masters: &[Block]) -> Result<(), IndexerError> {
    let mut expected = checkpoint.map(|seq_no| seq_no + 1);

    for master in masters {
        let seq_no = master.id.seq_no;
        if let Some(expected) = expected {
            if seq_no != expected {
                return Err(IndexerError::Consistency(format!(
                    "expected master block {expected}, got {seq_no}"
                )));
            }
        }
        expected = Some(seq_no + 1);
    }

    Ok(())
}

impl Indexer {
    /// Drains fetched master blocks, committing everything that arrived within
    /// one tick as a single batch. Returns the last committed sequence number
    /// once the channel is closed and the final batch is flushed.
    pub async fn save_loop(
        &self,
        mut results: mpsc::Receiver<Block>,
        mut checkpoint: Option<u32>,
    ) -> Result<Option<u32>, IndexerError> {
        let mut ticker = interval(self.save_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut pending: Vec<Block> = Vec::new();
        let mut last_log = Instant::now();

        info!("Starting save loop after checkpoint {:?}", checkpoint);

        loop {
            tokio::select! {
                block = results.recv() => match block {
                    Some(block) => {
                        debug!(
                            "New master {} with {} transactions and {} shards",
                            block.id.seq_no,
                            block.transactions.len(),
                            block.shards.len()
                        );
                        pending.push(block);
                    }
                    None => {
                        if !pending.is_empty() {
                            checkpoint = self.save_pending(&mut pending, checkpoint, &mut last_log).await?;
                        }
                        info!("Save loop stopped at checkpoint {:?}", checkpoint);
                        return Ok(checkpoint);
                    }
                },
                _ = ticker.tick() => {
                    if !pending.is_empty() {
                        checkpoint = self.save_pending(&mut pending, checkpoint, &mut last_log).await?;
                    }
                }
            }
        }
    }

    async fn save_pending(
        &self,
        pending: &mut Vec<Block>,
        checkpoint: Option<u32>,
        last_log: &mut Instant,
    ) -> Result<Option<u32>, IndexerError> {
        let masters = std::mem::take(pending);
        verify_sequence(checkpoint, &masters)?;

        let count = masters.len();
        let batch = self.save_blocks(masters).await?;
        let last = batch.last_seq_no().or(checkpoint);

        if last_log.elapsed() > INFO_LOG_INTERVAL {
            info!("Inserted {} master blocks, last inserted seq {:?}", count, last);
            *last_log = Instant::now();
        } else {
            debug!("Inserted {} master blocks, last inserted seq {:?}", count, last);
        }

        Ok(last)
    }
}
