use crate::blockchain::client::{ChainClient, ClientError};
use crate::decoder::AccountParser;
use crate::models::{AccountState, Address, Block, BlockId, MessageSide, Transaction};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const ACCOUNT_FETCH_CONCURRENCY: usize = 16;

/// Next sequence number allowed to enter the results channel. A worker that
/// gives up on a sequence number closes the turnstile from that point on.
#[derive(Debug, Clone, Copy)]
struct Turn {
    next: u32,
    closed_at: Option<u32>,
}

/// Pool of workers walking master blocks forward. Each worker owns one
/// sequence number end to end; results leave in sequence order.
pub struct Fetcher {
    client: Arc<dyn ChainClient>,
    accounts: AccountParser,
    workers: usize,
    retry_delay: Duration,
}

pub struct FetcherHandle {
    workers: Vec<JoinHandle<()>>,
}

impl FetcherHandle {
    /// Waits for every worker to exit.
    pub async fn join(self) {
        for (id, handle) in self.workers.into_iter().enumerate() {
            if let Err(e) = handle.await {
                error!("Fetch worker {} panicked: {}", id, e);
            }
        }
    }
}

impl Fetcher {
    pub fn new(
        client: Arc<dyn ChainClient>,
        accounts: AccountParser,
        workers: usize,
        retry_delay: Duration,
    ) -> Self {
        Self {
            client,
            accounts,
            workers: workers.max(1),
            retry_delay,
        }
    }

    /// Spawns the workers starting at `from_seq`. The channel closes once all
    /// workers stopped after `shutdown`.
    pub fn start(
        self: Arc<Self>,
        from_seq: u32,
        results: mpsc::Sender<Block>,
        shutdown: CancellationToken,
    ) -> FetcherHandle {
        let counter = Arc::new(AtomicU32::new(from_seq));
        let (turn, _) = watch::channel(Turn {
            next: from_seq,
            closed_at: None,
        });
        let turn = Arc::new(turn);

        info!("Starting {} fetch workers from master block {}", self.workers, from_seq);

        let workers = (0..self.workers)
            .map(|id| {
                let worker = Worker {
                    id,
                    fetcher: self.clone(),
                    counter: counter.clone(),
                    turn: turn.clone(),
                    results: results.clone(),
                    shutdown: shutdown.clone(),
                };
                tokio::spawn(worker.run())
            })
            .collect();

        FetcherHandle { workers }
    }

    /// Retrieves master block `seq_no` with shards, transactions and
    /// classified account states, and links message sides to transactions.
    pub async fn fetch_block(&self, seq_no: u32) -> Result<Block, ClientError> {
        let mut master = self.client.get_master_block(seq_no).await?;

        let mut keys = BTreeSet::new();
        for block in master.with_shards() {
            for tx in &block.transactions {
                keys.insert((tx.address, block.id));
            }
        }

        let states: HashMap<(Address, BlockId), Arc<AccountState>> = stream::iter(keys)
            .map(|(address, block)| async move {
                let state = self.fetch_account(address, block).await?;
                Ok::<_, ClientError>(((address, block), Arc::new(state)))
            })
            .buffer_unordered(ACCOUNT_FETCH_CONCURRENCY)
            .try_collect()
            .await?;

        let master_id = master.id;
        link_block(&mut master, None, &states);
        for shard in &mut master.shards {
            link_block(shard, Some(master_id), &states);
        }

        debug!(
            "Fetched master block {} with {} shards, {} transactions, {} accounts",
            seq_no,
            master.shards.len(),
            master.transaction_count(),
            states.len()
        );

        Ok(master)
    }

    /// Retrieves and classifies one account state. Retrieval errors fail the
    /// whole block; classification errors leave the state without interfaces.
    async fn fetch_account(&self, address: Address, block: BlockId) -> Result<AccountState, ClientError> {
        let mut state = self.client.get_account_state(&address, &block).await?;

        if let Err(e) = self.accounts.parse_account(&mut state).await {
            warn!("Failed to classify account {} at {}: {}", address, block, e);
            state.clear_parsed_data();
        }

        Ok(state)
    }
}

fn side(tx: &Transaction, block: BlockId) -> MessageSide {
    MessageSide {
        tx_lt: tx.lt,
        tx_hash: tx.hash.clone(),
        workchain: block.workchain,
        shard: block.shard,
        block_seq_no: block.seq_no,
        state: tx.account.clone(),
    }
}

fn link_block(block: &mut Block, master: Option<BlockId>, states: &HashMap<(Address, BlockId), Arc<AccountState>>) {
    let id = block.id;
    if block.master.is_none() {
        block.master = master;
    }

    for tx in &mut block.transactions {
        tx.block = id;
        tx.account = states.get(&(tx.address, id)).cloned();

        let observed = side(tx, id);
        if let Some(msg) = &mut tx.in_msg {
            msg.dst = observed.clone();
        }
        for msg in &mut tx.out_msgs {
            msg.src = observed.clone();
        }
    }
}

struct Worker {
    id: usize,
    fetcher: Arc<Fetcher>,
    counter: Arc<AtomicU32>,
    turn: Arc<watch::Sender<Turn>>,
    results: mpsc::Sender<Block>,
    shutdown: CancellationToken,
}

impl Worker {
    async fn run(self) {
        debug!("Fetch worker {} started", self.id);

        while !self.shutdown.is_cancelled() {
            let seq_no = self.counter.fetch_add(1, Ordering::SeqCst);

            let Some(block) = self.fetch_until_ready(seq_no).await else {
                self.close_from(seq_no);
                break;
            };

            if !self.wait_turn(seq_no).await {
                break;
            }

            if self.results.send(block).await.is_err() {
                info!("Fetch worker {} results channel closed", self.id);
                self.close_from(seq_no);
                break;
            }
            self.turn.send_modify(|t| t.next = seq_no + 1);
        }

        debug!("Fetch worker {} shutting down", self.id);
    }

    /// Retries until the block is available. Gives up only on shutdown.
    async fn fetch_until_ready(&self, seq_no: u32) -> Option<Block> {
        loop {
            match self.fetcher.fetch_block(seq_no).await {
                Ok(block) => return Some(block),
                Err(ClientError::NotReady(_)) => {
                    debug!("Master block {} is not ready yet", seq_no);
                }
                Err(e) => {
                    error!("Fetch worker {} failed on master block {}: {}", self.id, seq_no, e);
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.fetcher.retry_delay) => {}
                _ = self.shutdown.cancelled() => return None,
            }
        }
    }

    /// Returns false when the turnstile was closed before `seq_no`'s turn.
    async fn wait_turn(&self, seq_no: u32) -> bool {
        let mut rx = self.turn.subscribe();
        loop {
            {
                let turn = rx.borrow_and_update();
                if turn.closed_at.is_some_and(|c| c <= seq_no) {
                    return false;
                }
                if turn.next == seq_no {
                    return true;
                }
            }
            if rx.changed().await.is_err() {
                return false;
            }
        }
    }

    fn close_from(&self, seq_no: u32) {
        self.turn.send_modify(|t| {
            t.closed_at = Some(t.closed_at.map_or(seq_no, |c| c.min(seq_no)));
        });
    }
}
