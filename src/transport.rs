use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};

use crate::dispatch::task::{Rank, ResultEntry};
use crate::error::{HeatshedError, Result};
use crate::thermal::{NodeId, TemperatureSample, ThrottleEvent};

const CHANNEL_CAPACITY: usize = 16;

/// Messages exchanged between ranks. Each worker sends exactly one `Hello`
/// at startup and one `PartialResult` at completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Message {
    /// Startup check-in: which rank is alive, on which node and host.
    Hello {
        rank: Rank,
        node: NodeId,
        processor: String,
    },
    /// A worker's completed slice plus its thermal record.
    PartialResult {
        worker: Rank,
        node: NodeId,
        entries: Vec<ResultEntry>,
        samples: Vec<TemperatureSample>,
        events: Vec<ThrottleEvent>,
    },
}

impl Message {
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Hello { .. } => "hello",
            Message::PartialResult { .. } => "partial-result",
        }
    }
}

/// Point-to-point messaging between ranks.
///
/// Delivery is FIFO per sender/receiver pair; no global ordering is assumed.
/// `recv` takes messages from one source only and waits until one arrives.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Number of ranks in the group.
    fn process_count(&self) -> u32;

    /// This endpoint's rank, `0..process_count`. Rank 0 coordinates.
    fn rank(&self) -> Rank;

    /// Host identifier for check-in reporting.
    fn processor_name(&self) -> &str;

    async fn send(&self, dest: Rank, message: Message) -> Result<()>;

    async fn recv(&self, src: Rank) -> Result<Message>;
}

/// In-process transport: a full mesh of bounded channels, one per ordered
/// rank pair, so per-pair FIFO holds by construction.
pub struct LocalEndpoint {
    rank: Rank,
    processes: u32,
    processor: String,
    /// Indexed by destination rank.
    outboxes: Vec<mpsc::Sender<Message>>,
    /// Indexed by source rank.
    inboxes: Vec<Mutex<mpsc::Receiver<Message>>>,
}

pub struct LocalCluster;

impl LocalCluster {
    /// Build endpoints for `processes` ranks wired into a full mesh.
    pub fn endpoints(processes: u32) -> Vec<LocalEndpoint> {
        let p = processes as usize;
        let mut outboxes: Vec<Vec<mpsc::Sender<Message>>> =
            (0..p).map(|_| Vec::with_capacity(p)).collect();
        let mut inboxes: Vec<Vec<Mutex<mpsc::Receiver<Message>>>> =
            (0..p).map(|_| Vec::with_capacity(p)).collect();

        // Outer loop ascending over sources keeps inboxes[dest] indexed by
        // source rank.
        for src_outboxes in outboxes.iter_mut() {
            for dest_inboxes in inboxes.iter_mut() {
                let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
                src_outboxes.push(tx);
                dest_inboxes.push(Mutex::new(rx));
            }
        }

        outboxes
            .into_iter()
            .zip(inboxes)
            .enumerate()
            .map(|(rank, (outboxes, inboxes))| LocalEndpoint {
                rank: rank as Rank,
                processes,
                processor: format!("local-{rank}"),
                outboxes,
                inboxes,
            })
            .collect()
    }
}

#[async_trait]
impl Transport for LocalEndpoint {
    fn process_count(&self) -> u32 {
        self.processes
    }

    fn rank(&self) -> Rank {
        self.rank
    }

    fn processor_name(&self) -> &str {
        &self.processor
    }

    async fn send(&self, dest: Rank, message: Message) -> Result<()> {
        let outbox = self
            .outboxes
            .get(dest as usize)
            .ok_or_else(|| HeatshedError::InvalidArgument(format!("no such rank: {dest}")))?;
        outbox
            .send(message)
            .await
            .map_err(|_| HeatshedError::TransportClosed(dest))
    }

    async fn recv(&self, src: Rank) -> Result<Message> {
        let inbox = self
            .inboxes
            .get(src as usize)
            .ok_or_else(|| HeatshedError::InvalidArgument(format!("no such rank: {src}")))?;
        let mut inbox = inbox.lock().await;
        inbox.recv().await.ok_or(HeatshedError::TransportClosed(src))
    }
}
