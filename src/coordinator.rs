//! ==============================================================================
//! coordinator.rs - single-writer access to the sensor logs
//! ==============================================================================
//!
//! purpose:
//!     every read and every write of a sensor log goes through one worker
//!     thread, one request at a time. a reader can never see a file halfway
//!     through an append, and two batches for the same sensor never
//!     interleave.
//!
//! architecture:
//!
//!     ┌──────────────┐  ┌──────────────┐  ┌──────────────┐
//!     │ http handler │  │ http handler │  │ http handler │   (many tasks)
//!     └──────┬───────┘  └──────┬───────┘  └──────┬───────┘
//!            │ Request + oneshot reply           │
//!            └─────────────────┼─────────────────┘
//!                              ▼
//!                  ┌───────────────────────┐
//!                  │  bounded mpsc (FIFO)  │   reads and writes share it
//!                  └───────────┬───────────┘
//!                              ▼
//!                  ┌───────────────────────┐
//!                  │ log-coordinator thread│   owns the LogStore
//!                  └───────────┬───────────┘
//!                              ▼
//!                       data_dir + sensor_id
//!
//!     reads and writes ride the same queue, so they are served strictly in
//!     arrival order and neither kind can starve the other. all sensors share
//!     the one worker; a slow disk slows everyone.
//!
//! relationships:
//!     - used by: server.rs (handlers hold a cloned Coordinator)
//!     - used by: main.rs (spawn at startup, join on shutdown)
//!     - uses: store.rs (the only caller of LogStore)
//!
//! ==============================================================================

use std::io;
use std::thread::{self, JoinHandle};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use crate::domain::ReadingBatch;
use crate::error::{StoreError, SubmitError, SubmitResult};
use crate::store::LogStore;

/// Default bound on queued requests before submitters wait.
pub const DEFAULT_QUEUE_DEPTH: usize = 1024;

/// A unit of work for the storage worker, with the caller's reply slot.
#[derive(Debug)]
enum Request {
    Read {
        sensor_id: u32,
        reply: oneshot::Sender<Result<ReadingBatch, StoreError>>,
    },
    Write {
        batch: ReadingBatch,
        reply: oneshot::Sender<Result<(), StoreError>>,
    },
}

/// Counters reported by the worker when it exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub reads: u64,
    pub writes: u64,
    pub failures: u64,
}

/// Handle for submitting storage requests.
///
/// Cheap to clone; every clone feeds the same worker. The worker exits once
/// all handles are dropped and the queue is drained.
#[derive(Clone, Debug)]
pub struct Coordinator {
    tx: mpsc::Sender<Request>,
}

/// The running worker thread.
pub struct CoordinatorWorker {
    handle: JoinHandle<WorkerStats>,
}

impl Coordinator {
    /// Start the worker thread, handing it sole ownership of `store`.
    pub fn spawn(store: LogStore, queue_depth: usize) -> io::Result<(Coordinator, CoordinatorWorker)> {
        let (tx, rx) = mpsc::channel(queue_depth.max(1));
        let handle = thread::Builder::new()
            .name("log-coordinator".to_string())
            .spawn(move || run(store, rx))?;

        Ok((Coordinator { tx }, CoordinatorWorker { handle }))
    }

    /// Read a sensor's full history, sorted by timestamp.
    ///
    /// Waits until the worker has scanned the log. A sensor that was never
    /// written yields an empty batch.
    pub async fn submit_read(&self, sensor_id: u32) -> SubmitResult<ReadingBatch> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Request::Read { sensor_id, reply })
            .await
            .map_err(|_| SubmitError::Stopped)?;

        rx.await
            .map_err(|_| SubmitError::Stopped)?
            .map_err(SubmitError::Read)
    }

    /// Append a batch to its sensor's log.
    ///
    /// Waits until the lines are flushed. Batches are applied whole and in
    /// the order they were submitted.
    pub async fn submit_write(&self, batch: ReadingBatch) -> SubmitResult<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Request::Write { batch, reply })
            .await
            .map_err(|_| SubmitError::Stopped)?;

        rx.await
            .map_err(|_| SubmitError::Stopped)?
            .map_err(SubmitError::Write)
    }
}

impl CoordinatorWorker {
    /// Block until the worker exits. Returns Err if it panicked.
    pub fn join(self) -> thread::Result<WorkerStats> {
        self.handle.join()
    }
}

fn run(store: LogStore, mut rx: mpsc::Receiver<Request>) -> WorkerStats {
    info!(data_dir = %store.data_dir().display(), "storage worker started");
    let mut stats = WorkerStats::default();

    // one request at a time, to completion, in arrival order
    while let Some(request) = rx.blocking_recv() {
        match request {
            Request::Read { sensor_id, reply } => {
                stats.reads += 1;
                let result = store
                    .read_all(sensor_id)
                    .map(|readings| ReadingBatch::new(sensor_id, readings));
                if let Err(e) = &result {
                    stats.failures += 1;
                    error!(sensor_id, error = %e, "read failed");
                }
                if reply.send(result).is_err() {
                    debug!(sensor_id, "reader went away before reply");
                }
            }
            Request::Write { batch, reply } => {
                stats.writes += 1;
                let sensor_id = batch.sensor_id;
                let result = store.append(sensor_id, &batch.readings);
                if let Err(e) = &result {
                    stats.failures += 1;
                    error!(sensor_id, error = %e, "write failed");
                }
                if reply.send(result).is_err() {
                    debug!(sensor_id, "writer went away before reply");
                }
            }
        }
    }

    info!(
        reads = stats.reads,
        writes = stats.writes,
        failures = stats.failures,
        "storage worker stopped"
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Reading;
    use std::collections::HashSet;
    use std::path::Path;
    use tempfile::tempdir;

    fn spawn_in(dir: &Path) -> (Coordinator, CoordinatorWorker) {
        let store = LogStore::new(format!("{}/", dir.display()));
        Coordinator::spawn(store, 16).unwrap()
    }

    #[tokio::test]
    async fn later_write_with_earlier_timestamp_reads_first() {
        let dir = tempdir().unwrap();
        let (coordinator, _worker) = spawn_in(dir.path());

        coordinator
            .submit_write(ReadingBatch::new(1, vec![Reading::new("2024-01-02", 5.0)]))
            .await
            .unwrap();
        coordinator
            .submit_write(ReadingBatch::new(1, vec![Reading::new("2024-01-01", 3.0)]))
            .await
            .unwrap();

        let batch = coordinator.submit_read(1).await.unwrap();
        assert_eq!(
            batch,
            ReadingBatch::new(
                1,
                vec![Reading::new("2024-01-01", 3.0), Reading::new("2024-01-02", 5.0)]
            )
        );
    }

    #[tokio::test]
    async fn fresh_sensor_reads_empty_batch() {
        let dir = tempdir().unwrap();
        let (coordinator, _worker) = spawn_in(dir.path());

        let batch = coordinator.submit_read(42).await.unwrap();
        assert_eq!(batch, ReadingBatch::empty(42));
    }

    #[tokio::test]
    async fn consecutive_reads_are_identical() {
        let dir = tempdir().unwrap();
        let (coordinator, _worker) = spawn_in(dir.path());

        coordinator
            .submit_write(ReadingBatch::new(
                3,
                vec![Reading::new("b", 2.0), Reading::new("a", 1.0), Reading::new("b", 0.5)],
            ))
            .await
            .unwrap();

        let first = coordinator.submit_read(3).await.unwrap();
        let second = coordinator.submit_read(3).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writes_are_neither_lost_nor_torn() {
        let dir = tempdir().unwrap();
        let (coordinator, _worker) = spawn_in(dir.path());
        const WRITERS: usize = 200;

        let mut tasks = Vec::new();
        for i in 0..WRITERS {
            let coordinator = coordinator.clone();
            tasks.push(tokio::spawn(async move {
                let reading = Reading::new(format!("2024-01-01T00:00:{:05}", i), i as f64);
                coordinator.submit_write(ReadingBatch::new(7, vec![reading])).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let batch = coordinator.submit_read(7).await.unwrap();
        assert_eq!(batch.readings.len(), WRITERS);

        let values: HashSet<u64> = batch.readings.iter().map(|r| r.value as u64).collect();
        assert_eq!(values.len(), WRITERS);

        let mut sorted = batch.readings.clone();
        sorted.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        assert_eq!(sorted, batch.readings);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn readers_only_ever_see_whole_batches() {
        let dir = tempdir().unwrap();
        let (coordinator, _worker) = spawn_in(dir.path());
        const BATCH: usize = 25;

        let writer = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                for round in 0..20 {
                    let readings = (0..BATCH)
                        .map(|i| Reading::new(format!("{:03}-{:03}", round, i), 1.0))
                        .collect();
                    coordinator
                        .submit_write(ReadingBatch::new(2, readings))
                        .await
                        .unwrap();
                }
            })
        };

        let mut readers = Vec::new();
        for _ in 0..8 {
            let coordinator = coordinator.clone();
            readers.push(tokio::spawn(async move {
                for _ in 0..20 {
                    let batch = coordinator.submit_read(2).await.unwrap();
                    assert_eq!(batch.readings.len() % BATCH, 0);
                }
            }));
        }

        writer.await.unwrap();
        for reader in readers {
            reader.await.unwrap();
        }
        assert_eq!(coordinator.submit_read(2).await.unwrap().readings.len(), 20 * BATCH);
    }

    #[tokio::test]
    async fn worker_keeps_serving_after_a_failed_write() {
        let dir = tempdir().unwrap();
        let store = LogStore::new(dir.path().join("missing").join("s"));
        let (coordinator, _worker) = Coordinator::spawn(store, 4).unwrap();

        let err = coordinator
            .submit_write(ReadingBatch::new(1, vec![Reading::new("t", 1.0)]))
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::Write(StoreError::Open { .. })));

        let batch = coordinator.submit_read(1).await.unwrap();
        assert!(batch.readings.is_empty());
    }

    #[tokio::test]
    async fn worker_exits_when_last_handle_drops() {
        let dir = tempdir().unwrap();
        let (coordinator, worker) = spawn_in(dir.path());

        coordinator
            .submit_write(ReadingBatch::new(1, vec![Reading::new("t", 1.0)]))
            .await
            .unwrap();
        coordinator.submit_read(1).await.unwrap();
        drop(coordinator);

        let stats = tokio::task::spawn_blocking(move || worker.join())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            stats,
            WorkerStats {
                reads: 1,
                writes: 1,
                failures: 0
            }
        );
    }
}
