//! Fixed-size worker pools over bounded queues
//!
//! Discovery pushes into a bounded queue and waits while it is full. Each
//! worker reads with a timeout; an expired read only logs idleness and reads
//! again. Every job runs in its own task so a panic is logged and the worker
//! carries on. On cancellation a worker finishes its current job and stops
//! reading; jobs still queued are rediscovered by a later run.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Result of one timed queue read
#[derive(Debug, PartialEq, Eq)]
pub enum QueueRead<T> {
    Item(T),
    /// Nothing arrived within the timeout
    Idle,
    /// Every sender is gone and the queue is drained
    Closed,
}

/// Receiving side shared by all workers of a pool
pub struct QueueReader<T> {
    rx: Arc<Mutex<mpsc::Receiver<T>>>,
}

impl<T> Clone for QueueReader<T> {
    fn clone(&self) -> Self {
        Self {
            rx: Arc::clone(&self.rx),
        }
    }
}

impl<T: Send> QueueReader<T> {
    pub async fn read(&self, timeout: Duration) -> QueueRead<T> {
        let next = tokio::time::timeout(timeout, async {
            let mut rx = self.rx.lock().await;
            rx.recv().await
        })
        .await;

        match next {
            Ok(Some(item)) => QueueRead::Item(item),
            Ok(None) => QueueRead::Closed,
            Err(_) => QueueRead::Idle,
        }
    }
}

/// Bounded queue: the sender blocks while `capacity` items wait
pub fn work_queue<T>(capacity: usize) -> (mpsc::Sender<T>, QueueReader<T>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        tx,
        QueueReader {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

#[async_trait]
pub trait JobHandler<T>: Send + Sync + 'static {
    async fn handle(&self, job: T);
}

pub struct WorkerPool {
    name: &'static str,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn spawn<T, H>(
        name: &'static str,
        size: usize,
        reader: QueueReader<T>,
        handler: Arc<H>,
        read_timeout: Duration,
        cancel: CancellationToken,
    ) -> Self
    where
        T: Send + 'static,
        H: JobHandler<T>,
    {
        let handles = (0..size.max(1))
            .map(|id| {
                let reader = reader.clone();
                let handler = Arc::clone(&handler);
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    worker_loop(name, id, reader, handler, read_timeout, cancel).await;
                })
            })
            .collect::<Vec<_>>();

        info!("{} pool started with {} workers", name, handles.len());
        Self { name, handles }
    }

    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Wait until every worker has stopped
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!("{} worker ended abnormally: {}", self.name, e);
            }
        }
        info!("{} pool stopped", self.name);
    }
}

async fn worker_loop<T, H>(
    name: &'static str,
    id: usize,
    reader: QueueReader<T>,
    handler: Arc<H>,
    read_timeout: Duration,
    cancel: CancellationToken,
) where
    T: Send + 'static,
    H: JobHandler<T>,
{
    loop {
        if cancel.is_cancelled() {
            debug!("{}-{} stopping", name, id);
            break;
        }

        let job = tokio::select! {
            _ = cancel.cancelled() => break,
            read = reader.read(read_timeout) => match read {
                QueueRead::Item(job) => job,
                QueueRead::Idle => {
                    debug!("{}-{} idle", name, id);
                    continue;
                }
                QueueRead::Closed => break,
            },
        };

        let handler = Arc::clone(&handler);
        let task = tokio::spawn(async move { handler.handle(job).await });
        if let Err(e) = task.await {
            error!("{}-{} job aborted: {}", name, id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_read_reports_idle_then_item_then_closed() {
        let (tx, reader) = work_queue::<u32>(4);

        assert_eq!(reader.read(Duration::from_millis(10)).await, QueueRead::Idle);

        tx.send(7).await.unwrap();
        assert_eq!(reader.read(Duration::from_millis(10)).await, QueueRead::Item(7));

        drop(tx);
        assert_eq!(reader.read(Duration::from_millis(10)).await, QueueRead::Closed);
    }

    struct Counter {
        seen: AtomicUsize,
    }

    #[async_trait]
    impl JobHandler<u32> for Counter {
        async fn handle(&self, job: u32) {
            if job == 13 {
                panic!("unlucky job");
            }
            self.seen.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_pool_survives_panicking_job() {
        let (tx, reader) = work_queue::<u32>(8);
        let handler = Arc::new(Counter {
            seen: AtomicUsize::new(0),
        });
        let pool = WorkerPool::spawn(
            "test",
            2,
            reader,
            Arc::clone(&handler),
            Duration::from_millis(20),
            CancellationToken::new(),
        );

        for job in [1, 13, 2, 3] {
            tx.send(job).await.unwrap();
        }
        drop(tx);
        pool.join().await;

        assert_eq!(handler.seen.load(Ordering::SeqCst), 3);
    }

    struct Slow {
        started: AtomicUsize,
        finished: AtomicUsize,
    }

    #[async_trait]
    impl JobHandler<u32> for Slow {
        async fn handle(&self, _job: u32) {
            self.started.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(300)).await;
            self.finished.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_cancel_finishes_current_job_and_stops_reading() {
        let (tx, reader) = work_queue::<u32>(4);
        let leftover = reader.clone();
        let handler = Arc::new(Slow {
            started: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
        });
        let cancel = CancellationToken::new();
        let pool = WorkerPool::spawn(
            "test",
            1,
            reader,
            Arc::clone(&handler),
            Duration::from_millis(20),
            cancel.clone(),
        );

        tx.send(1).await.unwrap();
        tx.send(2).await.unwrap();

        while handler.started.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        cancel.cancel();
        pool.join().await;

        assert_eq!(handler.started.load(Ordering::SeqCst), 1);
        assert_eq!(handler.finished.load(Ordering::SeqCst), 1);
        // The second job was never taken off the queue
        assert_eq!(leftover.read(Duration::from_millis(10)).await, QueueRead::Item(2));
    }
}
