use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::FutureExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::connection::HttpConnection;
use crate::handler::Handler;
use crate::protocol::HttpError;

/// A fixed set of long-lived workers, each serving one connection at a time.
///
/// Every worker owns a single-slot channel it waits on while idle and a busy flag.
/// The flag is raised by [`dispatch`](Self::dispatch) with a compare-exchange before the
/// connection is handed over and lowered by the worker once the connection is closed,
/// so two connections can never be assigned to the same worker.
#[derive(Debug)]
pub struct WorkerPool<S> {
    slots: Vec<WorkerSlot<S>>,
    tasks: Vec<JoinHandle<()>>,
}

#[derive(Debug)]
struct WorkerSlot<S> {
    id: usize,
    busy: Arc<AtomicBool>,
    sender: mpsc::Sender<S>,
}

impl<S> WorkerPool<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    /// Spawns `size` workers serving connections with `handler`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<H>(size: usize, handler: Arc<H>) -> Self
    where
        H: Handler + 'static,
    {
        let mut slots = Vec::with_capacity(size);
        let mut tasks = Vec::with_capacity(size);

        for id in 0..size {
            let (sender, receiver) = mpsc::channel(1);
            let busy = Arc::new(AtomicBool::new(false));

            tasks.push(tokio::spawn(run_worker(id, receiver, Arc::clone(&busy), Arc::clone(&handler))));
            slots.push(WorkerSlot { id, busy, sender });
        }

        info!(workers = size, "started worker pool");
        Self { slots, tasks }
    }

    pub fn size(&self) -> usize {
        self.slots.len()
    }

    /// Number of workers not serving a connection right now.
    pub fn idle(&self) -> usize {
        self.slots.iter().filter(|slot| !slot.busy.load(Ordering::Acquire)).count()
    }

    /// Hands `stream` to the first idle worker, in worker order.
    ///
    /// Returns the worker's id, or gives the stream back when every worker is busy.
    pub fn dispatch(&self, stream: S) -> Result<usize, S> {
        let mut stream = stream;

        for slot in &self.slots {
            if slot.busy.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
                continue;
            }

            match slot.sender.try_send(stream) {
                Ok(()) => return Ok(slot.id),
                Err(TrySendError::Full(returned) | TrySendError::Closed(returned)) => {
                    warn!(worker = slot.id, "idle worker can't take a connection");
                    slot.busy.store(false, Ordering::Release);
                    stream = returned;
                }
            }
        }

        Err(stream)
    }
}

impl<S> Drop for WorkerPool<S> {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

async fn run_worker<S, H>(id: usize, mut receiver: mpsc::Receiver<S>, busy: Arc<AtomicBool>, handler: Arc<H>)
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    H: Handler + 'static,
{
    while let Some(stream) = receiver.recv().await {
        debug!(worker = id, "worker took a connection");

        match AssertUnwindSafe(serve_connection(stream, handler.as_ref())).catch_unwind().await {
            Ok(Ok(())) => debug!(worker = id, "finished process, connection shutdown"),
            Ok(Err(e)) => warn!(worker = id, cause = %e, "connection ended with error"),
            Err(_) => error!(worker = id, "request handler panicked, connection dropped"),
        }

        // the connection is closed by now
        busy.store(false, Ordering::Release);
    }

    debug!(worker = id, "worker stopped");
}

async fn serve_connection<S, H>(stream: S, handler: &H) -> Result<(), HttpError>
where
    S: AsyncRead + AsyncWrite + Send + Unpin,
    H: Handler,
{
    let (reader, writer) = tokio::io::split(stream);
    HttpConnection::new(reader, writer).process(handler).await
}
