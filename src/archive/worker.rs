//! Offloaded decoder - a dedicated thread owning its own catalog.
//!
//! Requests travel as `{id, request}` envelopes over a crossbeam channel and
//! replies come back as `{id, result}`. A router thread hands each reply to
//! the oneshot registered for its id. When either thread goes away every
//! pending caller sees `WorkerUnavailable`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use async_trait::async_trait;
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, info};

use super::catalog::{IngestReport, ZipCatalog};
use super::decoder::{ArchiveDecoder, DecoderKind};
use crate::error::{Result, ShelfError};

enum WorkerRequest {
    Load { buffer: Arc<[u8]> },
    Content { name: String },
    Reset,
}

enum WorkerPayload {
    Loaded(IngestReport),
    Content(String),
    Reset,
}

struct Envelope {
    id: u64,
    request: WorkerRequest,
}

struct Reply {
    id: u64,
    result: Result<WorkerPayload>,
}

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<WorkerPayload>>>>>;

pub struct WorkerDecoder {
    next_id: AtomicU64,
    requests: Sender<Envelope>,
    pending: Pending,
}

impl WorkerDecoder {
    /// Start the worker and router threads
    pub fn spawn(extension: &str) -> Result<Self> {
        let (request_tx, request_rx) = unbounded::<Envelope>();
        let (reply_tx, reply_rx) = unbounded::<Reply>();
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));

        let extension = extension.to_string();
        thread::Builder::new()
            .name("archive-worker".into())
            .spawn(move || worker_loop(&extension, request_rx, reply_tx))
            .map_err(|e| ShelfError::WorkerUnavailable(format!("spawn worker: {e}")))?;

        let router_pending = Arc::clone(&pending);
        thread::Builder::new()
            .name("archive-router".into())
            .spawn(move || route_replies(reply_rx, router_pending))
            .map_err(|e| ShelfError::WorkerUnavailable(format!("spawn router: {e}")))?;

        info!("Archive worker started");

        Ok(Self {
            next_id: AtomicU64::new(1),
            requests: request_tx,
            pending,
        })
    }

    async fn call(&self, request: WorkerRequest) -> Result<WorkerPayload> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        if self.requests.send(Envelope { id, request }).is_err() {
            self.pending.lock().remove(&id);
            return Err(ShelfError::WorkerUnavailable("worker stopped".into()));
        }

        rx.await
            .unwrap_or_else(|_| Err(ShelfError::WorkerUnavailable(format!("request {id} dropped"))))
    }
}

#[async_trait]
impl ArchiveDecoder for WorkerDecoder {
    fn kind(&self) -> DecoderKind {
        DecoderKind::Offloaded
    }

    async fn load(&self, buffer: Arc<[u8]>) -> Result<IngestReport> {
        match self.call(WorkerRequest::Load { buffer }).await? {
            WorkerPayload::Loaded(report) => Ok(report),
            _ => Err(unexpected_reply("load")),
        }
    }

    async fn content(&self, name: &str) -> Result<String> {
        let request = WorkerRequest::Content {
            name: name.to_string(),
        };
        match self.call(request).await? {
            WorkerPayload::Content(text) => Ok(text),
            _ => Err(unexpected_reply("content")),
        }
    }

    async fn reset(&self) -> Result<()> {
        match self.call(WorkerRequest::Reset).await? {
            WorkerPayload::Reset => Ok(()),
            _ => Err(unexpected_reply("reset")),
        }
    }
}

fn unexpected_reply(call: &str) -> ShelfError {
    ShelfError::WorkerUnavailable(format!("mismatched reply to {call}"))
}

fn worker_loop(extension: &str, requests: Receiver<Envelope>, replies: Sender<Reply>) {
    let mut catalog: Option<ZipCatalog> = None;

    for Envelope { id, request } in requests {
        let result = match request {
            WorkerRequest::Load { buffer } => {
                catalog = None;
                ZipCatalog::open(buffer, extension).map(|(opened, report)| {
                    catalog = Some(opened);
                    WorkerPayload::Loaded(report)
                })
            }
            WorkerRequest::Content { name } => match catalog.as_mut() {
                Some(catalog) => catalog.read(&name).map(WorkerPayload::Content),
                None => Err(ShelfError::NotFound(format!("{name} (no archive loaded)"))),
            },
            WorkerRequest::Reset => {
                catalog = None;
                Ok(WorkerPayload::Reset)
            }
        };

        if replies.send(Reply { id, result }).is_err() {
            break;
        }
    }

    debug!("Archive worker exiting");
}

fn route_replies(replies: Receiver<Reply>, pending: Pending) {
    for Reply { id, result } in replies {
        if let Some(tx) = pending.lock().remove(&id) {
            let _ = tx.send(result);
        }
    }
    // Worker is gone; dropping the senders fails every waiter
    pending.lock().clear();
}
