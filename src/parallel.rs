//! Worker pool (spec §5/§6): bounds how many entries' codec work can be in
//! flight at once, and provides the off-thread dispatch path that stands in
//! for the reference implementation's worker-script pool.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::{Config, WorkerDispatch};
use crate::error::{Result, ZipError};
use crate::io_traits::{Codec, FlushResult};

/// Bounds concurrently in-flight entries to `max_workers` (spec §5 "Worker
/// pool"). A held [`OwnedSemaphorePermit`] is the admission ticket; dropping
/// it (including on panic or cancellation) returns the slot.
#[derive(Clone)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
}

impl WorkerPool {
    pub fn new(max_workers: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_workers.max(1))),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.max_workers)
    }

    /// Wait for a free slot. Held for the lifetime of one entry's
    /// extraction/emission.
    pub async fn acquire(&self) -> OwnedSemaphorePermit {
        Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .expect("worker pool semaphore is never closed")
    }

    /// Run CPU-bound `work` off the calling task, still bounded by this
    /// pool's capacity. Used when [`Config::dispatch_for`] resolves to
    /// [`WorkerDispatch::OffThread`] (spec §6 "off-thread worker codec").
    pub async fn run_off_thread<F, T>(&self, dispatch: WorkerDispatch, work: F) -> Result<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = self.acquire().await;
        match dispatch {
            WorkerDispatch::InProcess => Ok(work()),
            WorkerDispatch::OffThread => {
                let result = tokio::task::spawn_blocking(move || {
                    let _permit = permit;
                    work()
                })
                .await
                .map_err(|_| ZipError::BadFormat("worker task panicked".into()))?;
                Ok(result)
            }
        }
    }
}

/// Off-thread [`Codec`] adaptor: every `append`/`flush` call is moved onto a
/// `spawn_blocking` thread before running. Stands in for the reference
/// implementation's worker-script dispatch (spec §6 "a base in-process codec
/// and an off-thread worker codec") — the inner codec itself is unaware it
/// is being run this way.
///
/// Codec methods never actually `.await` anything (the underlying
/// (de)compression/crypto work is synchronous CPU work dressed up to satisfy
/// the `Codec` trait's async signature), so driving them to completion with
/// `Handle::block_on` from inside the blocking thread is safe: there is no
/// inner suspension point to deadlock on.
pub struct WorkerCodec {
    inner: Option<Box<dyn Codec>>,
    handle: tokio::runtime::Handle,
}

impl WorkerCodec {
    pub fn new(inner: Box<dyn Codec>) -> Self {
        Self {
            inner: Some(inner),
            handle: tokio::runtime::Handle::current(),
        }
    }

    async fn run_blocking<T, F>(&mut self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Box<dyn Codec>, &tokio::runtime::Handle) -> Result<T> + Send + 'static,
    {
        let mut inner = self
            .inner
            .take()
            .expect("WorkerCodec driven after completion");
        let handle = self.handle.clone();
        let (inner, result) = tokio::task::spawn_blocking(move || {
            let result = f(&mut inner, &handle);
            (inner, result)
        })
        .await
        .map_err(|_| ZipError::BadFormat("worker codec task panicked".into()))?;
        self.inner = Some(inner);
        result
    }
}

#[async_trait::async_trait]
impl Codec for WorkerCodec {
    async fn append(&mut self, bytes: &[u8]) -> Result<Vec<u8>> {
        let owned = bytes.to_vec();
        self.run_blocking(move |codec, handle| handle.block_on(codec.append(&owned)))
            .await
    }

    async fn flush(&mut self) -> Result<FlushResult> {
        self.run_blocking(|codec, handle| handle.block_on(codec.flush()))
            .await
    }
}
