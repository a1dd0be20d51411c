//! Background lookups, key listeners, and cancellation.
//!
//! The overlay client is blocking per operation, so background work runs
//! on real threads: one-shot jobs go through a bounded worker pool (a
//! tokio runtime used purely as that pool, `max_blocking_threads` being
//! the concurrency bound), and each key subscription gets its own
//! detached thread.
//!
//! Every operation carries a [`CancelToken`]. The flag is checked before
//! each DHT call; cancelling after a call has begun does not abort it, it
//! only suppresses the callback. Callbacks fire exactly once for one-shot
//! operations (`Some` on success, `None` on cancellation) and are never
//! invoked synchronously on the caller's thread (UI event loops deadlock
//! on reentrant callbacks).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::debug;

use sigil_core::error::SigilError;
use sigil_core::record::IdentityRecord;
use sigil_core::types::{unix_now, Fingerprint};
use sigil_dht::overlay::Overlay;

use crate::context::Context;
use crate::keyserver::fetch_identity;

// ── CancelToken ──────────────────────────────────────────────────────────────

/// Cooperative cancellation flag shared between a caller and its worker.
/// Cloning shares the flag. Double-cancel and cancel-after-completion are
/// no-ops.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Sleep up to `total`, waking early on cancellation. Returns true if the
/// token was cancelled.
fn wait_cancellable(token: &CancelToken, total: Duration) -> bool {
    const SLICE: Duration = Duration::from_millis(100);
    let mut remaining = total;
    while !remaining.is_zero() {
        if token.is_cancelled() {
            return true;
        }
        let step = remaining.min(SLICE);
        std::thread::sleep(step);
        remaining -= step;
    }
    token.is_cancelled()
}

// ── Dispatcher ───────────────────────────────────────────────────────────────

type Job = Box<dyn FnOnce() + Send + 'static>;

/// The bounded worker pool plus the registry of active listeners.
pub struct Dispatcher {
    pool: Mutex<Option<tokio::runtime::Runtime>>,
    listeners: Mutex<Vec<CancelToken>>,
}

impl Dispatcher {
    pub(crate) fn new(max_workers: usize) -> Result<Self, SigilError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(max_workers.max(1))
            .thread_name("sigil-worker")
            .build()
            .map_err(|e| SigilError::Storage(format!("building worker pool: {e}")))?;
        Ok(Self {
            pool: Mutex::new(Some(runtime)),
            listeners: Mutex::new(Vec::new()),
        })
    }

    /// Run `job` on the pool. After close, the job is handed back so the
    /// caller can still honour its callback contract.
    pub fn submit(&self, job: Job) -> Result<(), Job> {
        let pool = self.pool.lock().expect("dispatcher lock poisoned");
        match pool.as_ref() {
            Some(runtime) => {
                runtime.spawn_blocking(job);
                Ok(())
            }
            None => Err(job),
        }
    }

    fn track_listener(&self, token: CancelToken) {
        let mut listeners = self.listeners.lock().expect("dispatcher lock poisoned");
        listeners.retain(|t| !t.is_cancelled());
        listeners.push(token);
    }

    /// Cancel all listeners and stop accepting jobs. Running jobs finish
    /// on their own; their token checks suppress any further callbacks.
    pub fn close(&self) {
        for token in self.listeners.lock().expect("dispatcher lock poisoned").drain(..) {
            token.cancel();
        }
        if let Some(runtime) = self.pool.lock().expect("dispatcher lock poisoned").take() {
            runtime.shutdown_background();
        }
    }
}

// ── One-shot async operations ────────────────────────────────────────────────

/// Run the reverse-lookup algorithm on a worker and deliver the display
/// string through `callback`, exactly once: `Some(display)` normally,
/// `None` if cancelled first. Returns the operation's cancel token.
pub fn reverse_lookup_async<O, F>(
    ctx: &Arc<Context<O>>,
    fingerprint: Fingerprint,
    callback: F,
) -> CancelToken
where
    O: Overlay + 'static,
    F: FnOnce(Option<String>) + Send + 'static,
{
    let token = CancelToken::new();
    let job_token = token.clone();
    let job_ctx = Arc::clone(ctx);
    let job: Job = Box::new(move || {
        if job_token.is_cancelled() {
            callback(None);
            return;
        }
        let display = match fetch_identity(&job_ctx, &fingerprint, false) {
            Ok(record) => record.display_name(unix_now()),
            Err(_) => fingerprint.short(),
        };
        if job_token.is_cancelled() {
            callback(None);
        } else {
            callback(Some(display));
        }
    });

    if let Err(job) = ctx.dispatcher().submit(job) {
        // Dispatcher closed: deliver the negative result off-thread; the
        // cancelled token makes the job skip its DHT work.
        token.cancel();
        std::thread::spawn(job);
    }
    token
}

/// Resolve display names for a whole contact list through the bounded
/// pool. `callback` runs once per fingerprint, from worker threads, in no
/// particular order across contacts.
pub fn reverse_lookup_bulk<O, F>(
    ctx: &Arc<Context<O>>,
    fingerprints: Vec<Fingerprint>,
    callback: F,
) -> CancelToken
where
    O: Overlay + 'static,
    F: Fn(Fingerprint, Option<String>) + Send + Sync + 'static,
{
    let token = CancelToken::new();
    let callback = Arc::new(callback);

    for fingerprint in fingerprints {
        let job_token = token.clone();
        let job_ctx = Arc::clone(ctx);
        let job_callback = Arc::clone(&callback);
        let job: Job = Box::new(move || {
            if job_token.is_cancelled() {
                job_callback(fingerprint, None);
                return;
            }
            let display = match fetch_identity(&job_ctx, &fingerprint, false) {
                Ok(record) => record.display_name(unix_now()),
                Err(_) => fingerprint.short(),
            };
            if job_token.is_cancelled() {
                job_callback(fingerprint, None);
            } else {
                job_callback(fingerprint, Some(display));
            }
        });
        if let Err(job) = ctx.dispatcher().submit(job) {
            token.cancel();
            std::thread::spawn(job);
        }
    }
    token
}

// ── Key listeners ────────────────────────────────────────────────────────────

/// Subscribe to updates of one identity key.
///
/// A dedicated worker thread polls the key and invokes `callback` with
/// `Some(record)` whenever a newer verified record appears (including the
/// first observation), in arrival order for this listener; no ordering
/// holds across distinct listeners. On cancellation the callback fires
/// one final time with `None` and the thread exits at the next
/// operation boundary.
pub fn listen_identity<O, F>(
    ctx: &Arc<Context<O>>,
    fingerprint: Fingerprint,
    callback: F,
) -> CancelToken
where
    O: Overlay + 'static,
    F: Fn(Option<IdentityRecord>) + Send + 'static,
{
    let token = CancelToken::new();
    spawn_listener(ctx, fingerprint, token.clone(), callback);
    token
}

/// Subscribe to every identity in a contact list at once, sharing one
/// cancel token. Each subscription runs its own worker; `callback` is
/// invoked with the fingerprint alongside each delivery and, on
/// cancellation, once per contact with `None`.
pub fn listen_all_contacts<O, F>(
    ctx: &Arc<Context<O>>,
    fingerprints: Vec<Fingerprint>,
    callback: F,
) -> CancelToken
where
    O: Overlay + 'static,
    F: Fn(Fingerprint, Option<IdentityRecord>) + Send + Sync + 'static,
{
    let token = CancelToken::new();
    let callback = Arc::new(callback);
    for fingerprint in fingerprints {
        let per_contact = Arc::clone(&callback);
        spawn_listener(ctx, fingerprint, token.clone(), move |record| {
            per_contact(fingerprint, record)
        });
    }
    token
}

fn spawn_listener<O, F>(ctx: &Arc<Context<O>>, fingerprint: Fingerprint, token: CancelToken, callback: F)
where
    O: Overlay + 'static,
    F: Fn(Option<IdentityRecord>) + Send + 'static,
{
    let thread_ctx = Arc::clone(ctx);
    let poll = Duration::from_secs(ctx.config().listener_poll_secs);

    ctx.dispatcher().track_listener(token.clone());
    std::thread::spawn(move || {
        let mut last_seen: Option<u64> = None;
        loop {
            if token.is_cancelled() {
                break;
            }
            match fetch_identity(&thread_ctx, &fingerprint, true) {
                Ok(record) => {
                    if last_seen.map(|t| record.timestamp > t).unwrap_or(true) {
                        last_seen = Some(record.timestamp);
                        if token.is_cancelled() {
                            break;
                        }
                        callback(Some(record));
                    }
                }
                Err(e) => {
                    debug!(fingerprint = %fingerprint, error = %e, "listener poll failed");
                }
            }
            if wait_cancellable(&token, poll) {
                break;
            }
        }
        callback(None);
    });
}
