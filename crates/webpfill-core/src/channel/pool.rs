//! Execution contexts and the pool that leases them.
//!
//! An execution context is a named worker thread with its own inbox. It shares
//! nothing with its creator: requests arrive as owned [`EncodeRequest`]
//! messages and results leave through a per-request reply channel.
//!
//! ```text
//!   ContextPool::acquire() ──► Lease ──► post(job) ──► worker thread
//!          ▲                                               │
//!          └──────── Lease::release() ◄── reply ◄──────────┘
//! ```
//!
//! A released context is kept idle for reuse if the [`PoolPolicy`] allows it,
//! otherwise it is torn down: its inbox is closed and the thread exits.

use super::{EncodeRequest, WorkerReply};
use crate::codec::{ChannelCount, CodecFactory};
use crate::config::PoolPolicy;
use crate::error::ExportError;
use crate::media::EncodedBlob;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

/// Thread name prefix for execution contexts.
const CONTEXT_THREAD_PREFIX: &str = "webpfill-ctx";

/// One request plus the channel its reply goes to.
pub(crate) struct Job {
    pub(crate) request: EncodeRequest,
    pub(crate) reply: Sender<WorkerReply>,
}

/// A running execution context.
pub struct ExecutionContext {
    id: usize,
    inbox: Sender<Job>,
}

impl ExecutionContext {
    fn spawn(id: usize, factory: CodecFactory) -> Result<Self, ExportError> {
        let (inbox, jobs) = mpsc::channel();

        thread::Builder::new()
            .name(format!("{}-{}", CONTEXT_THREAD_PREFIX, id))
            .spawn(move || run_context(id, jobs, factory))
            .map_err(|e| ExportError::Spawn(e.to_string()))?;

        log::debug!("execution context {} started", id);
        Ok(Self { id, inbox })
    }

    /// Identifier, unique within the owning pool.
    pub fn id(&self) -> usize {
        self.id
    }

    pub(crate) fn post(&self, job: Job) -> Result<(), ExportError> {
        self.inbox.send(job).map_err(|_| ExportError::Disconnected)
    }
}

fn run_context(id: usize, jobs: Receiver<Job>, factory: CodecFactory) {
    for job in jobs.iter() {
        let reply = encode_request(&factory, &job.request);
        if let Err(ref e) = reply {
            log::debug!("execution context {}: encode failed: {}", id, e);
        }
        if job.reply.send(reply).is_err() {
            log::debug!("execution context {}: requester dropped its handle", id);
        }
    }
    log::debug!("execution context {} stopped", id);
}

fn encode_request(factory: &CodecFactory, request: &EncodeRequest) -> WorkerReply {
    let mut codec = factory()?;
    let channels = ChannelCount::for_alpha(request.alpha_enabled);
    let encoded = codec.encode(
        &request.buffer,
        request.width,
        request.height,
        channels,
        &request.options,
    );
    codec.release();
    Ok(EncodedBlob::webp(encoded?))
}

/// Leases execution contexts to encode calls.
pub struct ContextPool {
    factory: CodecFactory,
    policy: PoolPolicy,
    idle: Mutex<Vec<ExecutionContext>>,
    next_id: AtomicUsize,
}

impl ContextPool {
    pub fn new(factory: CodecFactory, policy: PoolPolicy) -> Arc<Self> {
        Arc::new(Self {
            factory,
            policy,
            idle: Mutex::new(Vec::new()),
            next_id: AtomicUsize::new(0),
        })
    }

    /// Lease an idle context, or start a new one.
    pub fn acquire(self: &Arc<Self>) -> Result<Lease, ExportError> {
        let reused = self.idle_contexts().pop();
        let context = match reused {
            Some(context) => {
                log::debug!("reusing execution context {}", context.id);
                context
            }
            None => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                ExecutionContext::spawn(id, Arc::clone(&self.factory))?
            }
        };

        Ok(Lease {
            context: Some(context),
            pool: Arc::clone(self),
        })
    }

    /// Number of contexts waiting for reuse.
    pub fn idle_count(&self) -> usize {
        self.idle_contexts().len()
    }

    /// Number of contexts started over the pool's lifetime.
    pub fn spawned_count(&self) -> usize {
        self.next_id.load(Ordering::Relaxed)
    }

    /// The reuse policy.
    pub fn policy(&self) -> PoolPolicy {
        self.policy
    }

    fn give_back(&self, context: ExecutionContext) {
        let mut idle = self.idle_contexts();
        if idle.len() < self.policy.max_idle() {
            log::debug!("execution context {} returned to pool", context.id);
            idle.push(context);
        } else {
            log::debug!("execution context {} torn down", context.id);
        }
    }

    fn idle_contexts(&self) -> MutexGuard<'_, Vec<ExecutionContext>> {
        // A poisoned list only ever holds fully constructed contexts.
        self.idle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Exclusive use of one execution context.
///
/// Call [`Lease::release`] once the context has replied. Dropping a lease
/// without releasing it tears the context down, which is what happens after a
/// timeout: a context that may still be busy is never handed to another call.
pub struct Lease {
    context: Option<ExecutionContext>,
    pool: Arc<ContextPool>,
}

impl Lease {
    /// The leased context.
    pub fn context(&self) -> Option<&ExecutionContext> {
        self.context.as_ref()
    }

    pub(crate) fn post(&self, job: Job) -> Result<(), ExportError> {
        match &self.context {
            Some(context) => context.post(job),
            None => Err(ExportError::Disconnected),
        }
    }

    /// Return the context to the pool.
    pub fn release(mut self) {
        if let Some(context) = self.context.take() {
            self.pool.give_back(context);
        }
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if let Some(context) = self.context.take() {
            log::debug!("execution context {} discarded", context.id);
        }
    }
}
