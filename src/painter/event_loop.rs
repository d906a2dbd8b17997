// src/painter/event_loop.rs
//! Loop - owns the double-buffered canvas and decides when frames are published.
//!
//! Threading model:
//! - One worker thread ("painter-loop") drains the `MessageQueue` in order
//! - Any thread may `post` (queued) or `post_direct` (applied on the caller)
//! - Both paths run apply + publish + swap inside the same buffer lock, so
//!   every frame transition is serialized through one point
//!
//! Shutdown is drain-then-join: `request_stop_and_wait` raises the stop flag,
//! enqueues a no-op behind all pending work to wake an idle worker, and joins
//! it. The worker only exits once the flag is set and the queue is empty.
//!
//! A queued operation that panics is caught on the worker, logged, and
//! reported by `request_stop_and_wait`; the worker keeps draining.
//!
//! Operations and receivers run with the buffers lock held and must not call
//! `post_direct` or `request_stop_and_wait` on the same loop.

use crate::painter::queue::MessageQueue;
use crate::painter::texture::{Size, Texture};
use crate::painter::{Operation, Receiver, Screen};
use log::*;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

/// Lifecycle of a `Loop`. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
    Draining,
    Stopped,
}

/// Errors returned by `Loop` entry points.
#[derive(Debug)]
pub enum LoopError {
    /// `start` was called on a loop that is not idle.
    AlreadyStarted,
    /// Work was submitted, or stop requested, outside `Running`/`Draining`.
    NotRunning(LoopState),
    /// An operation panicked on the worker thread.
    WorkerPanicked,
    /// Texture allocation or thread spawn failed.
    Backend(anyhow::Error),
}

impl std::fmt::Display for LoopError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoopError::AlreadyStarted => write!(f, "loop already started"),
            LoopError::NotRunning(state) => write!(f, "loop is not running (state: {:?})", state),
            LoopError::WorkerPanicked => write!(f, "an operation panicked on the loop worker"),
            LoopError::Backend(e) => write!(f, "backend error: {:#}", e),
        }
    }
}

impl std::error::Error for LoopError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoopError::Backend(e) => Some(AsRef::<dyn std::error::Error>::as_ref(e)),
            _ => None,
        }
    }
}

/// The live texture and the last published one.
struct Buffers {
    next: Texture,
    prev: Texture,
}

impl Buffers {
    /// Swaps roles after a publish. The new `next` starts from the frame the
    /// user is looking at so incremental operations keep accumulating.
    fn swap(&mut self) {
        std::mem::swap(&mut self.next, &mut self.prev);
        self.next.sync_from(&self.prev);
    }
}

struct Shared {
    receiver: Arc<dyn Receiver>,
    buffers: Mutex<Option<Buffers>>,
    queue: MessageQueue<Box<dyn Operation>>,
    stop_requested: AtomicBool,
    /// Set under the buffers lock once the loop is stopped; direct applies
    /// check it under the same lock.
    closed: AtomicBool,
    worker_panicked: AtomicBool,
    state: Mutex<LoopState>,
    frames: AtomicU64,
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, LoopState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_buffers(&self) -> MutexGuard<'_, Option<Buffers>> {
        // A panicking operation poisons the lock; the textures are still whole.
        self.buffers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn apply(&self, op: &dyn Operation) -> bool {
        let mut guard = self.lock_buffers();
        self.apply_locked(&mut guard, op)
    }

    /// Apply, publish if the operation asks for it, swap. Returns whether a
    /// frame was published.
    fn apply_locked(&self, guard: &mut Option<Buffers>, op: &dyn Operation) -> bool {
        let Some(buffers) = guard.as_mut() else {
            warn!("Loop: Operation applied before buffers were allocated");
            return false;
        };

        if !op.apply(&mut buffers.next) {
            return false;
        }

        self.receiver.update(&buffers.next);
        let frame = self.frames.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Loop: Published frame {} ({:?})", frame, buffers.next.id());
        buffers.swap();
        true
    }

    fn run_worker(&self) {
        info!("Loop: Worker started");
        while !self.stop_requested.load(Ordering::SeqCst) || !self.queue.is_empty() {
            let op = self.queue.pull();
            trace!("Loop: Worker applying queued operation");
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| self.apply(&*op))) {
                self.worker_panicked.store(true, Ordering::SeqCst);
                error!(
                    "Loop: Queued operation panicked: {}",
                    panic_message(payload.as_ref())
                );
            }
        }
        info!("Loop: Worker drained queue, exiting");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}

/// Wakes a worker parked on an empty queue during shutdown.
fn wake_signal(_: &mut Texture) -> bool {
    false
}

/// Render loop: applies operations to the live texture and hands finished
/// frames to a `Receiver`.
///
/// All methods take `&self`, so a loop can be shared between producer
/// threads behind an `Arc`.
pub struct Loop {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Loop {
    /// Creates an idle loop that will publish to `receiver`.
    pub fn new(receiver: Arc<dyn Receiver>) -> Self {
        Self {
            shared: Arc::new(Shared {
                receiver,
                buffers: Mutex::new(None),
                queue: MessageQueue::new(),
                stop_requested: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                worker_panicked: AtomicBool::new(false),
                state: Mutex::new(LoopState::Idle),
                frames: AtomicU64::new(0),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Allocates both textures from `screen` and launches the worker thread.
    ///
    /// Returns as soon as the worker is spawned. Must be called exactly once,
    /// before any work is submitted.
    pub fn start(&self, screen: &dyn Screen) -> Result<(), LoopError> {
        let mut state = self.shared.lock_state();
        if *state != LoopState::Idle {
            return Err(LoopError::AlreadyStarted);
        }

        let size = Size::canvas();
        let next = screen.new_texture(size).map_err(LoopError::Backend)?;
        let prev = screen.new_texture(size).map_err(LoopError::Backend)?;
        info!(
            "Loop: Allocated {}x{} textures {:?} / {:?}",
            size.width,
            size.height,
            next.id(),
            prev.id()
        );
        *self.shared.lock_buffers() = Some(Buffers { next, prev });

        let shared = self.shared.clone();
        let handle = thread::Builder::new()
            .name("painter-loop".to_string())
            .spawn(move || shared.run_worker())
            .map_err(|e| {
                LoopError::Backend(anyhow::Error::from(e).context("Failed to spawn loop worker"))
            })?;
        *self.worker.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);

        *state = LoopState::Running;
        info!("Loop: Running");
        Ok(())
    }

    /// Enqueues `op` for the worker thread. Never blocks on the worker.
    pub fn post<O: Operation + 'static>(&self, op: O) -> Result<(), LoopError> {
        // Holding the state lock while pushing lets shutdown account for
        // every accepted operation.
        let state = self.shared.lock_state();
        match *state {
            LoopState::Running | LoopState::Draining => {
                self.shared.queue.push(Box::new(op));
                Ok(())
            }
            other => {
                warn!("Loop: Rejected queued operation (state: {:?})", other);
                Err(LoopError::NotRunning(other))
            }
        }
    }

    /// Applies `op` on the calling thread, bypassing the queue.
    ///
    /// Waits for any apply in progress on the worker, then runs apply +
    /// publish + swap. Returns whether a frame was published. Once
    /// `request_stop_and_wait` has returned, no direct operation is applied.
    pub fn post_direct<O: Operation>(&self, op: O) -> Result<bool, LoopError> {
        let state = *self.shared.lock_state();
        if !matches!(state, LoopState::Running | LoopState::Draining) {
            warn!("Loop: Rejected direct operation (state: {:?})", state);
            return Err(LoopError::NotRunning(state));
        }

        let mut buffers = self.shared.lock_buffers();
        if self.shared.closed.load(Ordering::SeqCst) {
            warn!("Loop: Rejected direct operation, loop stopped while waiting");
            return Err(LoopError::NotRunning(LoopState::Stopped));
        }
        Ok(self.shared.apply_locked(&mut buffers, &op))
    }

    /// Stops the worker after it has applied everything already queued, and
    /// waits for it to exit.
    pub fn request_stop_and_wait(&self) -> Result<(), LoopError> {
        {
            let mut state = self.shared.lock_state();
            if *state != LoopState::Running {
                return Err(LoopError::NotRunning(*state));
            }
            *state = LoopState::Draining;
        }
        info!(
            "Loop: Stop requested, draining {} queued operations",
            self.shared.queue.len()
        );

        self.shared.stop_requested.store(true, Ordering::SeqCst);
        self.shared.queue.push(Box::new(wake_signal));

        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let joined = match handle {
            Some(handle) => handle.join().map_err(|_| LoopError::WorkerPanicked),
            None => Ok(()),
        }
        .and_then(|()| {
            if self.shared.worker_panicked.load(Ordering::SeqCst) {
                Err(LoopError::WorkerPanicked)
            } else {
                Ok(())
            }
        });

        // Anything posted after the worker's last emptiness check is still
        // owed an apply.
        let stragglers: Vec<Box<dyn Operation>> = {
            let mut state = self.shared.lock_state();
            *state = LoopState::Stopped;
            std::iter::from_fn(|| self.shared.queue.try_pull()).collect()
        };
        {
            // Waits out a direct apply already holding the buffers.
            let mut buffers = self.shared.lock_buffers();
            self.shared.closed.store(true, Ordering::SeqCst);
            if !stragglers.is_empty() {
                debug!(
                    "Loop: Applying {} operations posted during shutdown",
                    stragglers.len()
                );
                for op in &stragglers {
                    self.shared.apply_locked(&mut buffers, &**op);
                }
            }
        }

        match &joined {
            Ok(()) => info!(
                "Loop: Stopped after {} published frames",
                self.frames_published()
            ),
            Err(e) => error!("Loop: {}", e),
        }
        joined
    }

    pub fn state(&self) -> LoopState {
        *self.shared.lock_state()
    }

    /// Number of frames handed to the receiver so far.
    pub fn frames_published(&self) -> u64 {
        self.shared.frames.load(Ordering::SeqCst)
    }

    /// Operations waiting in the queue (snapshot).
    pub fn pending(&self) -> usize {
        self.shared.queue.len()
    }
}

impl Drop for Loop {
    fn drop(&mut self) {
        if self.state() == LoopState::Running {
            if let Err(e) = self.request_stop_and_wait() {
                error!("Loop: Shutdown on drop failed: {}", e);
            }
        }
    }
}
