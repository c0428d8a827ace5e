//! Display-refresh scheduling.
//!
//! The output sink never writes to the display directly; it asks a
//! [`FrameScheduler`] to run a flush on the next frame. Two schedulers are
//! provided:
//!
//! | Scheduler | Use |
//! |-----------|-----|
//! | [`TokioFrames`] | Real hosts: one local tokio task per requested frame |
//! | [`ManualFrames`] | Tests and headless hosts: frames run when [`ManualFrames::run_frame`] is called |

use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    rc::Rc,
    time::Duration,
};

use tokio::task::JoinHandle;

/// Callback run on a display frame.
pub type FrameCallback = Box<dyn FnOnce()>;

/// Handle to a requested frame, used to cancel it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(u64);

/// Source of display-refresh ticks.
///
/// Callbacks are always run on the scheduling thread, never from inside
/// `request_frame` itself.
pub trait FrameScheduler {
    /// Schedules `callback` for the next frame.
    fn request_frame(&self, callback: FrameCallback) -> FrameId;

    /// Cancels a frame that has not run yet. Unknown or already-run ids are ignored.
    fn cancel_frame(&self, id: FrameId);
}

// =============================================================================
// TokioFrames
// =============================================================================

/// Frame scheduler backed by local tokio tasks.
///
/// Each requested frame is a `spawn_local` task that sleeps for one frame
/// interval and then runs its callback, so it must be used from inside a
/// [`tokio::task::LocalSet`].
#[derive(Debug)]
pub struct TokioFrames {
    interval: Duration,
    next_id: Cell<u64>,
    tasks: Rc<RefCell<HashMap<FrameId, JoinHandle<()>>>>,
}

impl TokioFrames {
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_id: Cell::new(0),
            tasks: Rc::default(),
        }
    }

    /// Number of frames requested but not yet run or cancelled.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.tasks.borrow().len()
    }
}

impl FrameScheduler for TokioFrames {
    fn request_frame(&self, callback: FrameCallback) -> FrameId {
        let id = FrameId(self.next_id.get());
        self.next_id.set(id.0 + 1);

        let interval = self.interval;
        let tasks = Rc::clone(&self.tasks);
        let handle = tokio::task::spawn_local(async move {
            tokio::time::sleep(interval).await;
            tasks.borrow_mut().remove(&id);
            callback();
        });
        self.tasks.borrow_mut().insert(id, handle);
        id
    }

    fn cancel_frame(&self, id: FrameId) {
        if let Some(handle) = self.tasks.borrow_mut().remove(&id) {
            handle.abort();
            tracing::debug!(?id, "cancelled display frame");
        }
    }
}

impl Drop for TokioFrames {
    fn drop(&mut self) {
        for (_, handle) in self.tasks.borrow_mut().drain() {
            handle.abort();
        }
    }
}

// =============================================================================
// ManualFrames
// =============================================================================

/// Frame scheduler driven explicitly by the host.
///
/// Requested callbacks queue up until [`run_frame`](Self::run_frame) is
/// called. Callbacks requested while a frame runs land in the next frame.
#[derive(Default)]
pub struct ManualFrames {
    next_id: Cell<u64>,
    queue: RefCell<Vec<(FrameId, FrameCallback)>>,
}

impl ManualFrames {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of callbacks waiting for the next frame.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Runs every callback queued before this call and returns how many ran.
    pub fn run_frame(&self) -> usize {
        let due = std::mem::take(&mut *self.queue.borrow_mut());
        let count = due.len();
        for (_, callback) in due {
            callback();
        }
        count
    }
}

impl FrameScheduler for ManualFrames {
    fn request_frame(&self, callback: FrameCallback) -> FrameId {
        let id = FrameId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.queue.borrow_mut().push((id, callback));
        id
    }

    fn cancel_frame(&self, id: FrameId) {
        self.queue.borrow_mut().retain(|(queued, _)| *queued != id);
    }
}
