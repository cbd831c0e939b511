//! Frame scheduling abstraction for self-driven tick loops.
//!
//! Dwell timers and the calibration sequence need to advance even when the
//! gaze engine delivers no new sample. Instead of binding to a particular
//! host primitive they request one tick at a time from a `FrameScheduler`;
//! the host calls back into the session with the handle when the frame comes.
//!
//! `ManualScheduler` queues requests so tests and the simulator decide
//! exactly when each tick fires.

use tracing::debug;

/// Opaque identifier for one requested tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TickHandle(u64);

impl TickHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Host-provided per-frame scheduling primitive.
pub trait FrameScheduler {
    /// Request a single tick on the next frame.
    fn request_tick(&mut self) -> TickHandle;

    /// Withdraw a pending request. Unknown or already-fired handles are ignored.
    fn cancel_tick(&mut self, handle: TickHandle);
}

/// One self-rescheduling tick loop.
///
/// At most one request is outstanding at a time. Cancelling a loop that is
/// not running is a no-op.
#[derive(Debug, Default)]
pub struct TickLoop {
    pending: Option<TickHandle>,
}

impl TickLoop {
    pub fn new() -> Self {
        Self { pending: None }
    }

    /// Ensure a tick is requested.
    pub fn arm(&mut self, scheduler: &mut dyn FrameScheduler) {
        if self.pending.is_none() {
            self.pending = Some(scheduler.request_tick());
        }
    }

    /// Consume `handle` if it belongs to this loop. The loop is idle afterwards
    /// until re-armed.
    pub fn take_fired(&mut self, handle: TickHandle) -> bool {
        if self.pending == Some(handle) {
            self.pending = None;
            true
        } else {
            false
        }
    }

    /// Cancel the outstanding request, if any.
    pub fn cancel(&mut self, scheduler: &mut dyn FrameScheduler) {
        if let Some(handle) = self.pending.take() {
            scheduler.cancel_tick(handle);
        }
    }

    pub fn is_running(&self) -> bool {
        self.pending.is_some()
    }
}

/// Scheduler whose ticks fire only when the owner drains them.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    next_id: u64,
    pending: Vec<TickHandle>,
    cancelled: u64,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return every pending handle in request order.
    pub fn take_due(&mut self) -> Vec<TickHandle> {
        std::mem::take(&mut self.pending)
    }

    /// Number of ticks currently requested.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Number of requests withdrawn before firing.
    pub fn cancelled_count(&self) -> u64 {
        self.cancelled
    }
}

impl FrameScheduler for ManualScheduler {
    fn request_tick(&mut self) -> TickHandle {
        self.next_id += 1;
        let handle = TickHandle(self.next_id);
        self.pending.push(handle);
        handle
    }

    fn cancel_tick(&mut self, handle: TickHandle) {
        let before = self.pending.len();
        self.pending.retain(|h| *h != handle);
        if self.pending.len() < before {
            self.cancelled += 1;
            debug!("Tick {} cancelled", handle.id());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arm_requests_once() {
        let mut sched = ManualScheduler::new();
        let mut tick = TickLoop::new();

        tick.arm(&mut sched);
        tick.arm(&mut sched);
        assert_eq!(sched.pending_count(), 1);
        assert!(tick.is_running());
    }

    #[test]
    fn test_fired_handle_consumed() {
        let mut sched = ManualScheduler::new();
        let mut tick = TickLoop::new();
        tick.arm(&mut sched);

        let due = sched.take_due();
        assert_eq!(due.len(), 1);
        assert!(tick.take_fired(due[0]));
        assert!(!tick.is_running());
        // Same handle again is stale
        assert!(!tick.take_fired(due[0]));
    }

    #[test]
    fn test_foreign_handle_ignored() {
        let mut sched = ManualScheduler::new();
        let mut a = TickLoop::new();
        let mut b = TickLoop::new();
        a.arm(&mut sched);
        b.arm(&mut sched);

        let due = sched.take_due();
        assert!(!a.take_fired(due[1]));
        assert!(a.take_fired(due[0]));
        assert!(b.take_fired(due[1]));
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let mut sched = ManualScheduler::new();
        let mut tick = TickLoop::new();
        tick.arm(&mut sched);

        tick.cancel(&mut sched);
        tick.cancel(&mut sched);
        assert_eq!(sched.pending_count(), 0);
        assert_eq!(sched.cancelled_count(), 1);
        assert!(!tick.is_running());
    }

    #[test]
    fn test_cancel_after_fire_is_noop() {
        let mut sched = ManualScheduler::new();
        let handle = sched.request_tick();
        let _ = sched.take_due();
        sched.cancel_tick(handle);
        assert_eq!(sched.cancelled_count(), 0);
    }
}
