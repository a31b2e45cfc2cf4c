use std::sync::atomic::{AtomicBool, Ordering};

/// Busy/idle latch for one asynchronous resource.
///
/// Busy means a worker owns the resource: the renderer shows a spinner and
/// the dispatcher must not start another worker for it. Every poll is
/// non-blocking.
#[derive(Debug)]
pub struct Gate {
    name: &'static str,
    busy: AtomicBool,
}

impl Gate {
    pub fn idle(name: &'static str) -> Self {
        Self { name, busy: AtomicBool::new(false) }
    }

    /// For resources fetched eagerly at startup.
    pub fn busy(name: &'static str) -> Self {
        Self { name, busy: AtomicBool::new(true) }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_idle(&self) -> bool {
        !self.busy.load(Ordering::Acquire)
    }

    #[cfg(test)]
    pub fn mark_busy(&self) {
        self.busy.store(true, Ordering::Release);
    }

    /// Idempotent.
    pub fn mark_idle(&self) {
        self.busy.store(false, Ordering::Release);
    }

    /// Check-idle-then-mark-busy as a single step. Returns false when some
    /// worker already holds the gate.
    pub fn try_mark_busy(&self) -> bool {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Guard for a gate that is already busy; releases it when dropped,
    /// including during unwinding.
    pub fn release_on_drop(&self) -> GateGuard<'_> {
        GateGuard { gate: self }
    }
}

pub struct GateGuard<'a> {
    gate: &'a Gate,
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.gate.mark_idle();
    }
}

/// Cancellation request for the download worker, polled between items.
#[derive(Debug, Default)]
pub struct AbortSignal {
    requested: AtomicBool,
}

impl AbortSignal {
    pub fn request(&self) {
        self.requested.store(true, Ordering::Release);
    }

    pub fn clear(&self) {
        self.requested.store(false, Ordering::Release);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }
}
