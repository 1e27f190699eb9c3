//! Process-table seam.

/// Read access to the live process table.
///
/// Both the store (lazy liveness checks for process-scoped grants) and the
/// tracker (resolving a pid into an unambiguous subject) need the kernel's
/// start time for a pid. The trait lives here so neither crate depends on
/// the other; the `/proc`-backed implementation is `permit_tracker::ProcFs`
/// and tests substitute in-memory fakes.
pub trait ProcessTable: Send + Sync {
    /// The start time for `pid`, or `None` if no such process exists.
    ///
    /// The value is the kernel's clock-tick timestamp; it is only ever
    /// compared for equality against a previously recorded value.
    fn start_time_of(&self, pid: u32) -> Option<u64>;
}

impl<T: ProcessTable + ?Sized> ProcessTable for std::sync::Arc<T> {
    fn start_time_of(&self, pid: u32) -> Option<u64> {
        (**self).start_time_of(pid)
    }
}
