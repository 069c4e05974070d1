//! Monotonic time source
//!
//! Timeouts in the link layer are measured against a [`Clock`] instead of a
//! global timer driver, so they can be stepped by hand in tests.

/// Free-running microsecond clock
pub trait Clock {
    /// Microseconds since an arbitrary fixed origin
    ///
    /// Must never go backwards.
    fn now_micros(&self) -> u64;

    /// Milliseconds since the same origin
    fn now_millis(&self) -> u64 {
        self.now_micros() / 1_000
    }

    /// Microseconds elapsed since `earlier`
    fn elapsed_micros(&self, earlier: u64) -> u64 {
        self.now_micros().saturating_sub(earlier)
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_micros(&self) -> u64 {
        (**self).now_micros()
    }
}
