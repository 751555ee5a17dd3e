//! Single-flight coordination.

use std::sync::atomic::{AtomicBool, Ordering};

/// Allows at most one holder at a time.
#[derive(Debug, Default)]
pub struct SingleFlight {
    running: AtomicBool,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the flight, or `None` if someone else holds it.
    pub fn try_acquire(&self) -> Option<FlightGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightGuard { flight: self })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Releases the flight when dropped, including during a panic unwind.
#[derive(Debug)]
pub struct FlightGuard<'a> {
    flight: &'a SingleFlight,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.flight.running.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_fails_until_release() {
        let flight = SingleFlight::new();

        let guard = flight.try_acquire().unwrap();
        assert!(flight.is_running());
        assert!(flight.try_acquire().is_none());

        drop(guard);
        assert!(!flight.is_running());
        assert!(flight.try_acquire().is_some());
    }
}
