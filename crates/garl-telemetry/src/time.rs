// Path: crates/garl-telemetry/src/time.rs
//! A simple RAII timer for observing the duration of a scope into a histogram callback.

use std::time::Instant;

/// Calls `on_drop` with the elapsed seconds when the timer goes out of scope.
///
/// Used around a single trace submission or webhook delivery attempt to feed
/// a duration observation into the active `MetricsSink` regardless of which
/// exit path (success, error, early return) the scope takes.
pub struct Timer<F: FnMut(f64)> {
    start: Instant,
    on_drop: F,
}

impl<F: FnMut(f64)> Timer<F> {
    /// Starts a new timer that will invoke `on_drop` with the elapsed seconds when dropped.
    pub fn new(on_drop: F) -> Self {
        Self {
            start: Instant::now(),
            on_drop,
        }
    }
}

impl<F: FnMut(f64)> Drop for Timer<F> {
    fn drop(&mut self) {
        (self.on_drop)(self.start.elapsed().as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invokes_callback_on_drop() {
        let mut observed = None;
        {
            let _timer = Timer::new(|secs| observed = Some(secs));
        }
        assert!(observed.is_some());
    }
}
