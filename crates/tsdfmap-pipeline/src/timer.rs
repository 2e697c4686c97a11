//! A polled periodic-task helper standing in for the three independent
//! wall-clock timers a mapping session runs (mesh update, map publish,
//! active-submap publish). Modeled as state the caller's own scheduler
//! polls, rather than an OS timer callback, so this crate stays agnostic
//! to whatever runtime (a bare loop, tokio, a ROS timer) drives it.

/// Fires at most once per `period` seconds of wall-clock time. A
/// non-positive period disables the timer permanently.
#[derive(Clone, Copy, Debug)]
pub struct PeriodicTimer {
    period: f64,
    last_fired: f64,
}

impl PeriodicTimer {
    #[must_use]
    pub fn new(period: f64, start_time: f64) -> Self {
        Self {
            period,
            last_fired: start_time,
        }
    }

    /// Returns `true`, and resets the internal clock to `now`, if the
    /// timer is enabled and `now` has crossed the next firing boundary.
    pub fn maybe_fire(&mut self, now: f64) -> bool {
        if self.period <= 0.0 || now - self.last_fired < self.period {
            return false;
        }
        self.last_fired = now;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_timer_never_fires() {
        let mut timer = PeriodicTimer::new(0.0, 0.0);
        assert!(!timer.maybe_fire(1000.0));
    }

    #[test]
    fn timer_fires_once_per_period_and_resets() {
        let mut timer = PeriodicTimer::new(1.0, 0.0);
        assert!(!timer.maybe_fire(0.5));
        assert!(timer.maybe_fire(1.0));
        assert!(!timer.maybe_fire(1.5));
        assert!(timer.maybe_fire(2.0));
    }
}
