use std::time::{Duration, Instant};

/// Maps timeline positions (seconds since the bus came up) onto the
/// device's tick counter.
#[derive(Debug, Clone, Copy)]
pub struct DeviceClock {
    frequency: f64,
    epoch: Instant,
}

impl DeviceClock {
    pub fn new(frequency: f64) -> Self {
        Self::with_epoch(frequency, Instant::now())
    }

    pub fn with_epoch(frequency: f64, epoch: Instant) -> Self {
        DeviceClock { frequency, epoch }
    }

    /// Tick count for `print_time`. Times before the epoch map to tick 0.
    pub fn time_to_clock(&self, print_time: f64) -> u64 {
        if print_time.is_nan() || print_time <= 0.0 {
            return 0;
        }
        // float to int casts saturate
        (print_time * self.frequency).round() as u64
    }

    /// Current position on the timeline
    pub fn estimated_print_time(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    pub fn now_clock(&self) -> u64 {
        self.time_to_clock(self.estimated_print_time())
    }

    /// Host instant at which the device reaches `clock`, if representable
    pub fn clock_to_instant(&self, clock: u64) -> Option<Instant> {
        let offset = Duration::try_from_secs_f64(clock as f64 / self.frequency).ok()?;
        self.epoch.checked_add(offset)
    }
}
