use std::time::Instant;

/// Snapshot of the time state supplied to a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSample {
    /// Elapsed wall-clock time in seconds since the loop started.
    pub seconds: f32,
    /// Loop iteration counter; also names exported frames.
    pub frame_index: u64,
}

impl TimeSample {
    pub fn new(seconds: f32, frame_index: u64) -> Self {
        Self {
            seconds,
            frame_index,
        }
    }
}

/// Clock backed by the system monotonic timer.
///
/// `sample` returns the time for the current iteration without advancing;
/// `advance` is called once per iteration after presenting.
#[derive(Debug, Clone, Copy)]
pub struct FrameClock {
    origin: Instant,
    frame: u64,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sample(&self) -> TimeSample {
        self.sample_at(Instant::now())
    }

    pub fn sample_at(&self, now: Instant) -> TimeSample {
        let elapsed = now.saturating_duration_since(self.origin);
        TimeSample::new(elapsed.as_secs_f32(), self.frame)
    }

    pub fn advance(&mut self) {
        self.frame = self.frame.saturating_add(1);
    }

    pub fn frame_index(&self) -> u64 {
        self.frame
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
            frame: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn frame_index_advances_once_per_iteration() {
        let mut clock = FrameClock::new();
        assert_eq!(clock.sample().frame_index, 0);
        assert_eq!(clock.sample().frame_index, 0);
        clock.advance();
        clock.advance();
        assert_eq!(clock.sample().frame_index, 2);
        assert_eq!(clock.frame_index(), 2);
    }

    #[test]
    fn seconds_measure_time_since_start() {
        let clock = FrameClock::new();
        let later = clock.origin + Duration::from_millis(1500);
        let sample = clock.sample_at(later);
        assert!((sample.seconds - 1.5).abs() < 1e-4);
    }

    #[test]
    fn instants_before_start_clamp_to_zero() {
        let clock = FrameClock {
            origin: Instant::now() + Duration::from_secs(5),
            frame: 0,
        };
        assert_eq!(clock.sample().seconds, 0.0);
    }
}
