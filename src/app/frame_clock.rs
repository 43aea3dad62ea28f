use std::time::{Duration, Instant};

/// Measures the time between redraws and reports the frame rate
pub struct FrameClock {
    prev_frame_time: Instant,
    report_start: Instant,
    frames_since_report: u32,
}

impl FrameClock {
    const REPORT_INTERVAL: Duration = Duration::from_secs(1);

    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            prev_frame_time: now,
            report_start: now,
            frames_since_report: 0,
        }
    }

    /// Seconds since the previous call
    pub fn tick(&mut self) -> f32 {
        self.tick_at(Instant::now())
    }

    fn tick_at(&mut self, now: Instant) -> f32 {
        let delta_time = now.saturating_duration_since(self.prev_frame_time).as_secs_f32();
        self.prev_frame_time = now;

        if delta_time > 0.0 {
            log::trace!("dt: {:.3} ms ({:.1} fps)", delta_time * 1000.0, 1.0 / delta_time);
        }

        self.frames_since_report += 1;
        let elapsed = now.saturating_duration_since(self.report_start);
        if elapsed >= Self::REPORT_INTERVAL {
            log::debug!("{:.1} fps", self.frames_since_report as f32 / elapsed.as_secs_f32());
            self.frames_since_report = 0;
            self.report_start = now;
        }

        delta_time
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_is_time_since_previous_tick() {
        let mut clock = FrameClock::new();
        let start = clock.prev_frame_time;

        let dt = clock.tick_at(start + Duration::from_millis(20));
        assert!((dt - 0.020).abs() < 1e-6);

        let dt = clock.tick_at(start + Duration::from_millis(50));
        assert!((dt - 0.030).abs() < 1e-6);
    }

    #[test]
    fn report_window_resets_after_a_second() {
        let mut clock = FrameClock::new();
        let start = clock.report_start;

        clock.tick_at(start + Duration::from_millis(500));
        assert_eq!(clock.frames_since_report, 1);

        clock.tick_at(start + Duration::from_millis(1200));
        assert_eq!(clock.frames_since_report, 0);
        assert_eq!(clock.report_start, start + Duration::from_millis(1200));
    }
}
