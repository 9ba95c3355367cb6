//! Frame pacing for the simulation loop.
//!
//! The loop runs one simulation step per rendered frame at a fixed target
//! rate (default 60 Hz). `begin_frame` measures the wall-clock delta and
//! `sleep_until_deadline` parks the thread for whatever remains of the
//! frame budget. Overruns are logged and the deadline is re-anchored so a
//! slow frame does not cause a catch-up burst.

use std::time::{Duration, Instant};

pub const DEFAULT_TARGET_FPS: u32 = 60;

pub struct FrameClock {
    frame_budget: Duration,
    last_frame: Instant,
    deadline: Instant,
    pub frame_count: u64,
}

impl FrameClock {
    pub fn new(target_fps: u32) -> Self {
        let fps = target_fps.max(1);
        let frame_budget = Duration::from_secs(1) / fps;
        let now = Instant::now();
        Self {
            frame_budget,
            last_frame: now,
            deadline: now + frame_budget,
            frame_count: 0,
        }
    }

    pub fn frame_budget(&self) -> Duration {
        self.frame_budget
    }

    /// Start a frame; returns the wall-clock time since the previous frame
    /// started.
    pub fn begin_frame(&mut self) -> Duration {
        let now = Instant::now();
        let delta = now.duration_since(self.last_frame);
        self.last_frame = now;
        self.frame_count += 1;
        delta
    }

    /// Sleep out the rest of the frame budget. Re-anchors after an overrun.
    pub fn sleep_until_deadline(&mut self) {
        let now = Instant::now();
        if now < self.deadline {
            std::thread::sleep(self.deadline - now);
            self.deadline += self.frame_budget;
        } else {
            let overrun = now - self.deadline;
            if overrun > self.frame_budget {
                log::warn!(
                    "frame overran its budget by {:.1}ms",
                    overrun.as_secs_f64() * 1000.0
                );
            }
            self.deadline = now + self.frame_budget;
        }
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new(DEFAULT_TARGET_FPS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_budget_matches_target_fps() {
        let clock = FrameClock::new(60);
        let budget = clock.frame_budget();
        assert!(budget >= Duration::from_micros(16_600));
        assert!(budget <= Duration::from_micros(16_700));
    }

    #[test]
    fn begin_frame_counts_frames_and_measures_delta() {
        let mut clock = FrameClock::new(1000);
        clock.begin_frame();
        std::thread::sleep(Duration::from_millis(5));
        let delta = clock.begin_frame();
        assert!(delta >= Duration::from_millis(5));
        assert_eq!(clock.frame_count, 2);
    }

    #[test]
    fn sleep_until_deadline_paces_the_loop() {
        let mut clock = FrameClock::new(100); // 10ms budget
        let start = Instant::now();
        clock.begin_frame();
        clock.sleep_until_deadline();
        assert!(start.elapsed() >= Duration::from_millis(9));
    }

    #[test]
    fn zero_fps_is_clamped() {
        let clock = FrameClock::new(0);
        assert_eq!(clock.frame_budget(), Duration::from_secs(1));
    }
}
