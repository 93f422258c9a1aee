use std::time::{Duration, Instant};

/// Frame clock for hosts that drive the render loop themselves.
pub struct FrameTiming {
    started: Instant,
    last_frame_time: Option<Instant>,
    last_fps_time: Instant,
    frame_count: u32,
    pub frame_dt: f32,
    render_ms: f32,
}

impl Default for FrameTiming {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameTiming {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            started: now,
            last_frame_time: None,
            last_fps_time: now,
            frame_count: 0,
            frame_dt: 1.0 / 60.0,
            render_ms: 0.0,
        }
    }

    pub fn set_render_ms(&mut self, render_ms: f32) {
        self.render_ms = render_ms;
    }

    /// Milliseconds since the clock started, the timestamp the render loop expects.
    pub fn elapsed_ms(&self, now: Instant) -> f64 {
        now.saturating_duration_since(self.started).as_secs_f64() * 1000.0
    }

    pub fn update(&mut self, now: Instant) {
        let dt_duration = if let Some(last) = self.last_frame_time {
            now.saturating_duration_since(last)
        } else {
            Duration::from_millis(16)
        };
        self.last_frame_time = Some(now);
        self.frame_dt = dt_duration.as_secs_f32().max(0.0);

        self.frame_count = self.frame_count.saturating_add(1);
        let elapsed = now.saturating_duration_since(self.last_fps_time);
        if elapsed.as_secs_f32() >= 0.5 {
            let fps = self.frame_count as f32 / elapsed.as_secs_f32();
            log::debug!(
                "{:.1} fps (cadence {:.2} ms, render {:.2} ms)",
                fps,
                self.frame_dt * 1000.0,
                self.render_ms
            );
            self.frame_count = 0;
            self.last_fps_time = now;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::FrameTiming;
    use std::time::{Duration, Instant};

    #[test]
    fn dt_tracks_frame_spacing() {
        let mut timing = FrameTiming::new();
        let start = Instant::now();
        timing.update(start);
        assert!((timing.frame_dt - 0.016).abs() < 1e-6);
        timing.update(start + Duration::from_millis(40));
        assert!((timing.frame_dt - 0.040).abs() < 1e-4);
        assert!(timing.elapsed_ms(start + Duration::from_millis(40)) >= 40.0);
    }
}
