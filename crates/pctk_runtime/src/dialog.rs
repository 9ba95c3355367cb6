//! On-screen speech and narration lines.
//!
//! A dialog lives until its expiry time, computed from the text length at a
//! fixed reading rate and scaled by a speed factor. The world drops expired
//! dialogs each frame and completes their promises, which is what lets a
//! speaking actor know its line is over.

use std::time::{Duration, Instant};

use pctk_core::future::{Future, Promise};
use pctk_core::geometry::{Color, Pos};

use crate::backend::RenderBackend;

/// Every line stays up at least this long, however short.
pub const MIN_DURATION: Duration = Duration::from_secs(2);
/// Assumed reading rate for expiry computation.
pub const CHARS_PER_SECOND: f32 = 10.0;

/// How long a line of `text` stays on screen at the given speed factor.
pub fn display_duration(text: &str, speed: f32) -> Duration {
    let seconds = (text.chars().count() as f32 / CHARS_PER_SECOND).max(MIN_DURATION.as_secs_f32());
    Duration::from_secs_f32(seconds / speed.max(f32::EPSILON))
}

pub struct Dialog {
    pub text: String,
    pub pos: Pos,
    pub color: Color,
    expires_at: Instant,
    done: Promise<()>,
}

impl Dialog {
    /// Create a dialog and the future that fires when it expires. An
    /// explicit `duration` overrides the computed reading time.
    pub fn new(
        text: impl Into<String>,
        pos: Pos,
        color: Color,
        speed: f32,
        duration: Option<Duration>,
        now: Instant,
    ) -> (Self, Future<()>) {
        let text = text.into();
        let duration = duration.unwrap_or_else(|| display_duration(&text, speed));
        let (done, future) = Promise::new();
        (
            Self {
                text,
                pos,
                color,
                expires_at: now + duration,
                done,
            },
            future,
        )
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    /// Complete the expiry promise. Consumes the dialog.
    pub fn finish(self) {
        self.done.complete();
    }

    pub fn draw(&self, render: &mut dyn RenderBackend) {
        render.draw_text(&self.text, self.pos, self.color);
    }
}
