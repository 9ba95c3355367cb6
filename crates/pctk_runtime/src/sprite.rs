//! Sprite sheets and frame animation.
//!
//! A sheet is a texture cut into a grid of fixed-size cells; drawing names a
//! cell by (row, column). An `Animation` owns a flattened frame list and a
//! cursor; `advance` is driven by an explicit `Instant` so tests can step
//! time deterministically instead of sleeping.

use std::time::{Duration, Instant};

use pctk_core::geometry::{Pos, Rect, Size};
use pctk_resource::format::{AnimationData, SpriteSheetData};

use crate::backend::{RenderBackend, TextureId};

pub struct SpriteSheet {
    texture: TextureId,
    sheet_size: Size,
    frame_size: Size,
}

impl SpriteSheet {
    /// Decode the sheet image, upload it, and record the grid geometry.
    pub fn from_data(
        render: &mut dyn RenderBackend,
        data: &SpriteSheetData,
    ) -> Result<Self, String> {
        let decoded = image::load_from_memory(&data.image)
            .map_err(|e| format!("failed to decode sprite sheet image: {e}"))?;
        let texture = render.load_texture(&data.image)?;
        Ok(Self {
            texture,
            sheet_size: Size::new(decoded.width(), decoded.height()),
            frame_size: data.frame_size,
        })
    }

    pub fn texture(&self) -> TextureId {
        self.texture
    }

    pub fn sheet_size(&self) -> Size {
        self.sheet_size
    }

    pub fn frame_size(&self) -> Size {
        self.frame_size
    }

    /// Blit grid cell (row, col) with its top-left corner at `pos`.
    pub fn draw(&self, render: &mut dyn RenderBackend, row: u32, col: u32, pos: Pos, flip_x: bool) {
        let src = Rect::new(
            (col * self.frame_size.w) as i32,
            (row * self.frame_size.h) as i32,
            self.frame_size.w,
            self.frame_size.h,
        );
        render.draw_sprite(self.texture, src, pos, flip_x);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationFrame {
    pub row: u32,
    pub column: u32,
    pub delay: Duration,
}

/// A restartable frame sequence. The wire form groups frames as
/// (row, delay, columns); construction flattens that into one frame per
/// (row, column) pair, in declared order.
pub struct Animation {
    frames: Vec<AnimationFrame>,
    flip: bool,
    cursor: usize,
    last_advance: Instant,
}

impl Animation {
    pub fn from_data(data: &AnimationData, now: Instant) -> Self {
        let mut frames = Vec::new();
        for group in &data.frames {
            let delay = Duration::from_millis(u64::from(group.delay_ms));
            for &column in &group.columns {
                frames.push(AnimationFrame {
                    row: group.row,
                    column,
                    delay,
                });
            }
        }
        Self {
            frames,
            flip: data.flip,
            cursor: 0,
            last_advance: now,
        }
    }

    pub fn flip(&self) -> bool {
        self.flip
    }

    pub fn current_frame(&self) -> usize {
        self.cursor
    }

    pub fn restart(&mut self, now: Instant) {
        self.cursor = 0;
        self.last_advance = now;
    }

    /// Step the cursor when the current frame's delay has elapsed, wrapping
    /// modulo the frame count.
    pub fn advance(&mut self, now: Instant) {
        let Some(frame) = self.frames.get(self.cursor) else {
            return;
        };
        if now.duration_since(self.last_advance) >= frame.delay {
            self.cursor = (self.cursor + 1) % self.frames.len();
            self.last_advance = now;
        }
    }

    /// Advance, then blit the current frame through `sheet`.
    pub fn draw(
        &mut self,
        render: &mut dyn RenderBackend,
        sheet: &SpriteSheet,
        pos: Pos,
        now: Instant,
    ) {
        self.advance(now);
        if let Some(frame) = self.frames.get(self.cursor) {
            sheet.draw(render, frame.row, frame.column, pos, self.flip);
        }
    }
}
