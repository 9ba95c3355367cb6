//! Presentation-layer seams.
//!
//! The runtime never talks to a window, a GPU, or an audio device directly.
//! It draws and plays through these traits and the host application supplies
//! the implementations. `NullBackend` implements both for headless tests and
//! records every call so tests can assert on draw order.

use pctk_core::geometry::{Color, Pos, Rect};

/// Logical display width in pixels.
pub const SCREEN_WIDTH: u32 = 320;
/// Logical display height in pixels.
pub const SCREEN_HEIGHT: u32 = 200;
/// Top band of the display reserved for the scene viewport.
pub const VIEWPORT_HEIGHT: u32 = 144;
/// Bottom band of the display reserved for the control panel.
pub const CONTROL_PANEL_HEIGHT: u32 = 56;
/// Default integer scale factor from logical pixels to window pixels.
pub const DEFAULT_ZOOM: u32 = 4;

/// Handle to a texture owned by the render backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

pub trait RenderBackend {
    /// Decode and upload an encoded image, returning a handle for later
    /// draws.
    fn load_texture(&mut self, bytes: &[u8]) -> Result<TextureId, String>;

    /// Blit the whole texture into the scene viewport.
    fn draw_background(&mut self, texture: TextureId);

    /// Blit the `src` region of `texture` with its top-left corner at `dst`.
    fn draw_sprite(&mut self, texture: TextureId, src: Rect, dst: Pos, flip_x: bool);

    fn draw_text(&mut self, text: &str, pos: Pos, color: Color);
}

pub trait AudioBackend {
    fn play_music(&mut self, format: [u8; 4], data: &[u8]);
    fn stop_music(&mut self);
    fn pause_music(&mut self);
    fn resume_music(&mut self);

    /// Refill the music stream buffer. Called once per frame before drawing.
    fn advance_music_stream(&mut self);

    fn play_sound(&mut self, format: [u8; 4], data: &[u8]);
    fn stop_sound(&mut self);
}

/// Headless backend that hands out sequential texture ids and keeps a
/// call log.
#[derive(Default)]
pub struct NullBackend {
    next_texture: u32,
    pub calls: Vec<String>,
}

impl NullBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RenderBackend for NullBackend {
    fn load_texture(&mut self, bytes: &[u8]) -> Result<TextureId, String> {
        let id = TextureId(self.next_texture);
        self.next_texture += 1;
        self.calls.push(format!("load_texture({} bytes)", bytes.len()));
        Ok(id)
    }

    fn draw_background(&mut self, texture: TextureId) {
        self.calls.push(format!("draw_background({})", texture.0));
    }

    fn draw_sprite(&mut self, texture: TextureId, src: Rect, dst: Pos, flip_x: bool) {
        self.calls.push(format!(
            "draw_sprite({}, {},{} {}x{}, at {},{}, flip={})",
            texture.0, src.pos.x, src.pos.y, src.size.w, src.size.h, dst.x, dst.y, flip_x
        ));
    }

    fn draw_text(&mut self, text: &str, pos: Pos, _color: Color) {
        self.calls.push(format!("draw_text('{text}', at {},{})", pos.x, pos.y));
    }
}

impl AudioBackend for NullBackend {
    fn play_music(&mut self, format: [u8; 4], data: &[u8]) {
        self.calls.push(format!(
            "play_music({}, {} bytes)",
            String::from_utf8_lossy(&format),
            data.len()
        ));
    }

    fn stop_music(&mut self) {
        self.calls.push("stop_music".to_string());
    }

    fn pause_music(&mut self) {
        self.calls.push("pause_music".to_string());
    }

    fn resume_music(&mut self) {
        self.calls.push("resume_music".to_string());
    }

    fn advance_music_stream(&mut self) {}

    fn play_sound(&mut self, format: [u8; 4], data: &[u8]) {
        self.calls.push(format!(
            "play_sound({}, {} bytes)",
            String::from_utf8_lossy(&format),
            data.len()
        ));
    }

    fn stop_sound(&mut self) {
        self.calls.push("stop_sound".to_string());
    }
}
