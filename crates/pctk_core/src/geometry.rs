//! Shared geometric primitives for the runtime.
//!
//! Screen-space quantities (object positions, hotspots, dialog anchors) use
//! integer coordinates; simulation-space quantities (actor positions, walkbox
//! vertices, path waypoints) use `glam::Vec2`. Conversions are explicit so a
//! reader can always tell which space a value lives in.

use glam::Vec2;

/// Integer screen position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pos {
    pub x: i32,
    pub y: i32,
}

impl Pos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn to_vec2(self) -> Vec2 {
        Vec2::new(self.x as f32, self.y as f32)
    }

    pub fn from_vec2(v: Vec2) -> Self {
        Self {
            x: v.x.round() as i32,
            y: v.y.round() as i32,
        }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// Pixel dimensions of a texture, frame, or screen region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    pub w: u32,
    pub h: u32,
}

impl Size {
    pub const fn new(w: u32, h: u32) -> Self {
        Self { w, h }
    }
}

/// Axis-aligned rectangle anchored at its top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub pos: Pos,
    pub size: Size,
}

impl Rect {
    pub const fn new(x: i32, y: i32, w: u32, h: u32) -> Self {
        Self {
            pos: Pos::new(x, y),
            size: Size::new(w, h),
        }
    }

    /// Inclusive on the left/top edge, exclusive on the right/bottom edge.
    pub fn contains(&self, p: Pos) -> bool {
        p.x >= self.pos.x
            && p.y >= self.pos.y
            && p.x < self.pos.x + self.size.w as i32
            && p.y < self.pos.y + self.size.h as i32
    }
}

/// One of the four cardinal facings. The numeric values are part of the
/// script-facing contract (DirUp..DirLeft) and of costume action codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Direction {
    Up = 0,
    Right = 1,
    #[default]
    Down = 2,
    Left = 3,
}

impl Direction {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Up),
            1 => Some(Self::Right),
            2 => Some(Self::Down),
            3 => Some(Self::Left),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Facing that best matches a movement delta (dominant axis wins).
    /// Screen coordinates: y grows downward.
    pub fn from_delta(delta: Vec2) -> Self {
        if delta.x.abs() >= delta.y.abs() {
            if delta.x >= 0.0 {
                Self::Right
            } else {
                Self::Left
            }
        } else if delta.y >= 0.0 {
            Self::Down
        } else {
            Self::Up
        }
    }
}

/// RGBA color. The named constants form the 16-entry palette exposed to
/// scripts as color tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const BLUE: Color = Color::rgb(0, 0, 170);
    pub const GREEN: Color = Color::rgb(0, 170, 0);
    pub const CYAN: Color = Color::rgb(0, 170, 170);
    pub const RED: Color = Color::rgb(170, 0, 0);
    pub const MAGENTA: Color = Color::rgb(170, 0, 170);
    pub const BROWN: Color = Color::rgb(170, 85, 0);
    pub const LIGHT_GRAY: Color = Color::rgb(170, 170, 170);
    pub const DARK_GRAY: Color = Color::rgb(85, 85, 85);
    pub const BRIGHT_BLUE: Color = Color::rgb(85, 85, 255);
    pub const BRIGHT_GREEN: Color = Color::rgb(85, 255, 85);
    pub const BRIGHT_CYAN: Color = Color::rgb(85, 255, 255);
    pub const BRIGHT_RED: Color = Color::rgb(255, 85, 85);
    pub const BRIGHT_MAGENTA: Color = Color::rgb(255, 85, 255);
    pub const YELLOW: Color = Color::rgb(255, 255, 85);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
}

/// 2D cross product (z component of the 3D cross of two planar vectors).
pub fn cross(a: Vec2, b: Vec2) -> f32 {
    a.x * b.y - a.y * b.x
}

/// Closest point to `p` on the segment from `a` to `b`.
pub fn closest_point_on_segment(a: Vec2, b: Vec2, p: Vec2) -> Vec2 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq == 0.0 {
        return a;
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    a + ab * t
}

/// Whether the closed segments a1-a2 and b1-b2 intersect.
pub fn segments_intersect(a1: Vec2, a2: Vec2, b1: Vec2, b2: Vec2) -> bool {
    let d1 = cross(b2 - b1, a1 - b1);
    let d2 = cross(b2 - b1, a2 - b1);
    let d3 = cross(a2 - a1, b1 - a1);
    let d4 = cross(a2 - a1, b2 - a1);

    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }

    // Collinear endpoint cases.
    (d1 == 0.0 && on_segment(b1, b2, a1))
        || (d2 == 0.0 && on_segment(b1, b2, a2))
        || (d3 == 0.0 && on_segment(a1, a2, b1))
        || (d4 == 0.0 && on_segment(a1, a2, b2))
}

fn on_segment(a: Vec2, b: Vec2, p: Vec2) -> bool {
    p.x >= a.x.min(b.x) && p.x <= a.x.max(b.x) && p.y >= a.y.min(b.y) && p.y <= a.y.max(b.y)
}
