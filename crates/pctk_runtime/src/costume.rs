//! Costumes: action-indexed animation sets over one sprite sheet.
//!
//! An action code packs (category, direction) into one byte: the low two
//! bits are the facing, the remaining high bits the category. Codes at or
//! above `ActionCode::CUSTOM_BASE` are opaque script-defined actions and
//! are kept whole.

use std::collections::HashMap;
use std::time::Instant;

use pctk_core::geometry::{Direction, Pos};
use pctk_resource::format::CostumeData;

use crate::backend::RenderBackend;
use crate::sprite::{Animation, SpriteSheet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActionCode(u8);

impl ActionCode {
    const CATEGORY_IDLE: u8 = 0;
    const CATEGORY_SPEAK: u8 = 1;
    const CATEGORY_WALK: u8 = 2;

    /// Codes from here up are script-defined and carry no direction bits.
    pub const CUSTOM_BASE: u8 = 0x80;

    pub fn idle(dir: Direction) -> Self {
        Self::packed(Self::CATEGORY_IDLE, dir)
    }

    pub fn speak(dir: Direction) -> Self {
        Self::packed(Self::CATEGORY_SPEAK, dir)
    }

    pub fn walk(dir: Direction) -> Self {
        Self::packed(Self::CATEGORY_WALK, dir)
    }

    pub fn custom(code: u8) -> Self {
        Self(code)
    }

    fn packed(category: u8, dir: Direction) -> Self {
        Self((category << 2) | dir.as_u8())
    }

    pub fn as_u8(self) -> u8 {
        self.0
    }

    /// The facing encoded in the low bits; custom codes have none.
    pub fn direction(self) -> Option<Direction> {
        if self.0 >= Self::CUSTOM_BASE {
            return None;
        }
        Direction::from_u8(self.0 & 0b11)
    }
}

pub struct Costume {
    sheet: SpriteSheet,
    animations: HashMap<u8, Animation>,
}

impl Costume {
    pub fn from_data(
        render: &mut dyn RenderBackend,
        data: &CostumeData,
        now: Instant,
    ) -> Result<Self, String> {
        let sheet = SpriteSheet::from_data(render, &data.sheet)?;
        let animations = data
            .animations
            .iter()
            .map(|(code, anim)| (*code, Animation::from_data(anim, now)))
            .collect();
        Ok(Self { sheet, animations })
    }

    pub fn frame_size(&self) -> pctk_core::geometry::Size {
        self.sheet.frame_size()
    }

    pub fn has_action(&self, action: ActionCode) -> bool {
        self.animations.contains_key(&action.as_u8())
    }

    /// Draw the animation mapped to `action`; unmapped actions draw
    /// nothing.
    pub fn draw(
        &mut self,
        render: &mut dyn RenderBackend,
        action: ActionCode,
        pos: Pos,
        now: Instant,
    ) {
        if let Some(animation) = self.animations.get_mut(&action.as_u8()) {
            animation.draw(render, &self.sheet, pos, now);
        }
    }
}
