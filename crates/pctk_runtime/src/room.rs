//! Rooms: a background, a floor, and the objects standing on it.
//!
//! A room owns its walkbox matrix and the ids of its objects; the objects
//! themselves live in the world's arena so inventories can hold them after
//! the actor leaves the room. The optional script resource provides the
//! `enter`/`exit` hooks and the objects' verb handlers.

use std::fmt;

use pctk_resource::format::ResourceRef;

use crate::backend::RenderBackend;
use crate::object::ObjectId;
use crate::sprite::SpriteSheet;
use crate::walkbox::WalkboxMatrix;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub struct Room {
    pub id: RoomId,
    background: SpriteSheet,
    pub objects: Vec<ObjectId>,
    pub walkboxes: WalkboxMatrix,
    pub script: Option<ResourceRef>,
}

impl Room {
    pub fn new(
        id: RoomId,
        background: SpriteSheet,
        objects: Vec<ObjectId>,
        walkboxes: WalkboxMatrix,
        script: Option<ResourceRef>,
    ) -> Self {
        Self {
            id,
            background,
            objects,
            walkboxes,
            script,
        }
    }

    /// The background doubles as the sprite sheet object animations cut
    /// their frames from.
    pub fn background(&self) -> &SpriteSheet {
        &self.background
    }

    pub fn draw_background(&self, render: &mut dyn RenderBackend) {
        render.draw_background(self.background.texture());
    }
}
