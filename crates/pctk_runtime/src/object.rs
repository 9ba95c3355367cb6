//! Room objects: the things actors look at, pick up, and use.
//!
//! Objects carry a list of states and only the current state's animation is
//! drawn, from the owning room's background sheet. An object with an owner
//! is in somebody's inventory and no longer drawn in the room.

use std::fmt;
use std::time::Instant;

use pctk_core::geometry::{Direction, Pos, Rect};
use pctk_resource::format::ObjectData;

use crate::actor::ActorId;
use crate::backend::RenderBackend;
use crate::room::RoomId;
use crate::sprite::{Animation, SpriteSheet};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectId(String);

impl ObjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub struct ObjectState {
    pub animation: Option<Animation>,
}

pub struct Object {
    pub id: ObjectId,
    pub name: String,
    pub room: RoomId,
    pub pos: Pos,
    pub hotspot: Rect,
    pub classes: u32,
    pub use_pos: Pos,
    pub use_dir: Direction,
    pub owner: Option<ActorId>,
    states: Vec<ObjectState>,
    state: usize,
}

impl Object {
    pub fn from_data(data: &ObjectData, room: RoomId, now: Instant) -> Self {
        let states = data
            .states
            .iter()
            .map(|state| ObjectState {
                animation: state
                    .animation
                    .as_ref()
                    .map(|anim| Animation::from_data(anim, now)),
            })
            .collect();
        Self {
            id: ObjectId::new(&data.id),
            name: data.name.clone(),
            room,
            pos: data.pos,
            hotspot: data.hotspot,
            classes: data.classes,
            use_pos: data.use_pos,
            use_dir: data.use_dir,
            owner: None,
            states,
            state: 0,
        }
    }

    /// Owned objects live in an inventory, not in the room.
    pub fn is_visible(&self) -> bool {
        self.owner.is_none()
    }

    pub fn has_class(&self, mask: u32) -> bool {
        self.classes & mask != 0
    }

    pub fn state(&self) -> usize {
        self.state
    }

    /// Switch to another state; its animation restarts from the first
    /// frame. Out-of-range states are refused.
    pub fn set_state(&mut self, state: usize, now: Instant) -> bool {
        if state >= self.states.len() {
            return false;
        }
        self.state = state;
        if let Some(animation) = self.states[state].animation.as_mut() {
            animation.restart(now);
        }
        true
    }

    /// Draw the current state's animation, if it has one, from the room's
    /// sheet.
    pub fn draw(&mut self, render: &mut dyn RenderBackend, sheet: &SpriteSheet, now: Instant) {
        if let Some(animation) = self
            .states
            .get_mut(self.state)
            .and_then(|s| s.animation.as_mut())
        {
            animation.draw(render, sheet, self.pos, now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pctk_resource::format::{AnimationData, AnimationFrames, ObjectStateData};

    fn door_data(states: usize) -> ObjectData {
        ObjectData {
            id: "door".into(),
            name: "rusty door".into(),
            pos: Pos::new(40, 60),
            hotspot: Rect::new(40, 60, 16, 32),
            classes: 0b10,
            use_pos: Pos::new(48, 96),
            use_dir: Direction::Up,
            states: (0..states)
                .map(|_| ObjectStateData {
                    animation: Some(AnimationData {
                        flip: false,
                        frames: vec![AnimationFrames {
                            row: 0,
                            delay_ms: 100,
                            columns: vec![0],
                        }],
                    }),
                })
                .collect(),
        }
    }

    #[test]
    fn objects_start_unowned_and_visible() {
        let object = Object::from_data(&door_data(2), RoomId::new("bar"), Instant::now());
        assert!(object.is_visible());
        assert_eq!(object.state(), 0);
        assert!(object.has_class(0b10));
        assert!(!object.has_class(0b01));
    }

    #[test]
    fn owned_objects_are_hidden() {
        let mut object = Object::from_data(&door_data(1), RoomId::new("bar"), Instant::now());
        object.owner = Some(ActorId::new("guybrush"));
        assert!(!object.is_visible());
    }

    #[test]
    fn set_state_checks_bounds() {
        let now = Instant::now();
        let mut object = Object::from_data(&door_data(2), RoomId::new("bar"), now);
        assert!(object.set_state(1, now));
        assert_eq!(object.state(), 1);
        assert!(!object.set_state(2, now));
        assert_eq!(object.state(), 1);
    }
}
