//! Actors and their one-at-a-time activities.
//!
//! An actor is always doing exactly one thing: standing, walking a path, or
//! speaking a line. Starting a new activity breaks the previous activity's
//! promise, so whoever awaited it observes `PromiseBroken` instead of
//! waiting forever. `tick` runs once per frame on the loop thread and is
//! the only place activities make progress.

use std::collections::VecDeque;
use std::fmt;
use std::time::Instant;

use glam::Vec2;

use pctk_core::future::{Future, Promise};
use pctk_core::geometry::{Color, Direction, Pos};

use crate::backend::RenderBackend;
use crate::costume::{ActionCode, Costume};
use crate::inventory::Inventory;
use crate::room::RoomId;

/// Pixels an actor covers per simulation tick while walking.
pub const DEFAULT_WALK_SPEED: f32 = 2.0;
/// How far above the actor's feet its speech lines are anchored.
pub const DEFAULT_TALK_ELEVATION: i32 = 48;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActorId(String);

impl ActorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

enum Activity {
    Standing,
    Walking {
        path: VecDeque<Vec2>,
        done: Promise<()>,
    },
    Speaking {
        until: Future<()>,
        done: Promise<()>,
    },
}

pub struct Actor {
    pub id: ActorId,
    pub name: String,
    pub room: Option<RoomId>,
    pub pos: Vec2,
    pub direction: Direction,
    pub costume: Option<Costume>,
    pub inventory: Inventory,
    pub talk_color: Color,
    pub talk_elevation: i32,
    pub walk_speed: f32,
    activity: Activity,
}

impl Actor {
    pub fn new(id: ActorId) -> Self {
        let name = id.as_str().to_string();
        Self {
            id,
            name,
            room: None,
            pos: Vec2::ZERO,
            direction: Direction::default(),
            costume: None,
            inventory: Inventory::new(),
            talk_color: Color::WHITE,
            talk_elevation: DEFAULT_TALK_ELEVATION,
            walk_speed: DEFAULT_WALK_SPEED,
            activity: Activity::Standing,
        }
    }

    pub fn is_walking(&self) -> bool {
        matches!(self.activity, Activity::Walking { .. })
    }

    pub fn is_speaking(&self) -> bool {
        matches!(self.activity, Activity::Speaking { .. })
    }

    /// Face `dir` and do nothing. Cancels whatever was running.
    pub fn stand(&mut self, dir: Direction) -> Future<()> {
        self.cancel_current();
        self.direction = dir;
        Future::resolved(())
    }

    /// Follow `path` waypoint by waypoint. The future completes when the
    /// last waypoint is reached. An empty path completes immediately.
    pub fn walk_along(&mut self, path: Vec<Vec2>) -> Future<()> {
        self.cancel_current();
        if path.is_empty() {
            return Future::resolved(());
        }
        let (done, future) = Promise::new();
        self.activity = Activity::Walking {
            path: path.into(),
            done,
        };
        future
    }

    /// Play the speaking animation until `until` fires (normally a dialog's
    /// expiry future).
    pub fn speak_until(&mut self, until: Future<()>) -> Future<()> {
        self.cancel_current();
        let (done, future) = Promise::new();
        self.activity = Activity::Speaking { until, done };
        future
    }

    fn cancel_current(&mut self) {
        match std::mem::replace(&mut self.activity, Activity::Standing) {
            Activity::Standing => {}
            Activity::Walking { done, .. } | Activity::Speaking { done, .. } => {
                done.break_promise();
            }
        }
    }

    /// One simulation step. Walking advances by `walk_speed` pixels along
    /// the current segment; finishing an activity completes its promise and
    /// leaves the actor standing.
    pub fn tick(&mut self) {
        let step = self.walk_speed;
        let mut finished = false;
        match &mut self.activity {
            Activity::Standing => {}
            Activity::Walking { path, .. } => {
                if let Some(&target) = path.front() {
                    let delta = target - self.pos;
                    let distance = delta.length();
                    if distance > 0.0 {
                        self.direction = Direction::from_delta(delta);
                    }
                    if distance <= step {
                        self.pos = target;
                        path.pop_front();
                    } else {
                        self.pos += delta / distance * step;
                    }
                }
                finished = path.is_empty();
            }
            Activity::Speaking { until, .. } => {
                finished = until.is_completed();
            }
        }
        if finished {
            if let Activity::Walking { done, .. } | Activity::Speaking { done, .. } =
                std::mem::replace(&mut self.activity, Activity::Standing)
            {
                done.complete();
            }
        }
    }

    /// The costume action matching the current activity and facing.
    pub fn action_code(&self) -> ActionCode {
        match self.activity {
            Activity::Standing => ActionCode::idle(self.direction),
            Activity::Walking { .. } => ActionCode::walk(self.direction),
            Activity::Speaking { .. } => ActionCode::speak(self.direction),
        }
    }

    /// Screen anchor for this actor's speech lines.
    pub fn speech_pos(&self) -> Pos {
        Pos::from_vec2(self.pos).offset(0, -self.talk_elevation)
    }

    /// Draw the costume frame for the current action, anchored at the feet.
    pub fn draw(&mut self, render: &mut dyn RenderBackend, now: Instant) {
        let action = self.action_code();
        let feet = Pos::from_vec2(self.pos);
        if let Some(costume) = self.costume.as_mut() {
            let frame = costume.frame_size();
            let anchor = feet.offset(-(frame.w as i32) / 2, -(frame.h as i32));
            costume.draw(render, action, anchor, now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pctk_core::future::FutureError;

    fn actor() -> Actor {
        Actor::new(ActorId::new("guybrush"))
    }

    #[test]
    fn stand_sets_the_facing_and_completes_immediately() {
        let mut actor = actor();
        let future = actor.stand(Direction::Left);
        assert_eq!(actor.direction, Direction::Left);
        assert_eq!(future.wait(), Ok(()));
    }

    #[test]
    fn walking_advances_by_fixed_steps_and_completes() {
        let mut actor = actor();
        let future = actor.walk_along(vec![Vec2::new(6.0, 0.0)]);
        actor.tick();
        assert_eq!(actor.pos, Vec2::new(2.0, 0.0));
        assert!(actor.is_walking());
        actor.tick();
        actor.tick();
        assert_eq!(actor.pos, Vec2::new(6.0, 0.0));
        assert!(!actor.is_walking());
        assert_eq!(actor.direction, Direction::Right);
        assert_eq!(future.wait(), Ok(()));
    }

    #[test]
    fn walking_follows_every_waypoint() {
        let mut actor = actor();
        let future = actor.walk_along(vec![Vec2::new(2.0, 0.0), Vec2::new(2.0, 4.0)]);
        for _ in 0..3 {
            actor.tick();
        }
        assert_eq!(actor.pos, Vec2::new(2.0, 4.0));
        assert_eq!(actor.direction, Direction::Down);
        assert_eq!(future.wait(), Ok(()));
    }

    #[test]
    fn starting_a_new_walk_breaks_the_previous_promise() {
        let mut actor = actor();
        let first = actor.walk_along(vec![Vec2::new(100.0, 0.0)]);
        actor.tick();
        let second = actor.walk_along(vec![Vec2::new(4.0, 0.0)]);
        assert_eq!(first.wait(), Err(FutureError::PromiseBroken));
        actor.tick();
        assert_eq!(second.wait(), Ok(()));
    }

    #[test]
    fn speaking_ends_when_the_bound_future_fires() {
        let mut actor = actor();
        let (line_over, line_future) = Promise::new();
        let speaking = actor.speak_until(line_future);
        actor.tick();
        assert!(actor.is_speaking());
        line_over.complete();
        actor.tick();
        assert!(!actor.is_speaking());
        assert_eq!(speaking.wait(), Ok(()));
    }

    #[test]
    fn action_code_tracks_the_activity() {
        let mut actor = actor();
        actor.stand(Direction::Up);
        assert_eq!(actor.action_code(), ActionCode::idle(Direction::Up));
        actor.walk_along(vec![Vec2::new(50.0, 0.0)]);
        actor.tick();
        assert_eq!(actor.action_code(), ActionCode::walk(Direction::Right));
    }
}
