//! The single owned simulation state.
//!
//! All mutation happens on the loop thread through commands; script tasks
//! only ever hold a `CommandSender`. Rooms, actors, and objects live in
//! id-keyed arenas and reference each other by id, never by pointer, so an
//! inventory can outlive the room its object came from.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use glam::Vec2;
use thiserror::Error;

use pctk_core::future::{Future, FutureError};
use pctk_core::geometry::{Color, Direction, Pos, Rect};
use pctk_core::queue::CommandSender;
use pctk_resource::codec::ResourceError;
use pctk_resource::format::{ResourceRef, ScriptLanguage};
use pctk_resource::loader::{require, ResourceLoader};

use crate::actor::{Actor, ActorId};
use crate::backend::{AudioBackend, RenderBackend};
use crate::costume::Costume;
use crate::dialog::Dialog;
use crate::object::{Object, ObjectId};
use crate::room::{Room, RoomId};
use crate::script::ScriptHost;
use crate::sprite::SpriteSheet;
use crate::walkbox::{WalkboxError, WalkboxMatrix};

#[derive(Debug, Error)]
pub enum WorldError {
    #[error("actor '{0}' is not in a room")]
    NotInRoom(String),
    #[error("no room is being shown")]
    NoActiveRoom,
    #[error("no such actor '{0}'")]
    UnknownActor(String),
    #[error("no such object '{0}'")]
    UnknownObject(String),
    #[error("script language {0:?} is not supported")]
    UnsupportedLanguage(ScriptLanguage),
    #[error(transparent)]
    Resource(#[from] ResourceError),
    #[error(transparent)]
    Walkbox(#[from] WalkboxError),
    #[error("{0}")]
    Backend(String),
}

impl From<WorldError> for FutureError {
    fn from(err: WorldError) -> Self {
        FutureError::Failed(err.to_string())
    }
}

/// The player intents that select an object's verb handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    WalkTo,
    LookAt,
    PickUp,
    Open,
    Close,
    Push,
    Pull,
    Use,
    TalkTo,
    Give,
}

impl Verb {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WalkTo => "walkto",
            Self::LookAt => "lookat",
            Self::PickUp => "pickup",
            Self::Open => "open",
            Self::Close => "close",
            Self::Push => "push",
            Self::Pull => "pull",
            Self::Use => "use",
            Self::TalkTo => "talkto",
            Self::Give => "give",
        }
    }
}

/// Anything in a room an actor can interact with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomItem {
    Actor(ActorId),
    Object(ObjectId),
}

/// The capability surface interaction needs from a room item.
pub trait UseTarget {
    fn use_pos(&self) -> Vec2;
    fn use_dir(&self) -> Direction;
    fn caption(&self) -> &str;
    fn bounds(&self) -> Rect;
}

impl UseTarget for Object {
    fn use_pos(&self) -> Vec2 {
        self.use_pos.to_vec2()
    }

    fn use_dir(&self) -> Direction {
        self.use_dir
    }

    fn caption(&self) -> &str {
        &self.name
    }

    fn bounds(&self) -> Rect {
        self.hotspot
    }
}

impl UseTarget for Actor {
    fn use_pos(&self) -> Vec2 {
        self.pos
    }

    fn use_dir(&self) -> Direction {
        self.direction
    }

    fn caption(&self) -> &str {
        &self.name
    }

    fn bounds(&self) -> Rect {
        let feet = Pos::from_vec2(self.pos);
        match &self.costume {
            Some(costume) => {
                let frame = costume.frame_size();
                Rect::new(
                    feet.x - frame.w as i32 / 2,
                    feet.y - frame.h as i32,
                    frame.w,
                    frame.h,
                )
            }
            None => Rect::new(feet.x - 8, feet.y - 16, 16, 16),
        }
    }
}

pub struct World {
    pub render: Box<dyn RenderBackend>,
    pub audio: Box<dyn AudioBackend>,
    loader: Box<dyn ResourceLoader>,
    scripts: ScriptHost,
    sender: CommandSender<World>,
    rooms: HashMap<RoomId, Room>,
    actors: HashMap<ActorId, Actor>,
    objects: HashMap<ObjectId, Object>,
    current_room: Option<RoomId>,
    dialogs: Vec<Dialog>,
    ego: Option<ActorId>,
    control_panel: bool,
}

impl World {
    pub fn new(
        render: Box<dyn RenderBackend>,
        audio: Box<dyn AudioBackend>,
        loader: Box<dyn ResourceLoader>,
        sender: CommandSender<World>,
    ) -> Self {
        Self {
            render,
            audio,
            loader,
            scripts: ScriptHost::new(sender.clone()),
            sender,
            rooms: HashMap::new(),
            actors: HashMap::new(),
            objects: HashMap::new(),
            current_room: None,
            dialogs: Vec::new(),
            ego: None,
            control_panel: false,
        }
    }

    pub fn sender(&self) -> CommandSender<World> {
        self.sender.clone()
    }

    pub fn current_room(&self) -> Option<&Room> {
        self.current_room.as_ref().and_then(|id| self.rooms.get(id))
    }

    pub fn current_room_mut(&mut self) -> Option<&mut Room> {
        let id = self.current_room.clone()?;
        self.rooms.get_mut(&id)
    }

    pub fn actor(&self, id: &ActorId) -> Option<&Actor> {
        self.actors.get(id)
    }

    pub fn actor_mut(&mut self, id: &ActorId) -> Option<&mut Actor> {
        self.actors.get_mut(id)
    }

    pub fn object(&self, id: &ObjectId) -> Option<&Object> {
        self.objects.get(id)
    }

    pub fn object_mut(&mut self, id: &ObjectId) -> Option<&mut Object> {
        self.objects.get_mut(id)
    }

    pub fn ego(&self) -> Option<&ActorId> {
        self.ego.as_ref()
    }

    pub fn control_panel_enabled(&self) -> bool {
        self.control_panel
    }

    pub fn enable_control_panel(&mut self, enabled: bool) {
        self.control_panel = enabled;
    }

    pub fn dialog_count(&self) -> usize {
        self.dialogs.len()
    }

    /// Load a room on first use and make it current, firing the outgoing
    /// room's `exit` hook and the incoming room's `enter` hook.
    pub fn show_room(&mut self, rref: &ResourceRef, now: Instant) -> Result<(), WorldError> {
        let id = RoomId::new(rref.to_string());
        if !self.rooms.contains_key(&id) {
            let data = require(rref, self.loader.load_room(rref))?;
            let background = SpriteSheet::from_data(self.render.as_mut(), &data.background)
                .map_err(WorldError::Backend)?;
            let walkboxes = WalkboxMatrix::from_data(&data.walkboxes)?;
            let mut object_ids = Vec::with_capacity(data.objects.len());
            for object_data in &data.objects {
                let object = Object::from_data(object_data, id.clone(), now);
                if self.objects.contains_key(&object.id) {
                    log::warn!("object id '{}' already exists; replacing", object.id);
                }
                object_ids.push(object.id.clone());
                self.objects.insert(object.id.clone(), object);
            }
            self.rooms.insert(
                id.clone(),
                Room::new(id.clone(), background, object_ids, walkboxes, data.script.clone()),
            );
            log::info!("room '{id}' loaded");
        }

        if self.current_room.as_ref() == Some(&id) {
            return Ok(());
        }
        if let Some(previous) = self.current_room.take() {
            self.run_room_hook(&previous, "exit");
        }
        self.current_room = Some(id.clone());
        self.run_room_hook(&id, "enter");
        Ok(())
    }

    /// Place an actor in the current room, creating it on first mention.
    pub fn show_actor(
        &mut self,
        id: &ActorId,
        costume_ref: Option<&ResourceRef>,
        pos: Option<Vec2>,
        dir: Option<Direction>,
        now: Instant,
    ) -> Result<(), WorldError> {
        let room = self.current_room.clone().ok_or(WorldError::NoActiveRoom)?;
        let costume = match costume_ref {
            Some(rref) => {
                let data = require(rref, self.loader.load_costume(rref))?;
                Some(
                    Costume::from_data(self.render.as_mut(), &data, now)
                        .map_err(WorldError::Backend)?,
                )
            }
            None => None,
        };
        let actor = self
            .actors
            .entry(id.clone())
            .or_insert_with(|| Actor::new(id.clone()));
        actor.room = Some(room);
        if let Some(pos) = pos {
            actor.pos = pos;
        }
        if let Some(dir) = dir {
            actor.direction = dir;
        }
        if costume.is_some() {
            actor.costume = costume;
        }
        Ok(())
    }

    /// Route the actor to `to` through its room's walkboxes and start the
    /// walk. The returned future completes when the actor arrives.
    pub fn walk_actor(&mut self, id: &ActorId, to: Vec2) -> Result<Future<()>, WorldError> {
        let actor = self
            .actors
            .get(id)
            .ok_or_else(|| WorldError::UnknownActor(id.to_string()))?;
        let room_id = actor
            .room
            .clone()
            .ok_or_else(|| WorldError::NotInRoom(id.to_string()))?;
        let from = actor.pos;
        let path = self
            .rooms
            .get(&room_id)
            .ok_or_else(|| WorldError::NotInRoom(id.to_string()))?
            .walkboxes
            .path(from, to);
        let actor = self
            .actors
            .get_mut(id)
            .ok_or_else(|| WorldError::UnknownActor(id.to_string()))?;
        Ok(actor.walk_along(path))
    }

    pub fn stand_actor(
        &mut self,
        id: &ActorId,
        dir: Option<Direction>,
    ) -> Result<Future<()>, WorldError> {
        let actor = self
            .actors
            .get_mut(id)
            .ok_or_else(|| WorldError::UnknownActor(id.to_string()))?;
        let dir = dir.unwrap_or(actor.direction);
        Ok(actor.stand(dir))
    }

    /// Put up a speech line for the actor and keep it in the speaking
    /// activity until the line expires.
    pub fn speak_actor(
        &mut self,
        id: &ActorId,
        text: &str,
        color: Option<Color>,
        duration: Option<Duration>,
        now: Instant,
    ) -> Result<Future<()>, WorldError> {
        let actor = self
            .actors
            .get(id)
            .ok_or_else(|| WorldError::UnknownActor(id.to_string()))?;
        if actor.room.is_none() {
            return Err(WorldError::NotInRoom(id.to_string()));
        }
        let pos = actor.speech_pos();
        let color = color.unwrap_or(actor.talk_color);
        let (dialog, expiry) = Dialog::new(text, pos, color, 1.0, duration, now);
        self.dialogs.push(dialog);
        let actor = self
            .actors
            .get_mut(id)
            .ok_or_else(|| WorldError::UnknownActor(id.to_string()))?;
        Ok(actor.speak_until(expiry))
    }

    pub fn select_ego(&mut self, id: &ActorId) -> Result<(), WorldError> {
        if !self.actors.contains_key(id) {
            return Err(WorldError::UnknownActor(id.to_string()));
        }
        self.ego = Some(id.clone());
        Ok(())
    }

    /// Show a narration line not tied to any actor. Returns the expiry
    /// future.
    pub fn show_dialog(
        &mut self,
        text: &str,
        pos: Pos,
        color: Color,
        speed: f32,
        now: Instant,
    ) -> Future<()> {
        let (dialog, expiry) = Dialog::new(text, pos, color, speed, None, now);
        self.dialogs.push(dialog);
        expiry
    }

    pub fn play_music(&mut self, rref: &ResourceRef) -> Result<(), WorldError> {
        let music = require(rref, self.loader.load_music(rref))?;
        self.audio.play_music(music.format, &music.data);
        Ok(())
    }

    pub fn play_sound(&mut self, rref: &ResourceRef) -> Result<(), WorldError> {
        let sound = require(rref, self.loader.load_sound(rref))?;
        self.audio.play_sound(sound.format, &sound.data);
        Ok(())
    }

    /// Move an object into an actor's inventory. The object disappears from
    /// its room until ownership is cleared.
    pub fn pick_up(&mut self, actor_id: &ActorId, object_id: &ObjectId) -> Result<(), WorldError> {
        let name = {
            let object = self
                .objects
                .get_mut(object_id)
                .ok_or_else(|| WorldError::UnknownObject(object_id.to_string()))?;
            object.owner = Some(actor_id.clone());
            object.name.clone()
        };
        let actor = self
            .actors
            .get_mut(actor_id)
            .ok_or_else(|| WorldError::UnknownActor(actor_id.to_string()))?;
        actor.inventory.add(name, object_id.clone());
        Ok(())
    }

    pub fn is_in_inventory(&self, actor_id: &ActorId, item: &RoomItem) -> bool {
        let RoomItem::Object(object_id) = item else {
            return false;
        };
        self.actors
            .get(actor_id)
            .is_some_and(|actor| actor.inventory.contains(object_id))
    }

    /// The walk target and final facing for interacting with an item.
    pub fn item_target(&self, item: &RoomItem) -> Result<(Vec2, Direction), WorldError> {
        let target: &dyn UseTarget = match item {
            RoomItem::Actor(id) => self
                .actors
                .get(id)
                .ok_or_else(|| WorldError::UnknownActor(id.to_string()))?,
            RoomItem::Object(id) => self
                .objects
                .get(id)
                .ok_or_else(|| WorldError::UnknownObject(id.to_string()))?,
        };
        Ok((target.use_pos(), target.use_dir()))
    }

    pub fn item_caption(&self, item: &RoomItem) -> Result<String, WorldError> {
        let target: &dyn UseTarget = match item {
            RoomItem::Actor(id) => self
                .actors
                .get(id)
                .ok_or_else(|| WorldError::UnknownActor(id.to_string()))?,
            RoomItem::Object(id) => self
                .objects
                .get(id)
                .ok_or_else(|| WorldError::UnknownObject(id.to_string()))?,
        };
        Ok(target.caption().to_string())
    }

    /// Run a script resource on a background task. `entry` names a function
    /// to call after the chunk body; scripts without it just run the body.
    pub fn run_script(
        &mut self,
        rref: &ResourceRef,
        entry: Option<&str>,
    ) -> Result<Future<()>, WorldError> {
        let script = require(rref, self.loader.load_script(rref))?;
        if script.language != ScriptLanguage::Lua {
            return Err(WorldError::UnsupportedLanguage(script.language));
        }
        Ok(self
            .scripts
            .run(script.code, rref.to_string(), entry.map(str::to_string)))
    }

    /// Run the verb handler for an item: the function
    /// `<item id>_<verb>` in the owning room's script.
    pub fn run_item_verb(&mut self, item: &RoomItem, verb: Verb) -> Result<Future<()>, WorldError> {
        let (room_id, entry) = match item {
            RoomItem::Object(id) => {
                let object = self
                    .objects
                    .get(id)
                    .ok_or_else(|| WorldError::UnknownObject(id.to_string()))?;
                (object.room.clone(), format!("{}_{}", id, verb.as_str()))
            }
            RoomItem::Actor(id) => {
                let actor = self
                    .actors
                    .get(id)
                    .ok_or_else(|| WorldError::UnknownActor(id.to_string()))?;
                let room = actor
                    .room
                    .clone()
                    .ok_or_else(|| WorldError::NotInRoom(id.to_string()))?;
                (room, format!("{}_{}", id, verb.as_str()))
            }
        };
        let script_ref = self
            .rooms
            .get(&room_id)
            .and_then(|room| room.script.clone())
            .ok_or_else(|| {
                WorldError::Resource(ResourceError::NotFound(format!("script for room '{room_id}'")))
            })?;
        self.run_script(&script_ref, Some(&entry))
    }

    /// Fire-and-forget room lifecycle hook; failures are logged and
    /// swallowed.
    fn run_room_hook(&mut self, room_id: &RoomId, entry: &str) {
        let Some(script_ref) = self
            .rooms
            .get(room_id)
            .and_then(|room| room.script.clone())
        else {
            return;
        };
        match self.run_script(&script_ref, Some(entry)) {
            Ok(future) => {
                let label = format!("room '{room_id}' {entry} hook");
                future.on_complete(move |result| {
                    if let Err(err) = result {
                        log::debug!("{label} failed: {err}");
                    }
                });
            }
            Err(err) => log::warn!("room '{room_id}' {entry} hook not started: {err}"),
        }
    }

    /// Advance actor activities and retire expired dialogs. Runs once per
    /// frame after the command drain.
    pub fn tick(&mut self, now: Instant) {
        for actor in self.actors.values_mut() {
            actor.tick();
        }
        let (expired, live): (Vec<_>, Vec<_>) = std::mem::take(&mut self.dialogs)
            .into_iter()
            .partition(|dialog| dialog.is_expired(now));
        self.dialogs = live;
        for dialog in expired {
            dialog.finish();
        }
    }

    /// Draw one frame of the current room: background, visible objects,
    /// actors back-to-front by their feet, then dialog lines on top.
    pub fn draw(&mut self, now: Instant) {
        let Some(room_id) = self.current_room.clone() else {
            return;
        };
        let Self {
            render,
            rooms,
            objects,
            actors,
            dialogs,
            ..
        } = self;
        let Some(room) = rooms.get(&room_id) else {
            return;
        };
        room.draw_background(render.as_mut());
        for object_id in &room.objects {
            if let Some(object) = objects.get_mut(object_id) {
                if object.is_visible() {
                    object.draw(render.as_mut(), room.background(), now);
                }
            }
        }
        let mut in_room: Vec<&mut Actor> = actors
            .values_mut()
            .filter(|actor| actor.room.as_ref() == Some(&room_id))
            .collect();
        in_room.sort_by(|a, b| a.pos.y.total_cmp(&b.pos.y));
        for actor in in_room {
            actor.draw(render.as_mut(), now);
        }
        for dialog in dialogs.iter() {
            dialog.draw(render.as_mut());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::NullBackend;
    use pctk_core::queue::CommandQueue;
    use pctk_resource::format::{ObjectData, RoomData, SpriteSheetData, WalkboxData};
    use pctk_resource::loader::BundleLoader;

    fn test_png() -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(2, 2, image::Rgba([255, 255, 255, 255]));
        let mut bytes = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .expect("encode test png");
        bytes
    }

    fn bar_room() -> RoomData {
        RoomData {
            background: SpriteSheetData {
                frame_size: pctk_core::geometry::Size::new(2, 2),
                image: test_png(),
            },
            walkboxes: vec![WalkboxData {
                id: "floor".into(),
                enabled: true,
                vertices: [(0, 0), (320, 0), (320, 144), (0, 144)],
            }],
            objects: vec![ObjectData {
                id: "key".into(),
                name: "brass key".into(),
                pos: Pos::new(50, 80),
                hotspot: Rect::new(50, 80, 8, 8),
                classes: 0,
                use_pos: Pos::new(50, 90),
                use_dir: Direction::Up,
                states: vec![],
            }],
            script: None,
        }
    }

    fn world_with_room() -> (CommandQueue<World>, World) {
        let queue = CommandQueue::new();
        let mut bundle = BundleLoader::new();
        bundle.insert_room(ResourceRef::new("demo", "bar"), bar_room());
        let mut world = World::new(
            Box::new(NullBackend::new()),
            Box::new(NullBackend::new()),
            Box::new(bundle),
            queue.sender(),
        );
        world
            .show_room(&ResourceRef::new("demo", "bar"), Instant::now())
            .expect("room loads");
        (queue, world)
    }

    #[test]
    fn showing_a_room_loads_its_objects_into_the_arena() {
        let (_queue, world) = world_with_room();
        assert!(world.current_room().is_some());
        let key = world.object(&ObjectId::new("key")).expect("key exists");
        assert!(key.is_visible());
        assert_eq!(key.name, "brass key");
    }

    #[test]
    fn showing_an_unknown_room_reports_not_found() {
        let (_queue, mut world) = world_with_room();
        let err = world
            .show_room(&ResourceRef::new("demo", "attic"), Instant::now())
            .expect_err("must fail");
        assert!(matches!(
            err,
            WorldError::Resource(ResourceError::NotFound(_))
        ));
    }

    #[test]
    fn actors_cannot_appear_without_an_active_room() {
        let queue = CommandQueue::new();
        let mut world = World::new(
            Box::new(NullBackend::new()),
            Box::new(NullBackend::new()),
            Box::new(BundleLoader::new()),
            queue.sender(),
        );
        let err = world
            .show_actor(&ActorId::new("hero"), None, None, None, Instant::now())
            .expect_err("must fail");
        assert!(matches!(err, WorldError::NoActiveRoom));
    }

    #[test]
    fn pick_up_hides_the_object_and_fills_the_inventory() {
        let (_queue, mut world) = world_with_room();
        world
            .show_actor(&ActorId::new("hero"), None, None, None, Instant::now())
            .expect("actor appears");

        let key = ObjectId::new("key");
        world.pick_up(&ActorId::new("hero"), &key).expect("pick up");

        assert!(!world.object(&key).expect("key exists").is_visible());
        let hero = world.actor(&ActorId::new("hero")).expect("hero exists");
        assert_eq!(hero.inventory.row_of(&key), Some(0));
        assert!(world.is_in_inventory(&ActorId::new("hero"), &RoomItem::Object(key)));
    }

    #[test]
    fn item_target_dispatches_on_the_variant() {
        let (_queue, mut world) = world_with_room();
        world
            .show_actor(
                &ActorId::new("hero"),
                None,
                Some(Vec2::new(30.0, 70.0)),
                Some(Direction::Left),
                Instant::now(),
            )
            .expect("actor appears");

        let (pos, dir) = world
            .item_target(&RoomItem::Object(ObjectId::new("key")))
            .expect("object target");
        assert_eq!(pos, Vec2::new(50.0, 90.0));
        assert_eq!(dir, Direction::Up);

        let (pos, dir) = world
            .item_target(&RoomItem::Actor(ActorId::new("hero")))
            .expect("actor target");
        assert_eq!(pos, Vec2::new(30.0, 70.0));
        assert_eq!(dir, Direction::Left);
    }

    #[test]
    fn select_ego_requires_a_known_actor() {
        let (_queue, mut world) = world_with_room();
        let err = world
            .select_ego(&ActorId::new("ghost"))
            .expect_err("must fail");
        assert!(matches!(err, WorldError::UnknownActor(_)));

        world
            .show_actor(&ActorId::new("hero"), None, None, None, Instant::now())
            .expect("actor appears");
        world.select_ego(&ActorId::new("hero")).expect("ego set");
        assert_eq!(world.ego(), Some(&ActorId::new("hero")));
    }

    #[test]
    fn expired_dialogs_complete_their_promises_on_tick() {
        let (_queue, mut world) = world_with_room();
        let now = Instant::now();
        let expiry = world.show_dialog("hello", Pos::new(160, 16), Color::WHITE, 1.0, now);
        assert_eq!(world.dialog_count(), 1);

        world.tick(now + Duration::from_millis(100));
        assert!(!expiry.is_completed());

        world.tick(now + Duration::from_secs(3));
        assert_eq!(world.dialog_count(), 0);
        assert_eq!(expiry.wait(), Ok(()));
    }

    #[test]
    fn speaking_requires_the_actor_to_be_somewhere() {
        let (_queue, mut world) = world_with_room();
        let err = world
            .speak_actor(&ActorId::new("ghost"), "boo", None, None, Instant::now())
            .map(|_| ())
            .expect_err("must fail");
        assert!(matches!(err, WorldError::UnknownActor(_)));
    }
}
