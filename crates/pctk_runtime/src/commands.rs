//! The script-facing command set.
//!
//! Every command runs on the loop thread against the world and settles its
//! completion promise: synchronously for instant commands, by binding it to
//! an activity or script future for long-running ones. Precondition
//! failures complete the promise with the error so awaiting scripts see it.

use std::time::{Duration, Instant};

use glam::Vec2;

use pctk_core::future::{Future, Promise};
use pctk_core::geometry::{Color, Direction, Pos};
use pctk_core::queue::Command;
use pctk_resource::format::ResourceRef;

use crate::actor::ActorId;
use crate::backend::SCREEN_WIDTH;
use crate::world::{RoomItem, Verb, World, WorldError};

/// Default anchor for narration lines with no explicit position.
const DIALOG_DEFAULT_POS: Pos = Pos::new(SCREEN_WIDTH as i32 / 2, 16);

fn fail(done: Promise<()>, name: &str, err: WorldError) {
    log::error!("{name} failed: {err}");
    done.complete_with_error(err.into());
}

pub struct RoomShow {
    pub room: ResourceRef,
}

impl Command<World> for RoomShow {
    fn execute(self: Box<Self>, world: &mut World, done: Promise<()>) {
        match world.show_room(&self.room, Instant::now()) {
            Ok(()) => done.complete(),
            Err(err) => fail(done, self.name(), err),
        }
    }

    fn name(&self) -> &'static str {
        "room.show"
    }
}

pub struct ActorShow {
    pub actor: ActorId,
    pub costume: Option<ResourceRef>,
    pub pos: Option<Vec2>,
    pub dir: Option<Direction>,
}

impl Command<World> for ActorShow {
    fn execute(self: Box<Self>, world: &mut World, done: Promise<()>) {
        match world.show_actor(
            &self.actor,
            self.costume.as_ref(),
            self.pos,
            self.dir,
            Instant::now(),
        ) {
            Ok(()) => done.complete(),
            Err(err) => fail(done, self.name(), err),
        }
    }

    fn name(&self) -> &'static str {
        "actor.show"
    }
}

pub struct ActorWalkTo {
    pub actor: ActorId,
    pub to: Vec2,
}

impl Command<World> for ActorWalkTo {
    fn execute(self: Box<Self>, world: &mut World, done: Promise<()>) {
        match world.walk_actor(&self.actor, self.to) {
            Ok(arrived) => done.bind(arrived),
            Err(err) => fail(done, self.name(), err),
        }
    }

    fn name(&self) -> &'static str {
        "actor.walk_to"
    }
}

pub struct ActorStand {
    pub actor: ActorId,
    pub dir: Option<Direction>,
}

impl Command<World> for ActorStand {
    fn execute(self: Box<Self>, world: &mut World, done: Promise<()>) {
        match world.stand_actor(&self.actor, self.dir) {
            Ok(standing) => done.bind(standing),
            Err(err) => fail(done, self.name(), err),
        }
    }

    fn name(&self) -> &'static str {
        "actor.stand"
    }
}

pub struct ActorSpeak {
    pub actor: ActorId,
    pub text: String,
    pub color: Option<Color>,
    pub duration: Option<Duration>,
}

impl Command<World> for ActorSpeak {
    fn execute(self: Box<Self>, world: &mut World, done: Promise<()>) {
        match world.speak_actor(
            &self.actor,
            &self.text,
            self.color,
            self.duration,
            Instant::now(),
        ) {
            Ok(spoken) => done.bind(spoken),
            Err(err) => fail(done, self.name(), err),
        }
    }

    fn name(&self) -> &'static str {
        "actor.speak"
    }
}

pub struct ActorSelectEgo {
    pub actor: ActorId,
}

impl Command<World> for ActorSelectEgo {
    fn execute(self: Box<Self>, world: &mut World, done: Promise<()>) {
        match world.select_ego(&self.actor) {
            Ok(()) => done.complete(),
            Err(err) => fail(done, self.name(), err),
        }
    }

    fn name(&self) -> &'static str {
        "actor.select_ego"
    }
}

pub struct DialogShow {
    pub text: String,
    pub pos: Option<Pos>,
    pub color: Option<Color>,
    pub speed: Option<f32>,
}

impl Command<World> for DialogShow {
    fn execute(self: Box<Self>, world: &mut World, done: Promise<()>) {
        let expiry = world.show_dialog(
            &self.text,
            self.pos.unwrap_or(DIALOG_DEFAULT_POS),
            self.color.unwrap_or(Color::WHITE),
            self.speed.unwrap_or(1.0),
            Instant::now(),
        );
        done.bind(expiry);
    }

    fn name(&self) -> &'static str {
        "dialog.show"
    }
}

pub struct MusicPlay {
    pub music: ResourceRef,
}

impl Command<World> for MusicPlay {
    fn execute(self: Box<Self>, world: &mut World, done: Promise<()>) {
        match world.play_music(&self.music) {
            Ok(()) => done.complete(),
            Err(err) => fail(done, self.name(), err),
        }
    }

    fn name(&self) -> &'static str {
        "music.play"
    }
}

pub struct MusicStop;

impl Command<World> for MusicStop {
    fn execute(self: Box<Self>, world: &mut World, done: Promise<()>) {
        world.audio.stop_music();
        done.complete();
    }

    fn name(&self) -> &'static str {
        "music.stop"
    }
}

pub struct MusicPause;

impl Command<World> for MusicPause {
    fn execute(self: Box<Self>, world: &mut World, done: Promise<()>) {
        world.audio.pause_music();
        done.complete();
    }

    fn name(&self) -> &'static str {
        "music.pause"
    }
}

pub struct MusicResume;

impl Command<World> for MusicResume {
    fn execute(self: Box<Self>, world: &mut World, done: Promise<()>) {
        world.audio.resume_music();
        done.complete();
    }

    fn name(&self) -> &'static str {
        "music.resume"
    }
}

pub struct SoundPlay {
    pub sound: ResourceRef,
}

impl Command<World> for SoundPlay {
    fn execute(self: Box<Self>, world: &mut World, done: Promise<()>) {
        match world.play_sound(&self.sound) {
            Ok(()) => done.complete(),
            Err(err) => fail(done, self.name(), err),
        }
    }

    fn name(&self) -> &'static str {
        "sound.play"
    }
}

pub struct SoundStop;

impl Command<World> for SoundStop {
    fn execute(self: Box<Self>, world: &mut World, done: Promise<()>) {
        world.audio.stop_sound();
        done.complete();
    }

    fn name(&self) -> &'static str {
        "sound.stop"
    }
}

pub struct EnableControlPanel {
    pub enabled: bool,
}

impl Command<World> for EnableControlPanel {
    fn execute(self: Box<Self>, world: &mut World, done: Promise<()>) {
        world.enable_control_panel(self.enabled);
        done.complete();
    }

    fn name(&self) -> &'static str {
        "control_panel.enable"
    }
}

pub struct ScenePlay {
    pub script: ResourceRef,
}

impl Command<World> for ScenePlay {
    fn execute(self: Box<Self>, world: &mut World, done: Promise<()>) {
        match world.run_script(&self.script, None) {
            Ok(finished) => done.bind(finished),
            Err(err) => fail(done, self.name(), err),
        }
    }

    fn name(&self) -> &'static str {
        "scene.play"
    }
}

/// Run an item's verb handler in its room script. Split out of
/// `ObjectInteract` so the handler starts on the frame after the approach
/// finishes.
pub struct RunItemVerb {
    pub item: RoomItem,
    pub verb: Verb,
}

impl Command<World> for RunItemVerb {
    fn execute(self: Box<Self>, world: &mut World, done: Promise<()>) {
        match world.run_item_verb(&self.item, self.verb) {
            Ok(finished) => done.bind(finished),
            Err(err) => fail(done, self.name(), err),
        }
    }

    fn name(&self) -> &'static str {
        "item.run_verb"
    }
}

/// Walk to an item's use position, face its use direction, then run its
/// verb handler. The walk is skipped for items already in the actor's
/// inventory. A failure anywhere in the chain is logged and recovered so
/// one bad interaction cannot abort a scripted scene.
pub struct ObjectInteract {
    pub actor: ActorId,
    pub item: RoomItem,
    pub verb: Verb,
}

impl Command<World> for ObjectInteract {
    fn execute(self: Box<Self>, world: &mut World, done: Promise<()>) {
        let (use_pos, use_dir) = match world.item_target(&self.item) {
            Ok(target) => target,
            Err(err) => return fail(done, self.name(), err),
        };
        let skip_walk = world.is_in_inventory(&self.actor, &self.item);
        let sender = world.sender();
        let Self { actor, item, verb } = *self;

        let approach = if skip_walk {
            Future::resolved(())
        } else {
            sender.push(Box::new(ActorWalkTo {
                actor: actor.clone(),
                to: use_pos,
            }))
        };
        let stand_sender = sender.clone();
        let verb_sender = sender.clone();
        let chain = approach
            .and_then(move |_| {
                stand_sender.push(Box::new(ActorStand {
                    actor,
                    dir: Some(use_dir),
                }))
            })
            .and_then(move |_| verb_sender.push(Box::new(RunItemVerb { item, verb })))
            .recover(|err| {
                log::warn!("interaction failed: {err}");
                Future::resolved(())
            });
        done.bind(chain);
    }

    fn name(&self) -> &'static str {
        "object.interact"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::NullBackend;
    use crate::engine::Engine;
    use crate::object::ObjectId;
    use pctk_core::geometry::{Rect, Size};
    use pctk_resource::format::{ObjectData, RoomData, ScriptData, SpriteSheetData, WalkboxData};
    use pctk_resource::loader::BundleLoader;

    fn test_png() -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(2, 2, image::Rgba([255, 255, 255, 255]));
        let mut bytes = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .expect("encode test png");
        bytes
    }

    fn bar_with_key() -> RoomData {
        RoomData {
            background: SpriteSheetData {
                frame_size: Size::new(2, 2),
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
                hotspot: Rect::new(46, 76, 8, 8),
                classes: 0,
                use_pos: Pos::new(50, 90),
                use_dir: Direction::Up,
                states: vec![],
            }],
            script: Some(ResourceRef::new("demo", "bar_script")),
        }
    }

    fn engine() -> Engine {
        let mut bundle = BundleLoader::new();
        bundle.insert_room(ResourceRef::new("demo", "bar"), bar_with_key());
        let handlers = b"function key_pickup()
  EnableControlPanel(true)
end
function key_open()
  error('stuck')
end";
        bundle.insert_script(
            ResourceRef::new("demo", "bar_script"),
            ScriptData::lua(handlers.to_vec()),
        );
        Engine::new(
            Box::new(NullBackend::new()),
            Box::new(NullBackend::new()),
            Box::new(bundle),
        )
    }

    fn show_hero(engine: &Engine) {
        let sender = engine.sender();
        sender.push(Box::new(RoomShow {
            room: ResourceRef::new("demo", "bar"),
        }));
        sender.push(Box::new(ActorShow {
            actor: ActorId::new("hero"),
            costume: None,
            pos: Some(Vec2::new(10.0, 100.0)),
            dir: None,
        }));
    }

    fn interact(engine: &Engine, verb: Verb) -> Future<()> {
        engine.sender().push(Box::new(ObjectInteract {
            actor: ActorId::new("hero"),
            item: RoomItem::Object(ObjectId::new("key")),
            verb,
        }))
    }

    // The verb handler runs on a script thread, so frames need real time
    // between them.
    fn run_until_completed(engine: &mut Engine, pending: &Future<()>) {
        for _ in 0..500 {
            engine.run_frame(Instant::now());
            if pending.is_completed() {
                return;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        panic!("interaction did not finish");
    }

    #[test]
    fn interacting_walks_to_the_use_position_faces_it_and_runs_the_verb() {
        let mut engine = engine();
        show_hero(&engine);
        let done = interact(&engine, Verb::PickUp);
        run_until_completed(&mut engine, &done);
        assert_eq!(done.wait(), Ok(()));
        // The panel command pushed by the handler lands on the next drain.
        engine.run_frame(Instant::now());

        let hero = engine
            .world()
            .actor(&ActorId::new("hero"))
            .expect("hero exists");
        assert_eq!(hero.pos, Vec2::new(50.0, 90.0));
        assert_eq!(hero.direction, Direction::Up);
        assert!(engine.world().control_panel_enabled());
        assert_eq!(
            engine
                .world()
                .item_caption(&RoomItem::Object(ObjectId::new("key")))
                .expect("key has a caption"),
            "brass key"
        );
    }

    #[test]
    fn interacting_with_a_held_item_skips_the_walk() {
        let mut engine = engine();
        show_hero(&engine);
        engine.run_frame(Instant::now());
        engine
            .world_mut()
            .pick_up(&ActorId::new("hero"), &ObjectId::new("key"))
            .expect("key picked up");

        let done = interact(&engine, Verb::PickUp);
        run_until_completed(&mut engine, &done);
        assert_eq!(done.wait(), Ok(()));

        let hero = engine
            .world()
            .actor(&ActorId::new("hero"))
            .expect("hero exists");
        assert_eq!(hero.pos, Vec2::new(10.0, 100.0));
        assert_eq!(hero.direction, Direction::Up);
    }

    #[test]
    fn a_failing_verb_handler_is_logged_and_recovered() {
        let mut engine = engine();
        show_hero(&engine);
        let done = interact(&engine, Verb::Open);
        run_until_completed(&mut engine, &done);
        assert_eq!(done.wait(), Ok(()));
    }

    #[test]
    fn interacting_with_an_unknown_object_fails_the_promise() {
        let mut engine = engine();
        show_hero(&engine);
        let done = engine.sender().push(Box::new(ObjectInteract {
            actor: ActorId::new("hero"),
            item: RoomItem::Object(ObjectId::new("anvil")),
            verb: Verb::PickUp,
        }));
        engine.run_frame(Instant::now());
        assert!(done.wait().is_err());
    }
}
