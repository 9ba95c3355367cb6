//! The top-level simulation loop.
//!
//! Frame order: advance the music stream, draw the world, drain and execute
//! queued commands, tick activities and dialogs, then pace to the target
//! rate. Input handling and control-panel drawing belong to the host
//! application; the engine exposes the sender and the world so the host can
//! feed both.

use std::time::Instant;

use pctk_core::future::Future;
use pctk_core::queue::{CommandQueue, CommandSender};
use pctk_core::time::{FrameClock, DEFAULT_TARGET_FPS};
use pctk_resource::format::ResourceRef;
use pctk_resource::loader::ResourceLoader;

use crate::backend::{AudioBackend, RenderBackend};
use crate::commands::ScenePlay;
use crate::world::World;

pub struct Engine {
    world: World,
    queue: CommandQueue<World>,
    clock: FrameClock,
}

impl Engine {
    pub fn new(
        render: Box<dyn RenderBackend>,
        audio: Box<dyn AudioBackend>,
        loader: Box<dyn ResourceLoader>,
    ) -> Self {
        let queue = CommandQueue::new();
        let world = World::new(render, audio, loader, queue.sender());
        Self {
            world,
            queue,
            clock: FrameClock::new(DEFAULT_TARGET_FPS),
        }
    }

    pub fn sender(&self) -> CommandSender<World> {
        self.queue.sender()
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Kick off a scene script. Its commands land in subsequent frames.
    pub fn play_scene(&mut self, script: ResourceRef) -> Future<()> {
        self.queue.push(Box::new(ScenePlay { script }))
    }

    /// One simulation frame, without pacing. Exposed for hosts that drive
    /// the loop themselves and for tests.
    pub fn run_frame(&mut self, now: Instant) {
        self.world.audio.advance_music_stream();
        self.world.draw(now);
        self.queue.drain_and_execute(&mut self.world);
        self.world.tick(now);
    }

    /// Run paced frames until `stop` completes.
    pub fn run_until(&mut self, stop: Future<()>) {
        while !stop.is_completed() {
            self.clock.begin_frame();
            self.run_frame(Instant::now());
            self.clock.sleep_until_deadline();
        }
        log::info!("simulation loop stopped after {} frames", self.clock.frame_count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::ActorId;
    use crate::backend::NullBackend;
    use crate::commands::{ActorShow, ActorSpeak, ActorWalkTo, RoomShow};
    use glam::Vec2;
    use pctk_core::future::FutureError;
    use pctk_resource::format::{
        CostumeData, ResourceRef, RoomData, ScriptData, SpriteSheetData, WalkboxData,
    };
    use pctk_resource::loader::BundleLoader;
    use std::time::Duration;

    fn test_png() -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(2, 2, image::Rgba([255, 255, 255, 255]));
        let mut bytes = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .expect("encode test png");
        bytes
    }

    fn sheet() -> SpriteSheetData {
        SpriteSheetData {
            frame_size: pctk_core::geometry::Size::new(1, 1),
            image: test_png(),
        }
    }

    fn demo_bundle() -> BundleLoader {
        let mut bundle = BundleLoader::new();
        bundle.insert_room(
            ResourceRef::new("demo", "bar"),
            RoomData {
                background: sheet(),
                walkboxes: vec![WalkboxData {
                    id: "floor".into(),
                    enabled: true,
                    vertices: [(0, 0), (320, 0), (320, 144), (0, 144)],
                }],
                objects: vec![],
                script: None,
            },
        );
        bundle.insert_costume(
            ResourceRef::new("demo", "hero"),
            CostumeData {
                sheet: sheet(),
                animations: vec![],
            },
        );
        bundle.insert_script(
            ResourceRef::new("demo", "boot"),
            ScriptData::lua(b"RoomShow('demo:bar')".to_vec()),
        );
        bundle
    }

    fn engine() -> Engine {
        Engine::new(
            Box::new(NullBackend::new()),
            Box::new(NullBackend::new()),
            Box::new(demo_bundle()),
        )
    }

    fn run_frames(engine: &mut Engine, count: usize) {
        for _ in 0..count {
            engine.run_frame(Instant::now());
        }
    }

    #[test]
    fn three_commands_from_one_task_execute_in_order_within_two_frames() {
        let mut engine = engine();
        let sender = engine.sender();
        let handle = std::thread::spawn(move || {
            let a = sender.push(Box::new(RoomShow {
                room: ResourceRef::new("demo", "bar"),
            }));
            let b = sender.push(Box::new(ActorShow {
                actor: ActorId::new("hero"),
                costume: Some(ResourceRef::new("demo", "hero")),
                pos: Some(Vec2::new(10.0, 100.0)),
                dir: None,
            }));
            let c = sender.push(Box::new(ActorSpeak {
                actor: ActorId::new("hero"),
                text: "hi".into(),
                color: None,
                duration: Some(Duration::from_millis(1)),
            }));
            (a, b, c)
        });
        let (a, b, c) = handle.join().expect("producer thread panicked");

        run_frames(&mut engine, 2);
        assert_eq!(a.wait(), Ok(()));
        assert_eq!(b.wait(), Ok(()));
        // The speak completes once its 1ms dialog expires.
        std::thread::sleep(Duration::from_millis(5));
        run_frames(&mut engine, 2);
        assert_eq!(c.wait(), Ok(()));
    }

    #[test]
    fn walking_is_cancelled_by_a_newer_walk() {
        let mut engine = engine();
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
        run_frames(&mut engine, 1);

        let first = sender.push(Box::new(ActorWalkTo {
            actor: ActorId::new("hero"),
            to: Vec2::new(300.0, 100.0),
        }));
        run_frames(&mut engine, 2);
        assert!(!first.is_completed());

        let second = sender.push(Box::new(ActorWalkTo {
            actor: ActorId::new("hero"),
            to: Vec2::new(14.0, 100.0),
        }));
        run_frames(&mut engine, 200);
        assert_eq!(first.wait(), Err(FutureError::PromiseBroken));
        assert_eq!(second.wait(), Ok(()));
        let hero = engine
            .world()
            .actor(&ActorId::new("hero"))
            .expect("hero exists");
        assert_eq!(hero.pos, Vec2::new(14.0, 100.0));
    }

    #[test]
    fn play_scene_runs_a_script_that_drives_the_world() {
        let mut engine = engine();
        let finished = engine.play_scene(ResourceRef::new("demo", "boot"));
        // Frame 1 starts the script; the script's RoomShow lands on a later
        // drain once the background thread has pushed it.
        for _ in 0..200 {
            engine.run_frame(Instant::now());
            if finished.is_completed() && engine.world().current_room().is_some() {
                break;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        assert_eq!(finished.wait(), Ok(()));
        run_frames(&mut engine, 1);
        assert!(engine.world().current_room().is_some());
    }
}
