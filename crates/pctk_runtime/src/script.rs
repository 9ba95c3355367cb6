//! Rust <-> Lua bridge for scene scripting.
//!
//! Design contract: Lua scripts provide **intents**, never direct mutation
//! of world state. Every API function builds a command, pushes it through a
//! cloned queue handle, and hands the completion future back to Lua as a
//! userdata with `IsCompleted()` and `Wait()`. Scripts run on background
//! threads with a fresh Lua state each, so a crashed scene leaks nothing
//! into the next one; the only channel back into the engine is the queue.

use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use glam::Vec2;
use mlua::prelude::*;

use pctk_core::future::{Future, FutureError, Promise};
use pctk_core::geometry::{Color, Direction, Pos};
use pctk_core::queue::CommandSender;
use pctk_resource::format::ResourceRef;

use crate::actor::ActorId;
use crate::commands::{
    ActorSelectEgo, ActorShow, ActorSpeak, ActorStand, ActorWalkTo, DialogShow,
    EnableControlPanel, MusicPause, MusicPlay, MusicResume, MusicStop, RoomShow, ScenePlay,
    SoundPlay, SoundStop,
};
use crate::world::World;

pub struct ScriptHost {
    sender: CommandSender<World>,
}

impl ScriptHost {
    pub fn new(sender: CommandSender<World>) -> Self {
        Self { sender }
    }

    /// Execute a script chunk on its own thread. The returned future
    /// completes when the chunk (and the optional `entry` function) has
    /// finished, or fails with the Lua error.
    pub fn run(&self, code: Vec<u8>, chunk: String, entry: Option<String>) -> Future<()> {
        let sender = self.sender.clone();
        let (done, finished) = Promise::new();
        let spawned = thread::Builder::new()
            .name(format!("script-{chunk}"))
            .spawn(move || match execute_chunk(&sender, &code, &chunk, entry.as_deref()) {
                Ok(()) => done.complete(),
                Err(err) => {
                    log::error!("script '{chunk}' failed: {err}");
                    done.complete_with_error(FutureError::Failed(err.to_string()));
                }
            });
        match spawned {
            Ok(_) => finished,
            Err(err) => {
                log::error!("failed to spawn script thread: {err}");
                Future::rejected(FutureError::Failed(format!(
                    "failed to spawn script thread: {err}"
                )))
            }
        }
    }
}

fn execute_chunk(
    sender: &CommandSender<World>,
    code: &[u8],
    chunk: &str,
    entry: Option<&str>,
) -> LuaResult<()> {
    let lua = Lua::new();
    register_api(&lua, sender)?;
    lua.load(code).set_name(chunk).exec()?;
    if let Some(entry) = entry {
        match lua.globals().get::<LuaFunction>(entry) {
            Ok(function) => function.call::<()>(())?,
            Err(_) => log::debug!("script '{chunk}' has no '{entry}' function"),
        }
    }
    Ok(())
}

/// Completion handle exposed to scripts. `Wait` consumes the underlying
/// future; a second `Wait` (or waiting a completed future) returns
/// immediately. Failed futures report `false` rather than raising, so a
/// cancelled walk does not abort the whole scene.
struct ScriptFuture(Mutex<Option<Future<()>>>);

impl ScriptFuture {
    fn new(future: Future<()>) -> Self {
        Self(Mutex::new(Some(future)))
    }
}

impl LuaUserData for ScriptFuture {
    fn add_methods<M: LuaUserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("IsCompleted", |_, this, ()| {
            let slot = match this.0.lock() {
                Ok(slot) => slot,
                Err(poisoned) => poisoned.into_inner(),
            };
            Ok(slot.as_ref().map_or(true, Future::is_completed))
        });

        methods.add_method("Wait", |_, this, ()| {
            let taken = {
                let mut slot = match this.0.lock() {
                    Ok(slot) => slot,
                    Err(poisoned) => poisoned.into_inner(),
                };
                slot.take()
            };
            match taken {
                Some(future) => match future.wait() {
                    Ok(()) => Ok(true),
                    Err(err) => {
                        log::debug!("script waited on a failed future: {err}");
                        Ok(false)
                    }
                },
                None => Ok(true),
            }
        });
    }
}

fn parse_ref(raw: &str) -> LuaResult<ResourceRef> {
    ResourceRef::parse(raw).map_err(LuaError::external)
}

fn opt_vec2(opts: Option<&LuaTable>, key: &str) -> LuaResult<Option<Vec2>> {
    let Some(table) = opts else { return Ok(None) };
    let value: Option<LuaTable> = table.get(key)?;
    match value {
        Some(pos) => Ok(Some(Vec2::new(pos.get::<f32>("x")?, pos.get::<f32>("y")?))),
        None => Ok(None),
    }
}

fn opt_pos(opts: Option<&LuaTable>, key: &str) -> LuaResult<Option<Pos>> {
    let Some(table) = opts else { return Ok(None) };
    let value: Option<LuaTable> = table.get(key)?;
    match value {
        Some(pos) => Ok(Some(Pos::new(pos.get::<i32>("x")?, pos.get::<i32>("y")?))),
        None => Ok(None),
    }
}

fn opt_dir(opts: Option<&LuaTable>) -> LuaResult<Option<Direction>> {
    let Some(table) = opts else { return Ok(None) };
    let value: Option<u8> = table.get("dir")?;
    match value {
        Some(raw) => Direction::from_u8(raw)
            .map(Some)
            .ok_or_else(|| LuaError::RuntimeError(format!("invalid direction {raw}"))),
        None => Ok(None),
    }
}

fn opt_color(opts: Option<&LuaTable>) -> LuaResult<Option<Color>> {
    let Some(table) = opts else { return Ok(None) };
    let value: Option<LuaTable> = table.get("color")?;
    match value {
        Some(color) => Ok(Some(Color {
            r: color.get::<u8>("r")?,
            g: color.get::<u8>("g")?,
            b: color.get::<u8>("b")?,
            a: color.get::<Option<u8>>("a")?.unwrap_or(255),
        })),
        None => Ok(None),
    }
}

fn opt_f32(opts: Option<&LuaTable>, key: &str) -> LuaResult<Option<f32>> {
    match opts {
        Some(table) => table.get(key),
        None => Ok(None),
    }
}

fn opt_millis(opts: Option<&LuaTable>, key: &str) -> LuaResult<Option<Duration>> {
    let value: Option<u64> = match opts {
        Some(table) => table.get(key)?,
        None => None,
    };
    Ok(value.map(Duration::from_millis))
}

fn opt_string(opts: Option<&LuaTable>, key: &str) -> LuaResult<Option<String>> {
    match opts {
        Some(table) => table.get(key),
        None => Ok(None),
    }
}

/// Install the script-facing API and constants into a fresh Lua state.
fn register_api(lua: &Lua, sender: &CommandSender<World>) -> LuaResult<()> {
    let globals = lua.globals();
    register_constants(lua)?;

    let s = sender.clone();
    globals.set(
        "ScenePlay",
        lua.create_function(move |_, script: String| {
            let script = parse_ref(&script)?;
            Ok(ScriptFuture::new(s.push(Box::new(ScenePlay { script }))))
        })?,
    )?;

    let s = sender.clone();
    globals.set(
        "RoomShow",
        lua.create_function(move |_, room: String| {
            let room = parse_ref(&room)?;
            Ok(ScriptFuture::new(s.push(Box::new(RoomShow { room }))))
        })?,
    )?;

    let s = sender.clone();
    globals.set(
        "ActorShow",
        lua.create_function(
            move |_, (costume, actor, opts): (String, String, Option<LuaTable>)| {
                let mut costume = if costume.is_empty() {
                    None
                } else {
                    Some(parse_ref(&costume)?)
                };
                if let Some(raw) = opt_string(opts.as_ref(), "costume")? {
                    costume = Some(parse_ref(&raw)?);
                }
                Ok(ScriptFuture::new(s.push(Box::new(ActorShow {
                    actor: ActorId::new(actor),
                    costume,
                    pos: opt_vec2(opts.as_ref(), "pos")?,
                    dir: opt_dir(opts.as_ref())?,
                }))))
            },
        )?,
    )?;

    let s = sender.clone();
    globals.set(
        "ActorWalkToPosition",
        lua.create_function(move |_, (actor, pos): (String, LuaTable)| {
            let to = Vec2::new(pos.get::<f32>("x")?, pos.get::<f32>("y")?);
            Ok(ScriptFuture::new(s.push(Box::new(ActorWalkTo {
                actor: ActorId::new(actor),
                to,
            }))))
        })?,
    )?;

    let s = sender.clone();
    globals.set(
        "ActorStand",
        lua.create_function(move |_, (actor, opts): (String, Option<LuaTable>)| {
            Ok(ScriptFuture::new(s.push(Box::new(ActorStand {
                actor: ActorId::new(actor),
                dir: opt_dir(opts.as_ref())?,
            }))))
        })?,
    )?;

    let s = sender.clone();
    globals.set(
        "ActorSpeak",
        lua.create_function(
            move |_, (actor, text, opts): (String, String, Option<LuaTable>)| {
                Ok(ScriptFuture::new(s.push(Box::new(ActorSpeak {
                    actor: ActorId::new(actor),
                    text,
                    color: opt_color(opts.as_ref())?,
                    duration: opt_millis(opts.as_ref(), "delay")?,
                }))))
            },
        )?,
    )?;

    let s = sender.clone();
    globals.set(
        "ActorSelectEgo",
        lua.create_function(move |_, actor: String| {
            Ok(ScriptFuture::new(s.push(Box::new(ActorSelectEgo {
                actor: ActorId::new(actor),
            }))))
        })?,
    )?;

    let s = sender.clone();
    globals.set(
        "DialogShow",
        lua.create_function(move |_, (text, opts): (String, Option<LuaTable>)| {
            Ok(ScriptFuture::new(s.push(Box::new(DialogShow {
                text,
                pos: opt_pos(opts.as_ref(), "pos")?,
                color: opt_color(opts.as_ref())?,
                speed: opt_f32(opts.as_ref(), "speed")?,
            }))))
        })?,
    )?;

    let s = sender.clone();
    globals.set(
        "MusicPlay",
        lua.create_function(move |_, music: String| {
            let music = parse_ref(&music)?;
            Ok(ScriptFuture::new(s.push(Box::new(MusicPlay { music }))))
        })?,
    )?;

    let s = sender.clone();
    globals.set(
        "MusicStop",
        lua.create_function(move |_, ()| Ok(ScriptFuture::new(s.push(Box::new(MusicStop)))))?,
    )?;

    let s = sender.clone();
    globals.set(
        "MusicPause",
        lua.create_function(move |_, ()| Ok(ScriptFuture::new(s.push(Box::new(MusicPause)))))?,
    )?;

    let s = sender.clone();
    globals.set(
        "MusicResume",
        lua.create_function(move |_, ()| Ok(ScriptFuture::new(s.push(Box::new(MusicResume)))))?,
    )?;

    let s = sender.clone();
    globals.set(
        "SoundPlay",
        lua.create_function(move |_, sound: String| {
            let sound = parse_ref(&sound)?;
            Ok(ScriptFuture::new(s.push(Box::new(SoundPlay { sound }))))
        })?,
    )?;

    let s = sender.clone();
    globals.set(
        "SoundStop",
        lua.create_function(move |_, ()| Ok(ScriptFuture::new(s.push(Box::new(SoundStop)))))?,
    )?;

    let s = sender.clone();
    globals.set(
        "EnableControlPanel",
        lua.create_function(move |_, enabled: bool| {
            Ok(ScriptFuture::new(
                s.push(Box::new(EnableControlPanel { enabled })),
            ))
        })?,
    )?;

    globals.set(
        "SleepMillis",
        lua.create_function(|_, ms: u64| {
            thread::sleep(Duration::from_millis(ms));
            Ok(())
        })?,
    )?;

    Ok(())
}

fn register_constants(lua: &Lua) -> LuaResult<()> {
    let globals = lua.globals();
    let palette = [
        ("Black", Color::BLACK),
        ("Blue", Color::BLUE),
        ("Green", Color::GREEN),
        ("Cyan", Color::CYAN),
        ("Red", Color::RED),
        ("Magenta", Color::MAGENTA),
        ("Brown", Color::BROWN),
        ("LightGray", Color::LIGHT_GRAY),
        ("DarkGray", Color::DARK_GRAY),
        ("BrightBlue", Color::BRIGHT_BLUE),
        ("BrightGreen", Color::BRIGHT_GREEN),
        ("BrightCyan", Color::BRIGHT_CYAN),
        ("BrightRed", Color::BRIGHT_RED),
        ("BrightMagenta", Color::BRIGHT_MAGENTA),
        ("Yellow", Color::YELLOW),
        ("White", Color::WHITE),
    ];
    for (name, color) in palette {
        let table = lua.create_table()?;
        table.set("r", color.r)?;
        table.set("g", color.g)?;
        table.set("b", color.b)?;
        table.set("a", color.a)?;
        globals.set(name, table)?;
    }

    globals.set("DirUp", Direction::Up.as_u8())?;
    globals.set("DirRight", Direction::Right.as_u8())?;
    globals.set("DirDown", Direction::Down.as_u8())?;
    globals.set("DirLeft", Direction::Left.as_u8())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::NullBackend;
    use pctk_core::queue::CommandQueue;
    use pctk_resource::loader::BundleLoader;
    use std::time::Instant;

    fn test_world(queue: &CommandQueue<World>) -> World {
        World::new(
            Box::new(NullBackend::new()),
            Box::new(NullBackend::new()),
            Box::new(BundleLoader::new()),
            queue.sender(),
        )
    }

    fn drain_until_done(queue: &CommandQueue<World>, world: &mut World, finished: &Future<()>) {
        for _ in 0..500 {
            queue.drain_and_execute(world);
            world.tick(Instant::now());
            if finished.is_completed() {
                return;
            }
            thread::sleep(Duration::from_millis(2));
        }
        panic!("script did not finish");
    }

    #[test]
    fn scripts_push_commands_through_the_queue() {
        let queue = CommandQueue::new();
        let host = ScriptHost::new(queue.sender());
        let mut world = test_world(&queue);

        let finished = host.run(
            b"EnableControlPanel(true)".to_vec(),
            "panel".into(),
            None,
        );
        assert_eq!(finished.wait(), Ok(()));

        queue.drain_and_execute(&mut world);
        assert!(world.control_panel_enabled());
    }

    #[test]
    fn wait_blocks_until_the_loop_executes_the_command() {
        let queue = CommandQueue::new();
        let host = ScriptHost::new(queue.sender());
        let mut world = test_world(&queue);

        let finished = host.run(
            br#"
                local f = EnableControlPanel(true)
                f:Wait()
                assert(f:IsCompleted())
            "#
            .to_vec(),
            "wait".into(),
            None,
        );
        drain_until_done(&queue, &mut world, &finished);
        assert_eq!(finished.wait(), Ok(()));
        assert!(world.control_panel_enabled());
    }

    #[test]
    fn color_and_direction_constants_are_visible() {
        let queue = CommandQueue::new();
        let host = ScriptHost::new(queue.sender());

        let finished = host.run(
            br#"
                assert(DirUp == 0 and DirLeft == 3)
                assert(White.r == 255 and White.g == 255 and White.b == 255)
                assert(Black.r == 0 and Black.a == 255)
            "#
            .to_vec(),
            "constants".into(),
            None,
        );
        assert_eq!(finished.wait(), Ok(()));
    }

    #[test]
    fn entry_function_runs_after_the_chunk_body() {
        let queue = CommandQueue::new();
        let host = ScriptHost::new(queue.sender());
        let mut world = test_world(&queue);

        let finished = host.run(
            br#"
                function enter()
                    DialogShow("welcome", { speed = 2.0 })
                end
            "#
            .to_vec(),
            "hooked".into(),
            Some("enter".into()),
        );
        assert_eq!(finished.wait(), Ok(()));

        queue.drain_and_execute(&mut world);
        assert_eq!(world.dialog_count(), 1);
    }

    #[test]
    fn missing_entry_function_is_not_an_error() {
        let queue = CommandQueue::new();
        let host = ScriptHost::new(queue.sender());
        let finished = host.run(b"local x = 1".to_vec(), "bare".into(), Some("enter".into()));
        assert_eq!(finished.wait(), Ok(()));
    }

    #[test]
    fn lua_errors_fail_the_script_future() {
        let queue = CommandQueue::new();
        let host = ScriptHost::new(queue.sender());
        let finished = host.run(b"this is not lua !@#".to_vec(), "broken".into(), None);
        assert!(matches!(finished.wait(), Err(FutureError::Failed(_))));
    }
}
