//! JSON bundle manifests for embedded demos and tests.
//!
//! A manifest declares one package's resources in a human-editable form and
//! assembles them into a `BundleLoader`. File references (images, audio)
//! are resolved relative to the manifest's directory. Validation is strict
//! on identifiers so later lookups can assume uniqueness.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use pctk_core::geometry::{Direction, Pos, Rect, Size};

use crate::format::{
    AnimationData, AnimationFrames, CostumeData, ObjectData, ObjectStateData, ResourceRef,
    RoomData, ScriptData, SoundData, SpriteSheetData, WalkboxData,
};
use crate::loader::BundleLoader;

#[derive(Debug, Deserialize)]
pub struct BundleManifest {
    pub version: String,
    pub package: String,
    #[serde(default)]
    pub scripts: Vec<ScriptEntry>,
    #[serde(default)]
    pub sounds: Vec<AudioEntry>,
    #[serde(default)]
    pub music: Vec<AudioEntry>,
    #[serde(default)]
    pub costumes: Vec<CostumeEntry>,
    #[serde(default)]
    pub rooms: Vec<RoomEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ScriptEntry {
    pub id: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct AudioEntry {
    pub id: String,
    pub format: String,
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct SheetEntry {
    pub image: String,
    pub frame_w: u32,
    pub frame_h: u32,
}

#[derive(Debug, Deserialize)]
pub struct AnimationEntry {
    pub action: u8,
    #[serde(default)]
    pub flip: bool,
    pub frames: Vec<FrameEntry>,
}

#[derive(Debug, Deserialize)]
pub struct FrameEntry {
    pub row: u32,
    pub delay_ms: u32,
    pub columns: Vec<u32>,
}

#[derive(Debug, Deserialize)]
pub struct CostumeEntry {
    pub id: String,
    pub sheet: SheetEntry,
    pub animations: Vec<AnimationEntry>,
}

#[derive(Debug, Deserialize)]
pub struct RoomEntry {
    pub id: String,
    pub background: SheetEntry,
    #[serde(default)]
    pub walkboxes: Vec<WalkboxEntry>,
    #[serde(default)]
    pub objects: Vec<ObjectEntry>,
    #[serde(default)]
    pub script: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WalkboxEntry {
    pub id: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub vertices: [[i32; 2]; 4],
}

#[derive(Debug, Deserialize)]
pub struct ObjectEntry {
    pub id: String,
    pub name: String,
    pub pos: [i32; 2],
    pub hotspot: [i32; 4],
    #[serde(default)]
    pub classes: u32,
    pub use_pos: [i32; 2],
    pub use_dir: u8,
    #[serde(default)]
    pub states: Vec<ObjectStateEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ObjectStateEntry {
    #[serde(default)]
    pub animation: Option<StateAnimationEntry>,
}

#[derive(Debug, Deserialize)]
pub struct StateAnimationEntry {
    #[serde(default)]
    pub flip: bool,
    pub frames: Vec<FrameEntry>,
}

const fn default_enabled() -> bool {
    true
}

/// Load a manifest and assemble the bundle it declares.
pub fn load_bundle_manifest(path: &Path) -> Result<(String, BundleLoader), String> {
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read bundle manifest {}: {e}", path.display()))?;
    let manifest: BundleManifest = serde_json::from_str(&raw)
        .map_err(|e| format!("Failed to parse bundle manifest {}: {e}", path.display()))?;
    validate_manifest(&manifest)?;

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    let package = manifest.package.clone();
    let mut bundle = BundleLoader::new();

    for script in &manifest.scripts {
        bundle.insert_script(
            ResourceRef::new(&package, &script.id),
            ScriptData::lua(script.code.as_bytes().to_vec()),
        );
    }

    for (entries, music) in [(&manifest.sounds, false), (&manifest.music, true)] {
        for audio in entries {
            let data = read_file(base, &audio.path)?;
            let sound = SoundData {
                format: audio_format_tag(&audio.format)?,
                data,
            };
            let rref = ResourceRef::new(&package, &audio.id);
            if music {
                bundle.insert_music(rref, sound);
            } else {
                bundle.insert_sound(rref, sound);
            }
        }
    }

    for costume in &manifest.costumes {
        let sheet = load_sheet(base, &costume.sheet)?;
        let animations = costume
            .animations
            .iter()
            .map(|a| (a.action, animation_data(a.flip, &a.frames)))
            .collect();
        bundle.insert_costume(
            ResourceRef::new(&package, &costume.id),
            CostumeData { sheet, animations },
        );
    }

    for room in &manifest.rooms {
        let background = load_sheet(base, &room.background)?;
        let walkboxes = room
            .walkboxes
            .iter()
            .map(|w| WalkboxData {
                id: w.id.clone(),
                enabled: w.enabled,
                vertices: [
                    (w.vertices[0][0], w.vertices[0][1]),
                    (w.vertices[1][0], w.vertices[1][1]),
                    (w.vertices[2][0], w.vertices[2][1]),
                    (w.vertices[3][0], w.vertices[3][1]),
                ],
            })
            .collect();
        let mut objects = Vec::new();
        for entry in &room.objects {
            objects.push(object_data(entry)?);
        }
        let script = match &room.script {
            Some(raw) => Some(
                ResourceRef::parse(raw)
                    .map_err(|e| format!("Room '{}' has a bad script ref: {e}", room.id))?,
            ),
            None => None,
        };
        bundle.insert_room(
            ResourceRef::new(&package, &room.id),
            RoomData {
                background,
                walkboxes,
                objects,
                script,
            },
        );
    }

    Ok((package, bundle))
}

fn validate_manifest(manifest: &BundleManifest) -> Result<(), String> {
    if manifest.version != "0.1" {
        return Err(format!(
            "Bundle validation failed: unsupported version '{}'",
            manifest.version
        ));
    }
    if manifest.package.is_empty() || manifest.package.contains(':') {
        return Err(format!(
            "Bundle validation failed: bad package name '{}'",
            manifest.package
        ));
    }

    let mut ids = HashSet::new();
    let all_ids = manifest
        .scripts
        .iter()
        .map(|s| &s.id)
        .chain(manifest.sounds.iter().map(|s| &s.id))
        .chain(manifest.music.iter().map(|m| &m.id))
        .chain(manifest.costumes.iter().map(|c| &c.id))
        .chain(manifest.rooms.iter().map(|r| &r.id));
    for id in all_ids {
        if id.is_empty() {
            return Err("Bundle validation failed: empty resource id".to_string());
        }
        if !ids.insert(id.clone()) {
            return Err(format!(
                "Bundle validation failed: duplicate resource id '{id}'"
            ));
        }
    }

    for costume in &manifest.costumes {
        let mut actions = HashSet::new();
        for animation in &costume.animations {
            if !actions.insert(animation.action) {
                return Err(format!(
                    "Bundle validation failed: costume '{}' maps action {:#04x} twice",
                    costume.id, animation.action
                ));
            }
            validate_frames(&costume.id, &animation.frames)?;
        }
    }

    for room in &manifest.rooms {
        let mut walkbox_ids = HashSet::new();
        for walkbox in &room.walkboxes {
            if !walkbox_ids.insert(walkbox.id.clone()) {
                return Err(format!(
                    "Bundle validation failed: room '{}' has duplicate walkbox '{}'",
                    room.id, walkbox.id
                ));
            }
        }
        let mut object_ids = HashSet::new();
        for object in &room.objects {
            if !object_ids.insert(object.id.clone()) {
                return Err(format!(
                    "Bundle validation failed: room '{}' has duplicate object '{}'",
                    room.id, object.id
                ));
            }
            if Direction::from_u8(object.use_dir).is_none() {
                return Err(format!(
                    "Bundle validation failed: object '{}' has invalid use_dir {}",
                    object.id, object.use_dir
                ));
            }
        }
    }

    Ok(())
}

fn validate_frames(owner: &str, frames: &[FrameEntry]) -> Result<(), String> {
    if frames.is_empty() {
        return Err(format!(
            "Bundle validation failed: '{owner}' has an animation with no frames"
        ));
    }
    for frame in frames {
        if frame.delay_ms == 0 {
            return Err(format!(
                "Bundle validation failed: '{owner}' has a frame with zero delay"
            ));
        }
        if frame.columns.is_empty() {
            return Err(format!(
                "Bundle validation failed: '{owner}' has a frame row with no columns"
            ));
        }
    }
    Ok(())
}

fn load_sheet(base: &Path, sheet: &SheetEntry) -> Result<SpriteSheetData, String> {
    if sheet.frame_w == 0 || sheet.frame_h == 0 {
        return Err(format!(
            "Bundle validation failed: sheet '{}' has a zero frame size",
            sheet.image
        ));
    }
    Ok(SpriteSheetData {
        frame_size: Size::new(sheet.frame_w, sheet.frame_h),
        image: read_file(base, &sheet.image)?,
    })
}

fn read_file(base: &Path, relative: &str) -> Result<Vec<u8>, String> {
    let path = base.join(relative);
    fs::read(&path).map_err(|e| format!("Failed to read bundle file {}: {e}", path.display()))
}

fn audio_format_tag(format: &str) -> Result<[u8; 4], String> {
    let bytes = format.as_bytes();
    if bytes.len() != 4 {
        return Err(format!(
            "Bundle validation failed: audio format tag '{format}' must be exactly 4 bytes"
        ));
    }
    Ok([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn animation_data(flip: bool, frames: &[FrameEntry]) -> AnimationData {
    AnimationData {
        flip,
        frames: frames
            .iter()
            .map(|f| AnimationFrames {
                row: f.row,
                delay_ms: f.delay_ms,
                columns: f.columns.clone(),
            })
            .collect(),
    }
}

fn object_data(entry: &ObjectEntry) -> Result<ObjectData, String> {
    let use_dir = Direction::from_u8(entry.use_dir)
        .ok_or_else(|| format!("Object '{}' has invalid use_dir", entry.id))?;
    if entry.hotspot[2] < 0 || entry.hotspot[3] < 0 {
        return Err(format!("Object '{}' has a negative hotspot size", entry.id));
    }
    Ok(ObjectData {
        id: entry.id.clone(),
        name: entry.name.clone(),
        pos: Pos::new(entry.pos[0], entry.pos[1]),
        hotspot: Rect::new(
            entry.hotspot[0],
            entry.hotspot[1],
            entry.hotspot[2] as u32,
            entry.hotspot[3] as u32,
        ),
        classes: entry.classes,
        use_pos: Pos::new(entry.use_pos[0], entry.use_pos[1]),
        use_dir,
        states: entry
            .states
            .iter()
            .map(|s| ObjectStateData {
                animation: s
                    .animation
                    .as_ref()
                    .map(|a| animation_data(a.flip, &a.frames)),
            })
            .collect(),
    })
}
