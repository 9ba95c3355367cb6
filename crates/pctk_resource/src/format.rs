//! Typed resource payloads and their wire encodings.
//!
//! Every payload type pairs an `encode` with a `decode` that is its exact
//! inverse; round-trips are bit-exact for all resource types. The walkbox
//! and object layouts inside `RoomData` follow the same declared-order,
//! no-padding convention as everything else.

use pctk_core::geometry::{Direction, Pos, Rect, Size};

use crate::codec::{Decoder, Encoder, ResourceError};

/// Value-typed reference to a packaged resource: `(package, id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceRef {
    pub package: String,
    pub id: String,
}

impl ResourceRef {
    pub fn new(package: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            id: id.into(),
        }
    }

    /// Parse the `package:id` form used by index files and scripts.
    pub fn parse(raw: &str) -> Result<Self, ResourceError> {
        match raw.split_once(':') {
            Some((package, id)) if !package.is_empty() && !id.is_empty() => {
                Ok(Self::new(package, id))
            }
            _ => Err(ResourceError::BadFormat(format!(
                "resource ref '{raw}' is not of the form package:id"
            ))),
        }
    }
}

impl std::fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.package, self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ResourceType {
    Undefined = 0,
    Costume = 1,
    Music = 2,
    Room = 3,
    Script = 4,
    Sound = 5,
}

impl ResourceType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Undefined),
            1 => Some(Self::Costume),
            2 => Some(Self::Music),
            3 => Some(Self::Room),
            4 => Some(Self::Script),
            5 => Some(Self::Sound),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Compression {
    None = 0,
    Gzip = 1,
}

impl Compression {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            1 => Some(Self::Gzip),
            _ => None,
        }
    }
}

/// Script source language. Lua is the only language the bundled host runs,
/// but the byte is kept open for others.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ScriptLanguage {
    Undefined = 0,
    Lua = 1,
}

impl ScriptLanguage {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Undefined),
            1 => Some(Self::Lua),
            _ => None,
        }
    }
}

/// A texture partitioned into a grid of fixed-size frames. The image bytes
/// are kept as encoded (png) data; decoding is the render backend's concern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpriteSheetData {
    pub frame_size: Size,
    pub image: Vec<u8>,
}

impl SpriteSheetData {
    pub fn encode(&self, enc: &mut Encoder) {
        enc.put_u32(self.frame_size.w);
        enc.put_u32(self.frame_size.h);
        enc.put_blob(&self.image);
    }

    pub fn decode(dec: &mut Decoder) -> Result<Self, ResourceError> {
        let w = dec.get_u32()?;
        let h = dec.get_u32()?;
        let image = dec.get_blob()?;
        Ok(Self {
            frame_size: Size::new(w, h),
            image,
        })
    }
}

/// One timeline row of an animation: a sheet row, a shared delay, and the
/// columns played in order at that delay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimationFrames {
    pub row: u32,
    pub delay_ms: u32,
    pub columns: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimationData {
    pub flip: bool,
    pub frames: Vec<AnimationFrames>,
}

impl AnimationData {
    pub fn encode(&self, enc: &mut Encoder) {
        enc.put_u8(self.flip as u8);
        enc.put_u32(self.frames.len() as u32);
        for frame in &self.frames {
            enc.put_u32(frame.row);
            enc.put_u32(frame.delay_ms);
            enc.put_u32(frame.columns.len() as u32);
            for column in &frame.columns {
                enc.put_u32(*column);
            }
        }
    }

    pub fn decode(dec: &mut Decoder) -> Result<Self, ResourceError> {
        let flip = match dec.get_u8()? {
            0 => false,
            1 => true,
            other => {
                return Err(ResourceError::BadFormat(format!(
                    "animation flip flag must be 0 or 1, got {other}"
                )))
            }
        };
        let frame_count = dec.get_u32()? as usize;
        let mut frames = Vec::with_capacity(frame_count.min(1024));
        for _ in 0..frame_count {
            let row = dec.get_u32()?;
            let delay_ms = dec.get_u32()?;
            let column_count = dec.get_u32()? as usize;
            let mut columns = Vec::with_capacity(column_count.min(1024));
            for _ in 0..column_count {
                columns.push(dec.get_u32()?);
            }
            frames.push(AnimationFrames {
                row,
                delay_ms,
                columns,
            });
        }
        Ok(Self { flip, frames })
    }
}

/// A sprite sheet plus the map from costume action codes to animations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostumeData {
    pub sheet: SpriteSheetData,
    pub animations: Vec<(u8, AnimationData)>,
}

impl CostumeData {
    pub fn encode(&self, enc: &mut Encoder) {
        self.sheet.encode(enc);
        enc.put_u32(self.animations.len() as u32);
        for (action, animation) in &self.animations {
            enc.put_u8(*action);
            animation.encode(enc);
        }
    }

    pub fn decode(dec: &mut Decoder) -> Result<Self, ResourceError> {
        let sheet = SpriteSheetData::decode(dec)?;
        let count = dec.get_u32()? as usize;
        let mut animations = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            let action = dec.get_u8()?;
            animations.push((action, AnimationData::decode(dec)?));
        }
        Ok(Self { sheet, animations })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptData {
    pub language: ScriptLanguage,
    pub code: Vec<u8>,
}

impl ScriptData {
    pub fn lua(code: impl Into<Vec<u8>>) -> Self {
        Self {
            language: ScriptLanguage::Lua,
            code: code.into(),
        }
    }

    pub fn encode(&self, enc: &mut Encoder) {
        enc.put_u8(self.language as u8);
        enc.put_blob(&self.code);
    }

    pub fn decode(dec: &mut Decoder) -> Result<Self, ResourceError> {
        let raw = dec.get_u8()?;
        let language = ScriptLanguage::from_u8(raw)
            .ok_or_else(|| ResourceError::BadFormat(format!("unknown script language {raw}")))?;
        let code = dec.get_blob()?;
        Ok(Self { language, code })
    }
}

/// Sound effects and music streams share the same shape: a 4-byte format
/// tag (e.g. `b"wav "`) and the raw encoded audio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoundData {
    pub format: [u8; 4],
    pub data: Vec<u8>,
}

impl SoundData {
    pub fn encode(&self, enc: &mut Encoder) {
        enc.put_raw(&self.format);
        enc.put_blob(&self.data);
    }

    pub fn decode(dec: &mut Decoder) -> Result<Self, ResourceError> {
        let raw = dec.take(4)?;
        let format = [raw[0], raw[1], raw[2], raw[3]];
        let data = dec.get_blob()?;
        Ok(Self { format, data })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkboxData {
    pub id: String,
    pub enabled: bool,
    pub vertices: [(i32, i32); 4],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectStateData {
    pub animation: Option<AnimationData>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectData {
    pub id: String,
    pub name: String,
    pub pos: Pos,
    pub hotspot: Rect,
    pub classes: u32,
    pub use_pos: Pos,
    pub use_dir: Direction,
    pub states: Vec<ObjectStateData>,
}

/// A room: background image, walk regions, declared objects, and an
/// optional bound script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomData {
    pub background: SpriteSheetData,
    pub walkboxes: Vec<WalkboxData>,
    pub objects: Vec<ObjectData>,
    pub script: Option<ResourceRef>,
}

impl RoomData {
    pub fn encode(&self, enc: &mut Encoder) -> Result<(), ResourceError> {
        self.background.encode(enc);
        enc.put_u32(self.walkboxes.len() as u32);
        for walkbox in &self.walkboxes {
            enc.put_string(&walkbox.id)?;
            enc.put_u8(walkbox.enabled as u8);
            for (x, y) in walkbox.vertices {
                enc.put_i32(x);
                enc.put_i32(y);
            }
        }
        enc.put_u32(self.objects.len() as u32);
        for object in &self.objects {
            enc.put_string(&object.id)?;
            enc.put_string(&object.name)?;
            enc.put_i32(object.pos.x);
            enc.put_i32(object.pos.y);
            enc.put_i32(object.hotspot.pos.x);
            enc.put_i32(object.hotspot.pos.y);
            enc.put_u32(object.hotspot.size.w);
            enc.put_u32(object.hotspot.size.h);
            enc.put_u32(object.classes);
            enc.put_i32(object.use_pos.x);
            enc.put_i32(object.use_pos.y);
            enc.put_u8(object.use_dir.as_u8());
            enc.put_u32(object.states.len() as u32);
            for state in &object.states {
                match &state.animation {
                    Some(animation) => {
                        enc.put_u8(1);
                        animation.encode(enc);
                    }
                    None => enc.put_u8(0),
                }
            }
        }
        match &self.script {
            Some(script) => enc.put_string(&script.to_string())?,
            None => enc.put_string("")?,
        }
        Ok(())
    }

    pub fn decode(dec: &mut Decoder) -> Result<Self, ResourceError> {
        let background = SpriteSheetData::decode(dec)?;

        let walkbox_count = dec.get_u32()? as usize;
        let mut walkboxes = Vec::with_capacity(walkbox_count.min(1024));
        for _ in 0..walkbox_count {
            let id = dec.get_string()?;
            let enabled = dec.get_u8()? != 0;
            let mut vertices = [(0, 0); 4];
            for vertex in &mut vertices {
                *vertex = (dec.get_i32()?, dec.get_i32()?);
            }
            walkboxes.push(WalkboxData {
                id,
                enabled,
                vertices,
            });
        }

        let object_count = dec.get_u32()? as usize;
        let mut objects = Vec::with_capacity(object_count.min(1024));
        for _ in 0..object_count {
            let id = dec.get_string()?;
            let name = dec.get_string()?;
            let pos = Pos::new(dec.get_i32()?, dec.get_i32()?);
            let hotspot_pos = Pos::new(dec.get_i32()?, dec.get_i32()?);
            let hotspot_size = Size::new(dec.get_u32()?, dec.get_u32()?);
            let classes = dec.get_u32()?;
            let use_pos = Pos::new(dec.get_i32()?, dec.get_i32()?);
            let raw_dir = dec.get_u8()?;
            let use_dir = Direction::from_u8(raw_dir).ok_or_else(|| {
                ResourceError::BadFormat(format!("invalid use direction {raw_dir}"))
            })?;
            let state_count = dec.get_u32()? as usize;
            let mut states = Vec::with_capacity(state_count.min(1024));
            for _ in 0..state_count {
                let animation = match dec.get_u8()? {
                    0 => None,
                    1 => Some(AnimationData::decode(dec)?),
                    other => {
                        return Err(ResourceError::BadFormat(format!(
                            "object state animation flag must be 0 or 1, got {other}"
                        )))
                    }
                };
                states.push(ObjectStateData { animation });
            }
            objects.push(ObjectData {
                id,
                name,
                pos,
                hotspot: Rect {
                    pos: hotspot_pos,
                    size: hotspot_size,
                },
                classes,
                use_pos,
                use_dir,
                states,
            });
        }

        let script_raw = dec.get_string()?;
        let script = if script_raw.is_empty() {
            None
        } else {
            Some(ResourceRef::parse(&script_raw)?)
        };

        Ok(Self {
            background,
            walkboxes,
            objects,
            script,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip<T, E, D>(value: &T, encode: E, decode: D) -> T
    where
        E: Fn(&T, &mut Encoder),
        D: Fn(&mut Decoder) -> Result<T, ResourceError>,
    {
        let mut enc = Encoder::new();
        encode(value, &mut enc);
        let bytes = enc.into_bytes();
        let mut dec = Decoder::new(&bytes);
        let decoded = decode(&mut dec).expect("decode should succeed");
        assert!(dec.is_empty(), "decoder left trailing bytes");
        decoded
    }

    fn sample_animation() -> AnimationData {
        AnimationData {
            flip: true,
            frames: vec![
                AnimationFrames {
                    row: 0,
                    delay_ms: 120,
                    columns: vec![0, 1, 2],
                },
                AnimationFrames {
                    row: 1,
                    delay_ms: 90,
                    columns: vec![3],
                },
            ],
        }
    }

    #[test]
    fn resource_ref_parses_and_displays() {
        let r = ResourceRef::parse("demo:room/bar").expect("valid ref");
        assert_eq!(r.package, "demo");
        assert_eq!(r.id, "room/bar");
        assert_eq!(r.to_string(), "demo:room/bar");
        assert!(ResourceRef::parse("no-colon").is_err());
        assert!(ResourceRef::parse(":empty-package").is_err());
    }

    #[test]
    fn sprite_sheet_round_trips() {
        let sheet = SpriteSheetData {
            frame_size: Size::new(32, 48),
            image: vec![0xAA; 64],
        };
        let decoded = round_trip(&sheet, SpriteSheetData::encode, SpriteSheetData::decode);
        assert_eq!(decoded, sheet);
    }

    #[test]
    fn animation_round_trips() {
        let animation = sample_animation();
        let decoded = round_trip(&animation, AnimationData::encode, AnimationData::decode);
        assert_eq!(decoded, animation);
    }

    #[test]
    fn costume_round_trips() {
        let costume = CostumeData {
            sheet: SpriteSheetData {
                frame_size: Size::new(24, 32),
                image: vec![1, 2, 3, 4],
            },
            animations: vec![(0x00, sample_animation()), (0x09, sample_animation())],
        };
        let decoded = round_trip(
            &costume,
            CostumeData::encode,
            CostumeData::decode,
        );
        assert_eq!(decoded, costume);
    }

    #[test]
    fn script_round_trips() {
        let script = ScriptData::lua("print('hi')".as_bytes().to_vec());
        let decoded = round_trip(&script, ScriptData::encode, ScriptData::decode);
        assert_eq!(decoded, script);
    }

    #[test]
    fn script_rejects_unknown_language() {
        let mut dec = Decoder::new(&[9, 0, 0, 0, 0]);
        assert!(matches!(
            ScriptData::decode(&mut dec),
            Err(ResourceError::BadFormat(_))
        ));
    }

    #[test]
    fn sound_round_trips() {
        let sound = SoundData {
            format: *b"wav ",
            data: vec![9; 17],
        };
        let decoded = round_trip(&sound, SoundData::encode, SoundData::decode);
        assert_eq!(decoded, sound);
    }

    #[test]
    fn room_round_trips() {
        let room = RoomData {
            background: SpriteSheetData {
                frame_size: Size::new(320, 144),
                image: vec![7; 32],
            },
            walkboxes: vec![WalkboxData {
                id: "floor".into(),
                enabled: true,
                vertices: [(0, 100), (320, 100), (320, 144), (0, 144)],
            }],
            objects: vec![ObjectData {
                id: "door".into(),
                name: "rusty door".into(),
                pos: Pos::new(40, 60),
                hotspot: Rect::new(40, 60, 24, 48),
                classes: 0b101,
                use_pos: Pos::new(52, 110),
                use_dir: Direction::Up,
                states: vec![
                    ObjectStateData { animation: None },
                    ObjectStateData {
                        animation: Some(sample_animation()),
                    },
                ],
            }],
            script: Some(ResourceRef::new("demo", "scripts/bar")),
        };

        let mut enc = Encoder::new();
        room.encode(&mut enc).expect("encode");
        let bytes = enc.into_bytes();
        let mut dec = Decoder::new(&bytes);
        let decoded = RoomData::decode(&mut dec).expect("decode");
        assert!(dec.is_empty());
        assert_eq!(decoded, room);
    }

    #[test]
    fn room_without_script_round_trips() {
        let room = RoomData {
            background: SpriteSheetData {
                frame_size: Size::new(320, 144),
                image: vec![],
            },
            walkboxes: vec![],
            objects: vec![],
            script: None,
        };
        let mut enc = Encoder::new();
        room.encode(&mut enc).expect("encode");
        let bytes = enc.into_bytes();
        let decoded = RoomData::decode(&mut Decoder::new(&bytes)).expect("decode");
        assert_eq!(decoded.script, None);
    }
}
