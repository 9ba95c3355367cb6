//! Resource lookup by `(package, id)`.
//!
//! Two backends: `BundleLoader` keeps decoded resources in hash maps (tests
//! and embedded demos); `PackLoader` maps each package name to an open
//! `.idx`/`.dat` pair and decodes on demand. Loads are synchronous and must
//! only run on the simulation-loop thread; scripts never call a loader,
//! they name resources by reference and the resolving command does the
//! load.

use std::collections::HashMap;
use std::path::Path;

use crate::codec::{Decoder, ResourceError};
use crate::format::{
    CostumeData, ResourceRef, ResourceType, RoomData, ScriptData, SoundData,
};
use crate::pack::PackFile;

/// Optional typed lookups: absent resources are `Ok(None)`; use
/// `require` for lookups that must succeed.
pub trait ResourceLoader {
    fn load_costume(&mut self, rref: &ResourceRef) -> Result<Option<CostumeData>, ResourceError>;
    fn load_room(&mut self, rref: &ResourceRef) -> Result<Option<RoomData>, ResourceError>;
    fn load_script(&mut self, rref: &ResourceRef) -> Result<Option<ScriptData>, ResourceError>;
    fn load_sound(&mut self, rref: &ResourceRef) -> Result<Option<SoundData>, ResourceError>;
    fn load_music(&mut self, rref: &ResourceRef) -> Result<Option<SoundData>, ResourceError>;
}

/// Turn an optional lookup result into a required one.
pub fn require<T>(
    rref: &ResourceRef,
    found: Result<Option<T>, ResourceError>,
) -> Result<T, ResourceError> {
    found?.ok_or_else(|| ResourceError::NotFound(rref.to_string()))
}

/// In-memory resource store keyed by reference.
#[derive(Debug, Default)]
pub struct BundleLoader {
    costumes: HashMap<ResourceRef, CostumeData>,
    rooms: HashMap<ResourceRef, RoomData>,
    scripts: HashMap<ResourceRef, ScriptData>,
    sounds: HashMap<ResourceRef, SoundData>,
    music: HashMap<ResourceRef, SoundData>,
}

impl BundleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_costume(&mut self, rref: ResourceRef, costume: CostumeData) {
        self.costumes.insert(rref, costume);
    }

    pub fn insert_room(&mut self, rref: ResourceRef, room: RoomData) {
        self.rooms.insert(rref, room);
    }

    pub fn insert_script(&mut self, rref: ResourceRef, script: ScriptData) {
        self.scripts.insert(rref, script);
    }

    pub fn insert_sound(&mut self, rref: ResourceRef, sound: SoundData) {
        self.sounds.insert(rref, sound);
    }

    pub fn insert_music(&mut self, rref: ResourceRef, music: SoundData) {
        self.music.insert(rref, music);
    }
}

impl ResourceLoader for BundleLoader {
    fn load_costume(&mut self, rref: &ResourceRef) -> Result<Option<CostumeData>, ResourceError> {
        Ok(self.costumes.get(rref).cloned())
    }

    fn load_room(&mut self, rref: &ResourceRef) -> Result<Option<RoomData>, ResourceError> {
        Ok(self.rooms.get(rref).cloned())
    }

    fn load_script(&mut self, rref: &ResourceRef) -> Result<Option<ScriptData>, ResourceError> {
        Ok(self.scripts.get(rref).cloned())
    }

    fn load_sound(&mut self, rref: &ResourceRef) -> Result<Option<SoundData>, ResourceError> {
        Ok(self.sounds.get(rref).cloned())
    }

    fn load_music(&mut self, rref: &ResourceRef) -> Result<Option<SoundData>, ResourceError> {
        Ok(self.music.get(rref).cloned())
    }
}

/// Packed backend: one `.idx`/`.dat` pair per package.
#[derive(Default)]
pub struct PackLoader {
    packages: HashMap<String, PackFile>,
}

impl PackLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `<dir>/<package>.idx` + `<dir>/<package>.dat` under
    /// `package`.
    pub fn add_package(&mut self, package: &str, dir: &Path) -> Result<(), ResourceError> {
        let index_path = dir.join(format!("{package}.idx"));
        let data_path = dir.join(format!("{package}.dat"));
        let pack = PackFile::open(&index_path, &data_path)?;
        if self.packages.insert(package.to_string(), pack).is_some() {
            log::warn!("package '{package}' registered twice; replacing earlier pack");
        }
        Ok(())
    }

    fn read_payload(
        &mut self,
        rref: &ResourceRef,
        rtype: ResourceType,
    ) -> Result<Option<Vec<u8>>, ResourceError> {
        match self.packages.get_mut(&rref.package) {
            Some(pack) => pack.read(&rref.id, rtype),
            None => Ok(None),
        }
    }

    fn load_decoded<T>(
        &mut self,
        rref: &ResourceRef,
        rtype: ResourceType,
        decode: fn(&mut Decoder) -> Result<T, ResourceError>,
    ) -> Result<Option<T>, ResourceError> {
        match self.read_payload(rref, rtype)? {
            Some(bytes) => Ok(Some(decode(&mut Decoder::new(&bytes))?)),
            None => Ok(None),
        }
    }
}

impl ResourceLoader for PackLoader {
    fn load_costume(&mut self, rref: &ResourceRef) -> Result<Option<CostumeData>, ResourceError> {
        self.load_decoded(rref, ResourceType::Costume, CostumeData::decode)
    }

    fn load_room(&mut self, rref: &ResourceRef) -> Result<Option<RoomData>, ResourceError> {
        self.load_decoded(rref, ResourceType::Room, RoomData::decode)
    }

    fn load_script(&mut self, rref: &ResourceRef) -> Result<Option<ScriptData>, ResourceError> {
        self.load_decoded(rref, ResourceType::Script, ScriptData::decode)
    }

    fn load_sound(&mut self, rref: &ResourceRef) -> Result<Option<SoundData>, ResourceError> {
        self.load_decoded(rref, ResourceType::Sound, SoundData::decode)
    }

    fn load_music(&mut self, rref: &ResourceRef) -> Result<Option<SoundData>, ResourceError> {
        self.load_decoded(rref, ResourceType::Music, SoundData::decode)
    }
}
