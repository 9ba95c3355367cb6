//! Packed resource files: a `.idx`/`.dat` pair holding one package.
//!
//! Index file layout:
//!   magic "PCTK:IDX" (8 bytes), version u16 LE, then repeated entries
//!   { ref as u16-prefixed string, offset u32, size u32 }. The ref is the
//!   resource id; the package is the file pair itself.
//!
//! Data file layout:
//!   magic "PCTK:DAT" (8 bytes), version u16 LE, then per resource a
//!   16-byte header { type u8, compression u8, 14 reserved zero bytes }
//!   followed by the payload, raw or gzip-wrapped. The index offset points
//!   at the header; the size covers header plus payload.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use crate::codec::{Decoder, Encoder, ResourceError};
use crate::format::{Compression, ResourceType};

pub const INDEX_MAGIC: &[u8; 8] = b"PCTK:IDX";
pub const DATA_MAGIC: &[u8; 8] = b"PCTK:DAT";
pub const FORMAT_VERSION: u16 = 1;

/// Bytes occupied by the per-resource header in the data file.
pub const RESOURCE_HEADER_LEN: usize = 16;
const HEADER_RESERVED: [u8; 14] = [0; 14];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub offset: u32,
    pub size: u32,
}

/// Builds an index/data pair in memory. Used by tests and by the resource
/// packer front-end.
pub struct PackWriter {
    index: Encoder,
    data: Encoder,
}

impl Default for PackWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl PackWriter {
    pub fn new() -> Self {
        let mut index = Encoder::new();
        index.put_raw(INDEX_MAGIC);
        index.put_u16(FORMAT_VERSION);
        let mut data = Encoder::new();
        data.put_raw(DATA_MAGIC);
        data.put_u16(FORMAT_VERSION);
        Self { index, data }
    }

    /// Append one encoded payload under resource id `id`.
    pub fn add(
        &mut self,
        id: &str,
        rtype: ResourceType,
        compression: Compression,
        payload: &[u8],
    ) -> Result<(), ResourceError> {
        let offset = self.data.len() as u32;
        self.data.put_u8(rtype as u8);
        self.data.put_u8(compression as u8);
        self.data.put_raw(&HEADER_RESERVED);
        match compression {
            Compression::None => self.data.put_raw(payload),
            Compression::Gzip => self.data.put_raw(&gzip_compress(payload)?),
        }
        let size = self.data.len() as u32 - offset;

        self.index.put_string(id)?;
        self.index.put_u32(offset);
        self.index.put_u32(size);
        Ok(())
    }

    /// `(index bytes, data bytes)`.
    pub fn finish(self) -> (Vec<u8>, Vec<u8>) {
        (self.index.into_bytes(), self.data.into_bytes())
    }

    pub fn write_to(self, index_path: &Path, data_path: &Path) -> Result<(), ResourceError> {
        let (index, data) = self.finish();
        std::fs::write(index_path, index)?;
        std::fs::write(data_path, data)?;
        Ok(())
    }
}

/// Parse an index file into a lookup table keyed by resource id.
pub fn read_index(bytes: &[u8]) -> Result<HashMap<String, IndexEntry>, ResourceError> {
    let mut dec = Decoder::new(bytes);
    let magic = dec.take(8)?;
    if magic != INDEX_MAGIC {
        return Err(ResourceError::BadFormat("index file magic mismatch".into()));
    }
    let version = dec.get_u16()?;
    if version != FORMAT_VERSION {
        return Err(ResourceError::UnsupportedVersion(version));
    }

    let mut entries = HashMap::new();
    while !dec.is_empty() {
        let id = dec.get_string()?;
        let offset = dec.get_u32()?;
        let size = dec.get_u32()?;
        if entries.insert(id.clone(), IndexEntry { offset, size }).is_some() {
            return Err(ResourceError::BadFormat(format!(
                "duplicate index entry for '{id}'"
            )));
        }
    }
    Ok(entries)
}

/// An open `.idx`/`.dat` pair. The index is held in memory; payload reads
/// seek into the data file on demand.
pub struct PackFile {
    entries: HashMap<String, IndexEntry>,
    data: File,
}

impl PackFile {
    pub fn open(index_path: &Path, data_path: &Path) -> Result<Self, ResourceError> {
        let index_bytes = std::fs::read(index_path)?;
        let entries = read_index(&index_bytes)?;

        let mut data = File::open(data_path)?;
        let mut header = [0u8; 10];
        data.read_exact(&mut header)
            .map_err(|_| ResourceError::Truncated)?;
        if &header[..8] != DATA_MAGIC {
            return Err(ResourceError::BadFormat("data file magic mismatch".into()));
        }
        let version = u16::from_le_bytes([header[8], header[9]]);
        if version != FORMAT_VERSION {
            return Err(ResourceError::UnsupportedVersion(version));
        }

        log::info!(
            "opened resource pack '{}' with {} entries",
            data_path.display(),
            entries.len()
        );
        Ok(Self { entries, data })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Read and decompress one resource's payload, validating its header
    /// against `expected`. Absent ids yield `Ok(None)`.
    pub fn read(
        &mut self,
        id: &str,
        expected: ResourceType,
    ) -> Result<Option<Vec<u8>>, ResourceError> {
        let entry = match self.entries.get(id) {
            Some(entry) => *entry,
            None => return Ok(None),
        };
        if (entry.size as usize) < RESOURCE_HEADER_LEN {
            return Err(ResourceError::BadFormat(format!(
                "entry for '{id}' is smaller than a resource header"
            )));
        }

        self.data.seek(SeekFrom::Start(entry.offset as u64))?;
        let mut raw = vec![0u8; entry.size as usize];
        self.data
            .read_exact(&mut raw)
            .map_err(|_| ResourceError::Truncated)?;

        let rtype = ResourceType::from_u8(raw[0]).ok_or_else(|| {
            ResourceError::BadFormat(format!("unknown resource type {} for '{id}'", raw[0]))
        })?;
        if rtype != expected {
            return Err(ResourceError::BadFormat(format!(
                "resource '{id}' has type {rtype:?}, expected {expected:?}"
            )));
        }
        let compression = Compression::from_u8(raw[1]).ok_or_else(|| {
            ResourceError::BadFormat(format!("unknown compression {} for '{id}'", raw[1]))
        })?;

        let payload = &raw[RESOURCE_HEADER_LEN..];
        match compression {
            Compression::None => Ok(Some(payload.to_vec())),
            Compression::Gzip => Ok(Some(gzip_decompress(payload)?)),
        }
    }
}

fn gzip_compress(bytes: &[u8]) -> Result<Vec<u8>, ResourceError> {
    let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?)
}

fn gzip_decompress(bytes: &[u8]) -> Result<Vec<u8>, ResourceError> {
    let mut decoder = GzDecoder::new(bytes);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|err| ResourceError::CorruptPayload(err.to_string()))?;
    Ok(out)
}
