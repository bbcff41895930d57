//! Versioned binary codec for bitmask leaves and existence maps.
//!
//! All integers are little-endian. Every layout opens with an explicit
//! format version (and magic bytes for whole-map streams) checked on
//! read; an unexpected version is a hard error, never skipped. Field-by-
//! field reader/writer functions keep the layout portable; nothing here
//! reinterprets raw memory.
//!
//! Existence map wire format:
//! ```text
//! [4 bytes]  magic "LEXM"
//! [1 byte]   version
//! [1 byte]   map tree levels
//! [8 bytes]  map region size (LE f64, world units per map cell)
//! [4 bytes]  leaf count (LE u32)
//! [leaf count × leaf record]
//! ```
//!
//! Each leaf record:
//! ```text
//! [4 bytes]  origin x (LE u32)
//! [4 bytes]  origin y (LE u32)
//! [bitmask]  versioned bitmask leaf (see below)
//! ```
//!
//! Bitmask leaf: `[1 byte version][32 × LE u32 row words]`.

use std::io::{Read, Write};

use crate::address::{DIMENSION, SUB_GRID_INDEX_BITS};
use crate::bitmask::SubGridBitMask;
use crate::error::GridError;
use crate::existence::ExistenceMap;

/// Magic bytes opening an existence map stream.
pub const EXISTENCE_MAGIC: [u8; 4] = *b"LEXM";

/// Current existence map format version.
pub const EXISTENCE_VERSION: u8 = 1;

/// Current bitmask leaf format version.
pub const MASK_LEAF_VERSION: u8 = 1;

fn write_u8(w: &mut dyn Write, v: u8) -> Result<(), GridError> {
    w.write_all(&[v])?;
    Ok(())
}

fn write_u32_le(w: &mut dyn Write, v: u32) -> Result<(), GridError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

fn write_f64_le(w: &mut dyn Write, v: f64) -> Result<(), GridError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

fn read_u8(r: &mut dyn Read) -> Result<u8, GridError> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

fn read_u32_le(r: &mut dyn Read) -> Result<u32, GridError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_f64_le(r: &mut dyn Read) -> Result<f64, GridError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(f64::from_le_bytes(buf))
}

/// Serialize one bitmask leaf.
pub fn encode_bitmask(w: &mut dyn Write, mask: &SubGridBitMask) -> Result<(), GridError> {
    write_u8(w, MASK_LEAF_VERSION)?;
    for &row in mask.rows() {
        write_u32_le(w, row)?;
    }
    Ok(())
}

/// Deserialize one bitmask leaf, validating the format version.
pub fn decode_bitmask(r: &mut dyn Read) -> Result<SubGridBitMask, GridError> {
    let version = read_u8(r)?;
    if version != MASK_LEAF_VERSION {
        return Err(GridError::UnsupportedVersion {
            expected: MASK_LEAF_VERSION,
            found: version,
        });
    }
    let mut rows = [0u32; DIMENSION as usize];
    for row in rows.iter_mut() {
        *row = read_u32_le(r)?;
    }
    Ok(SubGridBitMask::from_rows(rows))
}

/// Serialize a whole existence map.
pub fn encode_existence_map(w: &mut dyn Write, map: &ExistenceMap) -> Result<(), GridError> {
    w.write_all(&EXISTENCE_MAGIC)?;
    write_u8(w, EXISTENCE_VERSION)?;
    write_u8(w, map.tree().num_levels())?;
    write_f64_le(w, map.tree().cell_size())?;
    write_u32_le(w, map.tree().leaf_count() as u32)?;

    let mut result = Ok(());
    map.tree().scan_leaves(|leaf| {
        let origin = leaf.origin();
        result = (|| {
            write_u32_le(w, origin.x)?;
            write_u32_le(w, origin.y)?;
            encode_bitmask(w, leaf.payload())
        })();
        result.is_ok()
    });
    result
}

/// Deserialize a whole existence map, validating magic and version.
pub fn decode_existence_map(r: &mut dyn Read) -> Result<ExistenceMap, GridError> {
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)?;
    if magic != EXISTENCE_MAGIC {
        return Err(GridError::InvalidMagic);
    }
    let version = read_u8(r)?;
    if version != EXISTENCE_VERSION {
        return Err(GridError::UnsupportedVersion {
            expected: EXISTENCE_VERSION,
            found: version,
        });
    }

    let num_levels = read_u8(r)?;
    if !(2..=6).contains(&num_levels) {
        return Err(GridError::Malformed {
            detail: format!("existence map tree depth {num_levels} out of range"),
        });
    }
    let region_size = read_f64_le(r)?;
    if !(region_size > 0.0) {
        return Err(GridError::Malformed {
            detail: format!("existence map region size {region_size} not positive"),
        });
    }

    let mut map = ExistenceMap::from_raw(num_levels, region_size);
    let leaf_count = read_u32_le(r)?;
    for _ in 0..leaf_count {
        let x = read_u32_le(r)?;
        let y = read_u32_le(r)?;
        let dim_mask = (1u32 << SUB_GRID_INDEX_BITS) - 1;
        if x & dim_mask != 0 || y & dim_mask != 0 {
            return Err(GridError::Malformed {
                detail: format!("leaf origin ({x}, {y}) is not sub-grid aligned"),
            });
        }
        let mask = decode_bitmask(r)?;
        *map.tree_mut().construct_leaf(x, y) = mask;
    }
    Ok(map)
}
