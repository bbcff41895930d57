//! Versioned binary codecs for site model streams.
//!
//! Every stream opens with an explicit format version (and magic bytes
//! for the metadata stream); an unexpected version is a hard error. All
//! integers are little-endian, strings are length-prefixed UTF-8, and
//! timestamps carry an explicit UTC flag byte that decode requires to be
//! set.

use std::io::{Read, Write};

use loam_core::{
    AlignmentId, DesignId, MachineId, ProjectId, SurveyedSurfaceId, Timestamp,
};
use loam_grid::BoundingExtents3D;

use crate::error::ModelError;
use crate::events::{
    AlignmentList, AlignmentRecord, DesignList, DesignRecord, MachineList, MachineRecord,
    MachineTargetValues, ProofingRunList, ProofingRunRecord, SurveyedSurfaceList,
    SurveyedSurfaceRecord, TargetValueList, TargetValueStore,
};

/// Magic bytes opening a site model metadata stream.
pub const METADATA_MAGIC: [u8; 4] = *b"LSMD";

/// Current metadata stream version.
pub const METADATA_VERSION: u8 = 1;

/// Current event-collection stream version (shared by all collections).
pub const COLLECTION_VERSION: u8 = 1;

/// Identity and configuration persisted for a site model.
#[derive(Clone, Debug, PartialEq)]
pub struct SiteModelMetadata {
    /// The project id.
    pub id: ProjectId,
    /// When the model was created.
    pub creation_time: Timestamp,
    /// When the model last changed.
    pub last_modified: Timestamp,
    /// World units per ground cell.
    pub cell_size: f64,
    /// Depth of the production data tree.
    pub num_levels: u8,
}

fn write_u8(w: &mut dyn Write, v: u8) -> Result<(), ModelError> {
    w.write_all(&[v])?;
    Ok(())
}

fn write_u16_le(w: &mut dyn Write, v: u16) -> Result<(), ModelError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

fn write_u32_le(w: &mut dyn Write, v: u32) -> Result<(), ModelError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

fn write_i16_le(w: &mut dyn Write, v: i16) -> Result<(), ModelError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

fn write_i64_le(w: &mut dyn Write, v: i64) -> Result<(), ModelError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

fn write_f32_le(w: &mut dyn Write, v: f32) -> Result<(), ModelError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

fn write_f64_le(w: &mut dyn Write, v: f64) -> Result<(), ModelError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

fn write_u128_le(w: &mut dyn Write, v: u128) -> Result<(), ModelError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

fn read_u8(r: &mut dyn Read) -> Result<u8, ModelError> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

fn read_u16_le(r: &mut dyn Read) -> Result<u16, ModelError> {
    let mut buf = [0u8; 2];
    r.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

fn read_u32_le(r: &mut dyn Read) -> Result<u32, ModelError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_i16_le(r: &mut dyn Read) -> Result<i16, ModelError> {
    let mut buf = [0u8; 2];
    r.read_exact(&mut buf)?;
    Ok(i16::from_le_bytes(buf))
}

fn read_i64_le(r: &mut dyn Read) -> Result<i64, ModelError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(i64::from_le_bytes(buf))
}

fn read_f32_le(r: &mut dyn Read) -> Result<f32, ModelError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(f32::from_le_bytes(buf))
}

fn read_f64_le(r: &mut dyn Read) -> Result<f64, ModelError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(f64::from_le_bytes(buf))
}

fn read_u128_le(r: &mut dyn Read) -> Result<u128, ModelError> {
    let mut buf = [0u8; 16];
    r.read_exact(&mut buf)?;
    Ok(u128::from_le_bytes(buf))
}

fn write_string(w: &mut dyn Write, s: &str) -> Result<(), ModelError> {
    let len = u16::try_from(s.len()).map_err(|_| ModelError::Malformed {
        detail: format!("string of {} bytes too long to persist", s.len()),
    })?;
    write_u16_le(w, len)?;
    w.write_all(s.as_bytes())?;
    Ok(())
}

fn read_string(r: &mut dyn Read) -> Result<String, ModelError> {
    let len = read_u16_le(r)?;
    let mut buf = vec![0u8; usize::from(len)];
    r.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|_| ModelError::Malformed {
        detail: "string is not valid UTF-8".to_owned(),
    })
}

fn write_utc_time(w: &mut dyn Write, t: Timestamp) -> Result<(), ModelError> {
    write_u8(w, 1)?;
    write_i64_le(w, t.0)
}

fn read_utc_time(r: &mut dyn Read) -> Result<Timestamp, ModelError> {
    if read_u8(r)? != 1 {
        return Err(ModelError::TimesNotUtc);
    }
    Ok(Timestamp(read_i64_le(r)?))
}

fn write_extents(w: &mut dyn Write, e: &BoundingExtents3D) -> Result<(), ModelError> {
    for v in [e.min_x, e.min_y, e.min_z, e.max_x, e.max_y, e.max_z] {
        write_f64_le(w, v)?;
    }
    Ok(())
}

fn read_extents(r: &mut dyn Read) -> Result<BoundingExtents3D, ModelError> {
    Ok(BoundingExtents3D {
        min_x: read_f64_le(r)?,
        min_y: read_f64_le(r)?,
        min_z: read_f64_le(r)?,
        max_x: read_f64_le(r)?,
        max_y: read_f64_le(r)?,
        max_z: read_f64_le(r)?,
    })
}

fn check_collection_version(r: &mut dyn Read) -> Result<(), ModelError> {
    let version = read_u8(r)?;
    if version != COLLECTION_VERSION {
        return Err(ModelError::UnsupportedVersion {
            expected: COLLECTION_VERSION,
            found: version,
        });
    }
    Ok(())
}

/// Serialize site model metadata.
pub fn encode_metadata(w: &mut dyn Write, meta: &SiteModelMetadata) -> Result<(), ModelError> {
    w.write_all(&METADATA_MAGIC)?;
    write_u8(w, METADATA_VERSION)?;
    write_u128_le(w, meta.id.0)?;
    write_utc_time(w, meta.creation_time)?;
    write_utc_time(w, meta.last_modified)?;
    write_f64_le(w, meta.cell_size)?;
    write_u8(w, meta.num_levels)
}

/// Deserialize site model metadata, validating magic and version.
pub fn decode_metadata(r: &mut dyn Read) -> Result<SiteModelMetadata, ModelError> {
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)?;
    if magic != METADATA_MAGIC {
        return Err(ModelError::InvalidMagic);
    }
    let version = read_u8(r)?;
    if version != METADATA_VERSION {
        return Err(ModelError::UnsupportedVersion {
            expected: METADATA_VERSION,
            found: version,
        });
    }
    let id = ProjectId(read_u128_le(r)?);
    let creation_time = read_utc_time(r)?;
    let last_modified = read_utc_time(r)?;
    let cell_size = read_f64_le(r)?;
    if !(cell_size > 0.0) {
        return Err(ModelError::Malformed {
            detail: format!("cell size {cell_size} not positive"),
        });
    }
    let num_levels = read_u8(r)?;
    if !(2..=6).contains(&num_levels) {
        return Err(ModelError::Malformed {
            detail: format!("tree depth {num_levels} out of range"),
        });
    }
    Ok(SiteModelMetadata {
        id,
        creation_time,
        last_modified,
        cell_size,
        num_levels,
    })
}

/// Serialize the machine list.
pub fn encode_machines(w: &mut dyn Write, list: &MachineList) -> Result<(), ModelError> {
    write_u8(w, COLLECTION_VERSION)?;
    write_u32_le(w, list.len() as u32)?;
    for machine in list.iter() {
        write_u16_le(w, machine.id.0)?;
        write_string(w, &machine.name)?;
    }
    Ok(())
}

/// Deserialize the machine list.
pub fn decode_machines(r: &mut dyn Read) -> Result<MachineList, ModelError> {
    check_collection_version(r)?;
    let count = read_u32_le(r)?;
    let mut list = MachineList::new();
    for _ in 0..count {
        let id = MachineId(read_u16_le(r)?);
        let name = read_string(r)?;
        list.add(MachineRecord { id, name });
    }
    Ok(list)
}

fn write_series<V>(
    w: &mut dyn Write,
    series: &TargetValueList<V>,
    mut write_value: impl FnMut(&mut dyn Write, &V) -> Result<(), ModelError>,
) -> Result<(), ModelError> {
    write_u32_le(w, series.entries().len() as u32)?;
    for (time, value) in series.entries() {
        write_utc_time(w, *time)?;
        write_value(w, value)?;
    }
    Ok(())
}

fn read_series<V>(
    r: &mut dyn Read,
    mut read_value: impl FnMut(&mut dyn Read) -> Result<V, ModelError>,
) -> Result<TargetValueList<V>, ModelError> {
    let count = read_u32_le(r)?;
    let mut series = TargetValueList::new();
    for _ in 0..count {
        let time = read_utc_time(r)?;
        let value = read_value(r)?;
        series.insert(time, value);
    }
    Ok(series)
}

/// Serialize the per-machine target value store.
pub fn encode_targets(w: &mut dyn Write, store: &TargetValueStore) -> Result<(), ModelError> {
    write_u8(w, COLLECTION_VERSION)?;
    write_u32_le(w, store.len() as u32)?;
    for (machine, targets) in store.iter() {
        write_u16_le(w, machine.0)?;
        write_series(w, &targets.target_ccv, |w, v| write_i16_le(w, *v))?;
        write_series(w, &targets.target_mdp, |w, v| write_i16_le(w, *v))?;
        write_series(w, &targets.target_pass_count, |w, v| write_u16_le(w, *v))?;
        write_series(w, &targets.target_lift_thickness, |w, v| write_f32_le(w, *v))?;
        write_series(w, &targets.temperature_range, |w, (lo, hi)| {
            write_u16_le(w, *lo)?;
            write_u16_le(w, *hi)
        })?;
    }
    Ok(())
}

/// Deserialize the per-machine target value store.
pub fn decode_targets(r: &mut dyn Read) -> Result<TargetValueStore, ModelError> {
    check_collection_version(r)?;
    let count = read_u32_le(r)?;
    let mut store = TargetValueStore::new();
    for _ in 0..count {
        let machine = MachineId(read_u16_le(r)?);
        let targets = MachineTargetValues {
            target_ccv: read_series(r, |r| read_i16_le(r))?,
            target_mdp: read_series(r, |r| read_i16_le(r))?,
            target_pass_count: read_series(r, |r| read_u16_le(r))?,
            target_lift_thickness: read_series(r, |r| read_f32_le(r))?,
            temperature_range: read_series(r, |r| {
                Ok((read_u16_le(r)?, read_u16_le(r)?))
            })?,
        };
        *store.for_machine_mut(machine) = targets;
    }
    Ok(store)
}

/// Serialize the design list.
pub fn encode_designs(w: &mut dyn Write, list: &DesignList) -> Result<(), ModelError> {
    write_u8(w, COLLECTION_VERSION)?;
    write_u32_le(w, list.len() as u32)?;
    for design in list.iter() {
        write_u32_le(w, design.id.0)?;
        write_string(w, &design.name)?;
        write_extents(w, &design.extents)?;
    }
    Ok(())
}

/// Deserialize the design list.
pub fn decode_designs(r: &mut dyn Read) -> Result<DesignList, ModelError> {
    check_collection_version(r)?;
    let count = read_u32_le(r)?;
    let mut list = DesignList::new();
    for _ in 0..count {
        let id = DesignId(read_u32_le(r)?);
        let name = read_string(r)?;
        let extents = read_extents(r)?;
        list.add(DesignRecord { id, name, extents });
    }
    Ok(list)
}

/// Serialize the surveyed surface list.
pub fn encode_surveyed_surfaces(
    w: &mut dyn Write,
    list: &SurveyedSurfaceList,
) -> Result<(), ModelError> {
    write_u8(w, COLLECTION_VERSION)?;
    write_u32_le(w, list.len() as u32)?;
    for surface in list.iter() {
        write_u32_le(w, surface.id.0)?;
        write_string(w, &surface.name)?;
        write_u32_le(w, surface.design.0)?;
        write_utc_time(w, surface.as_of)?;
        write_f64_le(w, surface.offset)?;
    }
    Ok(())
}

/// Deserialize the surveyed surface list.
pub fn decode_surveyed_surfaces(r: &mut dyn Read) -> Result<SurveyedSurfaceList, ModelError> {
    check_collection_version(r)?;
    let count = read_u32_le(r)?;
    let mut list = SurveyedSurfaceList::new();
    for _ in 0..count {
        let id = SurveyedSurfaceId(read_u32_le(r)?);
        let name = read_string(r)?;
        let design = DesignId(read_u32_le(r)?);
        let as_of = read_utc_time(r)?;
        let offset = read_f64_le(r)?;
        list.add(SurveyedSurfaceRecord {
            id,
            name,
            design,
            as_of,
            offset,
        });
    }
    Ok(list)
}

/// Serialize the alignment list.
pub fn encode_alignments(w: &mut dyn Write, list: &AlignmentList) -> Result<(), ModelError> {
    write_u8(w, COLLECTION_VERSION)?;
    write_u32_le(w, list.len() as u32)?;
    for alignment in list.iter() {
        write_u32_le(w, alignment.id.0)?;
        write_string(w, &alignment.name)?;
    }
    Ok(())
}

/// Deserialize the alignment list.
pub fn decode_alignments(r: &mut dyn Read) -> Result<AlignmentList, ModelError> {
    check_collection_version(r)?;
    let count = read_u32_le(r)?;
    let mut list = AlignmentList::new();
    for _ in 0..count {
        let id = AlignmentId(read_u32_le(r)?);
        let name = read_string(r)?;
        list.add(AlignmentRecord { id, name });
    }
    Ok(list)
}

/// Serialize the proofing run list.
pub fn encode_proofing_runs(
    w: &mut dyn Write,
    list: &ProofingRunList,
) -> Result<(), ModelError> {
    write_u8(w, COLLECTION_VERSION)?;
    write_u32_le(w, list.len() as u32)?;
    for run in list.iter() {
        write_string(w, &run.name)?;
        write_u16_le(w, run.machine.0)?;
        write_utc_time(w, run.start_time)?;
        write_utc_time(w, run.end_time)?;
        write_extents(w, &run.extents)?;
    }
    Ok(())
}

/// Deserialize the proofing run list.
pub fn decode_proofing_runs(r: &mut dyn Read) -> Result<ProofingRunList, ModelError> {
    check_collection_version(r)?;
    let count = read_u32_le(r)?;
    let mut list = ProofingRunList::new();
    for _ in 0..count {
        let name = read_string(r)?;
        let machine = MachineId(read_u16_le(r)?);
        let start_time = read_utc_time(r)?;
        let end_time = read_utc_time(r)?;
        let extents = read_extents(r)?;
        list.add(ProofingRunRecord {
            name,
            machine,
            start_time,
            end_time,
            extents,
        });
    }
    Ok(list)
}
