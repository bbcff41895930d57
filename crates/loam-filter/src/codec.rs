//! Versioned binary codec for filters and filter sets.
//!
//! All integers are little-endian. A filter set stream opens with magic
//! bytes and a format version; nested attribute and spatial filter
//! records carry their own version bytes so they can also travel alone.
//! An unexpected version is a hard error, never skipped.
//!
//! Serialized timestamps carry an explicit UTC flag byte. The encoder
//! always writes it set; a decoder finding it cleared rejects the
//! stream, so non-UTC times can never enter the filter model through
//! deserialization.

use std::io::{Read, Write};

use loam_core::{
    AlignmentId, DesignId, GpsMode, MachineId, Timestamp, TravelDirection, VibrationState,
};

use crate::attribute::{AttributeFilter, ElevationMode, ElevationRangeSource};
use crate::error::FilterError;
use crate::fence::Fence;
use crate::filter_set::{CombinedFilter, FilterSet};
use crate::spatial::{SpatialFilter, SpatialSelection};

/// Magic bytes opening a filter set stream.
pub const FILTER_SET_MAGIC: [u8; 4] = *b"LFLT";

/// Current filter set format version.
pub const FILTER_SET_VERSION: u8 = 1;

/// Current attribute filter record version.
pub const ATTRIBUTE_VERSION: u8 = 1;

/// Current spatial filter record version.
pub const SPATIAL_VERSION: u8 = 1;

const FLAG_TIME: u16 = 1 << 0;
const FLAG_MACHINE: u16 = 1 << 1;
const FLAG_DIRECTION: u16 = 1 << 2;
const FLAG_VIBRATION: u16 = 1 << 3;
const FLAG_LAYER_STATE: u16 = 1 << 4;
const FLAG_LAYER_ID: u16 = 1 << 5;
const FLAG_ELEVATION_RANGE: u16 = 1 << 6;
const FLAG_TEMPERATURE: u16 = 1 << 7;
const FLAG_PASS_COUNT: u16 = 1 << 8;
const FLAG_POSITIONING: u16 = 1 << 9;
const FLAG_GPS_ACCURACY: u16 = 1 << 10;
const FLAG_RETURN_EARLIEST: u16 = 1 << 11;

fn write_u8(w: &mut dyn Write, v: u8) -> Result<(), FilterError> {
    w.write_all(&[v])?;
    Ok(())
}

fn write_u16_le(w: &mut dyn Write, v: u16) -> Result<(), FilterError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

fn write_u32_le(w: &mut dyn Write, v: u32) -> Result<(), FilterError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

fn write_i64_le(w: &mut dyn Write, v: i64) -> Result<(), FilterError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

fn write_f64_le(w: &mut dyn Write, v: f64) -> Result<(), FilterError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

fn read_u8(r: &mut dyn Read) -> Result<u8, FilterError> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

fn read_u16_le(r: &mut dyn Read) -> Result<u16, FilterError> {
    let mut buf = [0u8; 2];
    r.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

fn read_u32_le(r: &mut dyn Read) -> Result<u32, FilterError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_i64_le(r: &mut dyn Read) -> Result<i64, FilterError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(i64::from_le_bytes(buf))
}

fn read_f64_le(r: &mut dyn Read) -> Result<f64, FilterError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(f64::from_le_bytes(buf))
}

fn read_bool(r: &mut dyn Read) -> Result<bool, FilterError> {
    match read_u8(r)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(FilterError::Malformed {
            detail: format!("boolean byte {other} is neither 0 nor 1"),
        }),
    }
}

fn write_utc_time(w: &mut dyn Write, t: Timestamp) -> Result<(), FilterError> {
    write_u8(w, 1)?;
    write_i64_le(w, t.0)
}

fn read_utc_time(r: &mut dyn Read) -> Result<Timestamp, FilterError> {
    if read_u8(r)? != 1 {
        return Err(FilterError::TimesNotUtc);
    }
    Ok(Timestamp(read_i64_le(r)?))
}

fn direction_code(d: TravelDirection) -> u8 {
    match d {
        TravelDirection::Forward => 0,
        TravelDirection::Reverse => 1,
        TravelDirection::Unknown => 2,
    }
}

fn direction_from(code: u8) -> Result<TravelDirection, FilterError> {
    match code {
        0 => Ok(TravelDirection::Forward),
        1 => Ok(TravelDirection::Reverse),
        2 => Ok(TravelDirection::Unknown),
        other => Err(FilterError::Malformed {
            detail: format!("unknown travel direction code {other}"),
        }),
    }
}

fn vibration_code(v: VibrationState) -> u8 {
    match v {
        VibrationState::Off => 0,
        VibrationState::On => 1,
        VibrationState::Invalid => 2,
    }
}

fn vibration_from(code: u8) -> Result<VibrationState, FilterError> {
    match code {
        0 => Ok(VibrationState::Off),
        1 => Ok(VibrationState::On),
        2 => Ok(VibrationState::Invalid),
        other => Err(FilterError::Malformed {
            detail: format!("unknown vibration state code {other}"),
        }),
    }
}

fn gps_mode_code(m: GpsMode) -> u8 {
    match m {
        GpsMode::NoGps => 0,
        GpsMode::Autonomous => 1,
        GpsMode::Differential => 2,
        GpsMode::RtkFloat => 3,
        GpsMode::RtkFixed => 4,
    }
}

fn gps_mode_from(code: u8) -> Result<GpsMode, FilterError> {
    match code {
        0 => Ok(GpsMode::NoGps),
        1 => Ok(GpsMode::Autonomous),
        2 => Ok(GpsMode::Differential),
        3 => Ok(GpsMode::RtkFloat),
        4 => Ok(GpsMode::RtkFixed),
        other => Err(FilterError::Malformed {
            detail: format!("unknown gps mode code {other}"),
        }),
    }
}

fn elevation_mode_code(m: ElevationMode) -> u8 {
    match m {
        ElevationMode::Last => 0,
        ElevationMode::First => 1,
        ElevationMode::Lowest => 2,
        ElevationMode::Highest => 3,
    }
}

fn elevation_mode_from(code: u8) -> Result<ElevationMode, FilterError> {
    match code {
        0 => Ok(ElevationMode::Last),
        1 => Ok(ElevationMode::First),
        2 => Ok(ElevationMode::Lowest),
        3 => Ok(ElevationMode::Highest),
        other => Err(FilterError::Malformed {
            detail: format!("unknown elevation mode code {other}"),
        }),
    }
}

/// Serialize an attribute filter record.
pub fn encode_attribute_filter(
    w: &mut dyn Write,
    filter: &AttributeFilter,
) -> Result<(), FilterError> {
    write_u8(w, ATTRIBUTE_VERSION)?;

    let mut flags = 0u16;
    if filter.has_time_filter {
        flags |= FLAG_TIME;
    }
    if filter.has_machine_filter {
        flags |= FLAG_MACHINE;
    }
    if filter.has_direction_filter {
        flags |= FLAG_DIRECTION;
    }
    if filter.has_vibration_filter {
        flags |= FLAG_VIBRATION;
    }
    if filter.has_layer_state_filter {
        flags |= FLAG_LAYER_STATE;
    }
    if filter.has_layer_id_filter {
        flags |= FLAG_LAYER_ID;
    }
    if filter.has_elevation_range_filter {
        flags |= FLAG_ELEVATION_RANGE;
    }
    if filter.has_temperature_filter {
        flags |= FLAG_TEMPERATURE;
    }
    if filter.has_pass_count_filter {
        flags |= FLAG_PASS_COUNT;
    }
    if filter.has_positioning_filter {
        flags |= FLAG_POSITIONING;
    }
    if filter.has_gps_accuracy_filter {
        flags |= FLAG_GPS_ACCURACY;
    }
    if filter.return_earliest {
        flags |= FLAG_RETURN_EARLIEST;
    }
    write_u16_le(w, flags)?;

    if filter.has_time_filter {
        write_utc_time(w, filter.start_time)?;
        write_utc_time(w, filter.end_time)?;
    }
    if filter.has_machine_filter {
        let count = u16::try_from(filter.machines.len()).map_err(|_| FilterError::Malformed {
            detail: format!("machine filter with {} entries", filter.machines.len()),
        })?;
        write_u16_le(w, count)?;
        for machine in &filter.machines {
            write_u16_le(w, machine.0)?;
        }
    }
    if filter.has_direction_filter {
        write_u8(w, direction_code(filter.direction))?;
    }
    if filter.has_vibration_filter {
        write_u8(w, vibration_code(filter.vibration))?;
    }
    if filter.has_layer_state_filter {
        write_u8(w, u8::from(filter.layer_state_on))?;
    }
    if filter.has_layer_id_filter {
        write_u16_le(w, filter.layer_id)?;
    }
    if filter.has_elevation_range_filter {
        match filter.elevation_range {
            Some(ElevationRangeSource::Level(level)) => {
                write_u8(w, 0)?;
                write_f64_le(w, level)?;
            }
            Some(ElevationRangeSource::Design(design)) => {
                write_u8(w, 1)?;
                write_u32_le(w, design.0)?;
            }
            None => return Err(FilterError::InvalidElevationRange),
        }
        write_f64_le(w, filter.elevation_offset)?;
        write_f64_le(w, filter.elevation_thickness)?;
    }
    if filter.has_temperature_filter {
        write_u16_le(w, filter.temperature_min)?;
        write_u16_le(w, filter.temperature_max)?;
    }
    if filter.has_pass_count_filter {
        write_u16_le(w, filter.min_pass_ordinal)?;
        write_u16_le(w, filter.max_pass_ordinal)?;
    }
    if filter.has_positioning_filter {
        write_u8(w, gps_mode_code(filter.gps_mode))?;
    }
    if filter.has_gps_accuracy_filter {
        write_u16_le(w, filter.gps_tolerance_mm)?;
    }
    write_u8(w, elevation_mode_code(filter.elevation_mode))
}

/// Deserialize an attribute filter record.
///
/// The decoded filter is unprepared regardless of the state it was
/// serialized from.
pub fn decode_attribute_filter(r: &mut dyn Read) -> Result<AttributeFilter, FilterError> {
    let version = read_u8(r)?;
    if version != ATTRIBUTE_VERSION {
        return Err(FilterError::UnsupportedVersion {
            expected: ATTRIBUTE_VERSION,
            found: version,
        });
    }

    let flags = read_u16_le(r)?;
    let mut filter = AttributeFilter::new();

    filter.has_time_filter = flags & FLAG_TIME != 0;
    if filter.has_time_filter {
        filter.start_time = read_utc_time(r)?;
        filter.end_time = read_utc_time(r)?;
    }
    filter.has_machine_filter = flags & FLAG_MACHINE != 0;
    if filter.has_machine_filter {
        let count = read_u16_le(r)?;
        filter.machines = (0..count)
            .map(|_| read_u16_le(r).map(MachineId))
            .collect::<Result<_, _>>()?;
    }
    filter.has_direction_filter = flags & FLAG_DIRECTION != 0;
    if filter.has_direction_filter {
        filter.direction = direction_from(read_u8(r)?)?;
    }
    filter.has_vibration_filter = flags & FLAG_VIBRATION != 0;
    if filter.has_vibration_filter {
        filter.vibration = vibration_from(read_u8(r)?)?;
    }
    filter.has_layer_state_filter = flags & FLAG_LAYER_STATE != 0;
    if filter.has_layer_state_filter {
        filter.layer_state_on = read_bool(r)?;
    }
    filter.has_layer_id_filter = flags & FLAG_LAYER_ID != 0;
    if filter.has_layer_id_filter {
        filter.layer_id = read_u16_le(r)?;
    }
    filter.has_elevation_range_filter = flags & FLAG_ELEVATION_RANGE != 0;
    if filter.has_elevation_range_filter {
        filter.elevation_range = Some(match read_u8(r)? {
            0 => ElevationRangeSource::Level(read_f64_le(r)?),
            1 => ElevationRangeSource::Design(DesignId(read_u32_le(r)?)),
            other => {
                return Err(FilterError::Malformed {
                    detail: format!("unknown elevation range source tag {other}"),
                })
            }
        });
        filter.elevation_offset = read_f64_le(r)?;
        filter.elevation_thickness = read_f64_le(r)?;
    }
    filter.has_temperature_filter = flags & FLAG_TEMPERATURE != 0;
    if filter.has_temperature_filter {
        filter.temperature_min = read_u16_le(r)?;
        filter.temperature_max = read_u16_le(r)?;
    }
    filter.has_pass_count_filter = flags & FLAG_PASS_COUNT != 0;
    if filter.has_pass_count_filter {
        filter.min_pass_ordinal = read_u16_le(r)?;
        filter.max_pass_ordinal = read_u16_le(r)?;
    }
    filter.has_positioning_filter = flags & FLAG_POSITIONING != 0;
    if filter.has_positioning_filter {
        filter.gps_mode = gps_mode_from(read_u8(r)?)?;
    }
    filter.has_gps_accuracy_filter = flags & FLAG_GPS_ACCURACY != 0;
    if filter.has_gps_accuracy_filter {
        filter.gps_tolerance_mm = read_u16_le(r)?;
    }
    filter.return_earliest = flags & FLAG_RETURN_EARLIEST != 0;
    filter.elevation_mode = elevation_mode_from(read_u8(r)?)?;
    filter.prepared = false;

    filter.validate()?;
    Ok(filter)
}

fn encode_fence(w: &mut dyn Write, fence: &Fence) -> Result<(), FilterError> {
    let count = u16::try_from(fence.points().len()).map_err(|_| FilterError::Malformed {
        detail: format!("fence with {} vertices", fence.points().len()),
    })?;
    write_u16_le(w, count)?;
    for p in fence.points() {
        write_f64_le(w, p.x)?;
        write_f64_le(w, p.y)?;
    }
    Ok(())
}

fn decode_fence(r: &mut dyn Read) -> Result<Fence, FilterError> {
    let count = read_u16_le(r)?;
    let mut points = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        let x = read_f64_le(r)?;
        let y = read_f64_le(r)?;
        points.push((x, y));
    }
    Fence::new(points)
}

/// Serialize a spatial filter record.
pub fn encode_spatial_filter(
    w: &mut dyn Write,
    filter: &SpatialFilter,
) -> Result<(), FilterError> {
    write_u8(w, SPATIAL_VERSION)?;
    write_u8(w, u8::from(filter.coords_are_grid))?;
    match &filter.selection {
        SpatialSelection::All => write_u8(w, 0),
        SpatialSelection::Fence(fence) => {
            write_u8(w, 1)?;
            encode_fence(w, fence)
        }
        SpatialSelection::Positional {
            center_x,
            center_y,
            radius,
            is_square,
        } => {
            write_u8(w, 2)?;
            write_f64_le(w, *center_x)?;
            write_f64_le(w, *center_y)?;
            write_f64_le(w, *radius)?;
            write_u8(w, u8::from(*is_square))
        }
        SpatialSelection::DesignMask { design } => {
            write_u8(w, 3)?;
            write_u32_le(w, design.0)
        }
        SpatialSelection::AlignmentMask {
            alignment,
            start_station,
            end_station,
            left_offset,
            right_offset,
            boundary,
        } => {
            write_u8(w, 4)?;
            write_u32_le(w, alignment.0)?;
            write_f64_le(w, *start_station)?;
            write_f64_le(w, *end_station)?;
            write_f64_le(w, *left_offset)?;
            write_f64_le(w, *right_offset)?;
            match boundary {
                Some(fence) => {
                    write_u8(w, 1)?;
                    encode_fence(w, fence)
                }
                None => write_u8(w, 0),
            }
        }
    }
}

/// Deserialize a spatial filter record.
pub fn decode_spatial_filter(r: &mut dyn Read) -> Result<SpatialFilter, FilterError> {
    let version = read_u8(r)?;
    if version != SPATIAL_VERSION {
        return Err(FilterError::UnsupportedVersion {
            expected: SPATIAL_VERSION,
            found: version,
        });
    }
    let coords_are_grid = read_bool(r)?;
    let selection = match read_u8(r)? {
        0 => SpatialSelection::All,
        1 => SpatialSelection::Fence(decode_fence(r)?),
        2 => SpatialSelection::Positional {
            center_x: read_f64_le(r)?,
            center_y: read_f64_le(r)?,
            radius: read_f64_le(r)?,
            is_square: read_bool(r)?,
        },
        3 => SpatialSelection::DesignMask {
            design: DesignId(read_u32_le(r)?),
        },
        4 => SpatialSelection::AlignmentMask {
            alignment: AlignmentId(read_u32_le(r)?),
            start_station: read_f64_le(r)?,
            end_station: read_f64_le(r)?,
            left_offset: read_f64_le(r)?,
            right_offset: read_f64_le(r)?,
            boundary: if read_bool(r)? {
                Some(decode_fence(r)?)
            } else {
                None
            },
        },
        other => {
            return Err(FilterError::Malformed {
                detail: format!("unknown spatial selection tag {other}"),
            })
        }
    };
    Ok(SpatialFilter {
        coords_are_grid,
        selection,
    })
}

/// Serialize a combined filter (attribute record then spatial record).
pub fn encode_combined_filter(
    w: &mut dyn Write,
    filter: &CombinedFilter,
) -> Result<(), FilterError> {
    encode_attribute_filter(w, &filter.attribute)?;
    encode_spatial_filter(w, &filter.spatial)
}

/// Deserialize a combined filter.
pub fn decode_combined_filter(r: &mut dyn Read) -> Result<CombinedFilter, FilterError> {
    let attribute = decode_attribute_filter(r)?;
    let spatial = decode_spatial_filter(r)?;
    Ok(CombinedFilter { attribute, spatial })
}

/// Serialize a whole filter set, empty slots included.
pub fn encode_filter_set(w: &mut dyn Write, set: &FilterSet) -> Result<(), FilterError> {
    w.write_all(&FILTER_SET_MAGIC)?;
    write_u8(w, FILTER_SET_VERSION)?;
    let count = u8::try_from(set.slots().len()).map_err(|_| FilterError::Malformed {
        detail: format!("filter set with {} slots", set.slots().len()),
    })?;
    write_u8(w, count)?;
    for slot in set.slots() {
        match slot {
            Some(filter) => {
                write_u8(w, 1)?;
                encode_combined_filter(w, filter)?;
            }
            None => write_u8(w, 0)?,
        }
    }
    Ok(())
}

/// Deserialize a whole filter set, validating magic and version.
pub fn decode_filter_set(r: &mut dyn Read) -> Result<FilterSet, FilterError> {
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)?;
    if magic != FILTER_SET_MAGIC {
        return Err(FilterError::InvalidMagic);
    }
    let version = read_u8(r)?;
    if version != FILTER_SET_VERSION {
        return Err(FilterError::UnsupportedVersion {
            expected: FILTER_SET_VERSION,
            found: version,
        });
    }
    let count = read_u8(r)?;
    let mut set = FilterSet::new();
    for _ in 0..count {
        if read_bool(r)? {
            set.push(Some(decode_combined_filter(r)?));
        } else {
            set.push(None);
        }
    }
    Ok(set)
}
