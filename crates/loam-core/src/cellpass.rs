//! The cell-pass measurement record and its null sentinels.
//!
//! A cell pass is one timestamped measurement a machine made over a single
//! ground cell. Most compaction attributes are optional at the sensor
//! level; each carries a distinct in-band null sentinel. Null values must
//! propagate through filtering and analysis; treating a null as zero
//! corrupts every downstream aggregate.

use crate::id::MachineId;
use crate::time::Timestamp;

/// Null sentinel for CCV (caterpillar compaction value).
pub const NULL_CCV: i16 = i16::MAX;

/// Null sentinel for MDP (machine drive power).
pub const NULL_MDP: i16 = i16::MAX;

/// Null sentinel for CCA (caterpillar compaction assistant).
pub const NULL_CCA: u8 = u8::MAX;

/// Null sentinel for material temperature (tenths of a degree).
pub const NULL_TEMPERATURE: u16 = u16::MAX;

/// Null sentinel for machine ground speed (cm/s).
pub const NULL_SPEED: u16 = u16::MAX;

/// Null sentinel for measured elevation.
pub const NULL_HEIGHT: f32 = f32::MIN;

/// Null sentinel for reported GPS accuracy (millimetres).
pub const NULL_GPS_ACCURACY: u16 = u16::MAX;

/// Machine travel direction when the pass was recorded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TravelDirection {
    /// Travelling forward.
    #[default]
    Forward,
    /// Travelling in reverse.
    Reverse,
    /// Direction was not reported.
    Unknown,
}

/// Drum vibration state when the pass was recorded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum VibrationState {
    /// Vibration off.
    Off,
    /// Vibration on.
    On,
    /// Vibration state was not reported.
    #[default]
    Invalid,
}

/// Positioning technology / GPS solution quality for the pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum GpsMode {
    /// No GPS solution recorded.
    #[default]
    NoGps,
    /// Autonomous (uncorrected) solution.
    Autonomous,
    /// Differential correction.
    Differential,
    /// RTK float solution.
    RtkFloat,
    /// RTK fixed solution.
    RtkFixed,
}

/// How the pass was produced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PassType {
    /// Measured by the machine's drum/blade position.
    #[default]
    Front,
    /// Measured by a rear axle sensor.
    Rear,
    /// Measured by a towed implement.
    Track,
    /// Measured by a wheel sensor.
    Wheel,
}

/// One timestamped measurement record for a single ground cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CellPass {
    /// UTC time the pass was recorded.
    pub time: Timestamp,
    /// Measured elevation, or [`NULL_HEIGHT`].
    pub height: f32,
    /// Machine that recorded the pass.
    pub machine: MachineId,
    /// CCV compaction value, or [`NULL_CCV`].
    pub ccv: i16,
    /// MDP drive power value, or [`NULL_MDP`].
    pub mdp: i16,
    /// CCA compaction value, or [`NULL_CCA`].
    pub cca: u8,
    /// Material temperature in tenths of a degree, or [`NULL_TEMPERATURE`].
    pub material_temperature: u16,
    /// Ground speed in cm/s, or [`NULL_SPEED`].
    pub machine_speed: u16,
    /// Travel direction.
    pub direction: TravelDirection,
    /// Drum vibration state.
    pub vibration: VibrationState,
    /// Positioning technology.
    pub gps_mode: GpsMode,
    /// Reported GPS accuracy in millimetres, or [`NULL_GPS_ACCURACY`].
    pub gps_accuracy_mm: u16,
    /// Pass type.
    pub pass_type: PassType,
}

impl CellPass {
    /// A pass with every optional attribute null, at the given time and
    /// elevation. Ingest fills in whatever the machine actually reported.
    pub fn at(time: Timestamp, height: f32, machine: MachineId) -> Self {
        Self {
            time,
            height,
            machine,
            ccv: NULL_CCV,
            mdp: NULL_MDP,
            cca: NULL_CCA,
            material_temperature: NULL_TEMPERATURE,
            machine_speed: NULL_SPEED,
            direction: TravelDirection::default(),
            vibration: VibrationState::default(),
            gps_mode: GpsMode::default(),
            gps_accuracy_mm: NULL_GPS_ACCURACY,
            pass_type: PassType::default(),
        }
    }

    /// Whether this pass carries a measured elevation.
    pub fn has_height(&self) -> bool {
        self.height != NULL_HEIGHT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_pass_has_all_nulls() {
        let p = CellPass::at(Timestamp::from_seconds(1), 10.0, MachineId(3));
        assert_eq!(p.ccv, NULL_CCV);
        assert_eq!(p.mdp, NULL_MDP);
        assert_eq!(p.cca, NULL_CCA);
        assert_eq!(p.material_temperature, NULL_TEMPERATURE);
        assert_eq!(p.machine_speed, NULL_SPEED);
        assert!(p.has_height());
    }

    #[test]
    fn null_height_detected() {
        let p = CellPass::at(Timestamp::from_seconds(1), NULL_HEIGHT, MachineId(0));
        assert!(!p.has_height());
    }
}
