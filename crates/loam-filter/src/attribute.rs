//! Attribute filtering over a cell's pass history.
//!
//! An attribute filter is a set of independently toggleable predicates.
//! Each predicate only participates when its flag is enabled; a disabled
//! predicate never rejects a pass. Null attribute sentinels propagate:
//! a pass with a null value for an enabled predicate is excluded, never
//! treated as zero.
//!
//! All mutators clear the cached prepared state, so a filter that is
//! reconfigured after preparation is re-prepared before use.

use loam_core::{
    CellPass, DesignId, GpsMode, MachineId, Timestamp, TravelDirection, VibrationState,
    NULL_GPS_ACCURACY, NULL_HEIGHT, NULL_TEMPERATURE,
};

use crate::error::FilterError;

/// Which recorded pass supplies the cell's "as-recorded" elevation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ElevationMode {
    /// The most recent matching pass.
    #[default]
    Last,
    /// The earliest matching pass.
    First,
    /// The matching pass with the lowest elevation.
    Lowest,
    /// The matching pass with the highest elevation.
    Highest,
}

/// Where an elevation range filter takes its base elevation from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ElevationRangeSource {
    /// A fixed benchmark level in world elevation units.
    Level(f64),
    /// The per-cell elevation of a surface design.
    Design(DesignId),
}

/// Predicates over a cell's chronologically ordered pass history.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct AttributeFilter {
    pub(crate) has_time_filter: bool,
    pub(crate) start_time: Timestamp,
    pub(crate) end_time: Timestamp,

    pub(crate) has_machine_filter: bool,
    pub(crate) machines: Vec<MachineId>,

    pub(crate) has_direction_filter: bool,
    pub(crate) direction: TravelDirection,

    pub(crate) has_vibration_filter: bool,
    pub(crate) vibration: VibrationState,

    pub(crate) has_layer_state_filter: bool,
    pub(crate) layer_state_on: bool,

    pub(crate) has_layer_id_filter: bool,
    pub(crate) layer_id: u16,

    pub(crate) has_elevation_range_filter: bool,
    pub(crate) elevation_range: Option<ElevationRangeSource>,
    pub(crate) elevation_offset: f64,
    pub(crate) elevation_thickness: f64,

    pub(crate) has_temperature_filter: bool,
    pub(crate) temperature_min: u16,
    pub(crate) temperature_max: u16,

    pub(crate) has_pass_count_filter: bool,
    pub(crate) min_pass_ordinal: u16,
    pub(crate) max_pass_ordinal: u16,

    pub(crate) has_positioning_filter: bool,
    pub(crate) gps_mode: GpsMode,

    pub(crate) has_gps_accuracy_filter: bool,
    pub(crate) gps_tolerance_mm: u16,

    pub(crate) elevation_mode: ElevationMode,
    pub(crate) return_earliest: bool,

    pub(crate) prepared: bool,
}

impl AttributeFilter {
    /// A filter with every predicate disabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any predicate is enabled.
    pub fn has_any_filter(&self) -> bool {
        self.has_time_filter
            || self.has_machine_filter
            || self.has_direction_filter
            || self.has_vibration_filter
            || self.has_layer_state_filter
            || self.has_layer_id_filter
            || self.has_elevation_range_filter
            || self.has_temperature_filter
            || self.has_pass_count_filter
            || self.has_positioning_filter
            || self.has_gps_accuracy_filter
    }

    /// Whether the cached prepared state is still valid.
    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    /// Record that preparation has completed for the current settings.
    pub fn mark_prepared(&mut self) {
        self.prepared = true;
    }

    /// Restrict to passes in the half-open time range `[start, end)`.
    pub fn set_time_range(&mut self, start: Timestamp, end: Timestamp) {
        self.has_time_filter = true;
        self.start_time = start;
        self.end_time = end;
        self.prepared = false;
    }

    /// Remove the time range restriction.
    pub fn clear_time_range(&mut self) {
        self.has_time_filter = false;
        self.prepared = false;
    }

    /// The active time range, when the time predicate is enabled.
    pub fn time_range(&self) -> Option<(Timestamp, Timestamp)> {
        self.has_time_filter.then_some((self.start_time, self.end_time))
    }

    /// Restrict to passes recorded by the given machines.
    pub fn set_machines(&mut self, machines: Vec<MachineId>) {
        self.has_machine_filter = true;
        self.machines = machines;
        self.prepared = false;
    }

    /// Restrict to passes recorded while travelling in `direction`.
    pub fn set_direction(&mut self, direction: TravelDirection) {
        self.has_direction_filter = true;
        self.direction = direction;
        self.prepared = false;
    }

    /// Restrict to passes with the given drum vibration state.
    pub fn set_vibration(&mut self, vibration: VibrationState) {
        self.has_vibration_filter = true;
        self.vibration = vibration;
        self.prepared = false;
    }

    /// Constrain layer detection: with `on` cleared, all passes form a
    /// single layer rather than machine-reported lifts.
    pub fn set_layer_state(&mut self, on: bool) {
        self.has_layer_state_filter = true;
        self.layer_state_on = on;
        self.prepared = false;
    }

    /// The layer state restriction, when enabled.
    pub fn layer_state(&self) -> Option<bool> {
        self.has_layer_state_filter.then_some(self.layer_state_on)
    }

    /// Restrict layer results to the layer with the given id.
    pub fn set_layer_id(&mut self, id: u16) {
        self.has_layer_id_filter = true;
        self.layer_id = id;
        self.prepared = false;
    }

    /// The layer id restriction, when enabled.
    pub fn layer_id(&self) -> Option<u16> {
        self.has_layer_id_filter.then_some(self.layer_id)
    }

    /// Restrict to passes whose elevation lies in
    /// `[base + offset, base + offset + thickness]` where `base` comes
    /// from the given source.
    pub fn set_elevation_range(
        &mut self,
        source: ElevationRangeSource,
        offset: f64,
        thickness: f64,
    ) {
        self.has_elevation_range_filter = true;
        self.elevation_range = Some(source);
        self.elevation_offset = offset;
        self.elevation_thickness = thickness;
        self.prepared = false;
    }

    /// The elevation range configuration, when enabled.
    pub fn elevation_range(&self) -> Option<(ElevationRangeSource, f64, f64)> {
        if self.has_elevation_range_filter {
            self.elevation_range
                .map(|s| (s, self.elevation_offset, self.elevation_thickness))
        } else {
            None
        }
    }

    /// Whether filtering needs a per-cell design elevation lookup.
    pub fn requires_design_elevation(&self) -> bool {
        matches!(
            self.elevation_range(),
            Some((ElevationRangeSource::Design(_), _, _))
        )
    }

    /// Restrict to passes with material temperature in `[min, max]`,
    /// tenths of a degree.
    pub fn set_temperature_range(&mut self, min: u16, max: u16) {
        self.has_temperature_filter = true;
        self.temperature_min = min;
        self.temperature_max = max;
        self.prepared = false;
    }

    /// Keep only passes whose 1-based ordinal within the filtered
    /// sequence lies in `[min, max]`. Applied after every other
    /// predicate.
    pub fn set_pass_ordinal_range(&mut self, min: u16, max: u16) {
        self.has_pass_count_filter = true;
        self.min_pass_ordinal = min;
        self.max_pass_ordinal = max;
        self.prepared = false;
    }

    /// Restrict to passes recorded with the given positioning
    /// technology.
    pub fn set_positioning(&mut self, mode: GpsMode) {
        self.has_positioning_filter = true;
        self.gps_mode = mode;
        self.prepared = false;
    }

    /// Restrict to passes whose reported GPS accuracy is within
    /// `tolerance_mm`. Passes with no reported accuracy are excluded.
    pub fn set_gps_tolerance(&mut self, tolerance_mm: u16) {
        self.has_gps_accuracy_filter = true;
        self.gps_tolerance_mm = tolerance_mm;
        self.prepared = false;
    }

    /// Choose which matching pass supplies the as-recorded elevation.
    pub fn set_elevation_mode(&mut self, mode: ElevationMode) {
        self.elevation_mode = mode;
        self.prepared = false;
    }

    /// The as-recorded elevation selection mode.
    pub fn elevation_mode(&self) -> ElevationMode {
        self.elevation_mode
    }

    /// Prefer the earliest matching pass over the most recent when a
    /// single representative pass is requested.
    pub fn set_return_earliest(&mut self, earliest: bool) {
        self.return_earliest = earliest;
        self.prepared = false;
    }

    /// Whether the earliest matching pass is preferred.
    pub fn returns_earliest(&self) -> bool {
        self.return_earliest
    }

    /// Check configuration consistency.
    pub fn validate(&self) -> Result<(), FilterError> {
        if self.has_elevation_range_filter && self.elevation_range.is_none() {
            return Err(FilterError::InvalidElevationRange);
        }
        Ok(())
    }

    /// Whether a single pass matches every enabled predicate except the
    /// pass-ordinal range, which applies to the filtered sequence as a
    /// whole.
    ///
    /// `design_elevation` is the cell's design elevation when an
    /// elevation range filter references a design; `None` means the
    /// design had no elevation here, which excludes the pass.
    pub fn pass_matches(&self, pass: &CellPass, design_elevation: Option<f32>) -> bool {
        if self.has_time_filter && !pass.time.in_range(self.start_time, self.end_time) {
            return false;
        }
        if self.has_machine_filter && !self.machines.contains(&pass.machine) {
            return false;
        }
        if self.has_direction_filter && pass.direction != self.direction {
            return false;
        }
        if self.has_vibration_filter && pass.vibration != self.vibration {
            return false;
        }
        if self.has_temperature_filter {
            let t = pass.material_temperature;
            if t == NULL_TEMPERATURE || t < self.temperature_min || t > self.temperature_max {
                return false;
            }
        }
        if self.has_positioning_filter && pass.gps_mode != self.gps_mode {
            return false;
        }
        if self.has_gps_accuracy_filter {
            let acc = pass.gps_accuracy_mm;
            if acc == NULL_GPS_ACCURACY || acc > self.gps_tolerance_mm {
                return false;
            }
        }
        if self.has_elevation_range_filter {
            let base = match self.elevation_range {
                Some(ElevationRangeSource::Level(level)) => Some(level),
                Some(ElevationRangeSource::Design(_)) => design_elevation.map(f64::from),
                None => None,
            };
            let Some(base) = base else {
                return false;
            };
            if pass.height == NULL_HEIGHT {
                return false;
            }
            let lower = base + self.elevation_offset;
            let upper = lower + self.elevation_thickness;
            let h = f64::from(pass.height);
            if h < lower || h > upper {
                return false;
            }
        }
        true
    }

    /// Filter a chronologically ordered pass history.
    ///
    /// Retains passes matching every enabled predicate, then applies the
    /// pass-ordinal range to the surviving sequence.
    pub fn filter_passes(
        &self,
        passes: &[CellPass],
        design_elevation: Option<f32>,
    ) -> Vec<CellPass> {
        let mut filtered: Vec<CellPass> = passes
            .iter()
            .filter(|p| self.pass_matches(p, design_elevation))
            .copied()
            .collect();
        if self.has_pass_count_filter {
            let start = usize::from(self.min_pass_ordinal).saturating_sub(1);
            let end = usize::from(self.max_pass_ordinal).min(filtered.len());
            if start >= end {
                filtered.clear();
            } else {
                filtered.drain(end..);
                filtered.drain(..start);
            }
        }
        filtered
    }

    /// The single representative pass of a filtered sequence: the most
    /// recent match, or the earliest when that policy is set.
    pub fn select_representative<'a>(&self, filtered: &'a [CellPass]) -> Option<&'a CellPass> {
        if self.return_earliest {
            filtered.first()
        } else {
            filtered.last()
        }
    }

    /// The as-recorded elevation of a filtered sequence, honoring the
    /// elevation selection mode. Null heights are skipped.
    pub fn select_elevation(&self, filtered: &[CellPass]) -> Option<f32> {
        let mut with_height = filtered.iter().filter(|p| p.has_height());
        match self.elevation_mode {
            ElevationMode::Last => with_height.last().map(|p| p.height),
            ElevationMode::First => with_height.next().map(|p| p.height),
            ElevationMode::Lowest => with_height
                .map(|p| p.height)
                .fold(None, |acc: Option<f32>, h| {
                    Some(acc.map_or(h, |a| a.min(h)))
                }),
            ElevationMode::Highest => with_height
                .map(|p| p.height)
                .fold(None, |acc: Option<f32>, h| {
                    Some(acc.map_or(h, |a| a.max(h)))
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2020-01-01T00:00:00Z and friends, seconds since the Unix epoch.
    const T_2019_12_31: i64 = 1_577_750_400;
    const T_2020_01_01: i64 = 1_577_836_800;
    const T_2020_01_01_NOON: i64 = 1_577_880_000;
    const T_2020_01_02: i64 = 1_577_923_200;
    const T_2020_01_03: i64 = 1_578_009_600;

    fn pass_at(secs: i64) -> CellPass {
        CellPass::at(Timestamp::from_seconds(secs), 10.0, MachineId(1))
    }

    #[test]
    fn time_range_keeps_only_middle_pass() {
        let history = [
            pass_at(T_2019_12_31),
            pass_at(T_2020_01_01_NOON),
            pass_at(T_2020_01_03),
        ];
        let mut filter = AttributeFilter::new();
        filter.set_time_range(
            Timestamp::from_seconds(T_2020_01_01),
            Timestamp::from_seconds(T_2020_01_02),
        );
        let kept = filter.filter_passes(&history, None);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].time, Timestamp::from_seconds(T_2020_01_01_NOON));
    }

    #[test]
    fn time_range_is_half_open() {
        let mut filter = AttributeFilter::new();
        filter.set_time_range(Timestamp::from_seconds(100), Timestamp::from_seconds(200));
        assert!(filter.pass_matches(&pass_at(100), None));
        assert!(!filter.pass_matches(&pass_at(200), None));
    }

    #[test]
    fn machine_filter_is_set_membership() {
        let mut filter = AttributeFilter::new();
        filter.set_machines(vec![MachineId(1), MachineId(5)]);
        let mut p = pass_at(10);
        assert!(filter.pass_matches(&p, None));
        p.machine = MachineId(3);
        assert!(!filter.pass_matches(&p, None));
    }

    #[test]
    fn null_temperature_propagates_as_excluded() {
        let mut filter = AttributeFilter::new();
        filter.set_temperature_range(0, 1000);
        // A null temperature is unknown, not zero; with the predicate
        // enabled it must not match.
        let p = pass_at(10);
        assert_eq!(p.material_temperature, NULL_TEMPERATURE);
        assert!(!filter.pass_matches(&p, None));

        let mut warm = pass_at(10);
        warm.material_temperature = 500;
        assert!(filter.pass_matches(&warm, None));
    }

    #[test]
    fn gps_tolerance_excludes_null_accuracy() {
        let mut filter = AttributeFilter::new();
        filter.set_gps_tolerance(50);
        let p = pass_at(10);
        assert!(!filter.pass_matches(&p, None));

        let mut precise = pass_at(10);
        precise.gps_accuracy_mm = 30;
        assert!(filter.pass_matches(&precise, None));
        precise.gps_accuracy_mm = 80;
        assert!(!filter.pass_matches(&precise, None));
    }

    #[test]
    fn level_elevation_range_bounds_passes() {
        let mut filter = AttributeFilter::new();
        filter.set_elevation_range(ElevationRangeSource::Level(10.0), 1.0, 2.0);
        // Range is [11.0, 13.0].
        let mut p = pass_at(10);
        p.height = 12.0;
        assert!(filter.pass_matches(&p, None));
        p.height = 10.5;
        assert!(!filter.pass_matches(&p, None));
        p.height = NULL_HEIGHT;
        assert!(!filter.pass_matches(&p, None));
    }

    #[test]
    fn design_elevation_range_needs_a_patch_value() {
        let mut filter = AttributeFilter::new();
        filter.set_elevation_range(ElevationRangeSource::Design(DesignId(4)), 0.0, 1.0);
        let mut p = pass_at(10);
        p.height = 20.5;
        assert!(filter.pass_matches(&p, Some(20.0)));
        assert!(!filter.pass_matches(&p, Some(30.0)));
        // No design coverage over the cell excludes the pass.
        assert!(!filter.pass_matches(&p, None));
    }

    #[test]
    fn pass_ordinal_range_applies_after_other_predicates() {
        let history: Vec<CellPass> = (0..6).map(|i| pass_at(100 + i)).collect();
        let mut filter = AttributeFilter::new();
        // Time filter drops the first two, then ordinals select from the
        // survivors, not from the raw history.
        filter.set_time_range(Timestamp::from_seconds(102), Timestamp::MAX);
        filter.set_pass_ordinal_range(2, 3);
        let kept = filter.filter_passes(&history, None);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].time, Timestamp::from_seconds(103));
        assert_eq!(kept[1].time, Timestamp::from_seconds(104));
    }

    #[test]
    fn ordinal_range_beyond_sequence_is_empty() {
        let history: Vec<CellPass> = (0..2).map(|i| pass_at(100 + i)).collect();
        let mut filter = AttributeFilter::new();
        filter.set_pass_ordinal_range(5, 9);
        assert!(filter.filter_passes(&history, None).is_empty());
    }

    #[test]
    fn representative_pass_honors_earliest_policy() {
        let history: Vec<CellPass> = (0..3).map(|i| pass_at(100 + i)).collect();
        let mut filter = AttributeFilter::new();
        assert_eq!(
            filter.select_representative(&history).map(|p| p.time),
            Some(Timestamp::from_seconds(102))
        );
        filter.set_return_earliest(true);
        assert_eq!(
            filter.select_representative(&history).map(|p| p.time),
            Some(Timestamp::from_seconds(100))
        );
    }

    #[test]
    fn elevation_selection_modes() {
        let mut history: Vec<CellPass> = Vec::new();
        for (i, h) in [(0, 5.0f32), (1, 9.0), (2, NULL_HEIGHT), (3, 7.0)] {
            let mut p = pass_at(100 + i);
            p.height = h;
            history.push(p);
        }
        let mut filter = AttributeFilter::new();
        assert_eq!(filter.select_elevation(&history), Some(7.0));
        filter.set_elevation_mode(ElevationMode::First);
        assert_eq!(filter.select_elevation(&history), Some(5.0));
        filter.set_elevation_mode(ElevationMode::Lowest);
        assert_eq!(filter.select_elevation(&history), Some(5.0));
        filter.set_elevation_mode(ElevationMode::Highest);
        assert_eq!(filter.select_elevation(&history), Some(9.0));
    }

    #[test]
    fn toggling_a_predicate_invalidates_prepared_state() {
        let mut filter = AttributeFilter::new();
        filter.mark_prepared();
        assert!(filter.is_prepared());
        filter.set_direction(TravelDirection::Reverse);
        assert!(!filter.is_prepared());
    }

    #[test]
    fn disabled_filter_matches_everything() {
        let filter = AttributeFilter::new();
        assert!(!filter.has_any_filter());
        assert!(filter.pass_matches(&pass_at(0), None));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn filtered_sequence_stays_chronological(
                times in prop::collection::vec(0i64..10_000, 0..40),
                start in 0i64..10_000,
                span in 1i64..10_000,
            ) {
                let mut sorted = times;
                sorted.sort_unstable();
                let history: Vec<CellPass> = sorted
                    .into_iter()
                    .map(|t| CellPass::at(Timestamp::from_seconds(t), 1.0, MachineId(0)))
                    .collect();

                let mut filter = AttributeFilter::new();
                filter.set_time_range(
                    Timestamp::from_seconds(start),
                    Timestamp::from_seconds(start + span),
                );
                let kept = filter.filter_passes(&history, None);
                for pair in kept.windows(2) {
                    prop_assert!(pair[0].time <= pair[1].time);
                }
                for p in &kept {
                    prop_assert!(p.time.in_range(
                        Timestamp::from_seconds(start),
                        Timestamp::from_seconds(start + span),
                    ));
                }
            }
        }
    }
}
