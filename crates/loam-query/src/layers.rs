//! Lift detection and per-layer summaries over filtered pass history.
//!
//! Filtered passes are grouped into layers (lifts) by an externally
//! supplied detection policy, then summarized: per-layer elevation
//! bounds, and representative compaction values found by searching
//! backward from the newest layer for the first non-null recording,
//! with per-machine target series supplying the matching targets.

use loam_core::{
    CellPass, Timestamp, NULL_CCA, NULL_CCV, NULL_HEIGHT, NULL_MDP, NULL_SPEED,
    NULL_TEMPERATURE,
};
use loam_filter::AttributeFilter;
use loam_model::TargetValueStore;

/// Decides where one lift ends and the next begins.
pub trait LiftDetector {
    /// Whether `next` starts a new layer, given the previous pass and
    /// the highest elevation recorded in the running layer.
    fn starts_new_layer(&self, prev: &CellPass, next: &CellPass, layer_max_height: f32) -> bool;
}

/// Never splits: the whole history forms one layer.
pub struct SingleLayerDetector;

impl LiftDetector for SingleLayerDetector {
    fn starts_new_layer(&self, _: &CellPass, _: &CellPass, _: f32) -> bool {
        false
    }
}

/// Starts a new layer when elevation drops more than a dead band below
/// the running layer's maximum, the signature of a fresh lift of loose
/// material being struck off lower than the compacted surface.
pub struct ElevationDeclineDetector {
    /// Permitted elevation decline within one layer, world units.
    pub dead_band: f32,
}

impl LiftDetector for ElevationDeclineDetector {
    fn starts_new_layer(&self, _: &CellPass, next: &CellPass, layer_max_height: f32) -> bool {
        if next.height == NULL_HEIGHT || layer_max_height == NULL_HEIGHT {
            return false;
        }
        next.height < layer_max_height - self.dead_band
    }
}

/// Starts a new layer when elevation has risen more than a target lift
/// thickness above the layer's first recorded elevation.
pub struct TargetThicknessDetector {
    /// Nominal lift thickness, world units.
    pub thickness: f32,
}

impl LiftDetector for TargetThicknessDetector {
    fn starts_new_layer(&self, prev: &CellPass, next: &CellPass, _: f32) -> bool {
        if next.height == NULL_HEIGHT || prev.height == NULL_HEIGHT {
            return false;
        }
        next.height - prev.height > self.thickness
    }
}

/// One detected layer of passes.
#[derive(Clone, Debug, PartialEq)]
pub struct Layer {
    /// 1-based layer ordinal, oldest first.
    pub id: u16,
    /// The layer's passes in chronological order.
    pub passes: Vec<CellPass>,
    /// Elevation of the first pass carrying one.
    pub first_elevation: Option<f32>,
    /// Elevation of the last pass carrying one.
    pub last_elevation: Option<f32>,
    /// Lowest recorded elevation.
    pub lowest_elevation: Option<f32>,
    /// Highest recorded elevation.
    pub highest_elevation: Option<f32>,
}

impl Layer {
    fn from_passes(id: u16, passes: Vec<CellPass>) -> Self {
        let mut first = None;
        let mut last = None;
        let mut lowest: Option<f32> = None;
        let mut highest: Option<f32> = None;
        for pass in &passes {
            if !pass.has_height() {
                continue;
            }
            if first.is_none() {
                first = Some(pass.height);
            }
            last = Some(pass.height);
            lowest = Some(lowest.map_or(pass.height, |l: f32| l.min(pass.height)));
            highest = Some(highest.map_or(pass.height, |h: f32| h.max(pass.height)));
        }
        Self {
            id,
            passes,
            first_elevation: first,
            last_elevation: last,
            lowest_elevation: lowest,
            highest_elevation: highest,
        }
    }

    /// Layer thickness: last minus first recorded elevation.
    pub fn thickness(&self) -> Option<f32> {
        match (self.first_elevation, self.last_elevation) {
            (Some(first), Some(last)) => Some(last - first),
            _ => None,
        }
    }
}

/// Group filtered passes into layers with the given detector.
///
/// The attribute filter's layer restrictions apply here: a layer-state
/// restriction of "off" collapses everything into a single layer, and a
/// layer-id restriction keeps only the layer with that ordinal.
pub fn build_layers(
    passes: &[CellPass],
    detector: &dyn LiftDetector,
    filter: &AttributeFilter,
) -> Vec<Layer> {
    if passes.is_empty() {
        return Vec::new();
    }

    let single = matches!(filter.layer_state(), Some(false));
    let mut layers: Vec<Layer> = Vec::new();
    let mut current: Vec<CellPass> = vec![passes[0]];
    let mut layer_max = passes[0].height;

    for pair in passes.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        let split = !single && detector.starts_new_layer(prev, next, layer_max);
        if split {
            let id = layers.len() as u16 + 1;
            layers.push(Layer::from_passes(id, std::mem::take(&mut current)));
            layer_max = NULL_HEIGHT;
        }
        current.push(*next);
        if next.height != NULL_HEIGHT && (layer_max == NULL_HEIGHT || next.height > layer_max) {
            layer_max = next.height;
        }
    }
    let id = layers.len() as u16 + 1;
    layers.push(Layer::from_passes(id, current));

    if let Some(wanted) = filter.layer_id() {
        layers.retain(|layer| layer.id == wanted);
    }
    layers
}

/// Summary of a cell's layer stack, as shown in profile views.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LayerStackSummary {
    /// Number of layers after restrictions.
    pub layer_count: usize,
    /// Pass count of the newest layer.
    pub top_pass_count: usize,
    /// Representative CCV: first non-null searching backward from the
    /// newest pass of the newest layer.
    pub ccv: Option<i16>,
    /// Target CCV in force when the representative CCV was recorded.
    pub target_ccv: Option<i16>,
    /// Representative MDP, found the same way.
    pub mdp: Option<i16>,
    /// Target MDP in force when the representative MDP was recorded.
    pub target_mdp: Option<i16>,
    /// Representative CCA, found the same way.
    pub cca: Option<u8>,
    /// Representative material temperature, found the same way.
    pub temperature: Option<u16>,
    /// Target temperature range in force at the representative
    /// temperature's recording.
    pub target_temperature_range: Option<(u16, u16)>,
    /// Target pass count in force at the newest pass.
    pub target_pass_count: Option<u16>,
    /// Slowest recorded speed across the newest layer.
    pub min_speed: Option<u16>,
    /// Fastest recorded speed across the newest layer.
    pub max_speed: Option<u16>,
    /// Elevation of the newest pass carrying one.
    pub elevation: Option<f32>,
}

// Backward search: newest layer first, newest pass first within it.
fn backward_find<T>(
    layers: &[Layer],
    mut pick: impl FnMut(&CellPass) -> Option<T>,
) -> Option<(T, Timestamp, loam_core::MachineId)> {
    for layer in layers.iter().rev() {
        for pass in layer.passes.iter().rev() {
            if let Some(value) = pick(pass) {
                return Some((value, pass.time, pass.machine));
            }
        }
    }
    None
}

/// Summarize a layer stack, pulling matching targets from the machine
/// target series in force at each representative recording's time.
pub fn summarize_layers(layers: &[Layer], targets: &TargetValueStore) -> LayerStackSummary {
    let mut summary = LayerStackSummary {
        layer_count: layers.len(),
        ..LayerStackSummary::default()
    };
    let Some(top) = layers.last() else {
        return summary;
    };
    summary.top_pass_count = top.passes.len();

    for pass in &top.passes {
        if pass.machine_speed == NULL_SPEED {
            continue;
        }
        summary.min_speed = Some(
            summary
                .min_speed
                .map_or(pass.machine_speed, |s| s.min(pass.machine_speed)),
        );
        summary.max_speed = Some(
            summary
                .max_speed
                .map_or(pass.machine_speed, |s| s.max(pass.machine_speed)),
        );
    }

    summary.elevation = backward_find(layers, |p| p.has_height().then_some(p.height))
        .map(|(height, _, _)| height);

    if let Some((ccv, time, machine)) =
        backward_find(layers, |p| (p.ccv != NULL_CCV).then_some(p.ccv))
    {
        summary.ccv = Some(ccv);
        summary.target_ccv = targets
            .for_machine(machine)
            .and_then(|t| t.target_ccv.value_at(time))
            .copied();
    }
    if let Some((mdp, time, machine)) =
        backward_find(layers, |p| (p.mdp != NULL_MDP).then_some(p.mdp))
    {
        summary.mdp = Some(mdp);
        summary.target_mdp = targets
            .for_machine(machine)
            .and_then(|t| t.target_mdp.value_at(time))
            .copied();
    }
    summary.cca = backward_find(layers, |p| (p.cca != NULL_CCA).then_some(p.cca))
        .map(|(cca, _, _)| cca);
    if let Some((temp, time, machine)) = backward_find(layers, |p| {
        (p.material_temperature != NULL_TEMPERATURE).then_some(p.material_temperature)
    }) {
        summary.temperature = Some(temp);
        summary.target_temperature_range = targets
            .for_machine(machine)
            .and_then(|t| t.temperature_range.value_at(time))
            .copied();
    }
    if let Some(newest) = top.passes.last() {
        summary.target_pass_count = targets
            .for_machine(newest.machine)
            .and_then(|t| t.target_pass_count.value_at(newest.time))
            .copied();
    }

    summary
}
