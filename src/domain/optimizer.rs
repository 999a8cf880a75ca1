//! Interface to the external build optimizer and the inputs it takes.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::entities::{format_rubles, ItemId, PlayerContext, Rubles};
use super::lookup::{Catalog, CompatibilityMap};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizationStatus {
    Optimal,
    Feasible,
    Infeasible,
}

impl OptimizationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Optimal => "optimal",
            Self::Feasible => "feasible",
            Self::Infeasible => "infeasible",
        }
    }
}

impl fmt::Display for OptimizationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackKind {
    Preset,
    Naked,
}

/// Set by the optimizer only when nothing affordable exists; the base is then free.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackBase {
    #[serde(rename = "type")]
    pub kind: FallbackKind,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptimizerResult {
    pub status: OptimizationStatus,
    #[serde(default)]
    pub selected_items: Vec<ItemId>,
    #[serde(default)]
    pub selected_preset: Option<ItemId>,
    #[serde(default)]
    pub fallback_base: Option<FallbackBase>,
    #[serde(default)]
    pub objective_value: f64,
}

impl OptimizerResult {
    pub fn is_fallback(&self, kind: FallbackKind) -> bool {
        self.fallback_base
            .map(|fallback| fallback.kind == kind)
            .unwrap_or(false)
    }
}

/// Hard limits and inclusion rules handed to the optimizer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Constraints {
    pub max_price: Option<Rubles>,
    pub min_ergonomics: Option<f64>,
    pub max_recoil_v: Option<f64>,
    pub max_recoil_sum: Option<f64>,
    pub min_mag_capacity: Option<u32>,
    pub min_sighting_range: Option<u32>,
    pub max_weight: Option<f64>,
    pub include_items: BTreeSet<ItemId>,
    pub exclude_items: BTreeSet<ItemId>,
    /// Each inner group must be satisfied by at least one of its categories.
    pub include_categories: Vec<Vec<String>>,
    pub exclude_categories: BTreeSet<String>,
}

impl Constraints {
    /// Human-readable list of the limits that are set.
    pub fn active_limits(&self) -> Vec<String> {
        let mut limits = Vec::new();
        if let Some(price) = self.max_price {
            limits.push(format!("Budget ≤ {}", format_rubles(price)));
        }
        if let Some(ergo) = self.min_ergonomics {
            limits.push(format!("Ergonomics ≥ {ergo}"));
        }
        if let Some(recoil) = self.max_recoil_v {
            limits.push(format!("Recoil V ≤ {recoil}"));
        }
        if let Some(recoil) = self.max_recoil_sum {
            limits.push(format!("Recoil V+H ≤ {recoil}"));
        }
        if let Some(capacity) = self.min_mag_capacity {
            limits.push(format!("Magazine ≥ {capacity} rounds"));
        }
        if let Some(range) = self.min_sighting_range {
            limits.push(format!("Sighting range ≥ {range}m"));
        }
        if let Some(weight) = self.max_weight {
            limits.push(format!("Weight ≤ {weight:.1} kg"));
        }
        limits
    }
}

/// Objective weights in percent, as the user picks them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightMix {
    pub ergonomics: u8,
    pub recoil: u8,
    pub price: u8,
}

impl Default for WeightMix {
    fn default() -> Self {
        Self {
            ergonomics: 33,
            recoil: 67,
            price: 0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WeightPreset {
    Ergonomics,
    Recoil,
    Price,
    Balanced,
}

impl WeightPreset {
    pub fn mix(&self) -> WeightMix {
        let (ergonomics, recoil, price) = match self {
            Self::Ergonomics => (98, 1, 1),
            Self::Recoil => (1, 98, 1),
            Self::Price => (1, 1, 98),
            Self::Balanced => (34, 33, 33),
        };
        WeightMix {
            ergonomics,
            recoil,
            price,
        }
    }
}

/// Weights as the optimizer consumes them.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ObjectiveWeights {
    pub ergonomics: f64,
    pub recoil: f64,
    pub price: f64,
}

impl ObjectiveWeights {
    /// Gunsmith tasks only care about the cheapest build that meets the requirements.
    pub fn price_only() -> Self {
        Self {
            ergonomics: 0.0,
            recoil: 0.0,
            price: 100.0,
        }
    }
}

impl From<WeightMix> for ObjectiveWeights {
    fn from(mix: WeightMix) -> Self {
        let total = u32::from(mix.ergonomics) + u32::from(mix.recoil) + u32::from(mix.price);
        if total == 0 {
            return Self {
                ergonomics: 1.0,
                recoil: 1.0,
                price: 0.0,
            };
        }
        let scale = |pct: u8| f64::from(pct) / 100.0 * 2.0;
        Self {
            ergonomics: scale(mix.ergonomics),
            recoil: scale(mix.recoil),
            price: scale(mix.price),
        }
    }
}

/// The dimension a frontier sweep leaves out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrontierDimension {
    Ergo,
    Recoil,
    Price,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParetoPoint {
    pub ergo: f64,
    pub recoil_v: f64,
    pub recoil_h: f64,
    pub recoil_pct: f64,
    pub price: Rubles,
}

impl ParetoPoint {
    /// Value along the axis a sweep with `ignore` left out walks over.
    fn swept_value(&self, ignore: FrontierDimension) -> f64 {
        match ignore {
            FrontierDimension::Price | FrontierDimension::Recoil => self.ergo,
            FrontierDimension::Ergo => self.recoil_v,
        }
    }
}

/// The external combinatorial search over a weapon's slot tree.
pub trait Optimizer {
    #[allow(clippy::too_many_arguments)]
    fn optimize(
        &self,
        weapon_id: &str,
        catalog: &Catalog,
        compat: &CompatibilityMap,
        constraints: &Constraints,
        weights: ObjectiveWeights,
        player: &PlayerContext,
    ) -> OptimizerResult;

    #[allow(clippy::too_many_arguments)]
    fn explore_pareto_frontier(
        &self,
        weapon_id: &str,
        catalog: &Catalog,
        compat: &CompatibilityMap,
        ignore: FrontierDimension,
        constraints: &Constraints,
        steps: usize,
        player: &PlayerContext,
    ) -> Vec<ParetoPoint>;
}

/// Samples the frontier and holds the result to its contract: sorted along
/// the swept axis and no longer than `steps`.
#[allow(clippy::too_many_arguments)]
pub fn sample_frontier<O: Optimizer + ?Sized>(
    optimizer: &O,
    weapon_id: &str,
    catalog: &Catalog,
    compat: &CompatibilityMap,
    ignore: FrontierDimension,
    constraints: &Constraints,
    steps: usize,
    player: &PlayerContext,
) -> Vec<ParetoPoint> {
    let mut points = optimizer.explore_pareto_frontier(
        weapon_id,
        catalog,
        compat,
        ignore,
        constraints,
        steps,
        player,
    );
    points.sort_by(|a, b| {
        a.swept_value(ignore)
            .partial_cmp(&b.swept_value(ignore))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    points.truncate(steps);
    points
}

pub fn frontier_table(points: &[ParetoPoint]) -> String {
    let mut lines = vec![
        "| Ergo | Recoil % | Recoil V | Recoil H | Price |".to_string(),
        "|-----:|---------:|---------:|---------:|------:|".to_string(),
    ];
    for point in points {
        lines.push(format!(
            "| {:.1} | {:+.1}% | {:.1} | {:.1} | {} |",
            point.ergo,
            point.recoil_pct,
            point.recoil_v,
            point.recoil_h,
            format_rubles(point.price)
        ));
    }
    lines.join("\n")
}
