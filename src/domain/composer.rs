//! Turns an optimizer result into final stats and a cost breakdown.
//!
//! The on-screen summary and the export both read from [`ComposedBuild`], so the
//! preset and fallback pricing rules live here and nowhere else.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::entities::{
    format_rubles, is_unpriced, Item, ItemId, NakedStats, PlayerContext, Preset, Rubles, Weapon,
};
use super::lookup::ItemLookup;
use super::offers::{resolve_offer, ResolvedOffer};
use super::optimizer::{FallbackKind, OptimizationStatus, OptimizerResult};

pub const FALLBACK_SOURCE: &str = "fallback (free)";
pub const NOT_AVAILABLE_SOURCE: &str = "not available";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ComposeError {
    #[error("optimization was {0}; there is no build to compose")]
    Infeasible(OptimizationStatus),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BuildItem {
    pub id: ItemId,
    pub name: String,
    pub ergonomics: f64,
    pub recoil_modifier: f64,
    pub weight: f64,
    pub offer: ResolvedOffer,
    /// Comes bundled with the selected preset rather than bought on its own.
    pub in_preset: bool,
}

impl BuildItem {
    fn new(item: &Item, player: &PlayerContext, in_preset: bool) -> Self {
        Self {
            id: item.id.clone(),
            name: item.name.clone(),
            ergonomics: item.ergonomics,
            recoil_modifier: item.recoil_modifier,
            weight: item.weight,
            offer: resolve_offer(&item.offers, player),
            in_preset,
        }
    }

    pub fn price(&self) -> Rubles {
        self.offer.price()
    }
}

/// What the mods are attached to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BuildBase {
    Preset {
        id: ItemId,
        name: String,
        /// Price charged, zero for a fallback preset.
        price: Rubles,
        price_source: String,
        is_fallback: bool,
        image: Option<String>,
        item_count: usize,
    },
    /// The optimizer picked a preset neither preset list knows about.
    MissingPreset { id: ItemId },
    Naked {
        price: Rubles,
        price_source: String,
        is_fallback: bool,
        /// False when the weapon only carries the unpriced placeholder.
        is_priced: bool,
        image: Option<String>,
    },
}

impl BuildBase {
    pub fn is_fallback(&self) -> bool {
        match self {
            Self::Preset { is_fallback, .. } | Self::Naked { is_fallback, .. } => *is_fallback,
            Self::MissingPreset { .. } => false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuildKind {
    Preset,
    NakedWithMods,
    NakedOnly,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FinalStats {
    /// Raw sum, may leave the 0–100 range.
    pub ergonomics: f64,
    pub recoil_vertical: f64,
    pub recoil_horizontal: f64,
    pub recoil_multiplier: f64,
    pub total_weight: f64,
    pub total_cost: Rubles,
}

impl FinalStats {
    /// Display value; arithmetic always uses the raw figure.
    pub fn ergonomics_capped(&self) -> f64 {
        self.ergonomics.clamp(0.0, 100.0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatDeltas {
    pub ergonomics: f64,
    pub recoil_vertical: f64,
    pub recoil_horizontal: f64,
    pub weight: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostBreakdown {
    /// Preset price or weapon price, depending on the base.
    pub base_cost: Rubles,
    pub mods_cost: Rubles,
}

impl CostBreakdown {
    pub fn total(&self) -> Rubles {
        self.base_cost + self.mods_cost
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComposedBuild {
    pub status: OptimizationStatus,
    pub objective_value: f64,
    pub weapon_id: ItemId,
    pub weapon_name: String,
    /// Weapon price with the unpriced placeholder mapped to zero.
    pub weapon_base_price: Rubles,
    pub naked: NakedStats,
    pub stats: FinalStats,
    pub deltas: StatDeltas,
    pub cost: CostBreakdown,
    pub base: BuildBase,
    /// Selected items found in the lookup, in selection order.
    pub items: Vec<BuildItem>,
    /// Everything the selected preset ships with.
    pub preset_contents: Vec<BuildItem>,
    /// Selected ids the lookup did not know; left out of stats and cost.
    pub missing_items: Vec<ItemId>,
}

impl ComposedBuild {
    pub fn additional_items(&self) -> impl Iterator<Item = &BuildItem> {
        self.items.iter().filter(|item| !item.in_preset)
    }

    pub fn kind(&self) -> BuildKind {
        match self.base {
            BuildBase::Preset { .. } | BuildBase::MissingPreset { .. } => BuildKind::Preset,
            BuildBase::Naked { .. } if self.items.is_empty() => BuildKind::NakedOnly,
            BuildBase::Naked { .. } => BuildKind::NakedWithMods,
        }
    }

    /// One-line breakdown of how the total was reached.
    pub fn cost_composition(&self) -> String {
        let label = match (&self.base, self.kind()) {
            (BuildBase::MissingPreset { .. }, _) => "Preset (unknown)",
            (_, BuildKind::Preset) => "Preset",
            (_, BuildKind::NakedWithMods) => "Base weapon",
            (_, BuildKind::NakedOnly) => "Base weapon only",
        };
        format!(
            "{label}: {} + mods: {}",
            format_rubles(self.cost.base_cost),
            format_rubles(self.cost.mods_cost)
        )
    }
}

/// Weapon price the player would pay: best available offer, else the catalog figure.
pub fn resolved_weapon_price(weapon: &Weapon, player: &PlayerContext) -> (Rubles, String) {
    match resolve_offer(&weapon.offers, player) {
        ResolvedOffer::Available { label, price } => (price, label),
        ResolvedOffer::Unavailable => (weapon.base_price, weapon.price_source.clone()),
    }
}

/// Composes an optimizer result into a build.
///
/// `presets` is the list the player can currently buy; a preset missing from it
/// (a fallback target) is looked up in the weapon's full preset catalog.
pub fn compose(
    result: &OptimizerResult,
    weapon: &Weapon,
    presets: &[Preset],
    player: &PlayerContext,
    lookup: &ItemLookup,
) -> Result<ComposedBuild, ComposeError> {
    if result.status == OptimizationStatus::Infeasible {
        return Err(ComposeError::Infeasible(result.status));
    }

    let preset = result.selected_preset.as_deref().map(|preset_id| {
        presets
            .iter()
            .find(|preset| preset.id == preset_id)
            .or_else(|| weapon.preset(preset_id))
            .ok_or(preset_id)
    });

    let mut seen = HashSet::new();
    let mut items = Vec::new();
    let mut missing_items = Vec::new();
    for id in &result.selected_items {
        if !seen.insert(id.as_str()) {
            continue;
        }
        match lookup.get(id) {
            Some(item) => {
                let in_preset = matches!(preset, Some(Ok(preset)) if preset.contains(id));
                items.push(BuildItem::new(item, player, in_preset));
            }
            None => {
                warn!(item_id = %id, weapon = %weapon.name, "selected item missing from lookup");
                missing_items.push(id.clone());
            }
        }
    }

    let (stats_without_cost, deltas) = aggregate_stats(&weapon.naked, &items);
    let mods_cost: Rubles = items
        .iter()
        .filter(|item| !item.in_preset)
        .map(BuildItem::price)
        .sum();

    let (weapon_price, weapon_source) = resolved_weapon_price(weapon, player);
    let weapon_is_priced = !is_unpriced(weapon_price);
    let weapon_base_price = if weapon_is_priced { weapon_price } else { 0 };

    let (base, base_cost, preset_contents) = match preset {
        Some(Ok(preset)) => {
            let is_fallback = result.is_fallback(FallbackKind::Preset);
            let price = if is_fallback { 0 } else { preset.price };
            let price_source = if is_fallback {
                FALLBACK_SOURCE.to_string()
            } else {
                preset.price_source.clone()
            };
            let contents = preset
                .items
                .iter()
                .filter_map(|id| lookup.get(id))
                .map(|item| BuildItem::new(item, player, true))
                .collect();
            let base = BuildBase::Preset {
                id: preset.id.clone(),
                name: preset.name.clone(),
                price,
                price_source,
                is_fallback,
                image: preset.image.clone(),
                item_count: preset.items.len(),
            };
            (base, price, contents)
        }
        Some(Err(preset_id)) => {
            warn!(preset_id, weapon = %weapon.name, "selected preset not found in any preset list");
            let base = BuildBase::MissingPreset {
                id: preset_id.to_string(),
            };
            (base, 0, Vec::new())
        }
        None => {
            let is_fallback = result.is_fallback(FallbackKind::Naked);
            let (price, price_source) = if is_fallback {
                (0, FALLBACK_SOURCE.to_string())
            } else if weapon_is_priced {
                (weapon_price, weapon_source)
            } else {
                (0, NOT_AVAILABLE_SOURCE.to_string())
            };
            let base = BuildBase::Naked {
                price,
                price_source,
                is_fallback,
                is_priced: weapon_is_priced,
                image: weapon.image.clone(),
            };
            (base, price, Vec::new())
        }
    };

    let cost = CostBreakdown {
        base_cost,
        mods_cost,
    };
    debug!(
        weapon = %weapon.name,
        base_cost,
        mods_cost,
        missing = missing_items.len(),
        "composed build"
    );

    Ok(ComposedBuild {
        status: result.status,
        objective_value: result.objective_value,
        weapon_id: weapon.id.clone(),
        weapon_name: weapon.name.clone(),
        weapon_base_price,
        naked: weapon.naked.clone(),
        stats: FinalStats {
            total_cost: cost.total(),
            ..stats_without_cost
        },
        deltas,
        cost,
        base,
        items,
        preset_contents,
        missing_items,
    })
}

fn aggregate_stats(naked: &NakedStats, items: &[BuildItem]) -> (FinalStats, StatDeltas) {
    let ergonomics = naked.ergonomics + items.iter().map(|item| item.ergonomics).sum::<f64>();
    let recoil_multiplier = items
        .iter()
        .filter(|item| item.recoil_modifier != 0.0)
        .fold(1.0, |multiplier, item| {
            multiplier * (1.0 + item.recoil_modifier)
        });
    let recoil_vertical = naked.recoil_vertical * recoil_multiplier;
    let recoil_horizontal = naked.recoil_horizontal * recoil_multiplier;
    let total_weight = naked.weight + items.iter().map(|item| item.weight).sum::<f64>();

    let stats = FinalStats {
        ergonomics,
        recoil_vertical,
        recoil_horizontal,
        recoil_multiplier,
        total_weight,
        total_cost: 0,
    };
    let deltas = StatDeltas {
        ergonomics: ergonomics - naked.ergonomics,
        recoil_vertical: recoil_vertical - naked.recoil_vertical,
        recoil_horizontal: recoil_horizontal - naked.recoil_horizontal,
        weight: total_weight - naked.weight,
    };
    (stats, deltas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::Offer;
    use crate::domain::optimizer::FallbackBase;

    fn item(id: &str, ergonomics: f64, recoil_modifier: f64, price: Rubles) -> Item {
        Item {
            id: id.to_string(),
            name: format!("Item {id}"),
            short_name: None,
            category: Some("Mod".to_string()),
            weight: 0.5,
            ergonomics,
            recoil_modifier,
            offers: vec![Offer::trader("Prapor", Some(1), price)],
            icon_link: None,
        }
    }

    fn preset(id: &str, price: Rubles, items: &[&str]) -> Preset {
        Preset {
            id: id.to_string(),
            name: format!("Preset {id}"),
            price,
            price_source: "Prapor LL1".to_string(),
            items: items.iter().map(|id| id.to_string()).collect(),
            image: None,
            offers: vec![Offer::trader("Prapor", Some(1), price)],
        }
    }

    fn weapon(base_price: Rubles, presets: Vec<Preset>) -> Weapon {
        Weapon {
            id: "gun".to_string(),
            name: "Test Rifle".to_string(),
            short_name: None,
            category: Some("Assault rifle".to_string()),
            caliber: Some("Caliber556x45NATO".to_string()),
            base_price,
            price_source: "market".to_string(),
            offers: Vec::new(),
            naked: NakedStats {
                ergonomics: 45.0,
                recoil_vertical: 100.0,
                recoil_horizontal: 200.0,
                weight: 3.0,
            },
            presets,
            image: None,
        }
    }

    fn lookup() -> ItemLookup {
        ItemLookup::new(vec![
            item("a", 10.0, -0.1, 10_000),
            item("b", -3.0, -0.05, 25_000),
            item("c", 60.0, 0.0, 5_000),
        ])
    }

    fn result(items: &[&str], preset: Option<&str>, fallback: Option<FallbackKind>) -> OptimizerResult {
        OptimizerResult {
            status: OptimizationStatus::Optimal,
            selected_items: items.iter().map(|id| id.to_string()).collect(),
            selected_preset: preset.map(str::to_string),
            fallback_base: fallback.map(|kind| FallbackBase { kind }),
            objective_value: 1.0,
        }
    }

    #[test]
    fn test_infeasible_result_is_not_composed() {
        let mut infeasible = result(&["a"], None, None);
        infeasible.status = OptimizationStatus::Infeasible;
        let err = compose(
            &infeasible,
            &weapon(50_000, Vec::new()),
            &[],
            &PlayerContext::default(),
            &lookup(),
        )
        .unwrap_err();
        assert_eq!(err, ComposeError::Infeasible(OptimizationStatus::Infeasible));
    }

    #[test]
    fn test_unpriced_weapon_costs_nothing() {
        let build = compose(
            &result(&["a", "b"], None, None),
            &weapon(999_999_999, Vec::new()),
            &[],
            &PlayerContext::default(),
            &lookup(),
        )
        .unwrap();
        assert_eq!(build.cost.base_cost, 0);
        assert_eq!(build.stats.total_cost, 35_000);
        assert_eq!(build.weapon_base_price, 0);
        assert!(matches!(
            build.base,
            BuildBase::Naked { is_priced: false, .. }
        ));
    }

    #[test]
    fn test_naked_build_adds_weapon_price() {
        let build = compose(
            &result(&["a"], None, None),
            &weapon(50_000, Vec::new()),
            &[],
            &PlayerContext::default(),
            &lookup(),
        )
        .unwrap();
        assert_eq!(build.kind(), BuildKind::NakedWithMods);
        assert_eq!(build.stats.total_cost, 60_000);
        assert_eq!(build.cost_composition(), "Base weapon: ₽50,000 + mods: ₽10,000");
    }

    #[test]
    fn test_naked_fallback_zeroes_base() {
        let build = compose(
            &result(&["a"], None, Some(FallbackKind::Naked)),
            &weapon(50_000, Vec::new()),
            &[],
            &PlayerContext::default(),
            &lookup(),
        )
        .unwrap();
        assert_eq!(build.cost.base_cost, 0);
        assert_eq!(build.stats.total_cost, 10_000);
        assert!(build.base.is_fallback());
    }

    #[test]
    fn test_naked_only_build() {
        let build = compose(
            &result(&[], None, None),
            &weapon(50_000, Vec::new()),
            &[],
            &PlayerContext::default(),
            &lookup(),
        )
        .unwrap();
        assert_eq!(build.kind(), BuildKind::NakedOnly);
        assert_eq!(build.cost_composition(), "Base weapon only: ₽50,000 + mods: ₽0");
        assert_eq!(build.stats.ergonomics, 45.0);
        assert_eq!(build.stats.recoil_multiplier, 1.0);
    }

    #[test]
    fn test_preset_build_charges_only_extra_mods() {
        let presets = vec![preset("p", 80_000, &["a"])];
        let build = compose(
            &result(&["a", "b"], Some("p"), None),
            &weapon(50_000, presets.clone()),
            &presets,
            &PlayerContext::default(),
            &lookup(),
        )
        .unwrap();
        assert_eq!(build.kind(), BuildKind::Preset);
        assert_eq!(build.cost.base_cost, 80_000);
        assert_eq!(build.cost.mods_cost, 25_000);
        assert_eq!(build.cost.base_cost + build.cost.mods_cost, build.stats.total_cost);
        let additional: Vec<_> = build.additional_items().map(|item| item.id.as_str()).collect();
        assert_eq!(additional, vec!["b"]);
        assert_eq!(build.preset_contents.len(), 1);
        assert_eq!(build.cost_composition(), "Preset: ₽80,000 + mods: ₽25,000");
    }

    #[test]
    fn test_fallback_preset_found_in_full_catalog() {
        let all_presets = vec![preset("p", 80_000, &["a"])];
        let build = compose(
            &result(&["a", "b"], Some("p"), Some(FallbackKind::Preset)),
            &weapon(50_000, all_presets),
            &[],
            &PlayerContext::default(),
            &lookup(),
        )
        .unwrap();
        match &build.base {
            BuildBase::Preset {
                price,
                price_source,
                is_fallback,
                ..
            } => {
                assert_eq!(*price, 0);
                assert_eq!(price_source, FALLBACK_SOURCE);
                assert!(*is_fallback);
            }
            other => panic!("unexpected base {other:?}"),
        }
        assert_eq!(build.stats.total_cost, 25_000);
    }

    #[test]
    fn test_unknown_preset_degrades() {
        let build = compose(
            &result(&["a"], Some("ghost"), None),
            &weapon(50_000, Vec::new()),
            &[],
            &PlayerContext::default(),
            &lookup(),
        )
        .unwrap();
        assert_eq!(
            build.base,
            BuildBase::MissingPreset {
                id: "ghost".to_string()
            }
        );
        assert_eq!(build.cost.base_cost, 0);
        assert_eq!(build.cost.mods_cost, 10_000);
    }

    #[test]
    fn test_stats_follow_naked_baseline() {
        let build = compose(
            &result(&["a", "b", "c"], None, None),
            &weapon(50_000, Vec::new()),
            &[],
            &PlayerContext::default(),
            &lookup(),
        )
        .unwrap();
        assert_eq!(build.stats.ergonomics, 112.0);
        assert_eq!(build.stats.ergonomics_capped(), 100.0);
        assert!((build.stats.recoil_multiplier - 0.855).abs() < 1e-9);
        assert!((build.stats.recoil_vertical - 85.5).abs() < 1e-9);
        assert!((build.stats.recoil_horizontal - 171.0).abs() < 1e-9);
        assert!((build.deltas.recoil_vertical + 14.5).abs() < 1e-9);
        assert_eq!(build.deltas.ergonomics, 67.0);
        assert!((build.stats.total_weight - 4.5).abs() < 1e-9);
    }

    #[test]
    fn test_negative_ergonomics_caps_at_zero() {
        let lookup = ItemLookup::new(vec![
            item("can", -50.0, -0.2, 30_000),
            item("b", -3.0, -0.05, 25_000),
        ]);
        let build = compose(
            &result(&["can", "b"], None, None),
            &weapon(50_000, Vec::new()),
            &[],
            &PlayerContext::default(),
            &lookup,
        )
        .unwrap();
        assert_eq!(build.stats.ergonomics, -8.0);
        assert_eq!(build.stats.ergonomics_capped(), 0.0);
        assert_eq!(build.deltas.ergonomics, -53.0);
    }

    #[test]
    fn test_lookup_miss_skips_row() {
        let build = compose(
            &result(&["a", "nope", "a"], None, None),
            &weapon(50_000, Vec::new()),
            &[],
            &PlayerContext::default(),
            &lookup(),
        )
        .unwrap();
        assert_eq!(build.items.len(), 1);
        assert_eq!(build.missing_items, vec!["nope".to_string()]);
        assert_eq!(build.cost.mods_cost, 10_000);
    }

    #[test]
    fn test_unavailable_mod_is_priced_zero() {
        let mut locked = item("x", 1.0, 0.0, 99_000);
        locked.offers = vec![Offer::trader("Prapor", Some(4), 99_000)];
        let lookup = ItemLookup::new(vec![locked]);
        let player = PlayerContext::default().with_all_traders(1);
        let build = compose(
            &result(&["x"], None, None),
            &weapon(50_000, Vec::new()),
            &[],
            &player,
            &lookup,
        )
        .unwrap();
        assert_eq!(build.items[0].offer, ResolvedOffer::Unavailable);
        assert_eq!(build.cost.mods_cost, 0);
    }

    #[test]
    fn test_weapon_offer_beats_catalog_price() {
        let mut gun = weapon(50_000, Vec::new());
        gun.offers = vec![Offer::trader("Mechanic", Some(2), 42_000)];
        let (price, source) = resolved_weapon_price(&gun, &PlayerContext::default());
        assert_eq!(price, 42_000);
        assert_eq!(source, "Mechanic LL2");
    }

    #[test]
    fn test_compose_is_deterministic() {
        let presets = vec![preset("p", 80_000, &["a"])];
        let gun = weapon(50_000, presets.clone());
        let input = result(&["a", "b"], Some("p"), None);
        let first = compose(&input, &gun, &presets, &PlayerContext::default(), &lookup()).unwrap();
        let second = compose(&input, &gun, &presets, &PlayerContext::default(), &lookup()).unwrap();
        assert_eq!(first, second);
    }
}
