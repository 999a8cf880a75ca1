//! Build snapshots: a JSON record for re-import and a Markdown report for sharing.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tempfile::NamedTempFile;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::{info, warn};

use super::composer::{BuildBase, BuildItem, ComposedBuild, CostBreakdown};
use super::entities::{capitalize, format_rubles, ItemId, PlayerContext, Rubles};
use super::lookup::ItemLookup;
use super::optimizer::{Constraints, OptimizationStatus};
use crate::util::version::generator_label;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("cannot export to {}: {reason}", .path.display())]
    MalformedTarget { path: PathBuf, reason: String },
    #[error("failed to format export timestamp: {0}")]
    Timestamp(#[from] time::error::Format),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

/// The limits and player context a build was optimized under, with item ids
/// replaced by names.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstraintsUsed {
    pub max_price: Option<Rubles>,
    pub min_ergonomics: Option<f64>,
    pub max_recoil_v: Option<f64>,
    pub max_recoil_sum: Option<f64>,
    pub min_mag_capacity: Option<u32>,
    pub min_sighting_range: Option<u32>,
    pub max_weight: Option<f64>,
    pub include_items: Option<Vec<String>>,
    pub exclude_items: Option<Vec<String>>,
    pub include_categories: Option<Vec<Vec<String>>>,
    pub exclude_categories: Option<Vec<String>>,
    pub trader_levels: BTreeMap<String, u8>,
    pub flea_available: bool,
    pub player_level: u32,
}

impl ConstraintsUsed {
    pub fn new(constraints: &Constraints, player: &PlayerContext, lookup: &ItemLookup) -> Self {
        let names = |ids: &std::collections::BTreeSet<ItemId>| {
            Some(lookup.names_of(ids)).filter(|names| !names.is_empty())
        };
        let mut include_categories = constraints.include_categories.clone();
        include_categories.sort();
        Self {
            max_price: constraints.max_price,
            min_ergonomics: constraints.min_ergonomics,
            max_recoil_v: constraints.max_recoil_v,
            max_recoil_sum: constraints.max_recoil_sum,
            min_mag_capacity: constraints.min_mag_capacity,
            min_sighting_range: constraints.min_sighting_range,
            max_weight: constraints.max_weight,
            include_items: names(&constraints.include_items),
            exclude_items: names(&constraints.exclude_items),
            include_categories: Some(include_categories).filter(|groups| !groups.is_empty()),
            exclude_categories: Some(constraints.exclude_categories.iter().cloned().collect())
                .filter(|categories: &Vec<String>| !categories.is_empty()),
            trader_levels: player.trader_levels.clone(),
            flea_available: player.flea_enabled,
            player_level: player.level,
        }
    }

    fn report_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(price) = self.max_price {
            lines.push(format!("- Budget: {}", format_rubles(price)));
        }
        if let Some(ergo) = self.min_ergonomics {
            lines.push(format!("- Min Ergonomics: {ergo}"));
        }
        if let Some(recoil) = self.max_recoil_v {
            lines.push(format!("- Max Recoil V: {recoil}"));
        }
        if let Some(recoil) = self.max_recoil_sum {
            lines.push(format!("- Max Recoil V+H: {recoil}"));
        }
        if let Some(capacity) = self.min_mag_capacity {
            lines.push(format!("- Min Mag Capacity: {capacity} rounds"));
        }
        if let Some(range) = self.min_sighting_range {
            lines.push(format!("- Min Sighting Range: {range}m"));
        }
        if let Some(weight) = self.max_weight {
            lines.push(format!("- Max Weight: {weight:.1} kg"));
        }
        if let Some(items) = &self.include_items {
            lines.push(format!("- Required Items: {}", items.join(", ")));
        }
        if let Some(items) = &self.exclude_items {
            lines.push(format!("- Excluded Items: {}", items.join(", ")));
        }
        if let Some(groups) = &self.include_categories {
            for group in groups {
                lines.push(format!("- Required Category: {}", group.join(" or ")));
            }
        }
        if let Some(categories) = &self.exclude_categories {
            lines.push(format!("- Excluded Categories: {}", categories.join(", ")));
        }
        lines.push(format!("- Player Level: {}", self.player_level));
        for (trader, level) in &self.trader_levels {
            lines.push(format!("- {}: LL{level}", capitalize(trader)));
        }
        lines.push(format!(
            "- Flea Market: {}",
            if self.flea_available { "Yes" } else { "No" }
        ));
        lines
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExportWeapon {
    pub id: ItemId,
    pub name: String,
    pub base_price: Rubles,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExportPreset {
    pub id: ItemId,
    /// Unknown when the optimizer named a preset no list carries.
    pub name: Option<String>,
    pub price: Option<Rubles>,
    pub is_fallback: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExportMod {
    pub id: ItemId,
    pub name: String,
    pub ergonomics: f64,
    pub recoil_modifier: f64,
    pub price: Rubles,
    pub source: String,
    pub in_preset: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExportStats {
    pub ergonomics: f64,
    pub recoil_vertical: f64,
    pub recoil_horizontal: f64,
    pub recoil_multiplier: f64,
    pub total_weight: f64,
    pub total_cost: Rubles,
}

/// Self-describing snapshot of a composed build.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BuildExport {
    pub exported_at: String,
    pub generator: String,
    pub weapon: ExportWeapon,
    pub preset: Option<ExportPreset>,
    pub mods: Vec<ExportMod>,
    pub final_stats: ExportStats,
    pub cost_breakdown: CostBreakdown,
    pub constraints: ConstraintsUsed,
    pub optimization_status: OptimizationStatus,
    #[serde(default)]
    pub missing_items: Vec<ItemId>,
}

impl BuildExport {
    pub fn from_json(raw: &str) -> Result<Self, ExportError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn to_json(&self) -> Result<String, ExportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub fn format_build(
    build: &ComposedBuild,
    constraints: &ConstraintsUsed,
) -> Result<(BuildExport, String), ExportError> {
    format_build_at(build, constraints, OffsetDateTime::now_utc())
}

/// Same as [`format_build`] with the clock pinned, so output only depends on its inputs.
pub fn format_build_at(
    build: &ComposedBuild,
    constraints: &ConstraintsUsed,
    at: OffsetDateTime,
) -> Result<(BuildExport, String), ExportError> {
    let export = build_record(build, constraints, at.format(&Rfc3339)?);
    let stamp = at.format(format_description!("[year]-[month]-[day] [hour]:[minute]"))?;
    let report = build_report(build, constraints, &stamp);
    Ok((export, report))
}

fn build_record(
    build: &ComposedBuild,
    constraints: &ConstraintsUsed,
    exported_at: String,
) -> BuildExport {
    let preset = match &build.base {
        BuildBase::Preset {
            id,
            name,
            price,
            is_fallback,
            ..
        } => Some(ExportPreset {
            id: id.clone(),
            name: Some(name.clone()),
            price: Some(*price),
            is_fallback: *is_fallback,
        }),
        BuildBase::MissingPreset { id } => Some(ExportPreset {
            id: id.clone(),
            name: None,
            price: None,
            is_fallback: false,
        }),
        BuildBase::Naked { .. } => None,
    };

    let stats = &build.stats;
    BuildExport {
        exported_at,
        generator: generator_label(),
        weapon: ExportWeapon {
            id: build.weapon_id.clone(),
            name: build.weapon_name.clone(),
            base_price: build.weapon_base_price,
        },
        preset,
        mods: build.items.iter().map(export_mod).collect(),
        final_stats: ExportStats {
            ergonomics: round_to(stats.ergonomics, 1),
            recoil_vertical: round_to(stats.recoil_vertical, 1),
            recoil_horizontal: round_to(stats.recoil_horizontal, 1),
            recoil_multiplier: round_to(stats.recoil_multiplier, 4),
            total_weight: round_to(stats.total_weight, 2),
            total_cost: stats.total_cost,
        },
        cost_breakdown: build.cost,
        constraints: constraints.clone(),
        optimization_status: build.status,
        missing_items: build.missing_items.clone(),
    }
}

fn export_mod(item: &BuildItem) -> ExportMod {
    ExportMod {
        id: item.id.clone(),
        name: item.name.clone(),
        ergonomics: item.ergonomics,
        recoil_modifier: item.recoil_modifier,
        price: item.price(),
        source: item.offer.label().to_string(),
        in_preset: item.in_preset,
    }
}

fn build_report(build: &ComposedBuild, constraints: &ConstraintsUsed, stamp: &str) -> String {
    let stats = &build.stats;
    let mut lines = vec![
        format!("# {} Build", build.weapon_name),
        format!("*Exported: {stamp}*"),
        String::new(),
        "## Final Stats".to_string(),
        "| Stat | Value |".to_string(),
        "|------|-------|".to_string(),
        format!("| Ergonomics | {:.1} |", stats.ergonomics_capped()),
        format!("| Recoil V | {:.1} |", stats.recoil_vertical),
        format!("| Recoil H | {:.1} |", stats.recoil_horizontal),
        format!("| Weight | {:.2} kg |", stats.total_weight),
        format!("| Total Cost | {} |", format_rubles(stats.total_cost)),
        String::new(),
    ];

    match &build.base {
        BuildBase::Preset {
            name,
            price,
            is_fallback,
            ..
        } => {
            lines.push("## Base Preset".to_string());
            let note = if *is_fallback { " (fallback - free)" } else { "" };
            lines.push(format!("**{name}** - {}{note}", format_rubles(*price)));
        }
        BuildBase::MissingPreset { id } => {
            lines.push("## Base Preset".to_string());
            lines.push(format!("**Unknown preset `{id}`** - {}", format_rubles(0)));
        }
        BuildBase::Naked {
            price,
            is_fallback,
            is_priced,
            ..
        } => {
            lines.push("## Base Weapon".to_string());
            let note = if *is_fallback {
                " (fallback - free)"
            } else if !is_priced {
                " (price unavailable)"
            } else {
                ""
            };
            lines.push(format!(
                "**{}** - {}{note}",
                build.weapon_name,
                format_rubles(*price)
            ));
        }
    }
    lines.push(String::new());

    let additional: Vec<&BuildItem> = build.additional_items().collect();
    if !additional.is_empty() {
        lines.push("## Modifications".to_string());
        lines.push("| Name | Ergo | Recoil | Price | Source |".to_string());
        lines.push("|------|------|--------|-------|--------|".to_string());
        for item in additional {
            lines.push(format!(
                "| {} | {:+.1} | {:+.1}% | {} | {} |",
                item.name,
                item.ergonomics,
                item.recoil_modifier * 100.0,
                format_rubles(item.price()),
                item.offer.label()
            ));
        }
        lines.push(String::new());
    }

    lines.push("## Optimization Details".to_string());
    lines.push(format!("- Status: {}", build.status));
    lines.push(format!("- Objective: {:.4}", build.objective_value));
    lines.push(format!("- Recoil Multiplier: {:.4}", stats.recoil_multiplier));
    lines.push(format!("- Cost: {}", build.cost_composition()));
    if !build.missing_items.is_empty() {
        lines.push(format!(
            "- Missing From Catalog: {}",
            build.missing_items.join(", ")
        ));
    }
    lines.push(String::new());

    lines.push("## Constraints Used".to_string());
    lines.extend(constraints.report_lines());

    lines.join("\n")
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// File name without extension, e.g. `M4A1_Assault_Rifle_build`.
pub fn export_file_stem(weapon_name: &str) -> String {
    let name: String = weapon_name
        .trim()
        .chars()
        .map(|ch| match ch {
            ' ' => '_',
            '/' | '\\' => '-',
            other => other,
        })
        .collect();
    format!("{name}_build")
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportPaths {
    pub json: PathBuf,
    pub markdown: PathBuf,
}

/// Writes `<stem>.json` and `<stem>.md` into `dir`.
///
/// Both files are filled as temporary siblings before either is renamed into
/// place. A failed write leaves neither export behind.
pub fn write_export(
    dir: &Path,
    export: &BuildExport,
    report: &str,
) -> Result<ExportPaths, ExportError> {
    if !dir.is_dir() {
        return Err(ExportError::MalformedTarget {
            path: dir.to_path_buf(),
            reason: "not an existing directory".to_string(),
        });
    }
    if export.weapon.name.trim().is_empty() {
        return Err(ExportError::MalformedTarget {
            path: dir.to_path_buf(),
            reason: "weapon name is empty".to_string(),
        });
    }

    let stem = export_file_stem(&export.weapon.name);
    let paths = ExportPaths {
        json: dir.join(format!("{stem}.json")),
        markdown: dir.join(format!("{stem}.md")),
    };
    for target in [&paths.json, &paths.markdown] {
        if target.is_dir() {
            return Err(ExportError::MalformedTarget {
                path: target.clone(),
                reason: "a directory is in the way".to_string(),
            });
        }
    }

    let json = export.to_json()?;
    let json_file = staged_file(dir, json.as_bytes())?;
    let markdown_file = staged_file(dir, report.as_bytes())?;

    persist_to(json_file, &paths.json)?;
    if let Err(err) = persist_to(markdown_file, &paths.markdown) {
        if let Err(cleanup) = fs::remove_file(&paths.json) {
            warn!(path = %paths.json.display(), error = %cleanup, "could not roll back export");
        }
        return Err(err);
    }
    info!(json = %paths.json.display(), markdown = %paths.markdown.display(), "wrote build export");
    Ok(paths)
}

fn staged_file(dir: &Path, contents: &[u8]) -> Result<NamedTempFile, ExportError> {
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;
    Ok(file)
}

fn persist_to(file: NamedTempFile, target: &Path) -> Result<(), ExportError> {
    file.persist(target)
        .map_err(|err| ExportError::MalformedTarget {
            path: target.to_path_buf(),
            reason: err.error.to_string(),
        })?;
    Ok(())
}

/// Re-imports a record written by [`write_export`].
pub fn read_export(path: &Path) -> Result<BuildExport, ExportError> {
    BuildExport::from_json(&fs::read_to_string(path)?)
}
