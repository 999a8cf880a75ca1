//! Gunsmith task definitions and how they become optimizer inputs.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::{fs, io};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::entities::{ItemId, PlayerContext, Rubles};
use super::fuzzy::{resolve_item_id, ItemMatch};
use super::lookup::{Catalog, CompatibilityMap};
use super::optimizer::{Constraints, ObjectiveWeights, Optimizer, OptimizerResult};

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("weapon `{0}` is not in the catalog")]
    WeaponNotFound(String),
    #[error("reading tasks from {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("parsing tasks from {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConstraints {
    pub max_price: Option<Rubles>,
    pub min_ergonomics: Option<f64>,
    pub max_recoil_v: Option<f64>,
    pub max_recoil_sum: Option<f64>,
    pub max_weight: Option<f64>,
    pub min_mag_capacity: Option<u32>,
    pub min_sighting_range: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GunsmithTask {
    pub task_name: String,
    /// Exact catalog name of the weapon.
    pub weapon_name: String,
    #[serde(default)]
    pub constraints: TaskConstraints,
    /// Free-text item names, resolved fuzzily against the catalog.
    #[serde(default)]
    pub required_items: Vec<String>,
    /// Every listed category must be present.
    #[serde(default)]
    pub required_categories: Vec<String>,
    /// At least one category from each group must be present.
    #[serde(default)]
    pub required_category_groups: Vec<Vec<String>>,
}

impl GunsmithTask {
    /// Requirement lines as shown next to the task.
    pub fn requirement_lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self.required_items.clone();
        lines.extend(
            self.required_categories
                .iter()
                .map(|category| format!("Category: {category}")),
        );
        lines.extend(
            self.required_category_groups
                .iter()
                .map(|group| format!("One of: {}", group.join(", "))),
        );
        lines
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TaskPlan {
    pub task_name: String,
    pub weapon_id: ItemId,
    pub constraints: Constraints,
    /// Required names no catalog item matched. Surfaced as warnings only.
    pub missing_items: Vec<String>,
}

/// Reads the task list. A missing file is an empty list.
pub fn load_tasks(path: &Path) -> Result<Vec<GunsmithTask>, TaskError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no task file, starting with an empty list");
            return Ok(Vec::new());
        }
        Err(source) => {
            return Err(TaskError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_str(&raw).map_err(|source| TaskError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolves a task against the catalog into constraints the optimizer accepts.
pub fn plan_task(task: &GunsmithTask, catalog: &Catalog) -> Result<TaskPlan, TaskError> {
    let weapon = catalog
        .weapon_by_name(&task.weapon_name)
        .ok_or_else(|| TaskError::WeaponNotFound(task.weapon_name.clone()))?;

    let mut include_items = BTreeSet::new();
    let mut missing_items = Vec::new();
    for name in &task.required_items {
        match resolve_item_id(name, &catalog.items) {
            ItemMatch::Found(id) => {
                include_items.insert(id);
            }
            ItemMatch::NotFound => {
                warn!(task = %task.task_name, item = %name, "required item not found");
                missing_items.push(name.clone());
            }
        }
    }

    let mut include_categories = task.required_category_groups.clone();
    include_categories.extend(
        task.required_categories
            .iter()
            .map(|category| vec![category.clone()]),
    );

    let limits = &task.constraints;
    let constraints = Constraints {
        max_price: limits.max_price,
        min_ergonomics: limits.min_ergonomics,
        max_recoil_v: limits.max_recoil_v,
        max_recoil_sum: limits.max_recoil_sum,
        min_mag_capacity: limits.min_mag_capacity,
        min_sighting_range: limits.min_sighting_range,
        max_weight: limits.max_weight,
        include_items,
        include_categories,
        ..Constraints::default()
    };

    Ok(TaskPlan {
        task_name: task.task_name.clone(),
        weapon_id: weapon.id.clone(),
        constraints,
        missing_items,
    })
}

/// Runs the cheapest-build search for a planned task.
pub fn optimize_task<O: Optimizer + ?Sized>(
    optimizer: &O,
    plan: &TaskPlan,
    catalog: &Catalog,
    compat: &CompatibilityMap,
    player: &PlayerContext,
) -> OptimizerResult {
    info!(task = %plan.task_name, weapon = %plan.weapon_id, "optimizing gunsmith task");
    optimizer.optimize(
        &plan.weapon_id,
        catalog,
        compat,
        &plan.constraints,
        ObjectiveWeights::price_only(),
        player,
    )
}
