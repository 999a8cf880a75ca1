//! Pricing, composition and filtering logic for weapon builds.

pub mod app_state;
pub mod composer;
pub mod entities;
pub mod export;
pub mod filters;
pub mod fuzzy;
pub mod lookup;
pub mod offers;
pub mod optimizer;
pub mod tasks;

pub use app_state::{PersistedState, SessionState};
pub use composer::{compose, BuildBase, BuildItem, BuildKind, ComposeError, ComposedBuild};
pub use entities::{
    Item, ItemId, NakedStats, Offer, OfferSource, PlayerContext, Preset, Rubles, Weapon,
};
pub use export::{
    format_build, format_build_at, write_export, BuildExport, ConstraintsUsed, ExportError,
};
pub use filters::{CascadingFilterState, Facet, FacetOption};
pub use fuzzy::{resolve_item_id, ItemMatch};
pub use lookup::{Catalog, CompatibilityMap, ItemLookup};
pub use offers::{resolve_offer, ResolvedOffer};
pub use optimizer::{
    Constraints, FrontierDimension, ObjectiveWeights, OptimizationStatus, Optimizer,
    OptimizerResult, ParetoPoint, WeightMix, WeightPreset,
};
pub use tasks::{load_tasks, plan_task, GunsmithTask, TaskError, TaskPlan};
