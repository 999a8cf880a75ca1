//! Build advisor for weapon modding: cheapest offers per player, build costing,
//! fuzzy item lookup, cascading weapon filters and build exports.

pub mod config;
pub mod domain;
pub mod infra;
pub mod util;
