//! Command-line front end over the advisor library.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use gunsmith_advisor::config::AdvisorConfig;
use gunsmith_advisor::domain::entities::{format_rubles, PlayerContext, MAX_LOYALTY_LEVEL};
use gunsmith_advisor::domain::filters::Facet;
use gunsmith_advisor::domain::{
    compose, format_build, load_tasks, plan_task, resolve_item_id, resolve_offer, write_export,
    Catalog, Constraints, ConstraintsUsed, ItemMatch, OptimizerResult, SessionState,
};
use gunsmith_advisor::infra::{build_item_lookup, CatalogSource, SnapshotFile};
use gunsmith_advisor::util::persistence::{load_persisted_state, save_persisted_state};

#[derive(Parser, Debug)]
#[command(name = "gunsmith")]
#[command(about = "Price, compose and export weapon mod builds")]
#[command(version)]
pub struct Cli {
    /// Config file (TOML)
    #[arg(short, long, env = "GUNSMITH_CONFIG", default_value = "gunsmith.toml")]
    pub config: PathBuf,

    /// Catalog snapshot, overrides the configured path
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// Log filter, overrides the configured one
    #[arg(long)]
    pub log: Option<String>,

    /// Player level
    #[arg(long)]
    pub level: Option<u32>,

    /// Set every trader to this loyalty level
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=4))]
    pub all_traders: Option<u8>,

    /// Single trader loyalty, e.g. `prapor=2` (repeatable)
    #[arg(long = "trader", value_parser = parse_trader_level)]
    pub traders: Vec<(String, u8)>,

    /// Pretend the flea market is locked
    #[arg(long)]
    pub no_flea: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compose an optimizer result into a priced build
    Compose {
        /// Weapon id or exact name
        weapon: String,
        /// Optimizer result (JSON)
        result: PathBuf,
        /// Constraints the optimizer ran with (JSON)
        #[arg(long)]
        constraints: Option<PathBuf>,
        /// Write JSON and Markdown exports
        #[arg(long)]
        export: bool,
        /// Export directory, overrides the configured one
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
    /// Show the cheapest offer the player can use for an item
    Offer {
        /// Item name (fuzzy)
        item: String,
    },
    /// Resolve a free-text item name to a catalog id
    Resolve { query: String },
    /// Narrow the weapon list by category and caliber
    Filter {
        /// Categories to select (repeatable)
        #[arg(long = "category")]
        categories: Vec<String>,
        /// Calibers to select (repeatable)
        #[arg(long = "caliber")]
        calibers: Vec<String>,
        /// Start from an empty selection instead of the saved one
        #[arg(long)]
        reset: bool,
    },
    /// List gunsmith tasks or plan one
    Task {
        /// Task name; lists every task when omitted
        name: Option<String>,
        /// Tasks file, overrides the configured path
        #[arg(long)]
        tasks: Option<PathBuf>,
    },
}

fn parse_trader_level(raw: &str) -> Result<(String, u8), String> {
    let (name, level) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected TRADER=LEVEL, got `{raw}`"))?;
    let level: u8 = level
        .trim()
        .parse()
        .map_err(|_| format!("invalid loyalty level `{level}`"))?;
    if !(1..=MAX_LOYALTY_LEVEL).contains(&level) {
        return Err(format!("loyalty level must be 1-{MAX_LOYALTY_LEVEL}"));
    }
    Ok((name.trim().to_lowercase(), level))
}

impl Cli {
    /// Configured player with the command-line overrides on top.
    pub fn player(&self, base: &PlayerContext) -> PlayerContext {
        let mut player = base.clone();
        if let Some(level) = self.level {
            player.level = level;
        }
        if let Some(level) = self.all_traders {
            player = player.with_all_traders(level);
        }
        for (trader, level) in &self.traders {
            player.trader_levels.insert(trader.clone(), *level);
        }
        if self.no_flea {
            player.flea_enabled = false;
        }
        player
    }
}

pub async fn run(cli: Cli, config: AdvisorConfig) -> Result<()> {
    let player = cli.player(&config.player);
    let limitations = player.limitations();
    if !limitations.is_empty() {
        info!(limits = %limitations.join(", "), "player limitations");
    }

    let catalog_path = cli.catalog.clone().unwrap_or(config.paths.catalog.clone());
    let catalog = load_catalog(&catalog_path).await?;

    match cli.command {
        Commands::Compose {
            weapon,
            result,
            constraints,
            export,
            out_dir,
        } => {
            let out_dir = out_dir.unwrap_or(config.paths.export_dir);
            compose_command(
                &catalog,
                &player,
                &weapon,
                &result,
                constraints.as_deref(),
                export.then_some(out_dir.as_path()),
            )
        }
        Commands::Offer { item } => offer_command(&catalog, &player, &item),
        Commands::Resolve { query } => resolve_command(&catalog, &query),
        Commands::Filter {
            categories,
            calibers,
            reset,
        } => filter_command(&catalog, player, categories, calibers, reset),
        Commands::Task { name, tasks } => {
            let tasks_path = tasks.unwrap_or(config.paths.tasks);
            task_command(&catalog, &tasks_path, name.as_deref())
        }
    }
}

async fn load_catalog(path: &Path) -> Result<Catalog> {
    let raw = SnapshotFile::new(path)
        .fetch_catalog()
        .await
        .context("Failed to load catalog snapshot")?;
    Ok(build_item_lookup(raw))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

fn compose_command(
    catalog: &Catalog,
    player: &PlayerContext,
    weapon_key: &str,
    result_path: &Path,
    constraints_path: Option<&Path>,
    export_dir: Option<&Path>,
) -> Result<()> {
    let weapon = catalog
        .find_weapon(weapon_key)
        .ok_or_else(|| anyhow!("weapon `{weapon_key}` is not in the catalog"))?;
    let result: OptimizerResult = read_json(result_path)?;
    let constraints: Constraints = match constraints_path {
        Some(path) => read_json(path)?,
        None => Constraints::default(),
    };

    let presets = catalog.purchasable_presets(weapon, player);
    let build = compose(&result, weapon, &presets, player, &catalog.items)?;
    for missing in &build.missing_items {
        warn!(item_id = %missing, "selected item is not in the catalog");
    }

    let used = ConstraintsUsed::new(&constraints, player, &catalog.items);
    let (export, report) = format_build(&build, &used)?;
    match export_dir {
        Some(dir) => {
            let paths = write_export(dir, &export, &report)
                .with_context(|| format!("Failed to export into {}", dir.display()))?;
            println!("{}", paths.json.display());
            println!("{}", paths.markdown.display());
        }
        None => println!("{report}"),
    }
    Ok(())
}

fn offer_command(catalog: &Catalog, player: &PlayerContext, query: &str) -> Result<()> {
    let id = match resolve_item_id(query, &catalog.items) {
        ItemMatch::Found(id) => id,
        ItemMatch::NotFound => bail!("no item matches `{query}`"),
    };
    let item = catalog
        .items
        .get(&id)
        .ok_or_else(|| anyhow!("item `{id}` vanished from the lookup"))?;
    let offer = resolve_offer(&item.offers, player);
    println!(
        "{}: {} ({})",
        item.name,
        format_rubles(offer.price()),
        offer.label()
    );
    Ok(())
}

fn resolve_command(catalog: &Catalog, query: &str) -> Result<()> {
    match resolve_item_id(query, &catalog.items) {
        ItemMatch::Found(id) => {
            let name = catalog
                .items
                .get(&id)
                .map(|item| item.name.as_str())
                .unwrap_or_default();
            println!("{id}\t{name}");
        }
        ItemMatch::NotFound => println!("Not found: {query}"),
    }
    Ok(())
}

fn filter_command(
    catalog: &Catalog,
    player: PlayerContext,
    categories: Vec<String>,
    calibers: Vec<String>,
    reset: bool,
) -> Result<()> {
    let mut session = SessionState::default();
    if !reset {
        if let Some(saved) = load_persisted_state() {
            session.apply_persisted(saved);
        }
    }
    session.player = player;

    let weapons = &catalog.weapons;
    if !categories.is_empty() || reset {
        session.select_categories(categories, weapons);
    }
    if !calibers.is_empty() || reset {
        session.select_calibers(calibers, weapons);
    }

    for facet in [Facet::Category, Facet::Caliber] {
        let options = session.filters.options(facet, None, weapons);
        let rendered: Vec<String> = options.iter().map(ToString::to_string).collect();
        println!("{facet:?}: {}", rendered.join(", "));
    }
    for weapon in session.filters.filtered(weapons) {
        println!("  {}", weapon.name);
    }
    println!("{}", session.filters.summary(weapons));

    if let Err(err) = save_persisted_state(&session.to_persisted()) {
        warn!(error = %err, "could not save session");
    }
    Ok(())
}

fn task_command(catalog: &Catalog, tasks_path: &Path, name: Option<&str>) -> Result<()> {
    let tasks = load_tasks(tasks_path)?;
    let Some(name) = name else {
        if tasks.is_empty() {
            println!("No tasks in {}", tasks_path.display());
        }
        for task in &tasks {
            println!("{} ({})", task.task_name, task.weapon_name);
        }
        return Ok(());
    };

    let task = tasks
        .iter()
        .find(|task| task.task_name == name)
        .ok_or_else(|| anyhow!("no task named `{name}`"))?;
    let plan = plan_task(task, catalog)?;
    for missing in &plan.missing_items {
        warn!(item = %missing, "required item not found");
    }

    println!("{} -> {}", plan.task_name, plan.weapon_id);
    for line in task.requirement_lines() {
        println!("  - {line}");
    }
    for limit in plan.constraints.active_limits() {
        println!("  * {limit}");
    }
    println!(
        "{}",
        serde_json::to_string_pretty(&plan.constraints).context("Failed to render constraints")?
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trader_level() {
        assert_eq!(
            parse_trader_level("Prapor=2"),
            Ok(("prapor".to_string(), 2))
        );
        assert!(parse_trader_level("prapor").is_err());
        assert!(parse_trader_level("prapor=5").is_err());
    }

    #[test]
    fn test_player_overrides() {
        let cli = Cli::parse_from([
            "gunsmith",
            "--level",
            "12",
            "--all-traders",
            "1",
            "--trader",
            "mechanic=3",
            "--no-flea",
            "resolve",
            "PS3",
        ]);
        let player = cli.player(&PlayerContext::default());
        assert_eq!(player.level, 12);
        assert_eq!(player.trader_level("prapor"), 1);
        assert_eq!(player.trader_level("mechanic"), 3);
        assert!(!player.flea_enabled);
    }
}
