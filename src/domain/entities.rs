use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Integer currency units (roubles).
pub type Rubles = u64;

/// Identifier for items, weapons and presets as issued by the catalog API.
pub type ItemId = String;

/// Catalog prices at or above this value are placeholders for "not sold anywhere".
pub const UNPRICED_SENTINEL: Rubles = 100_000_000;

/// Character level at which the flea market opens when an offer does not say otherwise.
pub const FLEA_UNLOCK_LEVEL: u32 = 15;

/// Highest character level the game allows.
pub const MAX_PLAYER_LEVEL: u32 = 79;

pub const MAX_LOYALTY_LEVEL: u8 = 4;

/// Traders that sell weapon mods, as (normalized id, display name).
pub const MOD_TRADERS: [(&str, &str); 5] = [
    ("prapor", "Prapor"),
    ("skier", "Skier"),
    ("peacekeeper", "Peacekeeper"),
    ("mechanic", "Mechanic"),
    ("jaeger", "Jaeger"),
];

/// Returns true when a catalog price is the "unpriced" placeholder rather than a real price.
pub fn is_unpriced(price: Rubles) -> bool {
    price >= UNPRICED_SENTINEL
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OfferSource {
    Trader {
        vendor_id: String,
        vendor_name: String,
        /// Loyalty level required to buy, `None` when the trader has no requirement.
        min_level: Option<u8>,
    },
    Flea {
        min_player_level: u32,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub source: OfferSource,
    pub price: Rubles,
}

impl Offer {
    pub fn trader(vendor_name: &str, min_level: Option<u8>, price: Rubles) -> Self {
        Self {
            source: OfferSource::Trader {
                vendor_id: vendor_name.to_lowercase(),
                vendor_name: vendor_name.to_string(),
                min_level,
            },
            price,
        }
    }

    pub fn flea(min_player_level: u32, price: Rubles) -> Self {
        Self {
            source: OfferSource::Flea { min_player_level },
            price,
        }
    }

    /// Whether the player can purchase this offer right now.
    pub fn is_available(&self, player: &PlayerContext) -> bool {
        match &self.source {
            OfferSource::Trader {
                vendor_id,
                min_level,
                ..
            } => min_level
                .map(|required| required <= player.trader_level(vendor_id))
                .unwrap_or(true),
            OfferSource::Flea { min_player_level } => {
                player.flea_enabled && *min_player_level <= player.level
            }
        }
    }
}

/// A weapon mod (or any attachable item) from the catalog.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub weight: f64,
    #[serde(default)]
    pub ergonomics: f64,
    /// Fractional recoil change, -0.05 is five percent less recoil.
    #[serde(default)]
    pub recoil_modifier: f64,
    #[serde(default)]
    pub offers: Vec<Offer>,
    #[serde(default)]
    pub icon_link: Option<String>,
}

/// Baseline stats of a weapon with nothing attached.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NakedStats {
    pub ergonomics: f64,
    pub recoil_vertical: f64,
    pub recoil_horizontal: f64,
    pub weight: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub id: ItemId,
    pub name: String,
    pub price: Rubles,
    pub price_source: String,
    /// Member item ids in catalog order.
    #[serde(default)]
    pub items: Vec<ItemId>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub offers: Vec<Offer>,
}

impl Preset {
    pub fn contains(&self, item_id: &str) -> bool {
        self.items.iter().any(|id| id == item_id)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Weapon {
    pub id: ItemId,
    pub name: String,
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    /// Raw caliber identifier, e.g. `Caliber556x45NATO`.
    #[serde(default)]
    pub caliber: Option<String>,
    pub base_price: Rubles,
    #[serde(default = "default_price_source")]
    pub price_source: String,
    #[serde(default)]
    pub offers: Vec<Offer>,
    pub naked: NakedStats,
    /// Every preset the game defines for this weapon, purchasable or not.
    #[serde(default)]
    pub presets: Vec<Preset>,
    #[serde(default)]
    pub image: Option<String>,
}

fn default_price_source() -> String {
    "market".to_string()
}

impl Weapon {
    /// Caliber without the `Caliber` prefix the API puts on every identifier.
    pub fn caliber_display(&self) -> Option<String> {
        self.caliber
            .as_deref()
            .map(caliber_display)
            .filter(|caliber| !caliber.is_empty())
    }

    pub fn preset(&self, preset_id: &str) -> Option<&Preset> {
        self.presets.iter().find(|preset| preset.id == preset_id)
    }
}

pub fn caliber_display(raw: &str) -> String {
    raw.replace("Caliber", "").trim().to_string()
}

/// What the player can buy: character level, trader loyalty, flea access.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerContext {
    pub level: u32,
    /// Loyalty level per normalized trader id. Missing traders count as maxed.
    #[serde(deserialize_with = "normalized_trader_levels")]
    pub trader_levels: BTreeMap<String, u8>,
    pub flea_enabled: bool,
}

impl Default for PlayerContext {
    fn default() -> Self {
        Self {
            level: MAX_PLAYER_LEVEL,
            trader_levels: MOD_TRADERS
                .iter()
                .map(|(id, _)| (id.to_string(), MAX_LOYALTY_LEVEL))
                .collect(),
            flea_enabled: true,
        }
    }
}

fn normalized_trader_levels<'de, D>(deserializer: D) -> Result<BTreeMap<String, u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, u8>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(id, level)| (id.trim().to_lowercase(), level))
        .collect())
}

impl PlayerContext {
    pub fn trader_level(&self, vendor_id: &str) -> u8 {
        self.trader_levels
            .get(&vendor_id.to_lowercase())
            .copied()
            .unwrap_or(MAX_LOYALTY_LEVEL)
    }

    /// Sets every mod trader to the same loyalty level.
    pub fn with_all_traders(mut self, level: u8) -> Self {
        let level = level.clamp(1, MAX_LOYALTY_LEVEL);
        for (id, _) in MOD_TRADERS {
            self.trader_levels.insert(id.to_string(), level);
        }
        self
    }

    /// The flea toggle only means something once the player reaches the unlock level.
    pub fn flea_access(&self) -> bool {
        self.flea_enabled && self.level >= FLEA_UNLOCK_LEVEL
    }

    /// Short notes on what keeps this player from buying everything.
    pub fn limitations(&self) -> Vec<String> {
        let mut notes = Vec::new();
        if self.level < MAX_PLAYER_LEVEL {
            notes.push(format!("Level {}", self.level));
        }
        let below_max = MOD_TRADERS
            .iter()
            .filter(|(id, _)| self.trader_level(id) < MAX_LOYALTY_LEVEL)
            .count();
        if below_max > 0 {
            notes.push(format!("{below_max} trader(s) below LL4"));
        }
        if !self.flea_access() {
            notes.push("No flea".to_string());
        }
        notes
    }
}

/// Formats roubles with thousands separators, e.g. `₽1,234,567`.
pub fn format_rubles(value: Rubles) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("₽{grouped}")
}

/// Capitalizes the first letter of a trader id for display.
pub fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
