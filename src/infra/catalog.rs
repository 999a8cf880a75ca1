//! Catalog snapshot decoding.
//!
//! - Reads the JSON dump of the upstream item API (`guns` and `mods` arrays).
//! - Converts the wire DTOs into the immutable domain records the advisor works on.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::entities::{
    Item, NakedStats, Offer, OfferSource, Preset, Rubles, Weapon, FLEA_UNLOCK_LEVEL,
};
use crate::domain::lookup::{Catalog, ItemLookup};

/// Base price given to weapons nobody sells; far above the unpriced threshold.
pub const UNSOLD_WEAPON_PRICE: Rubles = 999_999_999;
pub const UNSOLD_PRICE_SOURCE: &str = "not_available";
const MARKET_PRICE_SOURCE: &str = "market";
const FLEA_SOURCE: &str = "fleaMarket";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("reading catalog snapshot {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("decoding catalog snapshot {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Undecorated catalog as the upstream API returns it.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawCatalog {
    #[serde(default)]
    pub guns: Vec<GunDto>,
    #[serde(default)]
    pub mods: Vec<ModDto>,
}

/// Anything that can hand over a full catalog.
pub trait CatalogSource {
    fn fetch_catalog(&self) -> impl Future<Output = Result<RawCatalog, CatalogError>> + Send;
}

/// A catalog dump on disk. Extra top-level keys (fetch time, counts) are ignored.
#[derive(Clone, Debug)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CatalogSource for SnapshotFile {
    fn fetch_catalog(&self) -> impl Future<Output = Result<RawCatalog, CatalogError>> + Send {
        let path = self.path.clone();
        async move {
            let raw = tokio::fs::read_to_string(&path)
                .await
                .map_err(|source| CatalogError::Io {
                    path: path.clone(),
                    source,
                })?;
            let catalog: RawCatalog =
                serde_json::from_str(&raw).map_err(|source| CatalogError::Parse {
                    path: path.clone(),
                    source,
                })?;
            info!(
                path = %path.display(),
                guns = catalog.guns.len(),
                mods = catalog.mods.len(),
                "loaded catalog snapshot"
            );
            Ok(catalog)
        }
    }
}

/// Converts a raw catalog into weapons plus the mod lookup.
pub fn build_item_lookup(raw: RawCatalog) -> Catalog {
    let weapons: Vec<Weapon> = raw.guns.into_iter().map(Weapon::from).collect();
    let items = ItemLookup::new(raw.mods.into_iter().map(Item::from));
    debug!(weapons = weapons.len(), items = items.len(), "built item lookup");
    Catalog { weapons, items }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VendorDto {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    normalized_name: Option<String>,
    #[serde(default)]
    min_trader_level: Option<u8>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BuyForDto {
    #[serde(default, rename = "priceRUB")]
    price_rub: Option<u64>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    vendor: Option<VendorDto>,
}

#[derive(Clone, Debug, Deserialize)]
struct CategoryDto {
    name: String,
}

#[derive(Clone, Debug, Deserialize)]
struct ContainedItemDto {
    item: ItemRefDto,
}

#[derive(Clone, Debug, Deserialize)]
struct ItemRefDto {
    id: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PresetDto {
    id: String,
    name: String,
    #[serde(default)]
    contains_items: Vec<ContainedItemDto>,
    #[serde(default)]
    buy_for: Vec<BuyForDto>,
    #[serde(default)]
    image_link: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WeaponPropertiesDto {
    #[serde(default)]
    caliber: Option<String>,
    #[serde(default)]
    ergonomics: Option<f64>,
    #[serde(default)]
    recoil_vertical: Option<f64>,
    #[serde(default)]
    recoil_horizontal: Option<f64>,
    #[serde(default)]
    presets: Vec<PresetDto>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModPropertiesDto {
    #[serde(default)]
    ergonomics: Option<f64>,
    #[serde(default)]
    recoil_modifier: Option<f64>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GunDto {
    id: String,
    name: String,
    #[serde(default)]
    short_name: Option<String>,
    #[serde(default)]
    weight: Option<f64>,
    #[serde(default)]
    buy_for: Vec<BuyForDto>,
    #[serde(default)]
    bsg_category: Option<CategoryDto>,
    #[serde(default)]
    properties: Option<WeaponPropertiesDto>,
    #[serde(default)]
    image512px_link: Option<String>,
    #[serde(default)]
    image_link: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModDto {
    id: String,
    name: String,
    #[serde(default)]
    short_name: Option<String>,
    #[serde(default)]
    weight: Option<f64>,
    #[serde(default)]
    ergonomics_modifier: Option<f64>,
    #[serde(default)]
    recoil_modifier: Option<f64>,
    #[serde(default)]
    buy_for: Vec<BuyForDto>,
    #[serde(default)]
    min_level_for_flea: Option<u32>,
    #[serde(default)]
    bsg_category: Option<CategoryDto>,
    #[serde(default)]
    properties: Option<ModPropertiesDto>,
    #[serde(default)]
    icon_link: Option<String>,
}

fn convert_offers(buy_for: Vec<BuyForDto>, flea_level: Option<u32>) -> Vec<Offer> {
    buy_for
        .into_iter()
        .filter_map(|dto| convert_offer(dto, flea_level))
        .collect()
}

/// Offers without a rouble price cannot be compared and are dropped.
fn convert_offer(dto: BuyForDto, flea_level: Option<u32>) -> Option<Offer> {
    let price = dto.price_rub?;
    let vendor = dto.vendor;
    let source = dto.source.unwrap_or_default();
    if source == FLEA_SOURCE {
        let min_player_level = flea_level
            .filter(|level| *level > 0)
            .unwrap_or(FLEA_UNLOCK_LEVEL);
        return Some(Offer {
            source: OfferSource::Flea { min_player_level },
            price,
        });
    }

    let vendor_name = vendor
        .as_ref()
        .and_then(|vendor| vendor.name.clone())
        .unwrap_or_else(|| source.clone());
    let vendor_id = vendor
        .as_ref()
        .and_then(|vendor| vendor.normalized_name.clone())
        .unwrap_or_else(|| source.to_lowercase());
    Some(Offer {
        source: OfferSource::Trader {
            vendor_id,
            vendor_name,
            min_level: vendor.and_then(|vendor| vendor.min_trader_level),
        },
        price,
    })
}

fn cheapest(offers: &[Offer]) -> Option<Rubles> {
    offers.iter().map(|offer| offer.price).min()
}

impl From<PresetDto> for Preset {
    fn from(dto: PresetDto) -> Self {
        let offers = convert_offers(dto.buy_for, None);
        let (price, price_source) = match cheapest(&offers) {
            Some(price) => (price, MARKET_PRICE_SOURCE.to_string()),
            None => (0, UNSOLD_PRICE_SOURCE.to_string()),
        };
        Self {
            id: dto.id,
            name: dto.name,
            price,
            price_source,
            items: dto
                .contains_items
                .into_iter()
                .map(|contained| contained.item.id)
                .collect(),
            image: dto.image_link,
            offers,
        }
    }
}

impl From<GunDto> for Weapon {
    fn from(dto: GunDto) -> Self {
        let properties = dto.properties.unwrap_or_default();
        let offers = convert_offers(dto.buy_for, None);
        let (base_price, price_source) = match cheapest(&offers) {
            Some(price) => (price, MARKET_PRICE_SOURCE.to_string()),
            None => (UNSOLD_WEAPON_PRICE, UNSOLD_PRICE_SOURCE.to_string()),
        };
        Self {
            id: dto.id,
            name: dto.name,
            short_name: dto.short_name,
            category: dto.bsg_category.map(|category| category.name),
            caliber: properties.caliber,
            base_price,
            price_source,
            offers,
            naked: NakedStats {
                ergonomics: properties.ergonomics.unwrap_or(0.0),
                recoil_vertical: properties.recoil_vertical.unwrap_or(0.0),
                recoil_horizontal: properties.recoil_horizontal.unwrap_or(0.0),
                weight: dto.weight.unwrap_or(0.0),
            },
            presets: properties.presets.into_iter().map(Preset::from).collect(),
            image: dto.image512px_link.or(dto.image_link),
        }
    }
}

impl From<ModDto> for Item {
    fn from(dto: ModDto) -> Self {
        let properties = dto.properties.unwrap_or_default();
        Self {
            id: dto.id,
            name: dto.name,
            short_name: dto.short_name,
            category: dto.bsg_category.map(|category| category.name),
            weight: dto.weight.unwrap_or(0.0),
            ergonomics: properties
                .ergonomics
                .or(dto.ergonomics_modifier)
                .unwrap_or(0.0),
            recoil_modifier: properties
                .recoil_modifier
                .or(dto.recoil_modifier)
                .unwrap_or(0.0),
            offers: convert_offers(dto.buy_for, dto.min_level_for_flea),
            icon_link: dto.icon_link,
        }
    }
}
