use std::collections::{HashMap, HashSet};

use super::entities::{Item, ItemId, PlayerContext, Preset, Weapon};
use super::offers::{resolve_offer, ResolvedOffer};

/// Items keyed by id, iterated in the order the catalog listed them.
#[derive(Clone, Debug, Default)]
pub struct ItemLookup {
    items: Vec<Item>,
    index: HashMap<ItemId, usize>,
}

impl ItemLookup {
    /// Later duplicates of an id replace the earlier record but keep its position.
    pub fn new(items: impl IntoIterator<Item = Item>) -> Self {
        let mut lookup = Self::default();
        for item in items {
            lookup.insert(item);
        }
        lookup
    }

    fn insert(&mut self, item: Item) {
        match self.index.get(&item.id) {
            Some(&position) => self.items[position] = item,
            None => {
                self.index.insert(item.id.clone(), self.items.len());
                self.items.push(item);
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&Item> {
        self.index.get(id).map(|&position| &self.items[position])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Item> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn names_of<'a>(&self, ids: impl IntoIterator<Item = &'a ItemId>) -> Vec<String> {
        let mut names: Vec<String> = ids
            .into_iter()
            .filter_map(|id| self.get(id).map(|item| item.name.clone()))
            .collect();
        names.sort();
        names
    }
}

/// Everything loaded from the catalog for one session.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    pub weapons: Vec<Weapon>,
    pub items: ItemLookup,
}

/// Ids a weapon can reach through its slot tree, produced by the external map builder.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompatibilityMap {
    pub reachable_items: HashSet<ItemId>,
}

impl Catalog {
    pub fn weapon(&self, id: &str) -> Option<&Weapon> {
        self.weapons.iter().find(|weapon| weapon.id == id)
    }

    /// Weapons are matched on their exact name, the way task definitions spell them.
    pub fn weapon_by_name(&self, name: &str) -> Option<&Weapon> {
        self.weapons.iter().find(|weapon| weapon.name == name)
    }

    /// Weapon by id, falling back to exact name.
    pub fn find_weapon(&self, key: &str) -> Option<&Weapon> {
        self.weapon(key).or_else(|| self.weapon_by_name(key))
    }

    /// Presets the player can buy, priced at their best available offer.
    pub fn purchasable_presets(&self, weapon: &Weapon, player: &PlayerContext) -> Vec<Preset> {
        weapon
            .presets
            .iter()
            .filter_map(|preset| match resolve_offer(&preset.offers, player) {
                ResolvedOffer::Available { label, price } => Some(Preset {
                    price,
                    price_source: label,
                    ..preset.clone()
                }),
                ResolvedOffer::Unavailable => None,
            })
            .collect()
    }

    /// Items reachable from a weapon, in catalog order.
    pub fn compatible_items<'a>(&'a self, compat: &'a CompatibilityMap) -> Vec<&'a Item> {
        self.items
            .iter()
            .filter(|item| compat.reachable_items.contains(&item.id))
            .collect()
    }

    /// Sorted, de-duplicated categories of the items reachable from a weapon.
    pub fn compatible_categories(&self, compat: &CompatibilityMap) -> Vec<String> {
        let mut categories: Vec<String> = self
            .compatible_items(compat)
            .into_iter()
            .filter_map(|item| item.category.clone())
            .collect();
        categories.sort();
        categories.dedup();
        categories
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{NakedStats, Offer};

    fn item(id: &str, name: &str, category: &str) -> Item {
        Item {
            id: id.to_string(),
            name: name.to_string(),
            short_name: None,
            category: Some(category.to_string()),
            weight: 0.1,
            ergonomics: 0.0,
            recoil_modifier: 0.0,
            offers: Vec::new(),
            icon_link: None,
        }
    }

    #[test]
    fn test_lookup_keeps_catalog_order() {
        let lookup = ItemLookup::new(vec![
            item("b", "Bravo", "Grip"),
            item("a", "Alpha", "Stock"),
            item("b", "Bravo v2", "Grip"),
        ]);
        let names: Vec<_> = lookup.iter().map(|item| item.name.as_str()).collect();
        assert_eq!(names, vec!["Bravo v2", "Alpha"]);
        assert_eq!(lookup.len(), 2);
    }

    #[test]
    fn test_purchasable_presets_use_best_offer() {
        let weapon = Weapon {
            id: "w".to_string(),
            name: "Gun".to_string(),
            short_name: None,
            category: None,
            caliber: None,
            base_price: 10_000,
            price_source: "market".to_string(),
            offers: Vec::new(),
            naked: NakedStats::default(),
            presets: vec![
                Preset {
                    id: "p1".to_string(),
                    name: "Locked".to_string(),
                    price: 0,
                    price_source: String::new(),
                    items: Vec::new(),
                    image: None,
                    offers: vec![Offer::trader("Prapor", Some(4), 40_000)],
                },
                Preset {
                    id: "p2".to_string(),
                    name: "Open".to_string(),
                    price: 0,
                    price_source: String::new(),
                    items: Vec::new(),
                    image: None,
                    offers: vec![Offer::trader("Prapor", Some(1), 30_000)],
                },
            ],
            image: None,
        };
        let catalog = Catalog {
            weapons: vec![weapon.clone()],
            items: ItemLookup::default(),
        };
        let player = PlayerContext::default().with_all_traders(1);
        let presets = catalog.purchasable_presets(&weapon, &player);
        assert_eq!(presets.len(), 1);
        assert_eq!(presets[0].id, "p2");
        assert_eq!(presets[0].price, 30_000);
        assert_eq!(presets[0].price_source, "Prapor LL1");
    }

    #[test]
    fn test_compatible_categories() {
        let catalog = Catalog {
            weapons: Vec::new(),
            items: ItemLookup::new(vec![
                item("a", "A", "Stock"),
                item("b", "B", "Grip"),
                item("c", "C", "Stock"),
                item("d", "D", "Muzzle"),
            ]),
        };
        let compat = CompatibilityMap {
            reachable_items: ["a", "b", "c"].iter().map(|id| id.to_string()).collect(),
        };
        assert_eq!(catalog.compatible_categories(&compat), vec!["Grip", "Stock"]);
        assert_eq!(catalog.compatible_items(&compat).len(), 3);
    }
}
