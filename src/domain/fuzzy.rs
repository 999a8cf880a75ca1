use tracing::debug;

use super::entities::ItemId;
use super::lookup::ItemLookup;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ItemMatch {
    Found(ItemId),
    /// Recoverable: callers record the name as a missing requirement and move on.
    NotFound,
}

impl ItemMatch {
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Found(id) => Some(id),
            Self::NotFound => None,
        }
    }
}

/// Finds the catalog item a free-text name refers to.
///
/// A case-insensitive exact match wins outright. Otherwise the shortest name that
/// contains the query is taken, earliest in catalog order on ties.
pub fn resolve_item_id(query: &str, lookup: &ItemLookup) -> ItemMatch {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return ItemMatch::NotFound;
    }

    let mut best: Option<(usize, &str)> = None;
    for item in lookup.iter() {
        let name = item.name.to_lowercase();
        if name == needle {
            return ItemMatch::Found(item.id.clone());
        }
        if name.contains(&needle) {
            let length = item.name.chars().count();
            if best.map(|(shortest, _)| length < shortest).unwrap_or(true) {
                best = Some((length, item.id.as_str()));
            }
        }
    }

    match best {
        Some((_, id)) => ItemMatch::Found(id.to_string()),
        None => {
            debug!(query, "no catalog item matches");
            ItemMatch::NotFound
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::Item;

    fn item(id: &str, name: &str) -> Item {
        Item {
            id: id.to_string(),
            name: name.to_string(),
            short_name: None,
            category: None,
            weight: 0.0,
            ergonomics: 0.0,
            recoil_modifier: 0.0,
            offers: Vec::new(),
            icon_link: None,
        }
    }

    #[test]
    fn test_exact_match_beats_substring() {
        let lookup = ItemLookup::new(vec![item("hg", "MP5 Handguard"), item("mp5", "MP5")]);
        assert_eq!(
            resolve_item_id("mp5", &lookup),
            ItemMatch::Found("mp5".to_string())
        );
    }

    #[test]
    fn test_exact_match_beats_shorter_substring() {
        let lookup = ItemLookup::new(vec![
            item("short", "XPS3 sight"),
            item("exact", "PS3"),
            item("shorter", "PS3x"),
        ]);
        assert_eq!(
            resolve_item_id(" ps3 ", &lookup),
            ItemMatch::Found("exact".to_string())
        );
    }

    #[test]
    fn test_shortest_substring_wins() {
        let lookup = ItemLookup::new(vec![
            item("long", "Magpul MOE SL carbine stock"),
            item("short", "Magpul MOE stock"),
        ]);
        assert_eq!(
            resolve_item_id("moe", &lookup),
            ItemMatch::Found("short".to_string())
        );
    }

    #[test]
    fn test_substring_tie_keeps_catalog_order() {
        let lookup = ItemLookup::new(vec![item("first", "Grip A"), item("second", "Grip B")]);
        assert_eq!(
            resolve_item_id("grip", &lookup),
            ItemMatch::Found("first".to_string())
        );
    }

    #[test]
    fn test_no_candidate() {
        let lookup = ItemLookup::new(vec![item("a", "Silencer")]);
        assert_eq!(resolve_item_id("bipod", &lookup), ItemMatch::NotFound);
        assert_eq!(resolve_item_id("   ", &lookup), ItemMatch::NotFound);
        assert!(resolve_item_id("bipod", &lookup).id().is_none());
    }
}
