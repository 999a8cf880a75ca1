use serde::{Deserialize, Serialize};

use super::entities::{ItemId, PlayerContext, Weapon};
use super::filters::CascadingFilterState;
use super::optimizer::{WeightMix, WeightPreset};

/// Everything one user session carries between actions.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionState {
    pub player: PlayerContext,
    pub filters: CascadingFilterState,
    pub weights: WeightMix,
    /// Weapon last picked for optimization.
    pub selected_weapon: Option<ItemId>,
}

impl SessionState {
    pub fn select_categories(&mut self, categories: Vec<String>, weapons: &[Weapon]) {
        let filters = std::mem::take(&mut self.filters);
        self.filters = filters.set_categories(categories, weapons);
        self.drop_filtered_selection(weapons);
    }

    pub fn select_calibers(&mut self, calibers: Vec<String>, weapons: &[Weapon]) {
        let filters = std::mem::take(&mut self.filters);
        self.filters = filters.set_calibers(calibers, weapons);
        self.drop_filtered_selection(weapons);
    }

    /// Forget the picked weapon once the filters hide it.
    fn drop_filtered_selection(&mut self, weapons: &[Weapon]) {
        let still_visible = self.selected_weapon.as_deref().map(|id| {
            weapons
                .iter()
                .any(|weapon| weapon.id == id && self.filters.matches(weapon))
        });
        if still_visible == Some(false) {
            self.selected_weapon = None;
        }
    }

    pub fn apply_weight_preset(&mut self, preset: WeightPreset) {
        self.weights = preset.mix();
    }

    pub fn apply_persisted(&mut self, persisted: PersistedState) {
        self.player = persisted.player;
        self.filters = persisted.filters;
        self.weights = persisted.weights;
    }

    pub fn to_persisted(&self) -> PersistedState {
        PersistedState {
            player: self.player.clone(),
            filters: self.filters.clone(),
            weights: self.weights,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default)]
    pub player: PlayerContext,
    #[serde(default)]
    pub filters: CascadingFilterState,
    #[serde(default)]
    pub weights: WeightMix,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::NakedStats;

    fn weapon(id: &str, category: &str, caliber: &str) -> Weapon {
        Weapon {
            id: id.to_string(),
            name: id.to_uppercase(),
            short_name: None,
            category: Some(category.to_string()),
            caliber: Some(caliber.to_string()),
            base_price: 10_000,
            price_source: "market".to_string(),
            offers: Vec::new(),
            naked: NakedStats::default(),
            presets: Vec::new(),
            image: None,
        }
    }

    #[test]
    fn test_filter_edit_drops_hidden_weapon() {
        let weapons = vec![
            weapon("mp5", "SMG", "Caliber9x19PARA"),
            weapon("m4", "Assault rifle", "Caliber556x45NATO"),
        ];
        let mut session = SessionState {
            selected_weapon: Some("m4".to_string()),
            ..SessionState::default()
        };
        session.select_calibers(vec!["556x45NATO".to_string()], &weapons);
        assert_eq!(session.selected_weapon.as_deref(), Some("m4"));
        session.select_categories(vec!["SMG".to_string()], &weapons);
        assert!(session.filters.selected_calibers().is_empty());
        assert_eq!(session.selected_weapon, None);
    }

    #[test]
    fn test_persisted_round_trip_keeps_weights() {
        let mut session = SessionState::default();
        session.apply_weight_preset(WeightPreset::Price);
        session.player = session.player.clone().with_all_traders(1);

        let json = serde_json::to_string(&session.to_persisted()).unwrap();
        let mut restored = SessionState::default();
        restored.apply_persisted(serde_json::from_str(&json).unwrap());
        assert_eq!(restored.weights, WeightPreset::Price.mix());
        assert_eq!(restored.player.trader_level("prapor"), 1);
    }

    #[test]
    fn test_persisted_state_tolerates_missing_fields() {
        let persisted: PersistedState = serde_json::from_str("{}").unwrap();
        assert_eq!(persisted.weights, WeightMix::default());
        assert_eq!(persisted.player, PlayerContext::default());
    }
}
