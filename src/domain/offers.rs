//! Picks the cheapest purchase source a player can actually use.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::entities::{Offer, OfferSource, PlayerContext, Rubles};

pub const UNAVAILABLE_LABEL: &str = "Unavailable";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResolvedOffer {
    Available { label: String, price: Rubles },
    /// No offer passes the player's constraints. Priced as zero so callers keep going.
    Unavailable,
}

impl ResolvedOffer {
    pub fn price(&self) -> Rubles {
        match self {
            Self::Available { price, .. } => *price,
            Self::Unavailable => 0,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Available { label, .. } => label,
            Self::Unavailable => UNAVAILABLE_LABEL,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available { .. })
    }
}

/// Returns the cheapest offer available to `player`.
///
/// Equal prices go to the offer listed first, so the result only depends on input order.
pub fn resolve_offer(offers: &[Offer], player: &PlayerContext) -> ResolvedOffer {
    let best = offers
        .iter()
        .filter(|offer| offer.is_available(player))
        .min_by_key(|offer| offer.price);

    match best {
        Some(offer) => ResolvedOffer::Available {
            label: offer_label(offer),
            price: offer.price,
        },
        None => {
            debug!(offers = offers.len(), "no offer available to player");
            ResolvedOffer::Unavailable
        }
    }
}

pub fn offer_label(offer: &Offer) -> String {
    match &offer.source {
        OfferSource::Flea { min_player_level } => format!("Flea Lv{min_player_level}"),
        OfferSource::Trader {
            vendor_name,
            min_level: Some(level),
            ..
        } if *level > 0 => format!("{vendor_name} LL{level}"),
        OfferSource::Trader { vendor_name, .. } => vendor_name.clone(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn player(level: u32, flea: bool, prapor: u8) -> PlayerContext {
        let mut trader_levels = BTreeMap::new();
        trader_levels.insert("prapor".to_string(), prapor);
        PlayerContext {
            level,
            trader_levels,
            flea_enabled: flea,
        }
    }

    #[test]
    fn test_locked_flea_falls_back_to_trader() {
        let offers = vec![
            Offer::flea(15, 10_000),
            Offer::trader("Prapor", Some(2), 15_000),
        ];
        let resolved = resolve_offer(&offers, &player(10, true, 4));
        assert_eq!(
            resolved,
            ResolvedOffer::Available {
                label: "Prapor LL2".to_string(),
                price: 15_000,
            }
        );
    }

    #[test]
    fn test_cheapest_available_offer_wins() {
        let offers = vec![
            Offer::trader("Prapor", Some(1), 15_000),
            Offer::flea(15, 10_000),
        ];
        let resolved = resolve_offer(&offers, &player(20, true, 4));
        assert_eq!(resolved.label(), "Flea Lv15");
        assert_eq!(resolved.price(), 10_000);
    }

    #[test]
    fn test_equal_prices_keep_input_order() {
        let offers = vec![
            Offer::trader("Skier", Some(1), 5_000),
            Offer::trader("Prapor", Some(1), 5_000),
        ];
        let resolved = resolve_offer(&offers, &player(20, true, 4));
        assert_eq!(resolved.label(), "Skier LL1");
    }

    #[test]
    fn test_nothing_available_degrades() {
        let offers = vec![Offer::trader("Prapor", Some(4), 15_000)];
        let resolved = resolve_offer(&offers, &player(40, false, 2));
        assert_eq!(resolved, ResolvedOffer::Unavailable);
        assert_eq!(resolved.price(), 0);
        assert_eq!(resolved.label(), "Unavailable");
    }

    #[test]
    fn test_empty_offer_list_is_unavailable() {
        assert_eq!(
            resolve_offer(&[], &PlayerContext::default()),
            ResolvedOffer::Unavailable
        );
    }

    #[test]
    fn test_trader_without_level_uses_plain_name() {
        let offers = vec![Offer::trader("Fence", None, 800)];
        let resolved = resolve_offer(&offers, &player(1, false, 1));
        assert_eq!(resolved.label(), "Fence");
    }

    #[test]
    fn test_zero_loyalty_requirement_uses_plain_name() {
        let offers = vec![Offer::trader("Fence", Some(0), 800)];
        let resolved = resolve_offer(&offers, &player(1, false, 1));
        assert_eq!(resolved.label(), "Fence");
        assert_eq!(resolved.price(), 800);
    }

    #[test]
    fn test_unavailable_iff_no_offer_passes() {
        let offers = vec![
            Offer::flea(30, 100),
            Offer::trader("Prapor", Some(3), 200),
            Offer::trader("Prapor", Some(2), 300),
        ];
        for level in [1, 20, 30, 40] {
            for flea in [false, true] {
                for prapor in 1..=4 {
                    let player = player(level, flea, prapor);
                    let any = offers.iter().any(|offer| offer.is_available(&player));
                    let resolved = resolve_offer(&offers, &player);
                    assert_eq!(resolved.is_available(), any);
                }
            }
        }
    }
}
