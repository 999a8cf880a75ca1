//! Two-facet weapon filter (category × caliber) that prunes itself on every edit.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::entities::Weapon;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Facet {
    Category,
    Caliber,
}

impl Facet {
    pub fn other(&self) -> Self {
        match self {
            Self::Category => Self::Caliber,
            Self::Caliber => Self::Category,
        }
    }
}

/// Anything that can be sorted into the two facets.
pub trait Faceted {
    fn facet_value(&self, facet: Facet) -> Option<String>;
}

impl Faceted for Weapon {
    fn facet_value(&self, facet: Facet) -> Option<String> {
        match facet {
            Facet::Category => self.category.clone().filter(|category| !category.is_empty()),
            Facet::Caliber => self.caliber_display(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FacetOption {
    pub value: String,
    pub count: usize,
}

impl fmt::Display for FacetOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.value, self.count)
    }
}

/// Selected categories and calibers. An empty selection means "everything".
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadingFilterState {
    #[serde(default)]
    selected_categories: BTreeSet<String>,
    #[serde(default)]
    selected_calibers: BTreeSet<String>,
}

impl CascadingFilterState {
    pub fn selected_categories(&self) -> &BTreeSet<String> {
        &self.selected_categories
    }

    pub fn selected_calibers(&self) -> &BTreeSet<String> {
        &self.selected_calibers
    }

    pub fn selected(&self, facet: Facet) -> &BTreeSet<String> {
        match facet {
            Facet::Category => &self.selected_categories,
            Facet::Caliber => &self.selected_calibers,
        }
    }

    fn selected_mut(&mut self, facet: Facet) -> &mut BTreeSet<String> {
        match facet {
            Facet::Category => &mut self.selected_categories,
            Facet::Caliber => &mut self.selected_calibers,
        }
    }

    /// Commits a new category selection and drops calibers it rules out.
    pub fn set_categories<T, I>(self, categories: I, catalog: &[T]) -> Self
    where
        T: Faceted,
        I: IntoIterator<Item = String>,
    {
        self.transition(Facet::Category, categories.into_iter().collect(), catalog)
    }

    /// Commits a new caliber selection and drops categories it rules out.
    pub fn set_calibers<T, I>(self, calibers: I, catalog: &[T]) -> Self
    where
        T: Faceted,
        I: IntoIterator<Item = String>,
    {
        self.transition(Facet::Caliber, calibers.into_iter().collect(), catalog)
    }

    fn transition<T: Faceted>(
        mut self,
        edited: Facet,
        values: BTreeSet<String>,
        catalog: &[T],
    ) -> Self {
        let other = edited.other();
        let known: BTreeSet<String> = catalog
            .iter()
            .filter_map(|item| item.facet_value(edited))
            .collect();
        let (values, unknown): (BTreeSet<String>, BTreeSet<String>) =
            values.into_iter().partition(|value| known.contains(value));
        if !unknown.is_empty() {
            debug!(?edited, ?unknown, "dropped filter values no weapon has");
        }

        let available: BTreeSet<String> = catalog
            .iter()
            .filter(|item| selection_matches(&values, item.facet_value(edited)))
            .filter_map(|item| item.facet_value(other))
            .collect();

        let mut kept: BTreeSet<String> = self
            .selected(other)
            .intersection(&available)
            .cloned()
            .collect();

        // A freshly picked value the kept selection cannot serve would show zero weapons.
        let unsupported = values
            .iter()
            .any(|value| !has_support(catalog, edited, value, &kept));
        if !kept.is_empty() && unsupported {
            kept.clear();
        }

        if kept.len() != self.selected(other).len() {
            debug!(
                ?edited,
                dropped = self.selected(other).len() - kept.len(),
                "pruned filter selection"
            );
        }

        *self.selected_mut(edited) = values;
        *self.selected_mut(other) = kept;
        self
    }

    pub fn matches<T: Faceted>(&self, item: &T) -> bool {
        selection_matches(&self.selected_categories, item.facet_value(Facet::Category))
            && selection_matches(&self.selected_calibers, item.facet_value(Facet::Caliber))
    }

    pub fn filtered<'a, T: Faceted>(&self, catalog: &'a [T]) -> Vec<&'a T> {
        catalog.iter().filter(|item| self.matches(*item)).collect()
    }

    /// Options for `facet`, with counts.
    ///
    /// While the user edits `facet` the counts come from the whole catalog so
    /// nothing they might pick disappears; otherwise they respect the other facet.
    pub fn options<T: Faceted>(
        &self,
        facet: Facet,
        editing: Option<Facet>,
        catalog: &[T],
    ) -> Vec<FacetOption> {
        let restrict = editing != Some(facet);
        let other_selection = self.selected(facet.other());
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for item in catalog {
            if restrict && !selection_matches(other_selection, item.facet_value(facet.other())) {
                continue;
            }
            if let Some(value) = item.facet_value(facet) {
                *counts.entry(value).or_default() += 1;
            }
        }
        counts
            .into_iter()
            .map(|(value, count)| FacetOption { value, count })
            .collect()
    }

    /// True when every selected value has at least one weapon under the other facet.
    pub fn is_consistent<T: Faceted>(&self, catalog: &[T]) -> bool {
        [Facet::Category, Facet::Caliber].iter().all(|&facet| {
            self.selected(facet)
                .iter()
                .all(|value| has_support(catalog, facet, value, self.selected(facet.other())))
        })
    }

    pub fn summary<T: Faceted>(&self, catalog: &[T]) -> String {
        format!(
            "Showing {} of {} weapons",
            self.filtered(catalog).len(),
            catalog.len()
        )
    }
}

fn selection_matches(selection: &BTreeSet<String>, value: Option<String>) -> bool {
    selection.is_empty() || value.map(|v| selection.contains(&v)).unwrap_or(false)
}

fn has_support<T: Faceted>(
    catalog: &[T],
    facet: Facet,
    value: &str,
    other_selection: &BTreeSet<String>,
) -> bool {
    catalog.iter().any(|item| {
        item.facet_value(facet).as_deref() == Some(value)
            && selection_matches(other_selection, item.facet_value(facet.other()))
    })
}
