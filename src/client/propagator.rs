//! Cross-cache patch propagation.
//!
//! After a price-affecting mutation, every already-materialized view that
//! embeds price data is patched in place instead of being invalidated and
//! refetched. Propagation is a typed fan-out over a registry of view
//! updaters; each updater knows which views it owns and which entity id a
//! mutation must match. Views that don't match are never rewritten, so
//! downstream diffing sees them unchanged.

use std::collections::{HashMap, HashSet};

use crate::models::price::PriceRow;
use crate::sources::SourceType;

/// Entity a price mutation belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PriceOwner {
    Deck(String),
    Collection(String),
}

/// Result of a successful price-affecting mutation, as handed to the
/// propagator.
#[derive(Debug, Clone)]
pub struct PriceMutation {
    pub owner: PriceOwner,
    pub rows: Vec<PriceRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeckDetailView {
    pub deck_id: String,
    pub name: String,
    pub prices: Vec<PriceRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeckListEntry {
    pub deck_id: String,
    pub name: String,
    pub prices: Vec<PriceRow>,
}

/// One page of a paginated deck listing.
#[derive(Debug, Clone, PartialEq)]
pub struct DeckListPage {
    pub page: u32,
    pub entries: Vec<DeckListEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollectionDetailView {
    pub collection_id: String,
    pub name: String,
    pub prices: Vec<PriceRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollectionListEntry {
    pub collection_id: String,
    pub prices: Vec<PriceRow>,
}

/// Identity of one cached collection listing. A closed enum instead of the
/// string-prefix naming convention the cache keys used to encode.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ListingKey {
    PublicCollections { page: u32 },
    UserCollections { user_id: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollectionListPage {
    pub entries: Vec<CollectionListEntry>,
}

/// All client-side materialized views that embed price data.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ViewCache {
    pub deck_details: HashMap<String, DeckDetailView>,
    pub deck_list_pages: Vec<DeckListPage>,
    pub collection_details: HashMap<String, CollectionDetailView>,
    pub collection_list_pages: HashMap<ListingKey, CollectionListPage>,
}

/// One derived-view updater. Returns how many views it patched; zero means
/// the mutation was not applicable and nothing was touched.
pub trait ViewUpdater: Send + Sync {
    fn name(&self) -> &'static str;
    fn apply(&self, cache: &mut ViewCache, mutation: &PriceMutation) -> usize;
}

/// Replace semantics for deck views: the mutation result is the complete new
/// embedded price list.
fn replace_prices(prices: &mut Vec<PriceRow>, incoming: &[PriceRow]) {
    *prices = incoming.to_vec();
}

/// Merge semantics for collection views: only rows whose source type is
/// covered by the incoming set are dropped, then the incoming rows are
/// appended. Rows for other source types survive the update.
fn merge_prices(prices: &mut Vec<PriceRow>, incoming: &[PriceRow]) {
    let incoming_sources: HashSet<SourceType> =
        incoming.iter().map(|row| row.source_type).collect();

    prices.retain(|row| !incoming_sources.contains(&row.source_type));
    prices.extend_from_slice(incoming);
}

struct DeckDetailUpdater;

impl ViewUpdater for DeckDetailUpdater {
    fn name(&self) -> &'static str {
        "deck-detail"
    }

    fn apply(&self, cache: &mut ViewCache, mutation: &PriceMutation) -> usize {
        let PriceOwner::Deck(deck_id) = &mutation.owner else {
            return 0;
        };

        match cache.deck_details.get_mut(deck_id) {
            Some(view) => {
                replace_prices(&mut view.prices, &mutation.rows);
                1
            }
            None => 0,
        }
    }
}

struct DeckListUpdater;

impl ViewUpdater for DeckListUpdater {
    fn name(&self) -> &'static str {
        "deck-list"
    }

    fn apply(&self, cache: &mut ViewCache, mutation: &PriceMutation) -> usize {
        let PriceOwner::Deck(deck_id) = &mutation.owner else {
            return 0;
        };

        let mut patched = 0;
        for page in &mut cache.deck_list_pages {
            for entry in &mut page.entries {
                if &entry.deck_id == deck_id {
                    replace_prices(&mut entry.prices, &mutation.rows);
                    patched += 1;
                }
            }
        }
        patched
    }
}

struct CollectionDetailUpdater;

impl ViewUpdater for CollectionDetailUpdater {
    fn name(&self) -> &'static str {
        "collection-detail"
    }

    fn apply(&self, cache: &mut ViewCache, mutation: &PriceMutation) -> usize {
        let PriceOwner::Collection(collection_id) = &mutation.owner else {
            return 0;
        };

        match cache.collection_details.get_mut(collection_id) {
            Some(view) => {
                merge_prices(&mut view.prices, &mutation.rows);
                1
            }
            None => 0,
        }
    }
}

struct CollectionListUpdater;

impl ViewUpdater for CollectionListUpdater {
    fn name(&self) -> &'static str {
        "collection-list"
    }

    fn apply(&self, cache: &mut ViewCache, mutation: &PriceMutation) -> usize {
        let PriceOwner::Collection(collection_id) = &mutation.owner else {
            return 0;
        };

        let mut patched = 0;
        for page in cache.collection_list_pages.values_mut() {
            for entry in &mut page.entries {
                if &entry.collection_id == collection_id {
                    merge_prices(&mut entry.prices, &mutation.rows);
                    patched += 1;
                }
            }
        }
        patched
    }
}

pub struct CachePropagator {
    updaters: Vec<Box<dyn ViewUpdater>>,
}

impl CachePropagator {
    /// Registry with every known derived view registered.
    pub fn new() -> Self {
        Self {
            updaters: vec![
                Box::new(DeckDetailUpdater),
                Box::new(DeckListUpdater),
                Box::new(CollectionDetailUpdater),
                Box::new(CollectionListUpdater),
            ],
        }
    }

    /// Fan the mutation out to all registered updaters. Returns the total
    /// number of views patched.
    pub fn propagate(&self, cache: &mut ViewCache, mutation: &PriceMutation) -> usize {
        let mut patched = 0;
        for updater in &self.updaters {
            let count = updater.apply(cache, mutation);
            if count > 0 {
                tracing::debug!("Propagated price update to {} {} view(s)", count, updater.name());
            }
            patched += count;
        }
        patched
    }
}

impl Default for CachePropagator {
    fn default() -> Self {
        Self::new()
    }
}
