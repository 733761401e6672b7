// Local vote counters and the decision recorder.
//
// Counters are held in a store keyed by item id rather than on the feed's
// item structs, so the feed's copy and any rendered copy never alias.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::protocol::{Decision, Item, ItemId, Tally, VoteRequest};

/// Vote counters keyed by item id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoteStore {
    tallies: HashMap<ItemId, Tally>,
}

impl VoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the server's counters for an item. Existing entries are left
    /// alone so a re-delivered page cannot wipe out a local vote.
    pub fn seed(&mut self, item: &Item) {
        self.tallies.entry(item.id.clone()).or_insert_with(|| item.tally());
    }

    pub fn seed_all<'a>(&mut self, items: impl IntoIterator<Item = &'a Item>) {
        for item in items {
            self.seed(item);
        }
    }

    pub fn get(&self, id: &ItemId) -> Option<Tally> {
        self.tallies.get(id).copied()
    }

    /// Counters for `item`, falling back to the server's values when the
    /// item was never seeded.
    pub fn tally_for(&self, item: &Item) -> Tally {
        self.get(&item.id).unwrap_or_else(|| item.tally())
    }

    pub fn len(&self) -> usize {
        self.tallies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tallies.is_empty()
    }
}

/// Apply one vote to the store and return the updated store.
///
/// `Undecided` leaves the store untouched. An unknown id starts from zero.
pub fn apply_vote(mut store: VoteStore, id: &ItemId, decision: Decision) -> VoteStore {
    if !decision.is_decided() {
        return store;
    }
    let tally = store.tallies.entry(id.clone()).or_default();
    tally.total_votes += 1;
    match decision {
        Decision::Smash => tally.smashes += 1,
        Decision::Pass => tally.passes += 1,
        Decision::Undecided => {}
    }
    store
}

/// Persists decisions: applies the optimistic local update immediately and
/// hands back the remote write for the orchestrator to fire.
///
/// The remote write is never awaited here and a failed write is not rolled
/// back locally. The backend stays the source of truth for later page loads.
#[derive(Debug, Clone)]
pub struct DecisionRecorder {
    session: u64,
    store: VoteStore,
}

impl DecisionRecorder {
    pub fn new(session: u64) -> Self {
        DecisionRecorder {
            session,
            store: VoteStore::new(),
        }
    }

    /// Record `decision` for `item`. Returns `None` for `Undecided`.
    ///
    /// Callers must invoke this at most once per cursor position.
    pub fn record(&mut self, item: &Item, decision: Decision) -> Option<VoteRequest> {
        if !decision.is_decided() {
            debug!("Ignoring undecided vote for {}", item.id);
            return None;
        }
        self.store.seed(item);
        let store = std::mem::take(&mut self.store);
        self.store = apply_vote(store, &item.id, decision);
        info!(
            "Recorded {} for {} (now {:?})",
            decision.label(),
            item.id,
            self.store.get(&item.id)
        );
        Some(VoteRequest {
            session: self.session,
            item_id: item.id.clone(),
            decision,
        })
    }

    pub fn store(&self) -> &VoteStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut VoteStore {
        &mut self.store
    }
}
