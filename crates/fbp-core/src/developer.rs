//! Developer identity records and duplicate consolidation.
//!
//! Anonymous uploads mean one physical person usually shows up as several
//! developer records. Records sharing at least one session id are the
//! same person; consolidation merges them until no overlap remains.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::types::{DeveloperId, SessionId};

/// One developer identity and the sessions attributed to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Developer {
    pub id: DeveloperId,
    pub session_ids: BTreeSet<SessionId>,
}

impl Developer {
    /// A fresh developer with a random id and no sessions.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: DeveloperId::random(),
            session_ids: BTreeSet::new(),
        }
    }

    /// A fresh developer already owning one session.
    #[must_use]
    pub fn with_session(session_id: SessionId) -> Self {
        let mut dev = Self::new();
        dev.session_ids.insert(session_id);
        dev
    }

    /// Whether this record was absorbed into another developer.
    #[must_use]
    pub fn is_absorbed(&self) -> bool {
        self.id.is_sentinel()
    }

    /// Whether the two records share at least one session.
    #[must_use]
    pub fn shares_session_with(&self, other: &Self) -> bool {
        !self.session_ids.is_disjoint(&other.session_ids)
    }
}

impl Default for Developer {
    fn default() -> Self {
        Self::new()
    }
}

/// Persistence seam for developer records.
///
/// `save` addresses the record by the id it currently carries; absorbed
/// records all share the sentinel id, so only live records may be
/// addressed this way.
pub trait DeveloperStore {
    type Error: std::error::Error;

    fn find_all(&self) -> Result<Vec<Developer>, Self::Error>;
    fn insert(&mut self, developer: &Developer) -> Result<(), Self::Error>;
    fn save(&mut self, original_id: DeveloperId, developer: &Developer)
    -> Result<(), Self::Error>;
    fn find_by_session_id(&self, session_id: &SessionId) -> Result<Vec<Developer>, Self::Error>;
    fn clear(&mut self) -> Result<(), Self::Error>;
}

/// The live developer owning a session, if any.
///
/// # Panics
///
/// Panics when more than one live developer claims the session; the
/// store is corrupt at that point and no merge decision is safe.
pub fn find_session_developer<S: DeveloperStore>(
    store: &S,
    session_id: &SessionId,
) -> Result<Option<Developer>, S::Error> {
    let mut developers = store.find_by_session_id(session_id)?;
    assert!(
        developers.len() <= 1,
        "multiple developers registered for session {session_id}"
    );
    Ok(developers.pop())
}

/// Outcome of one consolidation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConsolidationStats {
    /// Scans over the store, including the final merge-free one.
    pub passes: u32,
    /// Total records absorbed.
    pub merges: u64,
}

const MAX_PASSES: u32 = 1000;

/// Merges developers sharing sessions until a fixpoint is reached.
///
/// Each pass snapshots the live records, merges overlapping pairs in
/// memory and writes survivor and tombstone back immediately. A pass
/// with at least one merge forces a rescan; a merge-free pass is the
/// fixpoint. Persistence errors propagate as-is, leaving already
/// written merges in place.
///
/// # Panics
///
/// Panics when no fixpoint is reached within an internal pass limit,
/// which would indicate a store that does not persist what it is told.
pub fn consolidate<S: DeveloperStore>(store: &mut S) -> Result<ConsolidationStats, S::Error> {
    let mut stats = ConsolidationStats::default();
    loop {
        stats.passes += 1;
        assert!(
            stats.passes <= MAX_PASSES,
            "developer consolidation did not converge within {MAX_PASSES} passes"
        );

        let mut developers: Vec<Developer> = store
            .find_all()?
            .into_iter()
            .filter(|dev| !dev.is_absorbed())
            .collect();

        let mut merges_this_pass = 0_u64;
        let mut i = 0;
        while i < developers.len() {
            let mut j = i + 1;
            while j < developers.len() {
                if developers[i].shares_session_with(&developers[j]) {
                    let absorbed = developers.remove(j);
                    let survivor = &mut developers[i];
                    survivor
                        .session_ids
                        .extend(absorbed.session_ids.iter().cloned());
                    store.save(survivor.id, survivor)?;
                    let tombstone = Developer {
                        id: DeveloperId::SENTINEL,
                        session_ids: absorbed.session_ids,
                    };
                    store.save(absorbed.id, &tombstone)?;
                    merges_this_pass += 1;
                    tracing::debug!(survivor = %developers[i].id, "absorbed duplicate developer");
                } else {
                    j += 1;
                }
            }
            i += 1;
        }

        stats.merges += merges_this_pass;
        if merges_this_pass == 0 {
            break;
        }
    }
    tracing::info!(passes = stats.passes, merges = stats.merges, "consolidation finished");
    Ok(stats)
}

/// Aggregate numbers over the live developer records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeveloperStatistics {
    /// Distinct session ids across all live developers.
    pub sessions: u64,
    /// Session ids claimed by more than one live developer.
    pub duplicated_sessions: u64,
    /// Live developer count; the true participant count is at most this.
    pub developers_upper_bound: u64,
    /// Connected components under session sharing; the true participant
    /// count is at least this.
    pub developers_lower_bound: u64,
}

/// Computes participant-count bounds from the current store contents.
///
/// Before consolidation the two bounds differ whenever records still
/// share sessions; afterwards they coincide.
pub fn statistics<S: DeveloperStore>(store: &S) -> Result<DeveloperStatistics, S::Error> {
    let live: Vec<Developer> = store
        .find_all()?
        .into_iter()
        .filter(|dev| !dev.is_absorbed())
        .collect();

    let mut all_sessions: BTreeSet<&SessionId> = BTreeSet::new();
    let mut duplicated: BTreeSet<&SessionId> = BTreeSet::new();
    for dev in &live {
        for sid in &dev.session_ids {
            if !all_sessions.insert(sid) {
                duplicated.insert(sid);
            }
        }
    }

    let mut components: Vec<BTreeSet<&SessionId>> = live
        .iter()
        .map(|dev| dev.session_ids.iter().collect())
        .collect();
    let mut i = 0;
    while i < components.len() {
        let mut j = i + 1;
        while j < components.len() {
            if !components[i].is_disjoint(&components[j]) {
                let other = components.remove(j);
                components[i].extend(other);
            } else {
                j += 1;
            }
        }
        i += 1;
    }

    Ok(DeveloperStatistics {
        sessions: all_sessions.len() as u64,
        duplicated_sessions: duplicated.len() as u64,
        developers_upper_bound: live.len() as u64,
        developers_lower_bound: components.len() as u64,
    })
}
