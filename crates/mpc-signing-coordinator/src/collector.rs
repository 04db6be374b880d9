//! Quorum collection for one session round
//!
//! Contributions are bucketed by share content. A party may contribute once
//! per round; resubmitting the same share is a no-op, a different share is a
//! conflict. The first bucket to gather `threshold` parties is the agreed
//! share.

use mpc_signing_core::{PartyId, SignatureShare};
use std::collections::{BTreeSet, HashMap};

/// Result of offering a contribution to the collector
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectorOutcome {
    /// Counted, quorum not yet reached
    Accepted { collected: usize },
    /// Same party already sent this exact share
    DuplicateIgnored,
    /// Same party already sent a different share
    Conflict { existing: SignatureShare },
    /// This contribution completed the quorum
    QuorumReached(SignatureShare),
}

#[derive(Debug, Clone)]
pub struct QuorumCollector {
    threshold: usize,
    /// Share per contributing party
    shares: HashMap<PartyId, SignatureShare>,
    /// Parties per distinct share
    tallies: HashMap<SignatureShare, BTreeSet<PartyId>>,
    agreed: Option<SignatureShare>,
}

impl QuorumCollector {
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold,
            shares: HashMap::new(),
            tallies: HashMap::new(),
            agreed: None,
        }
    }

    pub fn accept(&mut self, party: &PartyId, share: SignatureShare) -> CollectorOutcome {
        // Leading zeros are insignificant, compare magnitudes
        let share = share.normalized();

        if let Some(existing) = self.shares.get(party) {
            return if *existing == share {
                CollectorOutcome::DuplicateIgnored
            } else {
                CollectorOutcome::Conflict {
                    existing: existing.clone(),
                }
            };
        }

        self.shares.insert(party.clone(), share.clone());
        let voters = self.tallies.entry(share.clone()).or_default();
        voters.insert(party.clone());

        if self.agreed.is_none() && voters.len() >= self.threshold {
            self.agreed = Some(share.clone());
            return CollectorOutcome::QuorumReached(share);
        }

        CollectorOutcome::Accepted {
            collected: self.shares.len(),
        }
    }

    /// Whether `outstanding` further contributions could still complete a quorum
    pub fn quorum_reachable(&self, outstanding: usize) -> bool {
        if self.agreed.is_some() {
            return true;
        }
        let largest = self.tallies.values().map(BTreeSet::len).max().unwrap_or(0);
        largest + outstanding >= self.threshold
    }

    /// Number of parties that have contributed
    pub fn contributed(&self) -> usize {
        self.shares.len()
    }

    pub fn has_contributed(&self, party: &str) -> bool {
        self.shares.contains_key(party)
    }

    pub fn agreed(&self) -> Option<&SignatureShare> {
        self.agreed.as_ref()
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Parties backing the agreed share, in order
    pub fn agreeing_parties(&self) -> Vec<PartyId> {
        self.agreed
            .as_ref()
            .and_then(|share| self.tallies.get(share))
            .map(|voters| voters.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Drop everything collected; used when a new round starts
    pub fn reset(&mut self) {
        self.shares.clear();
        self.tallies.clear();
        self.agreed = None;
    }
}
