//! Wallet key directory
//!
//! The coordinator never sees key shares. All it needs per wallet is the
//! signing group: scheme, participants, threshold and group public key.

use dashmap::DashMap;
use mpc_signing_core::{KeyType, PartyId, codec};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use crate::{CoordinatorError, Result};

/// What the coordinator knows about a wallet's distributed key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningGroup {
    pub key_type: KeyType,
    /// Signer parties holding a share of the key
    pub participants: Vec<PartyId>,
    /// Number of agreeing parties needed for a signature
    pub threshold: usize,
    /// Group public key (64/65-byte secp256k1 or 32-byte Ed25519)
    #[serde(with = "hex::serde")]
    pub public_key: Vec<u8>,
}

impl SigningGroup {
    pub fn new(
        key_type: KeyType,
        participants: Vec<PartyId>,
        threshold: usize,
        public_key: Vec<u8>,
    ) -> Self {
        Self {
            key_type,
            participants,
            threshold,
            public_key,
        }
    }

    /// Check threshold bounds, participant uniqueness and the group key
    pub fn validate(&self) -> Result<()> {
        if self.participants.is_empty() {
            return Err(CoordinatorError::InvalidGroup("no participants".into()));
        }
        if self.threshold == 0 || self.threshold > self.participants.len() {
            return Err(CoordinatorError::InvalidGroup(format!(
                "threshold {} outside 1..={}",
                self.threshold,
                self.participants.len()
            )));
        }

        let mut seen = HashSet::new();
        for party in &self.participants {
            if party.is_empty() {
                return Err(CoordinatorError::InvalidGroup("empty party id".into()));
            }
            if !seen.insert(party.as_str()) {
                return Err(CoordinatorError::InvalidGroup(format!(
                    "duplicate participant {party}"
                )));
            }
        }

        codec::validate_public_key(self.key_type, &self.public_key)?;
        Ok(())
    }

    pub fn contains(&self, party: &str) -> bool {
        self.participants.iter().any(|p| p == party)
    }
}

/// Source of signing groups by wallet id
pub trait KeyDirectory: Send + Sync {
    fn signing_group(&self, wallet_id: &str) -> Option<SigningGroup>;
}

/// In-memory key directory
#[derive(Debug, Default, Clone)]
pub struct StaticKeyDirectory {
    groups: Arc<DashMap<String, SigningGroup>>,
}

impl StaticKeyDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a wallet; the group is validated first
    pub fn insert(&self, wallet_id: impl Into<String>, group: SigningGroup) -> Result<()> {
        group.validate()?;
        self.groups.insert(wallet_id.into(), group);
        Ok(())
    }

    pub fn remove(&self, wallet_id: &str) -> Option<SigningGroup> {
        self.groups.remove(wallet_id).map(|(_, group)| group)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl KeyDirectory for StaticKeyDirectory {
    fn signing_group(&self, wallet_id: &str) -> Option<SigningGroup> {
        self.groups.get(wallet_id).map(|g| g.value().clone())
    }
}
