//! Shared test fixtures: demo keys and simulated signer parties

use ed25519_dalek::Signer;
use k256::PublicKey;
use mpc_signing_coordinator::{
    CoordinatorConfig, RetryConfig, SigningCoordinator, SigningGroup, StaticKeyDirectory,
};
use mpc_signing_core::{
    KeyType, PartialContribution, PartyId, SessionFingerprint, SignatureShare,
    codec::encode_ecdsa_public_key, transport::MemoryTransport,
};
use rand::rngs::OsRng;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::warn;

pub const WALLET_ID: &str = "wallet-1";

/// Full private key standing in for the distributed key
///
/// Every simulated party signs with it, so honest parties always agree.
pub enum DemoKey {
    Ecdsa(k256::ecdsa::SigningKey),
    Eddsa(ed25519_dalek::SigningKey),
}

impl DemoKey {
    pub fn generate(key_type: KeyType) -> Self {
        match key_type {
            KeyType::EcdsaSecp256k1 => DemoKey::Ecdsa(k256::ecdsa::SigningKey::random(&mut OsRng)),
            KeyType::EddsaEd25519 => {
                DemoKey::Eddsa(ed25519_dalek::SigningKey::generate(&mut OsRng))
            }
        }
    }

    pub fn key_type(&self) -> KeyType {
        match self {
            DemoKey::Ecdsa(_) => KeyType::EcdsaSecp256k1,
            DemoKey::Eddsa(_) => KeyType::EddsaEd25519,
        }
    }

    pub fn public_key(&self) -> Vec<u8> {
        match self {
            DemoKey::Ecdsa(key) => {
                encode_ecdsa_public_key(&PublicKey::from(key.verifying_key())).to_vec()
            }
            DemoKey::Eddsa(key) => key.verifying_key().to_bytes().to_vec(),
        }
    }

    /// Share an honest party would report for `tx`
    pub fn share(&self, tx: &[u8]) -> SignatureShare {
        match self {
            DemoKey::Ecdsa(key) => {
                let (sig, recovery_id) = key.sign_prehash_recoverable(tx).unwrap();
                let bytes = sig.to_bytes();
                SignatureShare::ecdsa(
                    strip(&bytes[..32]),
                    strip(&bytes[32..]),
                    recovery_id.to_byte(),
                )
            }
            DemoKey::Eddsa(key) => {
                let bytes = key.sign(tx).to_bytes();
                SignatureShare::eddsa(strip(&bytes[..32]), strip(&bytes[32..]))
            }
        }
    }
}

/// Drop leading zeros the way an arithmetic layer would
fn strip(bytes: &[u8]) -> Vec<u8> {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    bytes[start..].to_vec()
}

pub fn parties(n: usize) -> Vec<PartyId> {
    (0..n).map(|i| format!("node{i}")).collect()
}

/// 32-byte payload usable as an ECDSA prehash
pub fn tx_payload() -> Vec<u8> {
    rand::random::<[u8; 32]>().to_vec()
}

/// Config with short retry delays
pub fn fast_config() -> CoordinatorConfig {
    let retry = RetryConfig::default()
        .with_max_attempts(3)
        .with_initial_delay_ms(5);
    CoordinatorConfig::default()
        .with_session_timeout_secs(10)
        .with_dispatch_retry(retry.clone())
        .with_publish_retry(retry)
}

pub struct Fixture {
    pub coordinator: SigningCoordinator<MemoryTransport>,
    pub transport: Arc<MemoryTransport>,
    pub key: Arc<DemoKey>,
    pub parties: Vec<PartyId>,
}

impl Fixture {
    pub fn new(key_type: KeyType, n: usize, threshold: usize, config: CoordinatorConfig) -> Self {
        let key = DemoKey::generate(key_type);
        let public_key = key.public_key();
        Self::with_group_key(key, public_key, n, threshold, config)
    }

    /// Register `public_key` for the wallet while parties sign with `key`
    pub fn with_group_key(
        key: DemoKey,
        public_key: Vec<u8>,
        n: usize,
        threshold: usize,
        config: CoordinatorConfig,
    ) -> Self {
        let transport = MemoryTransport::with_timeout(5_000);
        Self::with_transport(key, public_key, n, threshold, config, transport)
    }

    /// Build on a caller-configured transport
    pub fn with_transport(
        key: DemoKey,
        public_key: Vec<u8>,
        n: usize,
        threshold: usize,
        config: CoordinatorConfig,
        transport: MemoryTransport,
    ) -> Self {
        let parties = parties(n);
        let directory = StaticKeyDirectory::new();
        directory
            .insert(
                WALLET_ID,
                SigningGroup::new(key.key_type(), parties.clone(), threshold, public_key),
            )
            .unwrap();

        let transport = Arc::new(transport);
        let coordinator =
            SigningCoordinator::new(Arc::clone(&transport), Arc::new(directory), config);

        Self {
            coordinator,
            transport,
            key: Arc::new(key),
            parties,
        }
    }

    pub fn request(&self, tx_id: &str, tx: &[u8]) -> mpc_signing_core::SigningRequest {
        mpc_signing_core::SigningRequest::new(self.key.key_type(), WALLET_ID, tx_id, tx.to_vec())
    }

    /// Honest contribution from `party` for `round`
    pub fn contribution(
        &self,
        fingerprint: SessionFingerprint,
        round: u32,
        party: &str,
        tx: &[u8],
    ) -> PartialContribution {
        PartialContribution::new(fingerprint, round, party, self.key.share(tx))
    }

    /// Spawn simulated parties answering every dispatch
    pub fn spawn_signers(&self, responders: Vec<PartyId>) -> JoinHandle<()> {
        let mut dispatches = self.transport.subscribe_dispatches();
        let coordinator = self.coordinator.clone();
        let key = Arc::clone(&self.key);

        tokio::spawn(async move {
            loop {
                let request = match dispatches.recv().await {
                    Ok(request) => request,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Simulated signers lagged behind dispatches");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                for party in &responders {
                    let contribution = PartialContribution::new(
                        request.fingerprint,
                        request.round,
                        party.clone(),
                        key.share(&request.tx),
                    );
                    coordinator.on_contribution(contribution).await;
                }
            }
        })
    }
}
