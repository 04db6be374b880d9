//! Wire types for threshold signing coordination

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, ErrorCode, Result};

/// Identifier of a signer party (node id)
pub type PartyId = String;

/// Signature scheme of a wallet's distributed key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyType {
    /// ECDSA over secp256k1, signatures are R‖S‖V
    #[serde(rename = "secp256k1")]
    EcdsaSecp256k1,
    /// EdDSA over Ed25519, signatures are R‖S
    #[serde(rename = "ed25519")]
    EddsaEd25519,
}

impl KeyType {
    /// Length in bytes of a composed signature for this scheme
    pub fn signature_len(&self) -> usize {
        match self {
            KeyType::EcdsaSecp256k1 => 65,
            KeyType::EddsaEd25519 => 64,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::EcdsaSecp256k1 => "secp256k1",
            KeyType::EddsaEd25519 => "ed25519",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "secp256k1" | "ecdsa" => Ok(KeyType::EcdsaSecp256k1),
            "ed25519" | "eddsa" => Ok(KeyType::EddsaEd25519),
            other => Err(Error::InvalidRequest(format!("unknown key type: {other}"))),
        }
    }
}

/// Identity of a signing session, derived from `(wallet_id, tx_id)`
///
/// Two requests with the same wallet and transaction id always map to the
/// same fingerprint, which is what the registry deduplicates on.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionFingerprint(#[serde(with = "hex::serde")] [u8; 32]);

impl SessionFingerprint {
    /// Derive the fingerprint for a wallet and transaction id
    pub fn derive(wallet_id: &str, tx_id: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        // Length prefixes keep ("ab", "c") and ("a", "bc") apart
        hasher.update(&(wallet_id.len() as u64).to_le_bytes());
        hasher.update(wallet_id.as_bytes());
        hasher.update(&(tx_id.len() as u64).to_le_bytes());
        hasher.update(tx_id.as_bytes());
        Self(*hasher.finalize().as_bytes())
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// First eight hex characters, for log lines
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for SessionFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for SessionFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionFingerprint({})", self.short())
    }
}

impl FromStr for SessionFingerprint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = hex::decode(s)?;
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| Error::Deserialization("fingerprint must be 32 bytes".into()))?;
        Ok(Self(array))
    }
}

/// Client request to sign a transaction (wire `SigningMessage`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningRequest {
    pub key_type: KeyType,
    pub wallet_id: String,
    pub tx_id: String,
    /// Message bytes to sign (a 32-byte prehash for ECDSA)
    #[serde(default, with = "base64_bytes")]
    pub tx: Vec<u8>,
    /// Auxiliary signature supplied by the client; carried, never produced
    #[serde(default, with = "base64_bytes")]
    pub signature: Vec<u8>,
}

impl SigningRequest {
    pub fn new(
        key_type: KeyType,
        wallet_id: impl Into<String>,
        tx_id: impl Into<String>,
        tx: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            key_type,
            wallet_id: wallet_id.into(),
            tx_id: tx_id.into(),
            tx: tx.into(),
            signature: Vec::new(),
        }
    }

    pub fn fingerprint(&self) -> SessionFingerprint {
        SessionFingerprint::derive(&self.wallet_id, &self.tx_id)
    }

    /// Check the fields every request must carry
    pub fn validate(&self) -> Result<()> {
        if self.wallet_id.trim().is_empty() {
            return Err(Error::InvalidRequest("wallet_id is empty".into()));
        }
        if self.tx_id.trim().is_empty() {
            return Err(Error::InvalidRequest("tx_id is empty".into()));
        }
        if self.tx.is_empty() {
            return Err(Error::InvalidRequest("tx payload is empty".into()));
        }
        Ok(())
    }
}

/// One party's view of the signature components for a round
///
/// `r` and `s` are big-endian magnitudes of any length; leading zero bytes
/// are insignificant. `recovery_id` is required for ECDSA.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignatureShare {
    #[serde(with = "base64_bytes")]
    pub r: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub s: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_id: Option<u8>,
}

impl SignatureShare {
    pub fn ecdsa(r: impl Into<Vec<u8>>, s: impl Into<Vec<u8>>, recovery_id: u8) -> Self {
        Self {
            r: r.into(),
            s: s.into(),
            recovery_id: Some(recovery_id),
        }
    }

    pub fn eddsa(r: impl Into<Vec<u8>>, s: impl Into<Vec<u8>>) -> Self {
        Self {
            r: r.into(),
            s: s.into(),
            recovery_id: None,
        }
    }

    /// Same share with leading zero bytes stripped from both magnitudes
    pub fn normalized(&self) -> Self {
        Self {
            r: strip_leading_zeros(&self.r).to_vec(),
            s: strip_leading_zeros(&self.s).to_vec(),
            recovery_id: self.recovery_id,
        }
    }
}

pub(crate) fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

/// A signer party's output for one round of one session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialContribution {
    pub fingerprint: SessionFingerprint,
    pub round: u32,
    pub party_id: PartyId,
    pub share: SignatureShare,
}

impl PartialContribution {
    pub fn new(
        fingerprint: SessionFingerprint,
        round: u32,
        party_id: impl Into<PartyId>,
        share: SignatureShare,
    ) -> Self {
        Self {
            fingerprint,
            round,
            party_id: party_id.into(),
            share,
        }
    }
}

/// Outbound instruction asking the signer parties to run a signing round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignRoundRequest {
    pub fingerprint: SessionFingerprint,
    pub round: u32,
    pub key_type: KeyType,
    pub wallet_id: String,
    pub tx_id: String,
    #[serde(with = "base64_bytes")]
    pub tx: Vec<u8>,
    pub participants: Vec<PartyId>,
    pub threshold: usize,
}

/// Terminal result of a signing request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningResponse {
    pub error_code: ErrorCode,
    #[serde(default)]
    pub error_reason: String,
    #[serde(default)]
    pub is_timeout: bool,
    pub wallet_id: String,
    pub tx_id: String,
    #[serde(default, with = "base64_bytes")]
    pub signature: Vec<u8>,
}

impl SigningResponse {
    pub fn success(
        wallet_id: impl Into<String>,
        tx_id: impl Into<String>,
        signature: Vec<u8>,
    ) -> Self {
        Self {
            error_code: ErrorCode::None,
            error_reason: String::new(),
            is_timeout: false,
            wallet_id: wallet_id.into(),
            tx_id: tx_id.into(),
            signature,
        }
    }

    pub fn failure(
        wallet_id: impl Into<String>,
        tx_id: impl Into<String>,
        error_code: ErrorCode,
        error_reason: impl Into<String>,
    ) -> Self {
        Self {
            error_code,
            error_reason: error_reason.into(),
            is_timeout: error_code == ErrorCode::Timeout,
            wallet_id: wallet_id.into(),
            tx_id: tx_id.into(),
            signature: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error_code.is_success()
    }

    /// Error event for a failed response, `None` on success
    pub fn error_event(&self) -> Option<SigningResultErrorEvent> {
        if self.is_success() {
            return None;
        }
        Some(SigningResultErrorEvent {
            wallet_id: self.wallet_id.clone(),
            tx_id: self.tx_id.clone(),
            error_code: self.error_code,
            error_reason: self.error_reason.clone(),
            is_timeout: self.is_timeout,
        })
    }
}

/// Failure notification published alongside a failed response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningResultErrorEvent {
    pub wallet_id: String,
    pub tx_id: String,
    pub error_code: ErrorCode,
    #[serde(default)]
    pub error_reason: String,
    #[serde(default)]
    pub is_timeout: bool,
}

/// Standard base64 for byte fields; `null` reads back as empty
mod base64_bytes {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded: Option<String> = Option::deserialize(deserializer)?;
        match encoded {
            Some(s) => STANDARD.decode(s).map_err(serde::de::Error::custom),
            None => Ok(Vec::new()),
        }
    }
}
