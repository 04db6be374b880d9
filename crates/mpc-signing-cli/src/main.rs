//! MPC Signing CLI
//!
//! Command-line tool for exercising the threshold signing coordinator:
//! local end-to-end simulation, signature composition and key decoding.

use anyhow::{Context, Result, ensure};
use clap::{Args, Parser, Subcommand};
use ed25519_dalek::Signer;
use k256::{PublicKey, elliptic_curve::sec1::ToEncodedPoint};
use mpc_signing_coordinator::{
    CoordinatorConfig, SigningCoordinator, SigningGroup, StaticKeyDirectory,
};
use mpc_signing_core::{
    KeyType, PartialContribution, PartyId, SignatureShare, SigningRequest, codec,
    transport::MemoryTransport,
};
use rand::rngs::OsRng;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

const WALLET_ID: &str = "demo-wallet";

#[derive(Parser)]
#[command(name = "mpc-signing")]
#[command(about = "Threshold signing coordinator CLI", version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run signing requests against simulated signer parties
    Simulate(SimulateArgs),

    /// Compose a signature from hex-encoded components
    Compose {
        /// Key type (secp256k1, ed25519)
        #[arg(short, long, default_value = "secp256k1")]
        key_type: KeyType,

        /// R component, big-endian hex
        #[arg(long)]
        r: String,

        /// S component, big-endian hex
        #[arg(long)]
        s: String,

        /// Recovery byte (ECDSA only)
        #[arg(long)]
        v: Option<u8>,
    },

    /// Decode and validate a hex-encoded public key
    DecodeKey {
        /// Key type (secp256k1, ed25519)
        #[arg(short, long, default_value = "secp256k1")]
        key_type: KeyType,

        /// Public key hex
        key: String,
    },
}

#[derive(Args)]
struct SimulateArgs {
    /// Key type (secp256k1, ed25519)
    #[arg(short, long, default_value = "secp256k1")]
    key_type: KeyType,

    /// Number of signer parties
    #[arg(short, long, default_value_t = 3)]
    parties: usize,

    /// Agreeing parties needed for a signature
    #[arg(short, long, default_value_t = 2)]
    threshold: usize,

    /// Number of signing requests to run
    #[arg(short, long, default_value_t = 1)]
    requests: usize,

    /// Parties that never answer
    #[arg(long, default_value_t = 0)]
    offline: usize,

    /// Parties that answer with a garbage share
    #[arg(long, default_value_t = 0)]
    faulty: usize,

    /// Session timeout override in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Coordinator configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    FmtSubscriber::builder()
        .with_max_level(level)
        .pretty()
        .init();

    match cli.command {
        Commands::Simulate(args) => {
            run_simulation(args).await?;
        }
        Commands::Compose { key_type, r, s, v } => {
            compose(key_type, &r, &s, v)?;
        }
        Commands::DecodeKey { key_type, key } => {
            decode_key(key_type, &key)?;
        }
    }

    Ok(())
}

/// Full key held by every simulated party
enum SimulatedKey {
    Ecdsa(k256::ecdsa::SigningKey),
    Eddsa(ed25519_dalek::SigningKey),
}

impl SimulatedKey {
    fn generate(key_type: KeyType) -> Self {
        match key_type {
            KeyType::EcdsaSecp256k1 => {
                SimulatedKey::Ecdsa(k256::ecdsa::SigningKey::random(&mut OsRng))
            }
            KeyType::EddsaEd25519 => {
                SimulatedKey::Eddsa(ed25519_dalek::SigningKey::generate(&mut OsRng))
            }
        }
    }

    fn public_key(&self) -> Vec<u8> {
        match self {
            SimulatedKey::Ecdsa(key) => {
                let point = PublicKey::from(key.verifying_key());
                codec::encode_ecdsa_public_key(&point).to_vec()
            }
            SimulatedKey::Eddsa(key) => {
                let point = key.verifying_key();
                codec::encode_eddsa_public_key(&point).to_vec()
            }
        }
    }

    fn share(&self, tx: &[u8]) -> Result<SignatureShare> {
        match self {
            SimulatedKey::Ecdsa(key) => {
                let (sig, recovery_id) = key
                    .sign_prehash_recoverable(tx)
                    .context("ECDSA signing failed")?;
                let bytes = sig.to_bytes();
                Ok(SignatureShare::ecdsa(
                    bytes[..32].to_vec(),
                    bytes[32..].to_vec(),
                    recovery_id.to_byte(),
                ))
            }
            SimulatedKey::Eddsa(key) => {
                let bytes = key.sign(tx).to_bytes();
                Ok(SignatureShare::eddsa(
                    bytes[..32].to_vec(),
                    bytes[32..].to_vec(),
                ))
            }
        }
    }
}

async fn run_simulation(args: SimulateArgs) -> Result<()> {
    ensure!(
        args.threshold >= 1 && args.threshold <= args.parties,
        "threshold must be between 1 and {}",
        args.parties
    );

    let mut config = match &args.config {
        Some(path) => CoordinatorConfig::from_file(path)?,
        None => CoordinatorConfig::default(),
    };
    if let Some(secs) = args.timeout_secs {
        config = config.with_session_timeout_secs(secs);
    }
    let config = config.with_signature_verification(true);

    let key = Arc::new(SimulatedKey::generate(args.key_type));
    let participants: Vec<PartyId> = (0..args.parties).map(|i| format!("node{i}")).collect();

    let directory = StaticKeyDirectory::new();
    directory.insert(
        WALLET_ID,
        SigningGroup::new(
            args.key_type,
            participants.clone(),
            args.threshold,
            key.public_key(),
        ),
    )?;

    let transport = Arc::new(MemoryTransport::new());
    let coordinator = SigningCoordinator::new(Arc::clone(&transport), Arc::new(directory), config);
    let maintenance = coordinator.spawn_maintenance(Duration::from_secs(5));

    let online = args.parties.saturating_sub(args.offline);
    let responders: Vec<(PartyId, bool)> = participants
        .iter()
        .take(online)
        .enumerate()
        .map(|(i, party)| (party.clone(), i < args.faulty))
        .collect();

    info!(
        key_type = %args.key_type,
        parties = args.parties,
        threshold = args.threshold,
        online,
        faulty = args.faulty.min(online),
        public_key = %hex::encode(key.public_key()),
        "Starting signing simulation"
    );

    let signers = spawn_signers(&coordinator, &transport, key, responders);

    for i in 0..args.requests {
        let tx: [u8; 32] = rand::random();
        let request = SigningRequest::new(args.key_type, WALLET_ID, format!("tx-{i}"), tx.to_vec());
        let response = coordinator.sign(request).await;

        if response.is_success() {
            info!(
                tx_id = %response.tx_id,
                signature = %hex::encode(&response.signature),
                "Signature produced"
            );
        } else {
            warn!(
                tx_id = %response.tx_id,
                code = %response.error_code,
                reason = %response.error_reason,
                "Signing failed"
            );
        }
        println!("{}", serde_json::to_string_pretty(&response)?);
    }

    println!("{}", serde_json::to_string_pretty(&coordinator.stats())?);

    signers.abort();
    maintenance.abort();
    Ok(())
}

/// Simulated parties: each answers every dispatch, faulty ones with noise
fn spawn_signers(
    coordinator: &SigningCoordinator<MemoryTransport>,
    transport: &MemoryTransport,
    key: Arc<SimulatedKey>,
    responders: Vec<(PartyId, bool)>,
) -> JoinHandle<()> {
    let mut dispatches = transport.subscribe_dispatches();
    let coordinator = coordinator.clone();

    tokio::spawn(async move {
        loop {
            let request = match dispatches.recv().await {
                Ok(request) => request,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Simulated parties lagged behind dispatches");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            let honest = match key.share(&request.tx) {
                Ok(share) => share,
                Err(e) => {
                    warn!(error = %e, "Simulated party could not sign");
                    continue;
                }
            };

            for (party, faulty) in &responders {
                let share = if *faulty {
                    let noise: [u8; 32] = rand::random();
                    SignatureShare {
                        r: noise.to_vec(),
                        ..honest.clone()
                    }
                } else {
                    honest.clone()
                };

                let contribution = PartialContribution::new(
                    request.fingerprint,
                    request.round,
                    party.clone(),
                    share,
                );
                coordinator.on_contribution(contribution).await;
            }
        }
    })
}

fn decode_hex(value: &str) -> Result<Vec<u8>> {
    let trimmed = value.trim().trim_start_matches("0x");
    hex::decode(trimmed)
        .with_context(|| format!("invalid hex: {value}"))
}

fn compose(key_type: KeyType, r: &str, s: &str, v: Option<u8>) -> Result<()> {
    let share = SignatureShare {
        r: decode_hex(r)?,
        s: decode_hex(s)?,
        recovery_id: v,
    };
    let signature = codec::compose_signature(key_type, &share)?;
    println!("{}", hex::encode(signature));
    Ok(())
}

fn decode_key(key_type: KeyType, key: &str) -> Result<()> {
    let bytes = decode_hex(key)?;

    match key_type {
        KeyType::EcdsaSecp256k1 => {
            let public_key = codec::decode_ecdsa_public_key(&bytes)?;
            println!("Key type:     {key_type}");
            println!(
                "X||Y:         {}",
                hex::encode(codec::encode_ecdsa_public_key(&public_key))
            );
            println!(
                "Compressed:   {}",
                hex::encode(public_key.to_encoded_point(true).as_bytes())
            );
        }
        KeyType::EddsaEd25519 => {
            let public_key = codec::decode_eddsa_public_key(&bytes)?;
            println!("Key type:     {key_type}");
            println!(
                "Public key:   {}",
                hex::encode(codec::encode_eddsa_public_key(&public_key))
            );
        }
    }

    Ok(())
}
