//! Invariant tests for session outcomes
//!
//! These run the coordinator on a multi-threaded runtime and race duplicate
//! requests and contributions against each other.

use mpc_signing_core::{
    KeyType, SigningResponse,
    transport::{SIGNING_RESULT_ERROR_TOPIC, SIGNING_RESULT_TOPIC},
};
use std::collections::HashSet;

use crate::support::{Fixture, fast_config, tx_payload};

/// INVARIANT: concurrent duplicates of one request create exactly one session
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn invariant_single_flight_under_concurrency() {
    let fixture = Fixture::new(KeyType::EddsaEd25519, 3, 2, fast_config());
    let signers = fixture.spawn_signers(fixture.parties.clone());
    let tx = tx_payload();

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let coordinator = fixture.coordinator.clone();
            let request = fixture.request("tx-1", &tx);
            tokio::spawn(async move { coordinator.sign(request).await })
        })
        .collect();

    let mut responses = Vec::new();
    for handle in handles {
        responses.push(handle.await.unwrap());
    }

    let stats = fixture.coordinator.stats();
    assert_eq!(stats.sessions_created, 1);
    assert_eq!(stats.requests_deduplicated + stats.requests_replayed, 15);

    // Every caller sees the same terminal response
    assert!(responses[0].is_success());
    assert!(responses.iter().all(|r| *r == responses[0]));

    signers.abort();
}

/// INVARIANT: exactly one response is published per session, whatever races
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn invariant_exactly_once_publication() {
    let fixture = Fixture::new(KeyType::EcdsaSecp256k1, 5, 3, fast_config());
    let sessions = 8;

    let mut tickets = Vec::new();
    let mut payloads = Vec::new();
    for i in 0..sessions {
        let tx = tx_payload();
        let request = fixture.request(&format!("tx-{i}"), &tx);
        tickets.push(fixture.coordinator.submit(request).await.unwrap());
        payloads.push(tx);
    }

    // Every party contributes to every session concurrently, twice
    let mut tasks = Vec::new();
    for (ticket, tx) in tickets.iter().zip(&payloads) {
        for party in &fixture.parties {
            for _ in 0..2 {
                let coordinator = fixture.coordinator.clone();
                let contribution = fixture.contribution(ticket.fingerprint(), 0, party, tx);
                tasks.push(tokio::spawn(async move {
                    coordinator.on_contribution(contribution).await
                }));
            }
        }
    }

    let mut finished = 0;
    for task in tasks {
        if task.await.unwrap().is_finished() {
            finished += 1;
        }
    }
    assert_eq!(finished, sessions);

    let mut responses = Vec::new();
    for ticket in tickets {
        responses.push(ticket.wait().await);
    }
    assert!(responses.iter().all(SigningResponse::is_success));

    let published: Vec<SigningResponse> =
        fixture.transport.messages(SIGNING_RESULT_TOPIC).unwrap();
    assert_eq!(published.len(), sessions);

    let distinct: HashSet<_> = published.iter().map(|r| r.tx_id.clone()).collect();
    assert_eq!(distinct.len(), sessions);
    assert_eq!(
        fixture.transport.message_count(SIGNING_RESULT_ERROR_TOPIC),
        0
    );
}

/// INVARIANT: a completed signature always has the scheme's fixed length
#[tokio::test]
async fn invariant_signature_length_matches_key_type() {
    for key_type in [KeyType::EcdsaSecp256k1, KeyType::EddsaEd25519] {
        let fixture = Fixture::new(key_type, 4, 3, fast_config());
        let signers = fixture.spawn_signers(fixture.parties.clone());

        for i in 0..4 {
            let response = fixture
                .coordinator
                .sign(fixture.request(&format!("tx-{i}"), &tx_payload()))
                .await;
            assert!(response.is_success());
            assert_eq!(response.signature.len(), key_type.signature_len());
        }

        signers.abort();
    }
}

/// INVARIANT: a session never completes with fewer than threshold agreeing parties
#[tokio::test]
async fn invariant_no_completion_below_threshold() {
    let fixture = Fixture::new(KeyType::EddsaEd25519, 5, 4, fast_config());
    let tx = tx_payload();
    let request = fixture.request("tx-1", &tx);
    let fingerprint = request.fingerprint();
    let _ticket = fixture.coordinator.submit(request).await.unwrap();

    for party in &fixture.parties[..3] {
        let step = fixture
            .coordinator
            .on_contribution(fixture.contribution(fingerprint, 0, party, &tx))
            .await;
        assert!(!step.is_finished());
    }

    assert_eq!(fixture.coordinator.live_sessions(), 1);
    assert_eq!(fixture.transport.message_count(SIGNING_RESULT_TOPIC), 0);
}
