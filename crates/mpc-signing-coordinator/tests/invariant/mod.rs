//! Invariant tests module
//!
//! This module contains tests that verify critical invariants:
//! - At most one live session per fingerprint
//! - Exactly one published outcome per session
//! - Every waiter observes the same outcome

pub mod outcome_invariant;
