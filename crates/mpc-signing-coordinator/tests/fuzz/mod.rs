//! Fuzz tests module
//!
//! Property-based testing using proptest for quorum collection.
