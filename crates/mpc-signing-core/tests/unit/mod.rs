//! Unit tests module

pub mod codec_test;
