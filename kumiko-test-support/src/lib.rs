//! Shared test utilities used across kumiko crates.

pub mod events;
pub mod proptest_profile;
