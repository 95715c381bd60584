//! Shared utilities.
//!
//! Common utilities used across the crate: hashing and source splicing.

pub mod hash;
pub mod splice;

#[cfg(test)]
pub mod testutil;
