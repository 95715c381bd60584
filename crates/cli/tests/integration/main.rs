//! CLI integration tests that build real project trees.

mod build_tests;
mod common;
mod gc_tests;
