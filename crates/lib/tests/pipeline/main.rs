//! End-to-end tests for the build pipeline and the dev server.

mod build_tests;
mod common;
mod exec_tests;
mod serve_tests;
