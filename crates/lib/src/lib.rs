//! spabuild-lib: build pipeline and dev server for single-page applications
//!
//! A build turns a set of named entries into content-addressed artifacts and a document shell:
//! - `graph`: module discovery, resolution and dependency ordering
//! - `transform`: per-kind module transforms (scripts, JSX, stylesheets, markup)
//! - `inject`: build-time environment substitution and provided globals
//! - `emit`: linking modules into per-entry script and style artifacts
//! - `optimize`: minification of the emitted artifacts
//! - `sourcemap`: inline source maps for script artifacts
//! - `serve`: the development server with proxying and rebuild-on-change

pub mod config;
pub mod consts;
pub mod emit;
pub mod gc;
pub mod graph;
pub mod inject;
pub mod lock;
pub mod optimize;
pub mod paths;
pub mod pipeline;
pub mod script;
pub mod serve;
pub mod sourcemap;
pub mod transform;
pub mod util;
