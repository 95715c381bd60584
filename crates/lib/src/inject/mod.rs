//! Source injection passes that run before transforms: environment constants and implicit
//! global imports.

pub mod env;
pub mod globals;

pub use env::EnvironmentSet;
pub use globals::{ProvideTable, SyntheticImport};
