//! Constants shared across the pipeline.

/// Application name used in lock metadata and log output.
pub const APP_NAME: &str = "spabuild";

/// Default project configuration file name, looked up in the project directory.
pub const CONFIG_FILENAME: &str = "spabuild.toml";

/// Number of hex characters of the content hash embedded in artifact names.
pub const CONTENT_HASH_LEN: usize = 20;

/// Output subdirectory for script artifacts.
pub const SCRIPTS_DIR: &str = "scripts";

/// Output subdirectory for style artifacts.
pub const STYLES_DIR: &str = "styles";

/// File name of the generated document shell inside the output root.
pub const DOCUMENT_FILENAME: &str = "index.html";

/// Build manifest written next to the artifacts, consumed by `gc`.
pub const MANIFEST_FILENAME: &str = ".spabuild-manifest.json";

/// Lock file guarding concurrent writes to one output root.
pub const LOCK_FILENAME: &str = ".spabuild.lock";

/// Directory name marking the external-dependency boundary.
pub const NODE_MODULES: &str = "node_modules";

/// Name of the module loader function in emitted bundles.
pub const BUNDLE_REQUIRE: &str = "__bundle_require__";
