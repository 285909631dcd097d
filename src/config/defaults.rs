/// Configuration default values
///
/// Defaults for command line options and the connection file, kept in one
/// place so the CLI, the config structs and the pipeline agree.
// Command line defaults
pub const DEFAULT_CONFIG_FILE: &str = "config.json";
pub const DEFAULT_ENVIRONMENT: &str = "local";
pub const DEFAULT_INDEX: &str = "test";
pub const DEFAULT_DOC_TYPE: &str = "doc";

// Pipeline defaults
pub const DEFAULT_CHUNK_SIZE: usize = 50;
pub const DEFAULT_STRICT_COERCION: bool = true;
pub const DEFAULT_REQUIRE_TRANSFORM_UNIT: bool = true;
pub const DEFAULT_ISOLATE_TRANSFORM_ERRORS: bool = false;

// Connection defaults
pub const DEFAULT_REQUEST_TIMEOUT: &str = "30s";
pub const DEFAULT_VERIFY_CERTS: bool = true;

/// Prefix for environment variable overrides of the connection file
pub const ENV_PREFIX: &str = "ES_LOADER_";
