/// Application name
pub const APP_NAME: &str = "depot";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Sentinel reported by size queries when any contributing size is unknown
pub const UNKNOWN_SIZE: i64 = -1;

/// Per-site metadata directory name
pub const METADATA_DIR_NAME: &str = ".depot";

/// Installed feature directory, relative to a site root
pub const FEATURES_DIR: &str = "features";

/// Installed plugin directory, relative to a site root
pub const PLUGINS_DIR: &str = "plugins";

/// Non-plugin data directory, relative to a site root
pub const DATA_DIR: &str = "data";

/// In-site staging directory used by consumers before commit
pub const STAGING_DIR: &str = ".staging";

/// Site model file inside the metadata directory
pub const SITE_FILE_NAME: &str = "site.json";

/// Configuration history file inside the metadata directory
pub const HISTORY_FILE_NAME: &str = "history.json";

/// Archive extension for packed features and plugins
pub const ARCHIVE_EXTENSION: &str = "jar";

/// Default number of configurations kept in a site history
pub const DEFAULT_HISTORY_SIZE: usize = 50;

/// Default HTTP timeout, in seconds
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Prefix for cached downloads whose remote name cannot be determined
pub const DEFAULT_CACHE_PREFIX: &str = "depot_update_tmp_";
