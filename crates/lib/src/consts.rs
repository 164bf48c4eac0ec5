/// Application name, used for the binary and environment variable prefixes.
pub const APP_NAME: &str = "stagehand";

/// Pipeline manifest file looked up at the repository root.
pub const MANIFEST_FILENAME: &str = "stagehand.json";

pub const ENV_ROOT: &str = "STAGEHAND_ROOT";
pub const ENV_CONFIGURATION: &str = "STAGEHAND_CONFIGURATION";
pub const ENV_API_KEY: &str = "STAGEHAND_API_KEY";
pub const ENV_IGNORE_FAILED_SOURCES: &str = "STAGEHAND_IGNORE_FAILED_SOURCES";
pub const ENV_PARTITION: &str = "STAGEHAND_PARTITION";

/// Set by every mainstream CI provider.
pub const ENV_CI: &str = "CI";
