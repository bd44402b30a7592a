//! Various caprov-wide constants.


//------------ Version -------------------------------------------------------

/// The version of this crate, used in the HTTP user agent.
pub const CAPROV_VERSION: &str = env!("CARGO_PKG_VERSION");


//------------ Config Files Paths -------------------------------------------

/// The default path to the caprov config file.
pub const CAPROV_DEFAULT_CONFIG_FILE: &str = "./caprov.conf";


//------------ Environment Variables ----------------------------------------

/// The environment variable with the path to the config file.
pub const CAPROV_ENV_CONFIG: &str = "CAPROV_CONFIG";

/// The environment variable with the log level.
///
/// The variable should contain the name of a [`log::LevelFilter`]. It will
/// be overwritten by the config file. The default is “info.”
pub const CAPROV_ENV_LOG_LEVEL: &str = "CAPROV_LOG_LEVEL";


//------------ Timeouts -----------------------------------------------------

/// Default timeout for a single administrative API call.
pub const API_TIMEOUT_SECS: u64 = 30;

/// Default time budget for retrying the initial login.
///
/// The freshly installed service usually needs a while before it accepts
/// connections.
pub const API_LOGIN_RETRY_SECS: u64 = 120;

/// Default timeout for downloading the installer artifact.
pub const DOWNLOAD_TIMEOUT_SECS: u64 = 120;

/// Default timeout for running an installer program.
pub const INSTALLER_TIMEOUT_SECS: u64 = 1800;

/// First wait between login attempts.
pub const LOGIN_RETRY_INITIAL_MS: u64 = 500;

/// Growth factor between login attempts.
pub const LOGIN_RETRY_MULTIPLIER: f64 = 2.0;

/// Upper bound for the wait between login attempts.
pub const LOGIN_RETRY_MAX_INTERVAL_SECS: u64 = 10;


//------------ Trust Store --------------------------------------------------

/// The file name prefix for certificates copied into an anchor directory.
pub const ANCHOR_FILE_PREFIX: &str = "caprov";

/// The default anchor directory on Debian-like systems.
pub const DEFAULT_ANCHORS_DIR: &str = "/usr/local/share/ca-certificates";

/// The default directory for intermediate CA certificates.
///
/// Kept outside the anchor directory, so intermediates never become roots.
pub const DEFAULT_INTERMEDIATES_DIR: &str = "/usr/local/share/caprov/intermediates";

/// The default command refreshing the system trust store.
pub const DEFAULT_ANCHORS_REFRESH: &str = "update-ca-certificates";
