//! Default configuration values shared by the harness, CLI and tests

/// Prefix applied to every generated resource name so leftovers can be swept
pub const DEFAULT_NAME_PREFIX: &str = "compute-smoke";

/// Fixed interval between status polls, in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Timeout for a server to reach a requested status (e.g. ACTIVE), in seconds
pub const DEFAULT_STATUS_TIMEOUT_SECS: u64 = 300;

/// Timeout for a server to disappear after deletion, in seconds
pub const DEFAULT_TERMINATION_TIMEOUT_SECS: u64 = 300;

/// Timeout for a deleted security group to vanish from listings, in seconds
pub const DEFAULT_DELETION_TIMEOUT_SECS: u64 = 60;

/// Per-request HTTP timeout, in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Image reference used when the harness boots a server
pub const DEFAULT_IMAGE_REF: &str = "cirros";

/// Flavor reference used when the harness boots a server
pub const DEFAULT_FLAVOR_REF: &str = "1";

