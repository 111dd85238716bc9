//! Configuration store (vulcand in etcd) constants.

/// Root of all vulcand backend definitions.
pub const BACKENDS_ROOT: &str = "/vulcand/backends";

/// Root of all vulcand frontend (route) definitions.
pub const FRONTENDS_ROOT: &str = "/vulcand/frontends";

/// Root of all vulcand listener definitions.
pub const LISTENERS_ROOT: &str = "/vulcand/listeners";

/// Name of the single upstream server written under each backend.
pub const BACKEND_SERVER_NAME: &str = "svc";

/// Path prefix of the etcd v2 keys API.
pub const ETCD_KEYS_PREFIX: &str = "/v2/keys";

/// etcd v2 error code for a missing key.
pub const ETCD_KEY_NOT_FOUND: u64 = 100;

/// Per-request timeout for store operations, in milliseconds.
pub const STORE_REQUEST_TIMEOUT_MS: u64 = 1000;
