//! Filesystem path constants.

/// Default config file path for the bridge daemon.
pub const DEFAULT_CONFIG: &str = "/etc/kube2vulcan/config.yaml";
