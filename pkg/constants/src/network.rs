//! Network-related constants.

/// Default port list proxied by vulcand when none is configured.
pub const DEFAULT_PROXY_PORTS: &[u16] = &[8000];

/// Ports reserved for secure transport. The first-eligible policy never picks these.
pub const RESERVED_SECURE_PORTS: &[u16] = &[443, 8443];

/// Bind address used for extra vulcand listeners.
pub const LISTENER_BIND_ADDR: &str = "0.0.0.0";
