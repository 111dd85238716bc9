//! Orchestrator watch stream constants.

/// Delay before a failed watch stream is reopened, in seconds.
pub const RECONNECT_DELAY_SECS: u64 = 5;

/// Path of the cluster-wide pod watch endpoint.
pub const PODS_WATCH_PATH: &str = "/api/v1/pods?watch=true";

/// Path of the cluster-wide service watch endpoint.
pub const SERVICES_WATCH_PATH: &str = "/api/v1/services?watch=true";

/// Cluster IP value the orchestrator uses for headless services.
pub const HEADLESS_CLUSTER_IP: &str = "None";
