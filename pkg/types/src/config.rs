use serde::{Deserialize, Serialize};

/// How eligible ports are chosen on a resource.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyKind {
    /// Every TCP port listed in the configured proxy ports.
    #[default]
    AllowList,
    /// The first TCP port that is not a reserved secure port.
    FirstEligible,
}

impl std::str::FromStr for PolicyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "allow-list" => Ok(PolicyKind::AllowList),
            "first-eligible" => Ok(PolicyKind::FirstEligible),
            other => Err(format!(
                "unknown port policy '{}' (expected allow-list or first-eligible)",
                other
            )),
        }
    }
}

impl std::fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PolicyKind::AllowList => write!(f, "allow-list"),
            PolicyKind::FirstEligible => write!(f, "first-eligible"),
        }
    }
}

/// How a deleted resource's records are located in the store.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum DeleteStrategy {
    /// Delete the keys computed from the deleted resource.
    #[default]
    Direct,
    /// List backends/frontends and delete every entry owned by the resource.
    PrefixScan,
}

impl std::str::FromStr for DeleteStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct" => Ok(DeleteStrategy::Direct),
            "prefix-scan" => Ok(DeleteStrategy::PrefixScan),
            other => Err(format!(
                "unknown delete strategy '{}' (expected direct or prefix-scan)",
                other
            )),
        }
    }
}

impl std::fmt::Display for DeleteStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeleteStrategy::Direct => write!(f, "direct"),
            DeleteStrategy::PrefixScan => write!(f, "prefix-scan"),
        }
    }
}

/// Bridge configuration file (YAML).
///
/// Example `config.yaml`:
/// ```yaml
/// master: 10.0.0.1:8080
/// etcd: http://10.0.0.2:2379,http://10.0.0.3:2379
/// ports: "8000,8080"
/// policy: allow-list
/// retain-host-header: true
/// delete-strategy: direct
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfigFile {
    #[serde(default)]
    pub master: Option<String>,
    #[serde(default)]
    pub etcd: Option<String>,
    #[serde(default)]
    pub ports: Option<String>,
    #[serde(default)]
    pub policy: Option<PolicyKind>,
    #[serde(default, alias = "retain-host-header")]
    pub retain_host_header: Option<bool>,
    #[serde(default, alias = "delete-strategy")]
    pub delete_strategy: Option<DeleteStrategy>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default, alias = "reconnect-delay-secs")]
    pub reconnect_delay_secs: Option<u64>,
}

/// Load a YAML config file, returning the default if the file doesn't exist.
pub fn load_config_file<T: serde::de::DeserializeOwned + Default>(path: &str) -> anyhow::Result<T> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(T::default());
        }
        Err(e) => return Err(anyhow::anyhow!("Failed to read config {}: {}", path, e)),
    };
    let config: T = serde_yaml::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Failed to parse config {}: {}", path, e))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_yaml_with_kebab_case_keys() {
        let yaml = r#"
master: 10.0.0.1:8080
etcd: http://10.0.0.2:2379
ports: "8000,8080"
policy: first-eligible
retain-host-header: true
delete-strategy: prefix-scan
"#;
        let cfg: BridgeConfigFile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.master.as_deref(), Some("10.0.0.1:8080"));
        assert_eq!(cfg.ports.as_deref(), Some("8000,8080"));
        assert_eq!(cfg.policy, Some(PolicyKind::FirstEligible));
        assert_eq!(cfg.retain_host_header, Some(true));
        assert_eq!(cfg.delete_strategy, Some(DeleteStrategy::PrefixScan));
        assert!(cfg.token.is_none());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let cfg: BridgeConfigFile =
            load_config_file("/nonexistent/kube2vulcan/config.yaml").unwrap();
        assert!(cfg.master.is_none());
        assert!(cfg.policy.is_none());
    }

    #[test]
    fn enum_flags_round_trip_through_strings() {
        assert_eq!("allow-list".parse::<PolicyKind>(), Ok(PolicyKind::AllowList));
        assert!("newest".parse::<PolicyKind>().is_err());
        assert_eq!(DeleteStrategy::PrefixScan.to_string(), "prefix-scan");
        assert_eq!("direct".parse::<DeleteStrategy>(), Ok(DeleteStrategy::Direct));
    }
}
