use pkg_constants::network::RESERVED_SECURE_PORTS;
use pkg_types::config::PolicyKind;
use pkg_types::endpoint::IdentifierScheme;
use pkg_types::snapshot::DeclaredPort;

/// Decides which declared ports of a resource are proxied.
/// Non-TCP ports are never eligible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortPolicy {
    /// Every TCP port whose number is in the list.
    AllowList(Vec<u16>),
    /// The first TCP port, in declaration order, outside the reserved secure ports.
    FirstEligible,
}

impl PortPolicy {
    pub fn from_config(kind: PolicyKind, ports: &[u16]) -> Self {
        match kind {
            PolicyKind::AllowList => PortPolicy::AllowList(ports.to_vec()),
            PolicyKind::FirstEligible => PortPolicy::FirstEligible,
        }
    }

    /// Identifier scheme that keeps the selected ports' records apart.
    pub fn scheme(&self) -> IdentifierScheme {
        match self {
            PortPolicy::AllowList(_) => IdentifierScheme::PerPort,
            PortPolicy::FirstEligible => IdentifierScheme::PerResource,
        }
    }

    /// Eligible port numbers, in declaration order, without duplicates.
    pub fn select(&self, declared: &[DeclaredPort]) -> Vec<u16> {
        let tcp = declared.iter().filter(|p| p.protocol.is_tcp());
        match self {
            PortPolicy::AllowList(allowed) => {
                let mut selected = Vec::new();
                for p in tcp {
                    if allowed.contains(&p.port) && !selected.contains(&p.port) {
                        selected.push(p.port);
                    }
                }
                selected
            }
            PortPolicy::FirstEligible => tcp
                .map(|p| p.port)
                .find(|port| !RESERVED_SECURE_PORTS.contains(port))
                .into_iter()
                .collect(),
        }
    }
}

impl std::fmt::Display for PortPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortPolicy::AllowList(ports) => {
                let ports: Vec<String> = ports.iter().map(|p| p.to_string()).collect();
                write!(f, "allow-list [{}]", ports.join(","))
            }
            PortPolicy::FirstEligible => write!(f, "first-eligible"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkg_types::meta::Protocol;

    fn tcp(port: u16) -> DeclaredPort {
        DeclaredPort {
            port,
            protocol: Protocol::Tcp,
        }
    }

    fn udp(port: u16) -> DeclaredPort {
        DeclaredPort {
            port,
            protocol: Protocol::Udp,
        }
    }

    #[test]
    fn allow_list_selects_every_listed_tcp_port() {
        let policy = PortPolicy::AllowList(vec![8000, 8080]);
        let declared = [tcp(8080), udp(8000), tcp(9090), tcp(8000), tcp(8080)];
        assert_eq!(policy.select(&declared), vec![8080, 8000]);
        assert_eq!(policy.scheme(), IdentifierScheme::PerPort);
    }

    #[test]
    fn allow_list_without_match_is_empty() {
        let policy = PortPolicy::AllowList(vec![8000]);
        assert!(policy.select(&[tcp(80), udp(8000)]).is_empty());
        assert!(policy.select(&[]).is_empty());
    }

    #[test]
    fn first_eligible_skips_secure_and_non_tcp_ports() {
        let policy = PortPolicy::FirstEligible;
        let declared = [udp(53), tcp(443), tcp(8443), tcp(8080), tcp(9090)];
        assert_eq!(policy.select(&declared), vec![8080]);
        assert_eq!(policy.scheme(), IdentifierScheme::PerResource);
    }

    #[test]
    fn first_eligible_with_only_secure_ports_is_empty() {
        let policy = PortPolicy::FirstEligible;
        assert!(policy.select(&[udp(53), tcp(443)]).is_empty());
    }

    #[test]
    fn from_config_keeps_port_list_for_allow_list() {
        assert_eq!(
            PortPolicy::from_config(PolicyKind::AllowList, &[8000]),
            PortPolicy::AllowList(vec![8000])
        );
        assert_eq!(
            PortPolicy::from_config(PolicyKind::FirstEligible, &[8000]),
            PortPolicy::FirstEligible
        );
        assert_eq!(
            PortPolicy::AllowList(vec![8000, 8080]).to_string(),
            "allow-list [8000,8080]"
        );
    }
}
