use pkg_constants::watch::{HEADLESS_CLUSTER_IP, PODS_WATCH_PATH, SERVICES_WATCH_PATH};
use serde::{Deserialize, Serialize};

use crate::meta::Protocol;
use crate::pod::{Pod, PodPhase};
use crate::service::Service;

/// The orchestrator collections the bridge subscribes to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Pod,
    Service,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 2] = [ResourceKind::Pod, ResourceKind::Service];

    /// Path + query of the cluster-wide watch endpoint for this collection.
    pub fn watch_path(&self) -> &'static str {
        match self {
            ResourceKind::Pod => PODS_WATCH_PATH,
            ResourceKind::Service => SERVICES_WATCH_PATH,
        }
    }

    /// Singular noun for log lines.
    pub fn noun(&self) -> &'static str {
        match self {
            ResourceKind::Pod => "pod",
            ResourceKind::Service => "service",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Pod => write!(f, "pods"),
            ResourceKind::Service => write!(f, "services"),
        }
    }
}

/// A port as declared on the resource, in declaration order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeclaredPort {
    pub port: u16,
    pub protocol: Protocol,
}

/// Minimal read-only view of a pod or service, as seen in one watch event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceSnapshot {
    pub kind: ResourceKind,
    pub name: String,
    pub namespace: String,
    /// Pods only.
    pub phase: Option<PodPhase>,
    /// Pod IP or service cluster IP.
    pub address: Option<String>,
    pub ports: Vec<DeclaredPort>,
}

impl ResourceSnapshot {
    /// Whether the resource currently has a routable address.
    /// Pods must be `Running` with an IP; services need a non-headless cluster IP.
    pub fn is_routable(&self) -> bool {
        let has_address = match self.address.as_deref() {
            Some(addr) => !addr.is_empty() && addr != HEADLESS_CLUSTER_IP,
            None => false,
        };
        match self.kind {
            ResourceKind::Pod => {
                has_address && self.phase == Some(PodPhase::Running)
            }
            ResourceKind::Service => has_address,
        }
    }
}

impl From<Pod> for ResourceSnapshot {
    fn from(pod: Pod) -> Self {
        let ports = pod
            .spec
            .containers
            .iter()
            .flat_map(|c| c.ports.iter())
            .map(|p| DeclaredPort {
                port: p.container_port,
                protocol: p.protocol,
            })
            .collect();
        Self {
            kind: ResourceKind::Pod,
            name: pod.metadata.name,
            namespace: pod.metadata.namespace,
            phase: Some(pod.status.phase),
            address: pod.status.pod_ip,
            ports,
        }
    }
}

impl From<Service> for ResourceSnapshot {
    fn from(svc: Service) -> Self {
        let ports = svc
            .spec
            .ports
            .iter()
            .map(|p| DeclaredPort {
                port: p.port,
                protocol: p.protocol,
            })
            .collect();
        Self {
            kind: ResourceKind::Service,
            name: svc.metadata.name,
            namespace: svc.metadata.namespace,
            phase: None,
            address: svc.spec.cluster_ip,
            ports,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pod_snapshot(phase: PodPhase, ip: Option<&str>) -> ResourceSnapshot {
        ResourceSnapshot {
            kind: ResourceKind::Pod,
            name: "web".to_string(),
            namespace: "default".to_string(),
            phase: Some(phase),
            address: ip.map(str::to_string),
            ports: vec![],
        }
    }

    #[test]
    fn pod_routable_only_when_running_with_ip() {
        assert!(pod_snapshot(PodPhase::Running, Some("10.0.0.1")).is_routable());
        assert!(!pod_snapshot(PodPhase::Pending, Some("10.0.0.1")).is_routable());
        assert!(!pod_snapshot(PodPhase::Running, None).is_routable());
        assert!(!pod_snapshot(PodPhase::Running, Some("")).is_routable());
    }

    #[test]
    fn headless_service_is_not_routable() {
        let svc: Service = serde_json::from_str(
            r#"{"metadata": {"name": "db", "namespace": "data"},
                "spec": {"clusterIP": "None", "ports": [{"port": 5432}]}}"#,
        )
        .unwrap();
        let snapshot = ResourceSnapshot::from(svc);
        assert_eq!(snapshot.kind, ResourceKind::Service);
        assert_eq!(snapshot.ports[0].port, 5432);
        assert!(!snapshot.is_routable());
    }

    #[test]
    fn pod_ports_flatten_in_declaration_order() {
        let pod: Pod = serde_json::from_str(
            r#"{"metadata": {"name": "multi", "namespace": "ns"},
                "spec": {"containers": [
                    {"name": "a", "ports": [{"containerPort": 443}]},
                    {"name": "b", "ports": [{"containerPort": 8080}, {"containerPort": 9090}]}
                ]}}"#,
        )
        .unwrap();
        let snapshot = ResourceSnapshot::from(pod);
        let ports: Vec<u16> = snapshot.ports.iter().map(|p| p.port).collect();
        assert_eq!(ports, vec![443, 8080, 9090]);
    }
}
