use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::validate::{ID_DELIMITER, ID_ESCAPE, validate_component};

/// One proxyable target derived from a resource snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Endpoint {
    pub name: String,
    pub namespace: String,
    pub address: String,
    pub port: u16,
}

/// How identifiers are composed for a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierScheme {
    /// `<namespace>-<name>-<port>`: several ports per resource coexist.
    PerPort,
    /// `<namespace>-<name>`: one record per resource.
    PerResource,
}

/// Key that groups one endpoint's backend, server and frontend records.
///
/// `-` inside a component is written as `_`, so the composed form never
/// contains a stray delimiter and [`Identifier::parse`] reverses it exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier {
    namespace: String,
    name: String,
    port: Option<u16>,
}

impl Identifier {
    pub fn new(namespace: &str, name: &str, port: Option<u16>) -> Result<Self> {
        validate_component("namespace", namespace)?;
        validate_component("name", name)?;
        Ok(Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
            port,
        })
    }

    /// Identifier for `endpoint` under `scheme`.
    pub fn for_endpoint(endpoint: &Endpoint, scheme: IdentifierScheme) -> Result<Self> {
        let port = match scheme {
            IdentifierScheme::PerPort => Some(endpoint.port),
            IdentifierScheme::PerResource => None,
        };
        Self::new(&endpoint.namespace, &endpoint.name, port)
    }

    /// Parse a composed identifier (e.g. a key segment read back from the store).
    pub fn parse(composed: &str) -> Option<Self> {
        let parts: Vec<&str> = composed.split(ID_DELIMITER).collect();
        let (namespace, name, port) = match parts.as_slice() {
            [ns, name] => (*ns, *name, None),
            [ns, name, port] => (*ns, *name, Some(port.parse::<u16>().ok()?)),
            _ => return None,
        };
        if namespace.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self {
            namespace: unescape(namespace),
            name: unescape(name),
            port,
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Whether this identifier belongs to the resource `namespace/name`, for any port.
    pub fn belongs_to(&self, namespace: &str, name: &str) -> bool {
        self.namespace == namespace && self.name == name
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{}{}",
            escape(&self.namespace),
            ID_DELIMITER,
            escape(&self.name)
        )?;
        if let Some(port) = self.port {
            write!(f, "{}{}", ID_DELIMITER, port)?;
        }
        Ok(())
    }
}

fn escape(component: &str) -> String {
    component.replace(ID_DELIMITER, &ID_ESCAPE.to_string())
}

fn unescape(component: &str) -> String {
    component.replace(ID_ESCAPE, &ID_DELIMITER.to_string())
}
