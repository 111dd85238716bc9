use anyhow::Result;
use pkg_constants::network::LISTENER_BIND_ADDR;
use pkg_constants::state::{BACKEND_SERVER_NAME, BACKENDS_ROOT, FRONTENDS_ROOT, LISTENERS_ROOT};
use pkg_types::endpoint::{Endpoint, Identifier, IdentifierScheme};
use serde::Serialize;

// --- vulcand value formats ---

#[derive(Serialize)]
struct BackendValue {
    #[serde(rename = "Type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ServerValue {
    #[serde(rename = "URL")]
    url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct FrontendSettings {
    pass_host_header: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct FrontendValue {
    #[serde(rename = "Type")]
    kind: &'static str,
    backend_id: String,
    route: String,
    settings: FrontendSettings,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ListenerAddress {
    network: &'static str,
    address: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ListenerValue {
    protocol: &'static str,
    address: ListenerAddress,
}

/// One key/value pair destined for the config store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordEntry {
    pub key: String,
    pub value: String,
}

/// The backend, backend-server and frontend entries of one endpoint.
/// All three keys embed the same identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigRecord {
    pub id: Identifier,
    pub backend: RecordEntry,
    pub server: RecordEntry,
    pub frontend: RecordEntry,
}

impl ConfigRecord {
    /// Entries in write order: backend before the frontend that references it.
    pub fn entries(&self) -> [&RecordEntry; 3] {
        [&self.backend, &self.server, &self.frontend]
    }
}

/// Directory holding every backend entry of `id`.
pub fn backend_dir(id: &Identifier) -> String {
    format!("{}/{}", BACKENDS_ROOT, id)
}

/// Directory holding the frontend entry of `id`.
pub fn frontend_dir(id: &Identifier) -> String {
    format!("{}/{}", FRONTENDS_ROOT, id)
}

/// Converts endpoints into vulcand configuration entries.
#[derive(Debug, Clone)]
pub struct ConfigTranslator {
    scheme: IdentifierScheme,
    pass_host_header: bool,
}

impl ConfigTranslator {
    pub fn new(scheme: IdentifierScheme, pass_host_header: bool) -> Self {
        Self {
            scheme,
            pass_host_header,
        }
    }

    pub fn scheme(&self) -> IdentifierScheme {
        self.scheme
    }

    /// Route matching `<name>.<namespace>.*`, pinned to the port under the per-port scheme.
    pub fn route_rule(&self, endpoint: &Endpoint) -> String {
        let host = format!("HostRegexp(`{}.{}.*`)", endpoint.name, endpoint.namespace);
        match self.scheme {
            IdentifierScheme::PerPort => format!("{} && Port(`{}`)", host, endpoint.port),
            IdentifierScheme::PerResource => host,
        }
    }

    pub fn to_record(&self, endpoint: &Endpoint) -> Result<ConfigRecord> {
        let id = Identifier::for_endpoint(endpoint, self.scheme)?;

        let backend = RecordEntry {
            key: format!("{}/backend", backend_dir(&id)),
            value: serde_json::to_string(&BackendValue { kind: "http" })?,
        };
        let server = RecordEntry {
            key: format!("{}/servers/{}", backend_dir(&id), BACKEND_SERVER_NAME),
            value: serde_json::to_string(&ServerValue {
                url: format!("http://{}:{}", endpoint.address, endpoint.port),
            })?,
        };
        let frontend = RecordEntry {
            key: format!("{}/frontend", frontend_dir(&id)),
            value: serde_json::to_string(&FrontendValue {
                kind: "http",
                backend_id: id.to_string(),
                route: self.route_rule(endpoint),
                settings: FrontendSettings {
                    pass_host_header: self.pass_host_header,
                },
            })?,
        };

        Ok(ConfigRecord {
            id,
            backend,
            server,
            frontend,
        })
    }
}

/// Listener entry that makes vulcand accept HTTP on `port`.
pub fn listener_entry(port: u16) -> Result<RecordEntry> {
    Ok(RecordEntry {
        key: format!("{}/{}", LISTENERS_ROOT, port),
        value: serde_json::to_string(&ListenerValue {
            protocol: "http",
            address: ListenerAddress {
                network: "tcp",
                address: format!("{}:{}", LISTENER_BIND_ADDR, port),
            },
        })?,
    })
}
