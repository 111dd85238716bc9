use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::meta::Status;
use crate::pod::Pod;
use crate::service::Service;
use crate::snapshot::{ResourceKind, ResourceSnapshot};

/// Change reported by the orchestrator for one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Added,
    Modified,
    Deleted,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionKind::Added => write!(f, "ADDED"),
            ActionKind::Modified => write!(f, "MODIFIED"),
            ActionKind::Deleted => write!(f, "DELETED"),
        }
    }
}

/// One decoded watch notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub action: ActionKind,
    pub snapshot: ResourceSnapshot,
}

/// Outer envelope of a watch message: `{"type": ..., "object": ...}`.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default, rename = "type")]
    event_type: Option<String>,
    #[serde(default)]
    object: Option<serde_json::Value>,
}

/// Decode a raw watch message from the `kind` subscription.
///
/// Returns `Ok(None)` for envelopes whose type is absent or not one of
/// `ADDED`/`MODIFIED`/`DELETED`; those are tolerated and dropped.
pub fn decode(kind: ResourceKind, raw: &[u8]) -> Result<Option<WatchEvent>> {
    let envelope: Envelope =
        serde_json::from_slice(raw).context("malformed watch envelope")?;

    let action = match envelope.event_type.as_deref() {
        Some("ADDED") => ActionKind::Added,
        Some("MODIFIED") => ActionKind::Modified,
        Some("DELETED") => ActionKind::Deleted,
        Some("ERROR") => {
            let status: Status = envelope
                .object
                .and_then(|o| serde_json::from_value(o).ok())
                .unwrap_or_default();
            warn!("Orchestrator reported an error on the {} watch: {}", kind, status);
            return Ok(None);
        }
        other => {
            debug!("Ignoring {} watch event of type {:?}", kind, other);
            return Ok(None);
        }
    };

    let object = envelope
        .object
        .ok_or_else(|| anyhow!("{} watch event has no object", action))?;

    let snapshot = match kind {
        ResourceKind::Pod => {
            let pod: Pod = serde_json::from_value(object).context("malformed pod object")?;
            ResourceSnapshot::from(pod)
        }
        ResourceKind::Service => {
            let svc: Service =
                serde_json::from_value(object).context("malformed service object")?;
            ResourceSnapshot::from(svc)
        }
    };

    Ok(Some(WatchEvent { action, snapshot }))
}
