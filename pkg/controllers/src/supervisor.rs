use pkg_constants::watch::RECONNECT_DELAY_SECS;
use pkg_types::event::decode;
use pkg_types::snapshot::ResourceKind;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::registrar::Registrar;
use crate::stream::{StreamConnector, WatchStream, watch_url};

/// Why a watch task stopped.
#[derive(Debug)]
enum WatchExit {
    /// The stream broke after it was open; reopen after the delay.
    Failed(ResourceKind),
    /// The stream could not be opened at all.
    Fatal(ResourceKind, anyhow::Error),
}

/// Runs one watch loop per resource kind and restarts a loop whose stream fails.
///
/// States per kind: connecting → listening → failed → (delay) → connecting.
/// A failing loop never delays its sibling. Failing to open a stream is
/// fatal and ends [`WatchSupervisor::run`] with an error.
pub struct WatchSupervisor<C: StreamConnector> {
    connector: Arc<C>,
    registrar: Arc<Registrar>,
    base_url: String,
    reconnect_delay: Duration,
}

impl<C: StreamConnector> WatchSupervisor<C> {
    pub fn new(connector: C, registrar: Arc<Registrar>, base_url: String) -> Self {
        Self {
            connector: Arc::new(connector),
            registrar,
            base_url,
            reconnect_delay: Duration::from_secs(RECONNECT_DELAY_SECS),
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Run until a stream cannot be opened. Never returns `Ok`.
    pub async fn run(self) -> anyhow::Result<()> {
        info!(
            "WatchSupervisor started (base={}, reconnect={}s)",
            self.base_url,
            self.reconnect_delay.as_secs_f64()
        );
        let (tx, mut rx) = mpsc::channel(ResourceKind::ALL.len());
        for kind in ResourceKind::ALL {
            self.spawn_watch(kind, Duration::ZERO, tx.clone());
        }

        loop {
            match rx.recv().await {
                Some(WatchExit::Failed(kind)) => {
                    info!(
                        "Reconnecting {} watch in {}s...",
                        kind,
                        self.reconnect_delay.as_secs_f64()
                    );
                    self.spawn_watch(kind, self.reconnect_delay, tx.clone());
                }
                Some(WatchExit::Fatal(kind, e)) => {
                    return Err(e.context(format!("cannot open {} watch stream", kind)));
                }
                None => return Err(anyhow::anyhow!("all watch tasks exited")),
            }
        }
    }

    fn spawn_watch(
        &self,
        kind: ResourceKind,
        delay: Duration,
        tx: mpsc::Sender<WatchExit>,
    ) {
        let connector = self.connector.clone();
        let registrar = self.registrar.clone();
        let url = watch_url(&self.base_url, kind);
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let exit = watch(connector.as_ref(), &registrar, kind, &url).await;
            let _ = tx.send(exit).await;
        });
    }
}

/// Open one stream and process its messages strictly in order until it fails.
async fn watch<C: StreamConnector>(
    connector: &C,
    registrar: &Registrar,
    kind: ResourceKind,
    url: &str,
) -> WatchExit {
    let mut stream = match connector.open(url).await {
        Ok(stream) => stream,
        Err(e) => {
            error!("Can't open {} watch: {:#}", kind, e);
            return WatchExit::Fatal(kind, e);
        }
    };
    info!("Listening for {}", kind);

    loop {
        let raw = match stream.next_message().await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Error reading {} watch: {:#}", kind, e);
                return WatchExit::Failed(kind);
            }
        };
        match decode(kind, &raw) {
            Ok(Some(event)) => registrar.apply(&event).await,
            Ok(None) => {}
            Err(e) => warn!("Dropping malformed {} watch message: {:#}", kind, e),
        }
    }
}
