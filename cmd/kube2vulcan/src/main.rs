use clap::Parser;
use pkg_constants::network::DEFAULT_PROXY_PORTS;
use pkg_constants::paths::DEFAULT_CONFIG;
use pkg_constants::watch::RECONNECT_DELAY_SECS;
use pkg_controllers::policy::PortPolicy;
use pkg_controllers::registrar::Registrar;
use pkg_controllers::stream::{WebSocketConnector, websocket_base};
use pkg_controllers::supervisor::WatchSupervisor;
use pkg_state::EtcdStore;
use pkg_types::config::{BridgeConfigFile, DeleteStrategy, PolicyKind, load_config_file};
use pkg_types::validate::parse_port_list;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "kube2vulcan",
    about = "Mirror cluster pods and services into vulcand's etcd configuration"
)]
struct Cli {
    /// Path to YAML config file
    #[arg(long, short, default_value = DEFAULT_CONFIG)]
    config: String,

    /// Address of the cluster API server ([host]:[port])
    #[arg(long)]
    master: Option<String>,

    /// Comma-separated etcd endpoints used by vulcand (http://[ip]:[port],...)
    #[arg(long)]
    etcd: Option<String>,

    /// Comma-separated ports to proxy (default 8000)
    #[arg(long)]
    ports: Option<String>,

    /// Port selection policy: allow-list or first-eligible
    #[arg(long)]
    policy: Option<PolicyKind>,

    /// Pass the client's Host header through to backends (`--retain-host-header=false` overrides the file)
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    retain_host_header: Option<bool>,

    /// How deleted resources are cleaned up: direct or prefix-scan
    #[arg(long)]
    delete_strategy: Option<DeleteStrategy>,

    /// Bearer token for the API server watch handshake
    #[arg(long)]
    token: Option<String>,

    /// Seconds to wait before reopening a failed watch stream
    #[arg(long)]
    reconnect_delay_secs: Option<u64>,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn resolve_retain_host_header(cli: &Cli, file_cfg: &BridgeConfigFile) -> bool {
    cli.retain_host_header
        .or(file_cfg.retain_host_header)
        .unwrap_or(false)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    // Load config file (returns defaults if file not found)
    let file_cfg: BridgeConfigFile = load_config_file(&cli.config)?;
    info!("Config file: {}", cli.config);

    // Merge: CLI args > config file > defaults
    let retain_host_header = resolve_retain_host_header(&cli, &file_cfg);
    let (master, etcd) = match (cli.master.or(file_cfg.master), cli.etcd.or(file_cfg.etcd)) {
        (Some(master), Some(etcd)) => (master, etcd),
        _ => {
            return Err(anyhow::anyhow!(
                "Missing required properties. Usage: --master \"[k8s-master-ip]:[port]\" \
                 --etcd \"http://[etcd-ip]:[port],http://[2nd-etcd-ip]:[port],...\" --ports \"8000,8080\""
            ));
        }
    };
    let ports = match cli.ports.or(file_cfg.ports) {
        Some(raw) => parse_port_list(&raw)?,
        None => DEFAULT_PROXY_PORTS.to_vec(),
    };
    let policy_kind = cli.policy.or(file_cfg.policy).unwrap_or_default();
    let delete_strategy = cli
        .delete_strategy
        .or(file_cfg.delete_strategy)
        .unwrap_or_default();
    let token = cli.token.or(file_cfg.token);
    let reconnect_delay = Duration::from_secs(
        cli.reconnect_delay_secs
            .or(file_cfg.reconnect_delay_secs)
            .unwrap_or(RECONNECT_DELAY_SECS),
    );

    if policy_kind == PolicyKind::AllowList && ports.is_empty() {
        return Err(anyhow::anyhow!("allow-list policy needs at least one port"));
    }
    let base_url = websocket_base(&master)?;
    let policy = PortPolicy::from_config(policy_kind, &ports);

    info!("Starting kube2vulcan");
    info!("  Master:           {}", base_url);
    info!("  etcd:             {}", etcd);
    info!("  Policy:           {}", policy);
    info!("  Retain host:      {}", retain_host_header);
    info!("  Delete strategy:  {}", delete_strategy);

    let store = Arc::new(EtcdStore::new(&etcd)?);
    let registrar = Arc::new(Registrar::new(
        store,
        policy,
        retain_host_header,
        delete_strategy,
    ));
    registrar.sync_listeners(&ports).await;

    let supervisor = WatchSupervisor::new(WebSocketConnector::new(token), registrar, base_url)
        .with_reconnect_delay(reconnect_delay);

    tokio::select! {
        result = supervisor.run() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down kube2vulcan");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_with(retain: Option<bool>) -> BridgeConfigFile {
        BridgeConfigFile {
            retain_host_header: retain,
            ..Default::default()
        }
    }

    #[test]
    fn test_retain_host_header_cli_overrides_file() {
        let cli = Cli::try_parse_from(["kube2vulcan", "--retain-host-header=false"]).unwrap();
        assert!(!resolve_retain_host_header(&cli, &file_with(Some(true))));

        let cli = Cli::try_parse_from(["kube2vulcan", "--retain-host-header"]).unwrap();
        assert!(resolve_retain_host_header(&cli, &file_with(Some(false))));
    }

    #[test]
    fn test_retain_host_header_falls_back_to_file_then_default() {
        let cli = Cli::try_parse_from(["kube2vulcan"]).unwrap();
        assert_eq!(cli.retain_host_header, None);
        assert!(resolve_retain_host_header(&cli, &file_with(Some(true))));
        assert!(!resolve_retain_host_header(&cli, &file_with(None)));
    }
}
