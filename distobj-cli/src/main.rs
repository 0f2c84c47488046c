use anyhow::{Context, Result};
use clap::Parser;
use distobj_core::core_object::adapters::{MemoryCacheProxy, MemoryEngine, StaticDiscovery, SyncBehavior};
use distobj_core::core_object::{gen_session_id, DeviceInfo, ObjectStore, OnlineStatus};
use distobj_core::logging::{init_logging_with_config, LogConfig, LogLevel};
use distobj_core::metrics::init_metrics;
use distobj_core::Config;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "distobj")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Set the log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long)]
    log_level: Option<String>,

    /// Enable JSON formatted logging
    #[arg(long)]
    json_logs: bool,

    /// TOML configuration file; environment variables are used when absent
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Parser, Debug)]
enum Command {
    /// Run a store against in-memory collaborators
    Demo {
        /// Number of objects to create
        #[arg(long, default_value_t = 2)]
        objects: usize,

        /// Number of simulated peer devices
        #[arg(long, default_value_t = 1)]
        peers: usize,

        /// Pulls that fail on every peer before one succeeds
        #[arg(long, default_value_t = 0)]
        fail_first: u32,
    },
    /// Print the effective configuration, or write it to a file
    Config {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print a fresh random session id
    SessionId,
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path).with_context(|| format!("loading {}", path.display())),
        None => Config::from_env().context("loading configuration from environment"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(args.config.as_ref())?;

    let mut log_config = LogConfig::from_settings(&config.logging)?;
    if let Some(level) = &args.log_level {
        log_config.level = LogLevel::parse(level).unwrap_or_else(|| {
            eprintln!("Invalid log level '{}', using 'info'", level);
            LogLevel::Info
        });
    }
    if args.json_logs {
        log_config = log_config.json_format(true);
    }
    init_logging_with_config(log_config)?;

    if config.metrics.enabled {
        init_metrics();
    }

    match args.command {
        Some(Command::Demo {
            objects,
            peers,
            fail_first,
        }) => run_demo(config, objects, peers, fail_first).await?,
        Some(Command::Config { output: Some(path) }) => {
            config.save_to_file(&path)?;
            info!(path = %path.display(), "configuration written");
        }
        Some(Command::Config { output: None }) => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Some(Command::SessionId) => println!("{}", gen_session_id()),
        None => {
            info!("No command specified. Use --help for usage information.");
        }
    }

    Ok(())
}

async fn run_demo(config: Config, objects: usize, peers: usize, fail_first: u32) -> Result<()> {
    let engine = Arc::new(MemoryEngine::new());
    if fail_first > 0 {
        engine.set_sync_behavior(SyncBehavior::FailFirst(fail_first));
    }
    let devices = (1..=peers)
        .map(|i| DeviceInfo::new(format!("peer-{}", i), format!("net-{}", i)))
        .collect::<Vec<_>>();
    let first_peer = devices.first().cloned();

    let store = ObjectStore::open(config, engine.clone(), Arc::new(StaticDiscovery::new(devices)))
        .with_cache_proxy(Arc::new(MemoryCacheProxy::new()));

    store
        .set_status_notifier(Arc::new(|session_id: &str, network_id: &str, status: &str| {
            info!(session_id, network_id, status, "peer status changed");
        }))
        .await?;

    let mut sessions = Vec::with_capacity(objects);
    for n in 0..objects {
        let session_id = gen_session_id();
        let object = store.create_object(&session_id).await?;
        object.put_value("index", n as f64)?;
        object.put_value("label", format!("object {}", n))?;

        store
            .watch(
                &object,
                Arc::new(|session_id: &str, keys: &[String]| {
                    info!(session_id, ?keys, "object changed");
                }),
            )
            .await?;
        sessions.push(session_id);
    }

    for session_id in &sessions {
        engine.deliver_change(session_id, &["label".to_string()]);
        if let Some(peer) = &first_peer {
            engine.deliver_status(session_id, &peer.network_id, OnlineStatus::Online);
            if let Err(e) = store.save(session_id, &peer.device_id).await {
                warn!(session_id = %session_id, error = %e, "save failed");
            }
        }
    }

    store.trigger_sync();
    let outcome = store
        .trigger_restore(|| info!("restore notifier fired"))
        .wait()
        .await
        .context("restore task ended without an outcome")?;

    println!("result: {:?} after {} round(s)", outcome.result, outcome.rounds);
    for (session_id, status) in &outcome.statuses {
        println!("  {} {}", session_id, status);
    }

    store.close().await?;
    Ok(())
}
