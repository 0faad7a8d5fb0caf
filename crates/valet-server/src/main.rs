use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use valet::config::{parse_capacity, parse_port};
use valet::transport::{ServerConfig, serve};
use valet::{
    AllocationEngine, JsonFileStore, LotConfig, LotService, MemoryStore, PersistenceGateway,
    VersionInfo,
};

const USAGE: &str = "\
Usage: valet [--host <addr>] [--port <port>] [--capacity <n>] [--state <file>]

Options:
  --host <addr>      IP address or hostname to bind [env: VALET_HOST, default: 0.0.0.0]
  --port <port>      Port to listen on [env: VALET_PORT, default: 8080]
  --capacity <n>     Number of parking slots [env: VALET_CAPACITY, default: 10]
  --state <file>     Snapshot file; omit to keep state in memory [env: VALET_STATE_FILE]
  -h, --help         Print this help";

/// Command-line overrides. Anything left `None` falls back to the environment.
#[derive(Debug, Default, PartialEq, Eq)]
struct Args {
    host: Option<String>,
    port: Option<u16>,
    capacity: Option<NonZeroUsize>,
    state: Option<PathBuf>,
}

fn parse_args(args: &[String]) -> Result<Args, String> {
    let mut parsed = Args::default();

    let mut i = 1; // skip argv[0]
    while i < args.len() {
        match args[i].as_str() {
            "--host" => {
                i += 1;
                parsed.host = Some(args.get(i).ok_or("--host requires a value")?.clone());
            }
            "--port" => {
                i += 1;
                let raw = args.get(i).ok_or("--port requires a value")?;
                parsed.port = Some(parse_port("--port", raw).map_err(|e| e.to_string())?);
            }
            "--capacity" => {
                i += 1;
                let raw = args.get(i).ok_or("--capacity requires a value")?;
                parsed.capacity =
                    Some(parse_capacity("--capacity", raw).map_err(|e| e.to_string())?);
            }
            "--state" => {
                i += 1;
                parsed.state = Some(PathBuf::from(
                    args.get(i).ok_or("--state requires a value")?,
                ));
            }
            "--help" | "-h" => return Err(String::new()),
            arg => return Err(format!("unexpected argument: {arg}")),
        }
        i += 1;
    }

    Ok(parsed)
}

/// Initialize tracing with VALET_LOG and LOG_FORMAT support.
fn init_tracing() {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let base_level = match std::env::var("VALET_LOG").as_deref() {
            Ok("trace") => "trace",
            Ok("debug") => "debug",
            Ok("warn") | Ok("warning") => "warn",
            Ok("error") => "error",
            _ => "info",
        };

        EnvFilter::new(format!(
            "valet={level},valet_server={level}",
            level = base_level
        ))
    };

    let use_json = std::env::var("LOG_FORMAT").as_deref() == Ok("json");

    if use_json {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    }
}

#[tokio::main]
async fn main() {
    let argv: Vec<String> = std::env::args().collect();

    let args = match parse_args(&argv) {
        Ok(args) => args,
        Err(msg) => {
            if msg.is_empty() {
                println!("{USAGE}");
                process::exit(0);
            }
            eprintln!("error: {msg}");
            eprintln!();
            eprintln!("{USAGE}");
            process::exit(2);
        }
    };

    init_tracing();

    if let Err(e) = run(args).await {
        tracing::error!(error = %e, "valet exited with error");
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut lot = LotConfig::from_env()?;
    if let Some(capacity) = args.capacity {
        lot.capacity = capacity;
    }
    if let Some(state) = args.state {
        lot.state_file = Some(state);
    }

    let mut server = ServerConfig::from_env()?;
    if let Some(host) = args.host {
        server.host = host;
    }
    if let Some(port) = args.port {
        server.port = port;
    }

    let store: Box<dyn PersistenceGateway> = match &lot.state_file {
        Some(path) => {
            let store = JsonFileStore::new(path.clone());
            tracing::info!(path = %store.path().display(), "Persisting lot state to file");
            Box::new(store)
        }
        None => {
            tracing::info!("No state file configured, lot state is kept in memory");
            Box::new(MemoryStore::new())
        }
    };

    let engine = AllocationEngine::open(lot.capacity, store)
        .context("failed to restore lot state")?;
    let counts = engine.counts();
    tracing::info!(
        capacity = lot.capacity.get(),
        reserved = counts.reserved,
        queued = counts.queued,
        "Lot ready"
    );

    let version = VersionInfo::new().with_server(env!("CARGO_PKG_VERSION").to_string());
    let service = Arc::new(LotService::new(engine).with_version(version));

    serve(server, service).await
}
