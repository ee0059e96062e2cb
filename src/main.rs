use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use jsreconcile::config::{split_servers, Config};
use jsreconcile::desired::{ConsumerSpec, KvBucketSpec, KvEntrySpec, StreamSpec, StreamTemplateSpec};
use jsreconcile::identity::Identity;
use jsreconcile::nats::JetStreamConnector;
use jsreconcile::resource::{DesiredResource, Reconciler, ResourceKind};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Reconcile NATS JetStream resources from declarative manifests
#[derive(Parser, Debug)]
#[command(name = "jsreconcile", version = jsreconcile::VERSION, about, long_about = None)]
struct Args {
    /// Server URL, repeatable or comma separated (overrides config and NATS_URL)
    #[arg(short, long, global = true)]
    server: Vec<String>,

    /// Credentials file (overrides config and NATS_CREDS)
    #[arg(long, global = true)]
    creds: Option<PathBuf>,

    /// Alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create or update every resource in a manifest
    Apply {
        /// YAML manifest listing resources
        manifest: PathBuf,
    },
    /// Show the observed state of a resource
    Read {
        kind: ResourceKind,
        identity: String,
    },
    /// Update a resource from a YAML file holding its desired configuration
    Update {
        kind: ResourceKind,
        identity: String,
        file: PathBuf,
    },
    /// Delete a resource; absent resources are not an error
    Delete {
        kind: ResourceKind,
        identity: String,
    },
    /// Print the identity for a resource's natural keys
    Id {
        kind: ResourceKind,
        keys: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {:?}", log_path))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("jsreconcile started with log level: {:?}", level);
    tracing::info!("Log file: {:?}", log_path);

    Ok(Some(guard))
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("jsreconcile").join("jsreconcile.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".jsreconcile").join("jsreconcile.log");
    }
    PathBuf::from("jsreconcile.log")
}

// =============================================================================
// Manifests
// =============================================================================

/// One resource in an `apply` manifest
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestEntry {
    kind: ResourceKind,
    /// Stored identity; present means update, absent means create
    #[serde(default)]
    id: Option<String>,
    spec: serde_yaml::Value,
}

#[derive(Debug, Serialize)]
struct Outcome {
    identity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<DesiredResource>,
}

fn parse_spec(kind: ResourceKind, spec: serde_yaml::Value) -> Result<DesiredResource> {
    let desired = match kind {
        ResourceKind::Stream => DesiredResource::Stream(serde_yaml::from_value::<StreamSpec>(spec)?),
        ResourceKind::Consumer => {
            DesiredResource::Consumer(serde_yaml::from_value::<ConsumerSpec>(spec)?)
        },
        ResourceKind::StreamTemplate => {
            DesiredResource::StreamTemplate(serde_yaml::from_value::<StreamTemplateSpec>(spec)?)
        },
        ResourceKind::KvBucket => {
            DesiredResource::KvBucket(serde_yaml::from_value::<KvBucketSpec>(spec)?)
        },
        ResourceKind::KvEntry => DesiredResource::KvEntry(serde_yaml::from_value::<KvEntrySpec>(spec)?),
    };
    Ok(desired)
}

fn read_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    serde_yaml::from_str(&content).with_context(|| format!("Failed to parse {:?}", path))
}

fn print_yaml<T: Serialize>(value: &T) -> Result<()> {
    print!("{}", serde_yaml::to_string(value)?);
    Ok(())
}

fn encode_identity(kind: ResourceKind, keys: &[String]) -> Result<String> {
    let identity = match (kind, keys) {
        (ResourceKind::Stream, [name]) => Identity::stream(name),
        (ResourceKind::Consumer, [stream, durable]) => Identity::consumer(stream, durable),
        (ResourceKind::StreamTemplate, [name]) => Identity::stream_template(name),
        (ResourceKind::KvBucket, [bucket]) => Identity::kv_bucket(bucket),
        (ResourceKind::KvEntry, [bucket, key]) => Identity::kv_entry(bucket, key),
        (ResourceKind::Consumer | ResourceKind::KvEntry, _) => {
            bail!("{} identities need exactly two keys", kind)
        },
        _ => bail!("{} identities need exactly one key", kind),
    };
    Ok(identity.encode())
}

// =============================================================================
// Commands
// =============================================================================

async fn apply(reconciler: &Reconciler<JetStreamConnector>, manifest: &Path) -> Result<()> {
    let entries: Vec<ManifestEntry> = read_yaml(manifest)?;
    tracing::info!("Applying {} resources from {:?}", entries.len(), manifest);

    let mut outcomes = Vec::with_capacity(entries.len());
    for entry in entries {
        let desired = parse_spec(entry.kind, entry.spec)
            .with_context(|| format!("Invalid {} in {:?}", entry.kind, manifest))?;

        let outcome = match entry.id {
            Some(identity) => {
                let state = reconciler.update(&identity, &desired).await?;
                if state.is_none() {
                    tracing::warn!("{} {} is absent, not recreating", entry.kind, identity);
                }
                Outcome { identity, state }
            },
            None => {
                let created = reconciler.create(&desired).await?;
                Outcome {
                    identity: created.identity,
                    state: Some(created.state),
                }
            },
        };
        outcomes.push(outcome);
    }

    print_yaml(&outcomes)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level)?;

    let mut config = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    if !args.server.is_empty() {
        config.servers = args.server.iter().flat_map(|s| split_servers(s)).collect();
    }
    if let Some(creds) = &args.creds {
        config.credentials = Some(creds.clone());
    }

    let reconciler = Reconciler::new(JetStreamConnector::new(config.connection()))
        .with_limits(config.server_limits());

    match args.command {
        Command::Apply { manifest } => apply(&reconciler, &manifest).await?,
        Command::Read { kind, identity } => match reconciler.read(kind, &identity).await? {
            Some(state) => print_yaml(&state)?,
            None => println!("absent"),
        },
        Command::Update {
            kind,
            identity,
            file,
        } => {
            let spec: serde_yaml::Value = read_yaml(&file)?;
            let desired = parse_spec(kind, spec)?;
            match reconciler.update(&identity, &desired).await? {
                Some(state) => print_yaml(&state)?,
                None => println!("absent"),
            }
        },
        Command::Delete { kind, identity } => {
            reconciler.delete(kind, &identity).await?;
            println!("deleted {}", identity);
        },
        Command::Id { kind, keys } => println!("{}", encode_identity(kind, &keys)?),
    }

    Ok(())
}
