use anyhow::{Context, Result};
use chunkfs::chunkserver::ChunkNode;
use chunkfs::config::{
    DEFAULT_CHUNK_CAPACITY, DEFAULT_CHUNK_PREFIX, DEFAULT_FILE_PREFIX, DEFAULT_LISTEN_ADDR,
    DEFAULT_METADATA_ENDPOINT, DEFAULT_NODE_NAME, DEFAULT_WORKER_PREFIX, NodeConfig,
    ReplicaUpdateMode,
};
use chunkfs::metadata::service::router;
use chunkfs::metadata::{HttpMetadataStore, InMemoryMetadataStore, MetadataStore};
use chunkfs::shutdown;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// How long the metadata service waits for open watches after a shutdown request.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "chunkfs", version, about = "Chunk-server node of a minimal distributed file store")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a chunk-server node.
    Node(NodeArgs),
    /// Run the metadata service that nodes coordinate through.
    Metastore {
        #[arg(long, env = "CHUNKFS_METASTORE_BIND", default_value = DEFAULT_METADATA_ENDPOINT)]
        bind: String,
    },
}

#[derive(Args)]
struct NodeArgs {
    #[arg(long, env = "CHUNKFS_LISTEN_ADDR", default_value = DEFAULT_LISTEN_ADDR)]
    listen: String,

    #[arg(long, env = "CHUNKFS_NODE_NAME", default_value = DEFAULT_NODE_NAME)]
    name: String,

    /// Address peers dial; defaults to the bound address.
    #[arg(long, env = "CHUNKFS_ADVERTISE_ADDR")]
    advertise: Option<String>,

    #[arg(
        long = "metadata-endpoint",
        env = "CHUNKFS_METADATA_ENDPOINTS",
        value_delimiter = ',',
        default_value = DEFAULT_METADATA_ENDPOINT
    )]
    metadata_endpoints: Vec<String>,

    #[arg(long, env = "CHUNKFS_DATA_DIR", default_value = "./data/chunks")]
    data_dir: PathBuf,

    #[arg(long, env = "CHUNKFS_CHUNK_CAPACITY", default_value_t = DEFAULT_CHUNK_CAPACITY)]
    chunk_capacity: usize,

    /// Peer copies pushed besides the local one; 1 or less disables replication.
    #[arg(long, env = "CHUNKFS_DESIRED_REPLICAS", default_value_t = 1)]
    desired_replicas: u32,

    #[arg(long, env = "CHUNKFS_FILE_PREFIX", default_value = DEFAULT_FILE_PREFIX)]
    file_prefix: String,

    #[arg(long, env = "CHUNKFS_CHUNK_PREFIX", default_value = DEFAULT_CHUNK_PREFIX)]
    chunk_prefix: String,

    #[arg(long, env = "CHUNKFS_WORKER_PREFIX", default_value = DEFAULT_WORKER_PREFIX)]
    worker_prefix: String,

    #[arg(long, env = "CHUNKFS_LEASE_TTL_SECS", default_value_t = 10)]
    lease_ttl_secs: u64,

    #[arg(long, env = "CHUNKFS_KEEPALIVE_SECS", default_value_t = 7)]
    keepalive_secs: u64,

    #[arg(long, env = "CHUNKFS_SYNC_WORKERS", default_value_t = 4)]
    sync_workers: usize,

    #[arg(long, env = "CHUNKFS_SYNC_QUEUE_DEPTH", default_value_t = 1024)]
    sync_queue_depth: usize,

    /// `last-writer-wins` or `versioned`.
    #[arg(long, env = "CHUNKFS_REPLICA_UPDATE", default_value = "last-writer-wins")]
    replica_update: ReplicaUpdateMode,
}

impl NodeArgs {
    fn into_config(self) -> NodeConfig {
        NodeConfig {
            listen_addr: self.listen,
            node_name: self.name,
            advertise_addr: self.advertise,
            metadata_endpoints: self.metadata_endpoints,
            data_dir: self.data_dir,
            chunk_capacity: self.chunk_capacity,
            desired_replicas: self.desired_replicas,
            file_prefix: self.file_prefix,
            chunk_prefix: self.chunk_prefix,
            worker_prefix: self.worker_prefix,
            lease_ttl: Duration::from_secs(self.lease_ttl_secs),
            keepalive_interval: Duration::from_secs(self.keepalive_secs),
            sync_workers: self.sync_workers,
            sync_queue_depth: self.sync_queue_depth,
            replica_update: self.replica_update,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Node(args) => run_node(args.into_config()).await,
        Command::Metastore { bind } => run_metastore(&bind).await,
    }
}

async fn run_node(config: NodeConfig) -> Result<()> {
    config.validate()?;
    tracing::info!(
        "Starting node {} (capacity {} bytes, desired replicas {}, replica update {})",
        config.node_name,
        config.chunk_capacity,
        config.desired_replicas,
        config.replica_update
    );

    let metadata: Arc<dyn MetadataStore> = Arc::new(HttpMetadataStore::new(&config.metadata_endpoints)?);
    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;

    let node = ChunkNode::start(config, metadata, listener).await?;

    shutdown::os_signal().await;
    tracing::info!("Shutdown requested");
    node.shutdown();
    node.join().await;
    Ok(())
}

async fn run_metastore(bind: &str) -> Result<()> {
    let store = InMemoryMetadataStore::new();
    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {}", bind))?;
    tracing::info!("Metadata service listening on {}", listener.local_addr()?);

    let (trigger, mut signal) = shutdown::channel();
    let server = tokio::spawn(async move {
        axum::serve(listener, router(store))
            .with_graceful_shutdown(async move { signal.recv().await })
            .await
    });

    shutdown::os_signal().await;
    tracing::info!("Shutdown requested");
    trigger.trigger();

    match tokio::time::timeout(SHUTDOWN_GRACE, server).await {
        Ok(joined) => joined??,
        Err(_) => tracing::warn!("Open watches did not drain within {:?}, exiting", SHUTDOWN_GRACE),
    }
    Ok(())
}
