use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use trellis::config::{self, Config};
use trellis::middleware::{MiddlewareEntry, TracingMiddleware};
use trellis::pages;
use trellis::registry::DataFnRegistry;
use trellis::server::{AppService, HttpServer, ServerHandle};

#[derive(Parser)]
#[command(name = "trellis")]
#[command(about = "Manifest-driven server-side rendering runtime", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve a built site from its dist directory
    Serve {
        /// Project root containing the dist directory
        #[arg(short, long, default_value = ".")]
        root: PathBuf,

        /// YAML config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Bind address, overriding the config (host:port)
        #[arg(long)]
        addr: Option<String>,

        /// Development mode: bypass the component cache
        #[arg(long, default_value_t = false)]
        dev: bool,

        /// Watch the manifest and reload on change
        #[arg(long, default_value_t = false)]
        watch: bool,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve {
            root,
            config,
            addr,
            dev,
            watch,
        } => serve(root, config.as_deref(), addr, dev, watch),
    }
}

fn serve(
    root: PathBuf,
    config_path: Option<&std::path::Path>,
    addr: Option<String>,
    dev: bool,
    watch: bool,
) -> anyhow::Result<()> {
    may::config().set_stack_size(config::coroutine_stack_size());

    let mut config = Config::load_or_default(config_path);
    config.dir.root = root;
    config.dev = config.dev || dev;
    if let Some(addr) = addr {
        if let Some((host, port)) = addr.rsplit_once(':') {
            config.server.host = host.to_string();
            config.server.port = port.parse()?;
        }
    }

    // The build normally guarantees the reserved views exist; cover bare
    // dist directories so the error path always has something to render.
    pages::ensure_fallback_views(&config.views_dir())?;

    let bind_addr = config.bind_addr();
    let watch_manifest = watch || config.dev;

    let mut service = AppService::new(config, DataFnRegistry::new());
    service.use_middleware(MiddlewareEntry::Bare(Arc::new(TracingMiddleware)));
    service.ready();
    if watch_manifest {
        service.enable_watch()?;
    }

    let handle = HttpServer(service).start(bind_addr.as_str())?;
    handle.wait_ready()?;
    info!("server listening on http://{bind_addr}");

    wait_for_shutdown(handle)
}

#[cfg(unix)]
fn wait_for_shutdown(handle: ServerHandle) -> anyhow::Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    if let Some(signal) = signals.forever().next() {
        info!(signal, "shutdown signal received");
    }
    handle.stop();
    Ok(())
}

#[cfg(not(unix))]
fn wait_for_shutdown(handle: ServerHandle) -> anyhow::Result<()> {
    handle
        .join()
        .map_err(|_| anyhow::anyhow!("server exited abnormally"))
}
