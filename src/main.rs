use std::{future::IntoFuture, net::SocketAddr, path::PathBuf, process, sync::Arc};

use clap::{Parser, Subcommand};
use color_eyre::{Result, eyre::Context};
use hostgate::{
    FileConfigProvider, GracefulShutdown, HttpClientAdapter, ReloadRequest, ReloadTrigger,
    ReverseProxyDispatcher, RouteTable,
    adapters::{http_handler, signals::forward_hangups},
    config::{ConfigError, LogFormat, ProxySettings, load_settings, read_routes},
    ports::http_client::HttpClient,
    tracing_setup,
};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    #[clap(subcommand)]
    command: Option<Commands>,

    /// Routes file [default: routes.json]
    #[clap(short, long, global = true)]
    config: Option<PathBuf>,

    /// Port to listen on [default: 8000]
    #[clap(short, long)]
    port: Option<u16>,

    /// Address to bind [default: 0.0.0.0]
    #[clap(long)]
    host: Option<String>,

    /// Give up on a backend after this long, e.g. `30s` or `500ms` [default: 30s]
    #[clap(long)]
    forward_timeout: Option<String>,

    /// Also reload when the routes file changes on disk
    #[clap(long)]
    watch: bool,

    /// Log output format [default: json]
    #[clap(long, value_enum)]
    log_format: Option<LogFormat>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load the routes file, report valid and skipped routes, then exit
    Check,
}

impl Args {
    /// Command-line flags win over environment and defaults.
    fn apply(&self, settings: &mut ProxySettings) {
        if let Some(config) = &self.config {
            settings.config = config.clone();
        }
        if let Some(port) = self.port {
            settings.port = port;
        }
        if let Some(host) = &self.host {
            settings.host = host.clone();
        }
        if let Some(timeout) = &self.forward_timeout {
            settings.forward_timeout = timeout.clone();
        }
        if self.watch {
            settings.watch = true;
        }
        if let Some(format) = self.log_format {
            settings.log_format = format;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    let mut settings = load_settings().wrap_err("Failed to read HOSTGATE_* settings")?;
    args.apply(&mut settings);

    match args.command {
        Some(Commands::Check) => check_command(&settings).await,
        None => serve(settings).await,
    }
}

async fn serve(settings: ProxySettings) -> Result<()> {
    tracing_setup::init_tracing(settings.log_format)?;

    let forward_timeout = settings.forward_timeout()?;

    let routes = Arc::new(RouteTable::new());
    let provider = Arc::new(FileConfigProvider::new(&settings.config));
    let (trigger, reload_handle) = ReloadTrigger::new(provider.clone(), routes.clone());

    tracing::info!("Loading initial routes from {}", settings.config.display());
    trigger
        .load(ReloadRequest::Startup)
        .await
        .wrap_err("Failed to load initial routes")?;

    let _watcher = if settings.watch {
        Some(
            provider
                .watch(reload_handle.clone())
                .wrap_err("Failed to watch routes file")?,
        )
    } else {
        None
    };

    let hangup_handle = reload_handle.clone();
    tokio::spawn(async move {
        if let Err(e) = forward_hangups(hangup_handle).await {
            tracing::error!("SIGHUP handler error: {}", e);
        }
    });
    let mut reload_worker = tokio::spawn(trigger.run());

    let graceful_shutdown = GracefulShutdown::new();
    let signal_handler_shutdown = graceful_shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = signal_handler_shutdown.run_signal_handler().await {
            tracing::error!("Signal handler error: {}", e);
        }
    });

    let http_client: Arc<dyn HttpClient> = Arc::new(
        HttpClientAdapter::new(forward_timeout).context("Failed to create HTTP client adapter")?,
    );
    let dispatcher = Arc::new(ReverseProxyDispatcher::new(routes.clone(), http_client));
    let app = http_handler::router(dispatcher);

    let listen_addr = settings.listen_addr();
    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .wrap_err_with(|| format!("Failed to bind to {listen_addr}"))?;

    tracing::info!(
        routes = routes.len(),
        watch = settings.watch,
        ?forward_timeout,
        "hostgate listening on {}",
        listen_addr
    );

    let shutdown_signal = graceful_shutdown.shutdown_signal();
    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown_signal.await;
    })
    .into_future();

    tokio::select! {
        result = server => {
            result.context("Server error")?;
        }
        Ok(Err(e)) = &mut reload_worker => {
            return Err(e).wrap_err("Route reload failed, shutting down");
        }
    }

    drop(reload_handle);
    tracing::info!("Graceful shutdown completed");
    Ok(())
}

/// Validate the routes file and exit
async fn check_command(settings: &ProxySettings) -> Result<()> {
    let path = &settings.config;
    println!("Checking routes file: {}", path.display());

    let config = match read_routes(path).await {
        Ok(config) => config,
        Err(e @ ConfigError::Unreadable { .. }) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
        Err(e) => {
            eprintln!("Routes file is malformed:");
            eprintln!("   {e}");
            process::exit(1);
        }
    };

    println!("Valid routes: {}", config.len());
    for entry in config.entries() {
        println!("   {} -> {}", entry.host(), entry.target());
    }

    if !config.rejected().is_empty() {
        println!("Skipped routes: {}", config.rejected().len());
        for rejected in config.rejected() {
            println!(
                "   {} -> {} ({})",
                rejected.host, rejected.target, rejected.reason
            );
        }
    }

    Ok(())
}
