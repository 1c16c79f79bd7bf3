use std::{future::IntoFuture, path::PathBuf, sync::Arc};

use clap::Parser;
use color_eyre::{Result, eyre::Context};
use hostgate::{
    GracefulShutdown,
    config::LogFormat,
    tracing_setup,
    wol::{LivenessChecker, UdpBroadcast, WolState, router},
};

/// Wake-on-LAN API and front end
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Address to bind
    #[clap(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[clap(short, long, default_value_t = 8080)]
    port: u16,

    /// Directory with the built front end
    #[clap(long, default_value = "../frontend/dist")]
    static_dir: PathBuf,

    /// Log output format
    #[clap(long, value_enum, default_value = "json")]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    tracing_setup::init_tracing(args.log_format)?;

    let state = WolState {
        transport: Arc::new(UdpBroadcast::default()),
        liveness: Arc::new(LivenessChecker::new()),
    };
    let app = router(state, &args.static_dir);

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .wrap_err_with(|| format!("Failed to bind to {addr}"))?;

    let graceful_shutdown = GracefulShutdown::new();
    let signal_handler_shutdown = graceful_shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = signal_handler_shutdown.run_signal_handler().await {
            tracing::error!("Signal handler error: {}", e);
        }
    });

    tracing::info!(
        static_dir = %args.static_dir.display(),
        "Server running on http://{}",
        addr
    );

    let shutdown_signal = graceful_shutdown.shutdown_signal();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal.await;
        })
        .into_future()
        .await
        .context("Server error")?;

    Ok(())
}
