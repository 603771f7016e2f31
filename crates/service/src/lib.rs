use std::io;

pub mod config;
pub mod gateway;
mod lock_utils;
pub mod process_env;
pub mod rate_limit;
pub mod relay;
mod server;
pub mod upstream;

pub use config::GatewayConfig;
pub use gateway::{api_routes, build_router, secure, AppState};
pub use server::{serve, shutdown_signal};

pub mod portable {
    /// Loads the optional env file shipped next to the binary.
    pub fn bootstrap_current_process() {
        crate::process_env::load_env_files();
    }
}

/// Installs the stderr fmt subscriber; `log` records are bridged into it.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

pub fn build_state(config: GatewayConfig) -> io::Result<AppState> {
    AppState::from_config(config).map_err(io::Error::other)
}

/// Serves the API routes only.
pub async fn run_gateway(config: GatewayConfig) -> io::Result<()> {
    let addr = config.listen_addr.clone();
    let state = build_state(config)?;
    serve(&addr, build_router(state)).await
}
