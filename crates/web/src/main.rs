#![cfg_attr(target_os = "windows", windows_subsystem = "windows")]

mod site;

use thinkrelay_service::{api_routes, build_state, secure, serve, GatewayConfig};

const ENV_WEB_NO_OPEN: &str = "THINKRELAY_WEB_NO_OPEN";

/// Browser-facing URL for a listen address; wildcard hosts become `localhost`.
fn browser_url(listen_addr: &str) -> String {
    let addr = listen_addr.trim();
    let addr = match addr.rsplit_once(':') {
        Some(("0.0.0.0" | "[::]" | "", port)) => format!("localhost:{port}"),
        _ => addr.to_string(),
    };
    format!("http://{addr}")
}

#[tokio::main]
async fn main() {
    thinkrelay_service::init_logging();
    thinkrelay_service::portable::bootstrap_current_process();

    let config = GatewayConfig::from_env();
    let listen_addr = config.listen_addr.clone();
    let state = match build_state(config) {
        Ok(state) => state,
        Err(err) => {
            eprintln!("web failed to start: {err}");
            std::process::exit(1);
        }
    };
    let web_root = site::resolve_web_root();
    let app = secure(
        api_routes(state.clone()).merge(site::site_router(&web_root)),
        &state,
    );

    println!(
        "thinkrelay-web listening on {listen_addr} (web root {})",
        web_root.display()
    );

    if site::read_env_trim(ENV_WEB_NO_OPEN).is_none() {
        let _ = webbrowser::open(&browser_url(&listen_addr));
    }

    if let Err(err) = serve(&listen_addr, app).await {
        eprintln!("web stopped: {err}");
        std::process::exit(1);
    }
}
