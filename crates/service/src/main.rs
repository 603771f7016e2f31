#[tokio::main]
async fn main() {
    thinkrelay_service::init_logging();
    thinkrelay_service::portable::bootstrap_current_process();
    let config = thinkrelay_service::GatewayConfig::from_env();
    if config.together_api_key.is_none() {
        log::warn!("event=startup_warning reason=TOGETHER_API_KEY not set");
    }
    println!("thinkrelay-service listening on {}", config.listen_addr);
    if let Err(err) = thinkrelay_service::run_gateway(config).await {
        eprintln!("service stopped: {err}");
        std::process::exit(1);
    }
}
