use std::io;
use std::net::SocketAddr;

use axum::Router;

/// Resolves on Ctrl-C.
pub async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        log::warn!("event=shutdown_signal_unavailable err={}", err);
        std::future::pending::<()>().await;
    }
    log::info!("event=shutdown_requested");
}

async fn serve_on_listener(listener: tokio::net::TcpListener, app: Router) -> io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        log::info!("event=listening addr={}", addr);
    }
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
}

/// Serves `app` on `addr` until Ctrl-C. `localhost:<port>` binds both
/// loopback stacks, since it may resolve to IPv6 only.
pub async fn serve(addr: &str, app: Router) -> io::Result<()> {
    if let Some(port) = addr.strip_prefix("localhost:") {
        let v4 = tokio::net::TcpListener::bind(format!("127.0.0.1:{port}")).await;
        let v6 = tokio::net::TcpListener::bind(format!("[::1]:{port}")).await;
        return match (v4, v6) {
            (Ok(v4_listener), Ok(v6_listener)) => {
                let v4_task = serve_on_listener(v4_listener, app.clone());
                let v6_task = serve_on_listener(v6_listener, app);
                let (v4_result, v6_result) = tokio::join!(v4_task, v6_task);
                v4_result.and(v6_result)
            }
            (Ok(listener), Err(_)) | (Err(_), Ok(listener)) => {
                serve_on_listener(listener, app).await
            }
            (Err(err), Err(_)) => Err(err),
        };
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    serve_on_listener(listener, app).await
}
