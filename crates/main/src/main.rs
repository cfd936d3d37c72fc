//! 主应用程序入口
//!
//! 加载配置、组装存储和服务后启动 Axum Web API。

use std::sync::Arc;

use application::{CancellationToken, MessagingService, SystemClock};
use config::AppConfig;
use infrastructure::Infrastructure;
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;

    // RUST_LOG 优先于配置文件中的过滤规则
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.filter))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!(config = ?config.sanitized(), "配置加载完成");

    let infra = Infrastructure::build(&config).await?;
    tracing::info!(backend = ?infra.backend, "存储已就绪");

    let service = MessagingService::new(infra.messaging_dependencies(Arc::new(SystemClock)));
    let shutdown = CancellationToken::new();
    let state = AppState::new(
        Arc::new(service),
        infra.identity.clone(),
        infra.photo_store.clone(),
        shutdown.clone(),
    );

    let app = router(state, &config);
    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;

    tracing::info!("消息服务启动在 http://{}", address);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    tracing::info!("服务已停止");
    Ok(())
}

/// 等待 Ctrl-C 或 SIGTERM，随后取消所有进行中的请求
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "无法监听 Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "无法监听 SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("收到关闭信号，正在取消进行中的请求");
    shutdown.cancel();
}
