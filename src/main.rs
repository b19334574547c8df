use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use outreach_generator::{
    config::Config,
    api::routes::create_router,
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .env may carry RUST_LOG, so load it before the subscriber reads the filter
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("outreach_generator=info,tower_http=info")
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().map_err(|e| {
        error!("failed to load configuration: {}", e);
        e
    })?;

    let server_addr = config.server_addr;
    info!(
        base_url = %config.upstream.base_url,
        models = ?config.upstream.models,
        "starting outreach generator v{}",
        env!("CARGO_PKG_VERSION")
    );
    if config.gemini_api_key.is_none() {
        warn!("GEMINI_API_KEY is not set; sessions must provide their own key");
    }

    let app = create_router(AppState::new(config));

    let listener = TcpListener::bind(server_addr).await?;
    info!("listening on {}", server_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
