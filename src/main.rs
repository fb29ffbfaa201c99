use tokio::net::TcpListener;

use user_api::{
    app::{build_app, serve},
    config::AppConfig,
    state::AppState,
    users::services::report_recent_registrations,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "user_api=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = AppConfig::from_env()?;
    let addr = config.bind_addr()?;
    let (app_state, db) = AppState::init(config).await?;

    sqlx::migrate!("./migrations").run(&db).await?;

    let listener = TcpListener::bind(addr).await?;
    tokio::spawn(report_recent_registrations(app_state.users.clone()));

    serve(listener, build_app(app_state)).await
}
