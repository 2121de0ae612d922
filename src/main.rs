use anyhow::Context;

use term_gateway::app_state::AppState;
use term_gateway::config::{init_logging, ServerConfig};
use term_gateway::pty::default_factory;
use term_gateway::server::{build_router, run_server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_logging();

    let config = ServerConfig::from_env().context("failed to load configuration")?;
    let state = AppState::new(config, default_factory());

    let router = build_router(state.clone());
    run_server(router, state).await.context("server error")?;

    Ok(())
}
