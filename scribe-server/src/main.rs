mod config;

use log::info;
use scribe_collab::CollabServer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Optional .env file; real environment variables take precedence.
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = config::from_env()?;
    info!(
        "Starting scribe (ws {}, http {}, queue {} frames/connection)",
        config.ws_bind_addr, config.http_bind_addr, config.outbound_capacity
    );

    let server = CollabServer::new(config).bind().await?;
    info!("Ready: ws://{} and http://{}", server.ws_addr(), server.http_addr());

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutdown signal received, stopping"),
    }

    Ok(())
}
