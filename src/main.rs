//! Cuppa - streaming retrieval-augmented chat over coffee reviews
//!
//! Binary entry point: load configuration, start the HTTP server.

use cuppa::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;

    cuppa::start_server(config).await?;

    Ok(())
}
