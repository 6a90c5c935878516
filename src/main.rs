//! Agro Carbon server
//!
//! Serves carbon estimates, accepts labelled examples and trains new model
//! versions over HTTP. Configuration comes from `CARBON_*` environment
//! variables (a `.env` file is honoured).

use anyhow::Result;

use agro_carbon::{server, utils, PipelineConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize logging
    utils::init_tracing()?;

    let config = PipelineConfig::from_env();
    tracing::info!(
        db = %config.db_path,
        model = %config.model_name,
        port = config.port,
        "Configuration loaded"
    );

    server::run_server(config).await
}
