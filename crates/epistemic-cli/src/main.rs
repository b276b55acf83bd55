use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    // best-effort .env load before credentials are read
    dotenvy::dotenv().ok();
    epistemic_cli::logging::setup_logging();

    epistemic_cli::cli::cli().await
}
