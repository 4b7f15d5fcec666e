use anyhow::Context;
use etl::run_create_tables;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    etl::telemetry::init_logging();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "dwh.cfg".to_string());

    let summary = run_create_tables(&config_path)
        .await
        .with_context(|| format!("Failed to create tables (config: {})", config_path))?;

    println!("Recreated tables in {} steps", summary.steps);
    Ok(())
}
