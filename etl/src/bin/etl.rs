use anyhow::Context;
use etl::run_etl_pipeline;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    etl::telemetry::init_logging();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "dwh.cfg".to_string());

    let summary = run_etl_pipeline(&config_path)
        .await
        .with_context(|| format!("ETL pipeline failed (config: {})", config_path))?;

    for (table, rows) in &summary.row_counts {
        println!("{}: {} rows", table, rows);
    }
    Ok(())
}
