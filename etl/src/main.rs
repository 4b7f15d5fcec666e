use clap::{Arg, ArgMatches, Command};
use etl::Stage;
use etl::driver::RunSummary;
use std::process;

const DEFAULT_CONFIG: &str = "dwh.cfg";

fn config_arg() -> Arg {
    Arg::new("config")
        .short('c')
        .long("config")
        .value_name("FILE")
        .default_value(DEFAULT_CONFIG)
        .help("Path to the warehouse config file")
}

fn config_path(matches: &ArgMatches) -> &str {
    matches
        .get_one::<String>("config")
        .map(|s| s.as_str())
        .unwrap_or(DEFAULT_CONFIG)
}

fn print_summary(summary: &RunSummary) {
    println!(
        "Plan '{}' finished: {} steps in {} ms",
        summary.plan,
        summary.steps,
        (summary.finished_at - summary.started_at).num_milliseconds()
    );
    for (table, rows) in &summary.row_counts {
        println!("  {:<16} {:>10} rows", table.to_string(), rows);
    }
}

#[tokio::main]
async fn main() {
    let matches = Command::new("dwh")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Builds the song play star schema in the warehouse")
        .subcommand_required(true)
        .subcommand(
            Command::new("create-tables")
                .about("Drop and recreate the staging and star schema tables")
                .arg(config_arg()),
        )
        .subcommand(
            Command::new("etl")
                .about("Load staging tables and insert the star schema")
                .arg(config_arg()),
        )
        .subcommand(
            Command::new("run")
                .about("Recreate all tables, then run the ETL")
                .arg(config_arg()),
        )
        .subcommand(
            Command::new("plan")
                .about("Print the statements a stage would execute")
                .arg(config_arg())
                .arg(
                    Arg::new("stage")
                        .long("stage")
                        .value_name("STAGE")
                        .value_parser(["schema", "load", "full"])
                        .default_value("full")
                        .help("Which stage to render"),
                ),
        )
        .get_matches();

    etl::telemetry::init_logging();

    let result = match matches.subcommand() {
        Some(("create-tables", sub)) => etl::run_create_tables(config_path(sub))
            .await
            .map(|s| print_summary(&s)),
        Some(("etl", sub)) => etl::run_etl_pipeline(config_path(sub))
            .await
            .map(|s| print_summary(&s)),
        Some(("run", sub)) => etl::run_full_refresh(config_path(sub))
            .await
            .map(|s| print_summary(&s)),
        Some(("plan", sub)) => {
            let stage = sub
                .get_one::<String>("stage")
                .map(|s| s.as_str())
                .unwrap_or("full");
            stage
                .parse::<Stage>()
                .and_then(|stage| etl::render_plan(config_path(sub), stage))
                .map(|rendered| print!("{}", rendered))
        }
        _ => {
            eprintln!("Please specify a valid subcommand");
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
