use tracing_subscriber::EnvFilter;

const ENV_LOG: &str = "DWH_LOG";
const ENV_LOG_FORMAT: &str = "DWH_LOG_FORMAT";

/// Installs the global subscriber. `DWH_LOG` takes precedence over
/// `RUST_LOG`; `DWH_LOG_FORMAT=json` switches to one JSON object per line.
pub fn init_logging() {
    let filter = std::env::var(ENV_LOG)
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    let env_filter = EnvFilter::try_new(&filter).unwrap_or_else(|_| EnvFilter::new("info"));

    let json = std::env::var(ENV_LOG_FORMAT)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_env_filter(env_filter);

    if json {
        builder.json().flatten_event(true).init();
    } else {
        builder.compact().init();
    }
}
