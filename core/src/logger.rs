use tracing::{debug, level_filters::LevelFilter};
use tracing_subscriber::{
    fmt::format::{Format, Writer},
    EnvFilter,
};

/// Environment variable holding extra filter directives, e.g. `recordset=trace`.
pub const LOG_FILTER_ENV: &str = "RECORDSET_LOG";

struct LocalTimer;

impl tracing_subscriber::fmt::time::FormatTime for LocalTimer {
    fn format_time(&self, writer: &mut Writer<'_>) -> std::fmt::Result {
        let now = chrono::Local::now();
        write!(writer, "{}", now.format("%Y-%m-%d %H:%M:%S%.3f"))
    }
}

fn build_filter(log_level: LevelFilter) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(log_level.into())
        .with_env_var(LOG_FILTER_ENV)
        .from_env_lossy()
}

/// Installs the global subscriber. Returns `false` if one was already installed.
pub fn setup_logger(log_level: LevelFilter) -> bool {
    let format = Format::default().with_timer(LocalTimer).with_level(true).with_target(true);

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(build_filter(log_level))
        .event_format(format)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        debug!("Logger has already been set up, continuing...");
        return false;
    }
    true
}

pub fn setup_info_logger() -> bool {
    setup_logger(LevelFilter::INFO)
}
