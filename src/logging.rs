use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "DANMAKU_STORE_LOG";
const DEFAULT_LEVEL: &str = "warn";

pub fn init(configured_level: Option<&str>) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(configured_level.unwrap_or(DEFAULT_LEVEL)));

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
