//! Startup logging setup (SPEC_FULL.md §4.11), mirroring the teacher's
//! `cortex-cli` main: an `EnvFilter` driven by `-v`/`-vv` or `RUST_LOG`,
//! with a human-formatted layer by default and a JSON layer when
//! `--log-format json` (or the project config) asks for one.

use autospec_config::types::LogFormat;

pub fn init(verbosity: u8, format: LogFormat) {
    let default_level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|v| tracing_subscriber::EnvFilter::try_new(v).ok())
        .unwrap_or_else(|| tracing_subscriber::EnvFilter::new(format!("autospec={default_level},warn")));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);

    match format {
        LogFormat::Json => {
            subscriber.json().init();
        }
        LogFormat::Human => {
            subscriber.init();
        }
    }
}
