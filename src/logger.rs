use log::LevelFilter;

/// Initializes the app logger at `level`, bumped to `Debug` under `-v`
/// (§6), the way the teacher's `logger::init` wires up `env_logger`.
pub fn init(level: LevelFilter, verbose: bool) {
    let level = if verbose && level < LevelFilter::Debug { LevelFilter::Debug } else { level };

    env_logger::Builder::new().format_timestamp_millis().filter(None, level).init();
}
