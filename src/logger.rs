use chrono::Local;
use env_logger::{Builder, Env};
use log::LevelFilter;
use std::io::Write;

/// Timestamped console logging. `RUST_LOG` wins over the verbosity flag.
pub fn init(verbose: bool) {
    let default_level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };

    let mut builder = Builder::new();
    builder
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter(None, default_level)
        // Noisy HTTP internals stay at warn unless asked for.
        .filter(Some("reqwest"), LevelFilter::Warn)
        .filter(Some("html5ever"), LevelFilter::Warn)
        .parse_env(Env::default());

    // A second init (tests) is harmless.
    let _ = builder.try_init();
}
