use std::io::Write;

use chrono::Local;
use env_logger::Builder;
use log::LevelFilter;

/// `level` is the default; `RUST_LOG` still overrides it per module.
pub fn init(level: LevelFilter) {
    Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter(None, level)
        .parse_default_env()
        .init();

    log::debug!("Logger initialized.");
}
