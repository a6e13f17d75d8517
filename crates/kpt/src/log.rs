use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt, EnvFilter};

/// Initializes the `tracing` subscriber used by every command.
///
/// Uses the INFO level by default, but you can customize it with the
/// `KPT_LOG` environment variable. If `KPT_LOG` is not set, falls back to
/// `RUST_LOG` or the default log level.
pub fn init(verbosity: Option<LevelFilter>) {
    let default_level = verbosity.unwrap_or(LevelFilter::INFO);
    let env_filter = EnvFilter::try_from_env("KPT_LOG").unwrap_or_else(|_| {
        EnvFilter::builder()
            .with_default_directive(default_level.into())
            .from_env_lossy()
    });

    let verbose = verbosity.is_some();

    fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .with_file(verbose)
        .with_line_number(verbose)
        .init();
}
