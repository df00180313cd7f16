use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Default filter when `RUST_LOG` is unset.
pub fn default_directive(debug: bool) -> &'static str {
    if debug { "debug" } else { "info" }
}

/// Installs the global subscriber. `RUST_LOG` wins over `debug`; debug mode
/// also prints the source file and line of each event.
pub fn init_tracing(debug: bool, no_colors: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(debug)));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .compact()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(debug)
                .with_line_number(debug)
                .with_ansi(!no_colors),
        )
        .init();
}

#[cfg(test)]
mod tests {
    use super::default_directive;

    #[test]
    fn debug_flag_selects_level() {
        assert_eq!(default_directive(false), "info");
        assert_eq!(default_directive(true), "debug");
    }
}
