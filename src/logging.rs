//! Logging setup for embedding programs.

use crate::config::Verbosity;
use tracing_subscriber::EnvFilter;

/// Install a `fmt` subscriber filtered at the given verbosity.
///
/// Only this crate's targets are raised to `verbosity`; dependencies stay at
/// `warn`. `RUST_LOG` directives, when present, are appended and win.
/// Returns `false` if a global subscriber was already installed.
pub fn init(verbosity: Verbosity) -> bool {
    let filter = build_filter(verbosity, std::env::var("RUST_LOG").ok().as_deref());

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = if verbosity.is_debug() {
        builder.with_target(true).try_init()
    } else {
        builder.with_target(false).compact().try_init()
    };
    result.is_ok()
}

fn build_filter(verbosity: Verbosity, extra: Option<&str>) -> EnvFilter {
    let mut directives = format!("warn,timeline_dl={}", verbosity.as_directive());
    if let Some(extra) = extra.filter(|s| !s.trim().is_empty()) {
        directives.push(',');
        directives.push_str(extra);
    }
    EnvFilter::new(directives)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_targets_this_crate() {
        let filter = build_filter(Verbosity::Debug, None);
        assert!(filter.to_string().contains("timeline_dl=debug"));
    }

    #[test]
    fn rust_log_directives_are_appended() {
        let filter = build_filter(Verbosity::Info, Some("reqwest=trace"));
        let rendered = filter.to_string();
        assert!(rendered.contains("timeline_dl=info"), "got: {rendered}");
        assert!(rendered.contains("reqwest=trace"), "got: {rendered}");
    }

    #[test]
    fn init_is_idempotent() {
        let _ = init(Verbosity::Warning);
        assert!(!init(Verbosity::Debug));
    }
}
