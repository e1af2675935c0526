use std::sync::Once;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_ENV: &str = "MOOD_LIFTER_LOG";

/// Diagnostics go to stderr so stdout stays clean for `--json` output.
pub fn init(verbose: bool) {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let directive = filter_directive(verbose, std::env::var(LOG_ENV).ok().as_deref());
        let filter = EnvFilter::try_new(&directive).unwrap_or_else(|err| {
            eprintln!("invalid {LOG_ENV} value '{directive}' ({err}); using 'warn'");
            EnvFilter::new("warn")
        });

        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .without_time()
                    .with_writer(std::io::stderr),
            )
            .try_init();
    });
}

fn filter_directive(verbose: bool, env_value: Option<&str>) -> String {
    match env_value.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => value.to_string(),
        None if verbose => "mood_lifter=debug".to_string(),
        None => "warn".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::filter_directive;

    #[test]
    fn env_value_wins_over_verbose_flag() {
        assert_eq!(filter_directive(true, Some("mood_lifter=trace")), "mood_lifter=trace");
        assert_eq!(filter_directive(false, Some("  ")), "warn");
        assert_eq!(filter_directive(true, None), "mood_lifter=debug");
        assert_eq!(filter_directive(false, None), "warn");
    }
}
