//! Observability setup for the loader crates.
//!
//! The loaders only emit `tracing` events; this crate installs the
//! subscriber that prints them.

#![warn(missing_docs, clippy::pedantic)]

pub mod tracing_support {
    //! Structured tracing helpers.

    use anyhow::{Context, Result, anyhow};
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    /// Environment variable holding the loader log filter.
    pub const ENV_LOG: &str = "PCORE_LOG";

    /// Filter used when neither `PCORE_LOG` nor `RUST_LOG` is set.
    pub const DEFAULT_FILTER: &str = "pcore_loader=info,pcore_instantiators=info";

    /// Picks the filter directive: `PCORE_LOG`, then `RUST_LOG`, then `default`.
    #[must_use]
    pub fn filter_directive(lookup: impl Fn(&str) -> Option<String>, default: &str) -> String {
        [ENV_LOG, EnvFilter::DEFAULT_ENV]
            .into_iter()
            .find_map(|var| lookup(var).filter(|value| !value.trim().is_empty()))
            .unwrap_or_else(|| default.to_owned())
    }

    /// Builds an [`EnvFilter`] from the process environment.
    ///
    /// # Errors
    ///
    /// Fails when the selected directive does not parse.
    pub fn env_filter(default: &str) -> Result<EnvFilter> {
        let directive = filter_directive(|var| std::env::var(var).ok(), default);
        EnvFilter::try_new(&directive)
            .with_context(|| format!("invalid log filter `{directive}`"))
    }

    /// Installs a formatting subscriber writing to stderr as the global default.
    ///
    /// # Errors
    ///
    /// Fails when the filter is invalid or a global subscriber is already set.
    pub fn init(default: &str) -> Result<()> {
        tracing_subscriber::registry()
            .with(env_filter(default)?)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
            .map_err(|err| anyhow!("failed to install tracing subscriber: {err}"))?;
        tracing::debug!(default, "tracing subscriber installed");
        Ok(())
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn pcore_log_wins_over_rust_log() {
            let directive = filter_directive(
                |var| match var {
                    ENV_LOG => Some("pcore_loader=trace".into()),
                    "RUST_LOG" => Some("warn".into()),
                    _ => None,
                },
                DEFAULT_FILTER,
            );
            assert_eq!(directive, "pcore_loader=trace");
        }

        #[test]
        fn blank_values_fall_through_to_default() {
            let directive = filter_directive(
                |var| (var == ENV_LOG).then(|| "  ".to_owned()),
                DEFAULT_FILTER,
            );
            assert_eq!(directive, DEFAULT_FILTER);
        }

        #[test]
        fn rust_log_is_the_fallback() {
            let directive =
                filter_directive(|var| (var == "RUST_LOG").then(|| "debug".to_owned()), "info");
            assert_eq!(directive, "debug");
        }

        #[test]
        fn default_filter_parses() {
            assert!(EnvFilter::try_new(DEFAULT_FILTER).is_ok());
        }
    }
}
