//! Service settings loaded from prefixed environment variables

use config::{Config, ConfigError, Environment};
use serde::de::DeserializeOwned;

/// Deserialize service settings from `PREFIX_*` environment variables.
///
/// `defaults` supplies a value for every key that may be absent from the
/// environment. Keys are matched lower-cased, so `NOTIFIER_BIND_ADDR` feeds
/// the `bind_addr` field.
pub fn load<T: DeserializeOwned>(prefix: &str, defaults: &[(&str, &str)]) -> Result<T, ConfigError> {
    let mut builder = Config::builder();
    for (key, value) in defaults {
        builder = builder.set_default(*key, *value)?;
    }

    builder
        .add_source(Environment::with_prefix(prefix).try_parsing(true))
        .build()?
        .try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serial_test::serial;

    #[derive(Debug, Deserialize)]
    struct Sample {
        bind_addr: String,
        retention_days: u32,
        enabled: bool,
    }

    const DEFAULTS: &[(&str, &str)] = &[
        ("bind_addr", "0.0.0.0:3002"),
        ("retention_days", "30"),
        ("enabled", "false"),
    ];

    #[test]
    #[serial]
    fn test_defaults_apply() {
        unsafe {
            std::env::remove_var("SAMPLE_BIND_ADDR");
            std::env::remove_var("SAMPLE_RETENTION_DAYS");
            std::env::remove_var("SAMPLE_ENABLED");
        }

        let settings: Sample = load("SAMPLE", DEFAULTS).unwrap();
        assert_eq!(settings.bind_addr, "0.0.0.0:3002");
        assert_eq!(settings.retention_days, 30);
        assert!(!settings.enabled);
    }

    #[test]
    #[serial]
    fn test_environment_overrides_defaults() {
        unsafe {
            std::env::set_var("SAMPLE_RETENTION_DAYS", "7");
            std::env::set_var("SAMPLE_ENABLED", "true");
        }

        let settings: Sample = load("SAMPLE", DEFAULTS).unwrap();
        assert_eq!(settings.retention_days, 7);
        assert!(settings.enabled);

        unsafe {
            std::env::remove_var("SAMPLE_RETENTION_DAYS");
            std::env::remove_var("SAMPLE_ENABLED");
        }
    }
}
