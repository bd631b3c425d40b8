//! Configuration loader implementations.

use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::debug;

use crate::schema::LoaderSettings;

/// Overrides the environment name.
pub const ENV_ENVIRONMENT: &str = "PCORE_ENVIRONMENT";
/// Overrides the module path, using the platform path separator.
pub const ENV_MODULE_PATH: &str = "PCORE_MODULE_PATH";
/// Overrides the tasks flag (`true`/`false`/`1`/`0`).
pub const ENV_TASKS: &str = "PCORE_TASKS";

/// Reads JSON settings from `path`, applies environment overrides and validates.
///
/// # Errors
///
/// Fails when the file cannot be read or parsed, an override is malformed, or
/// validation rejects the result.
pub fn load_settings(path: &Path) -> Result<LoaderSettings> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read loader settings from {}", path.display()))?;
    let settings: LoaderSettings = serde_json::from_str(&text)
        .with_context(|| format!("invalid loader settings in {}", path.display()))?;
    finish(apply_overrides(settings, |key| env::var(key).ok())?)
}

/// Builds settings from defaults and environment overrides only.
///
/// # Errors
///
/// Fails when an override is malformed or validation rejects the result.
pub fn settings_from_env() -> Result<LoaderSettings> {
    finish(apply_overrides(LoaderSettings::default(), |key| {
        env::var(key).ok()
    })?)
}

fn finish(settings: LoaderSettings) -> Result<LoaderSettings> {
    settings.validate().context("loader settings failed validation")?;
    Ok(settings)
}

/// Applies overrides looked up through `lookup`.
///
/// # Errors
///
/// Fails when the tasks override is not a boolean.
pub fn apply_overrides(
    mut settings: LoaderSettings,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<LoaderSettings> {
    if let Some(environment) = lookup(ENV_ENVIRONMENT) {
        debug!(environment = %environment, "environment overridden");
        settings = settings.with_environment_name(environment);
    }
    if let Some(module_path) = lookup(ENV_MODULE_PATH) {
        let paths: Vec<_> = env::split_paths(&module_path).collect();
        debug!(entries = paths.len(), "module path overridden");
        settings = settings.with_module_path(paths);
    }
    if let Some(tasks) = lookup(ENV_TASKS) {
        let enabled = match tasks.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => true,
            "0" | "false" | "no" => false,
            other => bail!("{ENV_TASKS} must be a boolean, got `{other}`"),
        };
        settings = settings.with_tasks(enabled);
    }
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::PathBuf;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn overrides_replace_file_values() {
        let base = LoaderSettings::new("production")
            .with_environment_path("/etc/pcore/production")
            .with_module_path(["/a"]);
        let module_path = env::join_paths(["/x", "/y"]).unwrap();
        let settings = apply_overrides(
            base,
            lookup(&[
                (ENV_ENVIRONMENT, "staging"),
                (ENV_MODULE_PATH, module_path.to_str().unwrap()),
                (ENV_TASKS, "true"),
            ]),
        )
        .unwrap();
        assert_eq!(settings.environment_name(), "staging");
        assert_eq!(settings.environment_path(), Some(Path::new("/etc/pcore/production")));
        assert_eq!(settings.module_path(), [PathBuf::from("/x"), PathBuf::from("/y")]);
        assert!(settings.tasks());
    }

    #[test]
    fn malformed_tasks_override_is_rejected() {
        let err = apply_overrides(LoaderSettings::default(), lookup(&[(ENV_TASKS, "maybe")]))
            .unwrap_err();
        assert!(err.to_string().contains("PCORE_TASKS"));
    }

    #[test]
    fn loads_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loader.json");
        fs::write(
            &path,
            r#"{"environment_name": "dev", "module_path": ["/modules"], "tasks": true}"#,
        )
        .unwrap();
        let settings = load_settings(&path).unwrap();
        assert_eq!(settings.environment_name(), "dev");
        assert_eq!(settings.module_path(), [PathBuf::from("/modules")]);
    }

    #[test]
    fn missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_settings(&dir.path().join("absent.json")).unwrap_err();
        assert!(format!("{err:#}").contains("absent.json"));
    }

    #[test]
    fn invalid_file_is_rejected_with_context() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loader.json");
        fs::write(&path, r#"{"environment": "dev"}"#).unwrap();
        let err = load_settings(&path).unwrap_err();
        assert!(err.to_string().contains("invalid loader settings"));
    }
}
