use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use jarsmith_config::{config_path, ConfigError, ToolConfig, CONFIG_ENV_VAR};
use pretty_assertions::assert_eq;

static ENV_LOCK: Mutex<()> = Mutex::new(());

struct EnvVarGuard {
    key: &'static str,
    prev: Option<OsString>,
    _lock: MutexGuard<'static, ()>,
}

impl EnvVarGuard {
    fn set(key: &'static str, value: Option<&Path>) -> Self {
        let lock = ENV_LOCK.lock().unwrap_or_else(|err| err.into_inner());
        let prev = std::env::var_os(key);
        match value {
            Some(value) => std::env::set_var(key, value),
            None => std::env::remove_var(key),
        }
        Self {
            key,
            prev,
            _lock: lock,
        }
    }
}

impl Drop for EnvVarGuard {
    fn drop(&mut self) {
        match self.prev.take() {
            Some(value) => std::env::set_var(self.key, value),
            None => std::env::remove_var(self.key),
        }
    }
}

#[test]
fn defaults_apply_to_missing_sections() {
    let config = ToolConfig::load_from_str("[logging]\nlevel = \"debug\"\n").unwrap();
    assert_eq!(config.logging.level, "debug");
    assert!(!config.logging.json);
    assert!(config.selector.presets.is_empty());
    assert_eq!(
        config.converter.wrapped_prefixes,
        vec!["java/nio/", "j$/nio/", "java/io/", "j$/io/"]
    );
    assert_eq!(config.converter.wrapper_namespace, "__wrapper__/");
    assert!(config
        .generator
        .package_prefixes
        .iter()
        .any(|prefix| prefix == "java/"));
}

#[test]
fn loads_every_section() {
    let text = r#"
[logging]
level = "jarsmith.remap=trace"
json = true

[selector.presets]
time = ["java/time/*"]

[converter]
wrapped_prefixes = ["java/nio/"]
wrapper_namespace = "wrapped/"

[generator]
package_prefixes = ["java/util/"]
"#;
    let config = ToolConfig::load_from_str(text).unwrap();
    assert!(config.logging.json);
    assert_eq!(config.selector.presets["time"], vec!["java/time/*"]);
    assert_eq!(config.converter.wrapped_prefixes, vec!["java/nio/"]);
    assert_eq!(config.converter.wrapper_namespace, "wrapped/");
    assert_eq!(config.generator.package_prefixes, vec!["java/util/"]);
}

#[test]
fn unknown_keys_are_rejected_without_echoing_the_source() {
    let text = "[converter]\nwrapper_namespace = \"w/\"\nsecret_token = \"hunter2\"\n";
    let err = ToolConfig::load_from_str(text).unwrap_err();
    assert!(matches!(err, ConfigError::Toml(_)));
    let message = err.to_string();
    assert!(message.contains("secret_token"), "{message}");
    assert!(!message.contains("hunter2"), "{message}");
}

#[test]
fn missing_file_reports_its_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    let err = ToolConfig::load_from_path(&path).unwrap_err();
    match err {
        ConfigError::Io { path: reported, .. } => assert_eq!(reported, path.display().to_string()),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn explicit_path_wins_over_environment() {
    let dir = tempfile::tempdir().unwrap();
    let from_env = dir.path().join("env.toml");
    let explicit = dir.path().join("explicit.toml");
    std::fs::write(&from_env, "[logging]\nlevel = \"warn\"\n").unwrap();
    std::fs::write(&explicit, "[logging]\nlevel = \"error\"\n").unwrap();

    let _guard = EnvVarGuard::set(CONFIG_ENV_VAR, Some(&from_env));
    assert_eq!(config_path(Some(&explicit)), Some(explicit.clone()));
    assert_eq!(config_path(None), Some(PathBuf::from(&from_env)));
    assert_eq!(ToolConfig::load(None).unwrap().logging.level, "warn");
    assert_eq!(
        ToolConfig::load(Some(&explicit)).unwrap().logging.level,
        "error"
    );
}

#[test]
fn no_path_means_defaults() {
    let _guard = EnvVarGuard::set(CONFIG_ENV_VAR, None);
    assert_eq!(config_path(None), None);
    assert_eq!(ToolConfig::load(None).unwrap(), ToolConfig::default());
}
