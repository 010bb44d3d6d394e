use std::{fmt::Display, fs, str::FromStr, time::Duration};

use serde::Deserialize;
use storage::DEFAULT_DATABASE_URL;
use tracing::warn;

use crate::{
    confirmation::{
        RemoteProfile, DEFAULT_FAILURE_PROBABILITY, DEFAULT_MAX_DELAY, DEFAULT_MIN_DELAY,
    },
    coordinator::RollbackStrategy,
    notifications::NotificationMode,
};

pub const SETTINGS_FILE: &str = "kanban.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EngineSettings {
    pub database_url: String,
    pub confirm_min_delay_ms: u64,
    pub confirm_max_delay_ms: u64,
    pub failure_probability: f64,
    /// Falls back to the notification mode's own TTL when unset.
    pub notification_ttl_ms: Option<u64>,
    pub notification_mode: NotificationMode,
    pub rollback_strategy: RollbackStrategy,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.into(),
            confirm_min_delay_ms: DEFAULT_MIN_DELAY.as_millis() as u64,
            confirm_max_delay_ms: DEFAULT_MAX_DELAY.as_millis() as u64,
            failure_probability: DEFAULT_FAILURE_PROBABILITY,
            notification_ttl_ms: None,
            notification_mode: NotificationMode::default(),
            rollback_strategy: RollbackStrategy::default(),
        }
    }
}

impl EngineSettings {
    pub fn remote_profile(&self) -> RemoteProfile {
        RemoteProfile {
            min_delay: Duration::from_millis(self.confirm_min_delay_ms),
            max_delay: Duration::from_millis(self.confirm_max_delay_ms),
            failure_probability: self.failure_probability,
        }
    }

    pub fn notification_ttl(&self) -> Duration {
        self.notification_ttl_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| self.notification_mode.default_ttl())
    }
}

/// Defaults, then `kanban.toml` in the working directory, then the process
/// environment.
pub fn load_settings() -> EngineSettings {
    let file = fs::read_to_string(SETTINGS_FILE).ok();
    load_settings_from(file.as_deref(), |name| std::env::var(name).ok())
}

pub fn load_settings_from(
    file_contents: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> EngineSettings {
    let mut settings = EngineSettings::default();

    if let Some(raw) = file_contents {
        match toml::from_str::<toml::Table>(raw) {
            Ok(table) => {
                let file_value = |key: &str| {
                    table.get(key).map(|value| match value {
                        toml::Value::String(text) => text.clone(),
                        other => other.to_string(),
                    })
                };
                apply_layer(&mut settings, SETTINGS_FILE, file_value);
            }
            Err(error) => warn!(file = SETTINGS_FILE, %error, "ignoring unreadable settings file"),
        }
    }

    if let Some(v) = env("KANBAN_DATABASE_URL") {
        settings.database_url = v;
    }
    let env_value = |key: &str| env(&format!("APP__{}", key.to_ascii_uppercase()));
    apply_layer(&mut settings, "environment", env_value);

    settings
}

fn apply_layer(
    settings: &mut EngineSettings,
    source: &str,
    value: impl Fn(&str) -> Option<String>,
) {
    if let Some(v) = value("database_url") {
        settings.database_url = v;
    }
    if let Some(v) = parsed(source, "confirm_min_delay_ms", value("confirm_min_delay_ms")) {
        settings.confirm_min_delay_ms = v;
    }
    if let Some(v) = parsed(source, "confirm_max_delay_ms", value("confirm_max_delay_ms")) {
        settings.confirm_max_delay_ms = v;
    }
    if let Some(v) = parsed::<f64>(source, "failure_probability", value("failure_probability")) {
        if (0.0..=1.0).contains(&v) {
            settings.failure_probability = v;
        } else {
            warn!(source, value = v, "failure_probability must be within 0..=1; ignoring");
        }
    }
    if let Some(v) = parsed(source, "notification_ttl_ms", value("notification_ttl_ms")) {
        settings.notification_ttl_ms = Some(v);
    }
    if let Some(v) = parsed(source, "notification_mode", value("notification_mode")) {
        settings.notification_mode = v;
    }
    if let Some(v) = parsed(source, "rollback_strategy", value("rollback_strategy")) {
        settings.rollback_strategy = v;
    }
}

fn parsed<T>(source: &str, key: &str, raw: Option<String>) -> Option<T>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = raw?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(error) => {
            warn!(source, key, value = %raw, %error, "ignoring unparseable setting");
            None
        }
    }
}
