//! Reads and writes the YAML configuration.
//!
//! Settings are split across two files in the data directory: `config.yml`
//! holds everything public, `secrets.yaml` holds API keys and other secret
//! values. They are merged on load and partitioned again on save. A file
//! that cannot be read or parsed is an error, never an empty config, so a
//! save can't clobber settings the service failed to understand.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use serde_json::{Map, Value};

use super::paths::AppPaths;
use super::settings::Settings;
use super::validation::validate_config;
use crate::core::errors::ApiError;

/// Stand-in for secret values in responses. Sending it back in an update
/// keeps the stored value.
pub const REDACTED: &str = "****";

const SECRET_KEY_MARKERS: [&str; 3] = ["api_key", "secret", "password"];

#[derive(Clone)]
pub struct ConfigService {
    paths: Arc<AppPaths>,
}

impl ConfigService {
    pub fn new(paths: Arc<AppPaths>) -> Self {
        Self { paths }
    }

    pub fn config_path(&self) -> &Path {
        &self.paths.config_path
    }

    pub fn secrets_path(&self) -> &Path {
        &self.paths.secrets_path
    }

    /// Public config with secrets merged over it.
    pub fn load_config(&self) -> Result<Value, ApiError> {
        let mut config = read_yaml(self.config_path())?;
        merge_into(&mut config, read_yaml(self.secrets_path())?);
        Ok(config)
    }

    /// Loads the merged config as typed settings, with environment
    /// overrides applied on top.
    pub fn load_settings(&self) -> Result<Settings, ApiError> {
        let config = self.load_config()?;
        validate_config(&config)?;
        Ok(Settings::from_value(&config)?.apply_env_overrides())
    }

    /// Saves `update`, either merged over the stored config or replacing
    /// it. Redacted placeholders are swapped back for the stored secrets.
    /// Nothing is written unless the result validates.
    pub fn update_config(&self, update: Value, merge: bool) -> Result<(), ApiError> {
        let current = self.load_config()?;

        let mut update = update;
        restore_redacted(&mut update, &current);
        let next = if merge {
            let mut next = current;
            merge_into(&mut next, update);
            next
        } else {
            update
        };

        validate_config(&next)?;
        Settings::from_value(&next)?;

        let (public, secrets) = partition_secrets(next);
        write_yaml(self.config_path(), &public)?;
        write_yaml(self.secrets_path(), &secrets)?;

        tracing::info!(path = %self.config_path().display(), "Configuration saved");
        Ok(())
    }

    pub fn redact_sensitive_values(&self, config: &Value) -> Value {
        let mut redacted = config.clone();
        redact_in_place(&mut redacted);
        redacted
    }
}

fn empty() -> Value {
    Value::Object(Map::new())
}

fn read_yaml(path: &Path) -> Result<Value, ApiError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(empty()),
        Err(e) => {
            return Err(ApiError::Internal(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            )))
        }
    };

    let value: Value = serde_yaml::from_str(&contents).map_err(|e| {
        ApiError::BadRequest(format!("{} is not valid YAML: {}", path.display(), e))
    })?;

    match value {
        Value::Object(_) => Ok(value),
        Value::Null => Ok(empty()),
        _ => Err(ApiError::BadRequest(format!(
            "{} must contain a mapping at the top level",
            path.display()
        ))),
    }
}

/// Writes through a sibling temp file so a failed write leaves the old
/// file in place.
fn write_yaml(path: &Path, value: &Value) -> Result<(), ApiError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(ApiError::internal)?;
    }

    let yaml = serde_yaml::to_string(value).map_err(ApiError::internal)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    fs::write(&tmp, yaml).map_err(ApiError::internal)?;
    fs::rename(&tmp, path).map_err(ApiError::internal)
}

fn merge_into(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_into(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

fn is_secret_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    SECRET_KEY_MARKERS.iter().any(|marker| key.contains(marker))
}

/// Splits a config into its public part and its secret part, keeping the
/// nesting of each.
fn partition_secrets(config: Value) -> (Value, Value) {
    let Value::Object(map) = config else {
        return (config, empty());
    };

    let mut public = Map::new();
    let mut secrets = Map::new();
    for (key, value) in map {
        if value.is_object() {
            let (public_part, secret_part) = partition_secrets(value);
            if public_part.as_object().is_some_and(|m| !m.is_empty()) {
                public.insert(key.clone(), public_part);
            }
            if secret_part.as_object().is_some_and(|m| !m.is_empty()) {
                secrets.insert(key, secret_part);
            }
        } else if is_secret_key(&key) && !value.is_null() {
            secrets.insert(key, value);
        } else {
            public.insert(key, value);
        }
    }

    (Value::Object(public), Value::Object(secrets))
}

fn redact_in_place(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, entry) in map.iter_mut() {
                if is_secret_key(key) && !entry.is_null() {
                    *entry = Value::String(REDACTED.to_string());
                } else {
                    redact_in_place(entry);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact_in_place),
        _ => {}
    }
}

/// Replaces placeholders in `update` with the values in `current`. A
/// placeholder with nothing stored behind it is dropped.
fn restore_redacted(update: &mut Value, current: &Value) {
    let Value::Object(map) = update else {
        return;
    };

    map.retain(|key, value| {
        let stored = current.get(key.as_str());
        if value.as_str() == Some(REDACTED) {
            return match stored {
                Some(stored) => {
                    *value = stored.clone();
                    true
                }
                None => false,
            };
        }
        restore_redacted(value, stored.unwrap_or(&Value::Null));
        true
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn service_in(dir: &Path) -> ConfigService {
        ConfigService::new(Arc::new(AppPaths::in_dir(dir.to_path_buf())))
    }

    #[test]
    fn missing_or_empty_files_load_as_empty_object() {
        let tmp = tempfile::tempdir().unwrap();
        let service = service_in(tmp.path());
        assert_eq!(service.load_config().unwrap(), json!({}));

        fs::write(tmp.path().join("config.yml"), "\n").unwrap();
        assert_eq!(service.load_config().unwrap(), json!({}));
    }

    #[test]
    fn update_splits_api_keys_into_secrets_file() {
        let tmp = tempfile::tempdir().unwrap();
        let service = service_in(tmp.path());

        service
            .update_config(
                json!({
                    "openai": { "api_key": "sk-test", "chat_model": "gpt-4o-mini" },
                    "rag": { "max_sections": 6 }
                }),
                true,
            )
            .unwrap();

        let public = fs::read_to_string(tmp.path().join("config.yml")).unwrap();
        let secrets = fs::read_to_string(tmp.path().join("secrets.yaml")).unwrap();
        assert!(!public.contains("sk-test"));
        assert!(public.contains("gpt-4o-mini"));
        assert!(secrets.contains("sk-test"));

        let settings = service.load_settings().unwrap();
        assert_eq!(settings.openai.chat_model, "gpt-4o-mini");
        assert_eq!(settings.rag.max_sections, 6);
    }

    #[test]
    fn merge_keeps_untouched_user_settings() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(
            tmp.path().join("config.yml"),
            "openai:\n  embedding_model: my-model\nrag:\n  max_sections: 7\n",
        )
        .unwrap();
        let service = service_in(tmp.path());

        service
            .update_config(json!({ "openai": { "temperature": 0.2 } }), true)
            .unwrap();

        let config = service.load_config().unwrap();
        assert_eq!(config["openai"]["embedding_model"], json!("my-model"));
        assert_eq!(config["openai"]["temperature"], json!(0.2));
        assert_eq!(config["rag"]["max_sections"], json!(7));
    }

    #[test]
    fn malformed_config_is_an_error_and_is_never_overwritten() {
        let tmp = tempfile::tempdir().unwrap();
        let original = "openai: {embedding_model: my-model}\nrag: [unclosed\n";
        let config_path = tmp.path().join("config.yml");
        fs::write(&config_path, original).unwrap();
        let service = service_in(tmp.path());

        assert!(matches!(service.load_settings(), Err(ApiError::BadRequest(_))));
        assert!(service
            .update_config(json!({ "openai": { "temperature": 0.2 } }), true)
            .is_err());
        assert_eq!(fs::read_to_string(&config_path).unwrap(), original);
    }

    #[test]
    fn non_mapping_config_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("config.yml"), "- just\n- a list\n").unwrap();

        let result = service_in(tmp.path()).load_config();

        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn redacted_values_survive_a_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let service = service_in(tmp.path());
        service
            .update_config(json!({ "server": { "api_key": "local-secret" } }), true)
            .unwrap();

        let redacted = service.redact_sensitive_values(&service.load_config().unwrap());
        assert_eq!(redacted["server"]["api_key"], json!(REDACTED));

        service.update_config(redacted, false).unwrap();
        assert_eq!(
            service.load_config().unwrap()["server"]["api_key"],
            json!("local-secret")
        );
    }

    #[test]
    fn placeholder_without_stored_secret_is_dropped() {
        let mut update = json!({ "openai": { "api_key": REDACTED, "chat_model": "gpt-4o" } });
        restore_redacted(&mut update, &json!({}));
        assert_eq!(update, json!({ "openai": { "chat_model": "gpt-4o" } }));
    }

    #[test]
    fn invalid_updates_are_not_written() {
        let tmp = tempfile::tempdir().unwrap();
        let service = service_in(tmp.path());

        let result = service.update_config(json!({ "rag": { "max_sections": 0 } }), true);

        assert!(matches!(result, Err(ApiError::BadRequest(_))));
        assert!(!tmp.path().join("config.yml").exists());
    }

    #[test]
    fn merge_overrides_nested_scalars() {
        let mut base = json!({ "openai": { "chat_model": "a", "temperature": 0 } });
        merge_into(&mut base, json!({ "openai": { "chat_model": "b" } }));
        assert_eq!(base, json!({ "openai": { "chat_model": "b", "temperature": 0 } }));
    }

    #[test]
    fn secret_keys_are_matched_case_insensitively() {
        assert!(is_secret_key("OPENAI_API_KEY"));
        assert!(is_secret_key("client_secret"));
        assert!(!is_secret_key("chat_model"));
    }
}
