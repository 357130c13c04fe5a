use serde_json::{Map, Value};
use crate::core::errors::ApiError;

pub fn validate_config(config: &Value) -> Result<(), ApiError> {
    let root = config
        .as_object()
        .ok_or_else(|| config_type_error("root", "object"))?;

    if let Some(server) = expect_optional_object(root, "server")? {
        validate_optional_string_field(server, "server.host", "host")?;
        validate_u64_field(server, "server.port", "port", 0, 65_535)?;
        validate_string_array_field(
            server,
            "server.cors_allowed_origins",
            "cors_allowed_origins",
        )?;
        validate_optional_string_field(server, "server.api_key", "api_key")?;
    }

    if let Some(openai) = expect_optional_object(root, "openai")? {
        validate_non_empty_string_field(openai, "openai.base_url", "base_url")?;
        validate_optional_string_field(openai, "openai.api_key", "api_key")?;
        validate_non_empty_string_field(openai, "openai.chat_model", "chat_model")?;
        validate_non_empty_string_field(openai, "openai.embedding_model", "embedding_model")?;
        validate_u64_field(
            openai,
            "openai.embedding_dimensions",
            "embedding_dimensions",
            1,
            8_192,
        )?;
        validate_f64_field(openai, "openai.temperature", "temperature", 0.0, 2.0)?;
        validate_u64_field(
            openai,
            "openai.request_timeout_secs",
            "request_timeout_secs",
            1,
            3_600,
        )?;
    }

    if let Some(rag) = expect_optional_object(root, "rag")? {
        validate_f64_field(
            rag,
            "rag.similarity_threshold",
            "similarity_threshold",
            -1.0,
            1.0,
        )?;
        validate_u64_field(rag, "rag.max_sections", "max_sections", 1, 100)?;
        validate_bool_field(rag, "rag.reindex_on_model_change", "reindex_on_model_change")?;
    }

    if let Some(chat) = expect_optional_object(root, "chat")? {
        validate_u64_field(
            chat,
            "chat.appointment_delay_ms",
            "appointment_delay_ms",
            0,
            60_000,
        )?;
    }

    if let Some(database) = expect_optional_object(root, "database")? {
        validate_optional_string_field(database, "database.path", "path")?;
    }

    Ok(())
}

fn expect_optional_object<'a>(
    root: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a Map<String, Value>>, ApiError> {
    match root.get(key) {
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(config_type_error(key, "object")),
        None => Ok(None),
    }
}

fn validate_bool_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.as_bool().is_some() {
        return Ok(());
    }
    Err(config_type_error(path, "boolean"))
}

fn validate_u64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: u64,
    max: u64,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_u64() else {
        return Err(config_type_error(path, "integer"));
    };
    if number < min || number > max {
        return Err(out_of_range(path, min, max));
    }
    Ok(())
}

fn validate_f64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: f64,
    max: f64,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_f64() else {
        return Err(config_type_error(path, "number"));
    };
    if number < min || number > max {
        return Err(out_of_range(path, min, max));
    }
    Ok(())
}

fn validate_non_empty_string_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(text) = value.as_str() else {
        return Err(config_type_error(path, "string"));
    };
    if text.trim().is_empty() {
        return Err(ApiError::BadRequest(format!(
            "Invalid config at '{}': value cannot be empty",
            path
        )));
    }
    Ok(())
}

fn validate_optional_string_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.is_null() || value.as_str().is_some() {
        return Ok(());
    }
    Err(config_type_error(path, "string"))
}

fn validate_string_array_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(items) = value.as_array() else {
        return Err(config_type_error(path, "array of strings"));
    };
    for (index, item) in items.iter().enumerate() {
        let Some(text) = item.as_str() else {
            return Err(config_type_error(&format!("{}[{}]", path, index), "string"));
        };
        if text.trim().is_empty() {
            return Err(ApiError::BadRequest(format!(
                "Invalid config at '{}[{}]': value cannot be empty",
                path, index
            )));
        }
    }
    Ok(())
}

fn out_of_range<T: std::fmt::Display>(path: &str, min: T, max: T) -> ApiError {
    ApiError::BadRequest(format!(
        "Invalid config at '{}': must be between {} and {}",
        path, min, max
    ))
}

fn config_type_error(path: &str, expected: &str) -> ApiError {
    ApiError::BadRequest(format!(
        "Invalid config at '{}': expected {}",
        path, expected
    ))
}
