//! Config command implementation.

use crate::cli::{ConfigAction, Output};
use crate::config::Settings;
use anyhow::{anyhow, Result};
use std::path::PathBuf;

/// Run the config command.
pub fn run_config(action: &ConfigAction, config_path: Option<PathBuf>, settings: Settings) -> Result<()> {
    let config_path = config_path.unwrap_or_else(Settings::default_config_path);

    match action {
        ConfigAction::Show => {
            let toml_str = toml::to_string_pretty(&settings)
                .map_err(|e| anyhow!("Failed to serialize config: {}", e))?;
            println!("{}", toml_str);
        }

        ConfigAction::Set { key, value } => {
            let updated = set_value(&settings, key, value)?;
            updated.save_to(&config_path)?;
            Output::success(&format!("Set {} = {}", key, value));
            Output::kv("Config", &config_path.display().to_string());
        }

        ConfigAction::Path => {
            println!("{}", config_path.display());
        }
    }

    Ok(())
}

/// Return a copy of `settings` with the dotted `key` set to `raw`.
///
/// The new value takes the type of the value it replaces.
fn set_value(settings: &Settings, key: &str, raw: &str) -> Result<Settings> {
    let mut root = toml::Value::try_from(settings)
        .map_err(|e| anyhow!("Failed to serialize config: {}", e))?;

    let mut parts = key.split('.').peekable();
    let mut current = &mut root;
    while let Some(part) = parts.next() {
        let table = current
            .as_table_mut()
            .ok_or_else(|| anyhow!("'{}' is not a config section", key))?;

        if parts.peek().is_none() {
            let value = match table.get(part) {
                Some(existing) => coerce(existing, raw)
                    .ok_or_else(|| anyhow!("Invalid value for {}: {}", key, raw))?,
                None if is_unset_string_key(key) => toml::Value::String(raw.to_string()),
                None => return Err(anyhow!("Unknown config key: {}", key)),
            };
            table.insert(part.to_string(), value);
            break;
        }

        current = table
            .get_mut(part)
            .ok_or_else(|| anyhow!("Unknown config key: {}", key))?;
    }

    let updated: Settings = root
        .try_into()
        .map_err(|e| anyhow!("Invalid value for {}: {}", key, e))?;
    Ok(updated)
}

/// String keys that are absent from serialized defaults.
fn is_unset_string_key(key: &str) -> bool {
    key == "prompts.custom_dir" || key.starts_with("prompts.variables.")
}

fn coerce(existing: &toml::Value, raw: &str) -> Option<toml::Value> {
    match existing {
        toml::Value::Integer(_) => raw.parse().ok().map(toml::Value::Integer),
        toml::Value::Float(_) => raw.parse().ok().map(toml::Value::Float),
        toml::Value::Boolean(_) => raw.parse().ok().map(toml::Value::Boolean),
        toml::Value::String(_) => Some(toml::Value::String(raw.to_string())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EmbeddingProvider, SourceAggregation};

    #[test]
    fn test_set_typed_values() {
        let settings = Settings::default();

        let updated = set_value(&settings, "rag.max_rounds", "4").unwrap();
        assert_eq!(updated.rag.max_rounds, 4);

        let updated = set_value(&updated, "rag.course_match_threshold", "1.5").unwrap();
        assert!((updated.rag.course_match_threshold - 1.5).abs() < f32::EPSILON);
        assert_eq!(updated.rag.max_rounds, 4);

        let updated = set_value(&updated, "rag.model", "gpt-4o").unwrap();
        assert_eq!(updated.rag.model, "gpt-4o");
    }

    #[test]
    fn test_set_enum_values() {
        let settings = Settings::default();

        let updated = set_value(&settings, "embedding.provider", "trigram").unwrap();
        assert_eq!(updated.embedding.provider, EmbeddingProvider::Trigram);

        let updated = set_value(&updated, "rag.source_aggregation", "merge").unwrap();
        assert_eq!(updated.rag.source_aggregation, SourceAggregation::Merge);

        assert!(set_value(&settings, "embedding.provider", "nope").is_err());
    }

    #[test]
    fn test_set_rejects_bad_keys_and_values() {
        let settings = Settings::default();
        assert!(set_value(&settings, "rag.nonexistent", "1").is_err());
        assert!(set_value(&settings, "rag", "1").is_err());
        assert!(set_value(&settings, "rag.max_rounds", "many").is_err());
    }

    #[test]
    fn test_set_prompt_variable() {
        let settings = Settings::default();
        let updated = set_value(&settings, "prompts.variables.tone", "friendly").unwrap();
        assert_eq!(
            updated.prompts.variables.get("tone").map(String::as_str),
            Some("friendly")
        );
    }
}
