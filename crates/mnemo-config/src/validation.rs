// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as recognized backend names, threshold ranges, and
//! connection material for the selected backends.

use std::str::FromStr;

use mnemo_core::{DatabaseKind, VectorStoreKind};

use crate::diagnostic::{suggest_key, ConfigError};
use crate::model::MnemoConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &MnemoConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let database_kind = match DatabaseKind::from_str(&config.memory.database) {
        Ok(kind) => Some(kind),
        Err(_) => {
            errors.push(unknown_backend_error(
                "memory.database",
                &config.memory.database,
                DatabaseKind::EXPECTED,
            ));
            None
        }
    };

    let vector_kind = match VectorStoreKind::from_str(&config.memory.vector_store) {
        Ok(kind) => Some(kind),
        Err(_) => {
            errors.push(unknown_backend_error(
                "memory.vector_store",
                &config.memory.vector_store,
                VectorStoreKind::EXPECTED,
            ));
            None
        }
    };

    let threshold = config.memory.relevance_threshold;
    if !(0.0..=1.0).contains(&threshold) {
        errors.push(ConfigError::Validation {
            message: format!(
                "memory.relevance_threshold must be between 0.0 and 1.0, got {threshold}"
            ),
        });
    }

    if config.memory.max_memories == 0 {
        errors.push(ConfigError::Validation {
            message: "memory.max_memories must be at least 1".to_string(),
        });
    }

    if config.memory.operation_timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "memory.operation_timeout_secs must be at least 1".to_string(),
        });
    }

    // Connection material is only required for the backend actually selected;
    // sections for unselected backends may hold anything.
    match database_kind {
        Some(DatabaseKind::Sqlite) => {
            if config.database.sqlite.path.trim().is_empty() {
                errors.push(ConfigError::Validation {
                    message: "database.sqlite.path must not be empty".to_string(),
                });
            }
        }
        Some(DatabaseKind::Postgres) => {
            if config.database.postgres.url.trim().is_empty() {
                errors.push(ConfigError::Validation {
                    message: "database.postgres.url must not be empty".to_string(),
                });
            }
        }
        Some(DatabaseKind::Mysql) => {
            if config.database.mysql.url.trim().is_empty() {
                errors.push(ConfigError::Validation {
                    message: "database.mysql.url must not be empty".to_string(),
                });
            }
        }
        Some(DatabaseKind::Mongodb) => {
            let missing = config
                .database
                .mongodb
                .connection_string
                .as_deref()
                .is_none_or(|s| s.trim().is_empty());
            if missing {
                errors.push(ConfigError::Validation {
                    message: "database.mongodb.connection_string is required when \
                              memory.database = \"mongodb\""
                        .to_string(),
                });
            }
        }
        Some(DatabaseKind::Redis) => {
            if config.database.redis.url.trim().is_empty() {
                errors.push(ConfigError::Validation {
                    message: "database.redis.url must not be empty".to_string(),
                });
            }
        }
        None => {}
    }

    if config.vector.dimensions == 0 {
        errors.push(ConfigError::Validation {
            message: "vector.dimensions must be at least 1".to_string(),
        });
    }

    match vector_kind {
        Some(VectorStoreKind::Sqlite) => {
            if config.vector.sqlite.path.trim().is_empty() {
                errors.push(ConfigError::Validation {
                    message: "vector.sqlite.path must not be empty".to_string(),
                });
            }
        }
        Some(VectorStoreKind::Qdrant) => {
            let url = config.vector.qdrant.url.trim();
            if url.is_empty() {
                errors.push(ConfigError::Validation {
                    message: "vector.qdrant.url must not be empty".to_string(),
                });
            } else if !url.starts_with("http://") && !url.starts_with("https://") {
                errors.push(ConfigError::Validation {
                    message: format!("vector.qdrant.url `{url}` must be an http(s) URL"),
                });
            }
        }
        Some(VectorStoreKind::Memory) | None => {}
    }

    let base_url = config.embedding.base_url.trim();
    if base_url.is_empty() {
        errors.push(ConfigError::Validation {
            message: "embedding.base_url must not be empty".to_string(),
        });
    } else if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        errors.push(ConfigError::Validation {
            message: format!("embedding.base_url `{base_url}` must be an http(s) URL"),
        });
    }

    if config.embedding.max_concurrency == 0 {
        errors.push(ConfigError::Validation {
            message: "embedding.max_concurrency must be at least 1".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Build the error for an unrecognized backend name, with a fuzzy match
/// suggestion when the typo is close to a real backend.
fn unknown_backend_error(key: &str, value: &str, expected: &'static str) -> ConfigError {
    let valid: Vec<&str> = expected.split(", ").collect();
    let suggestion = suggest_key(value, &valid);
    let hint = match suggestion {
        Some(s) => format!(" (did you mean `{s}`?)"),
        None => String::new(),
    };
    ConfigError::Validation {
        message: format!("{key} `{value}` is not a supported backend{hint}; expected one of: {expected}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MnemoConfig;

    #[test]
    fn default_config_is_valid() {
        let config = MnemoConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn unknown_database_backend_is_rejected_with_suggestion() {
        let mut config = MnemoConfig::default();
        config.memory.database = "postgress".to_string();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        let message = errors[0].to_string();
        assert!(message.contains("postgress"), "got: {message}");
        assert!(message.contains("did you mean `postgres`"), "got: {message}");
    }

    #[test]
    fn threshold_out_of_range_is_rejected() {
        let mut config = MnemoConfig::default();
        config.memory.relevance_threshold = 1.5;

        let errors = validate_config(&config).unwrap_err();
        assert!(errors[0].to_string().contains("relevance_threshold"));
    }

    #[test]
    fn mongodb_requires_connection_string_only_when_selected() {
        // Unselected: missing connection string is fine.
        let config = MnemoConfig::default();
        assert!(config.database.mongodb.connection_string.is_none());
        assert!(validate_config(&config).is_ok());

        // Selected: it becomes required.
        let mut config = MnemoConfig::default();
        config.memory.database = "mongodb".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors[0].to_string().contains("connection_string"));
    }

    #[test]
    fn errors_are_collected_not_fail_fast() {
        let mut config = MnemoConfig::default();
        config.memory.database = "orable".to_string();
        config.memory.relevance_threshold = -0.1;
        config.memory.max_memories = 0;
        config.embedding.base_url = "ftp://example.com".to_string();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn qdrant_url_must_be_http() {
        let mut config = MnemoConfig::default();
        config.memory.vector_store = "qdrant".to_string();
        config.vector.qdrant.url = "localhost:6333".to_string();

        let errors = validate_config(&config).unwrap_err();
        assert!(errors[0].to_string().contains("vector.qdrant.url"));
    }
}
