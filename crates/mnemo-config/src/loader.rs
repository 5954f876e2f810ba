// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./mnemo.toml` > `~/.config/mnemo/mnemo.toml` > `/etc/mnemo/mnemo.toml`
//! with environment variable overrides via `MNEMO_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::MnemoConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/mnemo/mnemo.toml` (system-wide)
/// 3. `~/.config/mnemo/mnemo.toml` (user XDG config)
/// 4. `./mnemo.toml` (local directory)
/// 5. `MNEMO_*` environment variables
pub fn load_config() -> Result<MnemoConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(MnemoConfig::default()))
        .merge(Toml::file("/etc/mnemo/mnemo.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("mnemo/mnemo.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("mnemo.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no file or env lookup).
///
/// Used for testing and for hosts that manage config material themselves.
pub fn load_config_from_str(toml_content: &str) -> Result<MnemoConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(MnemoConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<MnemoConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(MnemoConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for section mapping.
///
/// CRITICAL: Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names. `MNEMO_MEMORY_VECTOR_STORE` must map to
/// `memory.vector_store`, not `memory.vector.store`, and backend sections are
/// two levels deep: `MNEMO_DATABASE_SQLITE_PATH` -> `database.sqlite.path`.
fn env_provider() -> Env {
    Env::prefixed("MNEMO_").map(|key| {
        // `key` is the lowercased env var name with prefix stripped.
        let key_str = key.as_str();
        let mapped = if let Some(rest) = key_str.strip_prefix("database_") {
            map_backend_key(
                "database",
                rest,
                &["sqlite", "postgres", "mysql", "mongodb", "redis"],
            )
        } else if let Some(rest) = key_str.strip_prefix("vector_") {
            map_backend_key("vector", rest, &["sqlite", "qdrant"])
        } else if let Some(rest) = key_str.strip_prefix("memory_") {
            format!("memory.{rest}")
        } else if let Some(rest) = key_str.strip_prefix("embedding_") {
            format!("embedding.{rest}")
        } else {
            key_str.to_string()
        };
        mapped.into()
    })
}

/// Map a stripped env key inside `section` onto its dotted path, descending
/// into a backend subsection when the key starts with a known backend name.
///
/// `("database", "sqlite_path")` -> `database.sqlite.path`,
/// `("vector", "dimensions")` -> `vector.dimensions`.
fn map_backend_key(section: &str, rest: &str, backends: &[&str]) -> String {
    for backend in backends {
        if let Some(field) = rest
            .strip_prefix(backend)
            .and_then(|r| r.strip_prefix('_'))
        {
            return format!("{section}.{backend}.{field}");
        }
    }
    format!("{section}.{rest}")
}
