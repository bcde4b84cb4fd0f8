// Copyright (c) 2025 the project contributors. Licensed under Apache License, Version 2.0.

//! Layered configuration loading (§4.13): defaults, then an optional TOML file, then
//! environment variables under the `HUB_` prefix. CLI flags are the outermost layer and
//! applied by the caller in `main` after this returns.

use std::path::Path;

use hub_core::config::HubConfig;

pub fn load(config_path: Option<&Path>) -> miette::Result<HubConfig> {
    let mut config = HubConfig::default();

    if let Some(path) = config_path {
        let text = std::fs::read_to_string(path)
            .map_err(|e| miette::miette!("failed to read config file {}: {e}", path.display()))?;
        config = toml::from_str(&text)
            .map_err(|e| miette::miette!("invalid config file {}: {e}", path.display()))?;
    }

    apply_env_overrides(&mut config);
    Ok(config)
}

fn apply_env_overrides(config: &mut HubConfig) {
    if let Ok(value) = std::env::var("HUB_UID") {
        if let Ok(parsed) = value.parse() {
            config.uid = parsed;
        }
    }
    if let Ok(value) = std::env::var("HUB_LISTEN") {
        config.listen = value != "0" && !value.eq_ignore_ascii_case("false");
    }
    if let Ok(value) = std::env::var("HUB_MESSAGE_TTL") {
        if let Ok(parsed) = value.parse() {
            config.message_ttl = parsed;
        }
    }
    if let Ok(value) = std::env::var("HUB_VERBOSITY") {
        if let Ok(parsed) = value.parse() {
            config.verbosity = parsed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_file_falls_back_to_defaults() {
        let config = load(None).unwrap();
        assert_eq!(config.uid, HubConfig::default().uid);
    }
}
