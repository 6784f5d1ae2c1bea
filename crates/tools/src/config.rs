//! `key=value` / `[section]` / `#`-comment config file loader, and the
//! preset table (de)serialization used by the CLI's `-l` listing and by
//! `[arq]`-section parameter overrides.

use crate::error::{Result, ToolsError};
use mercury_arq::preset::PresetTable;
use std::collections::HashMap;
use std::path::Path;

/// A flat `section.key -> value` map loaded from an INI-like config file.
/// Keys outside any `[section]` header are stored unprefixed.
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    values: HashMap<String, String>,
}

impl ConfigFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::parse(&content))
    }

    fn parse(content: &str) -> Self {
        let mut values = HashMap::new();
        let mut current_section = String::new();

        for raw_line in content.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if line.starts_with('[') && line.ends_with(']') {
                current_section = line[1..line.len() - 1].trim().to_lowercase();
                continue;
            }

            let Some(eq_pos) = line.find('=') else {
                continue;
            };
            let key = line[..eq_pos].trim().to_lowercase();
            let mut value = line[eq_pos + 1..].trim();
            if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
                value = &value[1..value.len() - 1];
            }

            let full_key = if current_section.is_empty() {
                key
            } else {
                format!("{current_section}.{key}")
            };
            values.insert(full_key, value.to_string());
        }

        Self { values }
    }

    pub fn get(&self, key: &str, default: &str) -> String {
        self.values.get(&key.to_lowercase()).cloned().unwrap_or_else(|| default.to_string())
    }

    pub fn get_int(&self, key: &str, default: i64) -> i64 {
        self.values
            .get(&key.to_lowercase())
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    pub fn get_float(&self, key: &str, default: f64) -> f64 {
        self.values
            .get(&key.to_lowercase())
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.values.get(&key.to_lowercase()).map(|v| v.to_lowercase()) {
            Some(v) => matches!(v.as_str(), "true" | "yes" | "1" | "on"),
            None => default,
        }
    }
}

/// Loads a preset table from a TOML file (one `[[preset]]` array entry per
/// `mercury_arq::preset::Preset`), for sites that want to override the
/// built-in ladder from `mercury_arq::preset::default_presets`.
pub fn load_preset_table(path: impl AsRef<Path>) -> Result<PresetTable> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|e| ToolsError::Config { msg: e.to_string() })
}

pub fn save_preset_table(table: &PresetTable, path: impl AsRef<Path>) -> Result<()> {
    let content =
        toml::to_string_pretty(table).map_err(|e| ToolsError::Config { msg: e.to_string() })?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Builds an `ArqConfig` from an `[arq]`-sectioned config file, falling back
/// to `ArqConfig::default()` for any field left unset.
pub fn build_arq_config(config: &ConfigFile) -> mercury_arq::controller::ArqConfig {
    let default = mercury_arq::controller::ArqConfig::default();
    mercury_arq::controller::ArqConfig {
        n_messages: config.get_int("arq.n_messages", default.n_messages as i64) as usize,
        data_batch_size: config.get_int("arq.data_batch_size", default.data_batch_size as i64) as usize,
        ack_batch_size: config.get_int("arq.ack_batch_size", default.ack_batch_size as i64) as usize,
        control_batch_size: config.get_int("arq.control_batch_size", default.control_batch_size as i64) as usize,
        message_transmission_time_ms: config.get_float(
            "arq.message_transmission_time_ms",
            default.message_transmission_time_ms,
        ),
        link_timeout_ms: config.get_float("arq.link_timeout_ms", default.link_timeout_ms),
        connection_timeout_ms: config.get_float("arq.connection_timeout_ms", default.connection_timeout_ms),
        max_retries: config.get_int("arq.max_retries", default.max_retries as i64) as u32,
        max_data_length: config.get_int("arq.max_data_length", default.max_data_length as i64) as usize,
        gear_shift_enabled: config.get_bool("arq.gear_shift_enabled", default.gear_shift_enabled),
        gear_shift_threshold: config.get_int("arq.gear_shift_threshold", default.gear_shift_threshold as i64) as u32,
        gear_shift_snr_up_db: config.get_float("arq.gear_shift_snr_up_db", default.gear_shift_snr_up_db),
        gear_shift_snr_down_db: config.get_float("arq.gear_shift_snr_down_db", default.gear_shift_snr_down_db),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sections_comments_and_quoted_values() {
        let content = "\
# a comment
callsign = NOCALL

[arq]
max_retries=7
gear_shift_enabled = \"true\"
";
        let config = ConfigFile::parse(content);
        assert_eq!(config.get("callsign", ""), "NOCALL");
        assert_eq!(config.get_int("arq.max_retries", 0), 7);
        assert!(config.get_bool("arq.gear_shift_enabled", false));
    }

    #[test]
    fn keys_and_sections_are_case_insensitive() {
        let content = "\
CallSign = NOCALL

[ARQ]
Max_Retries = 7
";
        let config = ConfigFile::parse(content);
        assert_eq!(config.get("callsign", ""), "NOCALL");
        assert_eq!(config.get("CALLSIGN", ""), "NOCALL");
        assert_eq!(config.get_int("arq.max_retries", 0), 7);
        assert_eq!(config.get_int("ARQ.MAX_RETRIES", 0), 7);
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let config = ConfigFile::parse("");
        assert_eq!(config.get("nope", "fallback"), "fallback");
        assert_eq!(config.get_int("nope", 42), 42);
        assert!(!config.get_bool("nope", false));
    }

    #[test]
    fn build_arq_config_overrides_only_present_keys() {
        let config = ConfigFile::parse("[arq]\nmax_retries=2\n");
        let arq_config = build_arq_config(&config);
        assert_eq!(arq_config.max_retries, 2);
        assert_eq!(arq_config.n_messages, mercury_arq::controller::ArqConfig::default().n_messages);
    }

    /// Looking a key up is unaffected by re-casing any letters in it, for
    /// any alphabetic key name and any value.
    #[quickcheck_macros::quickcheck]
    fn lookup_is_case_insensitive_for_any_key(key_letters: Vec<bool>, value: u16) -> bool {
        if key_letters.is_empty() {
            return true;
        }
        let key: String = key_letters.iter().map(|&upper| if upper { 'A' } else { 'a' }).collect();
        let content = format!("{key}={value}");
        let config = ConfigFile::parse(&content);

        let lower = config.get_int(&key.to_lowercase(), -1);
        let upper = config.get_int(&key.to_uppercase(), -1);
        lower == value as i64 && upper == value as i64
    }
}
