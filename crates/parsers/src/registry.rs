use std::collections::HashMap;

use regex::Regex;

/// Output shape selects which normalizer turns raw stdout text into
/// structured records (§4.3). Closed set, known at compile time — a new
/// shape is a compiler-visible change, not config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputShape {
    Csv,
    KeyValue,
    StructuredBlocks,
    FreeText
}

/// One registered parser mode: how to invoke it and how to read its output.
#[derive(Clone)]
pub struct ParserMode {
    pub mode_key: String,
    pub spawn_args_template: Vec<String>,
    pub output_shape: OutputShape,
    /// Only meaningful for `StructuredBlocks`: the line pattern that opens a
    /// new block (e.g. `^Modem \d+`).
    pub block_header_pattern: Option<Regex>,
    /// Only meaningful for `FreeText`: cap on lines retained (default 1000).
    pub free_text_line_cap: usize
}

impl ParserMode {
    pub fn spawn_args(&self, archive_path: &str, timezone: &str, window: Option<(&str, &str)>) -> Vec<String> {
        self.spawn_args_template
            .iter()
            .map(|arg| {
                let arg = arg.replace("{archive}", archive_path).replace("{timezone}", timezone);
                match window {
                    Some((t0, t1)) => arg.replace("{window_start}", t0).replace("{window_end}", t1),
                    None => arg
                }
            })
            .collect()
    }
}

/// `mode_key -> ParserMode` lookup table (§4.3). Built once at startup from
/// static definitions; descriptor visibility (enabled/admin_only/overrides)
/// lives in `core::ParserDescriptor`, not here — this registry only knows
/// how to run a mode once it has already been deemed visible.
pub struct ParserRegistry {
    modes: HashMap<String, ParserMode>
}

impl ParserRegistry {
    pub fn new(modes: Vec<ParserMode>) -> Self {
        Self { modes: modes.into_iter().map(|m| (m.mode_key.clone(), m)).collect() }
    }

    #[must_use]
    pub fn get(&self, mode_key: &str) -> Option<&ParserMode> {
        self.modes.get(mode_key)
    }

    pub fn mode_keys(&self) -> impl Iterator<Item = &str> {
        self.modes.keys().map(String::as_str)
    }

    /// The built-in modes this deployment ships with. Operators may still
    /// register more in `storage`-backed `ParserDescriptor` rows; those
    /// without a matching entry here fail fast with `UnknownMode` rather
    /// than silently no-op.
    pub fn builtin() -> Self {
        Self::new(vec![
            ParserMode {
                mode_key: "bandwidth".to_string(),
                spawn_args_template: vec![
                    "bandwidth-extract".to_string(),
                    "--input".to_string(),
                    "{archive}".to_string(),
                    "--tz".to_string(),
                    "{timezone}".to_string(),
                ],
                output_shape: OutputShape::Csv,
                block_header_pattern: None,
                free_text_line_cap: 1000
            },
            ParserMode {
                mode_key: "modem_status".to_string(),
                spawn_args_template: vec![
                    "modem-status-extract".to_string(),
                    "--input".to_string(),
                    "{archive}".to_string(),
                ],
                output_shape: OutputShape::StructuredBlocks,
                block_header_pattern: Some(Regex::new(r"^Modem \d+").expect("static pattern is valid")),
                free_text_line_cap: 1000
            },
            ParserMode {
                mode_key: "system_info".to_string(),
                spawn_args_template: vec![
                    "system-info-extract".to_string(),
                    "--input".to_string(),
                    "{archive}".to_string(),
                ],
                output_shape: OutputShape::KeyValue,
                block_header_pattern: None,
                free_text_line_cap: 1000
            },
            ParserMode {
                mode_key: "raw_syslog".to_string(),
                spawn_args_template: vec!["syslog-extract".to_string(), "--input".to_string(), "{archive}".to_string()],
                output_shape: OutputShape::FreeText,
                block_header_pattern: None,
                free_text_line_cap: 1000
            },
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_args_interpolates_placeholders() {
        let registry = ParserRegistry::builtin();
        let mode = registry.get("bandwidth").unwrap();
        let args = mode.spawn_args("/tmp/a.tar.gz", "UTC", None);
        assert!(args.contains(&"/tmp/a.tar.gz".to_string()));
        assert!(args.contains(&"UTC".to_string()));
    }

    #[test]
    fn unknown_mode_key_returns_none() {
        let registry = ParserRegistry::builtin();
        assert!(registry.get("nonexistent").is_none());
    }
}
