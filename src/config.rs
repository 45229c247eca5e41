use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::VariableSettings;

/// Settings of an [`Editor`](crate::Editor).
///
/// Missing fields take their default value when deserialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Quiet period before a context change or an expression is persisted.
    pub debounce_ms: u64,

    /// Settings given to a variable the first time it appears.
    pub default_variable: VariableSettings,

    /// Names that are constants rather than variables, compared case-insensitively.
    pub reserved_names: Vec<String>,
}

impl EditorConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn is_reserved(&self, name: &str) -> bool {
        self.reserved_names
            .iter()
            .any(|reserved| reserved.eq_ignore_ascii_case(name))
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 0,
            default_variable: VariableSettings::default(),
            reserved_names: ["E", "LN10", "LN2", "LOG10E", "LOG2E", "PI", "SQRT1_2", "SQRT2"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::VariableKind;

    #[test]
    fn missing_fields_take_defaults() {
        let config: EditorConfig = serde_json::from_str(r#"{ "debounce_ms": 250 }"#).unwrap();
        assert_eq!(
            config,
            EditorConfig {
                debounce_ms: 250,
                ..EditorConfig::default()
            }
        );
        assert_eq!(config.debounce(), Duration::from_millis(250));
    }

    #[test]
    fn default_variable_from_json() {
        let config: EditorConfig = serde_json::from_str(
            r#"{ "default_variable": { "kind": "range", "value": 5, "min": 0, "max": 100 } }"#,
        )
        .unwrap();
        assert_eq!(config.default_variable.kind, VariableKind::Range);
        assert_eq!(config.default_variable.max, 100.0);
        assert_eq!(config.debounce_ms, 0);
    }

    #[test]
    fn reserved_names_ignore_case() {
        let config = EditorConfig::default();
        assert!(config.is_reserved("pi"));
        assert!(config.is_reserved("Log2e"));
        assert!(!config.is_reserved("x"));
        assert!(!config.is_reserved("PIE"));
    }
}
