//! Named, validated scene configuration slots.

use thiserror::Error;

use crate::util;

/// A single configurable value of a scene.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SceneOption {
    pub name: String,
    pub value: String,
    pub default_value: String,
    pub description: String,
    /// Empty means any value is accepted.
    pub acceptable_values: Vec<String>,
    /// Whether the value was explicitly set for the current run.
    pub set: bool,
}

impl SceneOption {
    /// Create an option whose value starts at `default_value`.
    ///
    /// `values` is a comma separated list of acceptable values; an empty
    /// string accepts anything.
    pub fn new(name: &str, default_value: &str, description: &str, values: &str) -> Self {
        Self {
            name: name.to_string(),
            value: default_value.to_string(),
            default_value: default_value.to_string(),
            description: description.to_string(),
            acceptable_values: util::split(values, ',')
                .into_iter()
                .map(str::to_string)
                .collect(),
            set: false,
        }
    }

    pub fn accepts_value(&self, value: &str) -> bool {
        self.acceptable_values.is_empty() || self.acceptable_values.iter().any(|v| v == value)
    }
}

/// Why a scene refused an option assignment.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionError {
    #[error("no such option")]
    NoSuchOption,
    #[error("value not accepted")]
    RejectedValue,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_any_value_accepted_without_list() {
        let opt = SceneOption::new("duration", "10.0", "How long", "");
        assert!(opt.acceptable_values.is_empty());
        assert!(opt.accepts_value("anything"));
        assert_eq!(opt.value, opt.default_value);
        assert!(!opt.set);
    }

    #[test]
    fn test_enumerated_values() {
        let opt = SceneOption::new("mode", "fast", "Mode", "fast,slow");
        assert_eq!(opt.acceptable_values, vec!["fast", "slow"]);
        assert!(opt.accepts_value("slow"));
        assert!(!opt.accepts_value("medium"));
    }
}
