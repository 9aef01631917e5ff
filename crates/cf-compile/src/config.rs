//! Compile configuration.

use cf_core::{s, Time};
use serde::{Deserialize, Serialize};

use crate::error::{CompileResult, MappingError};

/// Options for a compile session, loadable from YAML:
///
/// ```yaml
/// cycle_period_s: 0.004
/// completion_tolerance: 0.001
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileConfig {
    /// Nominal executor cycle length in seconds.
    pub cycle_period_s: f64,
    /// Distance below which a ramp counts as arrived.
    pub completion_tolerance: f64,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            cycle_period_s: 0.004,
            completion_tolerance: 1e-3,
        }
    }
}

impl CompileConfig {
    pub fn from_yaml_str(yaml: &str) -> CompileResult<Self> {
        let config: CompileConfig =
            serde_yaml::from_str(yaml).map_err(|e| MappingError::Config { what: e.to_string() })?;
        config.check()?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> CompileResult<String> {
        serde_yaml::to_string(self).map_err(|e| MappingError::Config { what: e.to_string() })
    }

    pub fn cycle_period(&self) -> Time {
        s(self.cycle_period_s)
    }

    pub fn check(&self) -> CompileResult<()> {
        if !(self.cycle_period_s.is_finite() && self.cycle_period_s > 0.0) {
            return Err(MappingError::Config {
                what: format!("cycle_period_s must be positive, got {}", self.cycle_period_s),
            });
        }
        if !(self.completion_tolerance.is_finite() && self.completion_tolerance >= 0.0) {
            return Err(MappingError::Config {
                what: format!(
                    "completion_tolerance must be non-negative, got {}",
                    self.completion_tolerance
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_uses_defaults() {
        let config = CompileConfig::from_yaml_str("cycle_period_s: 0.01\n").unwrap();
        assert_eq!(config.cycle_period_s, 0.01);
        assert_eq!(config.completion_tolerance, 1e-3);
    }

    #[test]
    fn yaml_round_trip() {
        let config = CompileConfig {
            cycle_period_s: 0.002,
            completion_tolerance: 0.05,
        };
        let yaml = config.to_yaml_string().unwrap();
        assert_eq!(CompileConfig::from_yaml_str(&yaml).unwrap(), config);
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(matches!(
            CompileConfig::from_yaml_str("cycle_period_s: 0.0"),
            Err(MappingError::Config { .. })
        ));
        assert!(matches!(
            CompileConfig::from_yaml_str("completion_tolerance: near"),
            Err(MappingError::Config { .. })
        ));
    }
}
