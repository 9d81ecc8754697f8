pub mod input;
pub mod metrics;
pub mod probe;
pub mod record;
pub mod trial;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Top200,
    Trigraphs,
    Nonsense,
    Calibration,
    TrigraphTest,
}

impl Mode {
    pub const ALL: [Mode; 5] = [
        Mode::Top200,
        Mode::Trigraphs,
        Mode::Nonsense,
        Mode::Calibration,
        Mode::TrigraphTest,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Top200 => "top200",
            Mode::Trigraphs => "trigraphs",
            Mode::Nonsense => "nonsense",
            Mode::Calibration => "calibration",
            Mode::TrigraphTest => "trigraph_test",
        }
    }

    /// Probe mode runs every text twice: practice, then recorded.
    pub fn is_probe(self) -> bool {
        matches!(self, Mode::TrigraphTest)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mode::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| {
                let valid: Vec<&str> = Mode::ALL.iter().map(|m| m.as_str()).collect();
                format!("unknown mode '{s}' (expected one of: {})", valid.join(", "))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_strings_match_serde() {
        for mode in Mode::ALL {
            let json = serde_json::to_string(&mode).unwrap();
            assert_eq!(json, format!("\"{}\"", mode.as_str()));
            assert_eq!(mode.as_str().parse::<Mode>().unwrap(), mode);
        }
    }

    #[test]
    fn only_trigraph_test_is_probe() {
        assert!(Mode::TrigraphTest.is_probe());
        assert!(!Mode::Trigraphs.is_probe());
    }

    #[test]
    fn unknown_mode_is_rejected() {
        let err = "shell".parse::<Mode>().unwrap_err();
        assert!(err.contains("top200"));
    }
}
