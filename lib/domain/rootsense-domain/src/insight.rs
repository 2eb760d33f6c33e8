use std::fmt;

use serde::{Deserialize, Serialize};

/// Efficiency band for a REI score.
///
/// The bands partition the real line at 50, 80 and 100. Checks run top-down
/// and the first match wins, so 100 is efficient and anything above it is
/// under-utilized. NaN falls through to [`Insight::Inefficient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Insight {
    HighlyEfficient,
    Efficient,
    SomewhatInefficient,
    Inefficient,
}

impl Insight {
    pub fn classify(score: f64) -> Self {
        if score > 100.0 {
            Insight::HighlyEfficient
        } else if (80.0..=100.0).contains(&score) {
            Insight::Efficient
        } else if (50.0..80.0).contains(&score) {
            Insight::SomewhatInefficient
        } else {
            Insight::Inefficient
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Insight::HighlyEfficient => "highly efficient, under-utilized",
            Insight::Efficient => "operating efficiently, optimal utilization",
            Insight::SomewhatInefficient => "somewhat inefficient, room for improvement",
            Insight::Inefficient => "inefficient, needs optimization",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        [
            Insight::HighlyEfficient,
            Insight::Efficient,
            Insight::SomewhatInefficient,
            Insight::Inefficient,
        ]
        .into_iter()
        .find(|insight| insight.label() == label)
    }
}

impl fmt::Display for Insight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
