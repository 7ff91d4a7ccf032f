use serde::{Deserialize, Serialize};
use std::fmt;

/// Tyre compound. Each one carries a fixed base pace and a linear wear rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String")]
pub enum Compound {
    Soft,
    Medium,
    Hard,
}

impl Compound {
    pub const ALL: [Compound; 3] = [Compound::Soft, Compound::Medium, Compound::Hard];

    /// Lap time on brand new tyres (s).
    pub const fn base_lap_time(self) -> f64 {
        match self {
            Compound::Soft => 80.0,
            Compound::Medium => 80.8,
            Compound::Hard => 81.5,
        }
    }

    /// Seconds lost per lap of tyre age.
    pub const fn degradation_rate(self) -> f64 {
        match self {
            Compound::Soft => 0.40,
            Compound::Medium => 0.15,
            Compound::Hard => 0.08,
        }
    }

    /// Lap time for a set of this compound that has already done `tyre_age` laps.
    ///
    /// The wear rate comes from the compound, never from the car.
    pub fn lap_time(self, tyre_age: u32) -> f64 {
        self.base_lap_time() + self.degradation_rate() * f64::from(tyre_age)
    }

    /// Resolve a compound name case-insensitively.
    ///
    /// This is deliberately non-strict: any name that is not soft or medium
    /// resolves to `Hard` instead of failing.
    pub fn from_name_lenient(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "soft" => Compound::Soft,
            "medium" => Compound::Medium,
            "hard" => Compound::Hard,
            other => {
                tracing::warn!("unknown compound {:?}, falling back to Hard", other);
                Compound::Hard
            }
        }
    }
}

impl From<String> for Compound {
    fn from(name: String) -> Self {
        Compound::from_name_lenient(&name)
    }
}

impl fmt::Display for Compound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Compound::Soft => "Soft",
            Compound::Medium => "Medium",
            Compound::Hard => "Hard",
        };
        f.write_str(name)
    }
}
