//! The environment composite: time of day, weather and gravity.
//!
//! Stored environment data arrives as plain strings; parsing is strict,
//! and an unrecognized value is a [`ConfigurationDataError`] rather than
//! a silent fallback.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationDataError;

// ---------------------------------------------------------------------------
// Option catalogs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl TimeOfDay {
    pub const ALL: [TimeOfDay; 4] = [
        Self::Morning,
        Self::Afternoon,
        Self::Evening,
        Self::Night,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Weather {
    Cloudy,
    Foggy,
    Heatwave,
    Rainy,
    Sandstorm,
    Sunny,
}

impl Weather {
    pub const ALL: [Weather; 6] = [
        Self::Cloudy,
        Self::Foggy,
        Self::Heatwave,
        Self::Rainy,
        Self::Sandstorm,
        Self::Sunny,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gravity {
    Low,
    Normal,
    High,
}

impl Gravity {
    pub const ALL: [Gravity; 3] = [Self::Low, Self::Normal, Self::High];
}

macro_rules! impl_catalog_strings {
    ($ty:ident { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $(Self::$variant => f.write_str($name),)+
                }
            }
        }

        impl FromStr for $ty {
            type Err = ConfigurationDataError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok(Self::$variant),)+
                    other => Err(ConfigurationDataError(format!(
                        concat!("invalid ", stringify!($ty), " value: {}"),
                        other
                    ))),
                }
            }
        }
    };
}

impl_catalog_strings!(TimeOfDay {
    Morning => "Morning",
    Afternoon => "Afternoon",
    Evening => "Evening",
    Night => "Night",
});

impl_catalog_strings!(Weather {
    Cloudy => "Cloudy",
    Foggy => "Foggy",
    Heatwave => "Heatwave",
    Rainy => "Rainy",
    Sandstorm => "Sandstorm",
    Sunny => "Sunny",
});

impl_catalog_strings!(Gravity {
    Low => "Low",
    Normal => "Normal",
    High => "High",
});

// ---------------------------------------------------------------------------
// EnvironmentValue
// ---------------------------------------------------------------------------

/// A full environment bundle for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentValue {
    pub time: TimeOfDay,
    pub weather: Weather,
    pub gravity: Gravity,
}

impl Default for EnvironmentValue {
    fn default() -> Self {
        Self {
            time: TimeOfDay::Afternoon,
            weather: Weather::Sunny,
            gravity: Gravity::Normal,
        }
    }
}

impl EnvironmentValue {
    /// Parses an environment bundle out of stored string data.
    pub fn from_stored(
        time: &str,
        weather: &str,
        gravity: &str,
    ) -> Result<Self, ConfigurationDataError> {
        Ok(Self {
            time: time.parse()?,
            weather: weather.parse()?,
            gravity: gravity.parse()?,
        })
    }

    /// Renders the single-line summary shown in customization menus.
    ///
    /// Regular weather reads "<weather> <time>" ("Sunny afternoon");
    /// heatwaves and sandstorms read time-first ("Morning heatwave",
    /// "Nightly sandstorm"). Non-default gravity is appended as
    /// ", low gravity" / ", high gravity".
    pub fn describe(&self) -> String {
        let mut value = match self.weather {
            Weather::Cloudy | Weather::Foggy | Weather::Rainy | Weather::Sunny => {
                format!("{} {}", self.weather, lowercase(self.time))
            }
            Weather::Heatwave | Weather::Sandstorm => {
                if self.time == TimeOfDay::Night {
                    format!("Nightly {}", lowercase(self.weather))
                } else {
                    format!("{} {}", self.time, lowercase(self.weather))
                }
            }
        };

        if self.gravity != Gravity::Normal {
            value.push_str(&format!(", {} gravity", lowercase(self.gravity)));
        }

        value
    }
}

fn lowercase(value: impl fmt::Display) -> String {
    value.to_string().to_lowercase()
}
