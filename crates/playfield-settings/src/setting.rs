//! Typed option declarations and resolved configuration values.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::environment::EnvironmentValue;

// ---------------------------------------------------------------------------
// SettingKind / SettingValue
// ---------------------------------------------------------------------------

/// The closed set of value kinds a game setting can have.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SettingKind {
    /// An integer bounded to `min..=max` (inclusive).
    Number { min: i64, max: i64 },

    /// One entry out of a fixed list of choices.
    Choice { options: Vec<String> },

    /// The composite environment bundle (time, weather, gravity).
    Environment,
}

/// A concrete value for a setting of the matching [`SettingKind`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum SettingValue {
    Number(i64),
    Choice(String),
    Environment(EnvironmentValue),
}

impl SettingValue {
    /// Human-readable rendering for customization menus.
    pub fn summary(&self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Choice(c) => c.clone(),
            Self::Environment(env) => env.describe(),
        }
    }

    /// Whether this value is acceptable for the given kind.
    pub fn matches(&self, kind: &SettingKind) -> bool {
        match (self, kind) {
            (Self::Number(n), SettingKind::Number { min, max }) => (*min..=*max).contains(n),
            (Self::Choice(c), SettingKind::Choice { options }) => options.contains(c),
            (Self::Environment(_), SettingKind::Environment) => true,
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// SettingDeclaration
// ---------------------------------------------------------------------------

/// One configurable option declared by a game.
///
/// Declarations are ordered: customization menus list them in the order
/// the game declared them. Names must be unique within one game, which
/// the descriptor validates at registration time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingDeclaration {
    name: String,
    label: String,
    kind: SettingKind,
    default: SettingValue,
}

impl SettingDeclaration {
    pub fn new(
        name: impl Into<String>,
        label: impl Into<String>,
        kind: SettingKind,
        default: SettingValue,
    ) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            kind,
            default,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn kind(&self) -> &SettingKind {
        &self.kind
    }

    pub fn default_value(&self) -> &SettingValue {
        &self.default
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// The resolved settings for one session, fixed once the session starts.
///
/// Produced by the [`crate::CustomizationEngine`]; games read values
/// through the typed accessors and fall back to their own defaults for
/// anything absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    values: BTreeMap<String, SettingValue>,
}

impl Configuration {
    pub(crate) fn insert(&mut self, name: impl Into<String>, value: SettingValue) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&SettingValue> {
        self.values.get(name)
    }

    pub fn number(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(SettingValue::Number(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn choice(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(SettingValue::Choice(c)) => Some(c.as_str()),
            _ => None,
        }
    }

    pub fn environment(&self, name: &str) -> Option<&EnvironmentValue> {
        match self.values.get(name) {
            Some(SettingValue::Environment(env)) => Some(env),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SettingValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}
