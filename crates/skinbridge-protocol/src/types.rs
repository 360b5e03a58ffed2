use serde::{Deserialize, Serialize};

/// Logical identifier of a visual asset the overlay needs from the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKey {
    /// Flag image drawn on the located anchor.
    Flag,
    /// Control image shown while the control mode is disabled.
    DiceDisabled,
    /// Control image shown while the control mode is enabled.
    DiceEnabled,
}

impl ResourceKey {
    pub const ALL: [ResourceKey; 3] = [Self::Flag, Self::DiceDisabled, Self::DiceEnabled];

    /// Logical wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flag => "flag",
            Self::DiceDisabled => "dice-disabled",
            Self::DiceEnabled => "dice-enabled",
        }
    }

    /// File name of the packaged asset the controller serves for this key.
    pub fn asset_path(&self) -> &'static str {
        match self {
            Self::Flag => "random_flag.png",
            Self::DiceDisabled => "dice-disabled.png",
            Self::DiceEnabled => "dice-enabled.png",
        }
    }

    /// Accepts either the logical name or the asset file name.
    pub fn from_wire(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == value || key.asset_path() == value)
    }
}

impl std::fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A delivered resource, as referenced by the host (an image URL).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceHandle(String);

impl ResourceHandle {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// CSS `url(...)` value for a background image.
    pub fn css_url(&self) -> String {
        let mut escaped = String::with_capacity(self.0.len());
        for c in self.0.chars() {
            if matches!(c, '"' | '\\') {
                escaped.push('\\');
            }
            escaped.push(c);
        }
        format!("url(\"{escaped}\")")
    }
}

impl std::fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Mode of the injected control, chosen by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlMode {
    #[default]
    Disabled,
    Enabled,
}

impl ControlMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Enabled => "enabled",
        }
    }

    /// Image shown on the control in this mode.
    pub fn resource_key(&self) -> ResourceKey {
        match self {
            Self::Disabled => ResourceKey::DiceDisabled,
            Self::Enabled => ResourceKey::DiceEnabled,
        }
    }

    pub fn other(&self) -> ControlMode {
        match self {
            Self::Disabled => Self::Enabled,
            Self::Enabled => Self::Disabled,
        }
    }
}

impl std::fmt::Display for ControlMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Latest activation received from the controller. Replaced wholesale on
/// every state update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActivationState {
    pub active: bool,
    pub control_mode: ControlMode,
}

/// Severity of a log record forwarded to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}
