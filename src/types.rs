//! Type-safe project description types.
//!
//! Custom actions are a closed enum keyed by the `change_type` field of the
//! project JSON, so an unknown action kind is rejected when the project is
//! loaded instead of being silently skipped at run time. Numeric and boolean
//! fields also accept their string spelling (`"4"`, `"true"`), which is how
//! hand-edited projects and expanded templates usually carry them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumIter, EnumString};

use crate::error::{AutomationError, Result};

/// Lenient deserializers for fields that may arrive as strings.
pub(crate) mod lenient {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Number(f64),
        Text(String),
        Null(()),
    }

    pub fn f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        opt_f64(deserializer)?.ok_or_else(|| D::Error::custom("expected a number"))
    }

    pub fn opt_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(Some(n)),
            Raw::Text(s) if s.trim().is_empty() => Ok(None),
            Raw::Text(s) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| D::Error::custom(format!("expected a number, got '{}'", s))),
            Raw::Null(()) => Ok(None),
            Raw::Bool(b) => Err(D::Error::custom(format!("expected a number, got {}", b))),
        }
    }

    pub fn u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        let n = f64(deserializer)?;
        if n < 0.0 || n.fract() != 0.0 || n > f64::from(u32::MAX) {
            return Err(D::Error::custom(format!("expected a non-negative integer, got {}", n)));
        }
        Ok(n as u32)
    }

    pub fn bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Bool(b) => Ok(b),
            Raw::Number(n) => Ok(n != 0.0),
            Raw::Text(s) => match s.trim().to_lowercase().as_str() {
                "true" | "yes" | "1" => Ok(true),
                "false" | "no" | "0" | "" => Ok(false),
                other => Err(D::Error::custom(format!("expected a boolean, got '{}'", other))),
            },
            Raw::Null(()) => Ok(false),
        }
    }
}

/// Declared resource media type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ResourceKind {
    Image,
    Audio,
    Video,
}

impl ResourceKind {
    /// Audio and video carry a playable duration worth probing
    pub fn has_duration(&self) -> bool {
        matches!(self, Self::Audio | Self::Video)
    }

    /// Guess the kind from a file extension
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "mp3" | "wav" | "aac" | "m4a" | "aif" | "aiff" | "ogg" | "flac" => Self::Audio,
            "mp4" | "mov" | "avi" | "mkv" | "webm" | "m4v" | "mxf" => Self::Video,
            _ => Self::Image,
        }
    }
}

/// Keyframed transition presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TransitionType {
    #[default]
    FadeIn,
    FadeOut,
    CrossDissolve,
    SlideLeft,
    SlideRight,
    WipeLeft,
}

/// A time given either as seconds or as an `HH:MM:SS` timecode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeValue {
    Seconds(f64),
    Timecode(String),
}

impl Default for TimeValue {
    fn default() -> Self {
        Self::Seconds(0.0)
    }
}

impl TimeValue {
    /// Convert to seconds.
    ///
    /// Timecodes must be `HH:MM:SS` (seconds may be fractional); a bare
    /// numeric string is read as seconds.
    pub fn to_seconds(&self) -> Result<f64> {
        match self {
            Self::Seconds(s) => Ok(*s),
            Self::Timecode(text) => parse_timecode(text),
        }
    }
}

/// Parse `HH:MM:SS` (or a plain number of seconds) into seconds.
pub fn parse_timecode(text: &str) -> Result<f64> {
    let text = text.trim();
    let invalid = || AutomationError::config("timecode", format!("expected HH:MM:SS, got '{}'", text));

    if !text.contains(':') {
        return text.parse::<f64>().map_err(|_| invalid());
    }

    let parts: Vec<&str> = text.split(':').collect();
    if parts.len() != 3 {
        return Err(invalid());
    }
    let hours: u32 = parts[0].parse().map_err(|_| invalid())?;
    let minutes: u32 = parts[1].parse().map_err(|_| invalid())?;
    let seconds: f64 = parts[2].parse().map_err(|_| invalid())?;
    if minutes >= 60 || !(0.0..60.0).contains(&seconds) {
        return Err(invalid());
    }
    Ok(f64::from(hours) * 3600.0 + f64::from(minutes) * 60.0 + seconds)
}

/// Render a JSON value the way the host scripts expect it in a placeholder.
pub fn host_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Array(items) => items.iter().map(host_string).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    }
}

/// One property assignment of an `apply_template_values` action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateValue {
    pub layer_name: String,
    pub property_name: String,
    #[serde(default)]
    pub property_type: Option<String>,
    pub value: Value,
}

/// Values document referenced by `values_file`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateValuesFile {
    #[serde(default)]
    pub comp_name: Option<String>,
    #[serde(default)]
    pub values: Vec<TemplateValue>,
}

/// A single declarative edit applied to a scene's composition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "change_type", rename_all = "snake_case")]
pub enum CustomAction {
    /// Set a layer property
    UpdateLayerProperty {
        comp_name: String,
        layer_name: String,
        property_name: String,
        #[serde(default)]
        property_type: Option<String>,
        value: Value,
    },

    /// Set a layer property as a keyframe at a frame
    UpdateLayerPropertyAtFrame {
        comp_name: String,
        layer_name: String,
        property_name: String,
        #[serde(default)]
        property_type: Option<String>,
        value: Value,
        #[serde(deserialize_with = "lenient::f64")]
        frame: f64,
    },

    /// Place an imported resource on a composition's timeline
    AddResource {
        comp_name: String,
        resource_name: String,
        #[serde(rename = "startTime", alias = "start_time", default, deserialize_with = "lenient::f64")]
        start_time: f64,
        /// Zero or absent means "use the resource's probed duration"
        #[serde(default, deserialize_with = "lenient::opt_f64")]
        duration: Option<f64>,
        #[serde(rename = "moveToEnd", alias = "move_to_end", default, deserialize_with = "lenient::bool")]
        move_to_end: bool,
    },

    /// Retime an existing layer
    EditResource {
        comp_name: String,
        #[serde(rename = "layerIndex", alias = "layer_index", deserialize_with = "lenient::u32")]
        layer_index: u32,
        #[serde(rename = "startTime", alias = "start_time", default, deserialize_with = "lenient::f64")]
        start_time: f64,
        #[serde(default, deserialize_with = "lenient::f64")]
        duration: f64,
        #[serde(rename = "moveToEnd", alias = "move_to_end", default, deserialize_with = "lenient::bool")]
        move_to_end: bool,
    },

    /// Replace the source of the layer at an index with a project item
    SwapItemsByIndex {
        comp_name: String,
        #[serde(deserialize_with = "lenient::u32")]
        layer_index: u32,
        /// Project item that becomes the layer's new source
        layer_name: String,
        #[serde(default, deserialize_with = "lenient::bool")]
        fit_to_screen: bool,
        #[serde(default, deserialize_with = "lenient::bool")]
        fit_to_screen_width: bool,
        #[serde(default, deserialize_with = "lenient::bool")]
        fit_to_screen_height: bool,
    },

    /// Add a named marker to a layer
    AddMarker {
        comp_name: String,
        layer_name: String,
        marker_name: String,
        #[serde(deserialize_with = "lenient::f64")]
        marker_time: f64,
    },

    /// Expand a named action template with arguments
    Template {
        template_name: String,
        #[serde(default)]
        template_values: Map<String, Value>,
    },

    /// Place another composition inside the scene's composition
    AddComp {
        comp_name: String,
        #[serde(rename = "startTime", alias = "start_time", default, deserialize_with = "lenient::f64")]
        start_time: f64,
        #[serde(default, deserialize_with = "lenient::f64")]
        duration: f64,
    },

    /// Apply a list of property values, inline or from a values file
    ApplyTemplateValues {
        comp_name: String,
        #[serde(default)]
        values_file: Option<PathBuf>,
        #[serde(default)]
        values: Vec<TemplateValue>,
    },

    /// Keyframe a transition preset on a layer
    AddTransition {
        comp_name: String,
        layer_name: String,
        #[serde(default)]
        transition_type: TransitionType,
        #[serde(default, deserialize_with = "lenient::f64")]
        start_time: f64,
        #[serde(default = "default_transition_duration", deserialize_with = "lenient::f64")]
        duration: f64,
    },
}

fn default_transition_duration() -> f64 {
    1.0
}

impl CustomAction {
    /// The `change_type` discriminator as written in project files
    pub fn change_type(&self) -> &'static str {
        match self {
            Self::UpdateLayerProperty { .. } => "update_layer_property",
            Self::UpdateLayerPropertyAtFrame { .. } => "update_layer_property_at_frame",
            Self::AddResource { .. } => "add_resource",
            Self::EditResource { .. } => "edit_resource",
            Self::SwapItemsByIndex { .. } => "swap_items_by_index",
            Self::AddMarker { .. } => "add_marker",
            Self::Template { .. } => "template",
            Self::AddComp { .. } => "add_comp",
            Self::ApplyTemplateValues { .. } => "apply_template_values",
            Self::AddTransition { .. } => "add_transition",
        }
    }

    /// Parse one action object
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| AutomationError::config("custom_actions", e.to_string()))
    }
}
