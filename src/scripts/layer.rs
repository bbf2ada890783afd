//! Type-safe arguments for layer-editing host scripts.
//!
//! This module provides typed argument structs for scripts that edit the
//! layers of a composition:
//! - `UpdatePropertyArgs` for `update_properties.jsx`
//! - `UpdatePropertyAtFrameArgs` for `update_properties_frame.jsx`
//! - `AddResourceArgs` for `add_resource.jsx`
//! - `UpdateResourceArgs` for `update_resource.jsx`
//! - `AddMarkerArgs` for `add_marker.jsx`
//! - `AddTransitionArgs` for `add_transition.jsx`

use crate::script_traits::{ScriptArgs, flag, number, pairs, quoted};
use crate::scripts::LayerTiming;
use crate::types::TransitionType;

// ============================================================================
// Update Property
// ============================================================================

/// Type-safe arguments for `update_properties.jsx`.
#[derive(Debug, Clone)]
pub struct UpdatePropertyArgs {
    pub comp_name: String,
    pub layer_name: String,
    /// Dotted property path (e.g. `Source Text` or `Transform.Position`).
    pub property_name: String,
    /// Value already converted to host form (colors as `r,g,b,a`).
    pub value: String,
}

impl ScriptArgs for UpdatePropertyArgs {
    fn replacements(&self) -> Vec<(String, String)> {
        pairs([
            ("comp_name", quoted(&self.comp_name)),
            ("layer_name", quoted(&self.layer_name)),
            ("property_name", quoted(&self.property_name)),
            ("value", quoted(&self.value)),
        ])
    }

    fn script_name(&self) -> &'static str {
        "update_properties.jsx"
    }
}

// ============================================================================
// Update Property At Frame
// ============================================================================

/// Type-safe arguments for `update_properties_frame.jsx`.
#[derive(Debug, Clone)]
pub struct UpdatePropertyAtFrameArgs {
    pub property: UpdatePropertyArgs,
    /// Keyframe position in frames of the composition.
    pub frame: f64,
}

impl ScriptArgs for UpdatePropertyAtFrameArgs {
    fn replacements(&self) -> Vec<(String, String)> {
        let mut subs = self.property.replacements();
        subs.push(("frame".to_string(), number(self.frame)));
        subs
    }

    fn script_name(&self) -> &'static str {
        "update_properties_frame.jsx"
    }
}

// ============================================================================
// Add Resource
// ============================================================================

/// Type-safe arguments for `add_resource.jsx`.
#[derive(Debug, Clone)]
pub struct AddResourceArgs {
    pub comp_name: String,
    /// Project item placed as a new layer.
    pub resource_name: String,
    pub timing: LayerTiming,
    /// Move the new layer to the bottom of the stack.
    pub move_to_end: bool,
}

impl ScriptArgs for AddResourceArgs {
    fn replacements(&self) -> Vec<(String, String)> {
        let mut subs = pairs([
            ("comp_name", quoted(&self.comp_name)),
            ("resource_name", quoted(&self.resource_name)),
            ("move_to_end", flag(self.move_to_end)),
        ]);
        subs.extend(pairs(self.timing.replacements()));
        subs
    }

    fn script_name(&self) -> &'static str {
        "add_resource.jsx"
    }
}

// ============================================================================
// Update Resource
// ============================================================================

/// Type-safe arguments for `update_resource.jsx`.
#[derive(Debug, Clone)]
pub struct UpdateResourceArgs {
    pub comp_name: String,
    /// One-based layer index.
    pub layer_index: u32,
    pub timing: LayerTiming,
    pub move_to_end: bool,
}

impl ScriptArgs for UpdateResourceArgs {
    fn replacements(&self) -> Vec<(String, String)> {
        let mut subs = pairs([
            ("comp_name", quoted(&self.comp_name)),
            ("layer_index", self.layer_index.to_string()),
            ("move_to_end", flag(self.move_to_end)),
        ]);
        subs.extend(pairs(self.timing.replacements()));
        subs
    }

    fn script_name(&self) -> &'static str {
        "update_resource.jsx"
    }
}

// ============================================================================
// Add Marker
// ============================================================================

/// Type-safe arguments for `add_marker.jsx`.
#[derive(Debug, Clone)]
pub struct AddMarkerArgs {
    pub comp_name: String,
    pub layer_name: String,
    pub marker_name: String,
    /// Marker position in seconds.
    pub marker_time: f64,
}

impl ScriptArgs for AddMarkerArgs {
    fn replacements(&self) -> Vec<(String, String)> {
        pairs([
            ("comp_name", quoted(&self.comp_name)),
            ("layer_name", quoted(&self.layer_name)),
            ("marker_name", quoted(&self.marker_name)),
            ("marker_time", number(self.marker_time)),
        ])
    }

    fn script_name(&self) -> &'static str {
        "add_marker.jsx"
    }
}

// ============================================================================
// Add Transition
// ============================================================================

/// Type-safe arguments for `add_transition.jsx`.
#[derive(Debug, Clone)]
pub struct AddTransitionArgs {
    pub comp_name: String,
    pub layer_name: String,
    pub transition_type: TransitionType,
    pub start_time: f64,
    pub duration: f64,
}

impl ScriptArgs for AddTransitionArgs {
    fn replacements(&self) -> Vec<(String, String)> {
        pairs([
            ("comp_name", quoted(&self.comp_name)),
            ("layer_name", quoted(&self.layer_name)),
            ("transition_type", self.transition_type.to_string()),
            ("start_time", number(self.start_time)),
            ("duration", number(self.duration)),
        ])
    }

    fn script_name(&self) -> &'static str {
        "add_transition.jsx"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(subs: &[(String, String)]) -> Vec<&str> {
        let mut keys: Vec<&str> = subs.iter().map(|(k, _)| k.as_str()).collect();
        keys.sort_unstable();
        keys
    }

    #[test]
    fn test_add_resource_placeholders() {
        let args = AddResourceArgs {
            comp_name: "scene-1-intro".into(),
            resource_name: "music".into(),
            timing: LayerTiming::span(0.0, 182.4),
            move_to_end: true,
        };
        let subs = args.replacements();
        assert_eq!(
            keys(&subs),
            vec!["comp_name", "in_point", "move_to_end", "out_point", "resource_name", "start_time", "stretch"]
        );
        assert!(subs.contains(&("out_point".to_string(), "182.4".to_string())));
        assert!(subs.contains(&("move_to_end".to_string(), "true".to_string())));
    }

    #[test]
    fn test_frame_variant_extends_property() {
        let args = UpdatePropertyAtFrameArgs {
            property: UpdatePropertyArgs {
                comp_name: "c".into(),
                layer_name: "l".into(),
                property_name: "Opacity".into(),
                value: "50".into(),
            },
            frame: 12.0,
        };
        assert_eq!(
            keys(&args.replacements()),
            vec!["comp_name", "frame", "layer_name", "property_name", "value"]
        );
        assert_eq!(args.script_name(), "update_properties_frame.jsx");
    }

    #[test]
    fn test_transition_type_rendered_snake_case() {
        let args = AddTransitionArgs {
            comp_name: "c".into(),
            layer_name: "l".into(),
            transition_type: TransitionType::CrossDissolve,
            start_time: 0.0,
            duration: 1.5,
        };
        assert!(args
            .replacements()
            .contains(&("transition_type".to_string(), "cross_dissolve".to_string())));
    }
}
