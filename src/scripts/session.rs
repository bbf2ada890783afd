//! Type-safe arguments for session and selection host scripts.
//!
//! - `OpenItemArgs` for `open_item_by_name.jsx`
//! - `SelectItemArgs` for `select_item_by_name.jsx`
//! - `SelectLayerArgs` for `select_layer_by_index.jsx`
//! - `CloseHomeScreenArgs` for `close_home_screen.jsx`
//! - `PingArgs` for `ping.jsx`

use crate::script_traits::{ScriptArgs, pairs, quoted};

/// Type-safe arguments for `open_item_by_name.jsx`.
#[derive(Debug, Clone)]
pub struct OpenItemArgs {
    pub name: String,
}

impl ScriptArgs for OpenItemArgs {
    fn replacements(&self) -> Vec<(String, String)> {
        pairs([("name", quoted(&self.name))])
    }

    fn script_name(&self) -> &'static str {
        "open_item_by_name.jsx"
    }
}

/// Type-safe arguments for `select_item_by_name.jsx`.
#[derive(Debug, Clone)]
pub struct SelectItemArgs {
    pub name: String,
}

impl ScriptArgs for SelectItemArgs {
    fn replacements(&self) -> Vec<(String, String)> {
        pairs([("name", quoted(&self.name))])
    }

    fn script_name(&self) -> &'static str {
        "select_item_by_name.jsx"
    }
}

/// Type-safe arguments for `select_layer_by_index.jsx`.
#[derive(Debug, Clone)]
pub struct SelectLayerArgs {
    pub comp_name: String,
    /// One-based layer index.
    pub layer_index: u32,
}

impl ScriptArgs for SelectLayerArgs {
    fn replacements(&self) -> Vec<(String, String)> {
        pairs([
            ("comp_name", quoted(&self.comp_name)),
            ("layer_index", self.layer_index.to_string()),
        ])
    }

    fn script_name(&self) -> &'static str {
        "select_layer_by_index.jsx"
    }
}

/// Type-safe arguments for `close_home_screen.jsx`.
#[derive(Debug, Clone, Default)]
pub struct CloseHomeScreenArgs;

impl ScriptArgs for CloseHomeScreenArgs {
    fn replacements(&self) -> Vec<(String, String)> {
        vec![]
    }

    fn script_name(&self) -> &'static str {
        "close_home_screen.jsx"
    }
}

/// Type-safe arguments for `ping.jsx`.
#[derive(Debug, Clone, Default)]
pub struct PingArgs;

impl ScriptArgs for PingArgs {
    fn replacements(&self) -> Vec<(String, String)> {
        vec![]
    }

    fn script_name(&self) -> &'static str {
        "ping.jsx"
    }
}
