//! Type-safe arguments for project-structure host scripts.
//!
//! This module provides typed argument structs for scripts that shape the
//! project item tree:
//! - `CreateFolderArgs` for `create_folder.jsx`
//! - `DeleteFolderArgs` for `delete_folder.jsx`
//! - `AddCompArgs` for `add_comp.jsx`
//! - `ImportFileArgs` for `import_file.jsx`
//! - `FileMapArgs` for `file_map.jsx`
//! - `DuplicateCompArgs` for `duplicate_comp.jsx`
//! - `SaveProjectArgs` for `save_project.jsx`

use std::path::PathBuf;

use serde::Deserialize;

use crate::script_traits::{ScriptArgs, number, pairs, quoted};
use crate::scripts::LayerTiming;

/// Result document written by `file_map.jsx` into the cache folder.
pub const FILE_MAP_DOCUMENT: &str = "file_map.json";
/// Pending-swap document written by `duplicate_comp.jsx` into the cache folder.
pub const COMP_MAP_DOCUMENT: &str = "comp_map.json";

/// A nested composition the host could not re-source by script.
///
/// Entries of [`COMP_MAP_DOCUMENT`]; each one is finished through the UI.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PendingSwap {
    /// Duplicated composition holding the layer
    pub from_comp: String,
    /// 1-based layer index inside `from_comp`
    pub layer_index: u32,
    /// Project item that should become the layer's source
    pub item_name: String,
}

// ============================================================================
// Create Folder
// ============================================================================

/// Type-safe arguments for `create_folder.jsx`.
#[derive(Debug, Clone)]
pub struct CreateFolderArgs {
    /// Name of the new folder.
    pub folder_name: String,
    /// Optional parent folder; root when absent.
    pub parent_folder: Option<String>,
}

impl ScriptArgs for CreateFolderArgs {
    fn replacements(&self) -> Vec<(String, String)> {
        pairs([
            ("folder_name", quoted(&self.folder_name)),
            (
                "parent_folder",
                self.parent_folder.as_deref().map(quoted).unwrap_or_default(),
            ),
        ])
    }

    fn script_name(&self) -> &'static str {
        "create_folder.jsx"
    }
}

// ============================================================================
// Delete Folder
// ============================================================================

/// Type-safe arguments for `delete_folder.jsx`.
#[derive(Debug, Clone)]
pub struct DeleteFolderArgs {
    /// Folder to remove together with its contents.
    pub folder_name: String,
}

impl ScriptArgs for DeleteFolderArgs {
    fn replacements(&self) -> Vec<(String, String)> {
        pairs([("folder_name", quoted(&self.folder_name))])
    }

    fn script_name(&self) -> &'static str {
        "delete_folder.jsx"
    }
}

// ============================================================================
// Add Composition
// ============================================================================

/// Type-safe arguments for `add_comp.jsx`.
#[derive(Debug, Clone)]
pub struct AddCompArgs {
    pub comp_name: String,
    pub width: u32,
    pub height: u32,
    pub pixel_aspect: f64,
    /// Duration in seconds.
    pub duration: f64,
    pub frame_rate: f64,
    /// Folder the composition is moved into.
    pub folder_name: Option<String>,
}

impl ScriptArgs for AddCompArgs {
    fn replacements(&self) -> Vec<(String, String)> {
        pairs([
            ("comp_name", quoted(&self.comp_name)),
            ("comp_width", self.width.to_string()),
            ("comp_height", self.height.to_string()),
            ("pixel_aspect", number(self.pixel_aspect)),
            ("duration", number(self.duration)),
            ("frame_rate", number(self.frame_rate)),
            (
                "folder_name",
                self.folder_name.as_deref().map(quoted).unwrap_or_default(),
            ),
        ])
    }

    fn script_name(&self) -> &'static str {
        "add_comp.jsx"
    }
}

// ============================================================================
// Import File
// ============================================================================

/// Type-safe arguments for `import_file.jsx`.
#[derive(Debug, Clone)]
pub struct ImportFileArgs {
    /// Absolute path of the media file.
    pub file_path: PathBuf,
    /// Project item name given to the imported footage.
    pub item_name: String,
    /// Folder the footage is moved into.
    pub folder_name: String,
}

impl ScriptArgs for ImportFileArgs {
    fn replacements(&self) -> Vec<(String, String)> {
        let path = self.file_path.to_string_lossy().replace('\\', "/");
        pairs([
            ("file_path", quoted(&path)),
            ("item_name", quoted(&self.item_name)),
            ("folder_name", quoted(&self.folder_name)),
        ])
    }

    fn script_name(&self) -> &'static str {
        "import_file.jsx"
    }
}

// ============================================================================
// Project Map
// ============================================================================

/// Type-safe arguments for `file_map.jsx`; writes [`FILE_MAP_DOCUMENT`].
#[derive(Debug, Clone, Default)]
pub struct FileMapArgs;

impl ScriptArgs for FileMapArgs {
    fn replacements(&self) -> Vec<(String, String)> {
        vec![]
    }

    fn script_name(&self) -> &'static str {
        "file_map.jsx"
    }
}

// ============================================================================
// Duplicate Composition
// ============================================================================

/// Type-safe arguments for `duplicate_comp.jsx`; writes [`COMP_MAP_DOCUMENT`].
///
/// The template is deep-duplicated into `folder_name` and the copy is placed
/// on `target_comp` at `timing`.
#[derive(Debug, Clone)]
pub struct DuplicateCompArgs {
    pub target_comp: String,
    pub template_comp: String,
    pub folder_name: String,
    pub timing: LayerTiming,
}

impl ScriptArgs for DuplicateCompArgs {
    fn replacements(&self) -> Vec<(String, String)> {
        let mut subs = pairs([
            ("target_comp", quoted(&self.target_comp)),
            ("template_comp", quoted(&self.template_comp)),
            ("folder_name", quoted(&self.folder_name)),
        ]);
        subs.extend(pairs(self.timing.replacements()));
        subs
    }

    fn script_name(&self) -> &'static str {
        "duplicate_comp.jsx"
    }
}

// ============================================================================
// Save Project
// ============================================================================

/// Type-safe arguments for `save_project.jsx`.
#[derive(Debug, Clone)]
pub struct SaveProjectArgs {
    /// Explicit save path.
    pub project_path: PathBuf,
}

impl ScriptArgs for SaveProjectArgs {
    fn replacements(&self) -> Vec<(String, String)> {
        let path = self.project_path.to_string_lossy().replace('\\', "/");
        pairs([("project_path", quoted(&path))])
    }

    fn script_name(&self) -> &'static str {
        "save_project.jsx"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup<'a>(subs: &'a [(String, String)], key: &str) -> &'a str {
        subs.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .unwrap_or_else(|| panic!("missing {}", key))
    }

    #[test]
    fn test_create_folder_root() {
        let args = CreateFolderArgs {
            folder_name: "hostbridge".into(),
            parent_folder: None,
        };
        let subs = args.replacements();
        assert_eq!(lookup(&subs, "folder_name"), "hostbridge");
        assert_eq!(lookup(&subs, "parent_folder"), "");
        assert_eq!(args.script_name(), "create_folder.jsx");
    }

    #[test]
    fn test_import_uses_forward_slashes() {
        let args = ImportFileArgs {
            file_path: PathBuf::from(r"C:\media\music.mp3"),
            item_name: "music".into(),
            folder_name: "hostbridge-cache".into(),
        };
        assert_eq!(lookup(&args.replacements(), "file_path"), "C:/media/music.mp3");
    }

    #[test]
    fn test_duplicate_comp_includes_timing() {
        let args = DuplicateCompArgs {
            target_comp: "Main".into(),
            template_comp: "IntroTemplate".into(),
            folder_name: "scene-1".into(),
            timing: LayerTiming::span(10.0, 5.0),
        };
        let subs = args.replacements();
        assert_eq!(lookup(&subs, "start_time"), "10");
        assert_eq!(lookup(&subs, "out_point"), "15");
        assert_eq!(lookup(&subs, "stretch"), "100");
    }

    #[test]
    fn test_add_comp_numbers() {
        let args = AddCompArgs {
            comp_name: "Main".into(),
            width: 1920,
            height: 1080,
            pixel_aspect: 1.0,
            duration: 720.0,
            frame_rate: 29.97,
            folder_name: Some("hostbridge".into()),
        };
        let subs = args.replacements();
        assert_eq!(lookup(&subs, "comp_width"), "1920");
        assert_eq!(lookup(&subs, "frame_rate"), "29.97");
        assert_eq!(lookup(&subs, "duration"), "720");
    }
}
