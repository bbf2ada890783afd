//! Project configuration file handling.
//!
//! A project file describes one automation run: the source project, the main
//! composition, the resources to import, the timeline of scenes and the
//! reusable action templates. This module uses typed enums for action kinds
//! and resource kinds, so a typo is reported when the file is loaded rather
//! than halfway through a run.
//!
//! Relative paths are resolved against the directory holding the file.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AutomationError, Result};
use crate::types::{CustomAction, ResourceKind, TimeValue, lenient};

/// Raw action shapes of a reusable template; placeholders may sit in any
/// field, so shapes stay untyped until expansion.
pub type ActionTemplate = Vec<Value>;

/// A complete automation job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub project: ProjectSettings,
    #[serde(default)]
    pub timeline: Vec<Scene>,
    #[serde(default)]
    pub templates: HashMap<String, ActionTemplate>,
    /// Directory relative paths are resolved against
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// Project-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSettings {
    /// Source project; never modified, a working copy is made
    pub project_file: PathBuf,
    pub output_dir: PathBuf,
    /// Main composition every scene is placed on
    pub comp_name: String,
    #[serde(default = "default_width", deserialize_with = "lenient::u32")]
    pub comp_width: u32,
    #[serde(default = "default_height", deserialize_with = "lenient::u32")]
    pub comp_height: u32,
    #[serde(default = "default_fps", deserialize_with = "lenient::f64")]
    pub comp_fps: f64,
    #[serde(default)]
    pub comp_start_time: TimeValue,
    pub comp_end_time: TimeValue,
    /// Debug runs skip host launch, save and render
    #[serde(default, deserialize_with = "lenient::bool")]
    pub debug: bool,
    #[serde(
        default = "default_render_comp",
        alias = "renderComp",
        deserialize_with = "lenient::bool"
    )]
    pub render_comp: bool,
    /// Rendered file name; `<comp_name>.mp4` when absent
    #[serde(default)]
    pub output_file: Option<String>,
    #[serde(default)]
    pub resources: Vec<Resource>,
}

fn default_width() -> u32 {
    1920
}

fn default_height() -> u32 {
    1080
}

fn default_fps() -> f64 {
    29.97
}

fn default_render_comp() -> bool {
    true
}

/// One entry of the ordered scene list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    #[serde(default)]
    pub name: Option<String>,
    /// Composition duplicated for this scene
    pub template_comp: String,
    #[serde(rename = "startTime", alias = "start_time", deserialize_with = "lenient::f64")]
    pub start_time: f64,
    #[serde(deserialize_with = "lenient::f64")]
    pub duration: f64,
    #[serde(default)]
    pub custom_actions: Vec<CustomAction>,
}

/// External media imported into the project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    /// Project item name given to the import
    pub name: String,
    pub path: PathBuf,
    #[serde(rename = "type", default)]
    pub kind: Option<ResourceKind>,
}

impl Resource {
    /// Declared kind, or a guess from the file extension
    pub fn kind(&self) -> ResourceKind {
        self.kind.unwrap_or_else(|| ResourceKind::from_path(&self.path))
    }
}

impl ProjectConfig {
    /// Load a project from a JSON file and resolve its relative paths.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            AutomationError::config("project", format!("cannot read {}: {}", path.display(), e))
        })?;
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self::from_json(&content, base_dir)
    }

    /// Parse a project document; relative paths resolve against `base_dir`.
    pub fn from_json(content: &str, base_dir: PathBuf) -> Result<Self> {
        let mut config: Self = serde_json::from_str(content)
            .map_err(|e| AutomationError::config("project", format!("invalid project file: {}", e)))?;
        config.base_dir = base_dir;
        config.resolve_paths();
        Ok(config)
    }

    /// Resolve `path` against the project file's directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() || self.base_dir.as_os_str().is_empty() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    fn resolve_paths(&mut self) {
        let project_file = self.resolve(&self.project.project_file);
        let output_dir = self.resolve(&self.project.output_dir);
        let resources: Vec<PathBuf> = self
            .project
            .resources
            .iter()
            .map(|r| self.resolve(&r.path))
            .collect();

        self.project.project_file = project_file;
        self.project.output_dir = output_dir;
        for (resource, path) in self.project.resources.iter_mut().zip(resources) {
            resource.path = path;
        }
    }

    /// Validate the configuration.
    ///
    /// Checks structure, timecodes and scene timing, and expands every
    /// scene's actions so unknown templates and missing arguments are
    /// reported before the host is touched.
    pub fn validate(&self) -> Result<()> {
        let project = &self.project;

        if project.project_file.as_os_str().is_empty() {
            return Err(AutomationError::config("project_file", "must be specified"));
        }
        if !project.project_file.is_file() {
            return Err(AutomationError::config(
                "project_file",
                format!("{} does not exist", project.project_file.display()),
            ));
        }
        if project.output_dir.as_os_str().is_empty() {
            return Err(AutomationError::config("output_dir", "must be specified"));
        }
        if project.comp_name.trim().is_empty() {
            return Err(AutomationError::config("comp_name", "must be specified"));
        }
        if project.comp_width == 0 || project.comp_height == 0 {
            return Err(AutomationError::config("comp_width", "composition size must be non-zero"));
        }
        if project.comp_fps.is_nan() || project.comp_fps <= 0.0 {
            return Err(AutomationError::config("comp_fps", "must be positive"));
        }
        if self.comp_duration()? <= 0.0 {
            return Err(AutomationError::config(
                "comp_end_time",
                "must be after comp_start_time",
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for resource in &project.resources {
            if resource.name.trim().is_empty() {
                return Err(AutomationError::config("resources", "resource name must not be empty"));
            }
            if !seen.insert(resource.name.as_str()) {
                return Err(AutomationError::config(
                    "resources",
                    format!("duplicate resource name '{}'", resource.name),
                ));
            }
        }

        for (index, scene) in self.timeline.iter().enumerate() {
            let field = format!("timeline[{}]", index);
            if scene.template_comp.trim().is_empty() {
                return Err(AutomationError::config(field, "template_comp must be specified"));
            }
            if scene.start_time + scene.duration < 0.0 {
                return Err(AutomationError::config(
                    field,
                    format!(
                        "startTime + duration must not be negative ({} + {})",
                        scene.start_time, scene.duration
                    ),
                ));
            }
            crate::expand::expand_actions(&scene.custom_actions, &self.templates)?;
        }

        Ok(())
    }

    /// Main composition length in seconds.
    pub fn comp_duration(&self) -> Result<f64> {
        let start = self.project.comp_start_time.to_seconds()?;
        let end = self.project.comp_end_time.to_seconds()?;
        Ok(end - start)
    }

    pub fn resource(&self, name: &str) -> Option<&Resource> {
        self.project.resources.iter().find(|r| r.name == name)
    }
}
