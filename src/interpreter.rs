//! Timeline/action interpreter
//!
//! Turns a [`ProjectConfig`] into a sequence of host commands:
//!
//! 1. validate the configuration (nothing touches the host before this passes)
//! 2. copy the source project to a working file and open it in the host
//! 3. snapshot the host item tree into the [`ItemCache`]
//! 4. make sure the project folder and the main composition exist
//! 5. import resources and probe audio/video durations
//! 6. per scene: recreate the scene folder, place the template composition on
//!    the main timeline and dispatch the scene's expanded actions
//! 7. save, shut the host down and render (skipped in debug runs)
//!
//! Commands are strictly sequential. Every command whose failure would leave
//! the project inconsistent goes through `run_required`, so the first
//! host-side error aborts the run with a `ScriptExecution` error.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use log::{debug, info, warn};
use serde_json::Value;

use crate::command_queue::HostChannel;
use crate::config::Settings;
use crate::config_file::{ProjectConfig, Scene};
use crate::error::{AutomationError, Result};
use crate::expand::expand_actions;
use crate::host::HostLifecycle;
use crate::item_cache::{ItemCache, ProjectMap};
use crate::media::DurationProbe;
use crate::poll::{Clock, SystemClock, poll_until};
use crate::render::{RenderJob, Renderer};
use crate::script_runner::ScriptRunner;
use crate::script_template::text::{hex_to_rgba, sanitize_for_host, slug};
use crate::scripts::LayerTiming;
use crate::scripts::layer::{
    AddMarkerArgs, AddResourceArgs, AddTransitionArgs, UpdatePropertyArgs,
    UpdatePropertyAtFrameArgs, UpdateResourceArgs,
};
use crate::scripts::project::{
    AddCompArgs, COMP_MAP_DOCUMENT, CreateFolderArgs, DeleteFolderArgs, DuplicateCompArgs,
    FILE_MAP_DOCUMENT, FileMapArgs, ImportFileArgs, PendingSwap, SaveProjectArgs,
};
use crate::scripts::session::{OpenItemArgs, SelectItemArgs, SelectLayerArgs};
use crate::types::{CustomAction, TemplateValue, TemplateValuesFile, host_string};
use crate::ui::{self, UiDriver};

/// Probed durations of imported resources, keyed by resource name.
#[derive(Debug, Clone, Default)]
pub struct ResourceCatalog {
    durations: HashMap<String, f64>,
}

impl ResourceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, duration: f64) {
        self.durations.insert(name.into(), duration);
    }

    /// Cached duration of `name`; 0 for unknown or still images.
    pub fn duration(&self, name: &str) -> f64 {
        self.durations.get(name).copied().unwrap_or(0.0)
    }

    /// Duration to use for a layer of `name`.
    ///
    /// A zero or absent request falls back to the cached duration.
    pub fn effective_duration(&self, name: &str, requested: Option<f64>) -> f64 {
        match requested {
            Some(duration) if duration != 0.0 => duration,
            _ => self.duration(name),
        }
    }

    pub fn len(&self) -> usize {
        self.durations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.durations.is_empty()
    }
}

/// What a finished run did.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub scenes: usize,
    pub commands_submitted: usize,
    /// Scripts the host never picked up
    pub orphaned: Vec<String>,
    /// Working copy of the project that received every edit
    pub working_project: PathBuf,
    /// Rendered movie, when a render ran
    pub output_path: Option<PathBuf>,
}

/// Per-scene naming context.
struct SceneScope<'a> {
    folder: String,
    scene: &'a Scene,
    config: &'a ProjectConfig,
}

impl SceneScope<'_> {
    /// Host name of a scene-local copy of `name`.
    fn local(&self, name: &str) -> String {
        slug(&format!("{} {}", self.folder, name))
    }
}

/// Drives one automation run against a host.
pub struct Interpreter<H, L, R, P, U, C = SystemClock>
where
    H: HostChannel,
    L: HostLifecycle,
    R: Renderer,
    P: DurationProbe,
    U: UiDriver,
    C: Clock,
{
    settings: Settings,
    runner: ScriptRunner<H>,
    host: L,
    renderer: R,
    probe: P,
    ui: U,
    clock: C,
    cache: ItemCache,
    catalog: ResourceCatalog,
}

impl<H, L, R, P, U> Interpreter<H, L, R, P, U, SystemClock>
where
    H: HostChannel,
    L: HostLifecycle,
    R: Renderer,
    P: DurationProbe,
    U: UiDriver,
{
    pub fn new(
        settings: Settings,
        runner: ScriptRunner<H>,
        host: L,
        renderer: R,
        probe: P,
        ui: U,
    ) -> Self {
        Self {
            settings,
            runner,
            host,
            renderer,
            probe,
            ui,
            clock: SystemClock,
            cache: ItemCache::new(),
            catalog: ResourceCatalog::new(),
        }
    }
}

impl<H, L, R, P, U, C> Interpreter<H, L, R, P, U, C>
where
    H: HostChannel,
    L: HostLifecycle,
    R: Renderer,
    P: DurationProbe,
    U: UiDriver,
    C: Clock,
{
    /// Replace the clock used for settle pauses and save verification.
    pub fn with_clock<C2: Clock>(self, clock: C2) -> Interpreter<H, L, R, P, U, C2> {
        Interpreter {
            settings: self.settings,
            runner: self.runner,
            host: self.host,
            renderer: self.renderer,
            probe: self.probe,
            ui: self.ui,
            clock,
            cache: self.cache,
            catalog: self.catalog,
        }
    }

    pub fn runner(&self) -> &ScriptRunner<H> {
        &self.runner
    }

    pub fn cache(&self) -> &ItemCache {
        &self.cache
    }

    pub fn catalog(&self) -> &ResourceCatalog {
        &self.catalog
    }

    pub fn host(&self) -> &L {
        &self.host
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn ui(&self) -> &U {
        &self.ui
    }

    /// Execute the whole pipeline for `config`.
    pub fn run(&mut self, config: &ProjectConfig) -> Result<RunSummary> {
        config.validate()?;
        let project = &config.project;
        let comp_duration = config.comp_duration()?;
        let plans = config
            .timeline
            .iter()
            .map(|scene| expand_actions(&scene.custom_actions, &config.templates))
            .collect::<Result<Vec<_>>>()?;

        let working = self.prepare_working_copy(config)?;

        if project.debug {
            info!("Debug mode: using the running host, no launch or render");
        } else {
            self.host.launch(&working)?;
            let waited = self.host.await_ready(&mut self.runner)?;
            info!("Host ready after {:.1}s", waited.as_secs_f64());
        }

        self.refresh_cache()?;
        info!("Project is open ({} items)", self.cache.len());

        self.ensure_project_structure(config, comp_duration)?;
        self.import_resources(config)?;

        for (index, (scene, actions)) in config.timeline.iter().zip(&plans).enumerate() {
            self.build_scene(config, index, scene, actions)?;
        }

        let output_path = if project.debug {
            None
        } else {
            self.finish(config, &working)?
        };

        let stats = self.runner.stats();
        if !stats.orphaned.is_empty() {
            warn!(
                "{} command(s) were never picked up by the host: {}",
                stats.orphaned.len(),
                stats.orphaned.join(", ")
            );
        }
        Ok(RunSummary {
            scenes: config.timeline.len(),
            commands_submitted: stats.submitted,
            orphaned: stats.orphaned.clone(),
            working_project: working,
            output_path,
        })
    }

    /// Copy the source project to `<output_dir>/<working name>`.
    fn prepare_working_copy(&self, config: &ProjectConfig) -> Result<PathBuf> {
        let output_dir = &config.project.output_dir;
        fs::create_dir_all(output_dir)?;
        let working = output_dir.join(&self.settings.working_project_name);
        if working.exists() && same_file(&config.project.project_file, &working)? {
            return Err(AutomationError::config(
                "project_file",
                format!(
                    "{} is the working copy location; move it or change working_project_name",
                    working.display()
                ),
            ));
        }
        if working.exists() {
            debug!("Removing stale working copy {}", working.display());
            fs::remove_file(&working)?;
        }
        fs::copy(&config.project.project_file, &working)?;
        info!("File copied to {}", working.display());
        Ok(working)
    }

    /// Re-read the host item tree.
    pub fn refresh_cache(&mut self) -> Result<()> {
        let map: ProjectMap = self
            .runner
            .run_for_document(&FileMapArgs, FILE_MAP_DOCUMENT)?;
        self.cache.replace_all(map.files);
        Ok(())
    }

    fn ensure_project_structure(&mut self, config: &ProjectConfig, comp_duration: f64) -> Result<()> {
        let project = &config.project;
        let folder = self.settings.project_folder.clone();

        if self.cache.needs_creation(&folder) {
            info!("Creating project folder {}", folder);
            self.runner.run_required(&CreateFolderArgs {
                folder_name: folder.clone(),
                parent_folder: None,
            })?;
        }

        if self.cache.needs_creation(&project.comp_name) {
            info!("Creating comp {}", project.comp_name);
            self.runner.run_required(&AddCompArgs {
                comp_name: project.comp_name.clone(),
                width: project.comp_width,
                height: project.comp_height,
                pixel_aspect: 1.0,
                duration: comp_duration,
                frame_rate: project.comp_fps,
                folder_name: Some(folder),
            })?;
        }
        Ok(())
    }

    fn import_resources(&mut self, config: &ProjectConfig) -> Result<()> {
        let resources = &config.project.resources;
        if resources.is_empty() {
            return Ok(());
        }

        let cache_folder = self.settings.resource_folder();
        if self.cache.needs_creation(&cache_folder) {
            self.runner.run_required(&CreateFolderArgs {
                folder_name: cache_folder.clone(),
                parent_folder: Some(self.settings.project_folder.clone()),
            })?;
        }

        for resource in resources {
            if self.cache.needs_creation(&resource.name) {
                info!("Importing {} from {}", resource.name, resource.path.display());
                self.runner.run_required(&ImportFileArgs {
                    file_path: resource.path.clone(),
                    item_name: resource.name.clone(),
                    folder_name: cache_folder.clone(),
                })?;
            }

            let duration = if resource.kind().has_duration() {
                self.probe.duration(&resource.path)?
            } else {
                0.0
            };
            debug!("Resource {} ({}) lasts {}s", resource.name, resource.kind(), duration);
            self.catalog.insert(resource.name.clone(), duration);
        }

        self.refresh_cache()
    }

    fn build_scene(
        &mut self,
        config: &ProjectConfig,
        index: usize,
        scene: &Scene,
        actions: &[CustomAction],
    ) -> Result<()> {
        let scope = SceneScope {
            folder: slug(&format!("Scene {}", index + 1)),
            scene,
            config,
        };
        match &scene.name {
            Some(name) => info!("Setting up {} ({})", scope.folder, name),
            None => info!("Setting up {}", scope.folder),
        }

        if let Some(stale) = self.cache.find(&scope.folder) {
            debug!("Deleting stale folder {} (item {})", scope.folder, stale.id);
            self.runner.run_required(&DeleteFolderArgs {
                folder_name: scope.folder.clone(),
            })?;
            self.cache.remove_named(&scope.folder);
        }

        self.runner.run_required(&CreateFolderArgs {
            folder_name: scope.folder.clone(),
            parent_folder: Some(self.settings.project_folder.clone()),
        })?;

        self.place_comp(DuplicateCompArgs {
            target_comp: config.project.comp_name.clone(),
            template_comp: scene.template_comp.clone(),
            folder_name: scope.folder.clone(),
            timing: LayerTiming::span(scene.start_time, scene.duration),
        })?;

        for action in actions {
            self.dispatch(&scope, action)?;
        }
        Ok(())
    }

    /// Duplicate a composition onto a timeline and finish the swaps the host
    /// could not do by script.
    fn place_comp(&mut self, args: DuplicateCompArgs) -> Result<()> {
        let swaps: Vec<PendingSwap> = self.runner.run_for_document(&args, COMP_MAP_DOCUMENT)?;
        for swap in swaps {
            debug!(
                "Swapping layer {} of {} to {}",
                swap.layer_index, swap.from_comp, swap.item_name
            );
            self.swap_layer_source(&swap.from_comp, swap.layer_index, &swap.item_name)?;
        }
        Ok(())
    }

    /// Make `item` the source of layer `layer_index` in `comp`.
    fn swap_layer_source(&mut self, comp: &str, layer_index: u32, item: &str) -> Result<()> {
        self.runner.run_required(&OpenItemArgs {
            name: comp.to_string(),
        })?;
        self.runner.run_required(&SelectItemArgs {
            name: item.to_string(),
        })?;
        self.runner.run_required(&SelectLayerArgs {
            comp_name: comp.to_string(),
            layer_index,
        })?;
        self.ui.hotkey(ui::REPLACE_SOURCE)
    }

    fn dispatch(&mut self, scope: &SceneScope<'_>, action: &CustomAction) -> Result<()> {
        debug!("Applying {} in {}", action.change_type(), scope.folder);
        match action {
            CustomAction::UpdateLayerProperty {
                comp_name,
                layer_name,
                property_name,
                property_type,
                value,
            } => {
                self.runner.run_required(&UpdatePropertyArgs {
                    comp_name: scope.local(comp_name),
                    layer_name: layer_name.clone(),
                    property_name: property_name.clone(),
                    value: host_value(property_type.as_deref(), value)?,
                })?;
            }

            CustomAction::UpdateLayerPropertyAtFrame {
                comp_name,
                layer_name,
                property_name,
                property_type,
                value,
                frame,
            } => {
                self.runner.run_required(&UpdatePropertyAtFrameArgs {
                    property: UpdatePropertyArgs {
                        comp_name: scope.local(comp_name),
                        layer_name: layer_name.clone(),
                        property_name: property_name.clone(),
                        value: host_value(property_type.as_deref(), value)?,
                    },
                    frame: *frame,
                })?;
            }

            CustomAction::AddResource {
                comp_name,
                resource_name,
                start_time,
                duration,
                move_to_end,
            } => {
                if scope.config.resource(resource_name).is_none() {
                    warn!("Resource {} is not declared in the project", resource_name);
                }
                let duration = self.catalog.effective_duration(resource_name, *duration);
                self.runner.run_required(&AddResourceArgs {
                    comp_name: scope.local(comp_name),
                    resource_name: resource_name.clone(),
                    timing: LayerTiming::span(*start_time, duration),
                    move_to_end: *move_to_end,
                })?;
            }

            CustomAction::EditResource {
                comp_name,
                layer_index,
                start_time,
                duration,
                move_to_end,
            } => {
                self.runner.run_required(&UpdateResourceArgs {
                    comp_name: scope.local(comp_name),
                    layer_index: *layer_index,
                    timing: LayerTiming::span(*start_time, *duration),
                    move_to_end: *move_to_end,
                })?;
            }

            CustomAction::SwapItemsByIndex {
                comp_name,
                layer_index,
                layer_name,
                fit_to_screen,
                fit_to_screen_width,
                fit_to_screen_height,
            } => {
                self.swap_layer_source(&scope.local(comp_name), *layer_index, layer_name)?;
                if *fit_to_screen {
                    self.ui.hotkey(ui::FIT_TO_SCREEN)?;
                }
                if *fit_to_screen_width {
                    self.ui.hotkey(ui::FIT_TO_WIDTH)?;
                }
                if *fit_to_screen_height {
                    self.ui.hotkey(ui::FIT_TO_HEIGHT)?;
                }
            }

            CustomAction::AddMarker {
                comp_name,
                layer_name,
                marker_name,
                marker_time,
            } => {
                self.runner.run_required(&AddMarkerArgs {
                    comp_name: scope.local(comp_name),
                    layer_name: scope.local(layer_name),
                    marker_name: marker_name.clone(),
                    marker_time: *marker_time,
                })?;
            }

            // Scene plans are expanded before the first command is sent
            CustomAction::Template { template_name, .. } => {
                return Err(AutomationError::config(
                    "template_name",
                    format!("template '{}' was not expanded", template_name),
                ));
            }

            CustomAction::AddComp {
                comp_name,
                start_time,
                duration,
            } => {
                self.place_comp(DuplicateCompArgs {
                    target_comp: scope.local(&scope.scene.template_comp),
                    template_comp: comp_name.clone(),
                    folder_name: scope.folder.clone(),
                    timing: LayerTiming::span(*start_time, *duration),
                })?;
            }

            CustomAction::ApplyTemplateValues {
                comp_name,
                values_file,
                values,
            } => {
                let (comp_name, values) = match values_file {
                    Some(path) => {
                        let file = load_values_file(&scope.config.resolve(path))?;
                        (file.comp_name.unwrap_or_else(|| comp_name.clone()), file.values)
                    }
                    None => (comp_name.clone(), values.clone()),
                };
                let target = scope.local(&comp_name);
                for entry in &values {
                    self.apply_value(&target, entry)?;
                }
            }

            CustomAction::AddTransition {
                comp_name,
                layer_name,
                transition_type,
                start_time,
                duration,
            } => {
                self.runner.run_required(&AddTransitionArgs {
                    comp_name: scope.local(comp_name),
                    layer_name: layer_name.clone(),
                    transition_type: *transition_type,
                    start_time: *start_time,
                    duration: *duration,
                })?;
            }
        }
        Ok(())
    }

    fn apply_value(&mut self, comp: &str, entry: &TemplateValue) -> Result<()> {
        self.runner.run_required(&UpdatePropertyArgs {
            comp_name: comp.to_string(),
            layer_name: entry.layer_name.clone(),
            property_name: entry.property_name.clone(),
            value: host_value(entry.property_type.as_deref(), &entry.value)?,
        })?;
        Ok(())
    }

    /// Save, shut the host down and render.
    fn finish(&mut self, config: &ProjectConfig, working: &Path) -> Result<Option<PathBuf>> {
        let project = &config.project;
        let timeouts = self.settings.timeouts.clone();

        info!("Saving {}", working.display());
        let budget = timeouts.save_verify_budget()?;
        let before = FileStamp::of(working);
        self.runner.run_required(&SaveProjectArgs {
            project_path: working.to_path_buf(),
        })?;

        let saved = poll_until(&self.clock, timeouts.save_verify_interval, budget, || {
            is_saved(working, before.as_ref())
        });
        if !saved.satisfied {
            return Err(AutomationError::script(
                "save_project.jsx",
                format!(
                    "{} was not written within {:.1}s",
                    working.display(),
                    saved.waited.as_secs_f64()
                ),
            ));
        }

        self.clock.sleep(timeouts.save_settle);
        self.host.terminate()?;

        if !project.render_comp {
            info!("Rendering disabled for this project");
            return Ok(None);
        }
        let job = RenderJob::new(
            working,
            project.comp_name.as_str(),
            &project.output_dir,
            project.output_file.as_deref(),
        )
        .with_memory(self.settings.render_memory.0, self.settings.render_memory.1);
        self.renderer.render(&job).map(Some)
    }
}

/// Size and modification time of a file at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    len: u64,
    modified: Option<SystemTime>,
}

impl FileStamp {
    fn of(path: &Path) -> Option<Self> {
        let meta = fs::metadata(path).ok()?;
        Some(Self {
            len: meta.len(),
            modified: meta.modified().ok(),
        })
    }
}

/// The file is non-empty and was rewritten after `before` was taken.
///
/// Rewritten means a different size or a strictly newer mtime.
fn is_saved(path: &Path, before: Option<&FileStamp>) -> bool {
    let Some(now) = FileStamp::of(path) else {
        return false;
    };
    if now.len == 0 {
        return false;
    }
    match before {
        None => true,
        Some(before) => {
            now.len != before.len
                || matches!((before.modified, now.modified), (Some(b), Some(n)) if n > b)
        }
    }
}

/// Both paths name the same file on disk.
fn same_file(a: &Path, b: &Path) -> Result<bool> {
    Ok(fs::canonicalize(a)? == fs::canonicalize(b)?)
}

/// Convert a configured value into the string the host script receives.
fn host_value(property_type: Option<&str>, value: &Value) -> Result<String> {
    if property_type == Some("color") {
        let hex = value.as_str().unwrap_or_default();
        return hex_to_rgba(hex).ok_or_else(|| {
            AutomationError::config("value", format!("'{}' is not a hex colour", host_string(value)))
        });
    }
    Ok(sanitize_for_host(&host_string(value)))
}

fn load_values_file(path: &Path) -> Result<TemplateValuesFile> {
    let content = fs::read_to_string(path).map_err(|e| {
        AutomationError::config("values_file", format!("cannot read {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        AutomationError::config("values_file", format!("invalid {}: {}", path.display(), e))
    })
}
