//! Type-Safe Script Execution
//!
//! This module provides the ONLY sanctioned way to execute host scripts.
//! All script execution MUST go through [`ScriptRunner::run`] to ensure:
//!
//! - Bodies are resolved through the [`ScriptLibrary`] (built-in or override)
//! - Placeholders come from a typed `ScriptArgs` contract
//! - Every command is wrapped by the [`ScriptCompiler`] and delivered through
//!   a [`HostChannel`]
//!
//! # Architecture Rule
//!
//! The runner is the execution gatekeeper. Writing `.jsx` files into the
//! queue directory by hand bypasses error capture and violates the architecture.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::de::DeserializeOwned;

use crate::command_queue::{CommandOutcome, HostChannel};
use crate::error::{AutomationError, Result};
use crate::script_template::{Framework, ScriptCompiler, ScriptLibrary};
use crate::script_traits::ScriptArgs;

/// Counters over everything a runner has submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunnerStats {
    pub submitted: usize,
    pub failed: usize,
    /// Scripts that were never picked up, in submission order
    pub orphaned: Vec<String>,
}

/// Compiles typed script requests and executes them through a host channel.
#[derive(Debug)]
pub struct ScriptRunner<H: HostChannel> {
    library: ScriptLibrary,
    compiler: ScriptCompiler,
    channel: H,
    cache_dir: PathBuf,
    stats: RunnerStats,
}

impl<H: HostChannel> ScriptRunner<H> {
    /// Create a runner whose scripts exchange documents through `cache_dir`.
    pub fn new(library: ScriptLibrary, cache_dir: impl Into<PathBuf>, channel: H) -> Self {
        let cache_dir = cache_dir.into();
        Self {
            library,
            compiler: ScriptCompiler::new(Framework::new(&cache_dir)),
            channel,
            cache_dir,
            stats: RunnerStats::default(),
        }
    }

    /// Folder shared with the host for result documents and logs
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn stats(&self) -> &RunnerStats {
        &self.stats
    }

    pub fn channel(&self) -> &H {
        &self.channel
    }

    /// Execute a host script with type-safe arguments.
    ///
    /// Transport outcomes are returned as values; use
    /// [`ScriptOutput::ensure_success`] or [`run_required`](Self::run_required)
    /// when the step cannot be skipped.
    pub fn run<T: ScriptArgs>(&mut self, args: &T) -> Result<ScriptOutput> {
        let script_name = args.script_name();
        let replacements = args.replacements();
        info!("run_script: {}", script_name);
        debug!("run_script: {} replacements={:?}", script_name, replacements);

        let body = self.library.body(script_name)?.to_string();
        let compiled = self.compiler.compile(script_name, &body, &replacements);
        let outcome = self.channel.execute(&compiled)?;

        self.stats.submitted += 1;
        match &outcome {
            CommandOutcome::Consumed { waited } => {
                debug!("Script {} executed in {:?}", script_name, waited);
            }
            CommandOutcome::Failed { error, .. } => {
                self.stats.failed += 1;
                warn!("Script {} failed: {}", script_name, error);
            }
            CommandOutcome::Orphaned { .. } => {
                self.stats.orphaned.push(script_name.to_string());
            }
        }

        Ok(ScriptOutput {
            script: script_name.to_string(),
            run_id: compiled.run_id,
            outcome,
        })
    }

    /// Run a script whose failure must abort the caller.
    ///
    /// A host-side failure carries whatever the script logged for its run.
    pub fn run_required<T: ScriptArgs>(&mut self, args: &T) -> Result<ScriptOutput> {
        let output = self.run(args)?;
        if let Err(err) = output.ensure_success() {
            return Err(match (err, output.logs(&self.cache_dir)) {
                (AutomationError::ScriptExecution { script, detail }, Some(log))
                    if !log.trim().is_empty() =>
                {
                    warn!("Host log for {}:\n{}", script, log.trim_end());
                    AutomationError::ScriptExecution {
                        script,
                        detail: format!("{} (host log: {})", detail, log.trim()),
                    }
                }
                (err, _) => err,
            });
        }
        Ok(output)
    }

    /// Run a script that writes `document` into the cache folder, then parse it.
    ///
    /// Any stale copy is removed first so an old result is never mistaken for
    /// the new one.
    pub fn run_for_document<T: ScriptArgs, D: DeserializeOwned>(
        &mut self,
        args: &T,
        document: &str,
    ) -> Result<D> {
        let path = self.cache_dir.join(document);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        self.run_required(args)?;
        read_document(&path).map_err(|e| {
            AutomationError::script(args.script_name(), format!("cannot read {}: {}", document, e))
        })
    }
}

/// Parse a JSON document written by the host.
pub fn read_document<D: DeserializeOwned>(path: &Path) -> Result<D> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Output from a host script execution.
#[derive(Debug, Clone)]
pub struct ScriptOutput {
    /// Logical script name.
    pub script: String,
    /// Run-id injected into the script; names the host-side log file.
    pub run_id: String,
    /// Transport outcome.
    pub outcome: CommandOutcome,
}

impl ScriptOutput {
    /// Whether the host executed the script without error.
    pub fn success(&self) -> bool {
        self.outcome.is_consumed()
    }

    /// Check if the script succeeded and return an error if not.
    pub fn ensure_success(&self) -> Result<()> {
        match &self.outcome {
            CommandOutcome::Consumed { .. } => Ok(()),
            CommandOutcome::Failed { error, .. } => {
                Err(AutomationError::script(&self.script, error.to_string()))
            }
            CommandOutcome::Orphaned { waited } => Err(AutomationError::script(
                &self.script,
                format!(
                    "not processed by the host within {:.1}s (is the listener installed?)",
                    waited.as_secs_f64()
                ),
            )),
        }
    }

    /// Log text the script wrote under `<cache>/logs/<run_id>.txt`, if any.
    pub fn logs(&self, cache_dir: &Path) -> Option<String> {
        fs::read_to_string(cache_dir.join("logs").join(format!("{}.txt", self.run_id))).ok()
    }
}
