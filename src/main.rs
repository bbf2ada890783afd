//! hostbridge - main entry point
//!
//! Loads settings, wires the live collaborators together and maps errors to
//! process exit codes.

use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, error, info};
use serde_json::json;

use hostbridge::cli::{Cli, Commands};
use hostbridge::command_queue::CommandQueue;
use hostbridge::config::Settings;
use hostbridge::config_file::ProjectConfig;
use hostbridge::error::AutomationError;
use hostbridge::expand::expand_actions;
use hostbridge::host::LiveHost;
use hostbridge::host_process;
use hostbridge::interpreter::Interpreter;
use hostbridge::listener::{self, ListenerInstall};
use hostbridge::media::FfprobeDurationProbe;
use hostbridge::readiness::{LiveProbe, ReadinessGate};
use hostbridge::render::{AerenderRenderer, RenderJob, Renderer};
use hostbridge::script_runner::ScriptRunner;
use hostbridge::script_template::ScriptLibrary;
use hostbridge::ui::XdotoolDriver;

/// Initialize the logger with appropriate settings
fn init_logger(verbose: bool) {
    use env_logger::Builder;
    use std::io::Write;

    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    Builder::from_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}:{}] {}",
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .filter_level(level)
        .parse_default_env() // Allows RUST_LOG env var to override
        .init();
}

fn main() {
    let cli = Cli::parse_args();
    init_logger(cli.verbose);
    debug!("CLI arguments parsed");

    if let Err(e) = run(cli) {
        error!("{:#}", e);
        eprintln!("✗ {:#}", e);
        let code = e
            .downcast_ref::<AutomationError>()
            .map_or(1, AutomationError::exit_code);
        std::process::exit(code);
    }
}

fn run(cli: Cli) -> Result<()> {
    let settings = Settings::load(cli.settings.as_deref())?;

    match cli.command {
        Commands::Run { config, dry_run } => run_project(&settings, &config, dry_run),
        Commands::Validate { config } => {
            info!("Validating configuration file: {}", config.display());
            let project = ProjectConfig::load_from_file(&config)?;
            project.validate()?;
            println!(
                "✓ Configuration file is valid: {} scene(s), {} resource(s), {} template(s)",
                project.timeline.len(),
                project.project.resources.len(),
                project.templates.len()
            );
            Ok(())
        }
        Commands::Expand { config } => {
            let project = ProjectConfig::load_from_file(&config)?;
            let mut scenes = Vec::with_capacity(project.timeline.len());
            for (index, scene) in project.timeline.iter().enumerate() {
                let actions = expand_actions(&scene.custom_actions, &project.templates)?;
                scenes.push(json!({
                    "scene": index + 1,
                    "template_comp": scene.template_comp,
                    "actions": actions,
                }));
            }
            println!("{}", serde_json::to_string_pretty(&scenes)?);
            Ok(())
        }
        Commands::Ready => {
            let mut runner = live_runner(&settings)?;
            let probe = LiveProbe::new(
                settings.host_process_name.as_str(),
                settings.host_window_title.as_str(),
                &mut runner,
            );
            let report = ReadinessGate::new(probe, settings.timeouts.clone()).bring_up();
            for (stage, at) in &report.history {
                println!("  {:<16} {:>6.1}s", stage.description(), at.as_secs_f64());
            }
            let waited = report.into_result()?;
            println!("✓ Host ready after {:.1}s", waited.as_secs_f64());
            Ok(())
        }
        Commands::Render {
            project,
            comp,
            output_dir,
            output_file,
        } => {
            let job = RenderJob::new(project, comp, &output_dir, output_file.as_deref())
                .with_memory(settings.render_memory.0, settings.render_memory.1);
            let output = AerenderRenderer::new(&settings.render_executable).render(&job)?;
            println!("✓ Rendered {}", output.display());
            Ok(())
        }
        Commands::InstallListener { startup_dir, force } => {
            let dir = startup_dir
                .or_else(|| settings.startup_scripts_dir.clone())
                .ok_or_else(|| {
                    AutomationError::config(
                        "startup_scripts_dir",
                        "pass --startup-dir or set HOSTBRIDGE_STARTUP_DIR",
                    )
                })?;
            match listener::install(&dir, &settings.queue_dir, force)? {
                ListenerInstall::Installed(path) => {
                    println!("✓ Listener installed at {}", path.display());
                    println!("Restart the host to load it");
                }
                ListenerInstall::AlreadyPresent(path) => {
                    println!("Listener already installed at {} (use --force to replace)", path.display());
                }
            }
            Ok(())
        }
    }
}

/// Script runner talking to the host through the configured queue directory.
fn live_runner(settings: &Settings) -> Result<ScriptRunner<CommandQueue>> {
    std::fs::create_dir_all(settings.logs_dir())
        .with_context(|| format!("cannot create {}", settings.cache_dir.display()))?;
    host_process::init_interrupt_handler(settings.queue_dir.clone())?;

    let library = match &settings.scripts_dir {
        Some(dir) => ScriptLibrary::with_override_dir(dir),
        None => ScriptLibrary::builtin(),
    };
    let queue = CommandQueue::new(&settings.queue_dir, &settings.timeouts);
    let stale = queue
        .purge()
        .with_context(|| format!("cannot clear {}", settings.queue_dir.display()))?;
    if stale > 0 {
        info!("Removed {} stale command file(s) from {}", stale, settings.queue_dir.display());
    }
    Ok(ScriptRunner::new(library, &settings.cache_dir, queue))
}

fn run_project(settings: &Settings, config_path: &Path, dry_run: bool) -> Result<()> {
    info!("Loading project from {}", config_path.display());
    let mut config = ProjectConfig::load_from_file(config_path)?;
    if dry_run {
        config.project.debug = true;
    }

    let runner = live_runner(settings)?;
    let mut interpreter = Interpreter::new(
        settings.clone(),
        runner,
        LiveHost::new(settings.clone()),
        AerenderRenderer::new(&settings.render_executable),
        FfprobeDurationProbe::default(),
        XdotoolDriver::new(settings.host_window_title.as_str()),
    );
    let summary = interpreter.run(&config)?;

    println!(
        "✓ Built {} scene(s) with {} command(s)",
        summary.scenes, summary.commands_submitted
    );
    println!("  Working project: {}", summary.working_project.display());
    if !summary.orphaned.is_empty() {
        println!("  Not picked up by the host: {}", summary.orphaned.join(", "));
    }
    if let Some(output) = summary.output_path {
        println!("  Rendered: {}", output.display());
    }
    Ok(())
}
