mod cli;

use clipforge::{
    config,
    engine::Engine,
    events::{JobEvent, JobEventKind},
    naming,
    state::{Job, JobOrigin, JobStatus},
    storage::StagingMode,
    watch,
};
use clipforge_common::paths::{file_name_string, is_convertible_file};
use clipforge_common::JobId;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

async fn start_engine(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    tracing::info!("Starting clipforge");
    let engine = Arc::new(Engine::new(&config));
    engine.start().await.context("Failed to start engine")?;
    tracing::info!(
        "Uploads in {:?}, outputs in {:?} (kept {}s)",
        config.storage.upload_dir,
        config.storage.output_dir,
        config.conversion.retention_secs
    );

    let mut watcher = watch::FileWatcher::new(config.watch.clone(), engine.clone());
    watcher.start()?;

    let mut events = engine.subscribe();
    let logger = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            log_event(&event);
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    tracing::info!("Shutting down...");
    watcher.stop();
    engine.shutdown().await;
    logger.abort();

    Ok(())
}

fn log_event(event: &JobEvent) {
    let job = &event.job;
    match event.kind {
        JobEventKind::Queued => tracing::info!(
            "Job {} queued at #{} ({})",
            job.id,
            job.queue_position.unwrap_or_default(),
            job.file_name
        ),
        JobEventKind::Started => tracing::info!("Job {} started", job.id),
        JobEventKind::Progress => tracing::debug!("Job {} at {:.0}%", job.id, job.progress),
        JobEventKind::Completed => tracing::info!("Job {} completed: {}", job.id, job.output_name),
        JobEventKind::Failed => tracing::warn!(
            "Job {} failed: {}",
            job.id,
            job.error.as_deref().unwrap_or("unknown error")
        ),
        JobEventKind::Purged => tracing::debug!("Job {} purged", job.id),
    }
}

async fn convert_files(
    inputs: Vec<PathBuf>,
    rename: naming::RenameMode,
    name: Option<String>,
    move_inputs: bool,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    for input in &inputs {
        if !input.is_file() {
            anyhow::bail!("Input file does not exist: {:?}", input);
        }
        if !is_convertible_file(input) {
            tracing::warn!("{:?} is not a .webm file, converting anyway", input);
        }
    }

    let staging = if move_inputs {
        StagingMode::Move
    } else {
        StagingMode::Copy
    };
    let engine = Engine::new(&config).with_staging(staging);
    engine.start().await.context("Failed to start engine")?;
    let mut events = engine.subscribe();

    let mut pending: HashSet<JobId> = HashSet::new();
    for input in &inputs {
        let file_name = file_name_string(input)
            .with_context(|| format!("Input has no usable file name: {:?}", input))?;
        let output = naming::output_name(&file_name, rename, name.as_deref());
        let id = engine
            .enqueue(input, &output, JobOrigin::Cli)
            .await
            .with_context(|| format!("Failed to queue {:?}", input))?;
        println!("Queued {} as job {}", input.display(), id);
        pending.insert(id);
    }

    let total = pending.len();
    let mut failed = 0;
    let mut catch_up = tokio::time::interval(Duration::from_secs(1));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    while !pending.is_empty() {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) if pending.contains(&event.job.id) => match event.kind {
                    JobEventKind::Started => println!("Converting {}", event.job.file_name),
                    JobEventKind::Progress => {
                        println!("  {} {:.0}%", event.job.file_name, event.job.progress)
                    }
                    JobEventKind::Completed | JobEventKind::Failed => {
                        if !report_finished(&engine, &event.job) {
                            failed += 1;
                        }
                        pending.remove(&event.job.id);
                    }
                    _ => {}
                },
                Some(_) => {}
                None => break,
            },

            // Terminal events can be dropped when our queue is full
            _ = catch_up.tick() => {
                let finished: Vec<Job> = pending
                    .iter()
                    .filter_map(|id| engine.get_job(*id).ok())
                    .filter(|job| job.status.is_terminal())
                    .collect();
                for job in finished {
                    if !report_finished(&engine, &job) {
                        failed += 1;
                    }
                    pending.remove(&job.id);
                }
            }

            _ = &mut ctrl_c => {
                engine.shutdown().await;
                anyhow::bail!("Interrupted with {} conversion(s) unfinished", pending.len());
            }
        }
    }

    engine.shutdown().await;

    if failed > 0 {
        anyhow::bail!("{} of {} conversion(s) failed", failed, total);
    }
    Ok(())
}

/// Print the outcome of a finished job; returns whether it succeeded.
fn report_finished(engine: &Engine, job: &Job) -> bool {
    match job.status {
        JobStatus::Completed => {
            println!("✓ {} -> {}", job.file_name, engine.output_path(job).display());
            true
        }
        _ => {
            eprintln!(
                "✗ {}: {}",
                job.file_name,
                job.error.as_deref().unwrap_or("unknown error")
            );
            false
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "clipforge=trace,clipforge_av=debug,clipforge_common=debug".to_string()
        } else {
            "clipforge=info,clipforge_av=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Start => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_engine(cli.config.as_deref()))
        }
        Commands::Convert {
            inputs,
            rename,
            name,
            move_inputs,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(convert_files(
                inputs,
                rename,
                name,
                move_inputs,
                cli.config.as_deref(),
            ))
        }
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::InitConfig { path, force } => {
            config::persist::init_config(&path, force)?;
            println!("Wrote default configuration to {}", path.display());
            Ok(())
        }
        Commands::Version => {
            println!("clipforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    let tools_config = match config::load_config_or_default(config_path) {
        Ok(config) => config.tools,
        Err(e) => {
            tracing::warn!("Ignoring configuration for tool lookup: {:#}", e);
            Default::default()
        }
    };

    println!("Checking external tools...\n");

    let report = clipforge_av::check_tools(
        tools_config.ffmpeg_path.as_deref(),
        tools_config.ffprobe_path.as_deref(),
    );
    let missing = report.iter().filter(|tool| !tool.available).count();

    for tool in &report {
        let mark = if tool.available { "✓" } else { "✗" };
        print!("{} {}", mark, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if missing == 0 {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Conversions will fail until they are installed.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            config::Config::default()
        }
    };

    println!(
        "  Engine: {} concurrent, CPU threshold {}%",
        config.engine.max_concurrent, config.engine.cpu_threshold
    );
    println!(
        "  Storage: uploads {:?}, outputs {:?}",
        config.storage.upload_dir, config.storage.output_dir
    );
    println!(
        "  Conversion: deadline {}s, retention {}s, fallback {}",
        config.conversion.deadline_secs,
        config.conversion.retention_secs,
        if config.conversion.fallback.enabled {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!("  Watch enabled: {}", config.watch.enabled);
    println!("  Watch paths: {}", config.watch.paths.len());

    Ok(())
}
