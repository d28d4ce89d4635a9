//! Editkit demo: apply edits to an image through an editor adapter.
//!
//! Every engine call goes through the recovery coordinator's safe wrapper,
//! and brightness is fed through the debounced update scheduler the way a
//! slider would.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use editkit_core::adapter::lock;
use editkit_core::{
    AdapterFactory, AdapterType, Container, EngineRegistry, RecoveryConfig, RecoveryContext,
    RecoveryCoordinator, SchedulerConfig, UpdateScheduler,
};
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "editkit-demo", about = "Edit an image through an Editkit adapter", version)]
struct Cli {
    /// Source image: file path or data URI
    #[arg(short, long, env = "EDITKIT_INPUT")]
    input: String,

    /// Where to write the exported image
    #[arg(short, long, env = "EDITKIT_OUTPUT")]
    output: PathBuf,

    /// Adapter to drive (canvas-object, image-editor, cropper, scene-2d, raster)
    #[arg(short, long, default_value = "raster", value_parser = parse_adapter_type)]
    engine: AdapterType,

    /// Container width in pixels
    #[arg(long, default_value = "1024")]
    width: u32,

    /// Container height in pixels
    #[arg(long, default_value = "1024")]
    height: u32,

    /// Brightness in [-1, 1]
    #[arg(short, long, allow_hyphen_values = true)]
    brightness: Option<f64>,

    /// Rotation in degrees
    #[arg(short, long, allow_hyphen_values = true)]
    rotate: Option<f64>,

    /// Uniform scale factor
    #[arg(long)]
    scale: Option<f64>,

    /// Filters to apply in order
    #[arg(short, long)]
    filter: Vec<String>,

    /// Export MIME type (unsupported types fall back to PNG)
    #[arg(long, default_value = "image/png")]
    format: String,

    /// Export quality in [0, 1]
    #[arg(short, long, default_value = "0.92")]
    quality: f64,

    /// Restore the loaded image before exporting, discarding edits
    #[arg(long)]
    revert: bool,
}

fn parse_adapter_type(name: &str) -> Result<AdapterType, String> {
    name.parse().map_err(|e: editkit_core::AdapterError| e.to_string())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,editkit_core=debug,editkit_engines=debug"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr);

    // Use JSON format in production (RUST_LOG_FORMAT=json)
    if std::env::var("RUST_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

fn recovery_context() -> RecoveryContext {
    RecoveryContext::new()
        .on_reset_state(|| {
            tracing::info!("Resetting view state");
            Ok(())
        })
        .on_enable_mouse_events(|| {
            tracing::info!("Pointer events re-enabled");
            Ok(())
        })
        .on_validate_editor_state(|| {
            tracing::info!("Editor state validated");
            Ok(())
        })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let registry = EngineRegistry::new();
    editkit_engines::register_all(&registry);
    let factory = AdapterFactory::new(registry);
    let coordinator = RecoveryCoordinator::new(RecoveryConfig::from_env());
    let context = recovery_context();

    let adapter = factory.create_shared(cli.engine);
    let (record, snapshot) = {
        let mut guard = lock(&adapter);
        guard
            .initialize(Container::new("demo", cli.width, cli.height))
            .context("failed to initialize adapter")?;
        let record = guard
            .load_image(&cli.input)
            .with_context(|| format!("failed to load {}", cli.input))?;
        (record, guard.save_state()?)
    };
    tracing::info!(
        "Loaded {}x{} image into {} adapter",
        record.width,
        record.height,
        cli.engine
    );

    let mut skipped = Vec::new();

    for name in &cli.filter {
        if coordinator
            .run_safely(&adapter, &context, |a| a.apply_filter(name))?
            .is_none()
        {
            skipped.push(format!("filter:{name}"));
        }
    }

    if let Some(degrees) = cli.rotate {
        if coordinator
            .run_safely(&adapter, &context, |a| a.rotate(degrees))?
            .is_none()
        {
            skipped.push("rotate".to_string());
        }
    }

    if let Some(factor) = cli.scale {
        if coordinator
            .run_safely(&adapter, &context, |a| a.set_scale(factor, factor))?
            .is_none()
        {
            skipped.push("scale".to_string());
        }
    }

    let mut scheduler_stats = None;
    if let Some(target) = cli.brightness {
        let scheduler_config = SchedulerConfig::from_env();
        let settle = scheduler_config.debounce() + Duration::from_millis(50);
        let applied = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&applied);
        let shared = Arc::clone(&adapter);
        let sync_coordinator = coordinator.clone();
        let sync_context = context.clone();

        let scheduler = UpdateScheduler::new(scheduler_config, move |level: f64| {
            let outcome =
                sync_coordinator.run_safely(&shared, &sync_context, |a| a.set_brightness(level));
            *sink.lock().unwrap_or_else(PoisonError::into_inner) = Some(outcome);
            std::future::ready(())
        });

        // Drag the slider towards the target in small steps.
        for step in 1..=5 {
            scheduler.schedule(target * f64::from(step) / 5.0);
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tokio::time::sleep(settle).await;
        scheduler_stats = Some(scheduler.stats());

        let outcome = applied
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match outcome {
            Some(Ok(Some(()))) => {}
            Some(Ok(None)) | None => skipped.push("brightness".to_string()),
            Some(Err(err)) => return Err(err).context("brightness rejected"),
        }
    }

    if cli.revert {
        lock(&adapter)
            .restore_state(snapshot)
            .context("failed to restore snapshot")?;
    }

    let Some(blob) =
        coordinator.run_safely(&adapter, &context, |a| a.to_blob(&cli.format, cli.quality))?
    else {
        bail!("export failed; see log for the engine failure");
    };
    tokio::fs::write(&cli.output, &blob.bytes)
        .await
        .with_context(|| format!("failed to write {}", cli.output.display()))?;

    let health = lock(&adapter).health();
    let summary = json!({
        "engine": cli.engine,
        "input": {
            "source_type": record.source_type,
            "width": record.width,
            "height": record.height,
        },
        "output": {
            "path": cli.output.display().to_string(),
            "mime": blob.mime,
            "bytes": blob.bytes.len(),
            "width": health.width,
            "height": health.height,
        },
        "reverted": cli.revert,
        "skipped": skipped,
        "recovery": coordinator.stats(),
        "scheduler": scheduler_stats,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    lock(&adapter).destroy();
    Ok(())
}
