use std::process::ExitCode;
use std::sync::Arc;

use crate::capture::xcap_provider::XcapProvider;
use crate::desktop::{DesktopFeedback, HotkeyBridge, PresetSelection};
use crate::encoder::ffmpeg::FfmpegBackend;
use crate::logging::init_logging;
use crate::recorder::{Collaborators, CoordinatorConfig, RecordingCoordinator};
use crate::settings::load_settings;

/// Runs the recorder until interrupted with Ctrl+C.
pub fn run() -> ExitCode {
    let _guards = init_logging();
    tracing::info!(target: "system", "regionreel v{} starting", env!("CARGO_PKG_VERSION"));

    let settings = load_settings();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .thread_name("regionreel-rt")
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(target: "system", "Failed to build async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let backend = match FfmpegBackend::new() {
        Ok(backend) => backend,
        Err(e) => {
            tracing::error!(target: "system", "Failed to initialize encoder: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let config = CoordinatorConfig {
        encoder: settings.encoder_settings(),
        output_dir: settings.output_dir(),
    };
    let collaborators = Collaborators {
        provider: Arc::new(XcapProvider::new()),
        backend: Arc::new(backend),
        selection: Arc::new(PresetSelection::new(settings.selection)),
        feedback: Arc::new(DesktopFeedback::new()),
    };

    tracing::info!(
        target: "system",
        "Recording at {} fps into {:?}",
        config.encoder.frame_rate,
        config.output_dir
    );

    let (handle, task) = {
        let _enter = runtime.enter();
        RecordingCoordinator::spawn(config, collaborators)
    };

    let bridge = match HotkeyBridge::start(&settings.hotkey, handle.clone()) {
        Ok(bridge) => bridge,
        Err(e) => {
            tracing::error!(target: "system", "{}", e);
            drop(handle);
            let _ = runtime.block_on(task);
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(target: "system", "Press {} to start or stop a recording, Ctrl+C to quit", settings.hotkey);

    if let Err(e) = runtime.block_on(tokio::signal::ctrl_c()) {
        tracing::error!(target: "system", "Failed to listen for Ctrl+C: {}", e);
    }

    tracing::info!(target: "system", "Shutting down");
    drop(bridge);
    drop(handle);

    // coordinator finishes any in-flight recording before the task ends
    if let Err(e) = runtime.block_on(task) {
        tracing::error!(target: "system", "Coordinator task failed: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
