//! Command runners for script, dictate and rehearse

use std::env;
use std::io::{self, IsTerminal, Read, Write};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use tokio::sync::watch;
use tracing::{debug, info};

use crate::application::ports::{ArtifactStore, ConfigStore, SystemClock};
use crate::application::{
    run_frame_loop, CaptureConfig, CaptureController, Delivery, DeviceSessionManager,
    DictateBioUseCase, DictateError, GenerateScriptUseCase, ScriptError, ScrollSync, SharedScroll,
    StatusBroadcaster, DEFAULT_FPS,
};
use crate::domain::capture::{suggested_filename, CaptureKind};
use crate::domain::config::AppConfig;
use crate::domain::error::CaptureError;
use crate::domain::recording::Duration;
use crate::domain::status::StatusReport;
use crate::infrastructure::{
    FsArtifactStore, GeminiClient, HostDevices, HostRecorders, XdgConfigStore,
};

use super::args::{DictateArgs, RehearseArgs, ScriptArgs};
use super::presenter::Presenter;
use super::prompter_view::{PrompterView, DEFAULT_ROWS, DEFAULT_WIDTH};
use super::signals::ShutdownSignal;

/// Exit codes
pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_ERROR: u8 = 1;
pub const EXIT_USAGE_ERROR: u8 = 2;

/// Overrides the Gemini endpoint (proxies, tests)
pub const API_BASE_URL_ENV: &str = "GEMINI_API_BASE_URL";

const END_POLL_INTERVAL: StdDuration = StdDuration::from_millis(100);

type HostController = CaptureController<HostDevices, HostRecorders, FsArtifactStore>;

/// Turn a bio into a spoken script
pub async fn run_script(args: ScriptArgs, config: AppConfig) -> ExitCode {
    let mut presenter = Presenter::new();

    let bio = match read_text_input(args.bio, args.file.as_deref()) {
        Ok(text) => text,
        Err(e) => {
            presenter.error(&format!("Failed to read bio: {}", e));
            return ExitCode::from(EXIT_USAGE_ERROR);
        }
    };
    if bio.trim().is_empty() {
        presenter.error(&ScriptError::EmptyBio.to_string());
        return ExitCode::from(EXIT_USAGE_ERROR);
    }

    let client = match gemini_client(&config) {
        Some(client) => client,
        None => {
            presenter.error(&ScriptError::MissingApiKey.to_string());
            return ExitCode::from(EXIT_ERROR);
        }
    };

    presenter.start_spinner("Writing script...");
    let use_case = GenerateScriptUseCase::new(client);
    match use_case.execute(&bio, args.refine.as_deref()).await {
        Ok(script) => {
            presenter.spinner_success("Script ready");
            presenter.output(&script);
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => {
            presenter.spinner_fail("Script generation failed");
            presenter.error(&e.to_string());
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Record a bio from the microphone, transcribe it and optionally script it
pub async fn run_dictate(args: DictateArgs, config: AppConfig) -> ExitCode {
    let mut presenter = Presenter::new();

    let max_duration = match parse_max_duration(&config) {
        Ok(d) => d,
        Err(e) => {
            presenter.error(&e);
            return ExitCode::from(EXIT_USAGE_ERROR);
        }
    };

    // Check the key before recording so nothing said is lost
    let client = match gemini_client(&config) {
        Some(client) => client,
        None => {
            presenter.error(&DictateError::MissingApiKey.to_string());
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let shutdown = ShutdownSignal::new();
    if let Err(e) = shutdown.setup() {
        presenter.error(&format!("Failed to setup signal handler: {}", e));
        return ExitCode::from(EXIT_ERROR);
    }

    let status = StatusBroadcaster::new();
    let controller = Arc::new(
        host_controller(
            CaptureConfig::new(CaptureKind::AudioOnly),
            config.output_dir_or_default(),
        )
        .await
        .with_status(status.clone()),
    );
    let use_case = DictateBioUseCase::new(Arc::clone(&controller), client.clone())
        .with_status(status.clone());

    if let Err(e) = use_case.start().await {
        report_failure(&presenter, &status, &e.to_string());
        return ExitCode::from(EXIT_ERROR);
    }

    presenter.start_spinner("Recording...");
    record_until_stopped(&presenter, &shutdown, &controller, max_duration).await;

    presenter.update_spinner("Transcribing...");
    let output = match use_case.finish().await {
        Ok(output) => output,
        Err(e) => {
            presenter.spinner_fail("Dictation failed");
            report_failure(&presenter, &status, &e.to_string());
            return ExitCode::from(EXIT_ERROR);
        }
    };
    presenter.spinner_success(&format!(
        "Transcribed {}s of audio ({})",
        output.elapsed_secs, output.audio_size
    ));

    if !args.script {
        presenter.output(&output.text);
        return ExitCode::from(EXIT_SUCCESS);
    }

    presenter.info(&format!("Bio: {}", output.text));
    presenter.start_spinner("Writing script...");
    let script_use_case = GenerateScriptUseCase::new(client).with_status(status.clone());
    match script_use_case
        .execute(&output.text, args.refine.as_deref())
        .await
    {
        Ok(script) => {
            presenter.spinner_success("Script ready");
            presenter.output(&script);
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => {
            presenter.spinner_fail("Script generation failed");
            presenter.error(&e.to_string());
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Scroll a script in the terminal, optionally recording a take
pub async fn run_rehearse(args: RehearseArgs, config: AppConfig) -> ExitCode {
    let mut presenter = Presenter::new();

    let script = match read_text_input(None, args.script_file.as_deref()) {
        Ok(text) => text,
        Err(e) => {
            presenter.error(&format!("Failed to read script: {}", e));
            return ExitCode::from(EXIT_USAGE_ERROR);
        }
    };
    if script.trim().is_empty() {
        presenter.error("The script is empty; generate one with 'bio-prompter script' first");
        return ExitCode::from(EXIT_USAGE_ERROR);
    }

    let max_duration = match parse_max_duration(&config) {
        Ok(d) => d,
        Err(e) => {
            presenter.error(&e);
            return ExitCode::from(EXIT_USAGE_ERROR);
        }
    };

    let shutdown = ShutdownSignal::new();
    if let Err(e) = shutdown.setup() {
        presenter.error(&format!("Failed to setup signal handler: {}", e));
        return ExitCode::from(EXIT_ERROR);
    }

    let view = PrompterView::new(
        &script,
        config.line_height_or_default(),
        DEFAULT_WIDTH,
        DEFAULT_ROWS,
    );
    let scroll = SharedScroll::with_clock(Arc::new(SystemClock::new()), config.speed_or_default());
    scroll.set_extent(Some(view.extent()));

    let output_dir = config.output_dir_or_default();
    let status = StatusBroadcaster::new();
    let controller = if args.record {
        let kind = if args.audio_only {
            CaptureKind::AudioOnly
        } else {
            CaptureKind::AudioVideo
        };
        let capture_config = CaptureConfig::new(kind).with_purpose(config.purpose_or_default());
        let controller = host_controller(capture_config, output_dir.clone())
            .await
            .with_scroll(Arc::new(scroll.clone()))
            .with_status(status.clone());

        if let Err(e) = controller.start().await {
            report_failure(&presenter, &status, &e.to_string());
            return ExitCode::from(EXIT_ERROR);
        }
        Some(controller)
    } else {
        scroll.run();
        None
    };
    info!(
        lines = view.lines().len(),
        speed = scroll.state().speed(),
        recording = controller.is_some(),
        "prompter started"
    );

    let (stop_tx, stop_rx) = watch::channel(false);
    let frames = tokio::spawn(run_frame_loop(scroll.clone(), DEFAULT_FPS, stop_rx, {
        let mut last_frame = None;
        move |state| {
            let key = (view.current_line(state.position()), state.is_running());
            if last_frame != Some(key) {
                last_frame = Some(key);
                let mut stdout = io::stdout();
                let _ = stdout.write_all(view.render(state).as_bytes());
                let _ = stdout.flush();
            }
        }
    }));

    let deadline = tokio::time::sleep(max_duration.as_std());
    tokio::pin!(deadline);
    let mut end_poll = tokio::time::interval(END_POLL_INTERVAL);
    loop {
        tokio::select! {
            _ = shutdown.wait() => break,
            _ = &mut deadline => {
                debug!("rehearsal reached max duration");
                break;
            }
            _ = end_poll.tick() => {
                if scroll.state().at_end() {
                    debug!("prompter reached the end of the script");
                    break;
                }
            }
        }
    }

    let _ = stop_tx.send(true);
    let _ = frames.await;
    println!();

    let Some(controller) = controller else {
        scroll.pause();
        presenter.success("Rehearsal finished");
        return ExitCode::from(EXIT_SUCCESS);
    };

    presenter.start_spinner("Saving take...");
    match controller.stop().await {
        Ok(Some(capture)) => {
            let saved = match capture.delivery {
                Delivery::Download { reference, .. } => Ok(reference),
                Delivery::Base64(_) => {
                    let extension = controller.codec().map_or("ogg", |c| c.extension());
                    let filename = suggested_filename(
                        config.purpose_or_default(),
                        "audio",
                        capture.artifact.created_at_ms(),
                        extension,
                    );
                    FsArtifactStore::new(&output_dir)
                        .publish(&capture.artifact, &filename)
                        .await
                }
            };
            match saved {
                Ok(reference) => {
                    presenter.spinner_success(&format!(
                        "Saved {}s take ({}) to {}",
                        capture.elapsed_secs,
                        capture.artifact.human_readable_size(),
                        reference
                    ));
                    ExitCode::from(EXIT_SUCCESS)
                }
                Err(e) => {
                    presenter.spinner_fail("Saving take failed");
                    presenter.status_report(&StatusReport::from_error(&CaptureError::from(e)));
                    ExitCode::from(EXIT_ERROR)
                }
            }
        }
        Ok(None) => {
            presenter.spinner_fail("Nothing was recorded");
            ExitCode::from(EXIT_ERROR)
        }
        Err(e) => {
            presenter.spinner_fail("Recording failed");
            report_failure(&presenter, &status, &e.to_string());
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Tick the progress display until Ctrl+C or the take limit
async fn record_until_stopped(
    presenter: &Presenter,
    shutdown: &ShutdownSignal,
    controller: &HostController,
    max_duration: Duration,
) {
    let max_secs = max_duration.as_secs();
    let deadline = tokio::time::sleep(max_duration.as_std());
    tokio::pin!(deadline);
    let mut progress = tokio::time::interval(StdDuration::from_millis(250));

    loop {
        tokio::select! {
            _ = shutdown.wait() => break,
            _ = &mut deadline => {
                info!(max_secs, "max duration reached, stopping");
                break;
            }
            _ = progress.tick() => {
                presenter.update_recording_progress(controller.elapsed_secs(), max_secs);
            }
        }
    }
}

async fn host_controller(config: CaptureConfig, output_dir: impl AsRef<Path>) -> HostController {
    let host = HostDevices::new();
    let capabilities = host.capabilities(config.kind).await;
    let devices = Arc::new(DeviceSessionManager::new(host));
    devices.query_existing_permission(config.kind);
    CaptureController::new(
        config,
        devices,
        Arc::new(capabilities),
        HostRecorders::new(),
        FsArtifactStore::new(output_dir.as_ref()),
        Arc::new(SystemClock::new()),
    )
}

/// Print the broadcast error report when there is one, else `fallback`
fn report_failure(presenter: &Presenter, status: &StatusBroadcaster, fallback: &str) {
    let report = status.current();
    if report.is_error() {
        presenter.status_report(&report);
    } else {
        presenter.error(fallback);
    }
}

fn parse_max_duration(config: &AppConfig) -> Result<Duration, String> {
    match config.max_duration.as_ref() {
        Some(s) => s
            .parse::<Duration>()
            .map_err(|e| format!("Invalid max-duration: {}", e)),
        None => Ok(Duration::default_max_duration()),
    }
}

/// Gemini client for the merged config, or `None` without an API key
pub fn gemini_client(config: &AppConfig) -> Option<GeminiClient> {
    let api_key = config.api_key.as_deref().filter(|key| !key.is_empty())?;
    let client = GeminiClient::with_model(api_key, config.model_or_default());
    Some(match env::var(API_BASE_URL_ENV) {
        Ok(url) if !url.is_empty() => client.with_base_url(url),
        _ => client,
    })
}

/// Text from the argument, a file, or piped stdin, in that order
pub fn read_text_input(inline: Option<String>, file: Option<&Path>) -> io::Result<String> {
    if let Some(text) = inline {
        return Ok(text);
    }
    if let Some(path) = file {
        return std::fs::read_to_string(path);
    }

    let mut stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(String::new());
    }
    let mut text = String::new();
    stdin.read_to_string(&mut text)?;
    Ok(text)
}

/// Load and merge configuration from file, env, and CLI
pub async fn load_merged_config(cli_config: AppConfig) -> AppConfig {
    let store = XdgConfigStore::new();
    let file_config = store.load().await.unwrap_or_else(|e| {
        debug!(error = %e, "ignoring unreadable config file");
        AppConfig::empty()
    });

    let env_config = AppConfig {
        api_key: env::var("GEMINI_API_KEY").ok().filter(|s| !s.is_empty()),
        ..Default::default()
    };

    // Merge: defaults < file < env < cli
    AppConfig::defaults()
        .merge(file_config)
        .merge(env_config)
        .merge(cli_config)
}
