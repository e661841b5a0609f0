pub mod audio;
pub mod demo;
pub mod geometry;
pub mod landmarks;
pub mod overlay;
pub mod posture;
pub mod sensing;
pub mod session;
pub mod settings;
pub mod utils;

use anyhow::{bail, Context, Result};
use log::{error, info, warn};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use audio::{AlertEmitter, AlertSoundHandle, SilentEmitter};
use demo::{CameraControl, SyntheticCamera, SyntheticHands, SyntheticPose};
use overlay::console::ConsoleCanvas;
use overlay::{LogStatus, StatusSink};
use posture::{KeyboardCalibration, PostureSnapshot, WristMonitor};
use sensing::VideoSource;
use session::MonitorSession;
use settings::SettingsStore;
use utils::TokioClock;

pub fn run() {
    // Initialize logging (reads RUST_LOG env var, info by default)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("WristGuard starting up...");

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!("failed to start async runtime: {err}");
            std::process::exit(1);
        }
    };

    let result = runtime.block_on(run_monitor());
    // The stdin reader sits in a blocking read that never returns on its own.
    runtime.shutdown_timeout(Duration::from_millis(200));

    if let Err(err) = result {
        error!("{err:#}");
        std::process::exit(1);
    }
}

async fn run_monitor() -> Result<()> {
    let store = SettingsStore::new(SettingsStore::default_path())?;
    let settings = store.monitor();
    info!("settings loaded from {}", store.path().display());

    let status: Arc<dyn StatusSink> = Arc::new(LogStatus);
    let sound = AlertSoundHandle::new();
    let emitter: Box<dyn AlertEmitter> = if settings.sound.enabled {
        Box::new(sound.clone())
    } else {
        info!("sound disabled; alerts are visual only");
        Box::new(SilentEmitter)
    };

    let camera = SyntheticCamera::open(&settings.camera);
    let control = camera.as_ref().ok().map(SyntheticCamera::control);
    let monitor = WristMonitor::new(
        Box::new(ConsoleCanvas::new(
            settings.camera.width,
            settings.camera.height,
        )),
        emitter,
        Arc::new(TokioClock),
    );
    let calibration = monitor.calibration();

    let session = MonitorSession::start(
        camera.map(|c| Box::new(c) as Box<dyn VideoSource>),
        SyntheticHands::new(&settings.hands),
        SyntheticPose::new(&settings.pose),
        monitor,
        status.clone(),
        settings.driver_config(),
    )?;

    let shutdown = session.cancel_token();
    tokio::spawn(watch_ctrl_c(shutdown.clone()));
    tokio::spawn(read_commands(
        sound.clone(),
        settings.sound.enabled,
        control,
        calibration,
        status,
        shutdown,
    ));
    tokio::spawn(log_snapshots(session.snapshots()));

    if settings.sound.enabled {
        info!("press Enter to enable alert sounds");
    }
    info!("commands: Enter = enable sound, p = pause/resume, c <y> = calibrate keyboard line, c = clear it, q = quit");

    let exit = session.wait().await;
    sound.shutdown();
    exit.map(|_| ())
}

async fn watch_ctrl_c(shutdown: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("interrupt received, stopping");
            shutdown.cancel();
        }
        Err(err) => warn!("unable to listen for ctrl-c: {err}"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Bare Enter.
    Enter,
    TogglePause,
    Calibrate(u32),
    ClearCalibration,
    Quit,
}

fn parse_command(line: &str) -> Result<Command> {
    let mut words = line.split_whitespace();
    let command = match (words.next(), words.next()) {
        (None, _) => Command::Enter,
        (Some("p"), None) => Command::TogglePause,
        (Some("q"), None) => Command::Quit,
        (Some("c"), None) => Command::ClearCalibration,
        (Some("c"), Some(y)) => Command::Calibrate(
            y.parse()
                .with_context(|| format!("keyboard line must be a pixel row, got {y:?}"))?,
        ),
        _ => bail!("unknown command {:?}", line.trim()),
    };
    if words.next().is_some() {
        bail!("unexpected arguments in {:?}", line.trim());
    }
    Ok(command)
}

/// Line commands on stdin. Pressing Enter is the user gesture that
/// unlocks audio output.
async fn read_commands(
    sound: AlertSoundHandle,
    sound_enabled: bool,
    control: Option<CameraControl>,
    calibration: KeyboardCalibration,
    status: Arc<dyn StatusSink>,
    shutdown: CancellationToken,
) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = shutdown.cancelled() => return,
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => return,
            Err(err) => {
                warn!("stdin closed: {err}");
                return;
            }
        };

        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(err) => {
                warn!("{err:#}");
                continue;
            }
        };

        match command {
            Command::Enter if sound_enabled && !sound.is_unlocked() => {
                let handle = sound.clone();
                let unlocked = tokio::task::spawn_blocking(move || handle.unlock())
                    .await
                    .context("audio unlock task failed");
                match unlocked {
                    Ok(Ok(())) => info!("alert sounds enabled"),
                    Ok(Err(err)) => {
                        warn!("audio unlock failed: {err}");
                        status.set_status(&format!("Audio unavailable: {err}"));
                    }
                    Err(err) => warn!("{err:#}"),
                }
            }
            Command::Enter => {}
            Command::TogglePause => match &control {
                Some(control) => {
                    let paused = control.toggle_pause();
                    info!("{}", if paused { "paused" } else { "resumed" });
                }
                None => warn!("no camera to pause"),
            },
            Command::Calibrate(y) => {
                calibration.set(y);
                status.set_status(&format!("Keyboard calibrated at y={y}"));
            }
            Command::ClearCalibration => {
                calibration.clear();
                status.set_status("Keyboard calibration cleared");
            }
            Command::Quit => {
                shutdown.cancel();
                return;
            }
        }
    }
}

/// Log status transitions, height warnings and every alert played.
async fn log_snapshots(mut snapshots: tokio::sync::watch::Receiver<PostureSnapshot>) {
    let mut last = snapshots.borrow().clone();

    while snapshots.changed().await.is_ok() {
        let snapshot = snapshots.borrow_and_update().clone();
        if snapshot.status != last.status {
            info!(
                "posture {:?} -> {:?} ({})",
                last.status,
                snapshot.status,
                serde_json::to_string(&snapshot).unwrap_or_default()
            );
        }
        if snapshot.height.wrist_above_elbow && !last.height.wrist_above_elbow {
            warn!("wrist above elbow");
        }
        if snapshot.height.wrist_too_high && !last.height.wrist_too_high {
            warn!("wrist too high above the keyboard line");
        }
        if snapshot.alerts_played > last.alerts_played {
            info!(
                "alert #{} (wrist low for {}ms)",
                snapshot.alerts_played, snapshot.bad_for_ms
            );
        }
        last = snapshot;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_command("").unwrap(), Command::Enter);
        assert_eq!(parse_command("  ").unwrap(), Command::Enter);
        assert_eq!(parse_command("p").unwrap(), Command::TogglePause);
        assert_eq!(parse_command("q").unwrap(), Command::Quit);
        assert_eq!(parse_command("c 360").unwrap(), Command::Calibrate(360));
        assert_eq!(parse_command(" c ").unwrap(), Command::ClearCalibration);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(parse_command("c high").is_err());
        assert!(parse_command("c -5").is_err());
        assert!(parse_command("c 10 20").is_err());
        assert!(parse_command("x").is_err());
    }
}
