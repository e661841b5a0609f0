pub mod tone;

use tone::AlertTone;

use rodio::{OutputStream, Sink};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc::{self, Sender},
    Arc, Mutex,
};
use std::thread;

/// Something that can play the wrist alert.
///
/// Fire-and-forget; callers rate-limit, implementations must not block.
pub trait AlertEmitter: Send {
    fn emit_alert(&self);
}

enum AudioCommand {
    Unlock(mpsc::Sender<Result<(), String>>),
    Beep,
    Shutdown,
}

/// Handle to the dedicated alert-audio thread.
///
/// The output stream is only opened on [`AlertSoundHandle::unlock`], which
/// the entry point calls after a user gesture. Beeps requested before that
/// are dropped.
#[derive(Clone)]
pub struct AlertSoundHandle {
    tx: Arc<Mutex<Option<Sender<AudioCommand>>>>,
    unlocked: Arc<AtomicBool>,
}

impl AlertSoundHandle {
    pub fn new() -> Self {
        Self {
            tx: Arc::new(Mutex::new(None)),
            unlocked: Arc::new(AtomicBool::new(false)),
        }
    }

    fn ensure_thread(&self) -> Result<Sender<AudioCommand>, String> {
        if let Some(tx) = self.tx.lock().map_err(|e| e.to_string())?.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<AudioCommand>();
        let unlocked = Arc::clone(&self.unlocked);

        // OutputStream is !Send, so it lives and dies on this thread
        thread::Builder::new()
            .name("alert-audio".to_string())
            .spawn(move || {
                let mut _stream: Option<OutputStream> = None;
                let mut sink: Option<Sink> = None;

                fn open_sink(
                    stream: &mut Option<OutputStream>,
                    sink: &mut Option<Sink>,
                ) -> Result<(), String> {
                    if sink.is_none() {
                        let (s, handle) = OutputStream::try_default()
                            .map_err(|e| format!("Failed to create audio output stream: {}", e))?;
                        let new_sink = Sink::try_new(&handle)
                            .map_err(|e| format!("Failed to create audio sink: {}", e))?;
                        *stream = Some(s);
                        *sink = Some(new_sink);
                    }
                    Ok(())
                }

                while let Ok(cmd) = rx.recv() {
                    match cmd {
                        AudioCommand::Unlock(reply) => {
                            let result = open_sink(&mut _stream, &mut sink);
                            unlocked.store(result.is_ok(), Ordering::SeqCst);
                            let _ = reply.send(result);
                        }
                        AudioCommand::Beep => {
                            if let Some(ref s) = sink {
                                // Drop anything still queued so beeps never pile up
                                s.clear();
                                s.append(AlertTone::new());
                                s.play();
                            }
                        }
                        AudioCommand::Shutdown => {
                            if let Some(s_old) = sink.take() {
                                s_old.stop();
                            }
                            _stream = None;
                            unlocked.store(false, Ordering::SeqCst);
                            break;
                        }
                    }
                }
            })
            .map_err(|e| e.to_string())?;

        let tx_clone = tx.clone();
        *self.tx.lock().map_err(|e| e.to_string())? = Some(tx);
        Ok(tx_clone)
    }

    /// Open the audio output. Blocks until the device is ready or failed.
    pub fn unlock(&self) -> Result<(), String> {
        let tx = self.ensure_thread()?;
        let (reply_tx, reply_rx) = mpsc::channel();
        tx.send(AudioCommand::Unlock(reply_tx))
            .map_err(|e| e.to_string())?;
        reply_rx
            .recv()
            .map_err(|_| "audio thread exited before unlocking".to_string())?
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked.load(Ordering::SeqCst)
    }

    pub fn shutdown(&self) {
        if let Ok(Some(tx)) = self.tx.lock().map(|mut g| g.take()) {
            let _ = tx.send(AudioCommand::Shutdown);
        }
    }
}

impl Default for AlertSoundHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertEmitter for AlertSoundHandle {
    fn emit_alert(&self) {
        if !self.is_unlocked() {
            log::debug!("alert tone skipped: audio not unlocked yet");
            return;
        }

        if let Ok(Some(tx)) = self.tx.lock().map(|g| g.clone()) {
            let _ = tx.send(AudioCommand::Beep);
        }
    }
}

/// Visual-only mode: used when sound is disabled in settings.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentEmitter;

impl AlertEmitter for SilentEmitter {
    fn emit_alert(&self) {}
}
