// cpal-based audio renderer
// The cpal stream is not Send, so it lives on its own thread and is driven
// through a command channel.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::Stream;
use looptrack_core::{AudioError, Result};
use looptrack_renderer_api::{AudioCallback, AudioRenderer, AudioSpec};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

enum StreamCommand {
    Play,
    Pause,
    Release,
}

type SharedCallback = Arc<Mutex<Option<AudioCallback>>>;

/// cpal audio renderer
pub struct CpalRenderer {
    commands: Sender<StreamCommand>,
    worker: Option<JoinHandle<()>>,
    is_playing: Arc<AtomicBool>,
    spec: AudioSpec,
    user_callback: SharedCallback,
}

impl CpalRenderer {
    /// Open the default output device.
    ///
    /// The device's own rate and channel count win over `preferred`; callers
    /// read the effective format back through `spec()`.
    pub fn new(preferred: AudioSpec) -> Result<Self> {
        let is_playing = Arc::new(AtomicBool::new(false));
        let user_callback: SharedCallback = Arc::new(Mutex::new(None));

        let (commands, command_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<AudioSpec>>();

        let is_playing_clone = is_playing.clone();
        let user_callback_clone = user_callback.clone();

        let worker = thread::Builder::new()
            .name("looptrack-output".to_string())
            .spawn(move || {
                let (stream, spec) =
                    match build_stream(preferred, is_playing_clone, user_callback_clone) {
                        Ok(built) => built,
                        Err(e) => {
                            let _ = ready_tx.send(Err(e));
                            return;
                        }
                    };
                let _ = ready_tx.send(Ok(spec));

                for command in command_rx {
                    let result = match command {
                        StreamCommand::Play => stream.play().map_err(|e| e.to_string()),
                        StreamCommand::Pause => stream.pause().map_err(|e| e.to_string()),
                        StreamCommand::Release => break,
                    };
                    if let Err(e) = result {
                        log::error!("Audio stream control failed: {}", e);
                    }
                }

                log::debug!("Output stream released");
            })
            .map_err(|e| AudioError::InitializationError(format!("Failed to spawn output thread: {}", e)))?;

        let spec = ready_rx
            .recv()
            .map_err(|_| AudioError::InitializationError("Output thread exited".to_string()))??;

        log::info!(
            "Opened output device: {} Hz, {} ch",
            spec.sample_rate,
            spec.channels
        );

        Ok(Self {
            commands,
            worker: Some(worker),
            is_playing,
            spec,
            user_callback,
        })
    }

    fn send(&self, command: StreamCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| AudioError::DeviceError("Output thread is gone".to_string()))
    }
}

fn build_stream(
    preferred: AudioSpec,
    is_playing: Arc<AtomicBool>,
    user_callback: SharedCallback,
) -> Result<(Stream, AudioSpec)> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| AudioError::DeviceError("No output device available".to_string()))?;
    let config = device
        .default_output_config()
        .map_err(|e| AudioError::DeviceError(format!("Output config failed: {}", e)))?;

    if config.sample_format() != cpal::SampleFormat::F32 {
        return Err(AudioError::UnsupportedFormat(format!(
            "Only f32 output is supported, device uses {:?}",
            config.sample_format()
        )));
    }

    let spec = AudioSpec {
        sample_rate: config.sample_rate().0,
        channels: config.channels(),
        buffer_size: preferred.buffer_size,
    };
    if spec.sample_rate != preferred.sample_rate || spec.channels != preferred.channels {
        log::debug!(
            "Device format {:?} differs from preferred {:?}",
            spec,
            preferred
        );
    }

    let stream = device
        .build_output_stream(
            &config.config(),
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                if !is_playing.load(Ordering::Relaxed) {
                    data.fill(0.0);
                    return;
                }

                let samples_written = match *user_callback.lock() {
                    Some(ref mut callback) => callback(data),
                    None => 0,
                };

                // Zero-fill any unwritten samples to prevent playing stale data
                if samples_written < data.len() {
                    data[samples_written..].fill(0.0);
                }
            },
            |err| {
                log::error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::InitializationError(format!("Failed to build output stream: {}", e)))?;

    Ok((stream, spec))
}

impl AudioRenderer for CpalRenderer {
    fn start(&mut self) -> Result<()> {
        self.send(StreamCommand::Play)?;
        self.is_playing.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.is_playing.store(false, Ordering::Relaxed);
        self.send(StreamCommand::Pause)
    }

    fn set_audio_callback(&mut self, callback: AudioCallback) -> Result<()> {
        *self.user_callback.lock() = Some(callback);
        Ok(())
    }

    fn spec(&self) -> AudioSpec {
        self.spec
    }

    fn is_playing(&self) -> bool {
        self.is_playing.load(Ordering::Relaxed)
    }

    fn release(&mut self) -> Result<()> {
        self.is_playing.store(false, Ordering::Relaxed);
        let _ = self.commands.send(StreamCommand::Release);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        self.user_callback.lock().take();
        Ok(())
    }
}

impl Drop for CpalRenderer {
    fn drop(&mut self) {
        let _ = self.release();
    }
}
