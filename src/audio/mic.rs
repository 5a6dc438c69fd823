// Microphone capture via cpal's default input device.
//
// cpal streams are not `Send`, so the stream lives on a dedicated capture
// thread. The audio callback appends device-format samples to a rolling
// buffer; the thread slices that buffer into chunks every `chunk_interval`,
// downmixing and decimating to the configured format before sending them to
// the async side.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Instant;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use super::backend::{AudioChunk, CaptureConfig, CaptureSource};
use crate::error::CaptureError;

/// Microphone capture source backed by the default cpal input device
pub struct MicSource {
    capturing: bool,
    stop_flag: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl MicSource {
    pub fn new() -> Self {
        Self {
            capturing: false,
            stop_flag: Arc::new(AtomicBool::new(false)),
            thread: None,
        }
    }
}

impl Default for MicSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CaptureSource for MicSource {
    async fn start(
        &mut self,
        config: CaptureConfig,
    ) -> Result<mpsc::Receiver<AudioChunk>, CaptureError> {
        if self.capturing {
            return Err(CaptureError::AlreadyCapturing);
        }
        if config.chunk_interval.is_zero() {
            return Err(CaptureError::InvalidInterval);
        }

        let (chunk_tx, chunk_rx) = mpsc::channel(64);
        let (ready_tx, ready_rx) = oneshot::channel();
        let stop_flag = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop_flag);

        let thread = thread::Builder::new()
            .name("mic-capture".into())
            .spawn(move || capture_thread(config, chunk_tx, ready_tx, thread_stop))
            .map_err(|e| CaptureError::StreamBuild(e.to_string()))?;

        match ready_rx.await {
            Ok(Ok(())) => {
                self.capturing = true;
                self.stop_flag = stop_flag;
                self.thread = Some(thread);
                info!("microphone capture started");
                Ok(chunk_rx)
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => Err(CaptureError::StreamBuild(
                "capture thread exited before reporting readiness".into(),
            )),
        }
    }

    async fn stop(&mut self) -> Result<(), CaptureError> {
        if !self.capturing {
            return Ok(());
        }

        self.stop_flag.store(true, Ordering::SeqCst);

        // Join off the runtime so a slow device teardown can't block other tasks.
        if let Some(thread) = self.thread.take() {
            let joined = tokio::task::spawn_blocking(move || thread.join()).await;
            if !matches!(joined, Ok(Ok(()))) {
                warn!("microphone capture thread did not shut down cleanly");
            }
        }

        self.capturing = false;
        info!("microphone capture stopped");
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn name(&self) -> &str {
        "cpal microphone"
    }
}

impl Drop for MicSource {
    fn drop(&mut self) {
        // Release the device even if the owner never called stop().
        self.stop_flag.store(true, Ordering::SeqCst);
    }
}

fn capture_thread(
    config: CaptureConfig,
    chunks: mpsc::Sender<AudioChunk>,
    ready: oneshot::Sender<Result<(), CaptureError>>,
    stop: Arc<AtomicBool>,
) {
    let host = cpal::default_host();
    let Some(device) = host.default_input_device() else {
        let _ = ready.send(Err(CaptureError::NoInputDevice));
        return;
    };

    let device_config = match device.default_input_config() {
        Ok(cfg) => cfg,
        Err(cpal::DefaultStreamConfigError::DeviceNotAvailable) => {
            let _ = ready.send(Err(CaptureError::NoInputDevice));
            return;
        }
        Err(e) => {
            let _ = ready.send(Err(classify_device_error(e.to_string())));
            return;
        }
    };

    let device_rate = device_config.sample_rate().0;
    let device_channels = device_config.channels();
    debug!(
        "input device: {} @ {}Hz, {} channels",
        device.name().unwrap_or_default(),
        device_rate,
        device_channels
    );

    let buffer: Arc<Mutex<Vec<i16>>> = Arc::new(Mutex::new(Vec::new()));
    let stream = match build_stream(&device, &device_config, Arc::clone(&buffer)) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready.send(Err(CaptureError::StreamPlay(e.to_string())));
        return;
    }
    let _ = ready.send(Ok(()));

    let started = Instant::now();
    while !stop.load(Ordering::SeqCst) {
        thread::sleep(config.chunk_interval);

        let raw = {
            let mut guard = match buffer.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            std::mem::take(&mut *guard)
        };
        if raw.is_empty() {
            continue;
        }

        let mono = downmix(raw, device_channels, config.channels);
        let channels = if config.channels == 1 { 1 } else { device_channels };
        let (samples, sample_rate) = decimate(mono, device_rate, config.sample_rate);

        let chunk = AudioChunk {
            samples,
            sample_rate,
            channels,
            timestamp_ms: started.elapsed().as_millis() as u64,
        };

        // Receiver gone means the session is over; stop delivering.
        if chunks.blocking_send(chunk).is_err() {
            break;
        }
    }

    drop(stream);
}

fn build_stream(
    device: &cpal::Device,
    device_config: &cpal::SupportedStreamConfig,
    buffer: Arc<Mutex<Vec<i16>>>,
) -> Result<cpal::Stream, CaptureError> {
    let stream_config: cpal::StreamConfig = device_config.config();

    let stream = match device_config.sample_format() {
        cpal::SampleFormat::F32 => device.build_input_stream(
            &stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let mut guard = match buffer.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                guard.extend(
                    data.iter()
                        .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16),
                );
            },
            |e| error!("audio capture stream error: {}", e),
            None,
        ),
        cpal::SampleFormat::I16 => device.build_input_stream(
            &stream_config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                let mut guard = match buffer.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                guard.extend_from_slice(data);
            },
            |e| error!("audio capture stream error: {}", e),
            None,
        ),
        other => {
            return Err(CaptureError::StreamBuild(format!(
                "unsupported sample format {:?}",
                other
            )))
        }
    };

    stream.map_err(|e| match e {
        cpal::BuildStreamError::DeviceNotAvailable => CaptureError::NoInputDevice,
        other => classify_device_error(other.to_string()),
    })
}

/// Map backend-specific failures onto permission denial where the message
/// makes that evident; cpal has no dedicated error kind for it.
fn classify_device_error(text: String) -> CaptureError {
    let lowered = text.to_ascii_lowercase();
    if lowered.contains("permission") || lowered.contains("denied") {
        CaptureError::PermissionDenied(text)
    } else {
        CaptureError::StreamBuild(text)
    }
}

/// Convert interleaved samples to mono by averaging channels
fn downmix(samples: Vec<i16>, device_channels: u16, target_channels: u16) -> Vec<i16> {
    if target_channels != 1 || device_channels <= 1 {
        return samples;
    }

    samples
        .chunks(device_channels as usize)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / frame.len() as i32) as i16
        })
        .collect()
}

/// Decimate to the target rate by taking every Nth sample
///
/// Only integer ratios are handled (the 48kHz -> 16kHz case); otherwise the
/// device rate is kept and reported on the chunk.
fn decimate(samples: Vec<i16>, device_rate: u32, target_rate: u32) -> (Vec<i16>, u32) {
    if device_rate <= target_rate || target_rate == 0 || device_rate % target_rate != 0 {
        return (samples, device_rate);
    }

    let ratio = device_rate / target_rate;
    let decimated: Vec<i16> = samples.iter().step_by(ratio as usize).copied().collect();
    (decimated, target_rate)
}
