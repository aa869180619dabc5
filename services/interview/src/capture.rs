use crate::config::INPUT_CHUNK_SIZE;
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{FrameCount, StreamConfig};
use interview_core::error::RecorderError;
use interview_core::recorder::{AudioDevice, ChunkSender};
use interview_native_utils::audio::{TRANSCRIPTION_SAMPLE_RATE, create_resampler, downmix_to_mono, resample};
use std::sync::mpsc as std_mpsc;
use std::thread::JoinHandle;

/// Microphone capture through cpal.
///
/// A cpal stream is not `Send` on every host, so each recording gets its own
/// thread that builds the stream, keeps it alive, and drops it when released.
/// Audio is downmixed and resampled to the transcription rate before it leaves
/// the callback.
pub struct CpalDevice {
    device_name: Option<String>,
    stop_tx: Option<std_mpsc::Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl CpalDevice {
    pub fn new(device_name: Option<String>) -> Self {
        Self {
            device_name,
            stop_tx: None,
            worker: None,
        }
    }
}

impl AudioDevice for CpalDevice {
    fn acquire(&mut self, chunks: ChunkSender) -> Result<u32, RecorderError> {
        let (ready_tx, ready_rx) = std_mpsc::channel::<Result<(), RecorderError>>();
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();
        let device_name = self.device_name.clone();

        let worker = std::thread::Builder::new()
            .name("audio-capture".to_string())
            .spawn(move || match open_stream(device_name, chunks) {
                Ok(stream) => {
                    let _ = ready_tx.send(Ok(()));
                    // Blocks until release() or until the device handle is dropped.
                    let _ = stop_rx.recv();
                    drop(stream);
                    tracing::debug!("Input stream closed");
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            })
            .map_err(|e| RecorderError::Capture(format!("Failed to spawn capture thread: {e}")))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                self.stop_tx = Some(stop_tx);
                self.worker = Some(worker);
                Ok(TRANSCRIPTION_SAMPLE_RATE as u32)
            }
            Ok(Err(e)) => {
                let _ = worker.join();
                Err(e)
            }
            Err(_) => Err(RecorderError::Capture(
                "Capture thread exited before the stream started".to_string(),
            )),
        }
    }

    fn release(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::warn!("Capture thread panicked");
            }
        }
    }
}

fn open_stream(device_name: Option<String>, chunks: ChunkSender) -> Result<cpal::Stream, RecorderError> {
    let input = interview_native_utils::device::get_or_default_input(device_name)
        .map_err(|e| RecorderError::DeviceUnavailable(format!("{e:#}")))?;
    tracing::info!("Using input device: {:?}", input.name().unwrap_or_default());

    // Get the default configuration for the audio input.
    let default_config = input
        .default_input_config()
        .map_err(|e| RecorderError::DeviceUnavailable(e.to_string()))?;

    // Use the default channels and sample rate, but with a fixed buffer size.
    let input_config = StreamConfig {
        channels: default_config.channels(),
        sample_rate: default_config.sample_rate(),
        buffer_size: cpal::BufferSize::Fixed(FrameCount::from(INPUT_CHUNK_SIZE as u32)),
    };
    let channel_count = input_config.channels as usize;
    tracing::debug!("Input stream config: {:?}", &input_config);

    let mut resampler = create_resampler(
        input_config.sample_rate.0 as f64,
        TRANSCRIPTION_SAMPLE_RATE,
        INPUT_CHUNK_SIZE,
    )
    .map_err(|e| RecorderError::Capture(format!("{e:#}")))?;
    let mut pending: Vec<f32> = Vec::with_capacity(INPUT_CHUNK_SIZE * 2);

    let input_data_fn = move |data: &[f32], _: &cpal::InputCallbackInfo| {
        pending.extend(downmix_to_mono(data, channel_count));
        while pending.len() >= INPUT_CHUNK_SIZE {
            let chunk: Vec<f32> = pending.drain(..INPUT_CHUNK_SIZE).collect();
            match resample(&mut resampler, &chunk) {
                Ok(samples) => {
                    if chunks.send(samples).is_err() {
                        tracing::debug!("Recording closed, dropping audio");
                    }
                }
                Err(e) => tracing::warn!("Failed to resample audio: {:#}", e),
            }
        }
    };

    let stream = input
        .build_input_stream(
            &input_config,
            input_data_fn,
            move |err| tracing::error!("An error occurred on input stream: {}", err),
            None,
        )
        .map_err(|e| RecorderError::DeviceUnavailable(e.to_string()))?;
    stream
        .play()
        .map_err(|e| RecorderError::Capture(e.to_string()))?;
    Ok(stream)
}

/// Stand-in device for sessions started without `--voice`.
pub struct DisabledDevice;

impl AudioDevice for DisabledDevice {
    fn acquire(&mut self, _chunks: ChunkSender) -> Result<u32, RecorderError> {
        Err(RecorderError::DeviceUnavailable(
            "voice input is off, restart with --voice or type your answer".to_string(),
        ))
    }

    fn release(&mut self) {}
}
