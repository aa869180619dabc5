use crate::error::RecorderError;
use std::io::Cursor;
use std::time::Duration;
use tokio::sync::mpsc;

/// Wall-clock ceiling after which an active recording stops on its own.
pub const RECORDING_CEILING: Duration = Duration::from_secs(45);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordingId(u64);

/// A finished mono recording.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioClip {
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }

    /// Encodes the clip as a 16-bit PCM mono WAV file.
    pub fn to_wav(&self) -> Result<Vec<u8>, hound::Error> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut buf = Vec::with_capacity(44 + self.samples.len() * 2);
        {
            let mut writer = hound::WavWriter::new(Cursor::new(&mut buf), spec)?;
            for sample in &self.samples {
                let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
                writer.write_sample(value)?;
            }
            writer.finalize()?;
        }
        Ok(buf)
    }
}

pub type ChunkSender = mpsc::UnboundedSender<Vec<f32>>;

/// A microphone (or anything that behaves like one).
pub trait AudioDevice: Send {
    /// Acquires the device and starts delivering mono chunks on `chunks`.
    /// Returns the sample rate of the delivered audio.
    fn acquire(&mut self, chunks: ChunkSender) -> Result<u32, RecorderError>;

    /// Stops every track and releases the device. Called on every stop path.
    fn release(&mut self);
}

struct ActiveRecording {
    id: RecordingId,
    sample_rate: u32,
    chunks: mpsc::UnboundedReceiver<Vec<f32>>,
}

/// Owns the single capture device of a session and the recording in progress.
pub struct Recorder {
    device: Box<dyn AudioDevice>,
    active: Option<ActiveRecording>,
    next_id: u64,
    ceiling: Duration,
}

impl Recorder {
    pub fn new(device: Box<dyn AudioDevice>) -> Self {
        Self {
            device,
            active: None,
            next_id: 0,
            ceiling: RECORDING_CEILING,
        }
    }

    pub fn with_ceiling(mut self, ceiling: Duration) -> Self {
        self.ceiling = ceiling;
        self
    }

    pub fn ceiling(&self) -> Duration {
        self.ceiling
    }

    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_id(&self) -> Option<RecordingId> {
        self.active.as_ref().map(|a| a.id)
    }

    /// Starts a recording. Returns `Ok(None)` when one is already running.
    pub fn start(&mut self) -> Result<Option<RecordingId>, RecorderError> {
        if self.active.is_some() {
            tracing::debug!("Recording already active, ignoring start");
            return Ok(None);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let sample_rate = self.device.acquire(tx)?;
        self.next_id += 1;
        let id = RecordingId(self.next_id);
        self.active = Some(ActiveRecording {
            id,
            sample_rate,
            chunks: rx,
        });
        tracing::info!("Recording {:?} started at {} Hz", id, sample_rate);
        Ok(Some(id))
    }

    /// Stops the active recording, releasing the device, and returns the captured clip.
    pub fn stop(&mut self) -> Option<AudioClip> {
        let mut active = self.active.take()?;
        self.device.release();

        let mut samples = Vec::new();
        while let Ok(chunk) = active.chunks.try_recv() {
            samples.extend(chunk);
        }
        let clip = AudioClip {
            samples,
            sample_rate: active.sample_rate,
        };
        tracing::info!(
            "Recording {:?} stopped after {:.1}s of audio",
            active.id,
            clip.duration().as_secs_f32()
        );
        Some(clip)
    }

    /// Stops the recording only if `id` is still the active one. A timer armed for
    /// an earlier recording is a no-op.
    pub fn stop_expired(&mut self, id: RecordingId) -> Option<AudioClip> {
        if self.active_id() != Some(id) {
            tracing::debug!("Ignoring ceiling for inactive recording {:?}", id);
            return None;
        }
        tracing::info!("Recording {:?} hit the {:?} ceiling", id, self.ceiling);
        self.stop()
    }

    /// Releases the device and drops whatever was captured.
    pub fn discard(&mut self) {
        if let Some(active) = self.active.take() {
            self.device.release();
            tracing::info!("Recording {:?} discarded", active.id);
        }
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        self.discard();
    }
}
