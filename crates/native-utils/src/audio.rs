use rubato::{FastFixedIn, PolynomialDegree, Resampler};

/// Sample rate of the audio uploaded for transcription.
pub const TRANSCRIPTION_SAMPLE_RATE: f64 = 16000.0;

/// Creates a resampler to convert between audio sample rates.
pub fn create_resampler(
    in_sampling_rate: f64,
    out_sampling_rate: f64,
    chunk_size: usize,
) -> anyhow::Result<FastFixedIn<f32>> {
    let resampler = FastFixedIn::<f32>::new(
        out_sampling_rate / in_sampling_rate,
        1.0,
        PolynomialDegree::Cubic,
        chunk_size,
        1,
    )?;
    Ok(resampler)
}

/// Averages interleaved frames of `channels` samples into one mono sample each.
pub fn downmix_to_mono(data: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return data.to_vec();
    }
    data.chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Splits a slice of audio samples into a vector of vectors, where each inner vector has a fixed chunk size.
/// If a chunk is smaller than the `chunk_size`, it is padded with zeros.
pub fn split_for_chunks(samples: &[f32], chunk_size: usize) -> Vec<Vec<f32>> {
    samples
        .chunks(chunk_size)
        .map(|chunk| {
            let mut chunk = chunk.to_vec();
            chunk.resize(chunk_size, 0.0);
            chunk
        })
        .collect()
}

/// Feeds mono samples through `resampler` in its fixed chunk size.
///
/// Any incomplete trailing chunk is zero padded, so the output may carry up to one
/// chunk of trailing silence.
pub fn resample(resampler: &mut FastFixedIn<f32>, samples: &[f32]) -> anyhow::Result<Vec<f32>> {
    let chunk_size = resampler.input_frames_next();
    let mut out = Vec::with_capacity(samples.len());
    for chunk in split_for_chunks(samples, chunk_size) {
        let frames = resampler.process(&[chunk.as_slice()], None)?;
        if let Some(channel) = frames.first() {
            out.extend_from_slice(channel);
        }
    }
    Ok(out)
}
