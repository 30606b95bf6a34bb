//! Waveform amplitude extraction for the visual overlay.

use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::{remove_quietly, unique_path};

/// Decode rate for amplitude analysis; plenty for bar-level peaks.
const ANALYSIS_SAMPLE_RATE: u32 = 8_000;

/// Decode `audio_path` to mono PCM and reduce it to `bars` peak values in `[0, 1]`.
///
/// The PCM intermediate lives in `work_dir` and is removed before returning.
pub async fn extract_waveform(
    audio_path: &Path,
    bars: usize,
    work_dir: &Path,
    timeout: Duration,
    cancel: &CancellationToken,
) -> MediaResult<Vec<f32>> {
    if bars == 0 {
        return Err(MediaError::invalid_input("waveform needs at least one bar"));
    }
    if !audio_path.exists() {
        return Err(MediaError::FileNotFound(audio_path.to_path_buf()));
    }

    let pcm_path = unique_path(work_dir, "waveform", "pcm");
    let cmd = FfmpegCommand::new(audio_path, &pcm_path).output_args([
        "-vn".to_string(),
        "-ac".to_string(),
        "1".to_string(),
        "-ar".to_string(),
        ANALYSIS_SAMPLE_RATE.to_string(),
        "-f".to_string(),
        "s16le".to_string(),
    ]);

    let run = FfmpegRunner::new()
        .with_timeout(timeout)
        .with_cancel(cancel.clone())
        .run(&cmd)
        .await;

    let result = match run {
        Ok(()) => tokio::fs::read(&pcm_path)
            .await
            .map_err(MediaError::from)
            .map(|bytes| bucket_peaks(&decode_s16le(&bytes), bars)),
        Err(e) => Err(e),
    };
    remove_quietly(&pcm_path).await;

    if let Ok(values) = &result {
        debug!(bars = values.len(), "Extracted waveform");
    }
    result
}

/// Little-endian signed 16-bit samples; a trailing odd byte is ignored.
pub fn decode_s16le(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Split `samples` into `bars` contiguous buckets and return each bucket's
/// peak, normalised so the loudest bucket is 1.0.
///
/// Silence (or no samples) yields all zeros. Buckets are as even as possible;
/// when there are fewer samples than bars the trailing bars are zero.
pub fn bucket_peaks(samples: &[i16], bars: usize) -> Vec<f32> {
    if bars == 0 {
        return Vec::new();
    }

    let mut peaks = vec![0u32; bars];
    if !samples.is_empty() {
        for (bar, peak) in peaks.iter_mut().enumerate() {
            let start = bar * samples.len() / bars;
            let end = ((bar + 1) * samples.len() / bars).max(start);
            *peak = samples[start..end]
                .iter()
                .map(|s| (*s as i32).unsigned_abs())
                .max()
                .unwrap_or(0);
        }
    }

    let loudest = peaks.iter().copied().max().unwrap_or(0);
    if loudest == 0 {
        return vec![0.0; bars];
    }
    peaks
        .into_iter()
        .map(|p| p as f32 / loudest as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode() {
        let bytes = [0x01, 0x00, 0xff, 0xff, 0x00, 0x80, 0x7f];
        assert_eq!(decode_s16le(&bytes), vec![1, -1, i16::MIN]);
    }

    #[test]
    fn test_bucket_peaks_normalised() {
        let samples = [0i16, 100, -200, 50, 400, -400, 10, 0];
        let bars = bucket_peaks(&samples, 4);
        assert_eq!(bars.len(), 4);
        assert!((bars[0] - 0.25).abs() < 1e-6);
        assert!((bars[1] - 0.5).abs() < 1e-6);
        assert!((bars[2] - 1.0).abs() < 1e-6);
        assert!((bars[3] - 0.025).abs() < 1e-6);
        assert!(bars.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_bucket_peaks_silence_and_edges() {
        assert_eq!(bucket_peaks(&[0, 0, 0], 3), vec![0.0; 3]);
        assert_eq!(bucket_peaks(&[], 2), vec![0.0; 2]);
        assert!(bucket_peaks(&[1, 2], 0).is_empty());

        // More bars than samples: every value still in range
        let bars = bucket_peaks(&[i16::MIN, 5], 5);
        assert_eq!(bars.len(), 5);
        assert!(bars.iter().all(|v| (0.0..=1.0).contains(v)));
        assert!(bars.iter().any(|v| (*v - 1.0).abs() < 1e-6));
    }
}
