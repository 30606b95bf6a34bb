//! Poster thumbnail generation.

use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use beatreel_models::quality::THUMBNAIL_TIMESTAMP_SECS;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filters::thumbnail_filter;

/// `<video stem>.jpg` next to the video.
pub fn thumbnail_path_for(video_path: &Path) -> PathBuf {
    video_path.with_extension("jpg")
}

/// Timestamp to grab: one second in, or the middle of very short videos.
pub fn thumbnail_timestamp(duration_secs: f64) -> f64 {
    if duration_secs > THUMBNAIL_TIMESTAMP_SECS * 2.0 {
        THUMBNAIL_TIMESTAMP_SECS
    } else {
        (duration_secs / 2.0).max(0.0)
    }
}

/// Write a poster JPEG for `video_path` and return its path.
pub async fn generate_thumbnail(
    video_path: &Path,
    duration_secs: f64,
    timeout: Duration,
    cancel: &CancellationToken,
) -> MediaResult<PathBuf> {
    if !video_path.exists() {
        return Err(MediaError::FileNotFound(video_path.to_path_buf()));
    }

    let output_path = thumbnail_path_for(video_path);
    let cmd = FfmpegCommand::new(video_path, &output_path)
        .seek(thumbnail_timestamp(duration_secs))
        .single_frame()
        .video_filter(thumbnail_filter())
        .output_args(["-q:v", "3"]);

    FfmpegRunner::new()
        .with_timeout(timeout)
        .with_cancel(cancel.clone())
        .run(&cmd)
        .await?;

    Ok(output_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thumbnail_path() {
        assert_eq!(
            thumbnail_path_for(Path::new("/out/abc.mp4")),
            PathBuf::from("/out/abc.jpg")
        );
    }

    #[test]
    fn test_thumbnail_timestamp() {
        assert_eq!(thumbnail_timestamp(30.0), 1.0);
        assert_eq!(thumbnail_timestamp(1.0), 0.5);
        assert_eq!(thumbnail_timestamp(0.0), 0.0);
    }

    #[test]
    fn test_filter_width() {
        assert!(thumbnail_filter().contains("480"));
    }
}
