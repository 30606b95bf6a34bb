//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Runtime settings for the pipeline executor and its binaries.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Durable directory for finished videos
    pub output_dir: PathBuf,
    /// Parent of the per-job scratch directories
    pub scratch_dir: PathBuf,
    /// JSON artist catalog; the built-in catalog is used when unset
    pub catalog_path: Option<PathBuf>,
    /// Font file for label text; common system fonts are tried when unset
    pub label_font: Option<PathBuf>,
    /// Maximum jobs running at once in `run_many`
    pub max_concurrent_jobs: usize,
    /// Rendering surfaces checked out at once
    pub max_render_surfaces: usize,
    /// Whole-job deadline; the running step fails as cancelled
    pub job_timeout: Duration,
    pub download_timeout: Duration,
    pub probe_timeout: Duration,
    pub encode_timeout: Duration,
    /// Upper bound on each per-frame settle wait
    pub settle_timeout: Duration,
    /// Retries for remote audio acquisition on network errors
    pub download_retries: u32,
    /// Substitute a synthetic artifact when the pipeline fails
    pub fallback_enabled: bool,
    /// Leave `scratch/<job_id>/` in place after the job
    pub keep_scratch: bool,
    /// Write a poster JPEG next to every output
    pub thumbnails: bool,
    /// Bars in the waveform overlay
    pub waveform_bars: usize,
    /// Files older than this are removed by the sweeper
    pub retention: Duration,
    pub sweep_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("/tmp/beatreel/output"),
            scratch_dir: PathBuf::from("/tmp/beatreel/scratch"),
            catalog_path: None,
            label_font: None,
            max_concurrent_jobs: 2,
            max_render_surfaces: 2,
            job_timeout: Duration::from_secs(1800), // 30 minutes
            download_timeout: Duration::from_secs(120),
            probe_timeout: Duration::from_secs(30),
            encode_timeout: Duration::from_secs(600),
            settle_timeout: Duration::from_secs(5),
            download_retries: 0,
            fallback_enabled: true,
            keep_scratch: false,
            thumbnails: false,
            waveform_bars: 48,
            retention: Duration::from_secs(24 * 3600),
            sweep_interval: Duration::from_secs(3600),
        }
    }
}

fn parsed<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|s| s.trim().parse().ok())
}

fn flag(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<bool> {
    lookup(key).map(|s| matches!(s.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

impl WorkerConfig {
    /// Create config from `BEATREEL_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let d = Self::default();
        let secs = |key: &str, default: Duration| {
            parsed::<u64>(&lookup, key)
                .map(Duration::from_secs)
                .unwrap_or(default)
        };
        Self {
            output_dir: lookup("BEATREEL_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(d.output_dir),
            scratch_dir: lookup("BEATREEL_SCRATCH_DIR")
                .map(PathBuf::from)
                .unwrap_or(d.scratch_dir),
            catalog_path: lookup("BEATREEL_CATALOG")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            label_font: lookup("BEATREEL_FONT")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            max_concurrent_jobs: parsed(&lookup, "BEATREEL_MAX_JOBS")
                .filter(|n| *n > 0)
                .unwrap_or(d.max_concurrent_jobs),
            max_render_surfaces: parsed(&lookup, "BEATREEL_MAX_SURFACES")
                .filter(|n| *n > 0)
                .unwrap_or(d.max_render_surfaces),
            job_timeout: secs("BEATREEL_JOB_TIMEOUT_SECS", d.job_timeout),
            download_timeout: secs("BEATREEL_DOWNLOAD_TIMEOUT_SECS", d.download_timeout),
            probe_timeout: secs("BEATREEL_PROBE_TIMEOUT_SECS", d.probe_timeout),
            encode_timeout: secs("BEATREEL_ENCODE_TIMEOUT_SECS", d.encode_timeout),
            settle_timeout: parsed::<u64>(&lookup, "BEATREEL_SETTLE_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(d.settle_timeout),
            download_retries: parsed(&lookup, "BEATREEL_DOWNLOAD_RETRIES")
                .unwrap_or(d.download_retries),
            fallback_enabled: flag(&lookup, "BEATREEL_FALLBACK").unwrap_or(d.fallback_enabled),
            keep_scratch: flag(&lookup, "BEATREEL_KEEP_SCRATCH").unwrap_or(d.keep_scratch),
            thumbnails: flag(&lookup, "BEATREEL_THUMBNAILS").unwrap_or(d.thumbnails),
            waveform_bars: parsed(&lookup, "BEATREEL_WAVEFORM_BARS")
                .filter(|n| *n > 0)
                .unwrap_or(d.waveform_bars),
            retention: parsed::<u64>(&lookup, "BEATREEL_RETENTION_HOURS")
                .map(|h| Duration::from_secs(h * 3600))
                .unwrap_or(d.retention),
            sweep_interval: secs("BEATREEL_SWEEP_INTERVAL_SECS", d.sweep_interval),
        }
    }

    /// Root all directories under `base`; handy for tests and local runs.
    pub fn with_base_dir(mut self, base: impl Into<PathBuf>) -> Self {
        let base = base.into();
        self.output_dir = base.join("output");
        self.scratch_dir = base.join("scratch");
        self
    }

    /// Create the output and scratch directories if missing.
    pub async fn ensure_dirs(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.output_dir).await?;
        tokio::fs::create_dir_all(&self.scratch_dir).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> WorkerConfig {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        WorkerConfig::from_lookup(|key: &str| map.get(key).cloned())
    }

    #[test]
    fn test_defaults_without_env() {
        let c = config(&[]);
        assert_eq!(c.max_concurrent_jobs, 2);
        assert_eq!(c.download_retries, 0);
        assert!(c.fallback_enabled);
        assert!(!c.keep_scratch);
        assert!(c.catalog_path.is_none());
        assert!(c.label_font.is_none());
    }

    #[test]
    fn test_overrides() {
        let c = config(&[
            ("BEATREEL_OUTPUT_DIR", "/data/out"),
            ("BEATREEL_MAX_JOBS", "4"),
            ("BEATREEL_DOWNLOAD_TIMEOUT_SECS", "5"),
            ("BEATREEL_DOWNLOAD_RETRIES", "2"),
            ("BEATREEL_FALLBACK", "false"),
            ("BEATREEL_KEEP_SCRATCH", "YES"),
            ("BEATREEL_SETTLE_TIMEOUT_MS", "250"),
            ("BEATREEL_RETENTION_HOURS", "2"),
            ("BEATREEL_FONT", "/opt/fonts/Inter.ttf"),
        ]);
        assert_eq!(c.output_dir, PathBuf::from("/data/out"));
        assert_eq!(c.max_concurrent_jobs, 4);
        assert_eq!(c.download_timeout, Duration::from_secs(5));
        assert_eq!(c.download_retries, 2);
        assert!(!c.fallback_enabled);
        assert!(c.keep_scratch);
        assert_eq!(c.settle_timeout, Duration::from_millis(250));
        assert_eq!(c.retention, Duration::from_secs(7200));
        assert_eq!(c.label_font, Some(PathBuf::from("/opt/fonts/Inter.ttf")));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let c = config(&[("BEATREEL_MAX_JOBS", "0"), ("BEATREEL_JOB_TIMEOUT_SECS", "soon")]);
        assert_eq!(c.max_concurrent_jobs, 2);
        assert_eq!(c.job_timeout, Duration::from_secs(1800));
    }

    #[tokio::test]
    async fn test_ensure_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let c = WorkerConfig::default().with_base_dir(dir.path());
        c.ensure_dirs().await.unwrap();
        c.ensure_dirs().await.unwrap();
        assert!(c.output_dir.is_dir());
        assert!(c.scratch_dir.is_dir());
    }
}
