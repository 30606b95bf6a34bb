//! End-to-end workflow tests.
//!
//! Network behaviour runs against a local mock server. Scenarios that
//! produce real media need ffmpeg and ffprobe on PATH and return early
//! without them.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio_test::assert_ok;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use beatreel_media::{check_ffmpeg, check_ffprobe};
use beatreel_models::{
    Artist, AudioSource, Classification, ErrorKind, MediaRequest, Placeholder, QualityTier, Urgency,
    Track, VideoArtifact, VisualStyle, WorkflowStep,
};
use beatreel_text::StaticCompletion;
use beatreel_worker::{StaticCatalog, WorkerConfig, WorkflowExecutor, WorkflowPlanner};

fn test_config(base: &Path) -> WorkerConfig {
    let mut config = WorkerConfig::default().with_base_dir(base);
    config.fallback_enabled = false;
    config.job_timeout = Duration::from_secs(60);
    config.waveform_bars = 16;
    config
}

fn executor(config: WorkerConfig) -> WorkflowExecutor {
    assert_ok!(WorkflowExecutor::new(
        config,
        Arc::new(StaticCatalog::builtin())
    ))
}

/// One artist without any source URL, one whose only track is served by
/// `server` at `/tone.wav`.
fn served_catalog(server: &MockServer) -> StaticCatalog {
    StaticCatalog::new(vec![
        Artist::new("Offline Duo", "ambient").with_track(Track::new("Local Only")),
        Artist::new("Mock Artist", "electronic").with_track(
            Track::new("Served").with_source_url(format!("{}/tone.wav", server.uri())),
        ),
    ])
}

fn random_remote_request(secs: f64) -> MediaRequest {
    MediaRequest::new("random", secs)
        .with_style(VisualStyle::Classic)
        .with_audio_source(AudioSource::remote())
        .with_urgency(Urgency::High)
        .with_quality(QualityTier::Low)
}

fn ffmpeg_available() -> bool {
    check_ffmpeg().is_ok() && check_ffprobe().is_ok()
}

/// Generate a sine tone to stand in for an uploaded track.
fn write_tone(dir: &Path, secs: u32) -> PathBuf {
    let out = dir.join(format!("tone-{secs}s.wav"));
    let status = std::process::Command::new("ffmpeg")
        .args(["-hide_banner", "-loglevel", "error", "-y", "-f", "lavfi", "-i"])
        .arg(format!("sine=frequency=440:duration={}", secs))
        .arg(&out)
        .status()
        .unwrap();
    assert!(status.success());
    out
}

fn remote_request(url: String) -> MediaRequest {
    MediaRequest::new("Nova Lights", 10.0)
        .with_audio_source(AudioSource::Remote { url: Some(url) })
        .with_urgency(Urgency::High)
}

#[test]
fn test_random_classic_remote_high_urgency_plan() {
    let request = MediaRequest::new("random", 30.0)
        .with_style(VisualStyle::Classic)
        .with_audio_source(AudioSource::remote())
        .with_urgency(Urgency::High);
    let plan = WorkflowPlanner::new().plan(&request);

    assert_eq!(
        plan.steps,
        vec![
            WorkflowStep::LoadMetadata,
            WorkflowStep::AcquireRemoteAudio,
            WorkflowStep::GenerateVisuals,
            WorkflowStep::BuildLayout,
            WorkflowStep::Compose,
        ]
    );
    assert_eq!(plan.classification, Classification::Moderate);
}

/// A stalled download fails the audio step as a network error before any
/// rendering starts.
#[tokio::test]
async fn test_download_timeout_halts_after_metadata() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/track.mp3"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(vec![0u8; 1024])
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.download_timeout = Duration::from_millis(300);
    let exec = executor(config);

    let report = exec
        .run(
            remote_request(format!("{}/track.mp3", server.uri())),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.steps.len(), 2);
    assert_eq!(report.last_successful_step(), Some(WorkflowStep::LoadMetadata));
    let failure = report.failure.as_ref().unwrap();
    assert_eq!(failure.step, WorkflowStep::AcquireRemoteAudio);
    assert_eq!(failure.kind, ErrorKind::Network);
    assert!(report.artifact.is_none());
    assert!(!report.steps[1].success);
    assert!(report.steps[1].error.is_some());
}

/// Server errors are retried up to the configured count.
#[tokio::test]
async fn test_server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky.mp3"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.download_retries = 2;
    let exec = executor(config);

    let report = exec
        .run(
            remote_request(format!("{}/flaky.mp3", server.uri())),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.failed_step(), Some(WorkflowStep::AcquireRemoteAudio));
    assert_eq!(report.failure.as_ref().unwrap().kind, ErrorKind::Network);
    server.verify().await;
}

/// Client errors are permanent and fetched once.
#[tokio::test]
async fn test_not_found_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone.mp3"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.download_retries = 3;
    let exec = executor(config);

    let report = exec
        .run(
            remote_request(format!("{}/gone.mp3", server.uri())),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.failed_step(), Some(WorkflowStep::AcquireRemoteAudio));
    server.verify().await;
}

/// The whole-job deadline interrupts the running step.
#[tokio::test]
async fn test_job_timeout_fails_running_step_as_cancelled() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.job_timeout = Duration::from_millis(300);
    config.download_timeout = Duration::from_secs(30);
    let exec = executor(config);

    let report = exec
        .run(
            remote_request(format!("{}/slow.mp3", server.uri())),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let failure = report.failure.as_ref().unwrap();
    assert_eq!(failure.step, WorkflowStep::AcquireRemoteAudio);
    assert_eq!(failure.kind, ErrorKind::Cancelled);
}

/// Cancelling mid-download stops the job and removes its scratch space.
#[tokio::test]
async fn test_cancel_during_download() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let exec = executor(test_config(dir.path()));
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let report = exec
        .run(remote_request(format!("{}/track.mp3", server.uri())), &cancel)
        .await
        .unwrap();

    assert_eq!(report.failure.as_ref().unwrap().kind, ErrorKind::Cancelled);
    let leftovers = std::fs::read_dir(&exec.config().scratch_dir)
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(leftovers, 0);
}

/// Random remote picks only land on artists with a fetchable track, so
/// every run reaches the download instead of failing at metadata.
#[tokio::test]
async fn test_random_remote_runs_reach_the_download() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tone.wav"))
        .respond_with(ResponseTemplate::new(404))
        .expect(20)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let exec = assert_ok!(WorkflowExecutor::new(
        test_config(dir.path()),
        Arc::new(served_catalog(&server))
    ));

    for _ in 0..20 {
        let report = exec
            .run(random_remote_request(10.0), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.last_successful_step(), Some(WorkflowStep::LoadMetadata));
        assert_eq!(report.failed_step(), Some(WorkflowStep::AcquireRemoteAudio));
    }
    server.verify().await;
}

/// With fallback on, a network failure still yields a tagged artifact.
#[tokio::test]
async fn test_fallback_after_network_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.fallback_enabled = true;
    let exec = executor(config);

    let report = exec
        .run(
            remote_request(format!("{}/track.mp3", server.uri())),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(report.is_degraded());
    let synthetic = report.artifact.as_ref().unwrap().as_synthetic().unwrap();
    assert_eq!(synthetic.failed_step, Some(WorkflowStep::AcquireRemoteAudio));
    assert!(!synthetic.reason.is_empty());
    if let Placeholder::StaticColorVideo { path, .. } = &synthetic.placeholder {
        assert!(path.exists());
    }
}

/// Uploaded audio, minimal style: one still looped under the clip.
#[tokio::test]
async fn test_minimal_upload_produces_video() {
    if !ffmpeg_available() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let upload = write_tone(dir.path(), 5);
    let exec = executor(test_config(dir.path()));

    let request = MediaRequest::new("Nova Lights", 2.0)
        .with_style(VisualStyle::Minimal)
        .with_audio_source(AudioSource::uploaded(upload))
        .with_fades(0.5, 0.5)
        .with_start_time(1.0)
        .with_quality(QualityTier::Low)
        .with_urgency(Urgency::High);
    let report = exec.run(request, &CancellationToken::new()).await.unwrap();

    assert!(report.succeeded(), "failure: {:?}", report.failure);
    let video = report.artifact.as_ref().unwrap().as_real().unwrap();
    assert!(video.path.exists());
    assert!(video.path.starts_with(&exec.config().output_dir));
    assert!((video.duration_secs - 2.0).abs() < 0.5);
    assert_eq!((video.width, video.height), (640, 360));
    assert_eq!(video.metadata.artist.as_deref(), Some("Nova Lights"));
}

/// Cinematic without a text service: the enrichment step fails and halts
/// the run before anything is composed.
#[tokio::test]
async fn test_cinematic_halts_on_failed_enrichment() {
    if !ffmpeg_available() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let upload = write_tone(dir.path(), 3);
    let exec = executor(test_config(dir.path()));

    let request = MediaRequest::new("Nova Lights", 1.0)
        .with_style(VisualStyle::Cinematic)
        .with_audio_source(AudioSource::uploaded(upload))
        .with_fades(0.2, 0.2)
        .with_quality(QualityTier::Low)
        .with_urgency(Urgency::High);
    let report = exec.run(request, &CancellationToken::new()).await.unwrap();

    let failure = report.failure.as_ref().unwrap();
    assert_eq!(failure.step, WorkflowStep::AiBackgroundEnrichment);
    assert_eq!(failure.kind, ErrorKind::Validation);
    assert_eq!(report.last_successful_step(), Some(WorkflowStep::BuildLayout));
    assert!(report.steps.iter().all(|s| s.step != WorkflowStep::Compose));
    assert!(report.artifact.is_none());
}

/// A configured text service re-tints the background and tags the output.
#[tokio::test]
async fn test_cinematic_with_enrichment() {
    if !ffmpeg_available() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let upload = write_tone(dir.path(), 3);
    let reply = r##"```json
{"colors": ["#101020", "#c04080"], "description": "Neon dusk over a quiet city"}
```"##;
    let exec = executor(test_config(dir.path()))
        .with_text_client(Arc::new(StaticCompletion::new(reply)));

    let request = MediaRequest::new("Nova Lights", 1.0)
        .with_style(VisualStyle::Cinematic)
        .with_audio_source(AudioSource::uploaded(upload))
        .with_quality(QualityTier::Low)
        .with_urgency(Urgency::High);
    let report = exec.run(request, &CancellationToken::new()).await.unwrap();

    assert!(report.succeeded(), "failure: {:?}", report.failure);
    let video = report.artifact.as_ref().unwrap().as_real().unwrap();
    assert_eq!(
        video.metadata.description.as_deref(),
        Some("Neon dusk over a quiet city")
    );
}

async fn minimal_upload_video(
    exec: &WorkflowExecutor,
    upload: &Path,
    quality: QualityTier,
) -> VideoArtifact {
    let request = MediaRequest::new("Nova Lights", 2.0)
        .with_style(VisualStyle::Minimal)
        .with_audio_source(AudioSource::uploaded(upload.to_path_buf()))
        .with_quality(quality)
        .with_urgency(Urgency::High);
    let report = exec.run(request, &CancellationToken::new()).await.unwrap();
    assert!(report.succeeded(), "failure: {:?}", report.failure);
    report.artifact.unwrap().as_real().unwrap().clone()
}

/// The same request composed twice gives the same kind of file.
#[tokio::test]
async fn test_compose_is_repeatable() {
    if !ffmpeg_available() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let upload = write_tone(dir.path(), 5);
    let exec = executor(test_config(dir.path()));

    let first = minimal_upload_video(&exec, &upload, QualityTier::Low).await;
    let second = minimal_upload_video(&exec, &upload, QualityTier::Low).await;

    assert_ne!(first.path, second.path);
    assert!(
        (first.duration_secs - second.duration_secs).abs() <= 1.0 / first.fps,
        "{} vs {}",
        first.duration_secs,
        second.duration_secs
    );
    assert_eq!(first.video_codec, second.video_codec);
    assert_eq!(first.audio_codec, second.audio_codec);
    assert_eq!(first.video_bitrate_kbps, second.video_bitrate_kbps);
    let ratio = second.file_size_bytes as f64 / first.file_size_bytes as f64;
    assert!((0.9..=1.1).contains(&ratio), "size ratio {ratio}");
}

/// Higher tiers never produce a smaller file for the same content.
#[tokio::test]
async fn test_ultra_file_not_smaller_than_low() {
    if !ffmpeg_available() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let upload = write_tone(dir.path(), 5);
    let exec = executor(test_config(dir.path()));

    let low = minimal_upload_video(&exec, &upload, QualityTier::Low).await;
    let ultra = minimal_upload_video(&exec, &upload, QualityTier::Ultra).await;

    assert!(ultra.width > low.width);
    assert!(ultra.video_bitrate_kbps > low.video_bitrate_kbps);
    assert!(
        ultra.file_size_bytes >= low.file_size_bytes,
        "ultra {} < low {}",
        ultra.file_size_bytes,
        low.file_size_bytes
    );
}

/// A random artist, classic style, audio streamed from the catalog URL.
#[tokio::test]
async fn test_random_classic_remote_produces_video() {
    if !ffmpeg_available() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let tone = write_tone(dir.path(), 40);

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tone.wav"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(std::fs::read(&tone).unwrap()))
        .mount(&server)
        .await;

    let mut config = test_config(dir.path());
    config.job_timeout = Duration::from_secs(600);
    let exec = assert_ok!(WorkflowExecutor::new(config, Arc::new(served_catalog(&server))));
    let report = exec
        .run(random_remote_request(30.0), &CancellationToken::new())
        .await
        .unwrap();

    assert!(report.succeeded(), "failure: {:?}", report.failure);
    let video = report.artifact.as_ref().unwrap().as_real().unwrap();
    assert!((video.duration_secs - 30.0).abs() <= 0.5, "{}", video.duration_secs);
    assert_eq!((video.width, video.height), (640, 360));
    assert_eq!(video.metadata.artist.as_deref(), Some("Mock Artist"));
}
