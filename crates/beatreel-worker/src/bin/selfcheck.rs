use std::path::Path;

use anyhow::Context as _;

use beatreel_media::{check_ffmpeg, check_ffprobe};
use beatreel_render::LabelFont;
use beatreel_worker::{ArtistCatalog, JsonCatalog, StaticCatalog, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = WorkerConfig::from_env();

    println!(
        "beatreel-selfcheck: output_dir={} scratch_dir={}",
        config.output_dir.display(),
        config.scratch_dir.display()
    );

    let ffmpeg = check_ffmpeg().context("ffmpeg not available")?;
    let ffprobe = check_ffprobe().context("ffprobe not available")?;
    println!("beatreel-selfcheck: ffmpeg={} ffprobe={}", ffmpeg.display(), ffprobe.display());

    ensure_writable(&config.output_dir).await?;
    ensure_writable(&config.scratch_dir).await?;

    let artists = match &config.catalog_path {
        Some(path) => JsonCatalog::load(path).await?.len(),
        None => StaticCatalog::builtin().len(),
    };
    if artists == 0 {
        anyhow::bail!("artist catalog is empty");
    }
    println!("beatreel-selfcheck: catalog has {} artists", artists);

    let font = match &config.label_font {
        Some(path) => Some(LabelFont::open(path).context("label font unusable")?),
        None => LabelFont::discover(),
    };
    match font {
        Some(font) => println!(
            "beatreel-selfcheck: label font {} ({})",
            font.family(),
            font.origin().display()
        ),
        None => println!("beatreel-selfcheck: warning: no label font, labels render without text"),
    }

    println!("beatreel-selfcheck: ok");
    Ok(())
}

async fn ensure_writable(dir: &Path) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("cannot create {}", dir.display()))?;
    let probe = dir.join(".beatreel-selfcheck");
    tokio::fs::write(&probe, b"ok")
        .await
        .with_context(|| format!("{} is not writable", dir.display()))?;
    tokio::fs::remove_file(&probe).await.ok();
    Ok(())
}
