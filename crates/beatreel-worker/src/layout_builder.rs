//! Style-specific page layouts and their animation directives.

use std::path::{Path, PathBuf};

use tracing::debug;

use beatreel_models::{AnimationDirective, SlideFrom, VisualStyle};
use beatreel_render::{Background, Color, LayoutDocument, LayoutElement};

use crate::error::WorkerResult;
use crate::visuals::Palette;

/// File name of the exported HTML inside the job's scratch directory.
pub const LAYOUT_FILE_NAME: &str = "layout.html";

/// Text shown on the title card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardText {
    pub artist: String,
    pub title: Option<String>,
}

/// A layout with the directives that animate it.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltLayout {
    pub document: LayoutDocument,
    pub directives: Vec<AnimationDirective>,
}

/// Build the page for `style` at `width`x`height` over `background`.
pub fn build_layout(
    style: VisualStyle,
    palette: &Palette,
    background: &Path,
    text: &CardText,
    width: u32,
    height: u32,
) -> BuiltLayout {
    let (w, h) = (f64::from(width), f64::from(height));
    let heading = text.title.clone().unwrap_or_else(|| text.artist.clone());
    let mut document = LayoutDocument::new(
        width,
        height,
        Background::Image {
            path: background.to_path_buf(),
        },
    )
    .with_title(format!("{} - {}", text.artist, heading));

    let mut directives = Vec::new();

    match style {
        VisualStyle::Classic | VisualStyle::Cinematic => {
            document.push(
                LayoutElement::label(w * 0.06, h * 0.10, w * 0.58, h * 0.14, heading, palette.plate)
                    .with_id("title")
                    .with_class("card"),
            );
            document.push(
                LayoutElement::label(w * 0.06, h * 0.26, w * 0.40, h * 0.08, &text.artist, palette.plate)
                    .with_id("artist")
                    .with_class("card"),
            );
            document.push(
                LayoutElement::rect(w * 0.06, h * 0.36, w * 0.12, h * 0.012, palette.accent)
                    .with_id("rule")
                    .with_class("accent"),
            );
            directives.push(AnimationDirective::slide_in("#title", 0.8, SlideFrom::Left, w * 0.3));
            directives.push(
                AnimationDirective::slide_in("#artist", 0.8, SlideFrom::Left, w * 0.3).with_delay(0.2),
            );
            directives.push(AnimationDirective::fade_in(".card", 0.6));
            directives.push(AnimationDirective::fade_in("#rule", 0.4).with_delay(0.6));
            if style == VisualStyle::Cinematic {
                directives.push(AnimationDirective::fade_in("#waveform", 1.5).with_delay(0.5));
            }
        }
        VisualStyle::Minimal => {
            document.push(
                LayoutElement::label(w * 0.2, h * 0.38, w * 0.6, h * 0.16, heading, palette.plate)
                    .with_id("title")
                    .with_class("card"),
            );
            document.push(
                LayoutElement::label(w * 0.3, h * 0.56, w * 0.4, h * 0.07, &text.artist, palette.plate)
                    .with_id("artist")
                    .with_class("card")
                    .with_opacity(0.85),
            );
        }
        VisualStyle::Neon => {
            let side = h * 0.16;
            document.push(
                LayoutElement::rect(w * 0.80, h * 0.08, side, side, palette.accent)
                    .with_id("spinner")
                    .with_class("accent"),
            );
            document.push(
                LayoutElement::rect(w * 0.06, h * 0.60, side * 0.5, side * 0.5, palette.text)
                    .with_id("spark")
                    .with_class("accent")
                    .with_opacity(0.8),
            );
            document.push(
                LayoutElement::label(w * 0.06, h * 0.12, w * 0.62, h * 0.15, heading, palette.plate)
                    .with_id("title")
                    .with_class("card"),
            );
            document.push(
                LayoutElement::label(w * 0.06, h * 0.30, w * 0.40, h * 0.08, &text.artist, palette.plate)
                    .with_id("artist")
                    .with_class("card"),
            );
            directives.push(AnimationDirective::fade_in(".card", 0.5));
            directives.push(AnimationDirective::rotate("#spinner", 45.0));
            directives.push(AnimationDirective::rotate("#spark", -90.0));
            directives.push(AnimationDirective::pulse(".accent", 4.0, 0.08));
        }
    }

    document.push(
        LayoutElement::rect(w * 0.05, h * 0.78, w * 0.9, h * 0.14, Color::rgba(0, 0, 0, 48))
            .with_id("waveform"),
    );
    if style != VisualStyle::Minimal {
        directives.push(AnimationDirective::pulse("#waveform", 2.0, 0.02));
    }

    BuiltLayout {
        document,
        directives,
    }
}

/// Write the HTML export of `document` to `dir/layout.html`.
pub async fn write_layout_html(document: &LayoutDocument, dir: &Path) -> WorkerResult<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(LAYOUT_FILE_NAME);
    tokio::fs::write(&path, document.to_html()).await?;
    debug!(path = %path.display(), elements = document.elements.len(), "Wrote layout");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use beatreel_render::Timeline;

    fn text() -> CardText {
        CardText {
            artist: "Nova Lights".to_string(),
            title: Some("Night Drive".to_string()),
        }
    }

    fn build(style: VisualStyle) -> BuiltLayout {
        build_layout(
            style,
            &Palette::for_style(style),
            Path::new("/scratch/background.png"),
            &text(),
            1280,
            720,
        )
    }

    #[test]
    fn test_every_style_binds() {
        for style in VisualStyle::ALL {
            let built = build(*style);
            assert!(built.document.element_by_id("title").is_some());
            assert!(built.document.element_by_id("waveform").is_some());
            assert_eq!((built.document.width, built.document.height), (1280, 720));
            Timeline::bind(&built.document, &built.directives).unwrap();
        }
    }

    #[test]
    fn test_minimal_is_static() {
        assert!(build(VisualStyle::Minimal).directives.is_empty());
        assert!(!build(VisualStyle::Classic).directives.is_empty());
    }

    #[test]
    fn test_neon_rotates() {
        let built = build(VisualStyle::Neon);
        assert!(built
            .directives
            .iter()
            .any(|d| d.target == "#spinner" && d.kind.name() == "rotate"));
    }

    #[test]
    fn test_title_falls_back_to_artist() {
        let built = build_layout(
            VisualStyle::Classic,
            &Palette::for_style(VisualStyle::Classic),
            Path::new("bg.png"),
            &CardText {
                artist: "Solo".to_string(),
                title: None,
            },
            640,
            360,
        );
        assert_eq!(built.document.title, "Solo - Solo");
    }

    #[tokio::test]
    async fn test_html_written() {
        let dir = tempfile::tempdir().unwrap();
        let built = build(VisualStyle::Classic);
        let path = write_layout_html(&built.document, dir.path()).await.unwrap();
        let html = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(html.contains("Night Drive"));
    }
}
