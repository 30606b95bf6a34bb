//! FFmpeg filter strings.

use beatreel_models::quality::THUMBNAIL_SCALE_WIDTH;

/// Effective fade envelope for a clip, after clamping to the clip length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeEnvelope {
    pub fade_in_secs: f64,
    pub fade_out_secs: f64,
    /// Offset of the fade-out within the clip
    pub fade_out_start_secs: f64,
}

impl FadeEnvelope {
    /// Clamp requested fades to a clip of `clip_duration_secs`.
    ///
    /// A fade longer than the clip spans the whole clip: the fade-out then
    /// starts at 0 and lasts `clip_duration_secs`.
    pub fn clamped(clip_duration_secs: f64, fade_in_secs: f64, fade_out_secs: f64) -> Self {
        let clip = clip_duration_secs.max(0.0);
        let fade_in = fade_in_secs.max(0.0).min(clip);
        let fade_out = fade_out_secs.max(0.0).min(clip);
        Self {
            fade_in_secs: fade_in,
            fade_out_secs: fade_out,
            fade_out_start_secs: (clip - fade_out).max(0.0),
        }
    }
}

/// Audio filter chain: optional gain, then the fade envelope.
///
/// Zero-length fades are omitted. Returns `None` when nothing would apply.
pub fn audio_filter(envelope: &FadeEnvelope, volume_gain: Option<f64>) -> Option<String> {
    let mut chain = Vec::new();

    if let Some(gain) = volume_gain {
        if (gain - 1.0).abs() > f64::EPSILON {
            chain.push(format!("volume={:.3}", gain));
        }
    }
    if envelope.fade_in_secs > 0.0 {
        chain.push(format!("afade=t=in:st=0:d={:.3}", envelope.fade_in_secs));
    }
    if envelope.fade_out_secs > 0.0 {
        chain.push(format!(
            "afade=t=out:st={:.3}:d={:.3}",
            envelope.fade_out_start_secs, envelope.fade_out_secs
        ));
    }

    (!chain.is_empty()).then(|| chain.join(","))
}

fn backslash_escape(value: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(value.len() + 8);
    for c in value.chars() {
        if c == '\\' || special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Escape a filter option value for a `-vf` argument.
///
/// FFmpeg unescapes twice: once when splitting the filtergraph, once when
/// splitting the filter's `key=value` options. The value is emitted unquoted
/// with both levels applied.
pub fn escape_filter_value(value: &str) -> String {
    let option_level = backslash_escape(value, &['\'', ':']);
    backslash_escape(&option_level, &['\'', '[', ']', ',', ';'])
}

/// Vertical placement of overlaid text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextPosition {
    Top,
    Center,
    #[default]
    Bottom,
}

/// Options for a `drawtext` overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct TextOverlayOptions {
    pub font_size: u32,
    pub font_color: String,
    pub position: TextPosition,
    /// Margin from the top/bottom edge in pixels
    pub margin_px: u32,
    /// Draw a translucent box behind the text
    pub boxed: bool,
    pub font_file: Option<String>,
}

impl Default for TextOverlayOptions {
    fn default() -> Self {
        Self {
            font_size: 48,
            font_color: "white".to_string(),
            position: TextPosition::Bottom,
            margin_px: 40,
            boxed: true,
            font_file: None,
        }
    }
}

/// `drawtext` filter centring `text` horizontally.
pub fn drawtext_filter(text: &str, options: &TextOverlayOptions) -> String {
    let y = match options.position {
        TextPosition::Top => options.margin_px.to_string(),
        TextPosition::Center => "(h-text_h)/2".to_string(),
        TextPosition::Bottom => format!("h-text_h-{}", options.margin_px),
    };

    let mut parts = vec![
        format!("text={}", escape_filter_value(text)),
        "expansion=none".to_string(),
        format!("fontsize={}", options.font_size),
        format!("fontcolor={}", options.font_color),
        "x=(w-text_w)/2".to_string(),
        format!("y={}", y),
    ];
    if let Some(font) = &options.font_file {
        parts.push(format!("fontfile={}", escape_filter_value(font)));
    }
    if options.boxed {
        parts.push("box=1".to_string());
        parts.push("boxcolor=black@0.5".to_string());
        parts.push("boxborderw=12".to_string());
    }

    format!("drawtext={}", parts.join(":"))
}

/// Scale into `width`x`height` keeping aspect, padding the rest.
pub fn scale_pad_filter(width: u32, height: u32) -> String {
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1",
        w = width,
        h = height
    )
}

/// Palette-optimised GIF conversion at `fps` and `width`.
pub fn gif_filter(fps: u32, width: u32) -> String {
    format!(
        "fps={},scale={}:-2:flags=lanczos,split[a][b];[a]palettegen[p];[b][p]paletteuse",
        fps, width
    )
}

/// Filter for poster thumbnails.
pub fn thumbnail_filter() -> String {
    format!("scale={}:-2", THUMBNAIL_SCALE_WIDTH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_clamps_long_fade_out() {
        let env = FadeEnvelope::clamped(15.0, 2.0, 20.0);
        assert_eq!(env.fade_out_start_secs, 0.0);
        assert_eq!(env.fade_out_secs, 15.0);
        assert_eq!(env.fade_in_secs, 2.0);
    }

    #[test]
    fn test_envelope_regular() {
        let env = FadeEnvelope::clamped(30.0, 2.0, 3.0);
        assert!((env.fade_out_start_secs - 27.0).abs() < 1e-9);
        assert_eq!(env.fade_out_secs, 3.0);
    }

    #[test]
    fn test_audio_filter() {
        let env = FadeEnvelope::clamped(30.0, 2.0, 3.0);
        let filter = audio_filter(&env, Some(1.5)).unwrap();
        assert_eq!(
            filter,
            "volume=1.500,afade=t=in:st=0:d=2.000,afade=t=out:st=27.000:d=3.000"
        );

        let none = FadeEnvelope::clamped(30.0, 0.0, 0.0);
        assert!(audio_filter(&none, Some(1.0)).is_none());
    }

    /// One FFmpeg unescaping pass: a backslash takes the next character
    /// literally, quotes group, and `terms` end the token.
    fn unescape(input: &str, terms: &[char]) -> (String, String) {
        let mut out = String::new();
        let mut chars = input.chars();
        let mut quoted = false;
        while let Some(c) = chars.next() {
            match c {
                '\\' if !quoted => {
                    if let Some(next) = chars.next() {
                        out.push(next);
                    }
                }
                '\'' => quoted = !quoted,
                c if !quoted && terms.contains(&c) => {
                    return (out, std::iter::once(c).chain(chars).collect());
                }
                c => out.push(c),
            }
        }
        (out, String::new())
    }

    #[test]
    fn test_escape_survives_both_levels() {
        for text in [
            "Guns N' Roses",
            "It's 5:00",
            "AC\\DC, live [1991]; 100%",
        ] {
            let (graph_level, rest) = unescape(&escape_filter_value(text), &[',', ';', '[', ']']);
            assert!(rest.is_empty(), "{text:?} split at {rest:?}");
            let (option_level, rest) = unescape(&graph_level, &[':']);
            assert!(rest.is_empty(), "{text:?} split at {rest:?}");
            assert_eq!(option_level, text);
        }
        assert_eq!(escape_filter_value("Guns N' Roses"), "Guns N\\\\\\' Roses");
    }

    #[test]
    fn test_drawtext_with_apostrophe_keeps_options_apart() {
        let filter = drawtext_filter("Guns N' Roses: Live", &TextOverlayOptions::default());
        let args = filter.strip_prefix("drawtext=").unwrap();
        let (graph_level, rest) = unescape(args, &[',', ';', '[', ']']);
        assert!(rest.is_empty());

        let mut options = Vec::new();
        let mut remaining = graph_level;
        loop {
            let (option, rest) = unescape(&remaining, &[':']);
            options.push(option);
            match rest.strip_prefix(':') {
                Some(next) => remaining = next.to_string(),
                None => break,
            }
        }
        assert_eq!(options[0], "text=Guns N' Roses: Live");
        assert!(options.contains(&"expansion=none".to_string()));
        assert!(options.contains(&"fontsize=48".to_string()));
    }

    #[test]
    fn test_drawtext_positions() {
        let top = drawtext_filter(
            "Hi",
            &TextOverlayOptions {
                position: TextPosition::Top,
                boxed: false,
                ..Default::default()
            },
        );
        assert!(top.starts_with("drawtext=text=Hi:expansion=none"));
        assert!(top.contains("y=40"));
        assert!(!top.contains("box=1"));

        let bottom = drawtext_filter("Hi", &TextOverlayOptions::default());
        assert!(bottom.contains("y=h-text_h-40"));
        assert!(bottom.contains("box=1"));
    }

    #[test]
    fn test_gif_filter() {
        let f = gif_filter(12, 480);
        assert!(f.contains("palettegen"));
        assert!(f.starts_with("fps=12,scale=480"));
    }
}
