//! Layout documents: a background plus absolutely positioned elements.
//!
//! A layout is the renderer's equivalent of an HTML page. Elements carry an
//! optional `id` and any number of classes so animation directives can
//! target them with `#id`, `.class` or `*`.

use std::fmt;
use std::fmt::Write as _;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{RenderError, RenderResult};

/// Straight (non-premultiplied) RGBA colour, written as `#rrggbb` or `#rrggbbaa`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parse `#rgb`, `#rrggbb` or `#rrggbbaa` (the `#` is optional).
    pub fn parse_hex(value: &str) -> RenderResult<Self> {
        let hex = value.trim().trim_start_matches('#');
        let invalid = || RenderError::invalid_options(format!("invalid colour {value:?}"));
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
        match hex.len() {
            3 => {
                let nibble = |i: usize| {
                    u8::from_str_radix(&hex[i..i + 1], 16)
                        .map(|n| n * 17)
                        .map_err(|_| invalid())
                };
                Ok(Self::rgb(nibble(0)?, nibble(1)?, nibble(2)?))
            }
            6 => Ok(Self::rgb(byte(0)?, byte(2)?, byte(4)?)),
            8 => Ok(Self::rgba(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
            _ => Err(invalid()),
        }
    }

    /// Component-wise blend towards `other`; `t` is clamped to `[0, 1]`.
    pub fn lerp(self, other: Color, t: f64) -> Color {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| {
            let (a, b) = (f64::from(a), f64::from(b));
            (a + (b - a) * t).round().clamp(0.0, 255.0) as u8
        };
        Color {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
            a: mix(self.a, other.a),
        }
    }

    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// CSS `rgba()` notation.
    pub fn to_css(self) -> String {
        format!(
            "rgba({}, {}, {}, {:.3})",
            self.r,
            self.g,
            self.b,
            f64::from(self.a) / 255.0
        )
    }

    /// ffmpeg colour syntax (`0xRRGGBB`).
    pub fn to_ffmpeg(self) -> String {
        format!("0x{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a == 255 {
            write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            write!(f, "#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

impl TryFrom<String> for Color {
    type Error = RenderError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Color::parse_hex(&value)
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

/// Page background, drawn before any element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Background {
    Solid { color: Color },
    /// Linear gradient; 180 degrees runs top to bottom, as in CSS.
    LinearGradient {
        from: Color,
        to: Color,
        #[serde(default = "default_gradient_angle")]
        angle_deg: f64,
    },
    /// Image stretched to cover the page.
    Image { path: PathBuf },
}

fn default_gradient_angle() -> f64 {
    180.0
}

impl Default for Background {
    fn default() -> Self {
        Background::Solid {
            color: Color::BLACK,
        }
    }
}

/// What an element paints inside its box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ElementKind {
    Rect { color: Color },
    Image { path: PathBuf },
    /// Text centred on a coloured plate.
    Label {
        text: String,
        plate: Color,
        #[serde(default = "default_label_color")]
        text_color: Color,
        #[serde(default = "default_font_size")]
        font_size_px: u32,
    },
}

fn default_label_color() -> Color {
    Color::WHITE
}

fn default_font_size() -> u32 {
    48
}

/// One absolutely positioned box, in page pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutElement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    #[serde(flatten)]
    pub kind: ElementKind,
}

fn default_opacity() -> f64 {
    1.0
}

impl LayoutElement {
    pub fn new(x: f64, y: f64, width: f64, height: f64, kind: ElementKind) -> Self {
        Self {
            id: None,
            classes: Vec::new(),
            x,
            y,
            width,
            height,
            opacity: 1.0,
            kind,
        }
    }

    pub fn rect(x: f64, y: f64, width: f64, height: f64, color: Color) -> Self {
        Self::new(x, y, width, height, ElementKind::Rect { color })
    }

    pub fn image(x: f64, y: f64, width: f64, height: f64, path: impl Into<PathBuf>) -> Self {
        Self::new(x, y, width, height, ElementKind::Image { path: path.into() })
    }

    pub fn label(
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        text: impl Into<String>,
        plate: Color,
    ) -> Self {
        Self::new(
            x,
            y,
            width,
            height,
            ElementKind::Label {
                text: text.into(),
                plate,
                text_color: default_label_color(),
                font_size_px: default_font_size(),
            },
        )
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = opacity.clamp(0.0, 1.0);
        self
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Element selector used by animation directives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    All,
    Id(String),
    Class(String),
}

impl Selector {
    pub fn parse(raw: &str) -> RenderResult<Self> {
        let raw = raw.trim();
        let valid_name = |name: &str| {
            !name.is_empty()
                && name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        };
        if raw == "*" {
            return Ok(Selector::All);
        }
        if let Some(id) = raw.strip_prefix('#') {
            if valid_name(id) {
                return Ok(Selector::Id(id.to_string()));
            }
        } else if let Some(class) = raw.strip_prefix('.') {
            if valid_name(class) {
                return Ok(Selector::Class(class.to_string()));
            }
        }
        Err(RenderError::InvalidSelector(raw.to_string()))
    }

    pub fn matches(&self, element: &LayoutElement) -> bool {
        match self {
            Selector::All => true,
            Selector::Id(id) => element.id.as_deref() == Some(id.as_str()),
            Selector::Class(class) => element.has_class(class),
        }
    }
}

/// A full page: size, background and elements in paint order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutDocument {
    #[serde(default)]
    pub title: String,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub background: Background,
    #[serde(default)]
    pub elements: Vec<LayoutElement>,
}

impl LayoutDocument {
    pub fn new(width: u32, height: u32, background: Background) -> Self {
        Self {
            title: String::new(),
            width,
            height,
            background,
            elements: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn push(&mut self, element: LayoutElement) {
        self.elements.push(element);
    }

    pub fn with_element(mut self, element: LayoutElement) -> Self {
        self.push(element);
        self
    }

    /// Indices of the elements matched by `selector`, in paint order.
    pub fn select(&self, selector: &Selector) -> Vec<usize> {
        self.elements
            .iter()
            .enumerate()
            .filter(|(_, e)| selector.matches(e))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn element_by_id(&self, id: &str) -> Option<&LayoutElement> {
        self.elements.iter().find(|e| e.id.as_deref() == Some(id))
    }

    /// Every image file the document references.
    pub fn asset_paths(&self) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Background::Image { path } = &self.background {
            paths.push(path.clone());
        }
        for element in &self.elements {
            if let ElementKind::Image { path } = &element.kind {
                if !paths.contains(path) {
                    paths.push(path.clone());
                }
            }
        }
        paths
    }

    /// Equivalent standalone HTML/CSS page.
    pub fn to_html(&self) -> String {
        let mut html = String::new();
        let _ = writeln!(html, "<!DOCTYPE html>");
        let _ = writeln!(html, "<html>");
        let _ = writeln!(html, "<head>");
        let _ = writeln!(html, "<meta charset=\"utf-8\">");
        let _ = writeln!(html, "<title>{}</title>", escape_html(&self.title));
        let _ = writeln!(html, "<style>");
        let _ = writeln!(
            html,
            "html, body {{ margin: 0; padding: 0; overflow: hidden; }}"
        );
        let _ = writeln!(
            html,
            "body {{ position: relative; width: {}px; height: {}px; {} }}",
            self.width,
            self.height,
            background_css(&self.background)
        );
        let _ = writeln!(html, ".el {{ position: absolute; box-sizing: border-box; }}");
        let _ = writeln!(html, "</style>");
        let _ = writeln!(html, "</head>");
        let _ = writeln!(html, "<body>");
        for element in &self.elements {
            let _ = writeln!(html, "{}", element_html(element));
        }
        let _ = writeln!(html, "</body>");
        let _ = writeln!(html, "</html>");
        html
    }
}

fn background_css(background: &Background) -> String {
    match background {
        Background::Solid { color } => format!("background: {};", color.to_css()),
        Background::LinearGradient {
            from,
            to,
            angle_deg,
        } => format!(
            "background: linear-gradient({}deg, {}, {});",
            angle_deg,
            from.to_css(),
            to.to_css()
        ),
        Background::Image { path } => format!(
            "background: url('{}') center / cover no-repeat;",
            escape_html(&path.display().to_string())
        ),
    }
}

fn element_html(element: &LayoutElement) -> String {
    let mut attrs = String::new();
    if let Some(id) = &element.id {
        let _ = write!(attrs, " id=\"{}\"", escape_html(id));
    }
    let mut classes = vec!["el".to_string()];
    classes.extend(element.classes.iter().map(|c| escape_html(c)));
    let _ = write!(attrs, " class=\"{}\"", classes.join(" "));

    let mut style = format!(
        "left: {}px; top: {}px; width: {}px; height: {}px; opacity: {};",
        element.x, element.y, element.width, element.height, element.opacity
    );
    match &element.kind {
        ElementKind::Rect { color } => {
            let _ = write!(style, " background: {};", color.to_css());
            format!("<div{attrs} style=\"{style}\"></div>")
        }
        ElementKind::Image { path } => format!(
            "<img{attrs} style=\"{style} object-fit: cover;\" src=\"{}\">",
            escape_html(&path.display().to_string())
        ),
        ElementKind::Label {
            text,
            plate,
            text_color,
            font_size_px,
        } => {
            let _ = write!(
                style,
                " background: {}; color: {}; font-size: {}px; display: flex; align-items: center; justify-content: center;",
                plate.to_css(),
                text_color.to_css(),
                font_size_px
            );
            format!("<div{attrs} style=\"{style}\">{}</div>", escape_html(text))
        }
    }
}

fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
