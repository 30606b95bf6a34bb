//! AI background enrichment through the text-completion service.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info};

use beatreel_models::{Artist, Track, VisualStyle};
use beatreel_render::Color;
use beatreel_text::TextCompletion;

use crate::error::{WorkerError, WorkerResult};

const MAX_TOKENS: u32 = 200;
const MAX_DESCRIPTION_CHARS: usize = 200;

/// Palette and description suggested by the service.
#[derive(Debug, Clone, PartialEq)]
pub struct Enrichment {
    pub from: Color,
    pub to: Color,
    pub description: String,
}

#[derive(Debug, Deserialize)]
struct EnrichmentReply {
    colors: Vec<String>,
    #[serde(default)]
    description: String,
}

/// Asks the completion service for a background palette.
pub struct Enricher {
    client: Arc<dyn TextCompletion>,
}

impl Enricher {
    pub fn new(client: Arc<dyn TextCompletion>) -> Self {
        Self { client }
    }

    pub async fn enrich(
        &self,
        artist: &Artist,
        track: Option<&Track>,
        style: VisualStyle,
    ) -> WorkerResult<Enrichment> {
        let prompt = build_prompt(artist, track, style);
        debug!(artist = %artist.name, prompt_len = prompt.len(), "Requesting enrichment");
        let reply = self.client.complete(&prompt, MAX_TOKENS).await?;
        let enrichment = parse_reply(&reply)?;
        info!(
            artist = %artist.name,
            from = %enrichment.from,
            to = %enrichment.to,
            "Background enriched"
        );
        Ok(enrichment)
    }
}

/// Build the palette prompt.
pub fn build_prompt(artist: &Artist, track: Option<&Track>, style: VisualStyle) -> String {
    let mut prompt = format!(
        "Suggest a background for a {} music video of the artist \"{}\"",
        style, artist.name
    );
    if !artist.genre.is_empty() {
        prompt.push_str(&format!(" ({})", artist.genre));
    }
    if let Some(track) = track {
        prompt.push_str(&format!(", track \"{}\"", track.title));
    }
    prompt.push_str(
        ".\nReply with JSON only: {\"colors\": [\"#rrggbb\", \"#rrggbb\"], \
         \"description\": \"one sentence\"}. The first colour is the top of a \
         vertical gradient, the second the bottom.",
    );
    prompt
}

/// Parse a reply, tolerating a markdown code fence around the JSON.
pub fn parse_reply(reply: &str) -> WorkerResult<Enrichment> {
    let text = strip_code_fence(reply);
    let parsed: EnrichmentReply = serde_json::from_str(text)
        .or_else(|_| {
            // Prose around the object: take the outermost braces.
            match (text.find('{'), text.rfind('}')) {
                (Some(start), Some(end)) if start < end => serde_json::from_str(&text[start..=end]),
                _ => serde_json::from_str(text),
            }
        })
        .map_err(|e| WorkerError::enrichment(format!("unparseable reply: {}", e)))?;

    let mut colors = parsed.colors.iter().map(|c| Color::parse_hex(c));
    let (from, to) = match (colors.next(), colors.next()) {
        (Some(from), Some(to)) => (
            from.map_err(|e| WorkerError::enrichment(e.to_string()))?,
            to.map_err(|e| WorkerError::enrichment(e.to_string()))?,
        ),
        _ => {
            return Err(WorkerError::enrichment(format!(
                "expected two colours, got {}",
                parsed.colors.len()
            )))
        }
    };

    let description: String = parsed
        .description
        .trim()
        .chars()
        .take(MAX_DESCRIPTION_CHARS)
        .collect();

    Ok(Enrichment {
        from: opaque(from),
        to: opaque(to),
        description,
    })
}

fn opaque(color: Color) -> Color {
    Color { a: 255, ..color }
}

fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    text.strip_suffix("```").unwrap_or(text).trim()
}
