//! Read-only artist catalog.

use std::path::{Path, PathBuf};

use rand::seq::IndexedRandom;
use rand::Rng;
use serde::Deserialize;
use tracing::info;

use beatreel_models::{Artist, ArtistSelector, Track};

use crate::error::{WorkerError, WorkerResult};

/// Lookup of artists by name or at random.
pub trait ArtistCatalog: Send + Sync {
    fn artists(&self) -> &[Artist];

    /// Case-insensitive lookup by name.
    fn find(&self, name: &str) -> Option<&Artist> {
        let name = name.trim();
        self.artists()
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
    }

    /// Any artist, or with `needs_source_url` only artists that have a
    /// track with a source URL.
    fn pick_random(&self, needs_source_url: bool, rng: &mut dyn rand::RngCore) -> Option<&Artist> {
        if !needs_source_url {
            return self.artists().choose(rng);
        }
        let remote: Vec<&Artist> = self
            .artists()
            .iter()
            .filter(|a| a.remote_tracks().next().is_some())
            .collect();
        remote.choose(rng).copied()
    }

    /// Resolve a request's selector.
    ///
    /// `needs_source_url` narrows a random pick to artists whose audio can be
    /// fetched from the catalog. A named artist is returned as is.
    fn resolve(
        &self,
        selector: &ArtistSelector,
        needs_source_url: bool,
        rng: &mut dyn rand::RngCore,
    ) -> WorkerResult<Artist> {
        match selector {
            ArtistSelector::Random => self
                .pick_random(needs_source_url, rng)
                .cloned()
                .ok_or_else(|| {
                    if needs_source_url && !self.is_empty() {
                        WorkerError::validation(
                            "no catalog artist has a track with a source URL; name an audio URL or load a catalog",
                        )
                    } else {
                        WorkerError::ArtistNotFound(selector.to_string())
                    }
                }),
            ArtistSelector::Named(name) => self
                .find(name)
                .cloned()
                .ok_or_else(|| WorkerError::ArtistNotFound(selector.to_string())),
        }
    }

    fn len(&self) -> usize {
        self.artists().len()
    }

    fn is_empty(&self) -> bool {
        self.artists().is_empty()
    }
}

/// Pick a track: a random one with a source URL when audio must be fetched
/// from the catalog, otherwise any random track.
pub fn pick_track<'a, R: Rng + ?Sized>(
    artist: &'a Artist,
    needs_source_url: bool,
    rng: &mut R,
) -> Option<&'a Track> {
    if needs_source_url {
        let remote: Vec<&Track> = artist.remote_tracks().collect();
        remote.choose(rng).copied()
    } else {
        artist.tracks.choose(rng)
    }
}

/// Catalog held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    artists: Vec<Artist>,
}

impl StaticCatalog {
    pub fn new(artists: Vec<Artist>) -> Self {
        Self { artists }
    }

    /// Small catalog shipped with the binary. Tracks carry no source URLs, so
    /// remote requests against it must name a URL.
    pub fn builtin() -> Self {
        Self::new(vec![
            Artist::new("Nova Lights", "synthwave")
                .with_track(Track::new("Night Drive").with_duration_label("3:42").with_year(2019))
                .with_track(Track::new("Chrome Horizon").with_duration_label("4:05").with_year(2021)),
            Artist::new("The Quiet Harbor", "indie folk")
                .with_track(Track::new("Lanterns").with_duration_label("3:18").with_year(2016))
                .with_track(Track::new("Low Tide").with_duration_label("2:57").with_year(2018)),
            Artist::new("Kilo Verse", "hip hop")
                .with_track(Track::new("Concrete Bloom").with_duration_label("3:31").with_year(2022)),
            Artist::new("Aurelia Strings", "classical crossover")
                .with_track(Track::new("Meridian").with_duration_label("5:12").with_year(2015)),
        ])
    }
}

impl ArtistCatalog for StaticCatalog {
    fn artists(&self) -> &[Artist] {
        &self.artists
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogFile {
    Wrapped { artists: Vec<Artist> },
    List(Vec<Artist>),
}

/// Catalog loaded from a JSON file: either a list of artists or
/// `{"artists": [...]}`.
#[derive(Debug, Clone)]
pub struct JsonCatalog {
    path: PathBuf,
    inner: StaticCatalog,
}

impl JsonCatalog {
    pub async fn load(path: impl AsRef<Path>) -> WorkerResult<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| WorkerError::catalog(format!("cannot read {}: {}", path.display(), e)))?;
        let catalog = Self::from_slice(path, &bytes)?;
        info!(path = %path.display(), artists = catalog.len(), "Loaded artist catalog");
        Ok(catalog)
    }

    pub fn from_slice(path: impl Into<PathBuf>, bytes: &[u8]) -> WorkerResult<Self> {
        let path = path.into();
        let parsed: CatalogFile = serde_json::from_slice(bytes)
            .map_err(|e| WorkerError::catalog(format!("invalid catalog {}: {}", path.display(), e)))?;
        let artists = match parsed {
            CatalogFile::Wrapped { artists } | CatalogFile::List(artists) => artists,
        };
        if let Some(blank) = artists.iter().find(|a| a.name.trim().is_empty()) {
            return Err(WorkerError::catalog(format!(
                "artist with empty name in {} (genre {:?})",
                path.display(),
                blank.genre
            )));
        }
        Ok(Self {
            path,
            inner: StaticCatalog::new(artists),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ArtistCatalog for JsonCatalog {
    fn artists(&self) -> &[Artist] {
        self.inner.artists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_find_case_insensitive() {
        let catalog = StaticCatalog::builtin();
        assert_eq!(catalog.find("nova lights").unwrap().name, "Nova Lights");
        assert_eq!(catalog.find("  KILO VERSE ").unwrap().genre, "hip hop");
        assert!(catalog.find("Nobody").is_none());
    }

    #[test]
    fn test_resolve_selectors() {
        let catalog = StaticCatalog::builtin();
        let mut rng = StdRng::seed_from_u64(7);
        let random = catalog.resolve(&ArtistSelector::Random, false, &mut rng).unwrap();
        assert!(catalog.find(&random.name).is_some());

        let err = catalog
            .resolve(&ArtistSelector::Named("Nobody".into()), false, &mut rng)
            .unwrap_err();
        assert_eq!(err.kind(), beatreel_models::ErrorKind::Validation);

        let empty = StaticCatalog::default();
        assert!(empty.resolve(&ArtistSelector::Random, false, &mut rng).is_err());
    }

    fn mixed_catalog() -> StaticCatalog {
        StaticCatalog::new(vec![
            Artist::new("Local One", "ambient").with_track(Track::new("Drift")),
            Artist::new("Streamed", "house")
                .with_track(Track::new("Offline Mix"))
                .with_track(Track::new("Pulse").with_source_url("https://cdn.example/pulse.mp3")),
            Artist::new("Local Two", "folk").with_track(Track::new("Creek")),
            Artist::new("Local Three", "jazz"),
        ])
    }

    #[test]
    fn test_random_remote_pick_only_fetchable_artists() {
        let catalog = mixed_catalog();
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let artist = catalog.resolve(&ArtistSelector::Random, true, &mut rng).unwrap();
            assert_eq!(artist.name, "Streamed");
            let track = pick_track(&artist, true, &mut rng).unwrap();
            assert_eq!(track.title, "Pulse");
        }

        let seen: std::collections::HashSet<String> = (0..200)
            .map(|_| {
                catalog
                    .resolve(&ArtistSelector::Random, false, &mut rng)
                    .unwrap()
                    .name
            })
            .collect();
        assert_eq!(seen.len(), 4);
    }

    #[test]
    fn test_random_remote_pick_without_urls_is_validation_error() {
        let mut rng = StdRng::seed_from_u64(3);
        let err = StaticCatalog::builtin()
            .resolve(&ArtistSelector::Random, true, &mut rng)
            .unwrap_err();
        assert_eq!(err.kind(), beatreel_models::ErrorKind::Validation);
        assert!(err.to_string().contains("source URL"), "{err}");

        // Named artists are not filtered; track selection reports the gap
        let named = StaticCatalog::builtin()
            .resolve(&ArtistSelector::Named("Kilo Verse".into()), true, &mut rng)
            .unwrap();
        assert!(pick_track(&named, true, &mut rng).is_none());
    }

    #[test]
    fn test_pick_track_prefers_remote() {
        let artist = Artist::new("A", "g")
            .with_track(Track::new("local only"))
            .with_track(Track::new("remote").with_source_url("https://cdn.example/r.mp3"));
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..10 {
            assert_eq!(pick_track(&artist, true, &mut rng).unwrap().title, "remote");
        }
        assert!(pick_track(&artist, false, &mut rng).is_some());
        assert!(pick_track(&Artist::new("B", "g"), false, &mut rng).is_none());
    }

    #[test]
    fn test_json_catalog_shapes() {
        let list = br#"[{"name": "Solo", "genre": "jazz", "tracks": [{"title": "Blue"}]}]"#;
        let catalog = JsonCatalog::from_slice("list.json", list).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.find("solo").unwrap().tracks[0].title, "Blue");

        let wrapped = br#"{"artists": [{"name": "Duo", "genre": "pop", "tracks": []}]}"#;
        let catalog = JsonCatalog::from_slice("wrapped.json", wrapped).unwrap();
        assert_eq!(catalog.artists()[0].name, "Duo");

        assert!(JsonCatalog::from_slice("bad.json", b"{").is_err());
        assert!(JsonCatalog::from_slice(
            "blank.json",
            br#"[{"name": " ", "genre": "x", "tracks": []}]"#
        )
        .is_err());
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = JsonCatalog::load(dir.path().join("none.json")).await.unwrap_err();
        assert!(matches!(err, WorkerError::Catalog(_)));
    }
}
