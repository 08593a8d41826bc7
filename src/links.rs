use std::sync::LazyLock;

use regex::Regex;

static YOUTUBE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:youtu\.be/|youtube\.com/(?:embed/|v/|watch\?v=|watch\?.+&v=))([^&?]+)").unwrap()
});

static SPOTIFY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"spotify\.com/(?:track|album|playlist)/([a-zA-Z0-9]+)").unwrap()
});

/// Video ID of a YouTube watch, short or embed URL.
pub fn youtube_embed_id(url: &str) -> Option<&str> {
    YOUTUBE_RE.captures(url)?.get(1).map(|m| m.as_str())
}

/// ID of a Spotify track, album or playlist URL.
pub fn spotify_embed_id(url: &str) -> Option<&str> {
    SPOTIFY_RE.captures(url)?.get(1).map(|m| m.as_str())
}
