//! Debug clip download
//!
//! Clips live on the host under `<base_url><name>.mp4` and are only served
//! to requests carrying the access key in the `x-api-key` header. A fetched
//! clip is written to the cache directory and played from there.

use std::io::Read;
use std::path::PathBuf;

use thiserror::Error;
use tracing::{info, instrument};
use url::Url;

use crate::ClipConfig;

pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Error)]
pub enum ClipError {
    #[error("invalid clip name {0:?}")]
    InvalidName(String),
    #[error("invalid clip base url: {0}")]
    Url(#[from] url::ParseError),
    #[error("clip request failed: {0}")]
    Http(#[from] Box<ureq::Error>),
    #[error("clip i/o: {0}")]
    Io(#[from] std::io::Error),
}

/// Clip names end up in a URL path and a file name.
pub fn validate_name(name: &str) -> Result<(), ClipError> {
    let ok = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(ClipError::InvalidName(name.to_string()))
    }
}

pub fn clip_url(config: &ClipConfig, name: &str) -> Result<Url, ClipError> {
    validate_name(name)?;
    let mut base = config.base_url.clone();
    if !base.ends_with('/') {
        base.push('/');
    }
    Ok(Url::parse(&base)?.join(&format!("{name}.mp4"))?)
}

/// Download a clip. Blocking; run it off the async runtime.
#[instrument(skip(config))]
pub fn fetch_clip(config: &ClipConfig, name: &str) -> Result<PathBuf, ClipError> {
    let url = clip_url(config, name)?;
    info!("Fetching debug clip from {}", url);

    let mut request = ureq::get(url.as_str());
    if let Some(key) = config.api_key.as_deref() {
        request = request.set(API_KEY_HEADER, key);
    }
    let response = request.call().map_err(Box::new)?;

    let mut body = Vec::new();
    response.into_reader().read_to_end(&mut body)?;

    std::fs::create_dir_all(&config.cache_dir)?;
    let path = config.cache_dir.join(format!("{name}.mp4"));
    std::fs::write(&path, &body)?;

    info!("Clip {} stored at {} ({} bytes)", name, path.display(), body.len());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_url: &str) -> ClipConfig {
        ClipConfig {
            base_url: base_url.into(),
            ..ClipConfig::default()
        }
    }

    #[test]
    fn url_is_built_under_base() {
        let url = clip_url(&config("https://host.example/debugVideos"), "3squat").unwrap();
        assert_eq!(url.as_str(), "https://host.example/debugVideos/3squat.mp4");

        let url = clip_url(&config("https://host.example/debugVideos/"), "lunge_2").unwrap();
        assert_eq!(url.as_str(), "https://host.example/debugVideos/lunge_2.mp4");
    }

    #[test]
    fn names_with_path_characters_are_rejected() {
        for name in ["", "../etc/passwd", "a/b", "clip.mp4", "x y"] {
            assert!(validate_name(name).is_err(), "{name:?} accepted");
        }
        assert!(validate_name("1-front_view").is_ok());
    }
}
