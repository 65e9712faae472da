//! Launch parameters in query-string form: `delegate=GPU&debugVideo=3squat`

use thiserror::Error;

use crate::inference::Delegate;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParamsError {
    #[error("{0}")]
    Delegate(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchParams {
    pub delegate: Option<Delegate>,
    /// Recorded clip to play instead of the live camera.
    pub debug_video: Option<String>,
}

impl LaunchParams {
    /// Parse a query string, with or without the leading `?`. Unknown keys
    /// are ignored; an empty `debugVideo` selects the live camera.
    pub fn parse(query: &str) -> Result<Self, ParamsError> {
        let query = query.trim().trim_start_matches('?');
        let mut params = Self::default();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "delegate" if !value.is_empty() => {
                    params.delegate = Some(value.parse().map_err(ParamsError::Delegate)?);
                }
                "debugVideo" => {
                    params.debug_video = (!value.is_empty()).then(|| value.into_owned());
                }
                _ => {}
            }
        }
        Ok(params)
    }

    /// Later values win where set.
    pub fn merge(self, overrides: LaunchParams) -> Self {
        Self {
            delegate: overrides.delegate.or(self.delegate),
            debug_video: overrides.debug_video.or(self.debug_video),
        }
    }

    /// Mirrored presentation is reserved for clips named with
    /// `mirror_prefix`. The live camera is never mirrored.
    pub fn mirrored(&self, mirror_prefix: &str) -> bool {
        match (&self.debug_video, mirror_prefix.is_empty()) {
            (Some(name), false) => name.starts_with(mirror_prefix),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_keys() {
        let params = LaunchParams::parse("?delegate=GPU&debugVideo=3squat").unwrap();
        assert_eq!(params.delegate, Some(Delegate::Gpu));
        assert_eq!(params.debug_video.as_deref(), Some("3squat"));
    }

    #[test]
    fn empty_debug_video_means_camera() {
        let params = LaunchParams::parse("debugVideo=&delegate=").unwrap();
        assert_eq!(params, LaunchParams::default());
    }

    #[test]
    fn unknown_delegate_is_rejected() {
        assert!(LaunchParams::parse("delegate=TPU").is_err());
    }

    #[test]
    fn values_are_url_decoded_and_unknown_keys_ignored() {
        let params = LaunchParams::parse("foo=bar&debugVideo=1%2Dside").unwrap();
        assert_eq!(params.debug_video.as_deref(), Some("1-side"));
    }

    #[test]
    fn reserved_prefix_enables_mirroring() {
        let clip = |name: &str| LaunchParams {
            debug_video: Some(name.into()),
            ..LaunchParams::default()
        };
        assert!(clip("3squat").mirrored("3"));
        assert!(!clip("1squat").mirrored("3"));
        assert!(!LaunchParams::default().mirrored("3"));
        assert!(!clip("3squat").mirrored(""));
    }

    #[test]
    fn merge_prefers_overrides() {
        let base = LaunchParams::parse("delegate=CPU&debugVideo=a").unwrap();
        let merged = base.merge(LaunchParams {
            delegate: Some(Delegate::Gpu),
            debug_video: None,
        });
        assert_eq!(merged.delegate, Some(Delegate::Gpu));
        assert_eq!(merged.debug_video.as_deref(), Some("a"));
    }
}
