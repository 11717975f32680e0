//! Shutdown-kick classification

use regex::Regex;
use relink_types::{strip_color, translate_color_codes, RelinkError};
use tracing::warn;

/// Decides whether a backend kick means "the server is shutting down"
///
/// Exact text and pattern matching are mutually exclusive; a proxy is
/// configured with one or the other, or neither.
#[derive(Debug, Clone, Default)]
pub enum ShutdownMatcher {
    /// Shutdown kicks are not reclassified
    #[default]
    None,
    /// Case-sensitive equality with the colour-stripped kick text
    ExactText(String),
    /// Full match of the colour-stripped kick text
    Pattern(Regex),
}

impl ShutdownMatcher {
    /// Match an exact text, written with `&` or `§` colour codes
    ///
    /// Colour markup is removed so it never takes part in the comparison.
    pub fn exact(text: &str) -> Self {
        Self::ExactText(strip_color(&translate_color_codes('&', text)))
    }

    /// Match a regular expression against the whole kick text
    pub fn pattern(pattern: &str) -> Result<Self, RelinkError> {
        Regex::new(&format!("^(?:{})$", pattern))
            .map(Self::Pattern)
            .map_err(|e| RelinkError::InvalidShutdownPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })
    }

    /// Like [`pattern`](Self::pattern), but an invalid pattern disables
    /// classification instead of failing
    pub fn pattern_or_disabled(pattern: &str) -> Self {
        match Self::pattern(pattern) {
            Ok(matcher) => matcher,
            Err(e) => {
                warn!("{}; shutdown kicks will not trigger reconnects", e);
                Self::None
            }
        }
    }

    /// Whether any classification is configured
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// Classify an already colour-stripped kick text
    pub fn matches(&self, plain: &str) -> bool {
        match self {
            Self::None => false,
            Self::ExactText(expected) => expected == plain,
            Self::Pattern(regex) => regex.is_match(plain),
        }
    }
}
