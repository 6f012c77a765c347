//! HTML parsing for the challenge pages
//!
//! Pulls the per-visit username out of the landing page and the flag out of
//! the upload response.

use regex::Regex;
use scraper::{Html, Selector};
use tracing::debug;

use crate::infrastructure::config::ChallengeConfig;
use crate::infrastructure::error::{SolverError, SolverResult};

/// Where to look for the username on the landing page
#[derive(Debug, Clone)]
pub struct UsernameExtractorConfig {
    /// CSS selector; the first match's text is the username
    pub selector: String,
    /// Raw markers for pages the HTML parser cannot make sense of
    pub start_marker: String,
    pub end_marker: String,
}

impl From<&ChallengeConfig> for UsernameExtractorConfig {
    fn from(challenge: &ChallengeConfig) -> Self {
        Self {
            selector: challenge.username_selector.clone(),
            start_marker: challenge.username_start_marker.clone(),
            end_marker: challenge.username_end_marker.clone(),
        }
    }
}

pub struct UsernameExtractor {
    selector: Option<Selector>,
    config: UsernameExtractorConfig,
}

impl UsernameExtractor {
    pub fn new(config: UsernameExtractorConfig) -> SolverResult<Self> {
        let selector = if config.selector.trim().is_empty() {
            None
        } else {
            Some(Selector::parse(&config.selector).map_err(|e| {
                SolverError::configuration("challenge.username_selector", e.to_string())
            })?)
        };

        Ok(Self { selector, config })
    }

    /// Username shown on `html`, trimmed
    pub fn extract(&self, html: &str) -> SolverResult<String> {
        let from_selector = self.selector.as_ref().and_then(|selector| {
            let document = Html::parse_document(html);
            document
                .select(selector)
                .map(|element| element.text().collect::<String>().trim().to_string())
                .find(|text| !text.is_empty())
        });

        let username = from_selector.or_else(|| {
            debug!("Selector found no username, falling back to raw markers");
            self.extract_between_markers(html)
        });

        username.ok_or(SolverError::UsernameNotFound {
            content_length: html.len(),
        })
    }

    fn extract_between_markers(&self, html: &str) -> Option<String> {
        if self.config.start_marker.is_empty() {
            return None;
        }
        let (_, rest) = html.split_once(&self.config.start_marker)?;
        let (inner, _) = rest.split_once(&self.config.end_marker)?;
        let inner = inner.trim();
        (!inner.is_empty()).then(|| inner.to_string())
    }
}

/// Finds the flag in a server response
pub struct FlagExtractor {
    pattern: Regex,
}

impl FlagExtractor {
    pub fn new(pattern: &str) -> SolverResult<Self> {
        let pattern = Regex::new(pattern)
            .map_err(|e| SolverError::configuration("challenge.flag_pattern", e.to_string()))?;
        Ok(Self { pattern })
    }

    /// First flag in `body`, if any
    #[must_use]
    pub fn find(&self, body: &str) -> Option<String> {
        self.pattern.find(body).map(|m| m.as_str().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::config::brachiosaure;

    const LANDING: &str = r#"
        <html><body>
          <div class="card">
            <h3>Login as</h3>
            <h4 class="text-warning">RXvB1WwdAXe7i65KE1km2GxP9Uy</h4>
            <form method="post" action="/login" enctype="multipart/form-data"></form>
          </div>
        </body></html>"#;

    fn extractor() -> UsernameExtractor {
        UsernameExtractor::new(UsernameExtractorConfig::from(&ChallengeConfig::default())).unwrap()
    }

    #[test]
    fn test_extract_username_with_selector() {
        assert_eq!(extractor().extract(LANDING).unwrap(), "RXvB1WwdAXe7i65KE1km2GxP9Uy");
    }

    #[test]
    fn test_extract_username_skips_empty_matches() {
        let html = r#"<h4 class="text-warning"> </h4><h4 class="text-warning">abc</h4>"#;
        assert_eq!(extractor().extract(html).unwrap(), "abc");
    }

    #[test]
    fn test_marker_fallback() {
        let extractor = UsernameExtractor::new(UsernameExtractorConfig {
            selector: String::new(),
            start_marker: brachiosaure::USERNAME_START_MARKER.to_string(),
            end_marker: brachiosaure::USERNAME_END_MARKER.to_string(),
        })
        .unwrap();
        assert_eq!(extractor.extract(LANDING).unwrap(), "RXvB1WwdAXe7i65KE1km2GxP9Uy");
    }

    #[test]
    fn test_missing_username() {
        let err = extractor().extract("<html><h4>nothing</h4></html>").unwrap_err();
        assert!(matches!(err, SolverError::UsernameNotFound { .. }));
    }

    #[test]
    fn test_invalid_selector() {
        let result = UsernameExtractor::new(UsernameExtractorConfig {
            selector: "h4[".to_string(),
            start_marker: String::new(),
            end_marker: String::new(),
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_flag_extraction() {
        let flags = FlagExtractor::new(brachiosaure::FLAG_PATTERN).unwrap();
        let body = "<p>Welcome back!</p><p>FCSC{5c1e4d9b0a}</p>";
        assert_eq!(flags.find(body).as_deref(), Some("FCSC{5c1e4d9b0a}"));
        assert_eq!(flags.find("<p>Invalid images</p>"), None);
    }
}
