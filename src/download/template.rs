//! Endpoint templates: URL patterns with a single `{}` ID placeholder.

use std::fmt;

use thiserror::Error;
use url::Url;

/// Placeholder replaced by the item ID.
pub const ID_PLACEHOLDER: &str = "{}";

/// Errors raised while validating an endpoint template.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    /// The pattern has zero or several `{}` placeholders.
    #[error(
        "endpoint template {template:?} must contain exactly one {{}} placeholder, found {found}"
    )]
    Placeholder {
        /// The offending pattern.
        template: String,
        /// How many placeholders were found.
        found: usize,
    },

    /// The pattern does not produce an absolute http(s) URL.
    #[error("endpoint template {template:?} does not produce a valid http(s) URL")]
    InvalidUrl {
        /// The offending pattern.
        template: String,
    },

    /// No template was configured at all.
    #[error("no endpoint templates configured (pass --template or --server)")]
    Empty,
}

/// One content-format variant offered by the remote server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointTemplate {
    pattern: String,
}

impl EndpointTemplate {
    /// Validates and wraps a pattern such as `http://host/get/EPUB/{}/Library`.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Placeholder`] unless the pattern has exactly one
    /// `{}`, and [`TemplateError::InvalidUrl`] if substituting an ID does not
    /// give an absolute http(s) URL.
    pub fn parse(pattern: &str) -> Result<Self, TemplateError> {
        let found = pattern.matches(ID_PLACEHOLDER).count();
        if found != 1 {
            return Err(TemplateError::Placeholder {
                template: pattern.to_string(),
                found,
            });
        }

        let template = Self {
            pattern: pattern.to_string(),
        };
        let valid = Url::parse(&template.url_for(1))
            .is_ok_and(|url| matches!(url.scheme(), "http" | "https"));
        if !valid {
            return Err(TemplateError::InvalidUrl {
                template: pattern.to_string(),
            });
        }
        Ok(template)
    }

    /// Builds the request URL for `id`.
    #[must_use]
    pub fn url_for(&self, id: u64) -> String {
        self.pattern.replacen(ID_PLACEHOLDER, &id.to_string(), 1)
    }

    /// The raw pattern.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.pattern
    }
}

impl fmt::Display for EndpointTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern)
    }
}

/// Parses an ordered list of patterns, keeping their order as preference.
///
/// # Errors
///
/// Returns [`TemplateError::Empty`] for an empty list, or the first invalid
/// pattern's error.
pub fn parse_templates<S: AsRef<str>>(
    patterns: &[S],
) -> Result<Vec<EndpointTemplate>, TemplateError> {
    if patterns.is_empty() {
        return Err(TemplateError::Empty);
    }
    patterns
        .iter()
        .map(|p| EndpointTemplate::parse(p.as_ref()))
        .collect()
}

/// Default EPUB-then-MOBI templates for a library server.
///
/// `server` is the base URL (`http://host:port`), `library` the library name
/// that ends every download path.
///
/// # Errors
///
/// Returns [`TemplateError::InvalidUrl`] if the server base is not a URL.
pub fn library_templates(
    server: &str,
    library: &str,
) -> Result<Vec<EndpointTemplate>, TemplateError> {
    let base = server.trim_end_matches('/');
    let library = library.trim_matches('/');
    ["EPUB", "MOBI"]
        .iter()
        .map(|format| {
            EndpointTemplate::parse(&format!("{base}/get/{format}/{ID_PLACEHOLDER}/{library}"))
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_template_url_for_substitutes_id() {
        let template = EndpointTemplate::parse("http://x/e/{}").unwrap();
        assert_eq!(template.url_for(42), "http://x/e/42");
    }

    #[test]
    fn test_template_placeholder_in_middle() {
        let template =
            EndpointTemplate::parse("http://10.0.0.2:8080/get/EPUB/{}/Library").unwrap();
        assert_eq!(
            template.url_for(18460),
            "http://10.0.0.2:8080/get/EPUB/18460/Library"
        );
    }

    #[test]
    fn test_template_without_placeholder_rejected() {
        assert_eq!(
            EndpointTemplate::parse("http://x/e/"),
            Err(TemplateError::Placeholder {
                template: "http://x/e/".to_string(),
                found: 0
            })
        );
    }

    #[test]
    fn test_template_with_two_placeholders_rejected() {
        let err = EndpointTemplate::parse("http://x/{}/{}").unwrap_err();
        assert!(matches!(err, TemplateError::Placeholder { found: 2, .. }));
    }

    #[test]
    fn test_template_non_http_rejected() {
        let err = EndpointTemplate::parse("ftp://x/{}").unwrap_err();
        assert!(matches!(err, TemplateError::InvalidUrl { .. }));

        let err = EndpointTemplate::parse("not a url {}").unwrap_err();
        assert!(matches!(err, TemplateError::InvalidUrl { .. }));
    }

    #[test]
    fn test_parse_templates_keeps_order() {
        let templates = parse_templates(&["http://x/e/{}", "http://x/m/{}"]).unwrap();
        assert_eq!(templates[0].as_str(), "http://x/e/{}");
        assert_eq!(templates[1].as_str(), "http://x/m/{}");
    }

    #[test]
    fn test_parse_templates_empty_rejected() {
        let empty: [&str; 0] = [];
        assert_eq!(parse_templates(&empty), Err(TemplateError::Empty));
    }

    #[test]
    fn test_library_templates_epub_then_mobi() {
        let templates = library_templates("http://192.168.1.5:8080/", "Calibre Library").unwrap();
        assert_eq!(templates.len(), 2);
        assert_eq!(
            templates[0].url_for(3),
            "http://192.168.1.5:8080/get/EPUB/3/Calibre Library"
        );
        assert_eq!(
            templates[1].url_for(3),
            "http://192.168.1.5:8080/get/MOBI/3/Calibre Library"
        );
    }

    #[test]
    fn test_template_error_display_mentions_placeholder() {
        let err = EndpointTemplate::parse("http://x/").unwrap_err();
        assert!(err.to_string().contains("{}"));
    }
}
