//! Template sources
//!
//! A source is a lazy reference to a template body: a relative path inside a
//! caller-provided directory, or an http(s) URL fetched with GET. Non-2xx
//! responses are fatal.

#![allow(clippy::must_use_candidate)]

use crate::infrastructure::http::HttpFetcher;
use crate::step::fs::Directory;
use crate::template::errors::TemplateError;
use serde::Serialize;
use std::fmt;
use url::Url;

/// Reference to a template body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "origin", rename_all = "lowercase")]
pub enum TemplateSource {
    /// Relative path inside a provided directory
    Local {
        /// Relative path.
        path: String,
    },
    /// http(s) URL fetched with GET
    Remote {
        /// Absolute URL.
        url: String,
    },
}

impl TemplateSource {
    /// Creates a local source
    pub fn local(path: impl Into<String>) -> Self {
        Self::Local { path: path.into() }
    }

    /// Creates a remote source
    pub fn remote(url: impl Into<String>) -> Self {
        Self::Remote { url: url.into() }
    }

    /// The rendered output filename
    ///
    /// The source address stripped of any trailing `.tmpl`; for remote
    /// sources, the last path segment of the URL (query and fragment
    /// excluded).
    pub fn output_name(&self) -> String {
        let address = match self {
            Self::Local { path } => path.clone(),
            Self::Remote { url } => remote_basename(url),
        };
        match address.strip_suffix(".tmpl") {
            Some(stripped) => stripped.to_string(),
            None => address,
        }
    }

    /// Loads the template body
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] when the local path is missing from the
    /// directory, no directory was provided, the remote address is not a
    /// valid http(s) URL, or the remote fetch fails.
    pub fn load(
        &self,
        directory: Option<&Directory>,
        fetcher: &HttpFetcher,
    ) -> Result<String, TemplateError> {
        match self {
            Self::Local { path } => {
                let directory = directory.ok_or_else(|| TemplateError::NoSourceDirectory {
                    path: path.clone(),
                })?;
                directory
                    .file(path)
                    .map(crate::step::fs::File::contents_utf8)
                    .ok_or_else(|| TemplateError::SourceNotFound { path: path.clone() })
            }
            Self::Remote { url } => {
                validate_url(url)?;
                Ok(fetcher.get_text(url)?)
            }
        }
    }
}

/// Last non-empty path segment of the URL; falls back to a raw split when
/// the address does not parse.
fn remote_basename(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed.path_segments().and_then(|segments| {
                segments
                    .filter(|segment| !segment.is_empty())
                    .last()
                    .map(ToString::to_string)
            })
        })
        .unwrap_or_else(|| {
            url.trim_end_matches('/')
                .rsplit('/')
                .next()
                .unwrap_or(url)
                .to_string()
        })
}

fn validate_url(url: &str) -> Result<Url, TemplateError> {
    let parsed = Url::parse(url).map_err(|e| TemplateError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(TemplateError::InvalidUrl {
            url: url.to_string(),
            reason: format!("unsupported scheme '{}'", parsed.scheme()),
        });
    }
    Ok(parsed)
}

impl fmt::Display for TemplateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local { path } => write!(f, "local:{path}"),
            Self::Remote { url } => write!(f, "remote:{url}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::fs::File;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_output_name_strips_tmpl_suffix() {
        assert_eq!(
            TemplateSource::local("config.yaml.tmpl").output_name(),
            "config.yaml"
        );
        assert_eq!(TemplateSource::local("template").output_name(), "template");
    }

    #[test]
    fn test_output_name_remote_uses_last_segment() {
        let source = TemplateSource::remote("https://example.com/t/deploy.yaml.tmpl");
        assert_eq!(source.output_name(), "deploy.yaml");
    }

    #[test]
    fn test_output_name_remote_ignores_query_and_trailing_slash() {
        let with_query = TemplateSource::remote("https://example.com/t/deploy.yaml.tmpl?ref=main");
        assert_eq!(with_query.output_name(), "deploy.yaml");

        let trailing = TemplateSource::remote("https://example.com/t/deploy.yaml.tmpl/");
        assert_eq!(trailing.output_name(), "deploy.yaml");
    }

    #[test]
    fn test_remote_load_rejects_invalid_url() {
        let err = TemplateSource::remote("not a url")
            .load(None, &HttpFetcher::new())
            .unwrap_err();
        assert!(matches!(err, TemplateError::InvalidUrl { .. }));
    }

    #[test]
    fn test_remote_load_rejects_non_http_scheme() {
        let err = TemplateSource::remote("ftp://example.com/a.tmpl")
            .load(None, &HttpFetcher::new())
            .unwrap_err();
        assert!(matches!(err, TemplateError::InvalidUrl { .. }));
    }

    #[test]
    fn test_local_load_from_directory() {
        let dir = Directory::new().with_file("a.tmpl", File::new("a.tmpl", "Hello {{ .name }}"));
        let body = TemplateSource::local("a.tmpl")
            .load(Some(&dir), &HttpFetcher::new())
            .unwrap();
        assert_eq!(body, "Hello {{ .name }}");
    }

    #[test]
    fn test_local_load_missing_entry() {
        let dir = Directory::new();
        let err = TemplateSource::local("a.tmpl")
            .load(Some(&dir), &HttpFetcher::new())
            .unwrap_err();
        assert!(matches!(err, TemplateError::SourceNotFound { .. }));
    }

    #[test]
    fn test_local_load_without_directory() {
        let err = TemplateSource::local("a.tmpl")
            .load(None, &HttpFetcher::new())
            .unwrap_err();
        assert!(matches!(err, TemplateError::NoSourceDirectory { .. }));
    }
}
