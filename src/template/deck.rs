//! Presentation deck assembly
//!
//! A deck spec is a YAML mapping of section name to `{order, file}`. Sections
//! are loaded, sorted ascending by order (name breaks ties), and merged into
//! a single markdown document separated by slide breaks.

use crate::infrastructure::http::HttpFetcher;
use crate::step::fs::Directory;
use crate::template::engine::TemplateEngine;
use crate::template::errors::TemplateError;
use crate::template::source::TemplateSource;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Separator between merged deck sections
const SLIDE_BREAK: &str = "\n\n---\n\n";

/// One section of a presentation deck
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeckSection {
    /// Sort key, ascending
    pub order: i64,
    /// Section body: a relative path or an http(s) URL
    pub file: String,
}

/// Parses a deck spec document
///
/// # Errors
///
/// Returns [`TemplateError::MalformedSpec`] when the document is not a
/// mapping of section name to `{order, file}`.
pub fn parse_deck_spec(body: &str) -> Result<BTreeMap<String, DeckSection>, TemplateError> {
    serde_yaml::from_str(body).map_err(|e| TemplateError::MalformedSpec {
        reason: e.to_string(),
    })
}

/// Merges deck sections into one markdown document
///
/// Sections are sorted by `(order, name)` so the merge is deterministic even
/// when orders collide. Each body is right-trimmed before joining and the
/// result ends with a newline.
///
/// # Errors
///
/// Returns a [`TemplateError`] when a section body cannot be loaded.
pub fn merge_deck(
    sections: &BTreeMap<String, DeckSection>,
    directory: Option<&Directory>,
    engine: &TemplateEngine,
) -> Result<String, TemplateError> {
    let mut ordered: Vec<(&String, &DeckSection)> = sections.iter().collect();
    ordered.sort_by(|a, b| (a.1.order, a.0).cmp(&(b.1.order, b.0)));

    let mut bodies = Vec::with_capacity(ordered.len());
    for (name, section) in ordered {
        tracing::debug!(section = %name, order = section.order, "Loading deck section");
        let source = source_for(&section.file);
        let body = source.load(directory, engine.fetcher())?;
        bodies.push(body.trim_end().to_string());
    }
    Ok(bodies.join(SLIDE_BREAK) + "\n")
}

fn source_for(file: &str) -> TemplateSource {
    if file.starts_with("http://") || file.starts_with("https://") {
        TemplateSource::remote(file)
    } else {
        TemplateSource::local(file)
    }
}
