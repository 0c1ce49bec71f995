//! Hugo site and presentation operations
//!
//! Deck assembly runs host-side through the template engine's presentation
//! merge; the site build is a container step over a mounted source tree.

use crate::modules::errors::ModuleError;
use crate::step::fs::{Directory, File};
use crate::step::{StepBuilder, StepPlan, ValidationError};
use crate::template::{merge_deck, parse_deck_spec, TemplateEngine};

/// Default image carrying the hugo tool
pub const DEFAULT_HUGO_IMAGE: &str = "hugomods/hugo:0.125.4";

const SITE_PATH: &str = "/workspace/site";
const PUBLIC_PATH: &str = "/out/public";

/// Default filename for an assembled deck
pub const DECK_FILE_NAME: &str = "slides.md";

/// Assembles a presentation deck from a spec document
///
/// Sections are sorted by `(order, name)` and joined with slide breaks;
/// section bodies come from the given directory or from remote URLs.
///
/// # Errors
///
/// Returns a template error for a malformed spec or an unloadable section.
pub fn assemble_deck(
    spec: &str,
    sources: Option<&Directory>,
) -> Result<File, ModuleError> {
    let sections = parse_deck_spec(spec)?;
    let merged = merge_deck(&sections, sources, &TemplateEngine::new())?;
    Ok(File::new(DECK_FILE_NAME, merged))
}

/// Builds a site-build step over a mounted source tree
///
/// # Errors
///
/// Returns a validation error for an empty site directory.
pub fn build_site(site: &Directory) -> Result<StepPlan, ModuleError> {
    if site.is_empty() {
        return Err(ValidationError::MissingInput("site directory".to_string()).into());
    }
    Ok(StepBuilder::new("hugo-build")
        .from(DEFAULT_HUGO_IMAGE)
        .mount_directory(SITE_PATH, site.clone())
        .exec([
            "hugo",
            "--minify",
            "--source",
            SITE_PATH,
            "--destination",
            PUBLIC_PATH,
        ])
        .expect_directory(PUBLIC_PATH)
        .build()?)
}
