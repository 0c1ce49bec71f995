//! Template render operation
//!
//! Thin adapter over the template engine: merges a variable file with inline
//! overrides and renders every source into one output directory.

use crate::modules::errors::ModuleError;
use crate::step::fs::Directory;
use crate::template::{MissingKeyPolicy, TemplateEngine, TemplateError, TemplateSource, VariableMap};

/// Inputs for a render operation
#[derive(Debug, Clone, Default)]
pub struct RenderRequest {
    /// Template sources, local and/or remote
    pub sources: Vec<TemplateSource>,
    /// Directory local sources are read from
    pub directory: Option<Directory>,
    /// YAML variable file body, applied first
    pub vars_file: Option<String>,
    /// Inline `key=value` overrides, applied last
    pub overrides: Vec<(String, String)>,
    /// Missing-key policy
    pub policy: MissingKeyPolicy,
}

/// Renders the requested sources into a directory
///
/// # Errors
///
/// Returns [`TemplateError::EmptySourceList`] wrapped in [`ModuleError`] for
/// an empty source list, plus any variable-file or render failure.
pub fn render(request: &RenderRequest) -> Result<Directory, ModuleError> {
    if request.sources.is_empty() {
        return Err(TemplateError::EmptySourceList.into());
    }
    let mut vars = match &request.vars_file {
        Some(body) => VariableMap::from_yaml(body)?,
        None => VariableMap::new(),
    };
    vars = vars.with_overrides(
        request
            .overrides
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str())),
    );

    let engine = TemplateEngine::new();
    Ok(engine.render(
        &request.sources,
        request.directory.as_ref(),
        &vars,
        request.policy,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::fs::File;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_render_merges_file_and_inline_vars() {
        let directory = Directory::new().with_file(
            "template",
            File::new("template", "Hello {{ .name }}! role={{ .role }}"),
        );
        let request = RenderRequest {
            sources: vec![TemplateSource::local("template")],
            directory: Some(directory),
            vars_file: Some("role: admin\nname: bob\n".to_string()),
            overrides: vec![("name".to_string(), "Alice".to_string())],
            policy: MissingKeyPolicy::Default,
        };

        let out = render(&request).unwrap();
        assert_eq!(
            out.file("template").unwrap().contents_utf8(),
            "Hello Alice! role=admin"
        );
    }

    #[test]
    fn test_empty_sources_rejected() {
        let err = render(&RenderRequest::default()).unwrap_err();
        assert!(matches!(
            err,
            ModuleError::Template(TemplateError::EmptySourceList)
        ));
    }
}
