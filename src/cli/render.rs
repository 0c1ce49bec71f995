//! `stepline render` - Render templates against a variable map
//!
//! Local template files are loaded from the host filesystem; http(s)
//! arguments are fetched. Rendered outputs land in the output directory,
//! one file per source with any `.tmpl` suffix stripped.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use stepline::modules::render::{render, RenderRequest};
use stepline::step::fs::{Directory, File};
use stepline::template::{MissingKeyPolicy, TemplateSource};

/// Arguments for the render command
#[derive(Debug, Clone)]
pub struct RenderArgs {
    /// Template files or http(s) URLs
    pub templates: Vec<String>,
    /// YAML variable file
    pub vars: Option<PathBuf>,
    /// Inline `key=value` overrides
    pub set: Vec<String>,
    /// Fail on missing keys
    pub strict: bool,
    /// Output directory
    pub output: PathBuf,
}

pub fn run(args: &RenderArgs) -> Result<()> {
    let (sources, directory) = collect_sources(&args.templates)?;

    let vars_file = match &args.vars {
        Some(path) => Some(
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read variable file: {}", path.display()))?,
        ),
        None => None,
    };

    let request = RenderRequest {
        sources,
        directory: Some(directory),
        vars_file,
        overrides: parse_overrides(&args.set)?,
        policy: if args.strict {
            MissingKeyPolicy::Error
        } else {
            MissingKeyPolicy::Default
        },
    };

    let rendered = render(&request)?;
    rendered
        .export(&args.output)
        .with_context(|| format!("Failed to write outputs to: {}", args.output.display()))?;

    for path in rendered.paths() {
        println!("{}", args.output.join(path).display());
    }
    Ok(())
}

/// Splits arguments into remote URLs and a directory of loaded local files
fn collect_sources(templates: &[String]) -> Result<(Vec<TemplateSource>, Directory)> {
    let mut sources = Vec::with_capacity(templates.len());
    let mut directory = Directory::new();
    for template in templates {
        if template.starts_with("http://") || template.starts_with("https://") {
            sources.push(TemplateSource::remote(template));
        } else {
            let file = File::load(Path::new(template))
                .with_context(|| format!("Failed to read template: {template}"))?;
            let name = file.name.clone();
            directory = directory.with_file(name.clone(), file);
            sources.push(TemplateSource::local(name));
        }
    }
    Ok((sources, directory))
}

fn parse_overrides(set: &[String]) -> Result<Vec<(String, String)>> {
    set.iter()
        .map(|entry| match entry.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
            _ => bail!("Invalid override '{entry}', expected KEY=VALUE"),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_overrides() {
        let parsed = parse_overrides(&["name=Alice".to_string(), "debug=true".to_string()]).unwrap();
        assert_eq!(
            parsed,
            vec![
                ("name".to_string(), "Alice".to_string()),
                ("debug".to_string(), "true".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_overrides_rejects_bare_key() {
        assert!(parse_overrides(&["oops".to_string()]).is_err());
    }

    #[test]
    fn test_collect_sources_classifies_urls() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("app.conf.tmpl");
        std::fs::write(&local, "port={{ .port }}").unwrap();

        let (sources, directory) = collect_sources(&[
            local.to_string_lossy().into_owned(),
            "https://example.com/deploy.yaml.tmpl".to_string(),
        ])
        .unwrap();

        assert_eq!(sources.len(), 2);
        assert!(matches!(&sources[0], TemplateSource::Local { path } if path == "app.conf.tmpl"));
        assert!(matches!(&sources[1], TemplateSource::Remote { .. }));
        assert!(directory.file("app.conf.tmpl").is_some());
    }
}
