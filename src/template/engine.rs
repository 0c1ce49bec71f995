//! Template rendering
//!
//! Placeholders follow a text-template grammar: `{{ .key }}` with optional
//! pipe functions, `{{ .key | upper | trimSuffix ".x" }}`. Rendering is a
//! pure function of (template, variables, missing-key policy). A body with
//! no placeholders is returned byte-for-byte.

#![allow(clippy::must_use_candidate)]

use crate::infrastructure::http::HttpFetcher;
use crate::step::fs::{Directory, File};
use crate::template::errors::TemplateError;
use crate::template::functions;
use crate::template::source::TemplateSource;
use crate::template::vars::VariableMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{-?\s*(.+?)\s*-?\}\}").unwrap());

/// Sentinel substituted for missing keys under the default policy
pub const NO_VALUE: &str = "<no value>";

/// What to do when a placeholder references an unbound key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MissingKeyPolicy {
    /// Substitute the `<no value>` sentinel
    #[default]
    Default,
    /// Fail the render
    Error,
}

/// Renders parameterised text artifacts
#[derive(Debug, Clone, Default)]
pub struct TemplateEngine {
    fetcher: HttpFetcher,
}

impl TemplateEngine {
    /// Creates an engine with a default HTTP fetcher
    pub fn new() -> Self {
        Self::default()
    }

    /// Renders a template body against a variable map
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::MissingKey`] under the error policy,
    /// [`TemplateError::Parse`] for malformed placeholders, and function
    /// errors from the pipe chain.
    pub fn render_str(
        &self,
        body: &str,
        vars: &VariableMap,
        policy: MissingKeyPolicy,
    ) -> Result<String, TemplateError> {
        let mut failure: Option<TemplateError> = None;
        let rendered = PLACEHOLDER.replace_all(body, |caps: &regex::Captures| {
            if failure.is_some() {
                return String::new();
            }
            match eval_expr(&caps[1], vars, policy) {
                Ok(text) => text,
                Err(e) => {
                    failure = Some(e);
                    String::new()
                }
            }
        });
        match failure {
            Some(e) => Err(e),
            None => Ok(rendered.into_owned()),
        }
    }

    /// Renders a set of sources into an output directory
    ///
    /// One file per source, named by [`TemplateSource::output_name`]. Local
    /// sources are looked up in `directory`.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::EmptySourceList`] for an empty source list,
    /// plus any load or render failure.
    pub fn render(
        &self,
        sources: &[TemplateSource],
        directory: Option<&Directory>,
        vars: &VariableMap,
        policy: MissingKeyPolicy,
    ) -> Result<Directory, TemplateError> {
        if sources.is_empty() {
            return Err(TemplateError::EmptySourceList);
        }

        let mut output = Directory::new();
        for source in sources {
            tracing::debug!(source = %source, "Rendering template");
            let body = source.load(directory, &self.fetcher)?;
            let rendered = self.render_str(&body, vars, policy)?;
            let name = source.output_name();
            let basename = name.rsplit('/').next().unwrap_or(&name).to_string();
            output = output.with_file(name.clone(), File::new(basename, rendered));
        }
        Ok(output)
    }

    /// The engine's HTTP fetcher, shared with the presentation merge
    pub(crate) fn fetcher(&self) -> &HttpFetcher {
        &self.fetcher
    }
}

fn eval_expr(
    expr: &str,
    vars: &VariableMap,
    policy: MissingKeyPolicy,
) -> Result<String, TemplateError> {
    let tokens = shell_words::split(expr).map_err(|e| TemplateError::Parse {
        reason: format!("'{expr}': {e}"),
    })?;
    if tokens.is_empty() {
        return Err(TemplateError::Parse {
            reason: "empty placeholder".to_string(),
        });
    }

    let segments: Vec<&[String]> = tokens.split(|t| t == "|").collect();
    let mut segments = segments.into_iter();
    let head = segments.next().unwrap_or_default();

    let mut value = eval_head(head, vars, policy)?;
    for segment in segments {
        let Some((name, args)) = segment.split_first() else {
            return Err(TemplateError::Parse {
                reason: format!("'{expr}': empty pipe segment"),
            });
        };
        value = functions::apply(name, args, value)?;
    }
    Ok(functions::stringify(&value))
}

fn eval_head(
    head: &[String],
    vars: &VariableMap,
    policy: MissingKeyPolicy,
) -> Result<Value, TemplateError> {
    let Some((first, args)) = head.split_first() else {
        return Err(TemplateError::Parse {
            reason: "empty placeholder".to_string(),
        });
    };
    if let Some(key) = first.strip_prefix('.') {
        if !args.is_empty() {
            return Err(TemplateError::Parse {
                reason: format!("unexpected arguments after '.{key}'"),
            });
        }
        match vars.get(key) {
            Some(value) => Ok(value.clone()),
            None => match policy {
                MissingKeyPolicy::Default => Ok(Value::Null),
                MissingKeyPolicy::Error => Err(TemplateError::MissingKey {
                    key: key.to_string(),
                }),
            },
        }
    } else {
        functions::apply_leading(first, args)
    }
}
