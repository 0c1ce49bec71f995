//! Vulnerability scanning
//!
//! Composes scanner steps (trivy-shaped CLI) that emit a JSON report, parses
//! the report into a severity-filtered summary, and exposes a gate predicate
//! for publish pipelines. The scanner's JSON artifact is captured verbatim;
//! only the Rust-side summary is derived from it.

use crate::modules::errors::ModuleError;
use crate::step::fs::{Directory, File};
use crate::step::{StepBuilder, StepPlan, StepResult, ValidationError};
use serde::Deserialize;
use std::fmt;

/// Default scanner image
pub const DEFAULT_SCANNER_IMAGE: &str = "aquasec/trivy:0.53.0";

/// Container path of the captured JSON report
pub const REPORT_PATH: &str = "/report/scan.json";

const SCAN_SOURCE_PATH: &str = "/workspace/scan-target";

/// One finding in a scan report
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Finding {
    /// Vulnerability identifier (e.g. CVE number)
    #[serde(rename = "VulnerabilityID")]
    pub id: String,
    /// Affected package
    #[serde(rename = "PkgName", default)]
    pub package: String,
    /// Severity label as reported by the scanner
    #[serde(rename = "Severity", default)]
    pub severity: String,
    /// Short description
    #[serde(rename = "Title", default)]
    pub title: String,
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.severity, self.id, self.package)
    }
}

/// Severity-filtered summary of a scanner report
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Findings matching the requested severities
    pub findings: Vec<Finding>,
}

impl ScanReport {
    /// Returns true when no matching findings exist
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }

    /// One-line summary suitable for a gate finding
    #[must_use]
    pub fn summary(&self) -> String {
        if self.is_clean() {
            "no findings".to_string()
        } else {
            let ids: Vec<String> = self.findings.iter().map(ToString::to_string).collect();
            format!("{} finding(s): {}", self.findings.len(), ids.join(", "))
        }
    }
}

#[derive(Deserialize)]
struct RawReport {
    #[serde(rename = "Results", default)]
    results: Vec<RawResult>,
}

#[derive(Deserialize)]
struct RawResult {
    #[serde(rename = "Vulnerabilities", default)]
    vulnerabilities: Vec<Finding>,
}

/// Builds a step that scans an image reference
///
/// # Errors
///
/// Returns [`ValidationError::MissingInput`] for an empty reference.
pub fn scan_image(reference: &str, severities: &[String]) -> Result<StepPlan, ModuleError> {
    if reference.is_empty() {
        return Err(ValidationError::MissingInput("image reference".to_string()).into());
    }
    let mut argv = vec!["trivy".to_string(), "image".to_string()];
    push_common_flags(&mut argv, severities);
    argv.push(reference.to_string());

    Ok(StepBuilder::new("scan")
        .from(DEFAULT_SCANNER_IMAGE)
        .exec(argv)
        .expect_file(REPORT_PATH)
        .build()?)
}

/// Builds a step that scans a directory tree
///
/// # Errors
///
/// Returns a validation error when the directory is empty.
pub fn scan_filesystem(source: &Directory, severities: &[String]) -> Result<StepPlan, ModuleError> {
    if source.is_empty() {
        return Err(ValidationError::MissingInput("scan source directory".to_string()).into());
    }
    let mut argv = vec!["trivy".to_string(), "fs".to_string()];
    push_common_flags(&mut argv, severities);
    argv.push(SCAN_SOURCE_PATH.to_string());

    Ok(StepBuilder::new("scan")
        .from(DEFAULT_SCANNER_IMAGE)
        .mount_directory(SCAN_SOURCE_PATH, source.clone())
        .exec(argv)
        .expect_file(REPORT_PATH)
        .build()?)
}

fn push_common_flags(argv: &mut Vec<String>, severities: &[String]) {
    if !severities.is_empty() {
        argv.push("--severity".to_string());
        argv.push(severities.join(","));
    }
    argv.extend([
        "--format".to_string(),
        "json".to_string(),
        "--output".to_string(),
        REPORT_PATH.to_string(),
    ]);
}

/// Parses a captured scanner report, keeping only the requested severities
///
/// An empty severity list keeps everything.
///
/// # Errors
///
/// Returns [`ModuleError::Parse`] for malformed JSON.
pub fn parse_report(report: &File, severities: &[String]) -> Result<ScanReport, ModuleError> {
    let raw: RawReport =
        serde_json::from_slice(&report.contents).map_err(|e| ModuleError::Parse {
            what: "scan report".to_string(),
            reason: e.to_string(),
        })?;
    let findings = raw
        .results
        .into_iter()
        .flat_map(|r| r.vulnerabilities)
        .filter(|f| severities.is_empty() || severities.iter().any(|s| s == &f.severity))
        .collect();
    Ok(ScanReport { findings })
}

/// Gate predicate halting a pipeline when the report has matching findings
///
/// An unreadable or missing report is itself a finding: a publish pipeline
/// must not push on the strength of a report it cannot inspect.
pub fn gate(severities: Vec<String>) -> impl Fn(&StepResult) -> Option<String> {
    move |result: &StepResult| {
        let Some(report) = result.file(REPORT_PATH) else {
            return Some("scan report was not captured".to_string());
        };
        match parse_report(report, &severities) {
            Ok(report) if report.is_clean() => None,
            Ok(report) => Some(report.summary()),
            Err(e) => Some(format!("scan report unreadable: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::Layer;
    use pretty_assertions::assert_eq;

    const REPORT: &str = r#"{
        "Results": [
            {
                "Vulnerabilities": [
                    {"VulnerabilityID": "CVE-2024-0001", "PkgName": "openssl", "Severity": "CRITICAL", "Title": "bad"},
                    {"VulnerabilityID": "CVE-2024-0002", "PkgName": "zlib", "Severity": "LOW", "Title": "meh"}
                ]
            }
        ]
    }"#;

    fn severities() -> Vec<String> {
        vec!["HIGH".to_string(), "CRITICAL".to_string()]
    }

    #[test]
    fn test_scan_image_argv_shape() {
        let plan = scan_image("r/i:1", &severities()).unwrap();
        let Layer::Exec { argv, .. } = &plan.layers[0] else {
            panic!("expected exec layer");
        };
        assert_eq!(
            argv,
            &[
                "trivy", "image", "--severity", "HIGH,CRITICAL", "--format", "json", "--output",
                REPORT_PATH, "r/i:1",
            ]
        );
        assert_eq!(plan.outputs.len(), 1);
    }

    #[test]
    fn test_parse_report_filters_by_severity() {
        let file = File::new("scan.json", REPORT);
        let report = parse_report(&file, &severities()).unwrap();
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].id, "CVE-2024-0001");

        let all = parse_report(&file, &[]).unwrap();
        assert_eq!(all.findings.len(), 2);
    }

    #[test]
    fn test_parse_report_rejects_malformed_json() {
        let file = File::new("scan.json", "not json");
        assert!(matches!(
            parse_report(&file, &[]),
            Err(ModuleError::Parse { .. })
        ));
    }

    #[test]
    fn test_gate_halts_on_findings() {
        let mut result = StepResult::new();
        result.record_file(REPORT_PATH, File::new("scan.json", REPORT));
        let finding = gate(severities())(&result).unwrap();
        assert!(finding.contains("CVE-2024-0001"));
    }

    #[test]
    fn test_gate_passes_clean_report() {
        let mut result = StepResult::new();
        result.record_file(REPORT_PATH, File::new("scan.json", r#"{"Results": []}"#));
        assert_eq!(gate(severities())(&result), None);
    }

    #[test]
    fn test_gate_treats_missing_report_as_finding() {
        let result = StepResult::new();
        assert!(gate(severities())(&result).is_some());
    }
}
