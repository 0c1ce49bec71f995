//! Alpine package mirror
//!
//! Fetches a set of packages (and the repository index) from the Alpine
//! branch matching a base image, lays them out as a partial mirror
//! `v<major.minor>/<repo>/x86_64/`, writes a human-readable `SUMMARY.txt`,
//! and wraps the captured tree in a zip archive.

use crate::modules::errors::ModuleError;
use crate::step::fs::{Directory, File};
use crate::step::{StepBuilder, StepPlan, ValidationError};
use chrono::Utc;
use std::fmt;
use std::io::{Cursor, Write as _};
use std::str::FromStr;

/// Container path the mirror tree is captured from
pub const MIRROR_PATH: &str = "/out";

const CDN_BASE: &str = "https://dl-cdn.alpinelinux.org/alpine";

/// Alpine package repositories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlpineRepo {
    /// The `main` repository
    Main,
    /// The `community` repository
    Community,
    /// The `testing` repository
    Testing,
}

impl AlpineRepo {
    fn as_str(self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Community => "community",
            Self::Testing => "testing",
        }
    }
}

impl fmt::Display for AlpineRepo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AlpineRepo {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "main" => Ok(Self::Main),
            "community" => Ok(Self::Community),
            "testing" => Ok(Self::Testing),
            other => Err(ValidationError::UnsupportedValue {
                input: "alpine repository".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// Inputs for a mirror operation
#[derive(Debug, Clone)]
pub struct MirrorRequest {
    /// Alpine-based base image whose branch the mirror tracks
    pub base_image: String,
    /// Packages to fetch
    pub packages: Vec<String>,
    /// Repository the packages come from
    pub repo: AlpineRepo,
}

/// Builds the mirror step
///
/// The Alpine branch is resolved at runtime from `/etc/alpine-release` of
/// the base image; the mirror tree lands under [`MIRROR_PATH`]. When the
/// repository is not `main`, the `main` index is fetched alongside as
/// `APKINDEX-main.tar.gz`.
///
/// # Errors
///
/// Returns a validation error for an empty base image or package list.
pub fn mirror(request: &MirrorRequest) -> Result<StepPlan, ModuleError> {
    if request.base_image.is_empty() {
        return Err(ValidationError::EmptyImage.into());
    }
    if request.packages.is_empty() {
        return Err(ValidationError::EmptyPackageList.into());
    }
    if request.packages.iter().any(String::is_empty) {
        return Err(ValidationError::EmptyPackageName.into());
    }

    let repo = request.repo.as_str();
    let packages = shell_words::join(&request.packages);
    let timestamp = Utc::now().to_rfc3339();

    let mut script = format!(
        "set -e\n\
         branch=\"v$(cut -d. -f1,2 /etc/alpine-release)\"\n\
         dir=\"{MIRROR_PATH}/${{branch}}/{repo}/x86_64\"\n\
         mkdir -p \"$dir\"\n\
         apk update\n\
         apk fetch --output \"$dir\" {packages}\n\
         wget -q -O \"$dir/APKINDEX.tar.gz\" \"{CDN_BASE}/${{branch}}/{repo}/x86_64/APKINDEX.tar.gz\"\n"
    );
    if request.repo != AlpineRepo::Main {
        script.push_str(&format!(
            "wget -q -O \"$dir/APKINDEX-main.tar.gz\" \"{CDN_BASE}/${{branch}}/main/x86_64/APKINDEX.tar.gz\"\n"
        ));
    }
    script.push_str(&format!(
        "{{\n\
         echo \"Generated: {timestamp}\"\n\
         echo \"Base image: {image}\"\n\
         echo \"Alpine version: $(cat /etc/alpine-release)\"\n\
         echo \"Repository: {repo}\"\n\
         echo \"Packages: {packages}\"\n\
         echo \"Files:\"\n\
         ls \"$dir\"\n\
         }} > {MIRROR_PATH}/SUMMARY.txt\n",
        image = request.base_image,
    ));

    Ok(StepBuilder::new("apk-mirror")
        .from(&request.base_image)
        .sh(script)
        .expect_directory(MIRROR_PATH)
        .build()?)
}

/// Zips a captured mirror tree
///
/// # Errors
///
/// Returns [`ModuleError::Archive`] when the archive cannot be written.
pub fn archive(mirror: &Directory) -> Result<File, ModuleError> {
    if mirror.is_empty() {
        return Err(ValidationError::MissingInput("mirror directory".to_string()).into());
    }
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut cursor);
        let options = zip::write::FileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        for (path, file) in mirror.entries() {
            writer
                .start_file(path, options)
                .map_err(|e| ModuleError::Archive {
                    reason: e.to_string(),
                })?;
            writer
                .write_all(&file.contents)
                .map_err(|e| ModuleError::Archive {
                    reason: e.to_string(),
                })?;
        }
        writer.finish().map_err(|e| ModuleError::Archive {
            reason: e.to_string(),
        })?;
    }
    Ok(File::new("apk-mirror.zip", cursor.into_inner()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::Layer;
    use pretty_assertions::assert_eq;

    fn request() -> MirrorRequest {
        MirrorRequest {
            base_image: "python:3.13.7-alpine".to_string(),
            packages: vec!["curl".to_string(), "wget".to_string()],
            repo: AlpineRepo::Community,
        }
    }

    #[test]
    fn test_parse_repo_names() {
        assert_eq!("community".parse::<AlpineRepo>().unwrap(), AlpineRepo::Community);
        assert!(matches!(
            "edge".parse::<AlpineRepo>(),
            Err(ValidationError::UnsupportedValue { .. })
        ));
    }

    #[test]
    fn test_mirror_script_layout() {
        let plan = mirror(&request()).unwrap();
        assert_eq!(plan.image, "python:3.13.7-alpine");
        let Layer::Exec { argv, opts } = &plan.layers[0] else {
            panic!("expected exec layer");
        };
        assert!(opts.shell);
        let script = &argv[0];
        assert!(script.contains("apk fetch --output \"$dir\" curl wget"));
        assert!(script.contains("/community/x86_64"));
        assert!(script.contains("APKINDEX.tar.gz"));
        // Non-main repo also mirrors the main index.
        assert!(script.contains("APKINDEX-main.tar.gz"));
        assert!(script.contains("SUMMARY.txt"));
        assert!(script.contains("Base image: python:3.13.7-alpine"));
        assert_eq!(plan.outputs[0].path(), MIRROR_PATH);
    }

    #[test]
    fn test_main_repo_skips_auxiliary_index() {
        let plan = mirror(&MirrorRequest {
            repo: AlpineRepo::Main,
            ..request()
        })
        .unwrap();
        let Layer::Exec { argv, .. } = &plan.layers[0] else {
            panic!("expected exec layer");
        };
        assert!(!argv[0].contains("APKINDEX-main.tar.gz"));
    }

    #[test]
    fn test_empty_package_list_is_fatal() {
        let err = mirror(&MirrorRequest {
            packages: Vec::new(),
            ..request()
        })
        .unwrap_err();
        assert!(matches!(
            err,
            ModuleError::Validation(ValidationError::EmptyPackageList)
        ));
    }

    #[test]
    fn test_archive_roundtrip() {
        let tree = Directory::new()
            .with_file(
                "v3.20/community/x86_64/curl-8.7.1-r0.apk",
                File::new("curl-8.7.1-r0.apk", vec![1, 2, 3]),
            )
            .with_file("SUMMARY.txt", File::new("SUMMARY.txt", "Repository: community\n"));

        let archived = archive(&tree).unwrap();
        assert_eq!(archived.name, "apk-mirror.zip");

        let mut reader = zip::ZipArchive::new(Cursor::new(archived.contents)).unwrap();
        let names: Vec<String> = (0..reader.len())
            .map(|i| reader.by_index(i).unwrap().name().to_string())
            .collect();
        assert!(names.contains(&"SUMMARY.txt".to_string()));
        assert!(names.contains(&"v3.20/community/x86_64/curl-8.7.1-r0.apk".to_string()));
    }
}
