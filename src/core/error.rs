//! Build error taxonomy.
//!
//! | Error                      | Fatal in production | In development                |
//! |----------------------------|---------------------|-------------------------------|
//! | [`RuleMatchAmbiguity`]     | no (logged)         | logged                        |
//! | [`TransformError`]         | yes                 | module kept stale, reported   |
//! | [`ResolutionError`]        | yes                 | pass rejected, reported       |
//! | [`EmissionError`]          | yes                 | pass rejected, reported       |
//! | [`ManifestConsistencyError`] | yes               | pass rejected, reported       |

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use super::ModuleId;

/// A file matched more than one rule. Every match still applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMatchAmbiguity {
    pub file: ModuleId,
    /// Matched rule indices, in declaration order
    pub rules: Vec<usize>,
}

impl fmt::Display for RuleMatchAmbiguity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rules: Vec<String> = self.rules.iter().map(|i| format!("rule[{i}]")).collect();
        write!(f, "{} matches {}", self.file, rules.join(", "))
    }
}

/// A transform stage failed; the chain was aborted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{stage} stage failed on {}: {cause}", file.display())]
pub struct TransformError {
    pub file: PathBuf,
    pub stage: String,
    pub cause: String,
}

/// A reference resolved to no file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot resolve '{reference}' from {from_module}")]
pub struct ResolutionError {
    pub from_module: ModuleId,
    pub reference: String,
}

/// Writing the output directory failed.
#[derive(Debug, Error)]
pub enum EmissionError {
    #[error("failed to write `{}`", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("write phase timed out after {0:?}")]
    Timeout(Duration),

    #[error("write phase worker crashed")]
    Crashed,
}

/// The manifest cannot be made consistent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManifestConsistencyError {
    #[error("`{0}` is not in the manifest")]
    MissingName(String),

    #[error("`{path}` is produced by both `{first}` and `{second}`")]
    DuplicatePath {
        path: String,
        first: String,
        second: String,
    },

    #[error("{file} matched rules that both emit it ({first} and {second})")]
    DoubleEmission {
        file: ModuleId,
        first: String,
        second: String,
    },
}

/// Any error that can fail a build pass.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Emission(#[from] EmissionError),

    #[error(transparent)]
    Manifest(#[from] ManifestConsistencyError),
}

impl BuildError {
    /// Short label of the file the error is about, for status lines and
    /// client overlays.
    pub fn subject(&self) -> String {
        match self {
            Self::Transform(e) => e.file.display().to_string(),
            Self::Resolution(e) => e.from_module.to_string(),
            Self::Emission(EmissionError::Io { path, .. }) => path.display().to_string(),
            Self::Emission(_) => "output".to_string(),
            Self::Manifest(ManifestConsistencyError::DoubleEmission { file, .. }) => {
                file.to_string()
            }
            Self::Manifest(_) => "manifest".to_string(),
        }
    }
}

/// Every error of a failed pass.
#[derive(Debug)]
pub struct BuildFailure(pub Vec<BuildError>);

impl BuildFailure {
    pub fn errors(&self) -> &[BuildError] {
        &self.0
    }
}

impl From<BuildError> for BuildFailure {
    fn from(err: BuildError) -> Self {
        Self(vec![err])
    }
}

impl fmt::Display for BuildFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_slice() {
            [] => write!(f, "build failed"),
            [only] => write!(f, "build failed: {only}"),
            many => {
                write!(f, "build failed with {} errors:", many.len())?;
                for err in many {
                    write!(f, "\n  - {err}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for BuildFailure {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_error_display() {
        let err = ResolutionError {
            from_module: ModuleId::new("src/index.js"),
            reference: "./missing".into(),
        };
        assert_eq!(err.to_string(), "cannot resolve './missing' from src/index.js");
    }

    #[test]
    fn test_transform_error_names_stage() {
        let err = BuildError::from(TransformError {
            file: PathBuf::from("src/a.scss"),
            stage: "style".into(),
            cause: "unclosed block".into(),
        });
        let text = err.to_string();
        assert!(text.contains("style"));
        assert!(text.contains("src/a.scss"));
        assert_eq!(err.subject(), "src/a.scss");
    }

    #[test]
    fn test_failure_lists_every_error() {
        let failure = BuildFailure(vec![
            ResolutionError {
                from_module: ModuleId::new("a.js"),
                reference: "./x".into(),
            }
            .into(),
            ManifestConsistencyError::MissingName("main.js".into()).into(),
        ]);
        let text = failure.to_string();
        assert!(text.starts_with("build failed with 2 errors"));
        assert!(text.contains("./x"));
        assert!(text.contains("main.js"));
    }

    #[test]
    fn test_ambiguity_display() {
        let ambiguity = RuleMatchAmbiguity {
            file: ModuleId::new("src/partial.html"),
            rules: vec![2, 3],
        };
        assert_eq!(ambiguity.to_string(), "src/partial.html matches rule[2], rule[3]");
    }
}
