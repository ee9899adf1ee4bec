//! Asset rule models, copy options and top-level error types.

use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

////////////////////////////////////////////////////////////////////////////////
// #region RulesAndOptions

/// One configured `{from, to}` copy directive.
///
/// Paths are kept as raw strings: a trailing `/` or `\` on `to` is
/// significant and would be lost by `PathBuf`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecAssetRule {
    /// Source file or directory.
    pub from: String,
    /// Destination path. A trailing separator means "into this directory".
    pub to: String,
}

impl SpecAssetRule {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// User-facing plugin options.
///
/// Built once at setup and shared read-only with the build-completion hook.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpecCopyOptions {
    /// Rules executed after each build pass.
    pub copy: Vec<SpecAssetRule>,
    /// Log one line per successful copy.
    pub verbose: bool,
    /// Confine sources to the input directory and copies to the output directory.
    pub restrictive: bool,
    /// Maximum worker threads for the rule fan-out.
    pub num_workers_max: Option<usize>,
}

impl SpecCopyOptions {
    /// Parse options from a JSON object. Unknown keys are ignored.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Same as [`SpecCopyOptions::from_json_str`] for an already parsed value.
    pub fn from_json_value(value: serde_json::Value) -> Result<Self, ConfigError> {
        Ok(serde_json::from_value(value)?)
    }
}

/// Root directories assets must stay within in restrictive mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecBoundaryContext {
    /// Input root; every `from` must resolve inside it.
    pub dir_source: PathBuf,
    /// Output root; every `to` must resolve inside it.
    pub dir_destination: PathBuf,
}

/// Per-build environment the rules are resolved in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecCopyEnv {
    /// Directory relative rule paths are resolved against.
    pub dir_working: PathBuf,
    /// Boundary roots, required when restrictive mode is on.
    pub boundary: Option<SpecBoundaryContext>,
}

impl SpecCopyEnv {
    /// Environment rooted at the process working directory, without boundary.
    pub fn from_current_dir() -> Self {
        Self {
            dir_working: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            boundary: None,
        }
    }

    pub fn with_boundary(mut self, spec_boundary: SpecBoundaryContext) -> Self {
        self.boundary = Some(spec_boundary);
        self
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Errors

/// Error category of a rule that did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumAssetErrorKind {
    /// Restrictive mode: a path escapes its boundary root.
    BoundaryViolation,
    /// Source does not exist or cannot be inspected.
    SourceMissing,
    /// Read/write error while copying.
    CopyFailed,
}

/// Failure of a single asset rule. Never escapes the rule boundary.
#[derive(Debug, Error)]
pub enum CopyAssetError {
    #[error("{message}")]
    BoundaryViolation { message: String },

    #[error("{}: {source}", .path.display())]
    SourceMissing {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{}: {source}", .path.display())]
    CopyFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl CopyAssetError {
    pub fn kind(&self) -> EnumAssetErrorKind {
        match self {
            Self::BoundaryViolation { .. } => EnumAssetErrorKind::BoundaryViolation,
            Self::SourceMissing { .. } => EnumAssetErrorKind::SourceMissing,
            Self::CopyFailed { .. } => EnumAssetErrorKind::CopyFailed,
        }
    }

    /// Boundary violations and missing sources skip the rule; copy errors fail it.
    pub fn is_skip(&self) -> bool {
        !matches!(self, Self::CopyFailed { .. })
    }

    pub(crate) fn copy_failed(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::CopyFailed {
            path: path.into(),
            source,
        }
    }
}

/// Malformed plugin options.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid mxn-copy options: {0}")]
    Json(#[from] serde_json::Error),
}

/// Plugin setup failures, raised before any build pass runs.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("restrictive mode requires {0}")]
    MissingBoundaryRoot(&'static str),
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{
        ConfigError, CopyAssetError, EnumAssetErrorKind, SpecAssetRule, SpecCopyEnv,
        SpecCopyOptions,
    };

    #[test]
    fn options_default_when_empty_object() {
        let spec_cp_options = SpecCopyOptions::from_json_str("{}").expect("parse options");
        assert!(spec_cp_options.copy.is_empty());
        assert!(!spec_cp_options.verbose);
        assert!(!spec_cp_options.restrictive);
        assert_eq!(spec_cp_options.num_workers_max, None);
    }

    #[test]
    fn options_parse_rules_and_flags() {
        let raw = r#"{
            "copy": [
                {"from": "assets/logo.png", "to": "dist/"},
                {"from": "static", "to": "dist/static"}
            ],
            "verbose": true,
            "restrictive": true,
            "numWorkersMax": 2,
            "somethingElse": 1
        }"#;
        let spec_cp_options = SpecCopyOptions::from_json_str(raw).expect("parse options");
        assert_eq!(
            spec_cp_options.copy,
            vec![
                SpecAssetRule::new("assets/logo.png", "dist/"),
                SpecAssetRule::new("static", "dist/static"),
            ]
        );
        assert!(spec_cp_options.verbose);
        assert!(spec_cp_options.restrictive);
        assert_eq!(spec_cp_options.num_workers_max, Some(2));
    }

    #[test]
    fn options_reject_rule_without_destination() {
        let err = SpecCopyOptions::from_json_value(serde_json::json!({
            "copy": [{"from": "assets"}]
        }))
        .expect_err("missing `to` must fail");
        assert!(matches!(err, ConfigError::Json(_)));
        assert!(err.to_string().starts_with("invalid mxn-copy options"));
    }

    #[test]
    fn env_from_current_dir_has_no_boundary() {
        let spec_cp_env = SpecCopyEnv::from_current_dir();
        assert_eq!(
            spec_cp_env.dir_working,
            std::env::current_dir().expect("current dir")
        );
        assert!(spec_cp_env.boundary.is_none());
    }

    #[test]
    fn error_kind_and_skip_classification() {
        let err_boundary = CopyAssetError::BoundaryViolation {
            message: "outside".to_string(),
        };
        assert_eq!(err_boundary.kind(), EnumAssetErrorKind::BoundaryViolation);
        assert!(err_boundary.is_skip());

        let err_copy = CopyAssetError::copy_failed(
            "dist/a.txt",
            std::io::Error::other("disk full"),
        );
        assert_eq!(err_copy.kind(), EnumAssetErrorKind::CopyFailed);
        assert!(!err_copy.is_skip());
        assert_eq!(err_copy.to_string(), "dist/a.txt: disk full");
    }
}
