//! Per-rule outcomes and the aggregate report of one build-completion pass.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::AddAssign;
use std::path::PathBuf;

use crate::spec::{CopyAssetError, EnumAssetErrorKind, SpecAssetRule};

/// Entry counters for one copied rule.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SpecCopyStats {
    /// Regular files written.
    pub cnt_files: u64,
    /// Destination directories created or reused.
    pub cnt_dirs: u64,
    /// Entries that are neither file nor directory (symlinks, devices, ...).
    pub cnt_skipped: u64,
}

impl AddAssign for SpecCopyStats {
    fn add_assign(&mut self, other: Self) {
        self.cnt_files += other.cnt_files;
        self.cnt_dirs += other.cnt_dirs;
        self.cnt_skipped += other.cnt_skipped;
    }
}

/// Terminal state of one rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumAssetOutcome {
    /// Copy completed.
    Done(SpecCopyStats),
    /// Rule was not attempted (boundary violation or missing source).
    Skipped {
        kind: EnumAssetErrorKind,
        message: String,
    },
    /// Copy started and hit a read/write error.
    Failed {
        kind: EnumAssetErrorKind,
        message: String,
    },
}

impl EnumAssetOutcome {
    pub(crate) fn from_error(error: &CopyAssetError) -> Self {
        let kind = error.kind();
        let message = error.to_string();
        if error.is_skip() {
            Self::Skipped { kind, message }
        } else {
            Self::Failed { kind, message }
        }
    }
}

/// Result of processing one rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecAssetResult {
    /// Rule as configured (pre-normalization).
    pub rule: SpecAssetRule,
    /// Absolute source path, once resolved.
    pub path_from: Option<PathBuf>,
    /// Absolute destination path, once resolved.
    pub path_to: Option<PathBuf>,
    pub outcome: EnumAssetOutcome,
}

impl SpecAssetResult {
    /// Warning line for a rule that did not complete, naming the configured `from`.
    pub fn warning(&self) -> Option<String> {
        match &self.outcome {
            EnumAssetOutcome::Done(_) => None,
            EnumAssetOutcome::Skipped {
                kind: EnumAssetErrorKind::SourceMissing,
                message,
            } => Some(format!(
                "Asset {} does not exist. {message}",
                self.rule.from
            )),
            EnumAssetOutcome::Skipped { message, .. } | EnumAssetOutcome::Failed { message, .. } => {
                Some(format!(
                    "Could not copy {} because of an error: {message}",
                    self.rule.from
                ))
            }
        }
    }
}

/// Aggregate counters and diagnostics for one build-completion pass.
#[derive(Debug, Default, Clone)]
pub struct ReportCopy {
    /// Rules that completed.
    pub cnt_done: u64,
    /// Rules skipped (boundary violation, missing source).
    pub cnt_skipped: u64,
    /// Rules that failed while copying.
    pub cnt_failed: u64,
    /// Entry counters summed over completed rules.
    pub stats: SpecCopyStats,
    /// Warning lines, one per rule that did not complete plus engine notices.
    pub warnings: Vec<String>,
    /// Per-rule results in configuration order.
    pub assets: Vec<SpecAssetResult>,
}

impl ReportCopy {
    /// Number of rules that were skipped or failed.
    pub fn error_count(&self) -> usize {
        (self.cnt_skipped + self.cnt_failed) as usize
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    /// Machine-readable counters.
    pub fn to_dict(&self) -> BTreeMap<String, u64> {
        let mut dict_counts = BTreeMap::new();
        dict_counts.insert("cnt_rules".to_string(), self.assets.len() as u64);
        dict_counts.insert("cnt_done".to_string(), self.cnt_done);
        dict_counts.insert("cnt_skipped".to_string(), self.cnt_skipped);
        dict_counts.insert("cnt_failed".to_string(), self.cnt_failed);
        dict_counts.insert("cnt_files".to_string(), self.stats.cnt_files);
        dict_counts.insert("cnt_dirs".to_string(), self.stats.cnt_dirs);
        dict_counts.insert("cnt_warnings".to_string(), self.warning_count() as u64);
        dict_counts
    }

    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        let dict_counts = self.to_dict();
        format!(
            "{prefix} rules={} done={} skipped={} failed={} files={} dirs={} warnings={}",
            dict_counts["cnt_rules"],
            dict_counts["cnt_done"],
            dict_counts["cnt_skipped"],
            dict_counts["cnt_failed"],
            dict_counts["cnt_files"],
            dict_counts["cnt_dirs"],
            dict_counts["cnt_warnings"]
        )
    }
}

impl fmt::Display for ReportCopy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[mxn-copy]"))
    }
}

/// Accumulator filled after the fan-in.
#[derive(Debug, Default, Clone)]
pub struct ReportCopyBuilder {
    report: ReportCopy,
}

impl ReportCopyBuilder {
    /// Record one settled rule and its warning, if any.
    pub fn add_asset(&mut self, spec_result: SpecAssetResult) {
        match &spec_result.outcome {
            EnumAssetOutcome::Done(stats) => {
                self.report.cnt_done += 1;
                self.report.stats += *stats;
            }
            EnumAssetOutcome::Skipped { .. } => self.report.cnt_skipped += 1,
            EnumAssetOutcome::Failed { .. } => self.report.cnt_failed += 1,
        }
        if let Some(warning) = spec_result.warning() {
            self.report.warnings.push(warning);
        }
        self.report.assets.push(spec_result);
    }

    pub fn add_warning(&mut self, warning: String) {
        self.report.warnings.push(warning);
    }

    pub fn build(self) -> ReportCopy {
        self.report
    }
}

#[cfg(test)]
mod tests {
    use super::{EnumAssetOutcome, ReportCopyBuilder, SpecAssetResult, SpecCopyStats};
    use crate::spec::{EnumAssetErrorKind, SpecAssetRule};

    fn result_with(from: &str, outcome: EnumAssetOutcome) -> SpecAssetResult {
        SpecAssetResult {
            rule: SpecAssetRule::new(from, "dist/"),
            path_from: None,
            path_to: None,
            outcome,
        }
    }

    #[test]
    fn report_counts_and_format() {
        let mut builder = ReportCopyBuilder::default();
        builder.add_asset(result_with(
            "assets",
            EnumAssetOutcome::Done(SpecCopyStats {
                cnt_files: 4,
                cnt_dirs: 2,
                cnt_skipped: 1,
            }),
        ));
        builder.add_asset(result_with(
            "missing.txt",
            EnumAssetOutcome::Skipped {
                kind: EnumAssetErrorKind::SourceMissing,
                message: "gone".to_string(),
            },
        ));
        builder.add_asset(result_with(
            "locked.txt",
            EnumAssetOutcome::Failed {
                kind: EnumAssetErrorKind::CopyFailed,
                message: "denied".to_string(),
            },
        ));
        let report = builder.build();

        let dict_counts = report.to_dict();
        assert_eq!(dict_counts["cnt_rules"], 3);
        assert_eq!(dict_counts["cnt_done"], 1);
        assert_eq!(dict_counts["cnt_skipped"], 1);
        assert_eq!(dict_counts["cnt_failed"], 1);
        assert_eq!(dict_counts["cnt_files"], 4);
        assert_eq!(report.error_count(), 2);
        assert_eq!(
            report.to_string(),
            "[mxn-copy] rules=3 done=1 skipped=1 failed=1 files=4 dirs=2 warnings=2"
        );
        assert_eq!(report.warnings[0], "Asset missing.txt does not exist. gone");
        assert_eq!(
            report.warnings[1],
            "Could not copy locked.txt because of an error: denied"
        );
    }

    #[test]
    fn boundary_skip_uses_generic_warning() {
        let spec_result = result_with(
            "../secret",
            EnumAssetOutcome::Skipped {
                kind: EnumAssetErrorKind::BoundaryViolation,
                message: "outside".to_string(),
            },
        );
        assert_eq!(
            spec_result.warning().as_deref(),
            Some("Could not copy ../secret because of an error: outside")
        );
    }
}
