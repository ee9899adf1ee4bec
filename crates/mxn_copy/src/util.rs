use std::path::{Component, Path, PathBuf};

use crate::spec::{CopyAssetError, SpecAssetRule, SpecBoundaryContext, SpecCopyEnv};

////////////////////////////////////////////////////////////////////////////////
// #region PathValidator

const C_MSG_SOURCE_OUTSIDE: &str = "Assets to copy should reside within the input directory";
const C_MSG_DESTINATION_OUTSIDE: &str =
    "Resulting copies should reside within the output directory";
const C_MSG_BOUNDARY_MISSING: &str =
    "Restrictive mode is enabled but the boundary roots are not configured";

/// Absolute source/destination pair of one rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SpecResolvedAsset {
    pub(crate) path_from: PathBuf,
    pub(crate) path_to: PathBuf,
}

/// Append `basename(from)` when `to` ends with `/` or `\`.
///
/// A `from` without a final name component (`/`, `..`) leaves `to` unchanged.
pub(crate) fn expand_destination(from: &str, to: &str) -> String {
    if !(to.ends_with('/') || to.ends_with('\\')) {
        return to.to_string();
    }
    match Path::new(from).file_name() {
        Some(name_from) => format!("{to}{}", name_from.to_string_lossy()),
        None => to.to_string(),
    }
}

/// Fold `.` and `..` without touching the filesystem.
///
/// `..` at the root stays at the root.
fn _normalize_lexical(path: &Path) -> PathBuf {
    let mut path_out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let b_at_root = matches!(
                    path_out.components().next_back(),
                    None | Some(Component::RootDir) | Some(Component::Prefix(_))
                );
                if b_at_root && path_out.has_root() {
                    continue;
                }
                if b_at_root || path_out.ends_with("..") {
                    path_out.push("..");
                } else {
                    path_out.pop();
                }
            }
            other => path_out.push(other.as_os_str()),
        }
    }
    path_out
}

/// Resolve `path` against `dir_working` and normalize lexically.
pub(crate) fn resolve_path(dir_working: &Path, path: &Path) -> PathBuf {
    _normalize_lexical(&dir_working.join(path))
}

/// Path of `path_abs` relative to `path_root_abs`, or `None` when it escapes the root.
fn _relative_within(path_abs: &Path, path_root_abs: &Path) -> Option<PathBuf> {
    path_abs
        .strip_prefix(path_root_abs)
        .ok()
        .map(Path::to_path_buf)
}

/// Check both paths against the boundary and re-ground them on the roots.
pub(crate) fn validate_boundary(
    spec_resolved: SpecResolvedAsset,
    spec_boundary: &SpecBoundaryContext,
    dir_working: &Path,
) -> Result<SpecResolvedAsset, CopyAssetError> {
    let path_dir_source = resolve_path(dir_working, &spec_boundary.dir_source);
    let path_dir_destination = resolve_path(dir_working, &spec_boundary.dir_destination);

    let path_from_rel = _relative_within(&spec_resolved.path_from, &path_dir_source).ok_or_else(
        || CopyAssetError::BoundaryViolation {
            message: C_MSG_SOURCE_OUTSIDE.to_string(),
        },
    )?;
    let path_to_rel = _relative_within(&spec_resolved.path_to, &path_dir_destination)
        .ok_or_else(|| CopyAssetError::BoundaryViolation {
            message: C_MSG_DESTINATION_OUTSIDE.to_string(),
        })?;

    Ok(SpecResolvedAsset {
        path_from: path_dir_source.join(path_from_rel),
        path_to: path_dir_destination.join(path_to_rel),
    })
}

/// Normalize a rule into absolute paths, enforcing the boundary when `if_restrictive`.
pub(crate) fn resolve_asset_paths(
    spec_rule: &SpecAssetRule,
    spec_cp_env: &SpecCopyEnv,
    if_restrictive: bool,
) -> Result<SpecResolvedAsset, CopyAssetError> {
    let c_to = expand_destination(&spec_rule.from, &spec_rule.to);
    let spec_resolved = SpecResolvedAsset {
        path_from: resolve_path(&spec_cp_env.dir_working, Path::new(&spec_rule.from)),
        path_to: resolve_path(&spec_cp_env.dir_working, Path::new(&c_to)),
    };
    if !if_restrictive {
        return Ok(spec_resolved);
    }

    let spec_boundary =
        spec_cp_env
            .boundary
            .as_ref()
            .ok_or_else(|| CopyAssetError::BoundaryViolation {
                message: C_MSG_BOUNDARY_MISSING.to_string(),
            })?;
    validate_boundary(spec_resolved, spec_boundary, &spec_cp_env.dir_working)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Workers

pub(crate) fn calculate_worker_limit(num_workers_max: Option<usize>) -> usize {
    let n_cpu = std::thread::available_parallelism()
        .map(|v| v.get())
        .unwrap_or(1);

    match num_workers_max {
        Some(n) => n.clamp(1, n_cpu),
        None => n_cpu.clamp(1, 8),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
