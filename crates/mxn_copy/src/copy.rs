//! Asset copy orchestration: rule fan-out and the file/directory copy engine.

use std::ffi::OsString;
use std::fs::{self, File, Metadata};
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use tempfile::NamedTempFile;

use crate::report::{
    EnumAssetOutcome, ReportCopy, ReportCopyBuilder, SpecAssetResult, SpecCopyStats,
};
use crate::spec::{CopyAssetError, SpecAssetRule, SpecCopyEnv, SpecCopyOptions};
use crate::util::{calculate_worker_limit, resolve_asset_paths};

/// Run every configured rule and wait until all of them settle.
///
/// Rules are dispatched on a rayon pool sized by `num_workers_max`; a rule's
/// failure is logged and recorded in the report, never propagated. Sibling
/// entries of a copied directory share the same pool.
pub fn copy_assets(spec_cp_options: &SpecCopyOptions, spec_cp_env: &SpecCopyEnv) -> ReportCopy {
    let mut builder_cp_report = ReportCopyBuilder::default();
    if spec_cp_options.copy.is_empty() {
        return builder_cp_report.build();
    }

    let n_workers_max = calculate_worker_limit(spec_cp_options.num_workers_max);
    let run_serial = || {
        spec_cp_options
            .copy
            .iter()
            .map(|spec_rule| copy_asset(spec_rule, spec_cp_options, spec_cp_env, false))
            .collect::<Vec<_>>()
    };

    let l_results = if n_workers_max <= 1 {
        run_serial()
    } else {
        match ThreadPoolBuilder::new().num_threads(n_workers_max).build() {
            Ok(thread_pool) => thread_pool.install(|| {
                spec_cp_options
                    .copy
                    .par_iter()
                    .map(|spec_rule| copy_asset(spec_rule, spec_cp_options, spec_cp_env, true))
                    .collect::<Vec<_>>()
            }),
            Err(e) => {
                let warning = format!(
                    "Failed to initialize thread pool (workers={n_workers_max}); fallback to serial copy. ({e})"
                );
                warn!("{warning}");
                builder_cp_report.add_warning(warning);
                run_serial()
            }
        }
    };

    for spec_result in l_results {
        builder_cp_report.add_asset(spec_result);
    }
    builder_cp_report.build()
}

/// Process one rule: validate, resolve, classify and copy.
///
/// `if_parallel` lets directory siblings run on the current rayon pool.
pub fn copy_asset(
    spec_rule: &SpecAssetRule,
    spec_cp_options: &SpecCopyOptions,
    spec_cp_env: &SpecCopyEnv,
    if_parallel: bool,
) -> SpecAssetResult {
    let spec_resolved =
        match resolve_asset_paths(spec_rule, spec_cp_env, spec_cp_options.restrictive) {
            Ok(v) => v,
            Err(e) => return settle_failure(spec_rule, None, None, &e),
        };

    match copy_path(&spec_resolved.path_from, &spec_resolved.path_to, if_parallel) {
        Ok(stats) => {
            if spec_cp_options.verbose && stats.cnt_files + stats.cnt_dirs > 0 {
                info!(
                    "Copying asset from {:?} to {:?}",
                    spec_resolved.path_from.display().to_string(),
                    spec_resolved.path_to.display().to_string()
                );
            }
            SpecAssetResult {
                rule: spec_rule.clone(),
                path_from: Some(spec_resolved.path_from),
                path_to: Some(spec_resolved.path_to),
                outcome: EnumAssetOutcome::Done(stats),
            }
        }
        Err(e) => settle_failure(
            spec_rule,
            Some(spec_resolved.path_from),
            Some(spec_resolved.path_to),
            &e,
        ),
    }
}

fn settle_failure(
    spec_rule: &SpecAssetRule,
    path_from: Option<PathBuf>,
    path_to: Option<PathBuf>,
    error: &CopyAssetError,
) -> SpecAssetResult {
    let spec_result = SpecAssetResult {
        rule: spec_rule.clone(),
        path_from,
        path_to,
        outcome: EnumAssetOutcome::from_error(error),
    };
    if let Some(warning) = spec_result.warning() {
        warn!("{warning}");
    }
    spec_result
}

/// Copy an absolute source onto an absolute destination.
///
/// The source is classified with link-stat semantics: a symlink is neither a
/// file nor a directory and is skipped without being followed.
pub fn copy_path(
    path_src: &Path,
    path_dst: &Path,
    if_parallel: bool,
) -> Result<SpecCopyStats, CopyAssetError> {
    let meta_src = fs::symlink_metadata(path_src).map_err(|e| CopyAssetError::SourceMissing {
        path: path_src.to_path_buf(),
        source: e,
    })?;
    let file_type = meta_src.file_type();

    if file_type.is_file() {
        copy_file_atomic(path_src, path_dst, &meta_src)
            .map_err(|e| CopyAssetError::copy_failed(path_dst, e))?;
        return Ok(SpecCopyStats {
            cnt_files: 1,
            ..SpecCopyStats::default()
        });
    }
    if file_type.is_dir() {
        return copy_dir_recursive(path_src, path_dst, if_parallel);
    }

    debug!("Special source skipped: {}", path_src.display());
    Ok(SpecCopyStats {
        cnt_skipped: 1,
        ..SpecCopyStats::default()
    })
}

fn _parent_or_cwd(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

/// Destination a write to `path_dst` lands on: the link target when
/// `path_dst` is a symlink, `path_dst` itself otherwise.
///
/// A dangling link resolves to its (not yet existing) target.
fn resolve_destination_link(path_dst: &Path) -> io::Result<PathBuf> {
    match fs::symlink_metadata(path_dst) {
        Ok(meta) if meta.file_type().is_symlink() => match fs::canonicalize(path_dst) {
            Ok(path_target) => Ok(path_target),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Ok(_parent_or_cwd(path_dst).join(fs::read_link(path_dst)?))
            }
            Err(e) => Err(e),
        },
        _ => Ok(path_dst.to_path_buf()),
    }
}

/// Stream `path_src` into a temporary sibling of the destination, then rename over it.
///
/// Missing parent directories are created. A destination symlink is written
/// through, so the link stays and its target receives the bytes. The
/// temporary file is removed on every error path when it is dropped.
fn copy_file_atomic(path_src: &Path, path_dst: &Path, meta_src: &Metadata) -> io::Result<()> {
    fs::create_dir_all(_parent_or_cwd(path_dst))?;
    let path_target = resolve_destination_link(path_dst)?;
    let path_parent_target = _parent_or_cwd(&path_target);
    fs::create_dir_all(path_parent_target)?;

    let mut file_src = File::open(path_src)?;
    let mut file_tmp = NamedTempFile::new_in(path_parent_target)?;
    io::copy(&mut file_src, file_tmp.as_file_mut())?;
    file_tmp.as_file().set_permissions(meta_src.permissions())?;
    file_tmp.persist(&path_target).map_err(|e| e.error)?;
    Ok(())
}

/// Collect entry names; the directory handle is released before returning.
fn list_dir_entries(path_dir: &Path) -> io::Result<Vec<OsString>> {
    let mut l_names = Vec::new();
    for entry in fs::read_dir(path_dir)? {
        l_names.push(entry?.file_name());
    }
    Ok(l_names)
}

/// Merge the contents of `path_dir_src` into `path_dir_dst`.
///
/// The destination is created when missing and reused as-is otherwise; stale
/// files are never removed. All siblings settle before the first error, if
/// any, is returned.
fn copy_dir_recursive(
    path_dir_src: &Path,
    path_dir_dst: &Path,
    if_parallel: bool,
) -> Result<SpecCopyStats, CopyAssetError> {
    fs::create_dir_all(path_dir_dst).map_err(|e| CopyAssetError::copy_failed(path_dir_dst, e))?;
    let l_names =
        list_dir_entries(path_dir_src).map_err(|e| CopyAssetError::copy_failed(path_dir_src, e))?;

    let copy_entry = |name: &OsString| -> Result<SpecCopyStats, CopyAssetError> {
        let path_entry_src = path_dir_src.join(name);
        let path_entry_dst = path_dir_dst.join(name);
        let meta_entry = fs::symlink_metadata(&path_entry_src)
            .map_err(|e| CopyAssetError::copy_failed(&path_entry_src, e))?;
        let file_type = meta_entry.file_type();

        if file_type.is_dir() {
            return copy_dir_recursive(&path_entry_src, &path_entry_dst, if_parallel);
        }
        if file_type.is_file() {
            copy_file_atomic(&path_entry_src, &path_entry_dst, &meta_entry)
                .map_err(|e| CopyAssetError::copy_failed(&path_entry_dst, e))?;
            return Ok(SpecCopyStats {
                cnt_files: 1,
                ..SpecCopyStats::default()
            });
        }

        debug!("Special file skipped: {}", path_entry_src.display());
        Ok(SpecCopyStats {
            cnt_skipped: 1,
            ..SpecCopyStats::default()
        })
    };

    let l_results: Vec<Result<SpecCopyStats, CopyAssetError>> = if if_parallel {
        l_names.par_iter().map(copy_entry).collect()
    } else {
        l_names.iter().map(copy_entry).collect()
    };

    let mut stats = SpecCopyStats {
        cnt_dirs: 1,
        ..SpecCopyStats::default()
    };
    let mut err_first = None;
    for res_entry in l_results {
        match res_entry {
            Ok(stats_entry) => stats += stats_entry,
            Err(e) => {
                if err_first.is_none() {
                    err_first = Some(e);
                }
            }
        }
    }
    match err_first {
        Some(e) => Err(e),
        None => Ok(stats),
    }
}
