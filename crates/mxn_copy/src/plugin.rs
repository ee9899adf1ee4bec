//! Host build-tool wiring: the `mxn-copy` extension object and the slice of the
//! host's plugin protocol it consumes.
//!
//! The host owns the [`BuildContext`]: it hands the initial build options to
//! every plugin's `setup`, collects the build-completion hooks they register
//! and runs them via [`BuildContext::finish`] after each build pass, including
//! rebuilds in watch mode.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::copy::copy_assets;
use crate::report::ReportCopy;
use crate::spec::{ConfigError, SetupError, SpecBoundaryContext, SpecCopyEnv, SpecCopyOptions};

/// Name the extension registers under.
pub const C_PLUGIN_NAME: &str = "mxn-copy";

/// Host entry points: a list of input paths, or output names mapped to inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnumEntryPoints {
    Paths(Vec<PathBuf>),
    /// `{"out": "src/index.js"}`; entries are ordered by output name.
    Named(BTreeMap<String, PathBuf>),
}

impl EnumEntryPoints {
    /// Input path that determines the input directory.
    pub fn first(&self) -> Option<&Path> {
        match self {
            Self::Paths(l_paths) => l_paths.first().map(PathBuf::as_path),
            Self::Named(map_paths) => map_paths.values().next().map(PathBuf::as_path),
        }
    }
}

impl Default for EnumEntryPoints {
    fn default() -> Self {
        Self::Paths(Vec::new())
    }
}

impl From<Vec<PathBuf>> for EnumEntryPoints {
    fn from(l_paths: Vec<PathBuf>) -> Self {
        Self::Paths(l_paths)
    }
}

/// Initial build options as configured on the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BuildOptions {
    /// Entry inputs; the first one determines the input directory.
    pub entry_points: EnumEntryPoints,
    /// Output directory.
    pub outdir: Option<PathBuf>,
    /// Single output file, used when no `outdir` is set.
    pub outfile: Option<PathBuf>,
    /// Directory relative paths are resolved against.
    pub abs_working_dir: Option<PathBuf>,
}

/// Diagnostics of a finished build pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

type FnOnEnd = Box<dyn Fn(&BuildResult) -> ReportCopy + Send + Sync>;

/// Host-side context handed to [`BuildPlugin::setup`].
pub struct BuildContext {
    initial_options: BuildOptions,
    l_hooks_on_end: Vec<FnOnEnd>,
}

impl BuildContext {
    pub fn new(initial_options: BuildOptions) -> Self {
        Self {
            initial_options,
            l_hooks_on_end: Vec::new(),
        }
    }

    pub fn initial_options(&self) -> &BuildOptions {
        &self.initial_options
    }

    /// Register a hook run after every build pass.
    pub fn on_end<F>(&mut self, hook: F)
    where
        F: Fn(&BuildResult) -> ReportCopy + Send + Sync + 'static,
    {
        self.l_hooks_on_end.push(Box::new(hook));
    }

    /// Run all registered hooks in registration order; each one returns only
    /// after its work has settled.
    pub fn finish(&self, build_result: &BuildResult) -> Vec<ReportCopy> {
        self.l_hooks_on_end
            .iter()
            .map(|hook| hook(build_result))
            .collect()
    }

    pub fn hook_count(&self) -> usize {
        self.l_hooks_on_end.len()
    }
}

/// Host extension protocol.
pub trait BuildPlugin {
    fn name(&self) -> &str;

    /// Called once per build setup, before the first pass.
    fn setup(&self, build: &mut BuildContext) -> Result<(), SetupError>;
}

/// Copies configured assets into the output tree after every build pass.
#[derive(Debug, Clone)]
pub struct MxnCopyPlugin {
    spec_cp_options: Arc<SpecCopyOptions>,
}

impl MxnCopyPlugin {
    pub fn new(spec_cp_options: SpecCopyOptions) -> Self {
        Self {
            spec_cp_options: Arc::new(spec_cp_options),
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        SpecCopyOptions::from_json_str(raw).map(Self::new)
    }
}

/// Build the `mxn-copy` extension object.
pub fn mxn_copy(spec_cp_options: SpecCopyOptions) -> MxnCopyPlugin {
    MxnCopyPlugin::new(spec_cp_options)
}

impl BuildPlugin for MxnCopyPlugin {
    fn name(&self) -> &str {
        C_PLUGIN_NAME
    }

    fn setup(&self, build: &mut BuildContext) -> Result<(), SetupError> {
        let build_options = build.initial_options();
        let mut spec_cp_env = match &build_options.abs_working_dir {
            Some(path) => SpecCopyEnv {
                dir_working: path.clone(),
                boundary: None,
            },
            None => SpecCopyEnv::from_current_dir(),
        };

        let boundary = match derive_boundary_context(build_options) {
            Ok(spec_boundary) => Some(spec_boundary),
            Err(e) if self.spec_cp_options.restrictive => return Err(e),
            Err(_) => None,
        };
        debug!(
            "{C_PLUGIN_NAME}: {} rule(s), working dir {}, boundary {:?}",
            self.spec_cp_options.copy.len(),
            spec_cp_env.dir_working.display(),
            boundary
        );

        spec_cp_env.boundary = boundary;
        let spec_cp_env = Arc::new(spec_cp_env);
        let spec_cp_options = Arc::clone(&self.spec_cp_options);
        build.on_end(move |_build_result| copy_assets(&spec_cp_options, &spec_cp_env));
        Ok(())
    }
}

/// Parent directory as the host reports it: `.` for a bare file name.
fn _dirname(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Input root from the first entry point, output root from `outdir` or `outfile`.
pub fn derive_boundary_context(
    build_options: &BuildOptions,
) -> Result<SpecBoundaryContext, SetupError> {
    let path_entry = build_options
        .entry_points
        .first()
        .ok_or(SetupError::MissingBoundaryRoot(
            "an entry point to derive the input directory",
        ))?;
    let dir_destination = match (&build_options.outdir, &build_options.outfile) {
        (Some(outdir), _) => outdir.clone(),
        (None, Some(outfile)) => _dirname(outfile),
        (None, None) => {
            return Err(SetupError::MissingBoundaryRoot(
                "`outdir` or `outfile` to derive the output directory",
            ));
        }
    };

    Ok(SpecBoundaryContext {
        dir_source: _dirname(path_entry),
        dir_destination,
    })
}
