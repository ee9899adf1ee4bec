//! `mxn_copy` v1:
//! Build-tool extension copying assets into the output tree after each build.
//!
//! Modules:
//! - `plugin` : `mxn-copy` extension object and host build context
//! - `copy`   : rule fan-out and the file/directory copy engine
//! - `spec`   : rules/options/errors
//! - `report` : per-rule outcomes and run-time report model
//! - `util`   : path validation and shared helpers

pub mod copy;
pub mod plugin;
pub mod report;
pub mod spec;
mod util;

pub use copy::{copy_asset, copy_assets, copy_path};
pub use plugin::{
    BuildContext, BuildOptions, BuildPlugin, BuildResult, C_PLUGIN_NAME, EnumEntryPoints,
    MxnCopyPlugin, derive_boundary_context, mxn_copy,
};
pub use report::{
    EnumAssetOutcome, ReportCopy, ReportCopyBuilder, SpecAssetResult, SpecCopyStats,
};
pub use spec::{
    ConfigError, CopyAssetError, EnumAssetErrorKind, SetupError, SpecAssetRule,
    SpecBoundaryContext, SpecCopyEnv, SpecCopyOptions,
};
