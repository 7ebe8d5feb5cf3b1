//! Compiler-supplied summary of one build.

use serde::{Deserialize, Serialize};

/// Summary of the most recent build, as reported by the compiler.
///
/// The server never builds one of these itself. It is handed over with the
/// `done` lifecycle event and kept only until the next `done` replaces it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Hash identifying the whole build output
    pub hash: String,
    /// Build duration in milliseconds
    pub time_ms: u64,
    /// Human-readable error descriptions
    pub errors: Vec<String>,
    /// Human-readable warning descriptions
    pub warnings: Vec<String>,
    /// Every module in the output, with its content hash
    pub modules: Vec<ModuleStat>,
    /// Emitted assets
    pub assets: Vec<AssetStat>,
}

/// One module of the build output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleStat {
    /// Module identifier (URL path of the emitted file)
    pub id: String,
    /// Content hash
    pub hash: String,
    /// Whether the content differs from the previous build
    pub changed: bool,
}

/// One emitted asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetStat {
    /// Asset name relative to the output root
    pub name: String,
    /// Size in bytes
    pub size: u64,
}

impl StatsSnapshot {
    /// Check if the build reported errors.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Check if the build reported warnings.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Errors or warnings make a build "have issues".
    pub fn has_issues(&self) -> bool {
        self.has_errors() || self.has_warnings()
    }

    /// Modules whose content changed since the previous build.
    pub fn changed_modules(&self) -> impl Iterator<Item = &ModuleStat> {
        self.modules.iter().filter(|module| module.changed)
    }
}
