//! `unfold`: inline expansion for tree-shaped compiler IRs.
//!
//! The member crates do the work; this crate wires configuration, logging,
//! the inline pass and the regeneration report together for hosts that want
//! a single entry point.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

pub use unfold_ast as ast;
pub use unfold_inline as inline;
pub use unfold_span as span;
pub use unfold_utils as utils;

use unfold_ast::Program;
use unfold_inline::{BodyLookup, InlineConfig, InlineOutput, Inliner, RegenerationRegistry};
use unfold_utils::errors::emit_diagnostics;

/// Install the global `tracing` subscriber (`UNFOLD_LOG`, then `RUST_LOG`).
pub fn init_logging() -> bool {
    unfold_utils::logging::init()
}

/// Read an [`InlineConfig`] from a JSON file.
pub fn load_config(path: &Path) -> Result<InlineConfig> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("failed to read inline config {}", path.display()))?;
    InlineConfig::from_json(&source)
        .with_context(|| format!("invalid inline config {}", path.display()))
}

/// Write the regeneration report of one run as pretty JSON.
pub fn write_registry(registry: &RegenerationRegistry, path: &Path) -> Result<()> {
    let json = registry
        .to_json()
        .context("failed to serialize regeneration registry")?;
    fs::write(path, json)
        .with_context(|| format!("failed to write regeneration registry {}", path.display()))
}

/// Configured inline pass plus where its side outputs go.
pub struct Pipeline {
    inliner: Inliner,
    registry_path: Option<PathBuf>,
}

impl Pipeline {
    pub fn new(config: InlineConfig) -> Self {
        Self {
            inliner: Inliner::with_config(config),
            registry_path: None,
        }
    }

    /// Configuration from `UNFOLD_CONFIG` when set, otherwise from the
    /// `UNFOLD_*` switches read by [`InlineConfig::from_env`].
    pub fn from_env() -> Result<Self> {
        let config = match std::env::var_os("UNFOLD_CONFIG") {
            Some(path) => load_config(Path::new(&path))?,
            None => InlineConfig::from_env(),
        };
        Ok(Self::new(config))
    }

    /// Also write the regeneration report to `path` after every run.
    pub fn with_registry_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.registry_path = Some(path.into());
        self
    }

    pub fn config(&self) -> &InlineConfig {
        self.inliner.config()
    }

    /// Inline `program`, forward its diagnostics to the log and write the
    /// regeneration report if one was requested.
    pub fn run(&self, program: &Program, lookup: &dyn BodyLookup) -> Result<InlineOutput> {
        debug!(module = %program.module, config = ?self.config(), "running inline pass");
        let output = self.inliner.inline_program(program, lookup);
        emit_diagnostics(&output.diagnostics);

        if let Some(path) = &self.registry_path {
            write_registry(&output.registry, path)?;
        }

        info!(
            module = %program.module,
            applied = output.stats.applied,
            skipped = output.stats.attempted.saturating_sub(output.stats.applied),
            regenerated = output.stats.regenerated,
            diagnostics = output.diagnostics.len(),
            "inlined"
        );
        Ok(output)
    }
}
