//! Inline expansion of call sites in a tree-shaped IR.
//!
//! [`Inliner::inline_program`] replaces every call marked inline with a
//! renamed copy of the callee's body. Returns become assignments to a result
//! variable plus breaks out of a labelled block, and closure or mapping
//! classes instantiated inside an expansion are copied per call site when
//! their identity must not be shared.

pub mod capture;
pub mod config;
pub mod dead_tail;
pub mod error;
pub mod expander;
pub mod inliner;
pub mod lookup;
pub mod naming;
pub mod regenerate;
pub mod returns;
pub mod side_effects;

pub use config::InlineConfig;
pub use error::{InlineError, Result};
pub use expander::{CallSiteExpander, ExpansionSummary, InlineResult};
pub use inliner::{InlineOutput, InlineStats, Inliner};
pub use lookup::{BodyLookup, DeclarationTable};
pub use naming::{NameAllocator, NamingContext};
pub use regenerate::{
    AnonymousObjectRegeneration, ClassNameGenerator, RegeneratedKind, RegenerationInfo,
    RegenerationRecord, RegenerationRegistry, WhenMappingRegeneration,
};
pub use returns::{BlockInfo, BlockInfos};
pub use side_effects::{can_have_side_effect, is_stable};
