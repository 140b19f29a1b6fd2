pub mod errors;
pub mod logging;

pub use errors::{Diagnostic, DiagnosticSeverity};
