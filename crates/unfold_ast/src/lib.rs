pub mod build;
pub mod nodes;
pub mod printer;
pub mod walk;

pub use nodes::*;
pub use printer::render_statements;
pub use walk::{Visitor, VisitorMut, Walk};
