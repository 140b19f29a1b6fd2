//! Pruning of unreachable tails and of unused return scaffolding.

use unfold_ast::walk::{self, Visitor, Walk};
use unfold_ast::{Block, Expr, Node, Statement};

/// Drop every top-level statement after the first top-level return.
///
/// Returns the number of statements removed.
pub fn remove_statements_after_top_return(block: &mut Block) -> usize {
    let Some(idx) = block.statements.iter().position(|stmt| stmt.as_ref().is_return()) else {
        return 0;
    };
    let removed = block.statements.len() - idx - 1;
    block.statements.truncate(idx + 1);
    removed
}

/// Number of `break label` statements in `block`, outside nested functions.
pub fn count_breaks(block: &Block, label: &str) -> usize {
    struct Breaks<'a> {
        label: &'a str,
        count: usize,
    }

    impl Visitor for Breaks<'_> {
        fn visit_statement(&mut self, stmt: &Node<Statement>) -> Walk {
            match stmt.as_ref() {
                Statement::Break(Some(label)) if label == self.label => {
                    self.count += 1;
                    Walk::Skip
                }
                Statement::Function(_) | Statement::Class(_) => Walk::Skip,
                _ => Walk::Descend,
            }
        }

        fn visit_expr(&mut self, expr: &Node<Expr>) -> Walk {
            if matches!(expr.as_ref(), Expr::Function(_)) {
                Walk::Skip
            } else {
                Walk::Descend
            }
        }
    }

    let mut breaks = Breaks { label, count: 0 };
    let _ = walk::walk_block(&mut breaks, block);
    breaks.count
}

/// Breaks to `label` sitting where falling off the end has the same effect.
fn tail_breaks(statements: &[Node<Statement>], label: &str) -> usize {
    let Some(last) = statements.last() else {
        return 0;
    };
    match last.as_ref() {
        Statement::Break(Some(target)) if target == label => 1,
        Statement::If {
            then_block,
            else_block,
            ..
        } => {
            tail_breaks(&then_block.as_ref().statements, label)
                + else_block
                    .as_ref()
                    .map_or(0, |block| tail_breaks(&block.as_ref().statements, label))
        }
        Statement::Labeled { body, .. } | Statement::Block(body) => {
            tail_breaks(&body.as_ref().statements, label)
        }
        // A finally block runs after the body, so only the body's tail qualifies.
        Statement::Try { body, .. } => tail_breaks(&body.as_ref().statements, label),
        _ => 0,
    }
}

fn strip_tail_breaks(statements: &mut Vec<Node<Statement>>, label: &str) {
    let Some(last) = statements.last_mut() else {
        return;
    };
    match last.as_mut() {
        Statement::Break(Some(target)) if target == label => {
            statements.pop();
        }
        Statement::If {
            then_block,
            else_block,
            ..
        } => {
            strip_tail_breaks(&mut then_block.as_mut().statements, label);
            if let Some(block) = else_block {
                strip_tail_breaks(&mut block.as_mut().statements, label);
            }
        }
        Statement::Labeled { body, .. }
        | Statement::Block(body)
        | Statement::Try { body, .. } => strip_tail_breaks(&mut body.as_mut().statements, label),
        _ => {}
    }
}

/// Remove the breaks to `label` when every one of them is in tail position.
///
/// Either all breaks go or none do; a label that keeps even one break must keep
/// its block. Returns whether the label is now unused.
pub fn remove_tail_breaks(block: &mut Block, label: &str) -> bool {
    let total = count_breaks(block, label);
    if total == 0 {
        return true;
    }
    if tail_breaks(&block.statements, label) != total {
        return false;
    }
    strip_tail_breaks(&mut block.statements, label);
    true
}

fn count_identifier(block: &Block, name: &str) -> usize {
    struct Occurrences<'a> {
        name: &'a str,
        count: usize,
    }

    impl Visitor for Occurrences<'_> {
        fn visit_expr(&mut self, expr: &Node<Expr>) -> Walk {
            if expr.as_ref().as_identifier() == Some(self.name) {
                self.count += 1;
            }
            Walk::Descend
        }
    }

    let mut occurrences = Occurrences { name, count: 0 };
    let _ = walk::walk_block(&mut occurrences, block);
    occurrences.count
}

/// Turn a lone trailing `result = value;` into the expansion's value.
///
/// Applies only when that assignment is the last top-level statement and
/// `result` is mentioned nowhere else in `block`.
pub fn collapse_single_return(block: &mut Block, result: &str) -> Option<Node<Expr>> {
    let is_result_assignment = block.statements.last().is_some_and(|stmt| {
        let Statement::Expr(expr) = stmt.as_ref() else {
            return false;
        };
        let Expr::Assign { target, .. } = expr.as_ref() else {
            return false;
        };
        target.as_ref().as_ref().as_identifier() == Some(result)
    });
    if !is_result_assignment || count_identifier(block, result) != 1 {
        return None;
    }
    match block.statements.pop().map(Node::into_inner) {
        Some(Statement::Expr(expr)) => match expr.into_inner() {
            Expr::Assign { value, .. } => Some(*value),
            _ => None,
        },
        _ => None,
    }
}
