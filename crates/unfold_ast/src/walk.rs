//! Pre-order tree walks.
//!
//! Visitors answer every node with a [`Walk`] signal. `Skip` refuses to descend
//! into the node's children (the inliner uses it to step over closure literals
//! whose code runs in another frame), `Stop` ends the whole walk early.

use std::ops::ControlFlow;

use crate::nodes::{Block, ClassDef, Expr, Function, Node, Statement};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Walk {
    Descend,
    Skip,
    Stop,
}

pub trait Visitor {
    fn visit_statement(&mut self, _stmt: &Node<Statement>) -> Walk {
        Walk::Descend
    }

    fn visit_expr(&mut self, _expr: &Node<Expr>) -> Walk {
        Walk::Descend
    }
}

pub trait VisitorMut {
    fn visit_statement_mut(&mut self, _stmt: &mut Node<Statement>) -> Walk {
        Walk::Descend
    }

    /// Called before the children of `expr` are visited. A visitor that
    /// replaces `expr` should usually answer `Skip` so the replacement is not
    /// walked again.
    fn visit_expr_mut(&mut self, _expr: &mut Node<Expr>) -> Walk {
        Walk::Descend
    }
}

fn enter(signal: Walk) -> ControlFlow<(), bool> {
    match signal {
        Walk::Descend => ControlFlow::Continue(true),
        Walk::Skip => ControlFlow::Continue(false),
        Walk::Stop => ControlFlow::Break(()),
    }
}

pub fn walk_block<V: Visitor + ?Sized>(visitor: &mut V, block: &Block) -> ControlFlow<()> {
    for stmt in &block.statements {
        walk_statement(visitor, stmt)?;
    }
    ControlFlow::Continue(())
}

pub fn walk_function<V: Visitor + ?Sized>(
    visitor: &mut V,
    function: &Function,
) -> ControlFlow<()> {
    for param in &function.params {
        if let Some(default) = &param.as_ref().default {
            walk_expr(visitor, default)?;
        }
    }
    walk_block(visitor, function.body.as_ref())
}

pub fn walk_class<V: Visitor + ?Sized>(visitor: &mut V, class: &ClassDef) -> ControlFlow<()> {
    for method in &class.methods {
        walk_function(visitor, method.as_ref())?;
    }
    ControlFlow::Continue(())
}

pub fn walk_statement<V: Visitor + ?Sized>(
    visitor: &mut V,
    stmt: &Node<Statement>,
) -> ControlFlow<()> {
    if !enter(visitor.visit_statement(stmt))? {
        return ControlFlow::Continue(());
    }
    match stmt.as_ref() {
        Statement::Var { init, .. } => {
            if let Some(init) = init {
                walk_expr(visitor, init)?;
            }
        }
        Statement::Function(func) => walk_function(visitor, func.as_ref())?,
        Statement::Class(class) => walk_class(visitor, class.as_ref())?,
        Statement::Expr(expr) => walk_expr(visitor, expr)?,
        Statement::Return { value, .. } => {
            if let Some(value) = value {
                walk_expr(visitor, value)?;
            }
        }
        Statement::If {
            cond,
            then_block,
            else_block,
        } => {
            walk_expr(visitor, cond)?;
            walk_block(visitor, then_block.as_ref())?;
            if let Some(block) = else_block {
                walk_block(visitor, block.as_ref())?;
            }
        }
        Statement::While { cond, body } => {
            walk_expr(visitor, cond)?;
            walk_block(visitor, body.as_ref())?;
        }
        Statement::Labeled { body, .. } | Statement::Block(body) => {
            walk_block(visitor, body.as_ref())?;
        }
        Statement::Try {
            body,
            finally_block,
        } => {
            walk_block(visitor, body.as_ref())?;
            if let Some(block) = finally_block {
                walk_block(visitor, block.as_ref())?;
            }
        }
        Statement::Break(_) | Statement::Continue(_) => {}
    }
    ControlFlow::Continue(())
}

pub fn walk_expr<V: Visitor + ?Sized>(visitor: &mut V, expr: &Node<Expr>) -> ControlFlow<()> {
    if !enter(visitor.visit_expr(expr))? {
        return ControlFlow::Continue(());
    }
    match expr.as_ref() {
        Expr::Literal(_)
        | Expr::Identifier(_)
        | Expr::This
        | Expr::StaticField { .. } => {}
        Expr::Member { object, .. } => walk_expr(visitor, object)?,
        Expr::Call(call) => {
            walk_expr(visitor, &call.callee)?;
            for arg in &call.args {
                walk_expr(visitor, arg)?;
            }
        }
        Expr::Binary { left, right, .. } => {
            walk_expr(visitor, left)?;
            walk_expr(visitor, right)?;
        }
        Expr::Unary { expr, .. } => walk_expr(visitor, expr)?,
        Expr::Assign { target, value } => {
            walk_expr(visitor, target)?;
            walk_expr(visitor, value)?;
        }
        Expr::Conditional {
            cond,
            then_branch,
            else_branch,
        } => {
            walk_expr(visitor, cond)?;
            walk_expr(visitor, then_branch)?;
            walk_expr(visitor, else_branch)?;
        }
        Expr::Function(func) => walk_function(visitor, func.as_ref())?,
        Expr::Object(props) => {
            for (_, value) in props {
                walk_expr(visitor, value)?;
            }
        }
        Expr::New { args, .. } => {
            for arg in args {
                walk_expr(visitor, arg)?;
            }
        }
    }
    ControlFlow::Continue(())
}

pub fn walk_block_mut<V: VisitorMut + ?Sized>(
    visitor: &mut V,
    block: &mut Block,
) -> ControlFlow<()> {
    for stmt in &mut block.statements {
        walk_statement_mut(visitor, stmt)?;
    }
    ControlFlow::Continue(())
}

pub fn walk_function_mut<V: VisitorMut + ?Sized>(
    visitor: &mut V,
    function: &mut Function,
) -> ControlFlow<()> {
    for param in &mut function.params {
        if let Some(default) = &mut param.as_mut().default {
            walk_expr_mut(visitor, default)?;
        }
    }
    walk_block_mut(visitor, function.body.as_mut())
}

pub fn walk_statement_mut<V: VisitorMut + ?Sized>(
    visitor: &mut V,
    stmt: &mut Node<Statement>,
) -> ControlFlow<()> {
    if !enter(visitor.visit_statement_mut(stmt))? {
        return ControlFlow::Continue(());
    }
    match stmt.as_mut() {
        Statement::Var { init, .. } => {
            if let Some(init) = init {
                walk_expr_mut(visitor, init)?;
            }
        }
        Statement::Function(func) => walk_function_mut(visitor, func.as_mut())?,
        Statement::Class(class) => {
            for method in &mut class.as_mut().methods {
                walk_function_mut(visitor, method.as_mut())?;
            }
        }
        Statement::Expr(expr) => walk_expr_mut(visitor, expr)?,
        Statement::Return { value, .. } => {
            if let Some(value) = value {
                walk_expr_mut(visitor, value)?;
            }
        }
        Statement::If {
            cond,
            then_block,
            else_block,
        } => {
            walk_expr_mut(visitor, cond)?;
            walk_block_mut(visitor, then_block.as_mut())?;
            if let Some(block) = else_block {
                walk_block_mut(visitor, block.as_mut())?;
            }
        }
        Statement::While { cond, body } => {
            walk_expr_mut(visitor, cond)?;
            walk_block_mut(visitor, body.as_mut())?;
        }
        Statement::Labeled { body, .. } | Statement::Block(body) => {
            walk_block_mut(visitor, body.as_mut())?;
        }
        Statement::Try {
            body,
            finally_block,
        } => {
            walk_block_mut(visitor, body.as_mut())?;
            if let Some(block) = finally_block {
                walk_block_mut(visitor, block.as_mut())?;
            }
        }
        Statement::Break(_) | Statement::Continue(_) => {}
    }
    ControlFlow::Continue(())
}

pub fn walk_expr_mut<V: VisitorMut + ?Sized>(
    visitor: &mut V,
    expr: &mut Node<Expr>,
) -> ControlFlow<()> {
    if !enter(visitor.visit_expr_mut(expr))? {
        return ControlFlow::Continue(());
    }
    match expr.as_mut() {
        Expr::Literal(_)
        | Expr::Identifier(_)
        | Expr::This
        | Expr::StaticField { .. } => {}
        Expr::Member { object, .. } => walk_expr_mut(visitor, object)?,
        Expr::Call(call) => {
            walk_expr_mut(visitor, &mut call.callee)?;
            for arg in &mut call.args {
                walk_expr_mut(visitor, arg)?;
            }
        }
        Expr::Binary { left, right, .. } => {
            walk_expr_mut(visitor, left)?;
            walk_expr_mut(visitor, right)?;
        }
        Expr::Unary { expr, .. } => walk_expr_mut(visitor, expr)?,
        Expr::Assign { target, value } => {
            walk_expr_mut(visitor, target)?;
            walk_expr_mut(visitor, value)?;
        }
        Expr::Conditional {
            cond,
            then_branch,
            else_branch,
        } => {
            walk_expr_mut(visitor, cond)?;
            walk_expr_mut(visitor, then_branch)?;
            walk_expr_mut(visitor, else_branch)?;
        }
        Expr::Function(func) => walk_function_mut(visitor, func.as_mut())?,
        Expr::Object(props) => {
            for (_, value) in props {
                walk_expr_mut(visitor, value)?;
            }
        }
        Expr::New { args, .. } => {
            for arg in args {
                walk_expr_mut(visitor, arg)?;
            }
        }
    }
    ControlFlow::Continue(())
}
