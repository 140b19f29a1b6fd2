//! Conversion of returns into assignments and labelled breaks.

use ahash::AHashMap;
use tracing::debug;
use unfold_ast::{Block, DeclId, Expr, Node, Statement};
use unfold_span::Span;

use crate::error::InlineError;
use crate::naming::{NameAllocator, NamingContext};

/// Bookkeeping for every return that exits one target declaration during one
/// expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockInfo {
    label_prefix: String,
    label: Option<String>,
    result: Option<String>,
    return_count: usize,
    break_count: usize,
}

impl BlockInfo {
    pub fn new(label_prefix: impl Into<String>) -> Self {
        Self {
            label_prefix: label_prefix.into(),
            label: None,
            result: None,
            return_count: 0,
            break_count: 0,
        }
    }

    pub fn label_prefix(&self) -> &str {
        &self.label_prefix
    }

    /// Break label, allocated by the first converted return.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Result slot, allocated by the first converted return carrying a value.
    pub fn result(&self) -> Option<&str> {
        self.result.as_deref()
    }

    pub fn return_count(&self) -> usize {
        self.return_count
    }

    pub fn break_count(&self) -> usize {
        self.break_count
    }

    fn label_or_allocate(&mut self, names: &mut NameAllocator) -> String {
        if let Some(label) = &self.label {
            return label.clone();
        }
        let label = names.fresh(&format!("{}break", self.label_prefix));
        self.label = Some(label.clone());
        label
    }

    fn result_or_allocate(
        &mut self,
        names: &mut NameAllocator,
        context: &mut NamingContext,
        span: Span,
    ) -> String {
        if let Some(result) = &self.result {
            return result.clone();
        }
        let result = names.fresh(&self.label_prefix);
        context.new_var(result.clone(), None, span);
        self.result = Some(result.clone());
        result
    }
}

/// Block infos of the expansions in flight, keyed by target declaration.
///
/// `None` keys the callee of an expansion that has no declaration, such as a
/// lambda literal the host did not tag.
#[derive(Debug, Default)]
pub struct BlockInfos {
    entries: AHashMap<Option<DeclId>, BlockInfo>,
}

impl BlockInfos {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `info` for `target`, handing back whatever it replaces.
    pub fn enter(&mut self, target: Option<DeclId>, info: BlockInfo) -> Option<BlockInfo> {
        self.entries.insert(target, info)
    }

    /// Take the info registered for `target` and reinstate `previous`.
    pub fn leave(&mut self, target: Option<DeclId>, previous: Option<BlockInfo>) -> Option<BlockInfo> {
        let current = self.entries.remove(&target);
        if let Some(previous) = previous {
            self.entries.insert(target, previous);
        }
        current
    }

    pub fn get(&self, target: Option<DeclId>) -> Option<&BlockInfo> {
        self.entries.get(&target)
    }

    pub fn contains(&self, target: Option<DeclId>) -> bool {
        self.entries.contains_key(&target)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Rewrites every return of an inlined body whose target has a [`BlockInfo`].
///
/// Returns only occur in statement lists, so expressions are never entered;
/// closure and object literals keep their returns because that code runs in
/// its own frame. Nested function declarations are skipped for the same reason.
pub struct ReturnRewriter<'a> {
    blocks: &'a mut BlockInfos,
    default_target: Option<DeclId>,
    names: &'a mut NameAllocator,
    context: &'a mut NamingContext,
}

impl<'a> ReturnRewriter<'a> {
    pub fn new(
        blocks: &'a mut BlockInfos,
        default_target: Option<DeclId>,
        names: &'a mut NameAllocator,
        context: &'a mut NamingContext,
    ) -> Self {
        Self {
            blocks,
            default_target,
            names,
            context,
        }
    }

    pub fn rewrite_block(&mut self, block: &mut Block) {
        let mut rewritten = Vec::with_capacity(block.statements.len());
        for stmt in block.statements.drain(..) {
            self.rewrite_statement(stmt, &mut rewritten);
        }
        block.statements = rewritten;
    }

    fn rewrite_statement(&mut self, stmt: Node<Statement>, out: &mut Vec<Node<Statement>>) {
        let (stmt, span) = stmt.into_parts();
        match stmt {
            Statement::Return { value, target } => {
                let key = target.or(self.default_target);
                let Some(info) = self.blocks.entries.get_mut(&key) else {
                    if let Some(target) = target {
                        let err = InlineError::UnsupportedNonLocalTarget { target, span };
                        debug!(%err, "return left in place");
                    }
                    out.push(Node::new(Statement::Return { value, target }, span));
                    return;
                };

                info.return_count += 1;
                if let Some(value) = value {
                    let result = info.result_or_allocate(self.names, self.context, span);
                    let target = Node::new(Expr::ident(result), span);
                    out.push(Node::new(
                        Statement::Expr(Node::new(
                            Expr::Assign {
                                target: Box::new(target),
                                value: Box::new(value),
                            },
                            span,
                        )),
                        span,
                    ));
                }
                let label = info.label_or_allocate(self.names);
                info.break_count += 1;
                out.push(Node::new(Statement::Break(Some(label)), span));
            }
            Statement::If {
                cond,
                mut then_block,
                mut else_block,
            } => {
                self.rewrite_block(then_block.as_mut());
                if let Some(block) = &mut else_block {
                    self.rewrite_block(block.as_mut());
                }
                out.push(Node::new(
                    Statement::If {
                        cond,
                        then_block,
                        else_block,
                    },
                    span,
                ));
            }
            Statement::While { cond, mut body } => {
                self.rewrite_block(body.as_mut());
                out.push(Node::new(Statement::While { cond, body }, span));
            }
            Statement::Labeled { label, mut body } => {
                self.rewrite_block(body.as_mut());
                out.push(Node::new(Statement::Labeled { label, body }, span));
            }
            Statement::Block(mut body) => {
                self.rewrite_block(body.as_mut());
                out.push(Node::new(Statement::Block(body), span));
            }
            Statement::Try {
                mut body,
                mut finally_block,
            } => {
                self.rewrite_block(body.as_mut());
                if let Some(block) = &mut finally_block {
                    self.rewrite_block(block.as_mut());
                }
                out.push(Node::new(
                    Statement::Try {
                        body,
                        finally_block,
                    },
                    span,
                ));
            }
            other @ (Statement::Var { .. }
            | Statement::Function(_)
            | Statement::Class(_)
            | Statement::Expr(_)
            | Statement::Break(_)
            | Statement::Continue(_)) => out.push(Node::new(other, span)),
        }
    }
}
