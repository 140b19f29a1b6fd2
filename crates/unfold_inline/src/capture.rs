//! Binding of receiver, arguments and callee locals for one expansion.

use ahash::AHashSet;
use unfold_ast::walk::{self, Visitor, VisitorMut, Walk};
use unfold_ast::{Block, Call, Expr, Function, Node, Statement};
use unfold_span::Span;

use crate::error::{InlineError, Result};
use crate::naming::{NameAllocator, NamingContext, declared_labels, declared_names};
use crate::side_effects::{can_have_side_effect, is_stable};

/// Whether `block` mentions `this` outside of class definitions.
pub fn references_this(block: &Block) -> bool {
    struct ThisFinder(bool);

    impl Visitor for ThisFinder {
        fn visit_statement(&mut self, stmt: &Node<Statement>) -> Walk {
            if matches!(stmt.as_ref(), Statement::Class(_)) {
                Walk::Skip
            } else {
                Walk::Descend
            }
        }

        fn visit_expr(&mut self, expr: &Node<Expr>) -> Walk {
            if matches!(expr.as_ref(), Expr::This) {
                self.0 = true;
                return Walk::Stop;
            }
            Walk::Descend
        }
    }

    let mut finder = ThisFinder(false);
    let _ = walk::walk_block(&mut finder, block);
    finder.0
}

/// Names that appear as the target of an assignment anywhere in `block`.
pub fn assigned_names(block: &Block) -> AHashSet<String> {
    struct Assigned(AHashSet<String>);

    impl Visitor for Assigned {
        fn visit_expr(&mut self, expr: &Node<Expr>) -> Walk {
            if let Expr::Assign { target, .. } = expr.as_ref()
                && let Some(name) = target.as_ref().as_ref().as_identifier()
            {
                self.0.insert(name.to_string());
            }
            Walk::Descend
        }
    }

    let mut assigned = Assigned(AHashSet::new());
    let _ = walk::walk_block(&mut assigned, block);
    assigned.0
}

/// Bind the callee's `this` to the receiver the call supplies.
///
/// The receiver is evaluated once into a fresh alias when it could have side
/// effects or when an argument with side effects runs after it; anything else
/// is substituted where `this` appears. A receiver with side effects is kept
/// for its effects even when the body never reads `this`.
pub fn bind_receiver(
    call: &Call,
    body: &Block,
    context: &mut NamingContext,
    names: &mut NameAllocator,
    this_alias: &str,
    span: Span,
) {
    let Some(receiver) = call.receiver() else {
        return;
    };
    if matches!(receiver.as_ref(), Expr::This) {
        return;
    }
    let effectful = can_have_side_effect(receiver.as_ref());
    if !effectful && !references_this(body) {
        return;
    }

    let evaluated_later = call
        .bound_args()
        .iter()
        .any(|arg| can_have_side_effect(arg.as_ref()));
    if effectful || (evaluated_later && !is_stable(receiver.as_ref())) {
        let alias = names.fresh(this_alias);
        context.new_var(alias.clone(), Some(receiver.clone()), span);
        context.replace_this(Node::new(Expr::ident(alias), *receiver.span()));
    } else {
        context.replace_this(receiver.clone());
    }
}

/// Whether `arg` may be written into the body in place of its parameter.
///
/// `evaluated_later` reports whether a later argument has side effects that
/// must still run before the body reads this one.
fn substitutable(arg: &Expr, evaluated_later: bool) -> bool {
    match arg {
        Expr::Literal(_) => true,
        Expr::Function(func) => func.as_ref().inline_lambda,
        Expr::Identifier(_) | Expr::This => !evaluated_later,
        _ => false,
    }
}

/// Bind every parameter of `callee` to its argument, an alias of it, or its
/// materialised default.
pub fn bind_arguments(
    callee_name: &str,
    callee: &Function,
    args: &[Node<Expr>],
    context: &mut NamingContext,
    names: &mut NameAllocator,
    span: Span,
) -> Result<()> {
    if args.len() > callee.params.len() {
        return Err(InlineError::ArityMismatch {
            callee: callee_name.to_string(),
            expected: callee.params.len(),
            given: args.len(),
            span,
        });
    }

    let body = callee.body.as_ref();
    let assigned = assigned_names(body);
    let redeclared = declared_names(body);
    let last_effect = args
        .iter()
        .rposition(|arg| can_have_side_effect(arg.as_ref()));

    for (idx, param) in callee.params.iter().enumerate() {
        let name = param.as_ref().name.as_ref();
        match args.get(idx) {
            Some(arg) => {
                let evaluated_later = last_effect.is_some_and(|last| last > idx);
                // The body writes the variable the argument reads.
                let overwritten = arg
                    .as_ref()
                    .as_identifier()
                    .is_some_and(|read| assigned.contains(read));
                let keep_alias =
                    overwritten || assigned.contains(name) || redeclared.iter().any(|n| n == name);
                if !keep_alias && substitutable(arg.as_ref(), evaluated_later) {
                    context.replace_name(name.clone(), arg.clone());
                    continue;
                }
                let alias = names.fresh(name);
                context.new_var(alias.clone(), Some(arg.clone()), *arg.span());
                context.replace_name(name.clone(), Node::new(Expr::ident(alias), *arg.span()));
            }
            None => {
                let alias = names.fresh(name);
                let init = param.as_ref().default.clone().map(|mut default| {
                    context.apply_rename_to_expr(&mut default);
                    default
                });
                context.new_var(alias.clone(), init, *param.span());
                context.replace_name(name.clone(), Node::new(Expr::ident(alias), *param.span()));
            }
        }
    }
    Ok(())
}

/// Give every local and label the callee declares a fresh name in the caller.
pub fn rename_local_names(body: &Block, context: &mut NamingContext, names: &mut NameAllocator) {
    for name in declared_names(body) {
        if context.is_bound(&name) {
            continue;
        }
        let fresh = names.fresh(&name);
        context.replace_name(name, Node::new(Expr::ident(fresh), Span::DUMMY));
    }
    for label in declared_labels(body) {
        let fresh = names.fresh(&label);
        context.replace_label(label, fresh);
    }
}

/// Every identifier mentioned in `expr`, nested functions included.
fn mentioned_names(expr: &Node<Expr>, names: &mut AHashSet<String>) {
    struct Mentioned<'a>(&'a mut AHashSet<String>);

    impl Visitor for Mentioned<'_> {
        fn visit_expr(&mut self, expr: &Node<Expr>) -> Walk {
            if let Expr::Identifier(name) = expr.as_ref() {
                self.0.insert(name.clone());
            }
            Walk::Descend
        }
    }

    let _ = walk::walk_expr(&mut Mentioned(names), expr);
}

/// Give fresh names to the parameters and locals of functions nested in
/// `body` that would capture a name read by a substituted expression.
///
/// Must run before the substitutions of `context` are applied.
pub fn rename_capturing_bindings(body: &mut Block, context: &NamingContext, names: &mut NameAllocator) {
    let mut read = AHashSet::new();
    for (_, replacement) in context.substitutions() {
        mentioned_names(replacement, &mut read);
    }
    if let Some(receiver) = context.this_replacement() {
        mentioned_names(receiver, &mut read);
    }
    if read.is_empty() {
        return;
    }
    let _ = walk::walk_block_mut(&mut CaptureGuard { read: &read, names }, body);
}

struct CaptureGuard<'a> {
    read: &'a AHashSet<String>,
    names: &'a mut NameAllocator,
}

impl CaptureGuard<'_> {
    fn guard(&mut self, function: &mut Function) {
        let mut binders: Vec<String> = function.param_names().map(str::to_string).collect();
        binders.extend(declared_names(function.body.as_ref()));

        let mut renames = NamingContext::new();
        for name in binders {
            if self.read.contains(&name) && !renames.is_bound(&name) {
                let fresh = self.names.fresh(&name);
                renames.replace_name(name, Node::new(Expr::ident(fresh), Span::DUMMY));
            }
        }
        if renames.substitutions().next().is_none() {
            return;
        }

        for param in &mut function.params {
            let param = param.as_mut();
            if let Some(fresh) = renames
                .replacement(param.name.as_ref())
                .and_then(|fresh| fresh.as_ref().as_identifier())
            {
                param.name.replace(fresh.to_string());
            }
            if let Some(default) = &mut param.default {
                renames.apply_rename_to_expr(default);
            }
        }
        renames.apply_rename_to(function.body.as_mut());
    }
}

impl VisitorMut for CaptureGuard<'_> {
    fn visit_statement_mut(&mut self, stmt: &mut Node<Statement>) -> Walk {
        match stmt.as_mut() {
            Statement::Function(func) => self.guard(func.as_mut()),
            Statement::Class(_) => return Walk::Skip,
            _ => {}
        }
        Walk::Descend
    }

    fn visit_expr_mut(&mut self, expr: &mut Node<Expr>) -> Walk {
        if let Expr::Function(func) = expr.as_mut() {
            self.guard(func.as_mut());
        }
        Walk::Descend
    }
}
