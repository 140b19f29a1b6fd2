//! Expansion of one inline call site into statements plus a value.

use tracing::trace;
use unfold_ast::{Call, Expr, Function, Literal, Node, Statement};
use unfold_span::Span;

use crate::capture::{bind_arguments, bind_receiver, rename_capturing_bindings, rename_local_names};
use crate::config::InlineConfig;
use crate::dead_tail::{collapse_single_return, remove_statements_after_top_return, remove_tail_breaks};
use crate::error::{InlineError, Result};
use crate::lookup::BodyLookup;
use crate::naming::{NameAllocator, NamingContext};
use crate::returns::{BlockInfo, BlockInfos, ReturnRewriter};

/// What one expansion produced in terms of return scaffolding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpansionSummary {
    pub label: Option<String>,
    pub result_var: Option<String>,
    pub return_count: usize,
    pub break_count: usize,
    /// Breaks that survived the peephole passes.
    pub remaining_breaks: usize,
    pub collapsed: bool,
    pub dead_statements: usize,
}

/// Replacement for a call: statements to splice before it and the expression
/// that takes the call's place.
#[derive(Debug, Clone)]
pub struct InlineResult {
    pub statements: Vec<Node<Statement>>,
    /// `None` only when the caller said the value is not needed and the callee
    /// produced none.
    pub result: Option<Node<Expr>>,
    pub summary: ExpansionSummary,
}

/// Label prefix for an expansion of `call`: the callee's simple name plus `$`.
pub fn label_prefix(call: &Call, config: &InlineConfig) -> String {
    match call.simple_name() {
        Some(name) if name.ends_with('$') => name.to_string(),
        Some(name) => format!("{name}$"),
        None => config.fallback_label_prefix.clone(),
    }
}

fn callee_name(call: &Call, callee: &Function) -> String {
    call.simple_name()
        .or(callee.name.as_deref())
        .unwrap_or("<lambda>")
        .to_string()
}

/// Drives receiver binding, argument binding, local renaming, return
/// rewriting and tail pruning for one call at a time.
///
/// The allocator and the block infos belong to the enclosing caller, so names
/// stay unique across every expansion inside it.
pub struct CallSiteExpander<'a> {
    config: &'a InlineConfig,
    names: &'a mut NameAllocator,
    blocks: &'a mut BlockInfos,
}

impl<'a> CallSiteExpander<'a> {
    pub fn new(config: &'a InlineConfig, names: &'a mut NameAllocator, blocks: &'a mut BlockInfos) -> Self {
        Self {
            config,
            names,
            blocks,
        }
    }

    /// Expand `call`, taking the callee from the call itself when it is a
    /// function literal and from `lookup` otherwise.
    pub fn expand(
        &mut self,
        call: &Call,
        span: Span,
        lookup: &dyn BodyLookup,
        result_needed: bool,
    ) -> Result<InlineResult> {
        if let Expr::Function(literal) = call.callee.as_ref().as_ref() {
            return self.expand_with(call, span, literal.as_ref(), result_needed);
        }
        let callee = call
            .decl
            .and_then(|decl| lookup.function(decl))
            .ok_or_else(|| InlineError::MissingBody {
                callee: call.simple_name().unwrap_or("<unknown>").to_string(),
                decl: call.decl,
                span,
            })?;
        self.expand_with(call, span, callee.as_ref(), result_needed)
    }

    /// Expand `call` against an already resolved `callee`.
    ///
    /// `callee` is never modified; its body is cloned before any rewrite.
    pub fn expand_with(
        &mut self,
        call: &Call,
        span: Span,
        callee: &Function,
        result_needed: bool,
    ) -> Result<InlineResult> {
        let name = callee_name(call, callee);
        let mut body = callee.body.clone();
        self.names.reserve_function(callee);

        let mut context = NamingContext::new();
        bind_receiver(call, body.as_ref(), &mut context, self.names, &self.config.this_alias, span);
        bind_arguments(&name, callee, call.bound_args(), &mut context, self.names, span)?;
        rename_local_names(body.as_ref(), &mut context, self.names);
        rename_capturing_bindings(body.as_mut(), &context, self.names);

        let mut summary = ExpansionSummary {
            dead_statements: remove_statements_after_top_return(body.as_mut()),
            ..ExpansionSummary::default()
        };

        let target = callee.decl;
        let previous = self
            .blocks
            .enter(target, BlockInfo::new(label_prefix(call, self.config)));
        ReturnRewriter::new(self.blocks, target, self.names, &mut context).rewrite_block(body.as_mut());
        let info = self
            .blocks
            .leave(target, previous)
            .unwrap_or_else(|| BlockInfo::new(""));

        summary.label = info.label().map(str::to_string);
        summary.result_var = info.result().map(str::to_string);
        summary.return_count = info.return_count();
        summary.break_count = info.break_count();

        let mut keep_label = summary.label.is_some();
        if let Some(label) = info.label() {
            keep_label = !(self.config.remove_tail_breaks && remove_tail_breaks(body.as_mut(), label));
            if keep_label {
                summary.remaining_breaks = summary.break_count;
            }
        }

        let mut result = None;
        if let Some(result_var) = info.result() {
            if !keep_label
                && self.config.collapse_single_return
                && let Some(mut value) = collapse_single_return(body.as_mut(), result_var)
            {
                context.remove_var(result_var);
                context.apply_rename_to_expr(&mut value);
                summary.collapsed = true;
                result = Some(value);
            } else {
                result = Some(Node::new(Expr::ident(result_var), span));
            }
        }
        if result.is_none() && result_needed {
            result = Some(Node::new(Expr::Literal(Literal::Unit), span));
        }

        context.apply_rename_to(body.as_mut());

        let mut statements = context.take_new_vars();
        match info.label() {
            Some(label) if keep_label => statements.push(Node::new(
                Statement::Labeled {
                    label: label.to_string(),
                    body,
                },
                span,
            )),
            _ => statements.extend(body.into_inner().statements),
        }

        trace!(
            callee = %name,
            returns = summary.return_count,
            breaks = summary.remaining_breaks,
            collapsed = summary.collapsed,
            "expanded call site"
        );
        Ok(InlineResult {
            statements,
            result,
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    #![expect(clippy::panic, reason = "Panicking on test failures is acceptable")]

    use super::*;
    use unfold_ast::build::{
        assign, binary, call, expr_stmt, function, ident, if_else, inline_call, inline_invoke,
        int, lambda, member, node, param, param_with_default, ret, this, var, while_loop,
    };
    use unfold_ast::{BinaryOp, DeclId, render_statements};

    use crate::lookup::DeclarationTable;

    fn call_of(expr: Node<Expr>) -> Call {
        match expr.into_inner() {
            Expr::Call(call) => call,
            other => panic!("expected a call, found {other}"),
        }
    }

    fn expand(callee: &Node<Function>, site: Node<Expr>, result_needed: bool) -> InlineResult {
        let config = InlineConfig::default();
        let mut names = NameAllocator::new();
        let mut blocks = BlockInfos::new();
        let mut expander = CallSiteExpander::new(&config, &mut names, &mut blocks);
        expander
            .expand_with(&call_of(site), Span::DUMMY, callee.as_ref(), result_needed)
            .unwrap_or_else(|err| panic!("{err}"))
    }

    fn rendered_result(result: &InlineResult) -> String {
        result
            .result
            .as_ref()
            .map_or_else(|| "<none>".to_string(), ToString::to_string)
    }

    #[test]
    fn identity_call_becomes_its_argument() {
        let f = function("f", DeclId(1), vec![param("x")], vec![ret(Some(ident("x")))]);
        let result = expand(&f, inline_call("f", DeclId(1), vec![int(5)]), true);
        assert!(result.statements.is_empty());
        assert_eq!(rendered_result(&result), "5");
        assert!(result.summary.collapsed);
        assert_eq!(result.summary.remaining_breaks, 0);
    }

    #[test]
    fn branch_returns_keep_result_but_drop_label() {
        let f = function(
            "pick",
            DeclId(1),
            vec![param("c")],
            vec![if_else(
                ident("c"),
                vec![ret(Some(int(1)))],
                Some(vec![ret(Some(int(2)))]),
            )],
        );
        let result = expand(&f, inline_call("pick", DeclId(1), vec![ident("flag")]), true);
        assert_eq!(
            render_statements(&result.statements),
            "var pick$_0;\nif (flag) {\n    pick$_0 = 1;\n} else {\n    pick$_0 = 2;\n}\n"
        );
        assert_eq!(rendered_result(&result), "pick$_0");
        assert_eq!(result.summary.return_count, 2);
        assert_eq!(result.summary.remaining_breaks, 0);
    }

    #[test]
    fn early_return_keeps_label_and_breaks() {
        let f = function(
            "find",
            DeclId(1),
            vec![],
            vec![
                while_loop(ident("more"), vec![if_else(ident("hit"), vec![ret(Some(int(1)))], None)]),
                ret(Some(int(0))),
            ],
        );
        let result = expand(&f, inline_call("find", DeclId(1), vec![]), true);
        assert_eq!(
            render_statements(&result.statements),
            "var find$_0;\nfind$break_0: {\n    while (more) {\n        if (hit) {\n            find$_0 = 1;\n            break find$break_0;\n        }\n    }\n    find$_0 = 0;\n    break find$break_0;\n}\n"
        );
        assert_eq!(result.summary.remaining_breaks, 2);
        assert!(!result.summary.collapsed);
    }

    #[test]
    fn dead_statements_after_return_are_dropped() {
        let f = function(
            "f",
            DeclId(1),
            vec![],
            vec![
                expr_stmt(call("log", vec![])),
                ret(None),
                expr_stmt(call("unreachable", vec![])),
            ],
        );
        let result = expand(&f, inline_call("f", DeclId(1), vec![]), false);
        assert_eq!(render_statements(&result.statements), "log();\n");
        assert!(result.result.is_none());
        assert_eq!(result.summary.dead_statements, 1);
    }

    #[test]
    fn value_position_without_returned_value_yields_unit() {
        let f = function("noop", DeclId(1), vec![], vec![]);
        let result = expand(&f, inline_call("noop", DeclId(1), vec![]), true);
        assert_eq!(rendered_result(&result), "undefined");
    }

    #[test]
    fn receiver_and_defaults_are_bound() {
        let f = function(
            "scaled",
            DeclId(1),
            vec![param_with_default("k", int(2))],
            vec![ret(Some(binary(BinaryOp::Mul, member(this(), "size"), ident("k"))))],
        );
        let site = node(Expr::Call(Call::inline(
            member(call("load", vec![]), "scaled"),
            vec![],
            Some(DeclId(1)),
        )));
        let result = expand(&f, site, true);
        assert_eq!(
            render_statements(&result.statements),
            "var $this_0 = load();\nvar k_0 = 2;\n"
        );
        assert_eq!(rendered_result(&result), "$this_0.size * k_0");
    }

    #[test]
    fn callee_locals_never_capture_caller_names() {
        let f = function(
            "bump",
            DeclId(1),
            vec![param("a")],
            vec![var("x", Some(int(1))), ret(Some(binary(BinaryOp::Add, ident("a"), ident("x"))))],
        );
        let result = expand(&f, inline_call("bump", DeclId(1), vec![ident("x")]), true);
        assert_eq!(render_statements(&result.statements), "var x_0 = 1;\n");
        assert_eq!(rendered_result(&result), "x + x_0");
    }

    #[test]
    fn canonical_body_is_left_untouched() {
        let f = function("f", DeclId(1), vec![param("x")], vec![ret(Some(ident("x")))]);
        let before = f.clone();
        let _ = expand(&f, inline_call("f", DeclId(1), vec![int(1)]), true);
        assert_eq!(f, before);
    }

    #[test]
    fn called_literal_uses_fallback_prefix() {
        let body = vec![
            if_else(ident("it"), vec![ret(Some(int(1)))], None),
            expr_stmt(assign(ident("seen"), int(1))),
            ret(Some(int(0))),
        ];
        let site = inline_invoke(lambda(DeclId(4), vec![param("it")], body), vec![ident("v")]);
        let config = InlineConfig::default();
        let mut names = NameAllocator::new();
        let mut blocks = BlockInfos::new();
        let table = DeclarationTable::new();
        let result = CallSiteExpander::new(&config, &mut names, &mut blocks)
            .expand(&call_of(site), Span::DUMMY, &table, true)
            .unwrap_or_else(|err| panic!("{err}"));
        assert_eq!(result.summary.label.as_deref(), Some("inline$break_0"));
        assert_eq!(rendered_result(&result), "inline$_0");
        assert!(blocks.is_empty());
    }

    #[test]
    fn unknown_declaration_is_a_missing_body() {
        let config = InlineConfig::default();
        let mut names = NameAllocator::new();
        let mut blocks = BlockInfos::new();
        let table = DeclarationTable::new();
        let err = CallSiteExpander::new(&config, &mut names, &mut blocks).expand(
            &call_of(inline_call("ghost", DeclId(8), vec![])),
            Span::new(4, 9),
            &table,
            true,
        );
        assert!(matches!(
            err,
            Err(InlineError::MissingBody { ref callee, decl: Some(DeclId(8)), .. }) if callee == "ghost"
        ));
    }

    #[test]
    fn names_stay_distinct_across_two_expansions() {
        let f = function(
            "f",
            DeclId(1),
            vec![],
            vec![while_loop(ident("c"), vec![ret(Some(int(1)))]), ret(Some(int(2)))],
        );
        let config = InlineConfig::default();
        let mut names = NameAllocator::new();
        let mut blocks = BlockInfos::new();
        let mut expander = CallSiteExpander::new(&config, &mut names, &mut blocks);
        let site = call_of(inline_call("f", DeclId(1), vec![]));
        let first = expander
            .expand_with(&site, Span::DUMMY, f.as_ref(), true)
            .unwrap_or_else(|err| panic!("{err}"));
        let second = expander
            .expand_with(&site, Span::DUMMY, f.as_ref(), true)
            .unwrap_or_else(|err| panic!("{err}"));
        assert_eq!(first.summary.label.as_deref(), Some("f$break_0"));
        assert_eq!(second.summary.label.as_deref(), Some("f$break_1"));
        assert_ne!(first.summary.result_var, second.summary.result_var);
    }
}
