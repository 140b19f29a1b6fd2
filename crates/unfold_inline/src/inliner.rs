use std::collections::BTreeMap;

use ahash::{AHashMap, AHashSet};
use serde::Serialize;
use tracing::{debug, trace, warn};
use unfold_ast::walk::{self, Visitor, VisitorMut, Walk};
use unfold_ast::{
    BinaryOp, Block, Call, ClassDef, ClassKind, DeclId, Expr, Function, Literal, Node, Program,
    Statement,
};
use unfold_span::Span;
use unfold_utils::Diagnostic;

use crate::config::InlineConfig;
use crate::error::{InlineError, Result};
use crate::expander::{CallSiteExpander, InlineResult};
use crate::lookup::BodyLookup;
use crate::naming::NameAllocator;
use crate::regenerate::{
    AnonymousObjectRegeneration, RegeneratedKind, RegenerationInfo, RegenerationRegistry,
    WhenMappingRegeneration, specialize_closure, trim_constructor_args, trim_mapping,
};
use crate::returns::BlockInfos;
use crate::side_effects::{can_have_side_effect, is_stable};

/// Summary of inline activity.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct InlineStats {
    /// Distinct call sites the pass tried to expand.
    pub attempted: usize,
    pub applied: usize,
    pub skipped_missing: usize,
    pub skipped_recursive: usize,
    pub skipped_arity: usize,
    /// Inline calls left in a conditional or repeated position, counted per
    /// occurrence in the output.
    pub skipped_order: usize,
    pub skipped_depth: usize,
    pub regenerated: usize,
    pub regeneration_failures: usize,
}

/// Everything one run of the pass produced.
#[derive(Debug)]
pub struct InlineOutput {
    pub program: Program,
    pub stats: InlineStats,
    pub diagnostics: Vec<Diagnostic>,
    pub registry: RegenerationRegistry,
}

/// Expands every inline call site of a program.
pub struct Inliner {
    config: InlineConfig,
}

impl Default for Inliner {
    fn default() -> Self {
        Self::new()
    }
}

impl Inliner {
    pub fn new() -> Self {
        Self::with_config(InlineConfig::default())
    }

    pub fn with_config(config: InlineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &InlineConfig {
        &self.config
    }

    /// Produce a clone of `program` with every expandable inline call
    /// replaced by the callee's body.
    ///
    /// Failures are per call site: the call stays in place, is no longer
    /// marked inline, and a diagnostic is reported in the output.
    pub fn inline_program(&self, program: &Program, lookup: &dyn BodyLookup) -> InlineOutput {
        let mut state = PassState::new(&self.config, lookup, &program.module);
        let mut optimized = program.clone();

        for stmt in &mut optimized.statements {
            if let Statement::Function(func) = stmt.as_mut() {
                let processed = state.process_function(func);
                *func = processed;
            }
        }

        for class in state.new_classes.drain(..) {
            optimized
                .statements
                .push(Node::new(Statement::Class(Node::new(class, Span::DUMMY)), Span::DUMMY));
        }
        state.stats.skipped_order = pending_inline_calls(&optimized);

        debug!(
            module = %program.module,
            attempted = state.stats.attempted,
            applied = state.stats.applied,
            regenerated = state.stats.regenerated,
            "inline pass finished"
        );
        InlineOutput {
            program: optimized,
            stats: state.stats,
            diagnostics: state.diagnostics,
            registry: state.registry,
        }
    }
}

fn is_candidate(call: &Call) -> bool {
    call.inline && (matches!(call.callee.as_ref().as_ref(), Expr::Function(_)) || call.decl.is_some())
}

fn callee_label(call: &Call, callee: &Function) -> String {
    call.simple_name()
        .or(callee.name.as_deref())
        .unwrap_or("lambda")
        .trim_end_matches('$')
        .to_string()
}

/// Direct operands of `expr` in evaluation order.
///
/// A plain callee name is not an operand. A method callee contributes its
/// receiver, which is read before the arguments.
fn operands_mut(expr: &mut Expr) -> Vec<&mut Node<Expr>> {
    match expr {
        Expr::Literal(_)
        | Expr::Identifier(_)
        | Expr::This
        | Expr::StaticField { .. }
        | Expr::Function(_) => Vec::new(),
        Expr::Member { object, .. } => vec![&mut **object],
        Expr::Unary { expr: inner, .. } => vec![&mut **inner],
        Expr::Binary { left, right, .. } => vec![&mut **left, &mut **right],
        Expr::Conditional {
            cond,
            then_branch,
            else_branch,
        } => vec![&mut **cond, &mut **then_branch, &mut **else_branch],
        Expr::Assign { target, value } => {
            let mut operands = place_operands(target);
            operands.push(&mut **value);
            operands
        }
        Expr::Call(Call { callee, args, .. }) => {
            let mut operands = Vec::with_capacity(args.len() + 1);
            match callee.as_ref().as_ref() {
                Expr::Identifier(_) => {}
                Expr::Member { .. } => operands.extend(place_operands(callee)),
                _ => operands.push(&mut **callee),
            }
            operands.extend(args.iter_mut());
            operands
        }
        Expr::Object(props) => props.iter_mut().map(|(_, value)| value).collect(),
        Expr::New { args, .. } => args.iter_mut().collect(),
    }
}

/// What evaluating `place` as an assignment target or callee reads before
/// the operation itself.
fn place_operands(place: &mut Node<Expr>) -> Vec<&mut Node<Expr>> {
    if matches!(place.as_ref(), Expr::Identifier(_) | Expr::StaticField { .. }) {
        return Vec::new();
    }
    if !matches!(place.as_ref(), Expr::Member { .. }) {
        return vec![place];
    }
    match place.as_mut() {
        Expr::Member { object, .. } => vec![&mut **object],
        _ => Vec::new(),
    }
}

const SPILL_BASE: &str = "tmp";

/// Evaluate `operand` into a fresh temporary declared in `out` and read the
/// temporary in its place. Stable operands stay as they are.
fn spill(operand: &mut Node<Expr>, frame: &mut Frame, out: &mut Vec<Node<Statement>>) {
    if is_stable(operand.as_ref()) {
        return;
    }
    let span = *operand.span();
    let temp = frame.names.fresh(SPILL_BASE);
    let value = std::mem::replace(operand, Node::new(Expr::ident(temp.clone()), span));
    trace!(%temp, "spilled operand ahead of hoisted statements");
    out.push(Node::new(
        Statement::Var {
            name: Node::new(temp, span),
            init: Some(value),
        },
        span,
    ));
}

/// Declarations the inline calls of `function` refer to.
fn inline_targets(function: &Function) -> Vec<DeclId> {
    struct Targets(Vec<DeclId>);

    impl Visitor for Targets {
        fn visit_expr(&mut self, expr: &Node<Expr>) -> Walk {
            if let Expr::Call(call) = expr.as_ref()
                && call.inline
                && let Some(decl) = call.decl
            {
                self.0.push(decl);
            }
            Walk::Descend
        }
    }

    let mut targets = Targets(Vec::new());
    let _ = walk::walk_function(&mut targets, function);
    targets.0
}

/// Inline calls still in `program`, counted per occurrence.
fn pending_inline_calls(program: &Program) -> usize {
    struct Pending(usize);

    impl Visitor for Pending {
        fn visit_expr(&mut self, expr: &Node<Expr>) -> Walk {
            if let Expr::Call(call) = expr.as_ref()
                && is_candidate(call)
            {
                self.0 += 1;
            }
            Walk::Descend
        }
    }

    let mut pending = Pending(0);
    for stmt in &program.statements {
        let _ = walk::walk_statement(&mut pending, stmt);
    }
    pending.0
}

/// What became of one inline call site.
enum CallOutcome {
    /// The call stays as written.
    Kept,
    /// The call was replaced; carries the expression taking its place, if any.
    Expanded(Option<Node<Expr>>),
}

/// Naming and return bookkeeping of the function whose body is being rewritten.
struct Frame {
    caller: String,
    names: NameAllocator,
    blocks: BlockInfos,
    expanding: Vec<DeclId>,
    depth: usize,
    /// The function is a method of a regenerated class.
    outer_regenerated: bool,
}

impl Frame {
    fn new(function: &Function, outer_regenerated: bool) -> Self {
        Self {
            caller: function.name.clone().unwrap_or_else(|| "anonymous".to_string()),
            names: NameAllocator::for_function(function),
            blocks: BlockInfos::new(),
            expanding: Vec::new(),
            depth: 0,
            outer_regenerated,
        }
    }
}

struct PassState<'a> {
    config: &'a InlineConfig,
    lookup: &'a dyn BodyLookup,
    module: &'a str,
    processed: AHashMap<DeclId, Node<Function>>,
    in_process: Vec<DeclId>,
    stats: InlineStats,
    diagnostics: Vec<Diagnostic>,
    registry: RegenerationRegistry,
    new_classes: Vec<ClassDef>,
    regenerating: Vec<String>,
}

impl<'a> PassState<'a> {
    fn new(config: &'a InlineConfig, lookup: &'a dyn BodyLookup, module: &'a str) -> Self {
        Self {
            config,
            lookup,
            module,
            processed: AHashMap::new(),
            in_process: Vec::new(),
            stats: InlineStats::default(),
            diagnostics: Vec::new(),
            registry: RegenerationRegistry::new(),
            new_classes: Vec::new(),
            regenerating: Vec::new(),
        }
    }

    /// Rewrite a copy of `function` with its own inline calls expanded.
    ///
    /// Bodies with a declaration are memoised, so a callee is processed once
    /// no matter how many call sites use it.
    fn process_function(&mut self, function: &Node<Function>) -> Node<Function> {
        let decl = function.as_ref().decl;
        if let Some(decl) = decl {
            if let Some(done) = self.processed.get(&decl) {
                return done.clone();
            }
            self.in_process.push(decl);
        }

        let mut result = function.clone();
        let mut frame = self.frame(result.as_ref(), false);
        self.inline_block(result.as_mut().body.as_mut(), &mut frame);

        if let Some(decl) = decl {
            self.in_process.pop();
            self.processed.insert(decl, result.clone());
        }
        result
    }

    /// Frame for rewriting `function`. Every name of the function and of the
    /// callees it can reach through inline calls is taken up front, so no
    /// fresh name shadows a name a later expansion reads.
    fn frame(&self, function: &Function, outer_regenerated: bool) -> Frame {
        let mut frame = Frame::new(function, outer_regenerated);
        let mut pending = inline_targets(function);
        let mut seen = AHashSet::new();
        while let Some(decl) = pending.pop() {
            if !seen.insert(decl) {
                continue;
            }
            if let Some(callee) = self.lookup.function(decl) {
                frame.names.reserve_function(callee.as_ref());
                pending.extend(inline_targets(callee.as_ref()));
            }
        }
        frame
    }

    fn inline_block(&mut self, block: &mut Block, frame: &mut Frame) {
        let mut transformed = Vec::with_capacity(block.statements.len());

        for stmt in block.statements.drain(..) {
            self.inline_statement(stmt, frame, &mut transformed);
        }

        block.statements = transformed;
    }

    fn inline_statement(
        &mut self,
        stmt: Node<Statement>,
        frame: &mut Frame,
        out: &mut Vec<Node<Statement>>,
    ) {
        let (stmt, span) = stmt.into_parts();
        match stmt {
            Statement::Var {
                name,
                init: Some(mut init),
            } => {
                self.scan_expr(&mut init, frame, out);
                out.push(Node::new(
                    Statement::Var {
                        name,
                        init: Some(init),
                    },
                    span,
                ));
            }
            Statement::Expr(mut expr) => {
                let call_span = *expr.span();
                if matches!(expr.as_ref(), Expr::Call(call) if is_candidate(call)) {
                    self.scan_sequence(operands_mut(expr.as_mut()), frame, out);
                    if let Expr::Call(call) = expr.as_mut()
                        && let CallOutcome::Expanded(result) =
                            self.expand_call(call, call_span, frame, out, false)
                    {
                        // The value is discarded; keep it only for its effects.
                        if let Some(result) = result
                            && can_have_side_effect(result.as_ref())
                        {
                            out.push(Node::new(Statement::Expr(result), span));
                        }
                        return;
                    }
                } else {
                    self.scan_expr(&mut expr, frame, out);
                }
                out.push(Node::new(Statement::Expr(expr), span));
            }
            Statement::Return {
                value: Some(mut value),
                target,
            } => {
                self.scan_expr(&mut value, frame, out);
                out.push(Node::new(
                    Statement::Return {
                        value: Some(value),
                        target,
                    },
                    span,
                ));
            }
            Statement::If {
                mut cond,
                mut then_block,
                mut else_block,
            } => {
                self.scan_expr(&mut cond, frame, out);
                self.inline_block(then_block.as_mut(), frame);
                if let Some(block) = &mut else_block {
                    self.inline_block(block.as_mut(), frame);
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
            Statement::While { mut cond, mut body } => {
                // Re-evaluated on every iteration, so nothing can be hoisted out.
                self.leave_in_place(&mut cond, frame);
                self.inline_block(body.as_mut(), frame);
                out.push(Node::new(Statement::While { cond, body }, span));
            }
            Statement::Labeled { label, mut body } => {
                self.inline_block(body.as_mut(), frame);
                out.push(Node::new(Statement::Labeled { label, body }, span));
            }
            Statement::Block(mut inner) => {
                self.inline_block(inner.as_mut(), frame);
                out.push(Node::new(Statement::Block(inner), span));
            }
            Statement::Try {
                mut body,
                mut finally_block,
            } => {
                self.inline_block(body.as_mut(), frame);
                if let Some(block) = &mut finally_block {
                    self.inline_block(block.as_mut(), frame);
                }
                out.push(Node::new(
                    Statement::Try {
                        body,
                        finally_block,
                    },
                    span,
                ));
            }
            Statement::Function(mut func) => {
                self.inline_block(func.as_mut().body.as_mut(), frame);
                out.push(Node::new(Statement::Function(func), span));
            }
            other => out.push(Node::new(other, span)),
        }
    }

    /// Expand the inline calls of `expr` that run unconditionally, hoisting
    /// their statements into `out` ahead of the statement being rebuilt.
    fn scan_expr(&mut self, expr: &mut Node<Expr>, frame: &mut Frame, out: &mut Vec<Node<Statement>>) {
        match expr.as_mut() {
            Expr::Binary {
                op: BinaryOp::And | BinaryOp::Or,
                left,
                right,
            } => {
                self.scan_expr(left, frame, out);
                self.leave_in_place(right, frame);
                return;
            }
            Expr::Conditional {
                cond,
                then_branch,
                else_branch,
            } => {
                self.scan_expr(cond, frame, out);
                self.leave_in_place(then_branch, frame);
                self.leave_in_place(else_branch, frame);
                return;
            }
            Expr::Function(func) => {
                self.inline_block(func.as_mut().body.as_mut(), frame);
                return;
            }
            _ => {}
        }
        self.scan_sequence(operands_mut(expr.as_mut()), frame, out);

        let span = *expr.span();
        let Expr::Call(call) = expr.as_mut() else {
            return;
        };
        if !is_candidate(call) {
            return;
        }
        if let CallOutcome::Expanded(result) = self.expand_call(call, span, frame, out, true) {
            *expr = result.unwrap_or_else(|| Node::new(Expr::Literal(Literal::Unit), span));
        }
    }

    /// Scan `operands` in evaluation order.
    ///
    /// Before the statements hoisted out of one operand are emitted, every
    /// operand evaluated before it is spilled into a temporary, so it still
    /// reads the state it would have read.
    fn scan_sequence(
        &mut self,
        mut operands: Vec<&mut Node<Expr>>,
        frame: &mut Frame,
        out: &mut Vec<Node<Statement>>,
    ) {
        let mut settled = 0;
        for idx in 0..operands.len() {
            let mut hoisted = Vec::new();
            self.scan_expr(&mut *operands[idx], frame, &mut hoisted);
            if hoisted.is_empty() {
                continue;
            }
            for earlier in &mut operands[settled..idx] {
                spill(earlier, frame, out);
            }
            settled = idx;
            out.append(&mut hoisted);
        }
    }

    /// Visit a position that is evaluated conditionally or repeatedly: inline
    /// calls there stay calls, only nested function bodies are processed.
    fn leave_in_place(&mut self, expr: &mut Node<Expr>, frame: &mut Frame) {
        if let Expr::Function(func) = expr.as_mut() {
            self.inline_block(func.as_mut().body.as_mut(), frame);
            return;
        }
        if let Expr::Call(call) = expr.as_ref()
            && is_candidate(call)
        {
            trace!(callee = ?call.simple_name(), "inline call left in place to keep evaluation order");
        }
        for operand in operands_mut(expr.as_mut()) {
            self.leave_in_place(operand, frame);
        }
    }

    /// Resolve a call's callee to a processed body.
    fn resolve(&mut self, call: &Call, span: Span) -> Result<Node<Function>> {
        let name = call.simple_name().unwrap_or("<unknown>");
        let Some(decl) = call.decl else {
            return Err(InlineError::MissingBody {
                callee: name.to_string(),
                decl: None,
                span,
            });
        };
        if let Some(done) = self.processed.get(&decl) {
            return Ok(done.clone());
        }
        if self.in_process.contains(&decl) {
            return Err(InlineError::Cycle {
                callee: name.to_string(),
                span,
            });
        }
        let lookup = self.lookup;
        let Some(source) = lookup.function(decl) else {
            return Err(InlineError::MissingBody {
                callee: name.to_string(),
                decl: Some(decl),
                span,
            });
        };
        Ok(self.process_function(source))
    }

    fn fail(&mut self, call: &mut Call, err: InlineError) {
        match err {
            InlineError::MissingBody { .. } => self.stats.skipped_missing += 1,
            InlineError::Cycle { .. } => self.stats.skipped_recursive += 1,
            InlineError::ArityMismatch { .. } => self.stats.skipped_arity += 1,
            InlineError::MalformedBody { .. } | InlineError::UnsupportedNonLocalTarget { .. } => {}
        }
        warn!(%err, "inline call left in place");
        self.diagnostics.push(err.to_diagnostic(self.module));
        call.inline = false;
    }

    /// Expand `call`, pushing the replacement statements to `out`.
    fn expand_call(
        &mut self,
        call: &mut Call,
        span: Span,
        frame: &mut Frame,
        out: &mut Vec<Node<Statement>>,
        result_needed: bool,
    ) -> CallOutcome {
        self.stats.attempted += 1;
        if frame.depth >= self.config.max_depth {
            self.stats.skipped_depth += 1;
            debug!(callee = ?call.simple_name(), depth = frame.depth, "inline depth limit reached");
            call.inline = false;
            return CallOutcome::Kept;
        }

        let callee = match call.callee.as_ref().as_ref() {
            Expr::Function(literal) => literal.clone(),
            _ => match self.resolve(call, span) {
                Ok(callee) => callee,
                Err(err) => {
                    self.fail(call, err);
                    return CallOutcome::Kept;
                }
            },
        };
        if let Some(decl) = callee.as_ref().decl
            && frame.expanding.contains(&decl)
        {
            let err = InlineError::Cycle {
                callee: callee_label(call, callee.as_ref()),
                span,
            };
            self.fail(call, err);
            return CallOutcome::Kept;
        }

        let config = self.config;
        let expansion = CallSiteExpander::new(config, &mut frame.names, &mut frame.blocks).expand_with(
            call,
            span,
            callee.as_ref(),
            result_needed,
        );
        let mut expansion = match expansion {
            Ok(expansion) => expansion,
            Err(err) => {
                self.fail(call, err);
                return CallOutcome::Kept;
            }
        };
        self.stats.applied += 1;

        let label = callee_label(call, callee.as_ref());
        if config.regenerate_closures {
            self.regenerate_expansion(&mut expansion, &frame.caller, &label, frame.outer_regenerated);
        }

        // Lambda calls only become expandable once their arguments are in place.
        if let Some(decl) = callee.as_ref().decl {
            frame.expanding.push(decl);
        }
        frame.depth += 1;
        let mut replacement = Block::new(expansion.statements);
        self.inline_block(&mut replacement, frame);
        let mut result = expansion.result;
        if let Some(value) = &mut result {
            self.scan_expr(value, frame, &mut replacement.statements);
        }
        frame.depth -= 1;
        if callee.as_ref().decl.is_some() {
            frame.expanding.pop();
        }

        out.extend(replacement.statements);
        CallOutcome::Expanded(result)
    }

    fn regenerate_expansion(
        &mut self,
        expansion: &mut InlineResult,
        caller: &str,
        callee: &str,
        outer_regenerated: bool,
    ) {
        let mut regenerator = Regenerator::new(self, caller, callee, outer_regenerated);
        for stmt in &mut expansion.statements {
            let _ = walk::walk_statement_mut(&mut regenerator, stmt);
        }
        if let Some(result) = &mut expansion.result {
            let _ = walk::walk_expr_mut(&mut regenerator, result);
        }
    }

    /// Run the inline pass over the methods of a regenerated class, then copy
    /// the closures those methods instantiate.
    fn regenerate_methods(&mut self, class: &mut ClassDef) {
        for method in &mut class.methods {
            let mut frame = self.frame(method.as_ref(), true);
            self.inline_block(method.as_mut().body.as_mut(), &mut frame);
        }
        for method in &mut class.methods {
            let label = method.as_ref().name.clone().unwrap_or_else(|| "init".to_string());
            let mut regenerator = Regenerator::new(self, &class.name, &label, true);
            let _ = walk::walk_function_mut(&mut regenerator, method.as_mut());
        }
    }
}

/// Finds the closure instantiations and mapping reads of an expansion and
/// points them at per-call-site copies.
struct Regenerator<'s, 'a> {
    state: &'s mut PassState<'a>,
    caller: String,
    callee: String,
    outer_regenerated: bool,
    mappings: AHashMap<(String, String), String>,
}

impl<'s, 'a> Regenerator<'s, 'a> {
    fn new(state: &'s mut PassState<'a>, caller: &str, callee: &str, outer_regenerated: bool) -> Self {
        Self {
            state,
            caller: caller.to_string(),
            callee: callee.to_string(),
            outer_regenerated,
            mappings: AHashMap::new(),
        }
    }

    /// Copy the closure class behind `new class(args)` when it needs its own
    /// identity here. Returns the new name.
    fn regenerate_closure(&mut self, class: &str, args: &mut Vec<Node<Expr>>) -> Option<String> {
        let lookup = self.state.lookup;
        let def = lookup.class(class)?;
        if def.kind != ClassKind::Closure || self.state.regenerating.iter().any(|name| name == class) {
            return None;
        }

        let lambdas: BTreeMap<usize, Node<Expr>> = args
            .iter()
            .enumerate()
            .filter(|(_, arg)| arg.as_ref().is_inline_lambda())
            .map(|(idx, arg)| (idx, arg.clone()))
            .collect();
        let names = self.state.registry.generator(&self.caller, &self.callee);
        let info = AnonymousObjectRegeneration::new(def, names)
            .with_lambdas(lambdas)
            .with_captured_outer_regenerated(self.outer_regenerated)
            .with_already_regenerated(self.state.registry.already_regenerated(class));
        if !info.should_regenerate(def.module == self.state.module) {
            return None;
        }

        let new_name = info.new_class_name().to_string();
        let mut copy = specialize_closure(def, &new_name, self.state.module, info.lambdas_to_inline());
        self.state.regenerating.push(class.to_string());
        self.state.regenerate_methods(&mut copy);
        self.state.regenerating.pop();

        trim_constructor_args(args, info.lambdas_to_inline());
        self.state.registry.record(&info, RegeneratedKind::Closure);
        self.state.stats.regenerated += 1;
        self.state.new_classes.push(copy);
        debug!(old = %class, new = %new_name, "regenerated closure class");
        Some(new_name)
    }

    /// Name of the trimmed copy of mapping `class` to read `field` from.
    fn regenerate_mapping(&mut self, class: &str, field: &str, span: Span) -> Option<String> {
        let key = (class.to_string(), field.to_string());
        if let Some(name) = self.mappings.get(&key) {
            return Some(name.clone());
        }
        let lookup = self.state.lookup;
        let def = lookup.class(class)?;
        if def.kind != ClassKind::WhenMapping {
            return None;
        }
        let names = self.state.registry.generator(&self.caller, &self.callee);
        let info = WhenMappingRegeneration::new(def, field, names)
            .with_already_regenerated(self.state.registry.already_regenerated(class));
        if !info.should_regenerate(def.module == self.state.module) {
            return None;
        }

        match trim_mapping(def, &info, self.state.module, span) {
            Ok(copy) => {
                let new_name = copy.name.clone();
                self.state.registry.record(&info, RegeneratedKind::WhenMapping);
                self.state.stats.regenerated += 1;
                self.state.new_classes.push(copy);
                self.mappings.insert(key, new_name.clone());
                Some(new_name)
            }
            Err(err) => {
                self.state.stats.regeneration_failures += 1;
                warn!(%err, "mapping class left shared");
                self.state.diagnostics.push(err.to_diagnostic(self.state.module));
                None
            }
        }
    }
}

impl VisitorMut for Regenerator<'_, '_> {
    fn visit_statement_mut(&mut self, stmt: &mut Node<Statement>) -> Walk {
        if matches!(stmt.as_ref(), Statement::Class(_)) {
            Walk::Skip
        } else {
            Walk::Descend
        }
    }

    fn visit_expr_mut(&mut self, expr: &mut Node<Expr>) -> Walk {
        let span = *expr.span();
        match expr.as_mut() {
            Expr::New { class, args } => {
                if let Some(new_name) = self.regenerate_closure(class, args) {
                    *class = new_name;
                }
                Walk::Descend
            }
            Expr::StaticField { class, field } => {
                if let Some(new_name) = self.regenerate_mapping(class, field, span) {
                    *class = new_name;
                }
                Walk::Skip
            }
            _ => Walk::Descend,
        }
    }
}
