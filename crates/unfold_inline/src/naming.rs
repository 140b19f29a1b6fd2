//! Fresh-name allocation and the substitution record of one expansion.

use ahash::{AHashMap, AHashSet};
use unfold_ast::walk::{self, Visitor, VisitorMut, Walk};
use unfold_ast::{Block, Expr, Function, Node, Statement};
use unfold_span::Span;

/// Collision-free identifiers for one caller function.
///
/// Every name seen in the caller, in inlined callee bodies, and every name
/// handed out is taken. Fresh names have the shape `<base>_<n>`; `n` starts at
/// zero per base and only grows.
#[derive(Debug, Default, Clone)]
pub struct NameAllocator {
    taken: AHashSet<String>,
    next_suffix: AHashMap<String, usize>,
}

impl NameAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_function(function: &Function) -> Self {
        let mut names = Self::new();
        names.reserve_function(function);
        names
    }

    pub fn reserve(&mut self, name: impl Into<String>) {
        self.taken.insert(name.into());
    }

    pub fn reserve_function(&mut self, function: &Function) {
        let mut collector = NameCollector {
            names: &mut self.taken,
        };
        collector.function_header(function);
        let _ = walk::walk_function(&mut collector, function);
    }

    pub fn reserve_block(&mut self, block: &Block) {
        let mut collector = NameCollector {
            names: &mut self.taken,
        };
        let _ = walk::walk_block(&mut collector, block);
    }

    pub fn reserve_expr(&mut self, expr: &Node<Expr>) {
        let mut collector = NameCollector {
            names: &mut self.taken,
        };
        let _ = walk::walk_expr(&mut collector, expr);
    }

    pub fn is_taken(&self, name: &str) -> bool {
        self.taken.contains(name)
    }

    pub fn fresh(&mut self, base: &str) -> String {
        let next = self.next_suffix.entry(base.to_string()).or_insert(0);
        loop {
            let candidate = format!("{base}_{next}");
            *next += 1;
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
        }
    }
}

struct NameCollector<'a> {
    names: &'a mut AHashSet<String>,
}

impl NameCollector<'_> {
    fn function_header(&mut self, function: &Function) {
        if let Some(name) = &function.name {
            self.names.insert(name.clone());
        }
        for name in function.param_names() {
            self.names.insert(name.to_string());
        }
    }
}

impl Visitor for NameCollector<'_> {
    fn visit_statement(&mut self, stmt: &Node<Statement>) -> Walk {
        match stmt.as_ref() {
            Statement::Var { name, .. } => {
                self.names.insert(name.as_ref().clone());
            }
            Statement::Function(func) => self.function_header(func.as_ref()),
            Statement::Labeled { label, .. }
            | Statement::Break(Some(label))
            | Statement::Continue(Some(label)) => {
                self.names.insert(label.clone());
            }
            _ => {}
        }
        Walk::Descend
    }

    fn visit_expr(&mut self, expr: &Node<Expr>) -> Walk {
        match expr.as_ref() {
            Expr::Identifier(name) => {
                self.names.insert(name.clone());
            }
            Expr::Function(func) => self.function_header(func.as_ref()),
            _ => {}
        }
        Walk::Descend
    }
}

/// Names a block declares in its own frame: `var`s and function declarations,
/// in source order, without looking into nested functions.
pub fn declared_names(block: &Block) -> Vec<String> {
    let mut names = Vec::new();
    collect_declared(&block.statements, &mut names);
    names
}

fn push_unique(name: &str, names: &mut Vec<String>) {
    if !names.iter().any(|known| known == name) {
        names.push(name.to_string());
    }
}

fn collect_declared(statements: &[Node<Statement>], names: &mut Vec<String>) {
    for stmt in statements {
        match stmt.as_ref() {
            Statement::Var { name, .. } => push_unique(name.as_ref(), names),
            Statement::Function(func) => {
                if let Some(name) = &func.as_ref().name {
                    push_unique(name, names);
                }
            }
            Statement::If {
                then_block,
                else_block,
                ..
            } => {
                collect_declared(&then_block.as_ref().statements, names);
                if let Some(block) = else_block {
                    collect_declared(&block.as_ref().statements, names);
                }
            }
            Statement::While { body, .. }
            | Statement::Labeled { body, .. }
            | Statement::Block(body) => collect_declared(&body.as_ref().statements, names),
            Statement::Try {
                body,
                finally_block,
            } => {
                collect_declared(&body.as_ref().statements, names);
                if let Some(block) = finally_block {
                    collect_declared(&block.as_ref().statements, names);
                }
            }
            Statement::Expr(_)
            | Statement::Return { .. }
            | Statement::Break(_)
            | Statement::Continue(_)
            | Statement::Class(_) => {}
        }
    }
}

/// Every label declared anywhere in `block`, in source order.
pub fn declared_labels(block: &Block) -> Vec<String> {
    struct Labels(Vec<String>);

    impl Visitor for Labels {
        fn visit_statement(&mut self, stmt: &Node<Statement>) -> Walk {
            if let Statement::Labeled { label, .. } = stmt.as_ref()
                && !self.0.contains(label)
            {
                self.0.push(label.clone());
            }
            Walk::Descend
        }
    }

    let mut labels = Labels(Vec::new());
    let _ = walk::walk_block(&mut labels, block);
    labels.0
}

/// Substitutions and synthetic declarations gathered while expanding one call.
///
/// Statement-level rewrites record what they need here; [`apply_rename_to`]
/// runs once at the very end so that names introduced late are covered too.
///
/// [`apply_rename_to`]: NamingContext::apply_rename_to
#[derive(Debug, Default, Clone)]
pub struct NamingContext {
    order: Vec<String>,
    substitutions: AHashMap<String, Node<Expr>>,
    labels: AHashMap<String, String>,
    this_replacement: Option<Node<Expr>>,
    new_vars: Vec<Node<Statement>>,
}

impl NamingContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace_name(&mut self, original: impl Into<String>, replacement: Node<Expr>) {
        let original = original.into();
        if self
            .substitutions
            .insert(original.clone(), replacement)
            .is_none()
        {
            self.order.push(original);
        }
    }

    pub fn replace_label(&mut self, original: impl Into<String>, fresh: impl Into<String>) {
        self.labels.insert(original.into(), fresh.into());
    }

    pub fn replace_this(&mut self, replacement: Node<Expr>) {
        self.this_replacement = Some(replacement);
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.substitutions.contains_key(name)
    }

    pub fn replacement(&self, name: &str) -> Option<&Node<Expr>> {
        self.substitutions.get(name)
    }

    pub fn this_replacement(&self) -> Option<&Node<Expr>> {
        self.this_replacement.as_ref()
    }

    /// Substitutions in the order they were recorded.
    pub fn substitutions(&self) -> impl Iterator<Item = (&str, &Node<Expr>)> {
        self.order.iter().filter_map(|name| {
            self.substitutions
                .get(name)
                .map(|replacement| (name.as_str(), replacement))
        })
    }

    /// Declare a variable ahead of the expanded body.
    pub fn new_var(&mut self, name: String, init: Option<Node<Expr>>, span: Span) {
        self.new_vars.push(Node::new(
            Statement::Var {
                name: Node::new(name, span),
                init,
            },
            span,
        ));
    }

    pub fn remove_var(&mut self, name: &str) -> bool {
        let before = self.new_vars.len();
        self.new_vars.retain(|stmt| {
            !matches!(stmt.as_ref(), Statement::Var { name: declared, .. } if declared.as_ref() == name)
        });
        self.new_vars.len() != before
    }

    pub fn new_vars(&self) -> &[Node<Statement>] {
        &self.new_vars
    }

    pub fn take_new_vars(&mut self) -> Vec<Node<Statement>> {
        std::mem::take(&mut self.new_vars)
    }

    pub fn apply_rename_to(&self, block: &mut Block) {
        let mut renamer = Renamer::new(self);
        let _ = walk::walk_block_mut(&mut renamer, block);
    }

    pub fn apply_rename_to_expr(&self, expr: &mut Node<Expr>) {
        let mut renamer = Renamer::new(self);
        let _ = walk::walk_expr_mut(&mut renamer, expr);
    }
}

struct Renamer<'a> {
    context: &'a NamingContext,
    shadowed: Vec<AHashSet<String>>,
}

impl<'a> Renamer<'a> {
    fn new(context: &'a NamingContext) -> Self {
        Self {
            context,
            shadowed: Vec::new(),
        }
    }

    fn is_shadowed(&self, name: &str) -> bool {
        self.shadowed.iter().any(|scope| scope.contains(name))
    }

    fn renamed(&self, name: &str) -> Option<String> {
        if self.is_shadowed(name) {
            return None;
        }
        self.context
            .substitutions
            .get(name)
            .and_then(|replacement| replacement.as_ref().as_identifier())
            .map(str::to_string)
    }

    fn rename_label(&self, label: &mut String) {
        if let Some(fresh) = self.context.labels.get(label.as_str()) {
            label.clone_from(fresh);
        }
    }

    /// Walk a nested function with its own parameters and locals hiding the
    /// substitutions of the same name.
    fn enter_function(&mut self, function: &mut Function) {
        let mut scope: AHashSet<String> = function.param_names().map(str::to_string).collect();
        scope.extend(declared_names(function.body.as_ref()));
        self.shadowed.push(scope);
        let _ = walk::walk_function_mut(self, function);
        self.shadowed.pop();
    }
}

impl VisitorMut for Renamer<'_> {
    fn visit_statement_mut(&mut self, stmt: &mut Node<Statement>) -> Walk {
        match stmt.as_mut() {
            Statement::Var { name, .. } => {
                if let Some(fresh) = self.renamed(name.as_ref()) {
                    name.replace(fresh);
                }
                Walk::Descend
            }
            Statement::Function(func) => {
                if let Some(name) = &func.as_ref().name
                    && let Some(fresh) = self.renamed(name)
                {
                    func.as_mut().name = Some(fresh);
                }
                self.enter_function(func.as_mut());
                Walk::Skip
            }
            Statement::Labeled { label, .. } => {
                self.rename_label(label);
                Walk::Descend
            }
            Statement::Break(Some(label)) | Statement::Continue(Some(label)) => {
                self.rename_label(label);
                Walk::Skip
            }
            // Methods see their own `this` and reach captured state via fields.
            Statement::Class(_) => Walk::Skip,
            _ => Walk::Descend,
        }
    }

    fn visit_expr_mut(&mut self, expr: &mut Node<Expr>) -> Walk {
        match expr.as_mut() {
            Expr::Identifier(name) => {
                if !self.is_shadowed(name)
                    && let Some(replacement) = self.context.substitutions.get(name.as_str())
                {
                    *expr = replacement.clone();
                }
                Walk::Skip
            }
            Expr::This => {
                if let Some(replacement) = &self.context.this_replacement {
                    *expr = replacement.clone();
                }
                Walk::Skip
            }
            Expr::Function(func) => {
                self.enter_function(func.as_mut());
                Walk::Skip
            }
            _ => Walk::Descend,
        }
    }
}
