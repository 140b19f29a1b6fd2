use std::convert::{AsMut, AsRef};
use std::fmt::{self, Debug, Display};
use std::hash::{Hash, Hasher};

use unfold_span::Span;

/// A node in the tree with an associated span.
#[derive(Debug, Clone)]
pub struct Node<T> {
    value: T,
    span: Span,
}

impl<T> Node<T> {
    pub fn new(value: T, span: impl Into<Span>) -> Self {
        Self {
            value,
            span: span.into(),
        }
    }

    pub fn into_inner(self) -> T {
        self.value
    }

    pub fn into_parts(self) -> (T, Span) {
        (self.value, self.span)
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn map<U, F>(self, f: F) -> Node<U>
    where
        F: FnOnce(T) -> U,
    {
        Node {
            value: f(self.value),
            span: self.span,
        }
    }

    /// Swap the payload for `value`, keeping the span, and return the old payload.
    pub fn replace(&mut self, value: T) -> T {
        std::mem::replace(&mut self.value, value)
    }
}

impl<T> AsRef<T> for Node<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

impl<T> AsMut<T> for Node<T> {
    fn as_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T> PartialEq for Node<T>
where
    T: PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T> Eq for Node<T> where T: Eq {}

impl<T> Hash for Node<T>
where
    T: Hash,
{
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<T> Display for Node<T>
where
    T: Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// Stable identity of a resolved declaration.
///
/// Bodies of functions and lambdas carry the id of the declaration they belong
/// to, and `return` statements carry the id of the declaration they exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclId(pub u32);

impl Display for DeclId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One compilation unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    pub module: String,
    pub statements: Vec<Node<Statement>>,
}

impl Program {
    pub fn new(module: impl Into<String>, statements: Vec<Node<Statement>>) -> Self {
        Self {
            module: module.into(),
            statements,
        }
    }

    /// Get all top-level function definitions in the program
    pub fn functions(&self) -> impl Iterator<Item = &Node<Function>> {
        self.statements.iter().filter_map(|stmt| {
            if let Statement::Function(func) = stmt.as_ref() {
                Some(func)
            } else {
                None
            }
        })
    }

    /// Get all synthetic class definitions in the program
    pub fn classes(&self) -> impl Iterator<Item = &Node<ClassDef>> {
        self.statements.iter().filter_map(|stmt| {
            if let Statement::Class(class) = stmt.as_ref() {
                Some(class)
            } else {
                None
            }
        })
    }

    /// Count the total number of statements recursively
    pub fn statement_count(&self) -> usize {
        self.statements
            .iter()
            .map(|s| s.as_ref().recursive_count())
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub name: Option<String>,
    pub decl: Option<DeclId>,
    pub params: Vec<Node<Param>>,
    pub body: Node<Block>,
    /// Lambda literal translated for inlining; never cached in a temporary.
    pub inline_lambda: bool,
}

impl Function {
    pub fn new(name: impl Into<String>, params: Vec<Node<Param>>, body: Node<Block>) -> Self {
        Self {
            name: Some(name.into()),
            decl: None,
            params,
            body,
            inline_lambda: false,
        }
    }

    pub fn anonymous(params: Vec<Node<Param>>, body: Node<Block>) -> Self {
        Self {
            name: None,
            decl: None,
            params,
            body,
            inline_lambda: false,
        }
    }

    /// An inline lambda literal whose body belongs to `decl`.
    pub fn lambda(decl: DeclId, params: Vec<Node<Param>>, body: Node<Block>) -> Self {
        Self {
            name: None,
            decl: Some(decl),
            params,
            body,
            inline_lambda: true,
        }
    }

    pub fn with_decl(mut self, decl: DeclId) -> Self {
        self.decl = Some(decl);
        self
    }

    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(|p| p.as_ref().name.as_ref().as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: Node<String>,
    pub default: Option<Node<Expr>>,
}

impl Param {
    pub fn new(name: Node<String>, default: Option<Node<Expr>>) -> Self {
        Self { name, default }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Block {
    pub statements: Vec<Node<Statement>>,
}

impl Block {
    pub fn new(statements: Vec<Node<Statement>>) -> Self {
        Self { statements }
    }

    /// Recursively count statements
    pub fn recursive_count(&self) -> usize {
        self.statements
            .iter()
            .map(|s| s.as_ref().recursive_count())
            .sum()
    }

    /// Check if block is empty
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    // Declarations
    Var {
        name: Node<String>,
        init: Option<Node<Expr>>,
    },
    Function(Node<Function>),
    Class(Node<ClassDef>),

    // Expressions as statements
    Expr(Node<Expr>),

    // Control flow
    Return {
        value: Option<Node<Expr>>,
        /// Declaration this return exits; `None` means the innermost function.
        target: Option<DeclId>,
    },
    If {
        cond: Node<Expr>,
        then_block: Node<Block>,
        else_block: Option<Node<Block>>,
    },
    While {
        cond: Node<Expr>,
        body: Node<Block>,
    },
    Labeled {
        label: String,
        body: Node<Block>,
    },
    Break(Option<String>),
    Continue(Option<String>),
    Try {
        body: Node<Block>,
        finally_block: Option<Node<Block>>,
    },

    // Blocks (for grouping)
    Block(Node<Block>),
}

impl Statement {
    /// Recursively count statements
    pub fn recursive_count(&self) -> usize {
        match self {
            Statement::Var { .. }
            | Statement::Expr(_)
            | Statement::Return { .. }
            | Statement::Break(_)
            | Statement::Continue(_)
            | Statement::Class(_) => 1,
            Statement::If {
                then_block,
                else_block,
                ..
            } => {
                1 + then_block.as_ref().recursive_count()
                    + else_block
                        .as_ref()
                        .map_or(0, |block| block.as_ref().recursive_count())
            }
            Statement::While { body, .. } | Statement::Labeled { body, .. } => {
                1 + body.as_ref().recursive_count()
            }
            Statement::Try {
                body,
                finally_block,
            } => {
                1 + body.as_ref().recursive_count()
                    + finally_block
                        .as_ref()
                        .map_or(0, |block| block.as_ref().recursive_count())
            }
            Statement::Function(func) => 1 + func.as_ref().body.as_ref().recursive_count(),
            Statement::Block(block) => block.as_ref().recursive_count(),
        }
    }

    pub fn is_return(&self) -> bool {
        matches!(self, Statement::Return { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Literal(Literal),

    // Variables and access
    Identifier(String),
    This,
    Member {
        object: Box<Node<Expr>>,
        field: String,
    },
    StaticField {
        class: String,
        field: String,
    },

    Call(Call),

    Binary {
        op: BinaryOp,
        left: Box<Node<Expr>>,
        right: Box<Node<Expr>>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Node<Expr>>,
    },
    Assign {
        target: Box<Node<Expr>>,
        value: Box<Node<Expr>>,
    },
    Conditional {
        cond: Box<Node<Expr>>,
        then_branch: Box<Node<Expr>>,
        else_branch: Box<Node<Expr>>,
    },

    // Closures and objects
    Function(Node<Function>),
    Object(Vec<(String, Node<Expr>)>),
    New {
        class: String,
        args: Vec<Node<Expr>>,
    },
}

impl Expr {
    pub fn ident(name: impl Into<String>) -> Self {
        Expr::Identifier(name.into())
    }

    pub fn as_identifier(&self) -> Option<&str> {
        match self {
            Expr::Identifier(name) => Some(name),
            _ => None,
        }
    }

    /// True for a lambda literal that must stay inline-able where it is used.
    pub fn is_inline_lambda(&self) -> bool {
        matches!(self, Expr::Function(func) if func.as_ref().inline_lambda)
    }
}

/// An invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub callee: Box<Node<Expr>>,
    pub args: Vec<Node<Expr>>,
    /// Resolved declaration of the callee, when the host knows it.
    pub decl: Option<DeclId>,
    /// Upstream verdict: this call site is an inline candidate.
    pub inline: bool,
    /// `f.call(receiver, args...)` form; the first argument is the receiver.
    pub explicit_receiver: bool,
}

impl Call {
    pub fn new(callee: Node<Expr>, args: Vec<Node<Expr>>) -> Self {
        Self {
            callee: Box::new(callee),
            args,
            decl: None,
            inline: false,
            explicit_receiver: false,
        }
    }

    /// A call the upstream selection marked for inlining.
    pub fn inline(callee: Node<Expr>, args: Vec<Node<Expr>>, decl: Option<DeclId>) -> Self {
        Self {
            callee: Box::new(callee),
            args,
            decl,
            inline: true,
            explicit_receiver: false,
        }
    }

    /// Simple name of the callee, used to derive label prefixes.
    pub fn simple_name(&self) -> Option<&str> {
        match self.callee.as_ref().as_ref() {
            Expr::Identifier(name) => Some(name),
            Expr::Member { field, .. } => Some(field),
            _ => None,
        }
    }

    /// Receiver expression supplied by this call, if any.
    pub fn receiver(&self) -> Option<&Node<Expr>> {
        if self.explicit_receiver {
            return self.args.first();
        }
        match self.callee.as_ref().as_ref() {
            Expr::Member { object, .. } => Some(object),
            _ => None,
        }
    }

    /// Arguments bound to the callee's parameters.
    pub fn bound_args(&self) -> &[Node<Expr>] {
        if self.explicit_receiver && !self.args.is_empty() {
            &self.args[1..]
        } else {
            &self.args
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Literal {
    Int(i64),
    String(String),
    Bool(bool),
    Null,
    Unit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,

    // Comparison
    Eq,
    Ne,
    Lt,
    Gt,
    LtEq,
    GtEq,

    // Logical
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Not,
}

/// Synthetic class backing a closure object or a mapping table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDef {
    pub name: String,
    pub module: String,
    pub kind: ClassKind,
    pub fields: Vec<Node<Field>>,
    pub methods: Vec<Node<Function>>,
    /// Instances may be reached through static access from code the inliner
    /// does not rewrite, e.g. a local function of an outer scope.
    pub static_origin: bool,
    /// Generic parameters must be reified per call site.
    pub reified: bool,
}

impl ClassDef {
    pub fn new(name: impl Into<String>, module: impl Into<String>, kind: ClassKind) -> Self {
        Self {
            name: name.into(),
            module: module.into(),
            kind,
            fields: Vec::new(),
            methods: Vec::new(),
            static_origin: false,
            reified: false,
        }
    }

    /// Captured fields in constructor order.
    pub fn captured_fields(&self) -> impl Iterator<Item = &Node<Field>> {
        self.fields.iter().filter(|field| field.as_ref().captured)
    }

    pub fn field(&self, name: &str) -> Option<&Node<Field>> {
        self.fields.iter().find(|field| field.as_ref().name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassKind {
    /// Anonymous object or lambda class instantiated with captured values.
    Closure,
    /// Per-file table mapping enum ordinals for `when`/`switch`.
    WhenMapping,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    /// Initialised from a constructor argument.
    pub captured: bool,
}

impl Field {
    pub fn captured(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            captured: true,
        }
    }

    pub fn plain(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            captured: false,
        }
    }
}
