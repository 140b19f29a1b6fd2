//! Terse constructors for hand-written trees.
//!
//! Everything built here carries [`Span::DUMMY`]; hosts that track positions
//! construct nodes with [`Node::new`] directly.

use unfold_span::Span;

use crate::nodes::{
    BinaryOp, Block, Call, ClassDef, ClassKind, DeclId, Expr, Field, Function, Literal, Node,
    Param, Statement,
};

pub fn node<T>(value: T) -> Node<T> {
    Node::new(value, Span::DUMMY)
}

pub fn ident(name: &str) -> Node<Expr> {
    node(Expr::ident(name))
}

pub fn int(value: i64) -> Node<Expr> {
    node(Expr::Literal(Literal::Int(value)))
}

pub fn string(value: &str) -> Node<Expr> {
    node(Expr::Literal(Literal::String(value.to_string())))
}

pub fn this() -> Node<Expr> {
    node(Expr::This)
}

pub fn member(object: Node<Expr>, field: &str) -> Node<Expr> {
    node(Expr::Member {
        object: Box::new(object),
        field: field.to_string(),
    })
}

pub fn static_field(class: &str, field: &str) -> Node<Expr> {
    node(Expr::StaticField {
        class: class.to_string(),
        field: field.to_string(),
    })
}

pub fn binary(op: BinaryOp, left: Node<Expr>, right: Node<Expr>) -> Node<Expr> {
    node(Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    })
}

pub fn assign(target: Node<Expr>, value: Node<Expr>) -> Node<Expr> {
    node(Expr::Assign {
        target: Box::new(target),
        value: Box::new(value),
    })
}

/// A plain call of `name`.
pub fn call(name: &str, args: Vec<Node<Expr>>) -> Node<Expr> {
    node(Expr::Call(Call::new(ident(name), args)))
}

/// A call of `name` marked for inlining and resolved to `decl`.
pub fn inline_call(name: &str, decl: DeclId, args: Vec<Node<Expr>>) -> Node<Expr> {
    node(Expr::Call(Call::inline(ident(name), args, Some(decl))))
}

/// An inline call through a value, e.g. a lambda parameter; resolved only once
/// the value is known.
pub fn inline_invoke(callee: Node<Expr>, args: Vec<Node<Expr>>) -> Node<Expr> {
    node(Expr::Call(Call::inline(callee, args, None)))
}

pub fn new_object(class: &str, args: Vec<Node<Expr>>) -> Node<Expr> {
    node(Expr::New {
        class: class.to_string(),
        args,
    })
}

pub fn expr_stmt(expr: Node<Expr>) -> Node<Statement> {
    node(Statement::Expr(expr))
}

pub fn var(name: &str, init: Option<Node<Expr>>) -> Node<Statement> {
    node(Statement::Var {
        name: node(name.to_string()),
        init,
    })
}

pub fn ret(value: Option<Node<Expr>>) -> Node<Statement> {
    node(Statement::Return {
        value,
        target: None,
    })
}

/// A return that exits `target` rather than the innermost function.
pub fn ret_to(target: DeclId, value: Option<Node<Expr>>) -> Node<Statement> {
    node(Statement::Return {
        value,
        target: Some(target),
    })
}

pub fn if_else(
    cond: Node<Expr>,
    then_branch: Vec<Node<Statement>>,
    else_branch: Option<Vec<Node<Statement>>>,
) -> Node<Statement> {
    node(Statement::If {
        cond,
        then_block: block(then_branch),
        else_block: else_branch.map(block),
    })
}

pub fn while_loop(cond: Node<Expr>, body: Vec<Node<Statement>>) -> Node<Statement> {
    node(Statement::While {
        cond,
        body: block(body),
    })
}

pub fn try_finally(
    body: Vec<Node<Statement>>,
    finally_block: Option<Vec<Node<Statement>>>,
) -> Node<Statement> {
    node(Statement::Try {
        body: block(body),
        finally_block: finally_block.map(block),
    })
}

pub fn block(statements: Vec<Node<Statement>>) -> Node<Block> {
    node(Block::new(statements))
}

pub fn param(name: &str) -> Node<Param> {
    node(Param::new(node(name.to_string()), None))
}

pub fn param_with_default(name: &str, default: Node<Expr>) -> Node<Param> {
    node(Param::new(node(name.to_string()), Some(default)))
}

/// A named function declared as `decl`.
pub fn function(
    name: &str,
    decl: DeclId,
    params: Vec<Node<Param>>,
    body: Vec<Node<Statement>>,
) -> Node<Function> {
    node(Function::new(name, params, block(body)).with_decl(decl))
}

pub fn function_stmt(function: Node<Function>) -> Node<Statement> {
    node(Statement::Function(function))
}

/// An inline lambda literal whose body belongs to `decl`.
pub fn lambda(decl: DeclId, params: Vec<Node<Param>>, body: Vec<Node<Statement>>) -> Node<Expr> {
    node(Expr::Function(node(Function::lambda(decl, params, block(body)))))
}

/// A closure literal that is a first-class value, never inlined.
pub fn closure(params: Vec<Node<Param>>, body: Vec<Node<Statement>>) -> Node<Expr> {
    node(Expr::Function(node(Function::anonymous(params, block(body)))))
}

pub fn class(
    name: &str,
    module: &str,
    kind: ClassKind,
    fields: Vec<Field>,
    methods: Vec<Node<Function>>,
) -> ClassDef {
    let mut class = ClassDef::new(name, module, kind);
    class.fields = fields.into_iter().map(node).collect();
    class.methods = methods;
    class
}
