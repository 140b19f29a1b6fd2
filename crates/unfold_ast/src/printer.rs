//! JavaScript-flavoured rendering of the tree, used in logs and tests.

use std::fmt::{self, Display, Write as _};

use crate::nodes::{
    BinaryOp, Block, ClassDef, ClassKind, Expr, Function, Literal, Node, Program, Statement,
    UnaryOp,
};

const INDENT: &str = "    ";

struct Printer {
    out: String,
    depth: usize,
}

impl Printer {
    fn new() -> Self {
        Self {
            out: String::new(),
            depth: 0,
        }
    }

    fn line_start(&mut self) {
        for _ in 0..self.depth {
            self.out.push_str(INDENT);
        }
    }

    fn block_body(&mut self, block: &Block) {
        self.out.push_str("{\n");
        self.depth += 1;
        for stmt in &block.statements {
            self.statement(stmt.as_ref());
        }
        self.depth -= 1;
        self.line_start();
        self.out.push('}');
    }

    fn statement(&mut self, stmt: &Statement) {
        self.line_start();
        match stmt {
            Statement::Var { name, init } => {
                let _ = write!(self.out, "var {}", name.as_ref());
                if let Some(init) = init {
                    self.out.push_str(" = ");
                    self.expr(init.as_ref());
                }
                self.out.push(';');
            }
            Statement::Function(func) => self.function(func.as_ref()),
            Statement::Class(class) => self.class(class.as_ref()),
            Statement::Expr(expr) => {
                self.expr(expr.as_ref());
                self.out.push(';');
            }
            Statement::Return { value, target } => {
                self.out.push_str("return");
                if let Some(target) = target {
                    let _ = write!(self.out, "@{target}");
                }
                if let Some(value) = value {
                    self.out.push(' ');
                    self.expr(value.as_ref());
                }
                self.out.push(';');
            }
            Statement::If {
                cond,
                then_block,
                else_block,
            } => {
                self.out.push_str("if (");
                self.expr(cond.as_ref());
                self.out.push_str(") ");
                self.block_body(then_block.as_ref());
                if let Some(block) = else_block {
                    self.out.push_str(" else ");
                    self.block_body(block.as_ref());
                }
            }
            Statement::While { cond, body } => {
                self.out.push_str("while (");
                self.expr(cond.as_ref());
                self.out.push_str(") ");
                self.block_body(body.as_ref());
            }
            Statement::Labeled { label, body } => {
                let _ = write!(self.out, "{label}: ");
                self.block_body(body.as_ref());
            }
            Statement::Break(label) => match label {
                Some(label) => {
                    let _ = write!(self.out, "break {label};");
                }
                None => self.out.push_str("break;"),
            },
            Statement::Continue(label) => match label {
                Some(label) => {
                    let _ = write!(self.out, "continue {label};");
                }
                None => self.out.push_str("continue;"),
            },
            Statement::Try {
                body,
                finally_block,
            } => {
                self.out.push_str("try ");
                self.block_body(body.as_ref());
                if let Some(block) = finally_block {
                    self.out.push_str(" finally ");
                    self.block_body(block.as_ref());
                }
            }
            Statement::Block(block) => self.block_body(block.as_ref()),
        }
        self.out.push('\n');
    }

    fn function(&mut self, func: &Function) {
        self.out.push_str("function");
        if let Some(name) = &func.name {
            let _ = write!(self.out, " {name}");
        }
        self.out.push('(');
        for (idx, param) in func.params.iter().enumerate() {
            if idx > 0 {
                self.out.push_str(", ");
            }
            self.out.push_str(param.as_ref().name.as_ref());
            if let Some(default) = &param.as_ref().default {
                self.out.push_str(" = ");
                self.expr(default.as_ref());
            }
        }
        self.out.push_str(") ");
        self.block_body(func.body.as_ref());
    }

    fn class(&mut self, class: &ClassDef) {
        let kind = match class.kind {
            ClassKind::Closure => "closure",
            ClassKind::WhenMapping => "mapping",
        };
        let _ = writeln!(self.out, "class {} /* {kind} in {} */ {{", class.name, class.module);
        self.depth += 1;
        for field in &class.fields {
            self.line_start();
            let field = field.as_ref();
            let keyword = if field.captured { "captured" } else { "field" };
            let _ = writeln!(self.out, "{keyword} {};", field.name);
        }
        for method in &class.methods {
            self.line_start();
            self.function(method.as_ref());
            self.out.push('\n');
        }
        self.depth -= 1;
        self.line_start();
        self.out.push('}');
    }

    fn operand(&mut self, expr: &Node<Expr>) {
        let compound = matches!(
            expr.as_ref(),
            Expr::Binary { .. }
                | Expr::Assign { .. }
                | Expr::Conditional { .. }
                | Expr::Function(_)
                | Expr::Unary { .. }
        );
        if compound {
            self.out.push('(');
            self.expr(expr.as_ref());
            self.out.push(')');
        } else {
            self.expr(expr.as_ref());
        }
    }

    fn args(&mut self, args: &[Node<Expr>]) {
        self.out.push('(');
        for (idx, arg) in args.iter().enumerate() {
            if idx > 0 {
                self.out.push_str(", ");
            }
            self.expr(arg.as_ref());
        }
        self.out.push(')');
    }

    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Literal(lit) => {
                let _ = write!(self.out, "{lit}");
            }
            Expr::Identifier(name) => self.out.push_str(name),
            Expr::This => self.out.push_str("this"),
            Expr::Member { object, field } => {
                self.operand(object);
                let _ = write!(self.out, ".{field}");
            }
            Expr::StaticField { class, field } => {
                let _ = write!(self.out, "{class}.{field}");
            }
            Expr::Call(call) => {
                self.operand(&call.callee);
                if call.explicit_receiver {
                    self.out.push_str(".call");
                }
                self.args(&call.args);
            }
            Expr::Binary { op, left, right } => {
                self.operand(left);
                let _ = write!(self.out, " {op} ");
                self.operand(right);
            }
            Expr::Unary { op, expr } => {
                let _ = write!(self.out, "{op}");
                self.operand(expr);
            }
            Expr::Assign { target, value } => {
                self.expr(target.as_ref().as_ref());
                self.out.push_str(" = ");
                self.expr(value.as_ref().as_ref());
            }
            Expr::Conditional {
                cond,
                then_branch,
                else_branch,
            } => {
                self.operand(cond);
                self.out.push_str(" ? ");
                self.operand(then_branch);
                self.out.push_str(" : ");
                self.operand(else_branch);
            }
            Expr::Function(func) => self.function(func.as_ref()),
            Expr::Object(props) => {
                if props.is_empty() {
                    self.out.push_str("{}");
                    return;
                }
                self.out.push_str("{ ");
                for (idx, (key, value)) in props.iter().enumerate() {
                    if idx > 0 {
                        self.out.push_str(", ");
                    }
                    let _ = write!(self.out, "{key}: ");
                    self.expr(value.as_ref());
                }
                self.out.push_str(" }");
            }
            Expr::New { class, args } => {
                let _ = write!(self.out, "new {class}");
                self.args(args);
            }
        }
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(value) => write!(f, "{value}"),
            Literal::String(value) => write!(f, "{value:?}"),
            Literal::Bool(value) => write!(f, "{value}"),
            Literal::Null => f.write_str("null"),
            Literal::Unit => f.write_str("undefined"),
        }
    }
}

impl Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "===",
            BinaryOp::Ne => "!==",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::LtEq => "<=",
            BinaryOp::GtEq => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        };
        f.write_str(op)
    }
}

impl Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOp::Neg => f.write_str("-"),
            UnaryOp::Not => f.write_str("!"),
        }
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut printer = Printer::new();
        printer.expr(self);
        f.write_str(&printer.out)
    }
}

impl Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut printer = Printer::new();
        printer.statement(self);
        f.write_str(&printer.out)
    }
}

impl Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render_statements(&self.statements))
    }
}

impl Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut printer = Printer::new();
        printer.function(self);
        f.write_str(&printer.out)
    }
}

impl Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render_statements(&self.statements))
    }
}

/// Render a statement list, one statement per line.
pub fn render_statements(statements: &[Node<Statement>]) -> String {
    let mut printer = Printer::new();
    for stmt in statements {
        printer.statement(stmt.as_ref());
    }
    printer.out
}
