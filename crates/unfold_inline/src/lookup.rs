//! Resolution of declarations to the bodies the inliner copies.

use ahash::AHashMap;
use unfold_ast::{Block, ClassDef, DeclId, Function, Node, Program, Statement};

/// Host-supplied access to callee bodies and synthetic classes.
pub trait BodyLookup {
    fn function(&self, decl: DeclId) -> Option<&Node<Function>>;

    fn class(&self, name: &str) -> Option<&ClassDef>;
}

/// In-memory declaration table, usually built from one or more programs.
#[derive(Debug, Default, Clone)]
pub struct DeclarationTable {
    functions: AHashMap<DeclId, Node<Function>>,
    classes: AHashMap<String, ClassDef>,
}

impl DeclarationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every declared function and class of `program`.
    pub fn from_program(program: &Program) -> Self {
        let mut table = Self::new();
        table.add_program(program);
        table
    }

    /// Index `program` on top of the existing entries; later entries win.
    pub fn add_program(&mut self, program: &Program) {
        self.index_statements(&program.statements);
    }

    /// Register a function body. Functions without a declaration id cannot be
    /// referenced by calls and are ignored.
    pub fn insert_function(&mut self, function: Node<Function>) -> bool {
        let Some(decl) = function.as_ref().decl else {
            return false;
        };
        self.functions.insert(decl, function);
        true
    }

    pub fn insert_class(&mut self, class: ClassDef) {
        self.classes.insert(class.name.clone(), class);
    }

    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    fn index_statements(&mut self, statements: &[Node<Statement>]) {
        for stmt in statements {
            match stmt.as_ref() {
                Statement::Function(func) => {
                    self.index_block(func.as_ref().body.as_ref());
                    self.insert_function(func.clone());
                }
                Statement::Class(class) => self.insert_class(class.as_ref().clone()),
                _ => {}
            }
        }
    }

    fn index_block(&mut self, block: &Block) {
        self.index_statements(&block.statements);
    }
}

impl BodyLookup for DeclarationTable {
    fn function(&self, decl: DeclId) -> Option<&Node<Function>> {
        self.functions.get(&decl)
    }

    fn class(&self, name: &str) -> Option<&ClassDef> {
        self.classes.get(name)
    }
}
