//! Per-call-site copies of closure and mapping classes.
//!
//! A closure class instantiated inside an expansion may capture inline
//! lambdas, or may come from another module; either way the expansion needs
//! its own copy so that specialising it does not corrupt the shared original.
//! Mapping tables are copied down to the single field the expansion reads.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::rc::Rc;

use ahash::{AHashMap, AHashSet};
use once_cell::unsync::OnceCell;
use serde::{Deserialize, Serialize};
use unfold_ast::walk::{self, Visitor, VisitorMut, Walk};
use unfold_ast::{ClassDef, ClassKind, Expr, Node, Statement};
use unfold_span::Span;

use crate::error::{InlineError, Result};

/// A class that may need a fresh identity per call site.
pub trait RegenerationInfo {
    fn old_class_name(&self) -> &str;

    /// Name of the copy; computed on first use and stable afterwards.
    fn new_class_name(&self) -> &str;

    fn should_regenerate(&self, same_module: bool) -> bool;

    /// Whether the original may be dropped from the output once every use has
    /// been redirected to copies.
    fn can_remove_after_transformation(&self) -> bool;
}

/// Generates `<caller>$inlined$<callee>$<n>` class names.
///
/// Clones share the counter, so every name handed out for one prefix is new.
#[derive(Debug, Clone)]
pub struct ClassNameGenerator {
    prefix: String,
    next: Rc<Cell<usize>>,
}

impl ClassNameGenerator {
    pub fn new(caller: &str, callee: &str) -> Self {
        Self {
            prefix: format!("{caller}$inlined${callee}"),
            next: Rc::new(Cell::new(1)),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn next_name(&self) -> String {
        let n = self.next.get();
        self.next.set(n + 1);
        format!("{}${n}", self.prefix)
    }
}

/// Closure class instantiated inside an expansion.
#[derive(Debug)]
pub struct AnonymousObjectRegeneration {
    old_name: String,
    /// Constructor argument index to the inline lambda passed there.
    lambdas_to_inline: BTreeMap<usize, Node<Expr>>,
    captured_outer_regenerated: bool,
    already_regenerated: bool,
    needs_reification: bool,
    static_origin: bool,
    names: ClassNameGenerator,
    new_name: OnceCell<String>,
}

impl AnonymousObjectRegeneration {
    pub fn new(class: &ClassDef, names: ClassNameGenerator) -> Self {
        Self {
            old_name: class.name.clone(),
            lambdas_to_inline: BTreeMap::new(),
            captured_outer_regenerated: false,
            already_regenerated: false,
            needs_reification: class.reified,
            static_origin: class.static_origin,
            names,
            new_name: OnceCell::new(),
        }
    }

    pub fn with_lambdas(mut self, lambdas: BTreeMap<usize, Node<Expr>>) -> Self {
        self.lambdas_to_inline = lambdas;
        self
    }

    pub fn with_captured_outer_regenerated(mut self, regenerated: bool) -> Self {
        self.captured_outer_regenerated = regenerated;
        self
    }

    pub fn with_already_regenerated(mut self, already: bool) -> Self {
        self.already_regenerated = already;
        self
    }

    pub fn lambdas_to_inline(&self) -> &BTreeMap<usize, Node<Expr>> {
        &self.lambdas_to_inline
    }
}

impl RegenerationInfo for AnonymousObjectRegeneration {
    fn old_class_name(&self) -> &str {
        &self.old_name
    }

    fn new_class_name(&self) -> &str {
        self.new_name.get_or_init(|| self.names.next_name())
    }

    fn should_regenerate(&self, same_module: bool) -> bool {
        !self.already_regenerated
            && (!self.lambdas_to_inline.is_empty()
                || !same_module
                || self.captured_outer_regenerated
                || self.needs_reification)
    }

    fn can_remove_after_transformation(&self) -> bool {
        // Static access from an outer local function may still reach the original.
        !self.static_origin
    }
}

/// Mapping table read through a static field inside an expansion.
#[derive(Debug)]
pub struct WhenMappingRegeneration {
    old_name: String,
    field: String,
    already_regenerated: bool,
    names: ClassNameGenerator,
    new_name: OnceCell<String>,
}

impl WhenMappingRegeneration {
    pub fn new(class: &ClassDef, field: impl Into<String>, names: ClassNameGenerator) -> Self {
        Self {
            old_name: class.name.clone(),
            field: field.into(),
            already_regenerated: false,
            names,
            new_name: OnceCell::new(),
        }
    }

    pub fn with_already_regenerated(mut self, already: bool) -> Self {
        self.already_regenerated = already;
        self
    }

    pub fn field(&self) -> &str {
        &self.field
    }
}

impl RegenerationInfo for WhenMappingRegeneration {
    fn old_class_name(&self) -> &str {
        &self.old_name
    }

    fn new_class_name(&self) -> &str {
        self.new_name
            .get_or_init(|| format!("{}${}", self.names.next_name(), self.old_name))
    }

    fn should_regenerate(&self, same_module: bool) -> bool {
        !same_module && !self.already_regenerated
    }

    fn can_remove_after_transformation(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegeneratedKind {
    Closure,
    WhenMapping,
}

/// One regenerated class as reported to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegenerationRecord {
    pub old_name: String,
    pub new_name: String,
    pub removable: bool,
    pub kind: RegeneratedKind,
}

/// Append-only record of every class regenerated in one compilation unit.
#[derive(Debug, Default)]
pub struct RegenerationRegistry {
    records: Vec<RegenerationRecord>,
    regenerated: AHashSet<String>,
    generators: AHashMap<String, ClassNameGenerator>,
}

#[derive(Serialize)]
struct RegistryExport<'a> {
    records: &'a [RegenerationRecord],
    removable_originals: Vec<String>,
}

impl RegenerationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name generator for classes copied while inlining `callee` into `caller`.
    pub fn generator(&mut self, caller: &str, callee: &str) -> ClassNameGenerator {
        let fresh = ClassNameGenerator::new(caller, callee);
        self.generators
            .entry(fresh.prefix().to_string())
            .or_insert(fresh)
            .clone()
    }

    pub fn record(&mut self, info: &dyn RegenerationInfo, kind: RegeneratedKind) -> &RegenerationRecord {
        let record = RegenerationRecord {
            old_name: info.old_class_name().to_string(),
            new_name: info.new_class_name().to_string(),
            removable: info.can_remove_after_transformation(),
            kind,
        };
        self.regenerated.insert(record.new_name.clone());
        self.records.push(record);
        &self.records[self.records.len() - 1]
    }

    /// Whether `class` is itself the product of a regeneration.
    pub fn already_regenerated(&self, class: &str) -> bool {
        self.regenerated.contains(class)
    }

    pub fn records(&self) -> &[RegenerationRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Originals that every record marks removable, in first-seen order.
    pub fn removable_originals(&self) -> Vec<String> {
        let mut originals: Vec<String> = Vec::new();
        for record in &self.records {
            if !originals.contains(&record.old_name) {
                originals.push(record.old_name.clone());
            }
        }
        originals.retain(|name| {
            self.records
                .iter()
                .filter(|record| &record.old_name == name)
                .all(|record| record.removable)
        });
        originals
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&RegistryExport {
            records: &self.records,
            removable_originals: self.removable_originals(),
        })
    }
}

struct FieldInliner<'a> {
    fields: &'a AHashMap<String, Node<Expr>>,
}

impl<'a> FieldInliner<'a> {
    fn captured_lambda(&self, expr: &Expr) -> Option<&'a Node<Expr>> {
        let Expr::Member { object, field } = expr else {
            return None;
        };
        if !matches!(object.as_ref().as_ref(), Expr::This) {
            return None;
        }
        self.fields.get(field)
    }
}

impl VisitorMut for FieldInliner<'_> {
    fn visit_statement_mut(&mut self, stmt: &mut Node<Statement>) -> Walk {
        if matches!(stmt.as_ref(), Statement::Class(_)) {
            Walk::Skip
        } else {
            Walk::Descend
        }
    }

    fn visit_expr_mut(&mut self, expr: &mut Node<Expr>) -> Walk {
        if let Expr::Call(call) = expr.as_mut()
            && let Some(lambda) = self.captured_lambda(call.callee.as_ref().as_ref())
        {
            call.callee.replace(lambda.as_ref().clone());
            call.inline = true;
            for arg in &mut call.args {
                let _ = walk::walk_expr_mut(self, arg);
            }
            return Walk::Skip;
        }
        if let Some(lambda) = self.captured_lambda(expr.as_ref()) {
            *expr = lambda.clone();
            return Walk::Skip;
        }
        Walk::Descend
    }
}

/// Copy `class` as `new_name` in `module` with the captured fields at the
/// positions of `lambdas` removed and their reads replaced by the lambdas.
///
/// Calls through such a field become inline calls of the lambda literal.
pub fn specialize_closure(
    class: &ClassDef,
    new_name: &str,
    module: &str,
    lambdas: &BTreeMap<usize, Node<Expr>>,
) -> ClassDef {
    let mut inlined: AHashMap<String, Node<Expr>> = AHashMap::new();
    for (idx, field) in class.captured_fields().enumerate() {
        if let Some(lambda) = lambdas.get(&idx) {
            inlined.insert(field.as_ref().name.clone(), lambda.clone());
        }
    }

    let mut copy = ClassDef::new(new_name, module, class.kind);
    copy.fields = class
        .fields
        .iter()
        .filter(|field| !inlined.contains_key(&field.as_ref().name))
        .cloned()
        .collect();
    copy.methods = class.methods.clone();

    let mut replacer = FieldInliner { fields: &inlined };
    for method in &mut copy.methods {
        let _ = walk::walk_function_mut(&mut replacer, method.as_mut());
    }
    copy
}

/// Drop the constructor arguments consumed by [`specialize_closure`].
pub fn trim_constructor_args(args: &mut Vec<Node<Expr>>, lambdas: &BTreeMap<usize, Node<Expr>>) {
    let mut idx = 0;
    args.retain(|_| {
        let keep = !lambdas.contains_key(&idx);
        idx += 1;
        keep
    });
}

fn mentions_field(stmt: &Node<Statement>, field: &str) -> bool {
    struct Mention<'a> {
        field: &'a str,
        found: bool,
    }

    impl Visitor for Mention<'_> {
        fn visit_expr(&mut self, expr: &Node<Expr>) -> Walk {
            match expr.as_ref() {
                Expr::Member { field, .. } | Expr::StaticField { field, .. } if field == self.field => {
                    self.found = true;
                    Walk::Stop
                }
                _ => Walk::Descend,
            }
        }
    }

    let mut mention = Mention {
        field,
        found: false,
    };
    let _ = walk::walk_statement(&mut mention, stmt);
    mention.found
}

struct Redirect<'a> {
    from: &'a str,
    to: &'a str,
}

impl VisitorMut for Redirect<'_> {
    fn visit_expr_mut(&mut self, expr: &mut Node<Expr>) -> Walk {
        if let Expr::StaticField { class, .. } = expr.as_mut()
            && class == self.from
        {
            *class = self.to.to_string();
        }
        Walk::Descend
    }
}

/// Copy of a mapping class holding only `info.field()` and the initializer
/// statements that mention it.
///
/// The class must have exactly one method and must declare the field; the
/// copy's name is only drawn once both hold.
pub fn trim_mapping(
    class: &ClassDef,
    info: &WhenMappingRegeneration,
    module: &str,
    span: Span,
) -> Result<ClassDef> {
    let field = info.field();
    if class.kind != ClassKind::WhenMapping {
        return Err(InlineError::MalformedBody {
            class: class.name.clone(),
            reason: "not a mapping class".to_string(),
            span,
        });
    }
    let [initializer] = class.methods.as_slice() else {
        let names: Vec<&str> = class
            .methods
            .iter()
            .map(|method| method.as_ref().name.as_deref().unwrap_or("<anonymous>"))
            .collect();
        return Err(InlineError::MalformedBody {
            class: class.name.clone(),
            reason: format!(
                "expected exactly one method, found {}: [{}]",
                names.len(),
                names.join(", ")
            ),
            span,
        });
    };
    let Some(kept_field) = class.field(field) else {
        return Err(InlineError::MalformedBody {
            class: class.name.clone(),
            reason: format!("no field `{field}`"),
            span,
        });
    };

    let new_name = info.new_class_name();
    let mut method = initializer.clone();
    method
        .as_mut()
        .body
        .as_mut()
        .statements
        .retain(|stmt| mentions_field(stmt, field));
    let mut redirect = Redirect {
        from: &class.name,
        to: new_name,
    };
    let _ = walk::walk_function_mut(&mut redirect, method.as_mut());

    let mut copy = ClassDef::new(new_name, module, ClassKind::WhenMapping);
    copy.fields = vec![kept_field.clone()];
    copy.methods = vec![method];
    Ok(copy)
}

#[cfg(test)]
mod tests {
    #![expect(clippy::panic, reason = "Panicking on test failures is acceptable")]

    use super::*;
    use unfold_ast::build::{
        assign, block, call, class, expr_stmt, function, ident, inline_invoke, int, lambda,
        member, param, ret, static_field, this,
    };
    use unfold_ast::{DeclId, Field, Function};

    fn mapping(methods: Vec<Node<Function>>) -> ClassDef {
        class(
            "WhenMappings",
            "lib",
            ClassKind::WhenMapping,
            vec![Field::plain("$EnumSwitchMapping$0"), Field::plain("$EnumSwitchMapping$1")],
            methods,
        )
    }

    fn initializer() -> Node<Function> {
        function(
            "init",
            DeclId(50),
            vec![],
            vec![
                expr_stmt(assign(static_field("WhenMappings", "$EnumSwitchMapping$0"), call("values", vec![]))),
                expr_stmt(assign(static_field("WhenMappings", "$EnumSwitchMapping$1"), call("other", vec![]))),
            ],
        )
    }

    #[test]
    fn anonymous_object_regeneration_rules() {
        let plain = class("Obj", "app", ClassKind::Closure, vec![], vec![]);
        let names = ClassNameGenerator::new("main", "run");

        let same_module = AnonymousObjectRegeneration::new(&plain, names.clone());
        assert!(!same_module.should_regenerate(true));
        assert!(same_module.should_regenerate(false));

        let mut lambdas = BTreeMap::new();
        lambdas.insert(0, lambda(DeclId(1), vec![], vec![]));
        let with_lambda = AnonymousObjectRegeneration::new(&plain, names.clone()).with_lambdas(lambdas);
        assert!(with_lambda.should_regenerate(true));

        let outer = AnonymousObjectRegeneration::new(&plain, names.clone())
            .with_captured_outer_regenerated(true);
        assert!(outer.should_regenerate(true));

        let mut reified = plain.clone();
        reified.reified = true;
        assert!(AnonymousObjectRegeneration::new(&reified, names).should_regenerate(true));
    }

    #[test]
    fn static_origin_is_never_removable() {
        let mut origin = class("Local", "app", ClassKind::Closure, vec![], vec![]);
        origin.static_origin = true;
        let info = AnonymousObjectRegeneration::new(&origin, ClassNameGenerator::new("a", "b"));
        assert!(!info.can_remove_after_transformation());
    }

    #[test]
    fn new_name_is_computed_once() {
        let plain = class("Obj", "app", ClassKind::Closure, vec![], vec![]);
        let names = ClassNameGenerator::new("main", "run");
        let first = AnonymousObjectRegeneration::new(&plain, names.clone());
        let second = AnonymousObjectRegeneration::new(&plain, names);
        assert_eq!(first.new_class_name(), "main$inlined$run$1");
        assert_eq!(first.new_class_name(), "main$inlined$run$1");
        assert_eq!(second.new_class_name(), "main$inlined$run$2");
    }

    #[test]
    fn specialization_drops_lambda_fields_and_inlines_calls() {
        let closure = class(
            "Callback",
            "app",
            ClassKind::Closure,
            vec![Field::captured("block"), Field::captured("count")],
            vec![function(
                "invoke",
                DeclId(20),
                vec![param("x")],
                vec![ret(Some(inline_invoke(member(this(), "block"), vec![member(this(), "count")])))],
            )],
        );
        let mut lambdas = BTreeMap::new();
        lambdas.insert(0, lambda(DeclId(3), vec![param("it")], vec![ret(Some(ident("it")))]));

        let copy = specialize_closure(&closure, "main$inlined$run$1", "app", &lambdas);
        assert_eq!(copy.name, "main$inlined$run$1");
        assert_eq!(copy.fields.len(), 1);
        assert_eq!(copy.fields[0].as_ref().name, "count");
        assert_eq!(
            copy.methods[0].to_string(),
            "function invoke(x) {\n    return (function(it) {\n        return it;\n    })(this.count);\n}"
        );
        let Statement::Return { value: Some(value), .. } = copy.methods[0].as_ref().body.as_ref().statements[0].as_ref()
        else {
            panic!("expected a return");
        };
        assert!(matches!(value.as_ref(), Expr::Call(call) if call.inline));

        let mut args = vec![lambda(DeclId(3), vec![], vec![]), int(2)];
        trim_constructor_args(&mut args, &lambdas);
        assert_eq!(args, vec![int(2)]);
        assert_eq!(closure.fields.len(), 2);
    }

    #[test]
    fn mapping_copy_keeps_only_the_requested_field() {
        let table = mapping(vec![initializer()]);
        let info = WhenMappingRegeneration::new(&table, "$EnumSwitchMapping$0", ClassNameGenerator::new("main", "pick"));
        let copy = trim_mapping(&table, &info, "app", Span::DUMMY).unwrap_or_else(|err| panic!("{err}"));

        assert_eq!(copy.name, "main$inlined$pick$1$WhenMappings");
        assert_eq!(copy.module, "app");
        assert_eq!(copy.fields.len(), 1);
        assert_eq!(
            block(copy.methods[0].as_ref().body.as_ref().statements.clone()).to_string(),
            "main$inlined$pick$1$WhenMappings.$EnumSwitchMapping$0 = values();\n"
        );
    }

    #[test]
    fn mapping_with_two_methods_is_malformed() {
        let table = mapping(vec![initializer(), initializer()]);
        let names = ClassNameGenerator::new("main", "pick");
        let info = WhenMappingRegeneration::new(&table, "$EnumSwitchMapping$0", names.clone());
        let err = trim_mapping(&table, &info, "app", Span::DUMMY);
        assert!(matches!(err, Err(InlineError::MalformedBody { .. })));
        // No name was drawn for the failed copy.
        assert_eq!(names.next_name(), "main$inlined$pick$1");
    }

    #[test]
    fn mapping_without_the_field_is_malformed() {
        let table = mapping(vec![initializer()]);
        let info = WhenMappingRegeneration::new(&table, "$missing", ClassNameGenerator::new("m", "p"));
        assert!(matches!(
            trim_mapping(&table, &info, "app", Span::DUMMY),
            Err(InlineError::MalformedBody { ref reason, .. }) if reason.contains("$missing")
        ));
    }

    #[test]
    fn when_mapping_regenerates_only_across_modules() {
        let table = mapping(vec![initializer()]);
        let info = WhenMappingRegeneration::new(&table, "f", ClassNameGenerator::new("m", "p"));
        assert!(info.should_regenerate(false));
        assert!(!info.should_regenerate(true));
        assert!(info.can_remove_after_transformation());
        let done = WhenMappingRegeneration::new(&table, "f", ClassNameGenerator::new("m", "p"))
            .with_already_regenerated(true);
        assert!(!done.should_regenerate(false));
    }

    #[test]
    fn registry_tracks_removability_per_original() {
        let mut registry = RegenerationRegistry::new();
        let names = registry.generator("main", "run");
        let plain = class("Obj", "lib", ClassKind::Closure, vec![], vec![]);
        let mut pinned = class("Pinned", "lib", ClassKind::Closure, vec![], vec![]);
        pinned.static_origin = true;

        let first = AnonymousObjectRegeneration::new(&plain, names.clone());
        let new_name = registry.record(&first, RegeneratedKind::Closure).new_name.clone();
        let second = AnonymousObjectRegeneration::new(&pinned, registry.generator("main", "run"));
        registry.record(&second, RegeneratedKind::Closure);

        assert_eq!(new_name, "main$inlined$run$1");
        assert!(registry.already_regenerated("main$inlined$run$1"));
        assert!(registry.already_regenerated("main$inlined$run$2"));
        assert!(!registry.already_regenerated("Obj"));
        assert_eq!(registry.removable_originals(), vec!["Obj".to_string()]);

        let json = registry.to_json().unwrap_or_else(|err| panic!("{err}"));
        let value: serde_json::Value = serde_json::from_str(&json).unwrap_or_else(|err| panic!("{err}"));
        assert_eq!(value["records"][1]["old_name"], "Pinned");
        assert_eq!(value["records"][1]["removable"], false);
        assert_eq!(value["records"][0]["kind"], "closure");
        assert_eq!(value["removable_originals"][0], "Obj");
    }
}
