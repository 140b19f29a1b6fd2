#![expect(clippy::panic, reason = "Panicking on test failures is acceptable")]

use unfold_ast::build::{
    assign, binary, call, closure, expr_stmt, function, function_stmt, ident, if_else, inline_call,
    inline_invoke, int, lambda, member, node, param, ret, ret_to, this, var, while_loop,
};
use unfold_ast::{BinaryOp, Call, DeclId, Expr, Node, Program, Statement};
use unfold_inline::{DeclarationTable, InlineConfig, InlineOutput, Inliner};
use unfold_utils::DiagnosticSeverity;

const MAIN: DeclId = DeclId(100);

fn main_fn(body: Vec<Node<Statement>>) -> Node<Statement> {
    function_stmt(function("main", MAIN, vec![], body))
}

fn run_with(config: InlineConfig, statements: Vec<Node<Statement>>) -> InlineOutput {
    let program = Program::new("app", statements);
    let table = DeclarationTable::from_program(&program);
    Inliner::with_config(config).inline_program(&program, &table)
}

fn run(statements: Vec<Node<Statement>>) -> InlineOutput {
    run_with(InlineConfig::default(), statements)
}

fn main_body(output: &InlineOutput) -> String {
    let Some(main) = output
        .program
        .functions()
        .find(|func| func.as_ref().decl == Some(MAIN))
    else {
        panic!("main disappeared from the output");
    };
    main.as_ref().body.as_ref().to_string()
}

/// `pick(flag) { if (flag) { return 1; } else { return 2; } }`
fn pick() -> Node<Statement> {
    function_stmt(function(
        "pick",
        DeclId(1),
        vec![param("flag")],
        vec![if_else(
            ident("flag"),
            vec![ret(Some(int(1)))],
            Some(vec![ret(Some(int(2)))]),
        )],
    ))
}

/// `find(xs) { while (more(xs)) { if (hit(xs)) { return 1; } } return 0; }`
fn find() -> Node<Statement> {
    function_stmt(function(
        "find",
        DeclId(2),
        vec![param("xs")],
        vec![
            while_loop(
                call("more", vec![ident("xs")]),
                vec![if_else(call("hit", vec![ident("xs")]), vec![ret(Some(int(1)))], None)],
            ),
            ret(Some(int(0))),
        ],
    ))
}

#[test]
fn identity_in_value_position_becomes_its_argument() {
    let output = run(vec![
        function_stmt(function("f", DeclId(1), vec![param("x")], vec![ret(Some(ident("x")))])),
        main_fn(vec![var("y", Some(inline_call("f", DeclId(1), vec![int(5)])))]),
    ]);

    let body = main_body(&output);
    assert_eq!(body, "var y = 5;\n");
    assert!(!body.contains("break"));
    assert_eq!(output.stats.applied, 1);
}

#[test]
fn branch_returns_share_one_result_and_drop_tail_breaks() {
    let output = run(vec![
        pick(),
        main_fn(vec![var("y", Some(inline_call("pick", DeclId(1), vec![ident("c")])))]),
    ]);

    assert_eq!(
        main_body(&output),
        "var pick$_0;\n\
         if (c) {\n    pick$_0 = 1;\n} else {\n    pick$_0 = 2;\n}\n\
         var y = pick$_0;\n"
    );
}

#[test]
fn returns_inside_a_loop_keep_label_and_breaks() {
    let output = run(vec![
        find(),
        main_fn(vec![var("y", Some(inline_call("find", DeclId(2), vec![ident("items")])))]),
    ]);

    let body = main_body(&output);
    assert!(body.starts_with("var find$_0;\nfind$break_0: {\n"));
    assert_eq!(body.matches("break find$break_0;").count(), 2);
    assert!(body.ends_with("var y = find$_0;\n"));
}

#[test]
fn two_calls_get_independent_names() {
    let output = run(vec![
        find(),
        main_fn(vec![
            var("a", Some(inline_call("find", DeclId(2), vec![ident("xs")]))),
            var("b", Some(inline_call("find", DeclId(2), vec![ident("ys")]))),
        ]),
    ]);

    let body = main_body(&output);
    assert!(body.contains("find$break_0: {"));
    assert!(body.contains("find$break_1: {"));
    assert!(body.contains("var a = find$_0;"));
    assert!(body.contains("var b = find$_1;"));
    assert_eq!(output.stats.applied, 2);
}

#[test]
fn inline_lambda_argument_is_expanded_where_it_is_called() {
    let output = run(vec![
        function_stmt(function(
            "run",
            DeclId(1),
            vec![param("block")],
            vec![ret(Some(inline_invoke(ident("block"), vec![])))],
        )),
        main_fn(vec![var(
            "y",
            Some(inline_call("run", DeclId(1), vec![lambda(DeclId(10), vec![], vec![ret(Some(int(42)))])])),
        )]),
    ]);

    assert_eq!(main_body(&output), "var y = 42;\n");
    assert_eq!(output.stats.applied, 2);
}

#[test]
fn return_to_unknown_target_is_kept_verbatim() {
    let foreign = ret_to(DeclId(99), Some(int(1)));
    let output = run(vec![
        function_stmt(function(
            "f",
            DeclId(1),
            vec![],
            vec![if_else(ident("c"), vec![foreign.clone()], None), ret(Some(int(2)))],
        )),
        main_fn(vec![var("y", Some(inline_call("f", DeclId(1), vec![])))]),
    ]);

    assert_eq!(main_body(&output), "if (c) {\n    return@#99 1;\n}\nvar y = 2;\n");
    let Some(main) = output.program.functions().find(|func| func.as_ref().decl == Some(MAIN)) else {
        panic!("main disappeared from the output");
    };
    let Statement::If { then_block, .. } = main.as_ref().body.as_ref().statements[0].as_ref() else {
        panic!("expected the callee's if statement first");
    };
    assert_eq!(then_block.as_ref().statements[0], foreign);
}

#[test]
fn statements_after_top_level_return_never_appear() {
    let output = run(vec![
        function_stmt(function(
            "f",
            DeclId(1),
            vec![],
            vec![ret(Some(int(1))), expr_stmt(call("never", vec![]))],
        )),
        main_fn(vec![var("y", Some(inline_call("f", DeclId(1), vec![])))]),
    ]);

    let body = main_body(&output);
    assert_eq!(body, "var y = 1;\n");
    assert!(!body.contains("never"));
}

#[test]
fn missing_body_keeps_call_and_reports_error() {
    let output = run(vec![main_fn(vec![var(
        "y",
        Some(inline_call("ghost", DeclId(7), vec![int(1)])),
    )])]);

    assert_eq!(main_body(&output), "var y = ghost(1);\n");
    assert_eq!(output.stats.skipped_missing, 1);
    let [diag] = output.diagnostics.as_slice() else {
        panic!("expected exactly one diagnostic, got {:?}", output.diagnostics);
    };
    assert_eq!(diag.severity(), DiagnosticSeverity::Error);
    assert!(diag.message().contains("ghost"));
    assert_eq!(diag.source_id(), "app");
}

#[test]
fn failed_call_is_no_longer_marked_inline() {
    let output = run(vec![main_fn(vec![expr_stmt(inline_call("ghost", DeclId(7), vec![]))])]);
    let Some(main) = output.program.functions().find(|func| func.as_ref().decl == Some(MAIN)) else {
        panic!("main disappeared from the output");
    };
    let Statement::Expr(expr) = main.as_ref().body.as_ref().statements[0].as_ref() else {
        panic!("expected the call statement");
    };
    let Expr::Call(call) = expr.as_ref() else {
        panic!("expected a call");
    };
    assert!(!call.inline);
}

#[test]
fn mutual_recursion_is_cut_with_a_cycle_diagnostic() {
    let output = run(vec![
        function_stmt(function("a", DeclId(1), vec![], vec![expr_stmt(inline_call("b", DeclId(2), vec![]))])),
        function_stmt(function("b", DeclId(2), vec![], vec![expr_stmt(inline_call("a", DeclId(1), vec![]))])),
    ]);

    assert_eq!(output.stats.skipped_recursive, 1);
    assert_eq!(output.stats.applied, 1);
    assert_eq!(output.diagnostics.len(), 1);
    assert!(output.diagnostics[0].message().starts_with("inline cycle"));
}

#[test]
fn extra_arguments_are_reported() {
    let output = run(vec![
        function_stmt(function("f", DeclId(1), vec![param("x")], vec![ret(Some(ident("x")))])),
        main_fn(vec![var("y", Some(inline_call("f", DeclId(1), vec![int(1), int(2)])))]),
    ]);

    assert_eq!(main_body(&output), "var y = f(1, 2);\n");
    assert_eq!(output.stats.skipped_arity, 1);
    assert_eq!(output.diagnostics[0].suggestion(), Some("pass at most 1 arguments"));
}

#[test]
fn depth_limit_leaves_calls_in_place() {
    let config = InlineConfig {
        max_depth: 0,
        ..InlineConfig::default()
    };
    let output = run_with(
        config,
        vec![
            function_stmt(function("f", DeclId(1), vec![param("x")], vec![ret(Some(ident("x")))])),
            main_fn(vec![var("y", Some(inline_call("f", DeclId(1), vec![int(5)])))]),
        ],
    );

    assert_eq!(main_body(&output), "var y = f(5);\n");
    assert_eq!(output.stats.skipped_depth, 1);
    assert!(output.diagnostics.is_empty());
}

#[test]
fn conditional_right_operand_is_never_hoisted() {
    let output = run(vec![
        function_stmt(function("f", DeclId(1), vec![param("x")], vec![ret(Some(ident("x")))])),
        main_fn(vec![var(
            "y",
            Some(binary(BinaryOp::And, ident("ok"), inline_call("f", DeclId(1), vec![int(5)]))),
        )]),
    ]);

    assert_eq!(main_body(&output), "var y = ok && f(5);\n");
    assert_eq!(output.stats.skipped_order, 1);
}

#[test]
fn callee_bodies_are_processed_before_use() {
    let output = run(vec![
        function_stmt(function("inner", DeclId(1), vec![param("x")], vec![ret(Some(ident("x")))])),
        function_stmt(function(
            "outer",
            DeclId(2),
            vec![param("y")],
            vec![ret(Some(inline_call("inner", DeclId(1), vec![ident("y")])))],
        )),
        main_fn(vec![var("z", Some(inline_call("outer", DeclId(2), vec![int(3)])))]),
    ]);

    assert_eq!(main_body(&output), "var z = 3;\n");
    let Some(outer) = output.program.functions().find(|func| func.as_ref().decl == Some(DeclId(2))) else {
        panic!("outer disappeared from the output");
    };
    assert_eq!(outer.as_ref().body.as_ref().to_string(), "return y;\n");
}

/// `bump() { counter = counter + 1; return 0; }`
fn bump() -> Node<Statement> {
    function_stmt(function(
        "bump",
        DeclId(3),
        vec![],
        vec![
            expr_stmt(assign(ident("counter"), binary(BinaryOp::Add, ident("counter"), int(1)))),
            ret(Some(int(0))),
        ],
    ))
}

fn method_call(receiver: Node<Expr>, method: &str, decl: DeclId, args: Vec<Node<Expr>>) -> Node<Expr> {
    node(Expr::Call(Call::inline(member(receiver, method), args, Some(decl))))
}

#[test]
fn reads_before_a_hoisted_call_keep_the_old_state() {
    let output = run(vec![
        bump(),
        function_stmt(function(
            "add",
            DeclId(4),
            vec![param("a"), param("b"), param("c")],
            vec![ret(Some(call("log", vec![ident("a"), ident("b"), ident("c")])))],
        )),
        main_fn(vec![var(
            "r",
            Some(inline_call(
                "add",
                DeclId(4),
                vec![member(ident("obj"), "count"), ident("counter"), inline_call("bump", DeclId(3), vec![])],
            )),
        )]),
    ]);

    assert_eq!(
        main_body(&output),
        "var tmp_0 = obj.count;\n\
         var tmp_1 = counter;\n\
         counter = counter + 1;\n\
         var r = log(tmp_0, tmp_1, 0);\n"
    );
    assert_eq!(output.stats.applied, 2);
}

#[test]
fn side_effecting_argument_is_evaluated_once_before_the_body() {
    let output = run(vec![
        function_stmt(function("id", DeclId(1), vec![param("x")], vec![ret(Some(ident("x")))])),
        main_fn(vec![var("y", Some(inline_call("id", DeclId(1), vec![call("g", vec![])])))]),
    ]);

    assert_eq!(main_body(&output), "var x_0 = g();\nvar y = x_0;\n");
    assert_eq!(output.stats.applied, 1);
    assert_eq!(output.stats.skipped_order, 0);
}

#[test]
fn side_effecting_receiver_is_bound_to_an_alias() {
    let output = run(vec![
        function_stmt(function("size", DeclId(5), vec![], vec![ret(Some(member(this(), "count")))])),
        main_fn(vec![var("n", Some(method_call(call("load", vec![]), "size", DeclId(5), vec![])))]),
    ]);

    assert_eq!(main_body(&output), "var $this_0 = load();\nvar n = $this_0.count;\n");
}

#[test]
fn receiver_is_read_before_an_argument_reassigns_it() {
    let output = run(vec![
        function_stmt(function("put", DeclId(6), vec![param("v")], vec![ret(Some(member(this(), "size")))])),
        main_fn(vec![var(
            "n",
            Some(method_call(ident("list"), "put", DeclId(6), vec![assign(ident("list"), ident("other"))])),
        )]),
    ]);

    assert_eq!(
        main_body(&output),
        "var $this_0 = list;\nvar v_0 = list = other;\nvar n = $this_0.size;\n"
    );
}

#[test]
fn closure_parameters_never_capture_argument_names() {
    // adder(a) { return function(x) { return a + x; }; }
    let output = run(vec![
        function_stmt(function(
            "adder",
            DeclId(1),
            vec![param("a")],
            vec![ret(Some(closure(
                vec![param("x")],
                vec![ret(Some(binary(BinaryOp::Add, ident("a"), ident("x"))))],
            )))],
        )),
        main_fn(vec![var("g", Some(inline_call("adder", DeclId(1), vec![ident("x")])))]),
    ]);

    assert_eq!(
        main_body(&output),
        "var g = function(x_0) {\n    return x + x_0;\n};\n"
    );
}

#[test]
fn fresh_names_never_shadow_names_a_later_callee_reads() {
    let output = run(vec![
        function_stmt(function(
            "f",
            DeclId(1),
            vec![],
            vec![var("t", Some(int(1))), expr_stmt(call("use", vec![ident("t")]))],
        )),
        function_stmt(function("g", DeclId(2), vec![], vec![expr_stmt(call("use", vec![ident("t_0")]))])),
        main_fn(vec![
            expr_stmt(inline_call("f", DeclId(1), vec![])),
            expr_stmt(inline_call("g", DeclId(2), vec![])),
        ]),
    ]);

    assert_eq!(main_body(&output), "var t_1 = 1;\nuse(t_1);\nuse(t_0);\n");
}

#[test]
fn depth_limited_lambda_call_is_attempted_once() {
    let config = InlineConfig {
        max_depth: 1,
        ..InlineConfig::default()
    };
    let output = run_with(
        config,
        vec![
            function_stmt(function(
                "apply",
                DeclId(1),
                vec![param("f"), param("v")],
                vec![ret(Some(inline_invoke(ident("f"), vec![ident("v")])))],
            )),
            main_fn(vec![var(
                "r",
                Some(inline_call(
                    "apply",
                    DeclId(1),
                    vec![lambda(DeclId(10), vec![param("y")], vec![ret(Some(ident("y")))]), int(1)],
                )),
            )]),
        ],
    );

    assert_eq!(main_body(&output), "var r = (function(y) {\n    return y;\n})(1);\n");
    assert_eq!(output.stats.attempted, 2);
    assert_eq!(output.stats.applied, 1);
    assert_eq!(output.stats.skipped_depth, 1);
    assert_eq!(output.stats.skipped_order, 0);
}
