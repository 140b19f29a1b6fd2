use unfold_ast::{BinaryOp, Expr};

/// Whether evaluating `expr` twice, zero times, or at another point may be
/// observed.
///
/// Allocation counts as an effect: object literals, `new` and closure literals
/// produce a fresh identity each time. Inline lambda literals are the exception
/// since they never survive as values.
pub fn can_have_side_effect(expr: &Expr) -> bool {
    match expr {
        Expr::Literal(_) | Expr::Identifier(_) | Expr::This | Expr::StaticField { .. } => false,
        Expr::Member { object, .. } => can_have_side_effect(object.as_ref().as_ref()),
        Expr::Binary { op, left, right } => {
            may_throw(*op)
                || can_have_side_effect(left.as_ref().as_ref())
                || can_have_side_effect(right.as_ref().as_ref())
        }
        Expr::Unary { expr, .. } => can_have_side_effect(expr.as_ref().as_ref()),
        Expr::Conditional {
            cond,
            then_branch,
            else_branch,
        } => {
            can_have_side_effect(cond.as_ref().as_ref())
                || can_have_side_effect(then_branch.as_ref().as_ref())
                || can_have_side_effect(else_branch.as_ref().as_ref())
        }
        Expr::Function(func) => !func.as_ref().inline_lambda,
        Expr::Call(_) | Expr::Assign { .. } | Expr::Object(_) | Expr::New { .. } => true,
    }
}

/// Whether `expr` yields the same value wherever it is evaluated.
///
/// Stable operands can stay where they are when statements are hoisted
/// ahead of them; everything else reads state those statements may change.
pub fn is_stable(expr: &Expr) -> bool {
    match expr {
        Expr::Literal(_) | Expr::This | Expr::Function(_) => true,
        Expr::Unary { expr, .. } => is_stable(expr.as_ref().as_ref()),
        Expr::Binary { op, left, right } => {
            !may_throw(*op) && is_stable(left.as_ref().as_ref()) && is_stable(right.as_ref().as_ref())
        }
        _ => false,
    }
}

fn may_throw(op: BinaryOp) -> bool {
    // Integer division by zero traps on most hosts.
    matches!(op, BinaryOp::Div | BinaryOp::Mod)
}

#[cfg(test)]
mod tests {
    use super::*;
    use unfold_ast::build::{
        assign, binary, call, closure, ident, int, lambda, member, new_object, this,
    };
    use unfold_ast::DeclId;

    #[test]
    fn reads_are_pure() {
        assert!(!can_have_side_effect(ident("x").as_ref()));
        assert!(!can_have_side_effect(member(this(), "field").as_ref()));
        assert!(!can_have_side_effect(
            binary(BinaryOp::Add, ident("a"), int(1)).as_ref()
        ));
    }

    #[test]
    fn calls_assignments_and_allocations_are_effects() {
        assert!(can_have_side_effect(call("g", vec![]).as_ref()));
        assert!(can_have_side_effect(assign(ident("a"), int(1)).as_ref()));
        assert!(can_have_side_effect(new_object("C", vec![]).as_ref()));
        assert!(can_have_side_effect(closure(vec![], vec![]).as_ref()));
        assert!(can_have_side_effect(
            member(call("g", vec![]), "field").as_ref()
        ));
    }

    #[test]
    fn inline_lambdas_are_not_values() {
        assert!(!can_have_side_effect(lambda(DeclId(1), vec![], vec![]).as_ref()));
    }

    #[test]
    fn only_constants_and_closures_are_stable() {
        assert!(is_stable(binary(BinaryOp::Add, int(1), int(2)).as_ref()));
        assert!(is_stable(this().as_ref()));
        assert!(is_stable(closure(vec![], vec![]).as_ref()));
        assert!(!is_stable(ident("x").as_ref()));
        assert!(!is_stable(member(this(), "field").as_ref()));
        assert!(!is_stable(binary(BinaryOp::Div, int(1), int(0)).as_ref()));
    }

    #[test]
    fn division_may_trap() {
        assert!(can_have_side_effect(
            binary(BinaryOp::Div, ident("a"), ident("b")).as_ref()
        ));
    }
}
