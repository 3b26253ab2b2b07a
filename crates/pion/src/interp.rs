//! The tree-walking evaluator.
//!
//! Statements execute for effect; expressions evaluate to a value handle.
//! Errors carry the innermost span and abort the whole evaluation — there
//! is no recovery.

use crate::{
    args::ArgVal,
    diag::{Diagnostic, EvalResult, Span},
    functions,
    parse::{self, ArgList, AssignOp, BinOp, Expr, ExprLoc, Stmt, UnOp},
    value::{ObjId, Value, ValueKind},
    workspace::Workspace,
};

/// Loop control flowing out of a statement.
enum Flow {
    Normal,
    Continue(Span),
    Break(Span),
}

/// Parses and executes one source file against the current project.
///
/// The file is registered in the workspace source table first so that
/// diagnostics and the regenerate edge can refer back to it.
pub fn eval_source(wk: &mut Workspace, filename: &str, text: &str) -> EvalResult<()> {
    let file = wk.add_source(filename.to_owned(), text.to_owned());
    let stmts = parse::parse(text, file)?;
    match exec_block(wk, &stmts)? {
        Flow::Normal => Ok(()),
        Flow::Continue(span) => Err(Diagnostic::parse("'continue' outside of a loop", span)),
        Flow::Break(span) => Err(Diagnostic::parse("'break' outside of a loop", span)),
    }
}

fn exec_block(wk: &mut Workspace, stmts: &[Stmt]) -> EvalResult<Flow> {
    for stmt in stmts {
        match exec_stmt(wk, stmt)? {
            Flow::Normal => {}
            flow => return Ok(flow),
        }
    }
    Ok(Flow::Normal)
}

fn exec_stmt(wk: &mut Workspace, stmt: &Stmt) -> EvalResult<Flow> {
    match stmt {
        Stmt::Expr(expr) => {
            eval_expr(wk, expr)?;
            Ok(Flow::Normal)
        }
        Stmt::Assign { name, span, op, value } => {
            let rhs = eval_expr(wk, value)?;
            let bound = match op {
                AssignOp::Assign => rhs,
                AssignOp::PlusAssign => {
                    let Some(cur) = wk.lookup(name) else {
                        return Err(Diagnostic::name(format!("identifier '{name}' is not bound"), *span));
                    };
                    add_values(wk, cur, rhs, *span, value.span)?
                }
            };
            wk.assign(name, bound);
            Ok(Flow::Normal)
        }
        Stmt::If { branches } => {
            for branch in branches {
                let taken = match &branch.cond {
                    Some(cond) => eval_condition(wk, cond)?,
                    None => true,
                };
                if taken {
                    return exec_block(wk, &branch.body);
                }
            }
            Ok(Flow::Normal)
        }
        Stmt::Foreach {
            vars,
            span,
            iterable,
            body,
        } => exec_foreach(wk, vars, *span, iterable, body),
        Stmt::Continue(span) => Ok(Flow::Continue(*span)),
        Stmt::Break(span) => Ok(Flow::Break(*span)),
    }
}

fn exec_foreach(
    wk: &mut Workspace,
    vars: &(String, Option<String>),
    span: Span,
    iterable: &ExprLoc,
    body: &[Stmt],
) -> EvalResult<Flow> {
    let iter_obj = eval_expr(wk, iterable)?;
    match wk.get_obj(iter_obj).kind() {
        ValueKind::Array => {
            if vars.1.is_some() {
                return Err(Diagnostic::type_error(
                    "iterating an array takes a single loop variable",
                    span,
                ));
            }
            for item in wk.array_items(iter_obj) {
                wk.assign(&vars.0, item);
                match exec_block(wk, body)? {
                    Flow::Normal | Flow::Continue(_) => {}
                    Flow::Break(_) => break,
                }
            }
        }
        ValueKind::Dict => {
            let Some(value_var) = &vars.1 else {
                return Err(Diagnostic::type_error("iterating a dict takes two loop variables", span));
            };
            for (_, key, value) in wk.dict_entries(iter_obj) {
                wk.assign(&vars.0, key);
                wk.assign(value_var, value);
                match exec_block(wk, body)? {
                    Flow::Normal | Flow::Continue(_) => {}
                    Flow::Break(_) => break,
                }
            }
        }
        other => {
            return Err(Diagnostic::type_error(
                format!("cannot iterate a {other} value"),
                iterable.span,
            ));
        }
    }
    Ok(Flow::Normal)
}

fn eval_condition(wk: &mut Workspace, cond: &ExprLoc) -> EvalResult<bool> {
    let obj = eval_expr(wk, cond)?;
    match wk.get_obj(obj) {
        Value::Bool(b) => Ok(*b),
        other => Err(Diagnostic::type_error(
            format!("condition must be a bool, got {}", other.kind()),
            cond.span,
        )),
    }
}

pub(crate) fn eval_expr(wk: &mut Workspace, expr: &ExprLoc) -> EvalResult<ObjId> {
    match &expr.expr {
        Expr::Bool(b) => Ok(wk.make_bool(*b)),
        Expr::Int(n) => Ok(wk.make_number(*n)),
        Expr::Str(s) => Ok(wk.make_str(s)),
        Expr::Ident(name) => wk
            .lookup(name)
            .ok_or_else(|| Diagnostic::name(format!("identifier '{name}' is not bound"), expr.span)),
        Expr::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(eval_expr(wk, item)?);
            }
            Ok(wk.make_array(out))
        }
        Expr::Dict(pairs) => {
            let dict = wk.make_dict();
            for (key_expr, value_expr) in pairs {
                let key = eval_expr(wk, key_expr)?;
                wk.expect_kind(key, ValueKind::String, key_expr.span)?;
                let value = eval_expr(wk, value_expr)?;
                let key_str = wk.objstr(key).to_owned();
                wk.dict_insert(dict, &key_str, value);
            }
            Ok(dict)
        }
        Expr::Unary { op, operand } => eval_unary(wk, *op, operand, expr.span),
        Expr::Binary { op, lhs, rhs } => eval_binary(wk, *op, lhs, rhs, expr.span),
        Expr::Call { name, args } => {
            let (pos, kw) = eval_args(wk, args)?;
            functions::call_builtin(wk, name, expr.span, &pos, &kw)
        }
        Expr::Method {
            receiver,
            name,
            name_span,
            args,
        } => {
            let recv_obj = eval_expr(wk, receiver)?;
            let recv = ArgVal {
                obj: recv_obj,
                span: receiver.span,
            };
            let (pos, kw) = eval_args(wk, args)?;
            functions::call_method(wk, recv, name, *name_span, &pos, &kw)
        }
    }
}


/// Evaluated positionals plus keyword triples, the shape the checker takes.
type EvaledArgs = (Vec<ArgVal>, Vec<(String, Span, ArgVal)>);

fn eval_args(wk: &mut Workspace, args: &ArgList) -> EvalResult<EvaledArgs> {
    let mut pos = Vec::with_capacity(args.positional.len());
    for arg in &args.positional {
        let obj = eval_expr(wk, arg)?;
        pos.push(ArgVal { obj, span: arg.span });
    }
    let mut kw = Vec::with_capacity(args.keywords.len());
    for (name, name_span, value) in &args.keywords {
        let obj = eval_expr(wk, value)?;
        kw.push((
            name.clone(),
            *name_span,
            ArgVal {
                obj,
                span: value.span,
            },
        ));
    }
    Ok((pos, kw))
}

fn eval_unary(wk: &mut Workspace, op: UnOp, operand: &ExprLoc, span: Span) -> EvalResult<ObjId> {
    let val = eval_expr(wk, operand)?;
    match (op, wk.get_obj(val)) {
        (UnOp::Not, Value::Bool(b)) => {
            let b = !*b;
            Ok(wk.make_bool(b))
        }
        (UnOp::Neg, Value::Number(n)) => {
            let n = -*n;
            Ok(wk.make_number(n))
        }
        (UnOp::Not, other) => Err(Diagnostic::type_error(
            format!("'not' needs a bool, got {}", other.kind()),
            span,
        )),
        (UnOp::Neg, other) => Err(Diagnostic::type_error(
            format!("negation needs a number, got {}", other.kind()),
            span,
        )),
    }
}

fn eval_binary(wk: &mut Workspace, op: BinOp, lhs: &ExprLoc, rhs: &ExprLoc, span: Span) -> EvalResult<ObjId> {
    // and/or short-circuit before the right side evaluates.
    if matches!(op, BinOp::And | BinOp::Or) {
        let l = eval_condition(wk, lhs)?;
        let result = match (op, l) {
            (BinOp::And, false) => false,
            (BinOp::Or, true) => true,
            _ => eval_condition(wk, rhs)?,
        };
        return Ok(wk.make_bool(result));
    }

    let l = eval_expr(wk, lhs)?;
    let r = eval_expr(wk, rhs)?;

    match op {
        BinOp::Add => add_values(wk, l, r, span, rhs.span),
        BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod => {
            let (a, b) = number_operands(wk, op, l, r, span)?;
            if b == 0 && matches!(op, BinOp::Div | BinOp::Mod) {
                return Err(Diagnostic::value("division by zero", rhs.span));
            }
            let n = match op {
                BinOp::Sub => a - b,
                BinOp::Mul => a * b,
                BinOp::Div => a / b,
                BinOp::Mod => a % b,
                _ => unreachable!(),
            };
            Ok(wk.make_number(n))
        }
        BinOp::Eq => {
            let eq = wk.obj_equal(l, r);
            Ok(wk.make_bool(eq))
        }
        BinOp::Neq => {
            let eq = wk.obj_equal(l, r);
            Ok(wk.make_bool(!eq))
        }
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            let (a, b) = number_operands(wk, op, l, r, span)?;
            let result = match op {
                BinOp::Lt => a < b,
                BinOp::Le => a <= b,
                BinOp::Gt => a > b,
                BinOp::Ge => a >= b,
                _ => unreachable!(),
            };
            Ok(wk.make_bool(result))
        }
        BinOp::In | BinOp::NotIn => {
            let found = membership(wk, l, r, lhs.span, rhs.span)?;
            Ok(wk.make_bool(if op == BinOp::In { found } else { !found }))
        }
        BinOp::And | BinOp::Or => unreachable!("handled above"),
    }
}

/// `+` across kinds: numbers add, strings concatenate, arrays push or
/// extend into a fresh array.
fn add_values(
    wk: &mut Workspace,
    l: ObjId,
    r: ObjId,
    span: Span,
    rhs_span: Span,
) -> EvalResult<ObjId> {
    match (wk.get_obj(l), wk.get_obj(r)) {
        (Value::Number(a), Value::Number(b)) => {
            let n = a + b;
            Ok(wk.make_number(n))
        }
        (Value::Str(a), Value::Str(b)) => {
            let joined = format!("{}{}", wk.str(*a), wk.str(*b));
            Ok(wk.make_str(&joined))
        }
        (Value::Array(items), _) => {
            let mut out = items.clone();
            match wk.get_obj(r) {
                Value::Array(tail) => out.extend_from_slice(tail),
                _ => out.push(r),
            }
            Ok(wk.make_array(out))
        }
        (Value::Str(_), other) => Err(Diagnostic::type_error(
            format!("cannot add {} to a string", other.kind()),
            rhs_span,
        )),
        (a, b) => Err(Diagnostic::type_error(
            format!("cannot add {} and {}", a.kind(), b.kind()),
            span,
        )),
    }
}

fn number_operands(
    wk: &Workspace,
    op: BinOp,
    l: ObjId,
    r: ObjId,
    span: Span,
) -> EvalResult<(i64, i64)> {
    match (wk.get_obj(l), wk.get_obj(r)) {
        (Value::Number(a), Value::Number(b)) => Ok((*a, *b)),
        (a, b) => Err(Diagnostic::type_error(
            format!("'{op}' needs number operands, got {} and {}", a.kind(), b.kind()),
            span,
        )),
    }
}

fn membership(wk: &Workspace, needle: ObjId, haystack: ObjId, needle_span: Span, span: Span) -> EvalResult<bool> {
    match wk.get_obj(haystack) {
        Value::Array(items) => Ok(items.iter().any(|item| wk.obj_equal(needle, *item))),
        Value::Dict(d) => match wk.get_obj(needle) {
            Value::Str(s) => Ok(d.contains_key(wk.str(*s))),
            other => Err(Diagnostic::type_error(
                format!("dict membership needs a string key, got {}", other.kind()),
                needle_span,
            )),
        },
        other => Err(Diagnostic::type_error(
            format!("'in' needs an array or dict, got {}", other.kind()),
            span,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval_in(wk: &mut Workspace, src: &str) -> EvalResult<()> {
        eval_source(wk, "test.build", src)
    }

    fn fresh() -> Workspace {
        let mut wk = Workspace::new();
        wk.make_project(None, "/src", "/build");
        wk
    }

    fn lookup_num(wk: &Workspace, name: &str) -> i64 {
        match wk.get_obj(wk.lookup(name).expect("bound")) {
            Value::Number(n) => *n,
            other => panic!("expected number, got {}", other.kind()),
        }
    }

    fn lookup_bool(wk: &Workspace, name: &str) -> bool {
        match wk.get_obj(wk.lookup(name).expect("bound")) {
            Value::Bool(b) => *b,
            other => panic!("expected bool, got {}", other.kind()),
        }
    }

    #[test]
    fn arithmetic_and_precedence() {
        let mut wk = fresh();
        eval_in(&mut wk, "x = 2 + 3 * 4 - 6 / 2\n").unwrap();
        assert_eq!(lookup_num(&wk, "x"), 11);
    }

    #[test]
    fn division_by_zero_is_a_value_error() {
        let mut wk = fresh();
        let err = eval_in(&mut wk, "x = 1 / 0\n").unwrap_err();
        assert_eq!(err.kind, crate::diag::DiagKind::Value);
    }

    #[test]
    fn string_concatenation() {
        let mut wk = fresh();
        eval_in(&mut wk, "x = 'foo' + 'bar'\n").unwrap();
        assert_eq!(wk.objstr(wk.lookup("x").unwrap()), "foobar");
    }

    #[test]
    fn array_plus_pushes_and_extends() {
        let mut wk = fresh();
        eval_in(&mut wk, "a = [1] + 2\nb = [1] + [2, 3]\n").unwrap();
        assert_eq!(wk.array_items(wk.lookup("a").unwrap()).len(), 2);
        assert_eq!(wk.array_items(wk.lookup("b").unwrap()).len(), 3);
    }

    #[test]
    fn plus_does_not_mutate_the_original_array() {
        let mut wk = fresh();
        eval_in(&mut wk, "a = [1]\nb = a + 2\n").unwrap();
        assert_eq!(wk.array_items(wk.lookup("a").unwrap()).len(), 1);
        assert_eq!(wk.array_items(wk.lookup("b").unwrap()).len(), 2);
    }

    #[test]
    fn membership_on_arrays_and_dicts() {
        let mut wk = fresh();
        eval_in(
            &mut wk,
            "a = 2 in [1, 2]\nb = 3 not in [1, 2]\nc = 'k' in {'k': 1}\nd = 'x' in {'k': 1}\n",
        )
        .unwrap();
        assert!(lookup_bool(&wk, "a"));
        assert!(lookup_bool(&wk, "b"));
        assert!(lookup_bool(&wk, "c"));
        assert!(!lookup_bool(&wk, "d"));
    }

    #[test]
    fn if_elif_else_takes_first_true_branch() {
        let mut wk = fresh();
        eval_in(&mut wk, "if false\n x = 1\nelif true\n x = 2\nelse\n x = 3\nendif\n").unwrap();
        assert_eq!(lookup_num(&wk, "x"), 2);
    }

    #[test]
    fn non_bool_condition_is_a_type_error() {
        let mut wk = fresh();
        let err = eval_in(&mut wk, "if 1\nendif\n").unwrap_err();
        assert_eq!(err.kind, crate::diag::DiagKind::Type);
    }

    #[test]
    fn foreach_iterates_in_order_and_leaks_its_variable() {
        let mut wk = fresh();
        eval_in(&mut wk, "sum = 0\nforeach n : [1, 2, 3]\n sum = sum + n\nendforeach\n").unwrap();
        assert_eq!(lookup_num(&wk, "sum"), 6);
        // The loop variable stays bound afterwards.
        assert_eq!(lookup_num(&wk, "n"), 3);
    }

    #[test]
    fn foreach_over_dict_sees_insertion_order() {
        let mut wk = fresh();
        eval_in(
            &mut wk,
            "keys = ''\nforeach k, v : {'z': 1, 'a': 2}\n keys = keys + k\nendforeach\n",
        )
        .unwrap();
        assert_eq!(wk.objstr(wk.lookup("keys").unwrap()), "za");
    }

    #[test]
    fn break_and_continue_bind_to_innermost_loop() {
        let mut wk = fresh();
        eval_in(
            &mut wk,
            "hits = 0\nforeach i : [1, 2, 3, 4]\n if i == 2\n  continue\n endif\n if i == 4\n  break\n endif\n hits = hits + 1\nendforeach\n",
        )
        .unwrap();
        assert_eq!(lookup_num(&wk, "hits"), 2);
    }

    #[test]
    fn break_outside_loop_fails() {
        let mut wk = fresh();
        assert!(eval_in(&mut wk, "break\n").is_err());
    }

    #[test]
    fn unbound_identifier_is_a_name_error() {
        let mut wk = fresh();
        let err = eval_in(&mut wk, "x = nope\n").unwrap_err();
        assert_eq!(err.kind, crate::diag::DiagKind::Name);
        assert!(err.msg.contains("nope"));
    }

    #[test]
    fn plus_assign_rebinds() {
        let mut wk = fresh();
        eval_in(&mut wk, "x = 1\nx += 2\ns = 'a'\ns += 'b'\n").unwrap();
        assert_eq!(lookup_num(&wk, "x"), 3);
        assert_eq!(wk.objstr(wk.lookup("s").unwrap()), "ab");
    }

    #[test]
    fn and_or_short_circuit() {
        let mut wk = fresh();
        // The right side would be a name error if evaluated.
        eval_in(&mut wk, "x = false and nope\ny = true or nope\n").unwrap();
        assert!(!lookup_bool(&wk, "x"));
        assert!(lookup_bool(&wk, "y"));
    }

    #[test]
    fn errors_carry_spans() {
        let mut wk = fresh();
        let err = eval_in(&mut wk, "x = 1\ny = zz\n").unwrap_err();
        let span = err.span.unwrap();
        assert_eq!((span.line, span.col), (2, 5));
    }

    #[test]
    fn null_handle_is_never_produced_by_literals() {
        let mut wk = fresh();
        eval_in(&mut wk, "x = 0\n").unwrap();
        assert_ne!(wk.lookup("x").unwrap(), ObjId::NULL);
    }
}
