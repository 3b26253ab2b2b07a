//! Array methods.

use crate::{
    args::{self, ArgKind, ArgVal, Signature},
    diag::{Diagnostic, EvalResult, Span},
    functions::{RawKwargs, string, unknown_method},
    value::{ObjId, Value, ValueKind},
    workspace::Workspace,
};

pub(crate) fn call(
    wk: &mut Workspace,
    recv: ArgVal,
    name: &str,
    name_span: Span,
    pos: &[ArgVal],
    kw: &RawKwargs,
) -> EvalResult<ObjId> {
    match name {
        "length" => {
            const SIG: Signature = Signature {
                positional: &[],
                optional: &[],
                keywords: &[],
            };
            args::check(wk, "length", name_span, pos, kw, &SIG)?;
            let len = i64::try_from(wk.array_items(recv.obj).len()).expect("array length fits i64");
            Ok(wk.make_number(len))
        }
        "contains" => {
            const SIG: Signature = Signature {
                positional: &[ArgKind::Any],
                optional: &[],
                keywords: &[],
            };
            let checked = args::check(wk, "contains", name_span, pos, kw, &SIG)?;
            let needle = checked.pos(0).obj;
            let found = wk
                .array_items(recv.obj)
                .iter()
                .any(|item| wk.obj_equal(needle, *item));
            Ok(wk.make_bool(found))
        }
        "get" => {
            const SIG: Signature = Signature {
                positional: &[ArgKind::Number],
                optional: &[ArgKind::Any],
                keywords: &[],
            };
            let checked = args::check(wk, "get", name_span, pos, kw, &SIG)?;
            let items = wk.array_items(recv.obj);
            let Value::Number(raw) = wk.get_obj(checked.pos(0).obj) else {
                unreachable!("kind checked");
            };
            // Negative indices count from the end.
            let idx = if *raw < 0 {
                raw + i64::try_from(items.len()).expect("array length fits i64")
            } else {
                *raw
            };
            match usize::try_from(idx).ok().and_then(|i| items.get(i)) {
                Some(item) => Ok(*item),
                None => checked.opt(1).map(|a| a.obj).ok_or_else(|| {
                    Diagnostic::value(
                        format!("index {raw} out of bounds for array of length {}", items.len()),
                        checked.pos(0).span,
                    )
                }),
            }
        }
        "join" => {
            const SIG: Signature = Signature {
                positional: &[ArgKind::Str],
                optional: &[],
                keywords: &[],
            };
            let checked = args::check(wk, "join", name_span, pos, kw, &SIG)?;
            let sep = wk.objstr(checked.pos(0).obj).to_owned();
            string::join_strings(wk, &sep, recv, name_span)
        }
        _ => Err(unknown_method(ValueKind::Array, name, name_span)),
    }
}

#[cfg(test)]
mod tests {
    use crate::{diag::DiagKind, interp::eval_source, value::Value, workspace::Workspace};

    fn eval_ok(src: &str) -> Workspace {
        let mut wk = Workspace::new();
        wk.make_project(None, "/src", "/build");
        eval_source(&mut wk, "test.build", src).unwrap();
        wk
    }

    #[test]
    fn length_contains_get() {
        let wk = eval_ok("a = [1, 2, 2]\nn = a.length()\nc = a.contains(2)\nm = a.get(1)\nlast = a.get(-1)\n");
        assert!(matches!(wk.get_obj(wk.lookup("n").unwrap()), Value::Number(3)));
        assert!(matches!(wk.get_obj(wk.lookup("c").unwrap()), Value::Bool(true)));
        assert!(matches!(wk.get_obj(wk.lookup("m").unwrap()), Value::Number(2)));
        assert!(matches!(wk.get_obj(wk.lookup("last").unwrap()), Value::Number(2)));
    }

    #[test]
    fn get_fallback_and_bounds() {
        let wk = eval_ok("x = [1].get(5, 9)\n");
        assert!(matches!(wk.get_obj(wk.lookup("x").unwrap()), Value::Number(9)));

        let mut wk = Workspace::new();
        wk.make_project(None, "/src", "/build");
        let err = eval_source(&mut wk, "test.build", "x = [1].get(5)\n").unwrap_err();
        assert_eq!(err.kind, DiagKind::Value);
    }

    #[test]
    fn join_via_array_receiver() {
        let wk = eval_ok("x = ['a', 'b'].join('-')\n");
        assert_eq!(wk.objstr(wk.lookup("x").unwrap()), "a-b");
    }

    #[test]
    fn join_rejects_non_string_elements() {
        let mut wk = Workspace::new();
        wk.make_project(None, "/src", "/build");
        let err = eval_source(&mut wk, "test.build", "x = [1].join('-')\n").unwrap_err();
        assert_eq!(err.kind, DiagKind::Type);
    }
}
