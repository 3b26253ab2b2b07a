//! Dict methods.

use crate::{
    args::{self, ArgKind, ArgVal, Signature},
    diag::{Diagnostic, EvalResult, Span},
    functions::{RawKwargs, unknown_method},
    value::{ObjId, ValueKind},
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
        "has_key" => {
            const SIG: Signature = Signature {
                positional: &[ArgKind::Str],
                optional: &[],
                keywords: &[],
            };
            let checked = args::check(wk, "has_key", name_span, pos, kw, &SIG)?;
            let key = wk.objstr(checked.pos(0).obj).to_owned();
            let found = wk.dict_get(recv.obj, &key).is_some();
            Ok(wk.make_bool(found))
        }
        "get" => {
            const SIG: Signature = Signature {
                positional: &[ArgKind::Str],
                optional: &[ArgKind::Any],
                keywords: &[],
            };
            let checked = args::check(wk, "get", name_span, pos, kw, &SIG)?;
            let key = wk.objstr(checked.pos(0).obj).to_owned();
            match wk.dict_get(recv.obj, &key) {
                Some(value) => Ok(value),
                None => checked
                    .opt(1)
                    .map(|a| a.obj)
                    .ok_or_else(|| Diagnostic::value(format!("key '{key}' not found"), checked.pos(0).span)),
            }
        }
        "keys" => {
            const SIG: Signature = Signature {
                positional: &[],
                optional: &[],
                keywords: &[],
            };
            args::check(wk, "keys", name_span, pos, kw, &SIG)?;
            let keys: Vec<ObjId> = wk.dict_entries(recv.obj).into_iter().map(|(_, key, _)| key).collect();
            Ok(wk.make_array(keys))
        }
        _ => Err(unknown_method(ValueKind::Dict, name, name_span)),
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
    fn has_key_and_get() {
        let wk = eval_ok("d = {'a': 1}\nh = d.has_key('a')\nm = d.get('a')\nf = d.get('z', 7)\n");
        assert!(matches!(wk.get_obj(wk.lookup("h").unwrap()), Value::Bool(true)));
        assert!(matches!(wk.get_obj(wk.lookup("m").unwrap()), Value::Number(1)));
        assert!(matches!(wk.get_obj(wk.lookup("f").unwrap()), Value::Number(7)));
    }

    #[test]
    fn get_without_fallback_errors_on_missing_key() {
        let mut wk = Workspace::new();
        wk.make_project(None, "/src", "/build");
        let err = eval_source(&mut wk, "test.build", "x = {'a': 1}.get('z')\n").unwrap_err();
        assert_eq!(err.kind, DiagKind::Value);
    }

    #[test]
    fn keys_preserve_insertion_order() {
        let wk = eval_ok("k = {'z': 1, 'a': 2}.keys()\n");
        let items = wk.array_items(wk.lookup("k").unwrap());
        let keys: Vec<&str> = items.iter().map(|i| wk.objstr(*i)).collect();
        assert_eq!(keys, ["z", "a"]);
    }
}
