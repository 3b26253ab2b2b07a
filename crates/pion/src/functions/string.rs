//! String methods.

use crate::{
    args::{self, ArgKind, ArgVal, Signature},
    diag::{Diagnostic, EvalResult, Span},
    functions::{RawKwargs, unknown_method},
    value::{ObjId, Value, ValueKind},
    workspace::Workspace,
};

const NO_ARGS: Signature = Signature {
    positional: &[],
    optional: &[],
    keywords: &[],
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
        "strip" => {
            args::check(wk, "strip", name_span, pos, kw, &NO_ARGS)?;
            let sid = {
                let s = wk.objstr(recv.obj).to_owned();
                wk.str_push_stripped(&s)
            };
            Ok(wk.make_obj(Value::Str(sid)))
        }
        "to_upper" => {
            args::check(wk, "to_upper", name_span, pos, kw, &NO_ARGS)?;
            let upper = wk.objstr(recv.obj).to_ascii_uppercase();
            Ok(wk.make_str(&upper))
        }
        "to_lower" => {
            args::check(wk, "to_lower", name_span, pos, kw, &NO_ARGS)?;
            let lower = wk.objstr(recv.obj).to_ascii_lowercase();
            Ok(wk.make_str(&lower))
        }
        "underscorify" => {
            args::check(wk, "underscorify", name_span, pos, kw, &NO_ARGS)?;
            let out: String = wk
                .objstr(recv.obj)
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
                .collect();
            Ok(wk.make_str(&out))
        }
        "contains" => {
            const SIG: Signature = Signature {
                positional: &[ArgKind::Str],
                optional: &[],
                keywords: &[],
            };
            let checked = args::check(wk, "contains", name_span, pos, kw, &SIG)?;
            let found = wk.objstr(recv.obj).contains(wk.objstr(checked.pos(0).obj));
            Ok(wk.make_bool(found))
        }
        "split" => {
            const SIG: Signature = Signature {
                positional: &[],
                optional: &[ArgKind::Str],
                keywords: &[],
            };
            let checked = args::check(wk, "split", name_span, pos, kw, &SIG)?;
            let sep = checked.opt(0).map_or_else(|| " ".to_owned(), |a| wk.objstr(a.obj).to_owned());
            if sep.is_empty() {
                return Err(Diagnostic::value("split separator must not be empty", name_span));
            }
            let parts: Vec<String> = wk.objstr(recv.obj).split(sep.as_str()).map(str::to_owned).collect();
            let items: Vec<ObjId> = parts.iter().map(|p| wk.make_str(p)).collect();
            Ok(wk.make_array(items))
        }
        "join" => {
            const SIG: Signature = Signature {
                positional: &[ArgKind::Array],
                optional: &[],
                keywords: &[],
            };
            let checked = args::check(wk, "join", name_span, pos, kw, &SIG)?;
            let sep = wk.objstr(recv.obj).to_owned();
            join_strings(wk, &sep, checked.pos(0), name_span)
        }
        "format" => {
            const SIG: Signature = Signature {
                positional: &[ArgKind::Glob],
                optional: &[],
                keywords: &[],
            };
            let checked = args::check(wk, "format", name_span, pos, kw, &SIG)?;
            let template = wk.objstr(recv.obj).to_owned();
            let positionals = wk.array_items(checked.pos(0).obj);
            let out = string_format(wk, &template, name_span, |wk, key, span| {
                let idx: usize = key
                    .parse()
                    .map_err(|_| Diagnostic::value(format!("format key '{key}' is not an integer"), span))?;
                positionals.get(idx).copied().ok_or_else(|| {
                    Diagnostic::value(format!("format key {idx} out of range (got {} arguments)", positionals.len()), span)
                })
            })?;
            Ok(wk.make_str(&out))
        }
        "version_compare" => {
            const SIG: Signature = Signature {
                positional: &[ArgKind::Str],
                optional: &[],
                keywords: &[],
            };
            let checked = args::check(wk, "version_compare", name_span, pos, kw, &SIG)?;
            let own = wk.objstr(recv.obj).to_owned();
            let spec = wk.objstr(checked.pos(0).obj).to_owned();
            let result = version_compare(&own, recv.span, &spec, checked.pos(0).span)?;
            Ok(wk.make_bool(result))
        }
        _ => Err(unknown_method(ValueKind::String, name, name_span)),
    }
}

/// Joins string elements (flattening nested arrays) with `sep`.
pub(crate) fn join_strings(wk: &mut Workspace, sep: &str, arr: ArgVal, span: Span) -> EvalResult<ObjId> {
    let mut parts = Vec::new();
    for item in wk.array_flatten(arr.obj) {
        match wk.get_obj(item) {
            Value::Str(s) => parts.push(wk.str(*s).to_owned()),
            other => {
                return Err(Diagnostic::type_error(
                    format!("join expects string elements, got {}", other.kind()),
                    span,
                ));
            }
        }
    }
    let joined = parts.join(sep);
    Ok(wk.make_str(&joined))
}

/// Replaces `@key@` occurrences using `lookup`, coercing each replacement
/// to a string. Shared by `format()` and `configure_file()`.
///
/// Zero-length keys and an unclosed trailing `@` are errors; there is no
/// escape syntax.
pub(crate) fn string_format(
    wk: &mut Workspace,
    template: &str,
    span: Span,
    mut lookup: impl FnMut(&mut Workspace, &str, Span) -> EvalResult<ObjId>,
) -> EvalResult<String> {
    let mut out = String::new();
    let mut reading_key = false;
    let mut key = String::new();

    for c in template.chars() {
        if c != '@' {
            if reading_key {
                key.push(c);
            } else {
                out.push(c);
            }
            continue;
        }
        if reading_key {
            if key.is_empty() {
                return Err(Diagnostic::value("format key of zero length", span));
            }
            let value = lookup(wk, &key, span)?;
            out.push_str(&coerce_format_value(wk, value, span)?);
            key.clear();
            reading_key = false;
        } else {
            reading_key = true;
        }
    }

    if reading_key {
        return Err(Diagnostic::value("missing closing '@' in format string", span));
    }
    Ok(out)
}

fn coerce_format_value(wk: &Workspace, id: ObjId, span: Span) -> EvalResult<String> {
    match wk.get_obj(id) {
        Value::Str(s) => Ok(wk.str(*s).to_owned()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(if *b { "true" } else { "false" }.to_owned()),
        other => Err(Diagnostic::type_error(
            format!("cannot format a {} value", other.kind()),
            span,
        )),
    }
}

// ----- version comparison -----

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Version {
    major: u32,
    minor: u32,
    patch: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VerOp {
    Ge,
    Gt,
    Eq,
    Ne,
    Le,
    Lt,
}

impl VerOp {
    fn cmp(self, a: u32, b: u32) -> bool {
        match self {
            Self::Ge => a >= b,
            Self::Gt => a > b,
            Self::Eq => a == b,
            Self::Ne => a != b,
            Self::Le => a <= b,
            Self::Lt => a < b,
        }
    }

    fn includes_equality(self) -> bool {
        matches!(self, Self::Ge | Self::Le | Self::Eq)
    }
}

fn parse_version(s: &str, span: Span) -> EvalResult<Version> {
    let mut parts = [0u32; 3];
    let mut count = 0usize;
    for (i, comp) in s.split('.').enumerate() {
        if i >= 3 {
            return Err(Diagnostic::value(format!("too many components in version '{s}'"), span));
        }
        parts[i] = comp
            .parse()
            .map_err(|_| Diagnostic::value(format!("nondigit in version core: '{s}'"), span))?;
        count = i + 1;
    }
    if count == 0 {
        return Err(Diagnostic::value("empty version string", span));
    }
    Ok(Version {
        major: parts[0],
        minor: parts[1],
        patch: parts[2],
    })
}

/// Compares `own` against `spec`, an optional operator followed by a
/// dotted version. Missing components default to zero. The first unequal
/// component decides; all-equal satisfies operators that include equality.
pub(crate) fn version_compare(own: &str, own_span: Span, spec: &str, spec_span: Span) -> EvalResult<bool> {
    // Longest operators first so '>=' does not lex as '>' '='.
    const OPS: &[(&str, VerOp)] = &[
        (">=", VerOp::Ge),
        ("<=", VerOp::Le),
        ("==", VerOp::Eq),
        ("!=", VerOp::Ne),
        (">", VerOp::Gt),
        ("<", VerOp::Lt),
        ("=", VerOp::Eq),
    ];

    let mut op = VerOp::Eq;
    let mut rest = spec;
    for (text, candidate) in OPS {
        if let Some(tail) = spec.strip_prefix(text) {
            op = *candidate;
            rest = tail;
            break;
        }
    }

    let a = parse_version(own, own_span)?;
    let b = parse_version(rest, spec_span)?;

    if a.major != b.major {
        return Ok(op.cmp(a.major, b.major));
    }
    if a.minor != b.minor {
        return Ok(op.cmp(a.minor, b.minor));
    }
    if a.patch != b.patch {
        return Ok(op.cmp(a.patch, b.patch));
    }
    Ok(op.includes_equality())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::eval_source;

    fn fresh() -> Workspace {
        let mut wk = Workspace::new();
        wk.make_project(None, "/src", "/build");
        wk
    }

    fn eval_str(wk: &mut Workspace, src: &str) -> EvalResult<()> {
        eval_source(wk, "test.build", src)
    }

    fn get_str(wk: &Workspace, name: &str) -> String {
        wk.objstr(wk.lookup(name).expect("bound")).to_owned()
    }

    fn get_bool(wk: &Workspace, name: &str) -> bool {
        match wk.get_obj(wk.lookup(name).expect("bound")) {
            Value::Bool(b) => *b,
            other => panic!("expected bool, got {}", other.kind()),
        }
    }

    #[test]
    fn strip_removes_spaces_and_newlines() {
        let mut wk = fresh();
        eval_str(&mut wk, "x = '  x  \\n'.strip()\n").unwrap();
        assert_eq!(get_str(&wk, "x"), "x");
    }

    #[test]
    fn underscorify_boundary() {
        let mut wk = fresh();
        eval_str(&mut wk, "x = 'a-b_1.2'.underscorify()\n").unwrap();
        assert_eq!(get_str(&wk, "x"), "a_b_1_2");
    }

    #[test]
    fn to_upper() {
        let mut wk = fresh();
        eval_str(&mut wk, "x = 'aBc1'.to_upper()\n").unwrap();
        assert_eq!(get_str(&wk, "x"), "ABC1");
    }

    #[test]
    fn split_default_separator_is_space() {
        let mut wk = fresh();
        eval_str(&mut wk, "x = 'a b c'.split()\n").unwrap();
        let items = wk.array_items(wk.lookup("x").unwrap());
        let parts: Vec<&str> = items.iter().map(|i| wk.objstr(*i)).collect();
        assert_eq!(parts, ["a", "b", "c"]);
    }

    #[test]
    fn split_empty_string_yields_one_empty_fragment() {
        let mut wk = fresh();
        eval_str(&mut wk, "x = ''.split(' ')\n").unwrap();
        let items = wk.array_items(wk.lookup("x").unwrap());
        assert_eq!(items.len(), 1);
        assert_eq!(wk.objstr(items[0]), "");
    }

    #[test]
    fn split_lone_separator_yields_two_empty_fragments() {
        let mut wk = fresh();
        eval_str(&mut wk, "x = ' '.split(' ')\n").unwrap();
        let items = wk.array_items(wk.lookup("x").unwrap());
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| wk.objstr(*i).is_empty()));
    }

    #[test]
    fn split_consecutive_separators_produce_empty_fragments() {
        let mut wk = fresh();
        eval_str(&mut wk, "x = 'a::b'.split(':')\n").unwrap();
        let items = wk.array_items(wk.lookup("x").unwrap());
        let parts: Vec<&str> = items.iter().map(|i| wk.objstr(*i)).collect();
        assert_eq!(parts, ["a", "", "b"]);
    }

    #[test]
    fn join_and_split_invert_when_no_element_contains_the_separator() {
        let mut wk = fresh();
        eval_str(&mut wk, "x = ':'.join(['a', 'b', 'c'])\ny = x.split(':')\n").unwrap();
        assert_eq!(get_str(&wk, "x"), "a:b:c");
        let items = wk.array_items(wk.lookup("y").unwrap());
        let parts: Vec<&str> = items.iter().map(|i| wk.objstr(*i)).collect();
        assert_eq!(parts, ["a", "b", "c"]);
    }

    #[test]
    fn format_replaces_positional_keys() {
        let mut wk = fresh();
        eval_str(&mut wk, "x = '@0@-@0@'.format('x')\n").unwrap();
        assert_eq!(get_str(&wk, "x"), "x-x");
        eval_str(&mut wk, "y = '@0@ @1@'.format('a', 2)\n").unwrap();
        assert_eq!(get_str(&wk, "y"), "a 2");
    }

    #[test]
    fn format_zero_length_key_is_an_error() {
        let mut wk = fresh();
        let err = eval_str(&mut wk, "x = 'a@@b'.format('x')\n").unwrap_err();
        assert!(err.msg.contains("zero length"));
    }

    #[test]
    fn format_unclosed_key_is_an_error() {
        let mut wk = fresh();
        let err = eval_str(&mut wk, "x = 'a@0'.format('x')\n").unwrap_err();
        assert!(err.msg.contains("missing closing"));
    }

    #[test]
    fn format_out_of_range_key_is_an_error() {
        let mut wk = fresh();
        let err = eval_str(&mut wk, "x = '@1@'.format('x')\n").unwrap_err();
        assert!(err.msg.contains("out of range"));
    }

    #[test]
    fn format_rejects_array_arguments() {
        let mut wk = fresh();
        let err = eval_str(&mut wk, "x = '@0@'.format(['a'])\n").unwrap_err();
        assert_eq!(err.kind, crate::diag::DiagKind::Type);
    }

    #[test]
    fn contains_substring() {
        let mut wk = fresh();
        eval_str(&mut wk, "a = 'abcd'.contains('bc')\nb = 'abcd'.contains('x')\n").unwrap();
        assert!(get_bool(&wk, "a"));
        assert!(!get_bool(&wk, "b"));
    }

    #[test]
    fn version_compare_spec_cases() {
        let mut wk = fresh();
        eval_str(
            &mut wk,
            "a = '1.2.3'.version_compare('>=1.2')\nb = '1.2.3'.version_compare('<1.2.3')\nc = '1.2.3'.version_compare('!=1.2.3')\n",
        )
        .unwrap();
        assert!(get_bool(&wk, "a"));
        assert!(!get_bool(&wk, "b"));
        assert!(!get_bool(&wk, "c"));
    }

    #[test]
    fn version_compare_default_operator_is_equality() {
        let mut wk = fresh();
        eval_str(&mut wk, "a = '1.2'.version_compare('1.2.0')\nb = '1.2'.version_compare('1.2.1')\n").unwrap();
        assert!(get_bool(&wk, "a"));
        assert!(!get_bool(&wk, "b"));
    }

    #[test]
    fn version_compare_is_reflexive_for_equality() {
        for v in ["0", "1.2", "1.2.3", "10.0.99"] {
            let spec = format!("=={v}");
            assert!(version_compare(v, Span::default(), &spec, Span::default()).unwrap());
        }
    }

    #[test]
    fn version_compare_component_order() {
        // 1.10.0 > 1.9.9 componentwise even though "1.10" < "1.9" as text.
        assert!(version_compare("1.10.0", Span::default(), ">1.9.9", Span::default()).unwrap());
    }

    #[test]
    fn malformed_version_is_a_value_error() {
        let mut wk = fresh();
        let err = eval_str(&mut wk, "x = '1.x'.version_compare('>=1')\n").unwrap_err();
        assert_eq!(err.kind, crate::diag::DiagKind::Value);
    }

    #[test]
    fn unknown_method_is_a_name_error() {
        let mut wk = fresh();
        let err = eval_str(&mut wk, "x = 'a'.bogus()\n").unwrap_err();
        assert_eq!(err.kind, crate::diag::DiagKind::Name);
        assert!(err.msg.contains("bogus"));
    }
}
