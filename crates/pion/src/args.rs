//! Declarative signatures and the central argument checker.
//!
//! Every builtin function and method declares its shape once — required
//! positional kinds, optional positional kinds, and keywords — and one
//! checker enforces it, so arity and type errors are uniform and always
//! carry the span of the offending argument.

use std::fmt;

use ahash::AHashMap;
use smallvec::SmallVec;

use crate::{
    diag::{Diagnostic, EvalResult, Span},
    value::{ObjId, ValueKind},
    workspace::Workspace,
};

/// Kind pattern an argument slot accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ArgKind {
    /// Any value.
    Any,
    Bool,
    Number,
    Str,
    Array,
    Dict,
    File,
    Dependency,
    FeatureOption,
    /// Variadic tail: collects all remaining positionals into an array.
    /// Only valid as the final entry of a positional list.
    Glob,
}

impl ArgKind {
    fn matches(self, kind: ValueKind) -> bool {
        match self {
            Self::Any | Self::Glob => true,
            Self::Bool => kind == ValueKind::Bool,
            Self::Number => kind == ValueKind::Number,
            Self::Str => kind == ValueKind::String,
            Self::Array => kind == ValueKind::Array,
            Self::Dict => kind == ValueKind::Dict,
            Self::File => kind == ValueKind::File,
            Self::Dependency => kind == ValueKind::Dependency,
            Self::FeatureOption => kind == ValueKind::FeatureOption,
        }
    }
}

impl fmt::Display for ArgKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Any | Self::Glob => "any",
            Self::Bool => "bool",
            Self::Number => "number",
            Self::Str => "string",
            Self::Array => "array",
            Self::Dict => "dict",
            Self::File => "file",
            Self::Dependency => "dependency",
            Self::FeatureOption => "feature_option",
        };
        f.write_str(s)
    }
}

/// A declared keyword argument.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Kw {
    pub name: &'static str,
    pub kind: ArgKind,
    pub required: bool,
}

/// Optional keyword of the given kind.
pub(crate) const fn kw(name: &'static str, kind: ArgKind) -> Kw {
    Kw {
        name,
        kind,
        required: false,
    }
}

/// Required keyword of the given kind.
pub(crate) const fn kw_required(name: &'static str, kind: ArgKind) -> Kw {
    Kw {
        name,
        kind,
        required: true,
    }
}

/// The declared shape of one builtin.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Signature {
    pub positional: &'static [ArgKind],
    pub optional: &'static [ArgKind],
    pub keywords: &'static [Kw],
}

/// An evaluated argument and where it was written.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ArgVal {
    pub obj: ObjId,
    pub span: Span,
}

/// The result of a successful check, indexed the way the signature reads.
#[derive(Debug)]
pub(crate) struct CheckedArgs {
    positional: SmallVec<[ArgVal; 4]>,
    keywords: AHashMap<&'static str, ArgVal>,
}

impl CheckedArgs {
    /// The i-th required positional. A Glob slot holds the collected array.
    #[must_use]
    pub fn pos(&self, i: usize) -> ArgVal {
        self.positional[i]
    }

    /// The i-th positional counting optionals, if it was supplied.
    #[must_use]
    pub fn opt(&self, i: usize) -> Option<ArgVal> {
        self.positional.get(i).copied()
    }

    #[must_use]
    pub fn keyword(&self, name: &str) -> Option<ArgVal> {
        self.keywords.get(name).copied()
    }
}

/// Checks evaluated call arguments against `sig`.
///
/// `name` is the function or method name used in messages; `call_span` is
/// where the call itself sits (for missing-argument errors that have no
/// argument to point at).
pub(crate) fn check(
    wk: &mut Workspace,
    name: &str,
    call_span: Span,
    raw_pos: &[ArgVal],
    raw_kw: &[(String, Span, ArgVal)],
    sig: &Signature,
) -> EvalResult<CheckedArgs> {
    let mut positional: SmallVec<[ArgVal; 4]> = SmallVec::new();
    let mut next = 0usize;

    for (slot, kind) in sig.positional.iter().enumerate() {
        if *kind == ArgKind::Glob {
            debug_assert_eq!(slot, sig.positional.len() - 1, "glob must be the final slot");
            let rest: Vec<ObjId> = raw_pos[next..].iter().map(|a| a.obj).collect();
            next = raw_pos.len();
            let arr = wk.make_array(rest);
            positional.push(ArgVal {
                obj: arr,
                span: raw_pos.get(slot).map_or(call_span, |a| a.span),
            });
            break;
        }
        let Some(arg) = raw_pos.get(next) else {
            let required = sig.positional.iter().filter(|k| **k != ArgKind::Glob).count();
            return Err(Diagnostic::arity(
                format!(
                    "{name}() takes at least {required} positional arguments, got {}",
                    raw_pos.len()
                ),
                call_span,
            ));
        };
        check_kind(wk, *kind, *arg)?;
        positional.push(*arg);
        next += 1;
    }

    for kind in sig.optional {
        let Some(arg) = raw_pos.get(next) else { break };
        check_kind(wk, *kind, *arg)?;
        positional.push(*arg);
        next += 1;
    }

    if next < raw_pos.len() {
        return Err(Diagnostic::arity(
            format!(
                "{name}() takes at most {} positional arguments, got {}",
                sig.positional.len() + sig.optional.len(),
                raw_pos.len()
            ),
            raw_pos[next].span,
        ));
    }

    let mut keywords: AHashMap<&'static str, ArgVal> = AHashMap::with_capacity(raw_kw.len());
    for (kw_name, kw_span, arg) in raw_kw {
        let Some(decl) = sig.keywords.iter().find(|k| k.name == kw_name) else {
            return Err(Diagnostic::arity(
                format!("{name}() got an unexpected keyword argument '{kw_name}'"),
                *kw_span,
            ));
        };
        if keywords.insert(decl.name, *arg).is_some() {
            return Err(Diagnostic::arity(
                format!("{name}() got keyword argument '{kw_name}' twice"),
                *kw_span,
            ));
        }
        check_kind(wk, decl.kind, *arg)?;
    }

    for decl in sig.keywords {
        if decl.required && !keywords.contains_key(decl.name) {
            return Err(Diagnostic::arity(
                format!("{name}() missing required keyword argument '{}'", decl.name),
                call_span,
            ));
        }
    }

    Ok(CheckedArgs { positional, keywords })
}

fn check_kind(wk: &Workspace, want: ArgKind, arg: ArgVal) -> EvalResult<()> {
    let got = wk.get_obj(arg.obj).kind();
    if want.matches(got) {
        Ok(())
    } else {
        Err(Diagnostic::type_error(format!("expected {want}, got {got}"), arg.span))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn val(wk: &mut Workspace, obj: ObjId) -> ArgVal {
        let _ = wk;
        ArgVal {
            obj,
            span: Span::new(0, 1, 1),
        }
    }

    #[test]
    fn required_positional_checked_by_kind() {
        let mut wk = Workspace::new();
        let s = wk.make_str("x");
        let a = val(&mut wk, s);
        let sig = Signature {
            positional: &[ArgKind::Str],
            ..Signature::default()
        };
        let checked = check(&mut wk, "f", Span::default(), &[a], &[], &sig).unwrap();
        assert_eq!(checked.pos(0).obj, s);

        let n = wk.make_number(1);
        let bad = val(&mut wk, n);
        let err = check(&mut wk, "f", Span::default(), &[bad], &[], &sig).unwrap_err();
        assert_eq!(err.kind, crate::diag::DiagKind::Type);
        assert_eq!(err.msg, "expected string, got number");
    }

    #[test]
    fn missing_positional_is_arity_error() {
        let mut wk = Workspace::new();
        let sig = Signature {
            positional: &[ArgKind::Str],
            ..Signature::default()
        };
        let err = check(&mut wk, "f", Span::default(), &[], &[], &sig).unwrap_err();
        assert_eq!(err.kind, crate::diag::DiagKind::Arity);
    }

    #[test]
    fn extra_positional_is_arity_error() {
        let mut wk = Workspace::new();
        let s = wk.make_str("x");
        let a = val(&mut wk, s);
        let err = check(&mut wk, "f", Span::default(), &[a], &[], &Signature::default()).unwrap_err();
        assert_eq!(err.kind, crate::diag::DiagKind::Arity);
    }

    #[test]
    fn glob_collects_remaining_positionals() {
        let mut wk = Workspace::new();
        let s1 = wk.make_str("a");
        let s2 = wk.make_str("b");
        let args = [val(&mut wk, s1), val(&mut wk, s2)];
        let sig = Signature {
            positional: &[ArgKind::Glob],
            ..Signature::default()
        };
        let checked = check(&mut wk, "files", Span::default(), &args, &[], &sig).unwrap();
        assert_eq!(wk.array_items(checked.pos(0).obj), vec![s1, s2]);
    }

    #[test]
    fn glob_accepts_zero_arguments() {
        let mut wk = Workspace::new();
        let sig = Signature {
            positional: &[ArgKind::Glob],
            ..Signature::default()
        };
        let checked = check(&mut wk, "files", Span::default(), &[], &[], &sig).unwrap();
        assert!(wk.array_items(checked.pos(0).obj).is_empty());
    }

    #[test]
    fn unknown_keyword_is_rejected() {
        let mut wk = Workspace::new();
        let b = wk.make_bool(true);
        let kw_args = vec![("bogus".to_owned(), Span::default(), val(&mut wk, b))];
        let err = check(&mut wk, "f", Span::default(), &[], &kw_args, &Signature::default()).unwrap_err();
        assert_eq!(err.kind, crate::diag::DiagKind::Arity);
        assert!(err.msg.contains("bogus"));
    }

    #[test]
    fn required_keyword_must_be_present() {
        let mut wk = Workspace::new();
        static KWS: &[Kw] = &[kw_required("output", ArgKind::Str)];
        let sig = Signature {
            keywords: KWS,
            ..Signature::default()
        };
        let err = check(&mut wk, "custom_target", Span::default(), &[], &[], &sig).unwrap_err();
        assert!(err.msg.contains("output"));
    }

    #[test]
    fn optional_positionals_may_be_absent() {
        let mut wk = Workspace::new();
        let sig = Signature {
            optional: &[ArgKind::Str],
            ..Signature::default()
        };
        let checked = check(&mut wk, "split", Span::default(), &[], &[], &sig).unwrap();
        assert!(checked.opt(0).is_none());
    }
}
