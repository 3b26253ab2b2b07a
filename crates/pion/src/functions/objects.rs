//! Methods on the non-container receivers: numbers, bools, dependencies,
//! programs, feature options, compilers, machines, the `meson` object, and
//! build targets.

use crate::{
    args::{self, ArgKind, ArgVal, Signature},
    diag::{Diagnostic, EvalResult, Span},
    functions::{RawKwargs, unknown_method},
    path,
    value::{FeatureState, ObjId, Value, ValueKind},
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
    match wk.get_obj(recv.obj).kind() {
        ValueKind::Number => number(wk, recv, name, name_span, pos, kw),
        ValueKind::Bool => boolean(wk, recv, name, name_span, pos, kw),
        ValueKind::Dependency => dependency(wk, recv, name, name_span, pos, kw),
        ValueKind::ExternalProgram => external_program(wk, recv, name, name_span, pos, kw),
        ValueKind::FeatureOption => feature(wk, recv, name, name_span, pos, kw),
        ValueKind::Compiler => compiler(wk, recv, name, name_span, pos, kw),
        ValueKind::Machine => machine(wk, recv, name, name_span, pos, kw),
        ValueKind::Meson => meson(wk, recv, name, name_span, pos, kw),
        ValueKind::BuildTarget => build_target(wk, recv, name, name_span, pos, kw),
        other => Err(unknown_method(other, name, name_span)),
    }
}

fn number(
    wk: &mut Workspace,
    recv: ArgVal,
    name: &str,
    name_span: Span,
    pos: &[ArgVal],
    kw: &RawKwargs,
) -> EvalResult<ObjId> {
    let Value::Number(n) = wk.get_obj(recv.obj) else {
        unreachable!("dispatched on kind");
    };
    let n = *n;
    args::check(wk, name, name_span, pos, kw, &NO_ARGS)?;
    match name {
        "to_string" => Ok(wk.make_str(&n.to_string())),
        "is_even" => Ok(wk.make_bool(n % 2 == 0)),
        "is_odd" => Ok(wk.make_bool(n % 2 != 0)),
        _ => Err(unknown_method(ValueKind::Number, name, name_span)),
    }
}

fn boolean(
    wk: &mut Workspace,
    recv: ArgVal,
    name: &str,
    name_span: Span,
    pos: &[ArgVal],
    kw: &RawKwargs,
) -> EvalResult<ObjId> {
    let Value::Bool(b) = wk.get_obj(recv.obj) else {
        unreachable!("dispatched on kind");
    };
    let b = *b;
    args::check(wk, name, name_span, pos, kw, &NO_ARGS)?;
    match name {
        "to_string" => Ok(wk.make_str(if b { "true" } else { "false" })),
        "to_int" => Ok(wk.make_number(i64::from(b))),
        _ => Err(unknown_method(ValueKind::Bool, name, name_span)),
    }
}

fn dependency(
    wk: &mut Workspace,
    recv: ArgVal,
    name: &str,
    name_span: Span,
    pos: &[ArgVal],
    kw: &RawKwargs,
) -> EvalResult<ObjId> {
    let Value::Dependency(dep) = wk.get_obj(recv.obj) else {
        unreachable!("dispatched on kind");
    };
    let (dep_name, version, found) = (dep.name, dep.version, dep.found);
    args::check(wk, name, name_span, pos, kw, &NO_ARGS)?;
    match name {
        "found" => Ok(wk.make_bool(found)),
        "name" => {
            let s = wk.str(dep_name).to_owned();
            Ok(wk.make_str(&s))
        }
        "version" => {
            let s = if version.is_some() {
                wk.str(version).to_owned()
            } else {
                "undefined".to_owned()
            };
            Ok(wk.make_str(&s))
        }
        _ => Err(unknown_method(ValueKind::Dependency, name, name_span)),
    }
}

fn external_program(
    wk: &mut Workspace,
    recv: ArgVal,
    name: &str,
    name_span: Span,
    pos: &[ArgVal],
    kw: &RawKwargs,
) -> EvalResult<ObjId> {
    let Value::ExternalProgram(prog) = wk.get_obj(recv.obj) else {
        unreachable!("dispatched on kind");
    };
    let (prog_name, full_path, found) = (prog.name, prog.full_path, prog.found);
    args::check(wk, name, name_span, pos, kw, &NO_ARGS)?;
    match name {
        "found" => Ok(wk.make_bool(found)),
        "path" | "full_path" => {
            if !found {
                return Err(Diagnostic::value(
                    format!("program '{}' was not found", wk.str(prog_name)),
                    recv.span,
                ));
            }
            let s = wk.str(full_path).to_owned();
            Ok(wk.make_str(&s))
        }
        _ => Err(unknown_method(ValueKind::ExternalProgram, name, name_span)),
    }
}

fn feature(
    wk: &mut Workspace,
    recv: ArgVal,
    name: &str,
    name_span: Span,
    pos: &[ArgVal],
    kw: &RawKwargs,
) -> EvalResult<ObjId> {
    let Value::FeatureOption(state) = wk.get_obj(recv.obj) else {
        unreachable!("dispatched on kind");
    };
    let state = *state;
    args::check(wk, name, name_span, pos, kw, &NO_ARGS)?;
    match name {
        "enabled" => Ok(wk.make_bool(state == FeatureState::Enabled)),
        "disabled" => Ok(wk.make_bool(state == FeatureState::Disabled)),
        "auto" => Ok(wk.make_bool(state == FeatureState::Auto)),
        _ => Err(unknown_method(ValueKind::FeatureOption, name, name_span)),
    }
}

fn compiler(
    wk: &mut Workspace,
    recv: ArgVal,
    name: &str,
    name_span: Span,
    pos: &[ArgVal],
    kw: &RawKwargs,
) -> EvalResult<ObjId> {
    let Value::Compiler(comp) = wk.get_obj(recv.obj) else {
        unreachable!("dispatched on kind");
    };
    let binary = comp.name;
    args::check(wk, name, name_span, pos, kw, &NO_ARGS)?;
    match name {
        "get_id" => Ok(wk.make_str("gcc")),
        "cmd_array" => {
            let s = wk.str(binary).to_owned();
            let bin = wk.make_str(&s);
            Ok(wk.make_array(vec![bin]))
        }
        _ => Err(unknown_method(ValueKind::Compiler, name, name_span)),
    }
}

fn machine(
    wk: &mut Workspace,
    _recv: ArgVal,
    name: &str,
    name_span: Span,
    pos: &[ArgVal],
    kw: &RawKwargs,
) -> EvalResult<ObjId> {
    args::check(wk, name, name_span, pos, kw, &NO_ARGS)?;
    match name {
        "system" => Ok(wk.make_str(std::env::consts::OS)),
        "cpu_family" => Ok(wk.make_str(std::env::consts::ARCH)),
        "endian" => Ok(wk.make_str(if cfg!(target_endian = "little") {
            "little"
        } else {
            "big"
        })),
        _ => Err(unknown_method(ValueKind::Machine, name, name_span)),
    }
}

fn meson(
    wk: &mut Workspace,
    _recv: ArgVal,
    name: &str,
    name_span: Span,
    pos: &[ArgVal],
    kw: &RawKwargs,
) -> EvalResult<ObjId> {
    match name {
        "current_source_dir" => {
            args::check(wk, name, name_span, pos, kw, &NO_ARGS)?;
            let s = wk.str(wk.current_project().cwd).to_owned();
            Ok(wk.make_str(&s))
        }
        "current_build_dir" => {
            args::check(wk, name, name_span, pos, kw, &NO_ARGS)?;
            let s = wk.str(wk.current_project().build_dir).to_owned();
            Ok(wk.make_str(&s))
        }
        "project_name" => {
            args::check(wk, name, name_span, pos, kw, &NO_ARGS)?;
            let s = wk.str(wk.current_project().cfg.name).to_owned();
            Ok(wk.make_str(&s))
        }
        "project_version" => {
            args::check(wk, name, name_span, pos, kw, &NO_ARGS)?;
            let version = wk.current_project().cfg.version;
            let s = if version.is_some() {
                wk.str(version).to_owned()
            } else {
                "undefined".to_owned()
            };
            Ok(wk.make_str(&s))
        }
        "get_compiler" => {
            const SIG: Signature = Signature {
                positional: &[ArgKind::Str],
                optional: &[],
                keywords: &[],
            };
            let checked = args::check(wk, name, name_span, pos, kw, &SIG)?;
            let lang = wk.objstr(checked.pos(0).obj).to_owned();
            wk.dict_get(wk.current_project().compilers, &lang).ok_or_else(|| {
                Diagnostic::value(
                    format!("no compiler registered for language '{lang}'"),
                    checked.pos(0).span,
                )
            })
        }
        _ => Err(unknown_method(ValueKind::Meson, name, name_span)),
    }
}

fn build_target(
    wk: &mut Workspace,
    recv: ArgVal,
    name: &str,
    name_span: Span,
    pos: &[ArgVal],
    kw: &RawKwargs,
) -> EvalResult<ObjId> {
    let Value::BuildTarget(tgt) = wk.get_obj(recv.obj) else {
        unreachable!("dispatched on kind");
    };
    let (tgt_name, build_dir, build_name) = (tgt.name, tgt.build_dir, tgt.build_name);
    args::check(wk, name, name_span, pos, kw, &NO_ARGS)?;
    match name {
        "name" => {
            let s = wk.str(tgt_name).to_owned();
            Ok(wk.make_str(&s))
        }
        "full_path" => {
            let full = path::join(wk.str(build_dir), wk.str(build_name));
            Ok(wk.make_str(&full))
        }
        _ => Err(unknown_method(ValueKind::BuildTarget, name, name_span)),
    }
}
