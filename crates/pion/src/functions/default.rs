//! The global builtin functions.

use std::{env, fs, str::FromStr};

use tracing::{debug, info};

use crate::{
    args::{self, ArgKind, ArgVal, Signature, kw, kw_required},
    coerce::{self, Requirement},
    diag::{DiagKind, Diagnostic, EvalResult, Span},
    functions::{RawKwargs, string},
    interp, options, path,
    value::{
        BuildTarget, Compiler, CompilerKind, CustomTarget, Dependency, ExternalProgram, ObjId, OptionType,
        TargetKind, TestCase, Value, ValueKind,
    },
    workspace::Workspace,
};

pub(crate) fn project(wk: &mut Workspace, span: Span, pos: &[ArgVal], kws: &RawKwargs) -> EvalResult<ObjId> {
    const SIG: Signature = Signature {
        positional: &[ArgKind::Str, ArgKind::Glob],
        optional: &[],
        keywords: &[
            kw("version", ArgKind::Str),
            kw("license", ArgKind::Any),
            kw("default_options", ArgKind::Array),
            kw("meson_version", ArgKind::Str),
        ],
    };
    let checked = args::check(wk, "project", span, pos, kws, &SIG)?;

    if wk.current_project().cfg.name.is_some() {
        return Err(Diagnostic::value("project() was already called", span));
    }

    let name = wk.objstr(checked.pos(0).obj).to_owned();
    info!("configuring project '{name}'");
    wk.current_project_mut().cfg.name = wk.str_push(&name);

    if let Some(version) = checked.keyword("version") {
        let v = wk.objstr(version.obj).to_owned();
        wk.current_project_mut().cfg.version = wk.str_push(&v);
    }
    if let Some(license) = checked.keyword("license") {
        let l = wk.obj_display(license.obj);
        wk.current_project_mut().cfg.license = wk.str_push(&l);
    }

    for lang in wk.array_items(checked.pos(1).obj) {
        let lang_val = ArgVal {
            obj: lang,
            span: checked.pos(1).span,
        };
        wk.expect_kind(lang, ValueKind::String, lang_val.span)?;
        let lang_name = wk.objstr(lang).to_owned();
        register_compiler(wk, &lang_name, lang_val.span)?;
    }

    if let Some(defaults) = checked.keyword("default_options") {
        for entry in wk.array_items(defaults.obj) {
            wk.expect_kind(entry, ValueKind::String, defaults.span)?;
            let entry_str = wk.objstr(entry).to_owned();
            options::set_default(wk, defaults.span, &entry_str)?;
        }
    }

    Ok(ObjId::NULL)
}

/// Registers the compiler for a language in the current project. Only C is
/// supported; the binary comes from `$CC` with a `cc` fallback.
fn register_compiler(wk: &mut Workspace, lang: &str, span: Span) -> EvalResult<()> {
    if lang != "c" {
        return Err(Diagnostic::value(format!("unsupported language '{lang}'"), span));
    }
    let compilers = wk.current_project().compilers;
    if wk.dict_get(compilers, lang).is_some() {
        return Ok(());
    }
    let binary = env::var("CC").unwrap_or_else(|_| "cc".to_owned());
    let name = wk.str_push(&binary);
    let comp = wk.make_obj(Value::Compiler(Compiler {
        name,
        kind: CompilerKind::Gcc,
    }));
    wk.dict_insert(compilers, lang, comp);
    Ok(())
}

pub(crate) fn executable(wk: &mut Workspace, span: Span, pos: &[ArgVal], kws: &RawKwargs) -> EvalResult<ObjId> {
    build_target_impl(wk, span, pos, kws, TargetKind::Executable)
}

pub(crate) fn static_library(wk: &mut Workspace, span: Span, pos: &[ArgVal], kws: &RawKwargs) -> EvalResult<ObjId> {
    build_target_impl(wk, span, pos, kws, TargetKind::StaticLibrary)
}

fn build_target_impl(
    wk: &mut Workspace,
    span: Span,
    pos: &[ArgVal],
    kws: &RawKwargs,
    kind: TargetKind,
) -> EvalResult<ObjId> {
    const SIG: Signature = Signature {
        positional: &[ArgKind::Str, ArgKind::Glob],
        optional: &[],
        keywords: &[
            kw("include_directories", ArgKind::Any),
            kw("c_args", ArgKind::Any),
            kw("dependencies", ArgKind::Any),
            kw("link_with", ArgKind::Any),
            kw("install", ArgKind::Bool),
        ],
    };
    let fn_name = match kind {
        TargetKind::Executable => "executable",
        TargetKind::StaticLibrary => "static_library",
    };
    let checked = args::check(wk, fn_name, span, pos, kws, &SIG)?;

    let name = wk.objstr(checked.pos(0).obj).to_owned();
    if !path::is_basename(&name) {
        return Err(Diagnostic::value(
            format!("target name '{name}' contains path separators"),
            checked.pos(0).span,
        ));
    }

    let src = coerce::coerce_files(wk, checked.pos(1))?;

    let include_dirs = match checked.keyword("include_directories") {
        Some(arg) => coerce::coerce_dirs(wk, arg)?,
        None => ObjId::NULL,
    };
    let c_args = match checked.keyword("c_args") {
        Some(arg) => string_array(wk, arg)?,
        None => ObjId::NULL,
    };
    let deps = match checked.keyword("dependencies") {
        Some(arg) => kind_array(wk, arg, ValueKind::Dependency)?,
        None => ObjId::NULL,
    };
    let link_with = match checked.keyword("link_with") {
        Some(arg) => link_with_array(wk, arg)?,
        None => ObjId::NULL,
    };

    let build_name = match kind {
        TargetKind::Executable => name.clone(),
        TargetKind::StaticLibrary => format!("lib{name}.a"),
    };

    let proj = wk.current_project();
    let (cwd, build_dir, targets) = (proj.cwd, proj.build_dir, proj.targets);
    let name_id = wk.str_push(&name);
    let build_name_id = wk.str_push(&build_name);

    let tgt = wk.make_obj(Value::BuildTarget(BuildTarget {
        name: name_id,
        build_name: build_name_id,
        build_dir,
        cwd,
        kind,
        src,
        include_dirs,
        c_args,
        deps,
        link_with,
    }));
    wk.array_push(targets, tgt);
    Ok(tgt)
}

/// Flattens and type-checks an array of strings.
fn string_array(wk: &mut Workspace, arg: ArgVal) -> EvalResult<ObjId> {
    let items = wk.array_flatten(arg.obj);
    for item in &items {
        wk.expect_kind(*item, ValueKind::String, arg.span)?;
    }
    Ok(wk.make_array(items))
}

fn kind_array(wk: &mut Workspace, arg: ArgVal, want: ValueKind) -> EvalResult<ObjId> {
    let items = wk.array_flatten(arg.obj);
    for item in &items {
        wk.expect_kind(*item, want, arg.span)?;
    }
    Ok(wk.make_array(items))
}

/// `link_with:` takes build targets and raw linker-argument strings.
fn link_with_array(wk: &mut Workspace, arg: ArgVal) -> EvalResult<ObjId> {
    let items = wk.array_flatten(arg.obj);
    for item in &items {
        let kind = wk.get_obj(*item).kind();
        if !matches!(kind, ValueKind::BuildTarget | ValueKind::String) {
            return Err(Diagnostic::type_error(
                format!("link_with takes build targets or strings, got {kind}"),
                arg.span,
            ));
        }
    }
    Ok(wk.make_array(items))
}

pub(crate) fn custom_target(wk: &mut Workspace, span: Span, pos: &[ArgVal], kws: &RawKwargs) -> EvalResult<ObjId> {
    const SIG: Signature = Signature {
        positional: &[ArgKind::Str],
        optional: &[],
        keywords: &[
            kw("input", ArgKind::Any),
            kw_required("output", ArgKind::Any),
            kw_required("command", ArgKind::Array),
            kw("capture", ArgKind::Bool),
            kw("build_by_default", ArgKind::Bool),
        ],
    };
    let checked = args::check(wk, "custom_target", span, pos, kws, &SIG)?;

    let name = wk.objstr(checked.pos(0).obj).to_owned();

    let command = checked.keyword("command").expect("required keyword");
    let cmd_items = wk.array_flatten(command.obj);
    let Some((first, rest)) = cmd_items.split_first() else {
        return Err(Diagnostic::value("command: must not be empty", command.span));
    };
    // A bare string is a PATH lookup left to the shell; everything else
    // resolves to an artifact the edge can depend on.
    let (cmd, cmd_is_artifact) = match wk.get_obj(*first) {
        Value::Str(_) => (*first, false),
        _ => {
            let coerced = coerce::coerce_executable(
                wk,
                ArgVal {
                    obj: *first,
                    span: command.span,
                },
            )?;
            (coerced, true)
        }
    };

    let mut cmd_args = Vec::with_capacity(rest.len());
    for item in rest {
        match wk.get_obj(*item) {
            Value::Str(_) | Value::File(_) | Value::BuildTarget(_) => cmd_args.push(*item),
            Value::ExternalProgram(_) => {
                let coerced = coerce::coerce_executable(
                    wk,
                    ArgVal {
                        obj: *item,
                        span: command.span,
                    },
                )?;
                cmd_args.push(coerced);
            }
            other => {
                return Err(Diagnostic::type_error(
                    format!("cannot use a {} value in command:", other.kind()),
                    command.span,
                ));
            }
        }
    }
    let cmd_args = wk.make_array(cmd_args);

    let input = match checked.keyword("input") {
        Some(arg) => coerce::coerce_files(wk, arg)?,
        None => wk.make_array(Vec::new()),
    };
    let output = coerce::coerce_output_files(wk, checked.keyword("output").expect("required keyword"))?;
    if wk.array_items(output).is_empty() {
        return Err(Diagnostic::value("output: must not be empty", span));
    }

    let capture = match checked.keyword("capture") {
        Some(arg) => matches!(wk.get_obj(arg.obj), Value::Bool(true)),
        None => false,
    };

    let name_id = wk.str_push(&name);
    let targets = wk.current_project().targets;
    let tgt = wk.make_obj(Value::CustomTarget(CustomTarget {
        name: name_id,
        input,
        output,
        cmd,
        cmd_is_artifact,
        args: cmd_args,
        capture,
    }));
    wk.array_push(targets, tgt);
    Ok(tgt)
}

pub(crate) fn files(wk: &mut Workspace, span: Span, pos: &[ArgVal], kws: &RawKwargs) -> EvalResult<ObjId> {
    const SIG: Signature = Signature {
        positional: &[ArgKind::Glob],
        optional: &[],
        keywords: &[],
    };
    let checked = args::check(wk, "files", span, pos, kws, &SIG)?;
    coerce::coerce_files(wk, checked.pos(0))
}

pub(crate) fn include_directories(wk: &mut Workspace, span: Span, pos: &[ArgVal], kws: &RawKwargs) -> EvalResult<ObjId> {
    const SIG: Signature = Signature {
        positional: &[ArgKind::Glob],
        optional: &[],
        keywords: &[],
    };
    let checked = args::check(wk, "include_directories", span, pos, kws, &SIG)?;
    coerce::coerce_dirs(wk, checked.pos(0))
}

pub(crate) fn dependency(wk: &mut Workspace, span: Span, pos: &[ArgVal], kws: &RawKwargs) -> EvalResult<ObjId> {
    const SIG: Signature = Signature {
        positional: &[ArgKind::Str],
        optional: &[],
        keywords: &[
            kw("required", ArgKind::Any),
            kw("version", ArgKind::Any),
            kw("fallback", ArgKind::Any),
            kw("static", ArgKind::Bool),
        ],
    };
    let checked = args::check(wk, "dependency", span, pos, kws, &SIG)?;
    let name = wk.objstr(checked.pos(0).obj).to_owned();

    // External dependency discovery (pkg-config etc.) is a collaborator
    // this tool does not embed, so lookups only succeed when a subproject
    // declared the dependency. Everything else is not-found.
    let requirement = coerce::coerce_requirement(wk, checked.keyword("required"))?;
    if requirement == Requirement::Required {
        return Err(Diagnostic::value(
            format!("dependency '{name}' not found"),
            checked.pos(0).span,
        ));
    }

    debug!("dependency '{name}' not found, continuing");
    let name_id = wk.str_push(&name);
    Ok(wk.make_obj(Value::Dependency(Dependency {
        name: name_id,
        version: crate::intern::StrId::NONE,
        found: false,
        include_directories: ObjId::NULL,
        link_with: ObjId::NULL,
    })))
}

pub(crate) fn declare_dependency(wk: &mut Workspace, span: Span, pos: &[ArgVal], kws: &RawKwargs) -> EvalResult<ObjId> {
    const SIG: Signature = Signature {
        positional: &[],
        optional: &[],
        keywords: &[
            kw("include_directories", ArgKind::Any),
            kw("link_with", ArgKind::Any),
            kw("version", ArgKind::Str),
        ],
    };
    let checked = args::check(wk, "declare_dependency", span, pos, kws, &SIG)?;

    let include_directories = match checked.keyword("include_directories") {
        Some(arg) => coerce::coerce_dirs(wk, arg)?,
        None => ObjId::NULL,
    };
    let link_with = match checked.keyword("link_with") {
        Some(arg) => link_with_array(wk, arg)?,
        None => ObjId::NULL,
    };
    let version = match checked.keyword("version") {
        Some(arg) => {
            let v = wk.objstr(arg.obj).to_owned();
            wk.str_push(&v)
        }
        None => crate::intern::StrId::NONE,
    };

    Ok(wk.make_obj(Value::Dependency(Dependency {
        name: crate::intern::StrId::NONE,
        version,
        found: true,
        include_directories,
        link_with,
    })))
}

pub(crate) fn find_program(wk: &mut Workspace, span: Span, pos: &[ArgVal], kws: &RawKwargs) -> EvalResult<ObjId> {
    const SIG: Signature = Signature {
        positional: &[ArgKind::Str],
        optional: &[],
        keywords: &[kw("required", ArgKind::Any), kw("native", ArgKind::Bool)],
    };
    let checked = args::check(wk, "find_program", span, pos, kws, &SIG)?;
    let name = wk.objstr(checked.pos(0).obj).to_owned();
    let requirement = coerce::coerce_requirement(wk, checked.keyword("required"))?;

    let found = path::find_program(&name);
    let name_id = wk.str_push(&name);
    match found {
        Some(p) => {
            let abs = path::make_absolute(&p)?;
            let full_path = wk.str_push(&abs.to_string_lossy());
            Ok(wk.make_obj(Value::ExternalProgram(ExternalProgram {
                name: name_id,
                full_path,
                found: true,
            })))
        }
        None if requirement == Requirement::Required => Err(Diagnostic::value(
            format!("program '{name}' not found"),
            checked.pos(0).span,
        )),
        None => Ok(wk.make_obj(Value::ExternalProgram(ExternalProgram {
            name: name_id,
            full_path: crate::intern::StrId::NONE,
            found: false,
        }))),
    }
}

pub(crate) fn test(wk: &mut Workspace, span: Span, pos: &[ArgVal], kws: &RawKwargs) -> EvalResult<ObjId> {
    const SIG: Signature = Signature {
        positional: &[ArgKind::Str, ArgKind::Any],
        optional: &[],
        keywords: &[
            kw("args", ArgKind::Array),
            kw("env", ArgKind::Any),
            kw("should_fail", ArgKind::Bool),
        ],
    };
    let checked = args::check(wk, "test", span, pos, kws, &SIG)?;

    let name = wk.objstr(checked.pos(0).obj).to_owned();
    let exe = coerce::coerce_executable(wk, checked.pos(1))?;
    let exe_id = match wk.get_obj(exe) {
        Value::Str(s) => *s,
        _ => unreachable!("coerce_executable yields strings"),
    };

    let test_args = match checked.keyword("args") {
        Some(arg) => {
            let items = wk.array_flatten(arg.obj);
            for item in &items {
                let kind = wk.get_obj(*item).kind();
                if !matches!(
                    kind,
                    ValueKind::String | ValueKind::File | ValueKind::Number | ValueKind::BuildTarget
                ) {
                    return Err(Diagnostic::type_error(
                        format!("cannot pass a {kind} value as a test argument"),
                        arg.span,
                    ));
                }
            }
            wk.make_array(items)
        }
        None => ObjId::NULL,
    };

    let env = match checked.keyword("env") {
        Some(arg) => coerce_env(wk, arg)?,
        None => ObjId::NULL,
    };

    let should_fail = match checked.keyword("should_fail") {
        Some(arg) => matches!(wk.get_obj(arg.obj), Value::Bool(true)),
        None => false,
    };

    let name_id = wk.str_push(&name);
    let tests = wk.current_project().tests;
    let test_obj = wk.make_obj(Value::Test(TestCase {
        name: name_id,
        exe: exe_id,
        args: test_args,
        env,
        should_fail,
    }));
    wk.array_push(tests, test_obj);
    Ok(ObjId::NULL)
}

/// Normalizes `env:` to an array of `KEY=VAL` strings. Accepts a dict of
/// string values or an array already in that form.
fn coerce_env(wk: &mut Workspace, arg: ArgVal) -> EvalResult<ObjId> {
    match wk.get_obj(arg.obj).kind() {
        ValueKind::Dict => {
            let mut entries = Vec::new();
            for (key, _, value) in wk.dict_entries(arg.obj) {
                wk.expect_kind(value, ValueKind::String, arg.span)?;
                entries.push(format!("{key}={}", wk.objstr(value)));
            }
            let items: Vec<ObjId> = entries.iter().map(|e| wk.make_str(e)).collect();
            Ok(wk.make_array(items))
        }
        ValueKind::Array => string_array(wk, arg),
        other => Err(Diagnostic::type_error(
            format!("env: takes a dict or an array of strings, got {other}"),
            arg.span,
        )),
    }
}

pub(crate) fn configure_file(wk: &mut Workspace, span: Span, pos: &[ArgVal], kws: &RawKwargs) -> EvalResult<ObjId> {
    const SIG: Signature = Signature {
        positional: &[],
        optional: &[],
        keywords: &[
            kw("input", ArgKind::Any),
            kw_required("output", ArgKind::Str),
            kw("configuration", ArgKind::Dict),
            kw("copy", ArgKind::Bool),
        ],
    };
    let checked = args::check(wk, "configure_file", span, pos, kws, &SIG)?;

    let output = checked.keyword("output").expect("required keyword");
    let out_name = wk.objstr(output.obj).to_owned();
    if !path::is_basename(&out_name) {
        return Err(Diagnostic::value(
            format!("output file '{out_name}' contains path separators"),
            output.span,
        ));
    }

    let input = checked
        .keyword("input")
        .ok_or_else(|| Diagnostic::arity("configure_file() missing keyword argument 'input'", span))?;
    let input_files = coerce::coerce_files(wk, input)?;
    let items = wk.array_items(input_files);
    if items.len() != 1 {
        return Err(Diagnostic::value("input: takes exactly one file", input.span));
    }
    let input_path = wk.file_path(items[0]).to_owned();
    let text = fs::read_to_string(&input_path)
        .map_err(|err| Diagnostic::new(DiagKind::Io, format!("cannot read '{input_path}': {err}"), input.span))?;

    let copy = matches!(
        checked.keyword("copy").map(|a| wk.get_obj(a.obj)),
        Some(Value::Bool(true))
    );
    let rendered = if copy {
        text
    } else {
        let configuration = checked.keyword("configuration").ok_or_else(|| {
            Diagnostic::arity("configure_file() missing keyword argument 'configuration'", span)
        })?;
        string::string_format(wk, &text, configuration.span, |wk, key, key_span| {
            wk.dict_get(configuration.obj, key)
                .ok_or_else(|| Diagnostic::value(format!("key '{key}' not found"), key_span))
        })?
    };

    let build_dir = wk.str(wk.current_project().build_dir).to_owned();
    path::mkdir_p(std::path::Path::new(&build_dir))?;
    let out_path = path::join(&build_dir, &out_name);
    fs::write(&out_path, rendered)
        .map_err(|err| Diagnostic::new(DiagKind::Io, format!("cannot write '{out_path}': {err}"), output.span))?;

    Ok(wk.make_file(&out_path))
}

pub(crate) fn install_noop(
    wk: &mut Workspace,
    name: &str,
    span: Span,
    pos: &[ArgVal],
    kws: &RawKwargs,
) -> EvalResult<ObjId> {
    const SIG: Signature = Signature {
        positional: &[ArgKind::Glob],
        optional: &[],
        keywords: &[
            kw("install_dir", ArgKind::Str),
            kw("install_mode", ArgKind::Any),
            kw("subdir", ArgKind::Str),
        ],
    };
    args::check(wk, name, span, pos, kws, &SIG)?;
    debug!("{name}() recorded as a no-op");
    Ok(ObjId::NULL)
}

pub(crate) fn subproject(wk: &mut Workspace, span: Span, pos: &[ArgVal], kws: &RawKwargs) -> EvalResult<ObjId> {
    const SIG: Signature = Signature {
        positional: &[ArgKind::Str],
        optional: &[],
        keywords: &[kw("required", ArgKind::Any), kw("default_options", ArgKind::Array)],
    };
    let checked = args::check(wk, "subproject", span, pos, kws, &SIG)?;
    let name = wk.objstr(checked.pos(0).obj).to_owned();
    if !path::is_basename(&name) {
        return Err(Diagnostic::value(
            format!("subproject name '{name}' contains path separators"),
            checked.pos(0).span,
        ));
    }

    // Evaluating the same subproject twice is a no-op.
    if wk.projects.iter().any(|p| p.subproject_name.as_deref() == Some(&name)) {
        return Ok(ObjId::NULL);
    }

    let src_dir = wk.source_root.join("subprojects").join(&name);
    if !src_dir.is_dir() {
        return Err(Diagnostic::value(
            format!("subproject directory '{}' does not exist", src_dir.display()),
            checked.pos(0).span,
        ));
    }
    let build_dir = wk.build_root.join("subprojects").join(&name);

    let build_file = src_dir.join("meson.build");
    let text = fs::read_to_string(&build_file).map_err(|err| {
        Diagnostic::new(
            DiagKind::Io,
            format!("cannot read '{}': {err}", build_file.display()),
            checked.pos(0).span,
        )
    })?;

    info!("entering subproject '{name}'");
    let prev = wk.cur_project;
    let idx = wk.make_project(
        Some(&name),
        &src_dir.to_string_lossy(),
        &build_dir.to_string_lossy(),
    );
    options::init_project_options(wk, idx)?;
    wk.cur_project = idx;

    let options_file = src_dir.join("meson_options.txt");
    if options_file.is_file() {
        let opts_text = fs::read_to_string(&options_file).map_err(|err| {
            Diagnostic::new(
                DiagKind::Io,
                format!("cannot read '{}': {err}", options_file.display()),
                checked.pos(0).span,
            )
        })?;
        interp::eval_source(wk, &options_file.to_string_lossy(), &opts_text)?;
    }

    interp::eval_source(wk, &build_file.to_string_lossy(), &text)?;
    wk.cur_project = prev;
    Ok(ObjId::NULL)
}

pub(crate) fn add_project_arguments(wk: &mut Workspace, span: Span, pos: &[ArgVal], kws: &RawKwargs) -> EvalResult<ObjId> {
    const SIG: Signature = Signature {
        positional: &[ArgKind::Glob],
        optional: &[],
        keywords: &[kw("language", ArgKind::Any)],
    };
    let checked = args::check(wk, "add_project_arguments", span, pos, kws, &SIG)?;
    let flat = string_array(wk, checked.pos(0))?;
    let items = wk.array_items(flat);
    let project_args = wk.current_project().args;
    wk.array_extend(project_args, &items);
    Ok(ObjId::NULL)
}

pub(crate) fn get_option(wk: &mut Workspace, span: Span, pos: &[ArgVal], kws: &RawKwargs) -> EvalResult<ObjId> {
    const SIG: Signature = Signature {
        positional: &[ArgKind::Str],
        optional: &[],
        keywords: &[],
    };
    let checked = args::check(wk, "get_option", span, pos, kws, &SIG)?;
    let name = wk.objstr(checked.pos(0).obj).to_owned();
    options::get_option(wk, &name, checked.pos(0).span)
}

pub(crate) fn option(wk: &mut Workspace, span: Span, pos: &[ArgVal], kws: &RawKwargs) -> EvalResult<ObjId> {
    const SIG: Signature = Signature {
        positional: &[ArgKind::Str],
        optional: &[],
        keywords: &[
            kw_required("type", ArgKind::Str),
            kw("value", ArgKind::Any),
            kw("choices", ArgKind::Array),
            kw("min", ArgKind::Number),
            kw("max", ArgKind::Number),
            kw("description", ArgKind::Str),
        ],
    };
    let checked = args::check(wk, "option", span, pos, kws, &SIG)?;

    let name = wk.objstr(checked.pos(0).obj).to_owned();
    let type_arg = checked.keyword("type").expect("required keyword");
    let type_name = wk.objstr(type_arg.obj).to_owned();
    let ty = OptionType::from_str(&type_name)
        .map_err(|_| Diagnostic::value(format!("unknown option type '{type_name}'"), type_arg.span))?;

    let choices = match checked.keyword("choices") {
        Some(arg) => {
            let mut out = Vec::new();
            for item in wk.array_items(arg.obj) {
                wk.expect_kind(item, ValueKind::String, arg.span)?;
                out.push(wk.objstr(item).to_owned());
            }
            out
        }
        None => Vec::new(),
    };
    let min = match checked.keyword("min") {
        Some(arg) => match wk.get_obj(arg.obj) {
            Value::Number(n) => Some(*n),
            _ => unreachable!("kind checked"),
        },
        None => None,
    };
    let max = match checked.keyword("max") {
        Some(arg) => match wk.get_obj(arg.obj) {
            Value::Number(n) => Some(*n),
            _ => unreachable!("kind checked"),
        },
        None => None,
    };

    let spec = options::OptionSpec {
        name,
        ty,
        choices,
        min,
        max,
    };
    options::declare(wk, span, &spec, checked.keyword("value"))?;
    Ok(ObjId::NULL)
}

pub(crate) fn message(wk: &mut Workspace, span: Span, pos: &[ArgVal], kws: &RawKwargs) -> EvalResult<ObjId> {
    const SIG: Signature = Signature {
        positional: &[ArgKind::Any],
        optional: &[],
        keywords: &[],
    };
    let checked = args::check(wk, "message", span, pos, kws, &SIG)?;
    println!("Message: {}", wk.obj_display(checked.pos(0).obj));
    Ok(ObjId::NULL)
}

pub(crate) fn warning(wk: &mut Workspace, span: Span, pos: &[ArgVal], kws: &RawKwargs) -> EvalResult<ObjId> {
    const SIG: Signature = Signature {
        positional: &[ArgKind::Any],
        optional: &[],
        keywords: &[],
    };
    let checked = args::check(wk, "warning", span, pos, kws, &SIG)?;
    eprintln!("WARNING: {}", wk.obj_display(checked.pos(0).obj));
    Ok(ObjId::NULL)
}

pub(crate) fn error(wk: &mut Workspace, span: Span, pos: &[ArgVal], kws: &RawKwargs) -> EvalResult<ObjId> {
    const SIG: Signature = Signature {
        positional: &[ArgKind::Any],
        optional: &[],
        keywords: &[],
    };
    let checked = args::check(wk, "error", span, pos, kws, &SIG)?;
    Err(Diagnostic::value(wk.obj_display(checked.pos(0).obj), span))
}

pub(crate) fn environment(wk: &mut Workspace, span: Span, pos: &[ArgVal], kws: &RawKwargs) -> EvalResult<ObjId> {
    const SIG: Signature = Signature {
        positional: &[],
        optional: &[ArgKind::Dict],
        keywords: &[],
    };
    let checked = args::check(wk, "environment", span, pos, kws, &SIG)?;
    let env = wk.make_dict();
    if let Some(initial) = checked.opt(0) {
        for (key, _, value) in wk.dict_entries(initial.obj) {
            wk.expect_kind(value, ValueKind::String, initial.span)?;
            wk.dict_insert(env, &key, value);
        }
    }
    Ok(env)
}

pub(crate) fn import(wk: &mut Workspace, span: Span, pos: &[ArgVal], kws: &RawKwargs) -> EvalResult<ObjId> {
    const SIG: Signature = Signature {
        positional: &[ArgKind::Str],
        optional: &[],
        keywords: &[],
    };
    let checked = args::check(wk, "import", span, pos, kws, &SIG)?;
    let name = wk.objstr(checked.pos(0).obj).to_owned();
    Err(Diagnostic::value(
        format!("module '{name}' not found"),
        checked.pos(0).span,
    ))
}

pub(crate) fn assert_fn(wk: &mut Workspace, span: Span, pos: &[ArgVal], kws: &RawKwargs) -> EvalResult<ObjId> {
    const SIG: Signature = Signature {
        positional: &[ArgKind::Bool],
        optional: &[ArgKind::Str],
        keywords: &[],
    };
    let checked = args::check(wk, "assert", span, pos, kws, &SIG)?;
    let Value::Bool(ok) = wk.get_obj(checked.pos(0).obj) else {
        unreachable!("kind checked");
    };
    if *ok {
        Ok(ObjId::NULL)
    } else {
        let msg = checked
            .opt(1)
            .map_or_else(|| "assertion failed".to_owned(), |a| wk.objstr(a.obj).to_owned());
        Err(Diagnostic::value(msg, span))
    }
}

/// Re-entry only: the call written into the setup record. Restores the
/// roots and option overrides so the regular evaluation can rerun.
pub(crate) fn setup(wk: &mut Workspace, span: Span, pos: &[ArgVal], kws: &RawKwargs) -> EvalResult<ObjId> {
    const SIG: Signature = Signature {
        positional: &[ArgKind::Str],
        optional: &[],
        keywords: &[kw_required("source", ArgKind::Str), kw("options", ArgKind::Dict)],
    };
    let checked = args::check(wk, "setup", span, pos, kws, &SIG)?;

    let build_root = wk.objstr(checked.pos(0).obj).to_owned();
    let source_arg = checked.keyword("source").expect("required keyword");
    let source_root = wk.objstr(source_arg.obj).to_owned();
    wk.build_root = std::path::PathBuf::from(build_root);
    wk.source_root = std::path::PathBuf::from(source_root);
    wk.private_dir = wk.build_root.join(crate::output::PRIVATE_DIR);

    if let Some(opts) = checked.keyword("options") {
        for (name, _, value) in wk.dict_entries(opts.obj) {
            if wk.get_obj(value).kind() == ValueKind::Dict {
                for (sub_name, _, sub_value) in wk.dict_entries(value) {
                    let raw = options::value_to_override_string(wk, sub_value);
                    wk.option_overrides.push(options::OptionOverride {
                        subproject: Some(name.clone()),
                        name: sub_name,
                        value: raw,
                        used: false,
                    });
                }
            } else {
                let raw = options::value_to_override_string(wk, value);
                wk.option_overrides.push(options::OptionOverride {
                    subproject: None,
                    name,
                    value: raw,
                    used: false,
                });
            }
        }
    }

    Ok(ObjId::NULL)
}
