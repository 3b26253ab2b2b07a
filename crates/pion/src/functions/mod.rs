//! Builtin functions and per-kind method tables.
//!
//! Global functions dispatch through the [`Builtin`] enum; method calls
//! dispatch on the receiver's kind to the per-type modules. Unknown names
//! are name errors pointing at the call.

mod array;
mod default;
mod dict;
mod objects;
pub(crate) mod string;

use std::str::FromStr;

use strum::EnumString;

use crate::{
    args::ArgVal,
    diag::{Diagnostic, EvalResult, Span},
    value::{ObjId, ValueKind},
    workspace::Workspace,
};

/// Keyword arguments as evaluated at the call site.
pub(crate) type RawKwargs = [(String, Span, ArgVal)];

/// Every global function the DSL exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "snake_case")]
pub(crate) enum Builtin {
    Project,
    Executable,
    StaticLibrary,
    CustomTarget,
    Files,
    IncludeDirectories,
    Dependency,
    DeclareDependency,
    FindProgram,
    Test,
    ConfigureFile,
    InstallHeaders,
    InstallMan,
    InstallSubdir,
    Subproject,
    AddProjectArguments,
    GetOption,
    Option,
    Message,
    Warning,
    Error,
    Environment,
    Import,
    Assert,
    /// Re-entry only: the single call inside a setup record.
    Setup,
}

pub(crate) fn call_builtin(
    wk: &mut Workspace,
    name: &str,
    span: Span,
    pos: &[ArgVal],
    kw: &RawKwargs,
) -> EvalResult<ObjId> {
    let not_found = || Diagnostic::name(format!("function '{name}' not found"), span);
    let builtin = Builtin::from_str(name).map_err(|_| not_found())?;
    if builtin == Builtin::Setup && !wk.in_regen {
        return Err(not_found());
    }

    match builtin {
        Builtin::Project => default::project(wk, span, pos, kw),
        Builtin::Executable => default::executable(wk, span, pos, kw),
        Builtin::StaticLibrary => default::static_library(wk, span, pos, kw),
        Builtin::CustomTarget => default::custom_target(wk, span, pos, kw),
        Builtin::Files => default::files(wk, span, pos, kw),
        Builtin::IncludeDirectories => default::include_directories(wk, span, pos, kw),
        Builtin::Dependency => default::dependency(wk, span, pos, kw),
        Builtin::DeclareDependency => default::declare_dependency(wk, span, pos, kw),
        Builtin::FindProgram => default::find_program(wk, span, pos, kw),
        Builtin::Test => default::test(wk, span, pos, kw),
        Builtin::ConfigureFile => default::configure_file(wk, span, pos, kw),
        Builtin::InstallHeaders | Builtin::InstallMan | Builtin::InstallSubdir => {
            default::install_noop(wk, name, span, pos, kw)
        }
        Builtin::Subproject => default::subproject(wk, span, pos, kw),
        Builtin::AddProjectArguments => default::add_project_arguments(wk, span, pos, kw),
        Builtin::GetOption => default::get_option(wk, span, pos, kw),
        Builtin::Option => default::option(wk, span, pos, kw),
        Builtin::Message => default::message(wk, span, pos, kw),
        Builtin::Warning => default::warning(wk, span, pos, kw),
        Builtin::Error => default::error(wk, span, pos, kw),
        Builtin::Environment => default::environment(wk, span, pos, kw),
        Builtin::Import => default::import(wk, span, pos, kw),
        Builtin::Assert => default::assert_fn(wk, span, pos, kw),
        Builtin::Setup => default::setup(wk, span, pos, kw),
    }
}

pub(crate) fn call_method(
    wk: &mut Workspace,
    recv: ArgVal,
    name: &str,
    name_span: Span,
    pos: &[ArgVal],
    kw: &RawKwargs,
) -> EvalResult<ObjId> {
    match wk.get_obj(recv.obj).kind() {
        ValueKind::String => string::call(wk, recv, name, name_span, pos, kw),
        ValueKind::Array => array::call(wk, recv, name, name_span, pos, kw),
        ValueKind::Dict => dict::call(wk, recv, name, name_span, pos, kw),
        ValueKind::Number
        | ValueKind::Bool
        | ValueKind::Dependency
        | ValueKind::ExternalProgram
        | ValueKind::FeatureOption
        | ValueKind::Compiler
        | ValueKind::Machine
        | ValueKind::Meson
        | ValueKind::BuildTarget => objects::call(wk, recv, name, name_span, pos, kw),
        other => Err(Diagnostic::type_error(
            format!("{other} values have no methods"),
            recv.span,
        )),
    }
}

/// Shared "no such method" error so every table reports the same way.
pub(crate) fn unknown_method(kind: ValueKind, name: &str, span: Span) -> Diagnostic {
    Diagnostic::name(format!("method '{name}' not found on {kind}"), span)
}
