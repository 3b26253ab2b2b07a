//! Coercions applied at call boundaries.
//!
//! Builtins accept loosely-typed values (strings, files, targets, nested
//! arrays) and normalize them here: executables become path strings, source
//! lists become arrays of absolute `file` values, and the `required:`
//! keyword collapses to a three-way requirement.

use crate::{
    args::ArgVal,
    diag::{Diagnostic, EvalResult, Span},
    path,
    value::{ObjId, Value},
    workspace::Workspace,
};

/// How strongly a lookup was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Requirement {
    Required,
    Auto,
    Skip,
}

/// Interprets the `required:` keyword: absent means required, a bool maps
/// directly, a feature option maps enabled→required, disabled→skip,
/// auto→auto.
pub(crate) fn coerce_requirement(wk: &Workspace, kw: Option<ArgVal>) -> EvalResult<Requirement> {
    let Some(arg) = kw else {
        return Ok(Requirement::Required);
    };
    match wk.get_obj(arg.obj) {
        Value::Bool(true) => Ok(Requirement::Required),
        Value::Bool(false) => Ok(Requirement::Auto),
        Value::FeatureOption(state) => Ok(match state {
            crate::value::FeatureState::Enabled => Requirement::Required,
            crate::value::FeatureState::Disabled => Requirement::Skip,
            crate::value::FeatureState::Auto => Requirement::Auto,
        }),
        other => Err(Diagnostic::type_error(
            format!("expected bool or feature_option, got {}", other.kind()),
            arg.span,
        )),
    }
}

/// Coerces a value into an executable path string.
///
/// Files keep their path; build targets resolve to the build-root-relative
/// artifact in executable form; external programs use their discovered
/// path.
pub(crate) fn coerce_executable(wk: &mut Workspace, val: ArgVal) -> EvalResult<ObjId> {
    let s = match wk.get_obj(val.obj) {
        Value::File(p) => wk.str(*p).to_owned(),
        Value::BuildTarget(tgt) => {
            let full = path::join(wk.str(tgt.build_dir), wk.str(tgt.build_name));
            let rel = path::relative_to(&wk.build_root.to_string_lossy(), &full);
            path::executable_form(&rel)
        }
        Value::ExternalProgram(prog) => {
            if !prog.found {
                return Err(Diagnostic::value(
                    format!("program '{}' was not found", wk.str(prog.name)),
                    val.span,
                ));
            }
            wk.str(prog.full_path).to_owned()
        }
        other => {
            return Err(Diagnostic::type_error(
                format!("unable to coerce {} into an executable", other.kind()),
                val.span,
            ));
        }
    };
    Ok(wk.make_str(&s))
}

enum FilesMode {
    /// Existing files, resolved against the project source dir.
    InputFiles,
    /// Existing directories, resolved against the project source dir.
    InputDirs,
    /// Fresh basenames, resolved against the project build dir.
    Output,
}

impl FilesMode {
    fn what(&self) -> &'static str {
        match self {
            Self::InputFiles => "file",
            Self::InputDirs => "directory",
            Self::Output => "output file",
        }
    }

    fn exists(&self, p: &str) -> bool {
        match self {
            Self::InputFiles => path::file_exists(p),
            Self::InputDirs => path::dir_exists(p),
            Self::Output => true,
        }
    }
}

/// Coerces into an array of existing input `file` values. Nested arrays
/// flatten; strings resolve against the project source dir; targets
/// contribute their artifacts.
pub(crate) fn coerce_files(wk: &mut Workspace, val: ArgVal) -> EvalResult<ObjId> {
    coerce_into_files(wk, val, &FilesMode::InputFiles)
}

/// Like [`coerce_files`] but each entry must name an existing directory.
pub(crate) fn coerce_dirs(wk: &mut Workspace, val: ArgVal) -> EvalResult<ObjId> {
    coerce_into_files(wk, val, &FilesMode::InputDirs)
}

/// Coerces into an array of output `file` values under the project build
/// dir. Only separator-free strings are accepted.
pub(crate) fn coerce_output_files(wk: &mut Workspace, val: ArgVal) -> EvalResult<ObjId> {
    coerce_into_files(wk, val, &FilesMode::Output)
}

fn coerce_into_files(wk: &mut Workspace, val: ArgVal, mode: &FilesMode) -> EvalResult<ObjId> {
    let out = wk.make_array(Vec::new());
    for item in wk.array_flatten(val.obj) {
        coerce_one(wk, item, val.span, mode, out)?;
    }
    Ok(out)
}

fn coerce_one(wk: &mut Workspace, item: ObjId, span: Span, mode: &FilesMode, out: ObjId) -> EvalResult<()> {
    match wk.get_obj(item) {
        Value::Str(s) => {
            let raw = wk.str(*s).to_owned();
            let abs = match mode {
                FilesMode::InputFiles | FilesMode::InputDirs => {
                    let cwd = wk.str(wk.current_project().cwd).to_owned();
                    if path::is_absolute_str(&raw) {
                        raw.clone()
                    } else {
                        path::join(&cwd, &raw)
                    }
                }
                FilesMode::Output => {
                    if !path::is_basename(&raw) {
                        return Err(Diagnostic::value(
                            format!("output file '{raw}' contains path separators"),
                            span,
                        ));
                    }
                    let build_dir = wk.str(wk.current_project().build_dir).to_owned();
                    path::join(&build_dir, &raw)
                }
            };
            if !mode.exists(&abs) {
                return Err(Diagnostic::value(
                    format!("{} '{abs}' does not exist", mode.what()),
                    span,
                ));
            }
            let file = wk.make_file(&abs);
            wk.array_push(out, file);
        }
        Value::File(_) => {
            if matches!(mode, FilesMode::Output) {
                return Err(Diagnostic::type_error(
                    format!("unable to coerce file into {}", mode.what()),
                    span,
                ));
            }
            wk.array_push(out, item);
        }
        Value::CustomTarget(tgt) => {
            if matches!(mode, FilesMode::Output) {
                return Err(Diagnostic::type_error(
                    format!("unable to coerce custom_target into {}", mode.what()),
                    span,
                ));
            }
            for output in wk.array_items(tgt.output) {
                wk.array_push(out, output);
            }
        }
        Value::BuildTarget(tgt) => {
            if matches!(mode, FilesMode::Output) {
                return Err(Diagnostic::type_error(
                    format!("unable to coerce build_target into {}", mode.what()),
                    span,
                ));
            }
            let artifact = path::join(wk.str(tgt.build_dir), wk.str(tgt.build_name));
            let file = wk.make_file(&artifact);
            wk.array_push(out, file);
        }
        other => {
            return Err(Diagnostic::type_error(
                format!("unable to coerce {} into {}", other.kind(), mode.what()),
                span,
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::DiagKind;

    fn harness() -> (Workspace, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut wk = Workspace::new();
        let src = dir.path().to_string_lossy().into_owned();
        let build = dir.path().join("build").to_string_lossy().into_owned();
        wk.build_root = dir.path().join("build");
        wk.make_project(None, &src, &build);
        (wk, dir)
    }

    fn arg(obj: ObjId) -> ArgVal {
        ArgVal {
            obj,
            span: Span::default(),
        }
    }

    #[test]
    fn input_strings_resolve_against_cwd_and_must_exist() {
        let (mut wk, dir) = harness();
        std::fs::write(dir.path().join("main.c"), "int main(void){}\n").unwrap();
        let s = wk.make_str("main.c");
        let arr = wk.make_array(vec![s]);
        let files = coerce_files(&mut wk, arg(arr)).unwrap();
        let items = wk.array_items(files);
        assert_eq!(items.len(), 1);
        assert!(wk.file_path(items[0]).ends_with("/main.c"));
        assert!(path::is_absolute_str(wk.file_path(items[0])));
    }

    #[test]
    fn missing_input_is_a_value_error() {
        let (mut wk, _dir) = harness();
        let s = wk.make_str("nope.c");
        let arr = wk.make_array(vec![s]);
        let err = coerce_files(&mut wk, arg(arr)).unwrap_err();
        assert_eq!(err.kind, DiagKind::Value);
        assert!(err.msg.contains("does not exist"));
    }

    #[test]
    fn nested_arrays_flatten() {
        let (mut wk, dir) = harness();
        std::fs::write(dir.path().join("a.c"), "").unwrap();
        std::fs::write(dir.path().join("b.c"), "").unwrap();
        let a = wk.make_str("a.c");
        let b = wk.make_str("b.c");
        let inner = wk.make_array(vec![b]);
        let outer = wk.make_array(vec![a, inner]);
        let files = coerce_files(&mut wk, arg(outer)).unwrap();
        assert_eq!(wk.array_items(files).len(), 2);
    }

    #[test]
    fn output_rejects_separators() {
        let (mut wk, _dir) = harness();
        let s = wk.make_str("gen/out.txt");
        let arr = wk.make_array(vec![s]);
        let err = coerce_output_files(&mut wk, arg(arr)).unwrap_err();
        assert_eq!(err.kind, DiagKind::Value);
        assert!(err.msg.contains("path separators"));
    }

    #[test]
    fn output_resolves_against_build_dir() {
        let (mut wk, _dir) = harness();
        let s = wk.make_str("out.txt");
        let arr = wk.make_array(vec![s]);
        let files = coerce_output_files(&mut wk, arg(arr)).unwrap();
        let items = wk.array_items(files);
        assert!(wk.file_path(items[0]).ends_with("/build/out.txt"));
    }

    #[test]
    fn requirement_mapping() {
        let (mut wk, _dir) = harness();
        assert_eq!(coerce_requirement(&wk, None).unwrap(), Requirement::Required);
        let t = wk.make_bool(true);
        let f = wk.make_bool(false);
        assert_eq!(coerce_requirement(&wk, Some(arg(t))).unwrap(), Requirement::Required);
        assert_eq!(coerce_requirement(&wk, Some(arg(f))).unwrap(), Requirement::Auto);
        let disabled = wk.make_obj(Value::FeatureOption(crate::value::FeatureState::Disabled));
        assert_eq!(
            coerce_requirement(&wk, Some(arg(disabled))).unwrap(),
            Requirement::Skip
        );
    }
}
