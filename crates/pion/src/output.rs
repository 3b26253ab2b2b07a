//! The backend writer.
//!
//! Consumes a fully-evaluated workspace and produces three artifacts under
//! the build root:
//!
//! 1. `build.ninja` — the build manifest,
//! 2. `pion-private/setup.meson` — a DSL-syntax record of the setup, and
//! 3. `pion-private/tests` — the binary test inventory.
//!
//! Everything renders into memory first and is persisted only when all
//! three artifacts rendered cleanly, so a failing run never rewrites a
//! prior artifact. Output is deterministic: projects, targets, tests, and
//! dict entries are visited in declaration/insertion order.

use std::{fmt::Write as _, fs};

use tracing::info;

use crate::{
    diag::{Diagnostic, EvalResult},
    options, path,
    serial::{self, TEST_FLAG_SHOULD_FAIL, TestRecord},
    value::{ObjId, TargetKind, Value},
    workspace::{Project, Workspace},
};

/// The single canonical spelling of the private directory.
pub const PRIVATE_DIR: &str = "pion-private";
/// Setup record filename inside [`PRIVATE_DIR`].
pub const SETUP_FILE: &str = "setup.meson";
/// Test inventory filename inside [`PRIVATE_DIR`].
pub const TESTS_FILE: &str = "tests";

/// Renders and writes all backend artifacts.
pub fn write_all(wk: &Workspace) -> EvalResult<()> {
    let ninja = render_ninja(wk)?;
    let setup = render_setup(wk);
    let tests = render_tests(wk)?;

    path::mkdir_p(&wk.private_dir)?;
    fs::write(wk.build_root.join("build.ninja"), ninja)?;
    fs::write(wk.private_dir.join(SETUP_FILE), setup)?;
    fs::write(wk.private_dir.join(TESTS_FILE), tests)?;
    Ok(())
}

/// Converts a value to the string the manifest wants: strings and files
/// verbatim, numbers in decimal, build targets as their build-root-relative
/// artifact in executable form.
fn strobj(wk: &Workspace, id: ObjId) -> EvalResult<String> {
    match wk.get_obj(id) {
        Value::Str(s) | Value::File(s) => Ok(wk.str(*s).to_owned()),
        Value::Number(n) => Ok(n.to_string()),
        Value::BuildTarget(tgt) => {
            let full = path::join(wk.str(tgt.build_dir), wk.str(tgt.build_name));
            let rel = path::relative_to(&build_root(wk), &full);
            Ok(path::executable_form(&rel))
        }
        other => Err(Diagnostic::internal(format!(
            "cannot convert a {} value to a manifest string",
            other.kind()
        ))),
    }
}

fn build_root(wk: &Workspace) -> String {
    wk.build_root.to_string_lossy().into_owned()
}

/// Shell-quotes one word for the manifest: a word containing a space is
/// wrapped in single quotes with each space preceded by `$`; an embedded
/// double quote also forces quoting.
fn quote_word(s: &str) -> String {
    if s.contains(' ') || s.contains('"') {
        format!("'{}'", s.replace(' ', "$ "))
    } else {
        s.to_owned()
    }
}

/// Flattens an array into quoted, space-separated manifest words.
fn concat_strings(wk: &Workspace, arr: ObjId, out: &mut Vec<String>) -> EvalResult<()> {
    for item in wk.array_flatten(arr) {
        let s = strobj(wk, item)?;
        out.push(quote_word(&s));
    }
    Ok(())
}

fn target_artifact_rel(wk: &Workspace, tgt: &crate::value::BuildTarget) -> String {
    let full = path::join(wk.str(tgt.build_dir), wk.str(tgt.build_name));
    path::relative_to(&build_root(wk), &full)
}

// ----- build.ninja -----

fn render_ninja(wk: &Workspace) -> EvalResult<String> {
    let mut out = String::new();
    write_header(wk, &mut out)?;
    for proj in &wk.projects {
        for tgt in wk.array_items(proj.targets) {
            match wk.get_obj(tgt) {
                Value::BuildTarget(_) => write_build_target(wk, proj, tgt, &mut out)?,
                Value::CustomTarget(_) => write_custom_target(wk, tgt, &mut out)?,
                other => {
                    return Err(Diagnostic::internal(format!(
                        "invalid target of kind {}",
                        other.kind()
                    )));
                }
            }
        }
    }
    Ok(out)
}

fn write_header(wk: &Workspace, out: &mut String) -> EvalResult<()> {
    let main = wk.projects.first().ok_or_else(|| Diagnostic::internal("no projects"))?;
    let project_name = wk.str(main.cfg.name);

    let _ = write!(
        out,
        "# This is the build file for project \"{project_name}\"\n\
         # It is autogenerated by the pion build system.\n\
         \n\
         ninja_required_version = 1.7.1\n\
         \n\
         # Rules for compiling.\n\
         \n"
    );

    for (lang, _, comp_id) in wk.dict_entries(main.compilers) {
        let Value::Compiler(comp) = wk.get_obj(comp_id) else {
            return Err(Diagnostic::internal("compilers dict holds a non-compiler"));
        };
        let _ = write!(
            out,
            "rule {lang}_COMPILER\n\
             \x20command = {} {}\n\
             \x20deps = {}\n\
             \x20depfile = {}\n\
             \x20description = {}\n\
             \n",
            wk.str(comp.name),
            comp.kind.command(),
            comp.kind.deps(),
            comp.kind.depfile(),
            comp.kind.description(),
        );
    }

    let linker = wk
        .dict_get(main.compilers, "c")
        .and_then(|id| match wk.get_obj(id) {
            Value::Compiler(comp) => Some(wk.str(comp.name).to_owned()),
            _ => None,
        })
        .unwrap_or_else(|| "cc".to_owned());

    let sources = wk
        .sources
        .iter()
        .map(|src| src.name.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    let _ = write!(
        out,
        "# Rules for linking.\n\
         \n\
         rule STATIC_LINKER\n\
         \x20command = rm -f $out && ar $LINK_ARGS $out $in\n\
         \x20description = Linking static target $out\n\
         \n\
         rule c_LINKER\n\
         \x20command = {linker} $ARGS -o $out $in $LINK_ARGS\n\
         \x20description = Linking target $out\n\
         \n\
         # Other rules\n\
         \n\
         rule CUSTOM_COMMAND\n\
         \x20command = $COMMAND\n\
         \x20description = $DESCRIPTION\n\
         \x20restat = 1\n\
         \n\
         rule REGENERATE_BUILD\n\
         \x20command = {argv0} build -r -c {private}/{setup}\n\
         \x20description = Regenerating build files.\n\
         \x20generator = 1\n\
         \n\
         build build.ninja: REGENERATE_BUILD {sources}\n\
         \x20pool = console\n\
         \n\
         # targets\n\
         \n",
        argv0 = wk.argv0,
        private = PRIVATE_DIR,
        setup = SETUP_FILE,
    );
    Ok(())
}

fn write_build_target(wk: &Workspace, proj: &Project, tgt_id: ObjId, out: &mut String) -> EvalResult<()> {
    let Value::BuildTarget(tgt) = wk.get_obj(tgt_id) else {
        unreachable!("caller checked the kind");
    };
    info!("writing rules for target '{}'", wk.str(tgt.build_name));

    let tgt_path = target_artifact_rel(wk, tgt);
    let parts_dir = path::add_suffix(&tgt_path, ".p");

    let (rule, mut link_args) = match tgt.kind {
        TargetKind::Executable => (
            "c_LINKER",
            vec![
                "-Wl,--as-needed".to_owned(),
                "-Wl,--no-undefined".to_owned(),
                "-Wl,--start-group".to_owned(),
            ],
        ),
        TargetKind::StaticLibrary => ("STATIC_LINKER", vec!["csrD".to_owned()]),
    };

    // Argument composition, in the documented order: std, optimization,
    // warnings, project cwd include, target includes, dependency includes,
    // header dirs, project default args, target args.
    let mut args: Vec<String> = Vec::new();
    for flag in [
        options::std_flag(wk, proj)?,
        options::optimization_flag(wk, proj)?,
        options::warning_flag(wk, proj)?.to_owned(),
    ] {
        // Flags in the table are multi-word; split so each word stays a
        // separate manifest token.
        args.extend(flag.split(' ').filter(|p| !p.is_empty()).map(str::to_owned));
    }
    args.push(format!("-I{}", wk.str(proj.cwd)));

    if tgt.include_dirs.is_some() {
        for inc in wk.array_flatten(tgt.include_dirs) {
            args.push(format!("-I{}", wk.file_path(inc)));
        }
    }

    let mut implicit_deps: Vec<String> = Vec::new();
    let mut order_deps: Vec<String> = Vec::new();

    if tgt.deps.is_some() {
        for dep_id in wk.array_items(tgt.deps) {
            let Value::Dependency(dep) = wk.get_obj(dep_id) else {
                return Err(Diagnostic::internal("dependencies array holds a non-dependency"));
            };
            if dep.include_directories.is_some() {
                for inc in wk.array_flatten(dep.include_directories) {
                    args.push(format!("-I{}", wk.file_path(inc)));
                }
            }
        }
    }

    // Headers among the sources: include their directory and require them
    // order-only before compiling.
    for src in wk.array_items(tgt.src) {
        let src_path = wk.file_path(src);
        if src_path.ends_with(".h") {
            let rel = path::relative_to(&build_root(wk), src_path);
            args.push(format!("-I{}", path::dirname(&rel)));
            order_deps.push(rel);
        }
    }

    // Internal libraries: link args, implicit deps, and their headers.
    if tgt.deps.is_some() {
        for dep_id in wk.array_items(tgt.deps) {
            process_dep_links(wk, tgt, dep_id, &mut args, &mut link_args, &mut implicit_deps)?;
        }
    }
    if tgt.link_with.is_some() {
        for linked in wk.array_items(tgt.link_with) {
            process_link_with(wk, tgt, linked, &mut args, &mut link_args, &mut implicit_deps)?;
        }
    }

    concat_strings(wk, proj.args, &mut args)?;
    if tgt.c_args.is_some() {
        concat_strings(wk, tgt.c_args, &mut args)?;
    }

    let args_str = args.join(" ");
    let order_str = order_deps.join(" ");

    // One compile edge per non-header source; object paths mirror the
    // source tree under `<target>.p/`.
    let mut objects: Vec<String> = Vec::new();
    for src in wk.array_items(tgt.src) {
        let src_abs = wk.file_path(src);
        if src_abs.ends_with(".h") {
            continue;
        }
        let src_rel = path::relative_to(&build_root(wk), src_abs);

        let base = if path::is_subpath(wk.str(tgt.build_dir), src_abs) {
            wk.str(tgt.build_dir).to_owned()
        } else if path::is_subpath(wk.str(tgt.cwd), src_abs) {
            wk.str(tgt.cwd).to_owned()
        } else {
            wk.source_root.to_string_lossy().into_owned()
        };
        let rel = path::relative_to(&base, src_abs);
        let obj = path::add_suffix(&path::join(&parts_dir, &rel), ".o");

        let _ = write!(
            out,
            "build {obj}: c_COMPILER {src_rel}{order}\n\
             \x20DEPFILE = {obj}.d\n\
             \x20ARGS = {args_str}\n\
             \n",
            order = if order_str.is_empty() {
                String::new()
            } else {
                format!(" || {order_str}")
            },
        );
        objects.push(obj);
    }

    if tgt.kind == TargetKind::Executable {
        link_args.push("-Wl,--end-group".to_owned());
    }

    let _ = write!(
        out,
        "build {tgt_path}: {rule} {objects}{implicit}{order}\n\
         \x20LINK_ARGS = {link_args}\n\
         \n",
        objects = objects.join(" "),
        implicit = if implicit_deps.is_empty() {
            String::new()
        } else {
            format!(" | {}", implicit_deps.join(" "))
        },
        order = if order_str.is_empty() {
            String::new()
        } else {
            format!(" || {order_str}")
        },
        link_args = link_args.join(" "),
    );
    Ok(())
}

/// One `link_with:` entry: an internal target contributes its artifact and
/// include dir and recurses into its own dependencies; a string is a raw
/// linker argument.
fn process_link_with(
    wk: &Workspace,
    tgt: &crate::value::BuildTarget,
    linked: ObjId,
    args: &mut Vec<String>,
    link_args: &mut Vec<String>,
    implicit_deps: &mut Vec<String>,
) -> EvalResult<()> {
    match wk.get_obj(linked) {
        Value::BuildTarget(lib) => {
            let lib_path = target_artifact_rel(wk, lib);
            if tgt.kind == TargetKind::Executable {
                implicit_deps.push(lib_path.clone());
                link_args.push(lib_path);
            }
            let lib_dir = path::relative_to(&build_root(wk), wk.str(lib.build_dir));
            args.push(format!("-I{lib_dir}"));
            if lib.deps.is_some() {
                for dep_id in wk.array_items(lib.deps) {
                    process_dep_links(wk, tgt, dep_id, args, link_args, implicit_deps)?;
                }
            }
            Ok(())
        }
        Value::Str(s) => {
            if tgt.kind == TargetKind::Executable {
                link_args.push(wk.str(*s).to_owned());
            }
            Ok(())
        }
        other => Err(Diagnostic::internal(format!(
            "invalid kind {} in link_with",
            other.kind()
        ))),
    }
}

/// A dependency's `link_with` entries feed the same composition as direct
/// `link_with:`.
fn process_dep_links(
    wk: &Workspace,
    tgt: &crate::value::BuildTarget,
    dep_id: ObjId,
    args: &mut Vec<String>,
    link_args: &mut Vec<String>,
    implicit_deps: &mut Vec<String>,
) -> EvalResult<()> {
    let Value::Dependency(dep) = wk.get_obj(dep_id) else {
        return Err(Diagnostic::internal("dependencies array holds a non-dependency"));
    };
    if dep.link_with.is_some() {
        for linked in wk.array_items(dep.link_with) {
            process_link_with(wk, tgt, linked, args, link_args, implicit_deps)?;
        }
    }
    Ok(())
}

fn write_custom_target(wk: &Workspace, tgt_id: ObjId, out: &mut String) -> EvalResult<()> {
    let Value::CustomTarget(tgt) = wk.get_obj(tgt_id) else {
        unreachable!("caller checked the kind");
    };
    info!("writing rules for custom target '{}'", wk.str(tgt.name));

    let mut inputs: Vec<String> = Vec::new();
    concat_strings(wk, tgt.input, &mut inputs)?;

    let mut outputs: Vec<String> = Vec::new();
    for output in wk.array_items(tgt.output) {
        let rel = path::relative_to(&build_root(wk), wk.file_path(output));
        outputs.push(quote_word(&rel));
    }

    let cmd = strobj(wk, tgt.cmd)?;
    let mut cmdline: Vec<String> = vec![quote_word(&cmd)];
    concat_strings(wk, tgt.args, &mut cmdline)?;
    let cmdline = cmdline.join(" ");

    let command = if tgt.capture {
        let first_out = wk
            .array_items(tgt.output)
            .first()
            .map(|o| path::relative_to(&build_root(wk), wk.file_path(*o)))
            .ok_or_else(|| Diagnostic::internal("custom target with no outputs"))?;
        format!("{} internal exe -c {first_out} -- {cmdline}", wk.argv0)
    } else {
        cmdline.clone()
    };

    let _ = write!(
        out,
        "build {outputs}: CUSTOM_COMMAND {inputs}{implicit}\n\
         \x20COMMAND = {command}\n\
         \x20DESCRIPTION = {cmdline}{captured}\n\
         \n",
        outputs = outputs.join(" "),
        inputs = inputs.join(" "),
        implicit = if tgt.cmd_is_artifact {
            format!(" | {}", quote_word(&cmd))
        } else {
            String::new()
        },
        captured = if tgt.capture { " (captured)" } else { "" },
    );
    Ok(())
}

// ----- setup record -----

fn render_setup(wk: &Workspace) -> String {
    let mut options = String::from("{");
    let mut first = true;
    let main = &wk.projects[0];
    for (name, _, desc) in wk.dict_entries(main.opts) {
        if !first {
            options.push_str(", ");
        }
        first = false;
        let _ = write!(options, "'{name}': {}", wk.obj_to_s(desc));
    }
    for proj in &wk.projects[1..] {
        let Some(sub_name) = &proj.subproject_name else { continue };
        if !first {
            options.push_str(", ");
        }
        first = false;
        let _ = write!(options, "'{sub_name}': {{");
        let mut sub_first = true;
        for (name, _, desc) in wk.dict_entries(proj.opts) {
            if !sub_first {
                options.push_str(", ");
            }
            sub_first = false;
            let _ = write!(options, "'{name}': {}", wk.obj_to_s(desc));
        }
        options.push('}');
    }
    options.push('}');

    format!(
        "setup(\n\t'{}',\n\tsource: '{}',\n\toptions: {options}\n)\n",
        build_root(wk),
        wk.source_root.to_string_lossy(),
    )
}

// ----- test inventory -----

fn render_tests(wk: &Workspace) -> EvalResult<Vec<u8>> {
    let mut records = Vec::new();
    for proj in &wk.projects {
        for test_id in wk.array_items(proj.tests) {
            let Value::Test(test) = wk.get_obj(test_id) else {
                return Err(Diagnostic::internal("tests array holds a non-test"));
            };
            let mut args = Vec::new();
            if test.args.is_some() {
                for arg in wk.array_flatten(test.args) {
                    args.push(strobj(wk, arg)?);
                }
            }
            let mut env = Vec::new();
            if test.env.is_some() {
                for entry in wk.array_flatten(test.env) {
                    env.push(strobj(wk, entry)?);
                }
            }
            records.push(TestRecord {
                flags: if test.should_fail { TEST_FLAG_SHOULD_FAIL } else { 0 },
                name: wk.str(test.name).to_owned(),
                exe: wk.str(test.exe).to_owned(),
                args,
                env,
            });
        }
    }

    let mut bytes = Vec::new();
    serial::write_tests(&mut bytes, &records)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoting_rules() {
        assert_eq!(quote_word("plain"), "plain");
        assert_eq!(quote_word("has space"), "'has$ space'");
        assert_eq!(quote_word("two  spaces"), "'two$ $ spaces'");
        assert_eq!(quote_word("say\"hi\""), "'say\"hi\"'");
    }
}
