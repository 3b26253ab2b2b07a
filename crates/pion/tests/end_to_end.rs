//! End-to-end scenarios: evaluate a real source tree from disk and check
//! the bytes the backend writes.

use std::fs;

use pretty_assertions::assert_eq;

use pion::{DiagKind, Invocation, OptionOverride, Workspace};

/// A scratch source tree with a `build/` directory inside it.
struct Tree {
    dir: tempfile::TempDir,
}

impl Tree {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("tempdir"),
        }
    }

    fn file(&self, name: &str, contents: &str) -> &Self {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("mkdir");
        }
        fs::write(path, contents).expect("write");
        self
    }

    fn invocation(&self, defines: &[&str]) -> Invocation {
        Invocation {
            source_root: self.dir.path().to_path_buf(),
            build_dir: self.dir.path().join("build"),
            argv0: "pion".to_owned(),
            overrides: defines
                .iter()
                .map(|d| OptionOverride::parse(d).expect("valid override"))
                .collect(),
        }
    }

    fn setup(&self, defines: &[&str]) -> Workspace {
        pion::setup_build(&self.invocation(defines)).expect("setup failed")
    }

    fn ninja(&self) -> String {
        fs::read_to_string(self.dir.path().join("build/build.ninja")).expect("build.ninja missing")
    }

    fn build_path(&self, tail: &str) -> std::path::PathBuf {
        self.dir.path().join("build").join(tail)
    }
}

fn count_matches(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}

/// Scenario: one executable with one source produces exactly one compile
/// edge and one link edge.
#[test]
fn single_executable_manifest_shape() {
    let tree = Tree::new();
    tree.file("main.c", "int main(void) { return 0; }\n")
        .file("meson.build", "project('p', 'c')\nexecutable('e', 'main.c')\n");
    tree.setup(&[]);

    let ninja = tree.ninja();
    assert_eq!(count_matches(&ninja, ": c_COMPILER "), 1, "{ninja}");
    assert_eq!(count_matches(&ninja, ": c_LINKER "), 1, "{ninja}");
    assert!(ninja.contains("build e.p/main.c.o: c_COMPILER ../main.c"), "{ninja}");
    assert!(ninja.contains("build e: c_LINKER e.p/main.c.o"), "{ninja}");
    assert!(ninja.contains("ninja_required_version = 1.7.1"));
    assert!(ninja.contains("rule c_COMPILER"));
    assert!(ninja.contains("deps = gcc"));
    assert!(ninja.contains("depfile = $out.d"));
}

/// The regenerate edge lists every evaluated source and runs in the
/// console pool.
#[test]
fn regenerate_edge_lists_sources() {
    let tree = Tree::new();
    tree.file("main.c", "int main(void) { return 0; }\n")
        .file("meson.build", "project('p', 'c')\nexecutable('e', 'main.c')\n");
    tree.setup(&[]);

    let ninja = tree.ninja();
    let regen_line = ninja
        .lines()
        .find(|l| l.starts_with("build build.ninja: REGENERATE_BUILD"))
        .expect("regenerate edge missing");
    assert!(regen_line.contains("meson.build"));
    assert!(ninja.contains("rule REGENERATE_BUILD"));
    assert!(ninja.contains("command = pion build -r -c pion-private/setup.meson"));
    assert!(ninja.contains(" pool = console"));
}

/// Scenario: declared combo option readable through get_option(); a
/// non-choice override fails the run with a value error.
#[test]
fn combo_option_declaration_and_override() {
    let tree = Tree::new();
    tree.file("meson_options.txt", "option('x', type: 'combo', choices: ['a', 'b'], value: 'a')\n")
        .file(
            "meson.build",
            "project('p', 'c')\nassert(get_option('x') == 'a', 'default should be a')\n",
        );
    pion::evaluate(&tree.invocation(&[])).expect("default evaluation failed");

    let err = pion::evaluate(&tree.invocation(&["x=c"])).unwrap_err();
    assert_eq!(err.kind, DiagKind::Value);

    let tree2 = Tree::new();
    tree2
        .file("meson_options.txt", "option('x', type: 'combo', choices: ['a', 'b'], value: 'a')\n")
        .file(
            "meson.build",
            "project('p', 'c')\nassert(get_option('x') == 'b', 'override should win')\n",
        );
    pion::evaluate(&tree2.invocation(&["x=b"])).expect("override evaluation failed");
}

/// Scenario: buildtype, warning level, and c_std land at the front of
/// every compile edge's ARGS in the documented order.
#[test]
fn compile_args_prefix_from_options() {
    let tree = Tree::new();
    tree.file("main.c", "int main(void) { return 0; }\n")
        .file("meson.build", "project('p', 'c')\nexecutable('e', 'main.c')\n");
    tree.setup(&["buildtype=debugoptimized", "warning_level=2", "c_std=c11"]);

    let ninja = tree.ninja();
    let args_line = ninja
        .lines()
        .find(|l| l.trim_start().starts_with("ARGS = "))
        .expect("no ARGS line");
    let args = args_line.trim_start().strip_prefix("ARGS = ").unwrap();
    assert!(
        args.starts_with("-std=c11 -g -Og -Wall -Wextra -I"),
        "unexpected ARGS prefix: {args}"
    );
}

/// Scenario: a captured custom target wraps its command with the tool's
/// own capture runner.
#[test]
fn captured_custom_target_command() {
    let tree = Tree::new();
    tree.file(
        "meson.build",
        "project('p', 'c')\ncustom_target('t', output: 'out.txt', capture: true, command: ['echo', 'hi'])\n",
    );
    tree.setup(&[]);

    let ninja = tree.ninja();
    assert!(ninja.contains("build out.txt: CUSTOM_COMMAND"), "{ninja}");
    assert!(
        ninja.contains(" COMMAND = pion internal exe -c out.txt -- echo hi"),
        "{ninja}"
    );
    assert!(ninja.contains("(captured)"), "{ninja}");
    assert!(ninja.contains("rule CUSTOM_COMMAND"));
}

/// Static libraries link through STATIC_LINKER with the archiver argument
/// string, and executables group their link inputs.
#[test]
fn library_and_link_composition() {
    let tree = Tree::new();
    tree.file("lib.c", "int answer(void) { return 42; }\n")
        .file("main.c", "int main(void) { return 0; }\n")
        .file(
            "meson.build",
            "project('p', 'c')\nl = static_library('util', 'lib.c')\nexecutable('e', 'main.c', link_with: l)\n",
        );
    tree.setup(&[]);

    let ninja = tree.ninja();
    assert!(ninja.contains("build libutil.a: STATIC_LINKER "), "{ninja}");
    assert!(ninja.contains(" LINK_ARGS = csrD"), "{ninja}");

    let link_line = ninja
        .lines()
        .find(|l| l.starts_with("build e: c_LINKER"))
        .expect("no executable link edge");
    assert!(link_line.contains("| libutil.a"), "missing implicit dep: {link_line}");

    let exe_link_args = ninja
        .lines()
        .skip_while(|l| !l.starts_with("build e: c_LINKER"))
        .find(|l| l.trim_start().starts_with("LINK_ARGS"))
        .expect("no LINK_ARGS for executable");
    assert!(exe_link_args.contains("-Wl,--as-needed -Wl,--no-undefined -Wl,--start-group"));
    assert!(exe_link_args.contains("libutil.a"));
    assert!(exe_link_args.trim_end().ends_with("-Wl,--end-group"));
}

/// Header sources are not compiled; they contribute include dirs and
/// order-only deps instead.
#[test]
fn header_sources_become_order_only_deps() {
    let tree = Tree::new();
    tree.file("main.c", "int main(void) { return 0; }\n")
        .file("util.h", "#pragma once\n")
        .file("meson.build", "project('p', 'c')\nexecutable('e', 'main.c', 'util.h')\n");
    tree.setup(&[]);

    let ninja = tree.ninja();
    assert_eq!(count_matches(&ninja, ": c_COMPILER "), 1, "headers must not compile");
    let compile_line = ninja
        .lines()
        .find(|l| l.contains(": c_COMPILER "))
        .expect("no compile edge");
    assert!(compile_line.contains("|| ../util.h"), "{compile_line}");
    let args_line = ninja
        .lines()
        .find(|l| l.trim_start().starts_with("ARGS = "))
        .expect("no ARGS line");
    assert!(args_line.contains("-I.."), "{args_line}");
}

/// Dependencies from declare_dependency() contribute include dirs to
/// compile args and their link_with to the link line.
#[test]
fn declared_dependency_flows_into_target() {
    let tree = Tree::new();
    tree.file("inc/api.h", "#pragma once\n")
        .file("lib.c", "int x;\n")
        .file("main.c", "int main(void) { return 0; }\n")
        .file(
            "meson.build",
            "project('p', 'c')\n\
             l = static_library('util', 'lib.c')\n\
             d = declare_dependency(include_directories: 'inc', link_with: l)\n\
             executable('e', 'main.c', dependencies: d)\n\
             assert(d.found(), 'declared deps are always found')\n",
        );
    tree.setup(&[]);

    let ninja = tree.ninja();
    let main_edge = ninja
        .split("\n\n")
        .find(|block| block.contains("e.p/main.c.o: c_COMPILER"))
        .expect("no compile edge for main.c");
    assert!(main_edge.contains("/inc"), "{main_edge}");
    let link_line = ninja
        .lines()
        .find(|l| l.starts_with("build e: c_LINKER"))
        .expect("no link edge");
    assert!(link_line.contains("libutil.a"), "{link_line}");
}

/// A subproject's targets land in the same manifest under its build
/// subdirectory.
#[test]
fn subproject_targets_are_emitted() {
    let tree = Tree::new();
    tree.file("main.c", "int main(void) { return 0; }\n")
        .file("subprojects/sub/sub.c", "int sub(void) { return 1; }\n")
        .file("subprojects/sub/meson.build", "project('sub', 'c')\nstatic_library('sub', 'sub.c')\n")
        .file("meson.build", "project('p', 'c')\nsubproject('sub')\nexecutable('e', 'main.c')\n");
    tree.setup(&[]);

    let ninja = tree.ninja();
    assert!(ninja.contains("build subprojects/sub/libsub.a: STATIC_LINKER"), "{ninja}");
}

/// Custom-target outputs may feed another target's inputs.
#[test]
fn custom_target_output_as_source() {
    let tree = Tree::new();
    tree.file(
        "meson.build",
        "project('p', 'c')\n\
         gen = custom_target('gen', output: 'gen.txt', capture: true, command: ['echo', 'x'])\n\
         custom_target('use', input: gen, output: 'final.txt', command: ['cp', 'gen.txt', 'final.txt'])\n",
    );
    tree.setup(&[]);

    let ninja = tree.ninja();
    assert!(ninja.contains("build final.txt: CUSTOM_COMMAND"), "{ninja}");
    let use_line = ninja
        .lines()
        .find(|l| l.starts_with("build final.txt:"))
        .expect("no edge for final.txt");
    assert!(use_line.contains("gen.txt"), "{use_line}");
}

/// Configured files render @key@ substitutions from the configuration
/// dict into the build directory.
#[test]
fn configure_file_substitutes_keys() {
    let tree = Tree::new();
    tree.file("version.h.in", "#define VERSION \"@version@\"\n#define PATCH @patch@\n")
        .file(
            "meson.build",
            "project('p', 'c')\n\
             configure_file(input: 'version.h.in', output: 'version.h', configuration: {'version': '1.2', 'patch': 7})\n",
        );
    tree.setup(&[]);

    let rendered = fs::read_to_string(tree.build_path("version.h")).expect("version.h missing");
    assert_eq!(rendered, "#define VERSION \"1.2\"\n#define PATCH 7\n");
}

/// A failing run leaves no manifest behind.
#[test]
fn failed_run_writes_no_artifacts() {
    let tree = Tree::new();
    tree.file("meson.build", "project('p', 'c')\nerror('deliberate failure')\n");
    let err = pion::setup_build(&tree.invocation(&[])).unwrap_err();
    assert_eq!(err.kind, DiagKind::Value);
    assert!(!tree.build_path("build.ninja").exists());
    assert!(!tree.build_path(&format!("{}/{}", pion::PRIVATE_DIR, pion::SETUP_FILE)).exists());
}

/// Diagnostics carry file, line, column, and a caret into the message.
#[test]
fn diagnostics_point_at_the_source() {
    let tree = Tree::new();
    tree.file("meson.build", "project('p', 'c')\nx = nope\n");
    let err = pion::evaluate(&tree.invocation(&[])).unwrap_err();
    assert_eq!(err.kind, DiagKind::Name);
    let message = err.to_string();
    assert!(message.contains("meson.build:2:5: error:"), "{message}");
    assert!(message.contains("x = nope"), "{message}");
    assert!(message.lines().last().unwrap().contains('^'), "{message}");
}

/// An unknown -D override fails after evaluation.
#[test]
fn unknown_override_is_rejected() {
    let tree = Tree::new();
    tree.file("meson.build", "project('p', 'c')\n");
    let err = pion::evaluate(&tree.invocation(&["nosuch=1"])).unwrap_err();
    assert_eq!(err.kind, DiagKind::Value);
    assert!(err.to_string().contains("nosuch"));
}

/// The manifest is a deterministic function of the workspace: re-running
/// the same setup produces byte-identical output.
#[test]
fn manifest_bytes_are_deterministic() {
    let tree = Tree::new();
    tree.file("main.c", "int main(void) { return 0; }\n")
        .file("lib.c", "int x;\n")
        .file(
            "meson.build",
            "project('p', 'c')\n\
             l = static_library('util', 'lib.c')\n\
             e = executable('e', 'main.c', link_with: l)\n\
             test('t', e, args: ['--x'])\n",
        );
    tree.setup(&[]);
    let first = fs::read(tree.build_path("build.ninja")).unwrap();
    tree.setup(&[]);
    let second = fs::read(tree.build_path("build.ninja")).unwrap();
    assert_eq!(first, second);
}

/// Shell quoting in the manifest: spaces force single quotes with
/// `$`-escaped spaces.
#[test]
fn quoted_arguments_in_manifest() {
    let tree = Tree::new();
    tree.file("main.c", "int main(void) { return 0; }\n")
        .file(
            "meson.build",
            "project('p', 'c')\nexecutable('e', 'main.c', c_args: ['-DGREETING=hello world'])\n",
        );
    tree.setup(&[]);
    let ninja = tree.ninja();
    assert!(ninja.contains("'-DGREETING=hello$ world'"), "{ninja}");
}
