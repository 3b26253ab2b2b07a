//! The setup record round trip and the binary test inventory as written
//! by a full run.

use std::fs;

use pretty_assertions::assert_eq;

use pion::{Invocation, OptionOverride, PRIVATE_DIR, SETUP_FILE, TESTS_FILE, load_tests};

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

    fn build_path(&self, tail: &str) -> std::path::PathBuf {
        self.dir.path().join("build").join(tail)
    }

    fn private_path(&self, name: &str) -> std::path::PathBuf {
        self.build_path(&format!("{PRIVATE_DIR}/{name}"))
    }
}

/// The setup record is DSL text naming the roots and effective options.
#[test]
fn setup_record_contents() {
    let tree = Tree::new();
    tree.file("meson.build", "project('p', 'c')\n");
    pion::setup_build(&tree.invocation(&["buildtype=release"])).unwrap();

    let record = fs::read_to_string(tree.private_path(SETUP_FILE)).expect("setup record missing");
    assert!(record.starts_with("setup(\n"), "{record}");
    assert!(record.contains("source: "), "{record}");
    assert!(record.contains("'buildtype': 'release'"), "{record}");
    assert!(record.contains("'warning_level': 1"), "{record}");
    assert!(record.contains("'debug': true"), "{record}");
}

/// Regenerating from the setup record reproduces the manifest byte for
/// byte, including option overrides.
#[test]
fn regenerate_reproduces_the_manifest() {
    let tree = Tree::new();
    tree.file("main.c", "int main(void) { return 0; }\n").file(
        "meson.build",
        "project('p', 'c')\ne = executable('e', 'main.c')\ntest('t', e)\n",
    );
    pion::setup_build(&tree.invocation(&["buildtype=release", "c_std=c99"])).unwrap();

    let first_ninja = fs::read(tree.build_path("build.ninja")).unwrap();
    let first_tests = fs::read(tree.private_path(TESTS_FILE)).unwrap();
    fs::remove_file(tree.build_path("build.ninja")).unwrap();

    pion::regenerate(&tree.private_path(SETUP_FILE), "pion").expect("regenerate failed");

    let second_ninja = fs::read(tree.build_path("build.ninja")).unwrap();
    let second_tests = fs::read(tree.private_path(TESTS_FILE)).unwrap();
    assert_eq!(first_ninja, second_ninja);
    assert_eq!(first_tests, second_tests);

    // The release override survived the round trip.
    let ninja = String::from_utf8(second_ninja).unwrap();
    assert!(ninja.contains("-O3"), "{ninja}");
    assert!(ninja.contains("-std=c99"), "{ninja}");
}

/// Scenario: a should_fail test serializes to flag word 1 followed by the
/// NUL-separated name, exe, and argv.
#[test]
fn inventory_wire_format_for_should_fail_test() {
    let tree = Tree::new();
    tree.file("main.c", "int main(void) { return 1; }\n").file(
        "meson.build",
        "project('p', 'c')\ne = executable('e', 'main.c')\ntest('t', e, args: ['--x', '1'], should_fail: true)\n",
    );
    pion::setup_build(&tree.invocation(&[])).unwrap();

    let bytes = fs::read(tree.private_path(TESTS_FILE)).unwrap();
    let mut expected = Vec::new();
    expected.extend_from_slice(&1u32.to_le_bytes());
    expected.extend_from_slice(&0x0000_0001u32.to_le_bytes());
    expected.extend_from_slice(b"t\0./e\0--x\x001\0\0\0");
    assert_eq!(bytes, expected);

    let tests = load_tests(&mut bytes.as_slice()).unwrap();
    assert_eq!(tests.len(), 1);
    assert_eq!(tests[0].name, "t");
    assert_eq!(tests[0].exe, "./e");
    assert_eq!(tests[0].args, ["--x", "1"]);
    assert!(tests[0].env.is_empty());
    assert!(tests[0].should_fail());
}

/// Environments flatten to KEY=VAL entries, dict and array alike, and
/// survive the round trip.
#[test]
fn inventory_env_round_trip() {
    let tree = Tree::new();
    tree.file("main.c", "int main(void) { return 0; }\n").file(
        "meson.build",
        "project('p', 'c')\n\
         e = executable('e', 'main.c')\n\
         test('dict_env', e, env: {'A': '1', 'B': 'two'})\n\
         test('list_env', e, env: ['C=3'])\n",
    );
    pion::setup_build(&tree.invocation(&[])).unwrap();

    let bytes = fs::read(tree.private_path(TESTS_FILE)).unwrap();
    let tests = load_tests(&mut bytes.as_slice()).unwrap();
    assert_eq!(tests.len(), 2);
    assert_eq!(tests[0].name, "dict_env");
    assert_eq!(tests[0].env, ["A=1", "B=two"]);
    assert_eq!(tests[1].env, ["C=3"]);
    assert!(!tests[0].should_fail());
}

/// Tests are recorded in declaration order across the whole run.
#[test]
fn inventory_preserves_declaration_order() {
    let tree = Tree::new();
    tree.file("main.c", "int main(void) { return 0; }\n").file(
        "meson.build",
        "project('p', 'c')\n\
         e = executable('e', 'main.c')\n\
         foreach n : ['one', 'two', 'three']\n\
           test(n, e)\n\
         endforeach\n",
    );
    pion::setup_build(&tree.invocation(&[])).unwrap();

    let bytes = fs::read(tree.private_path(TESTS_FILE)).unwrap();
    let tests = load_tests(&mut bytes.as_slice()).unwrap();
    let names: Vec<&str> = tests.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, ["one", "two", "three"]);
}

/// The runner executes the inventory and honors should_fail.
#[test]
fn runner_honors_should_fail() {
    let tree = Tree::new();
    tree.file(
        "meson.build",
        "project('p', 'c')\n\
         t = find_program('true')\n\
         f = find_program('false')\n\
         test('passes', t)\n\
         test('fails_as_expected', f, should_fail: true)\n",
    );
    pion::setup_build(&tree.invocation(&[])).unwrap();

    let summary = pion::run_tests(&tree.build_path("")).expect("runner failed");
    assert_eq!(summary.total, 2);
    assert_eq!(summary.failed, 0);
    assert!(summary.all_passed());
}

/// A test whose status disagrees with should_fail counts as a failure.
#[test]
fn runner_counts_unexpected_outcomes() {
    let tree = Tree::new();
    tree.file(
        "meson.build",
        "project('p', 'c')\n\
         f = find_program('false')\n\
         test('should_have_passed', f)\n",
    );
    pion::setup_build(&tree.invocation(&[])).unwrap();

    let summary = pion::run_tests(&tree.build_path("")).expect("runner failed");
    assert_eq!(summary.total, 1);
    assert_eq!(summary.failed, 1);
}
