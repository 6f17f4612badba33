// tests/variables.rs

use std::path::{Path, PathBuf};

use steprunner::launch::VariableResolver;

fn resolver() -> VariableResolver {
    VariableResolver::new("/home/dev/project").unwrap()
}

#[test]
fn workspace_placeholders() {
    let r = resolver();
    assert_eq!(r.resolve("${workspaceFolder}/build.zig"), "/home/dev/project/build.zig");
    assert_eq!(r.resolve("${workspaceFolderBasename}"), "project");
    assert_eq!(r.resolve("${cwd}"), "/home/dev/project");
}

#[test]
fn cwd_can_differ_from_workspace() {
    let r = resolver().with_cwd("/tmp/elsewhere");
    assert_eq!(r.resolve("${cwd}"), "/tmp/elsewhere");
}

#[test]
fn file_placeholders_need_a_file() {
    let r = resolver();
    assert_eq!(r.resolve("${file}"), "${file}");

    let r = r.for_file("/home/dev/project/src/main.zig");
    assert_eq!(r.resolve("${file}"), "/home/dev/project/src/main.zig");
    assert_eq!(r.resolve("${fileBasename}"), "main.zig");
    assert_eq!(r.resolve("${fileBasenameNoExtension}"), "main");
    assert_eq!(r.resolve("${fileDirname}"), "/home/dev/project/src");
}

#[test]
fn unknown_placeholders_are_kept() {
    assert_eq!(resolver().resolve("a ${nope} b"), "a ${nope} b");
}

#[test]
fn env_placeholders_read_the_environment() {
    let r = resolver();
    let path = std::env::var("PATH").unwrap_or_default();
    assert_eq!(r.resolve("${env:PATH}"), path);
    assert_eq!(r.resolve("x${env:STEPRUNNER_SURELY_UNSET_VAR}y"), "xy");
}

#[test]
fn several_placeholders_in_one_string() {
    let r = resolver().for_file("/home/dev/project/src/lexer.zig");
    assert_eq!(
        r.resolve("-femit-bin=${workspaceFolder}/out/${fileBasenameNoExtension}-test"),
        "-femit-bin=/home/dev/project/out/lexer-test"
    );
}

#[test]
fn paths_and_lists_resolve_elementwise() {
    let r = resolver();
    assert_eq!(
        r.resolve_path(Path::new("${workspaceFolder}/zig-out")),
        PathBuf::from("/home/dev/project/zig-out")
    );
    assert_eq!(
        r.resolve_all(&["-Dname=${workspaceFolderBasename}".to_string(), "plain".to_string()]),
        vec!["-Dname=project".to_string(), "plain".to_string()]
    );
}

#[test]
fn config_fields_resolve_but_keep_file_placeholders() {
    let mut cfg = steprunner::config::ConfigFile::default();
    cfg.toolchain.path = "${workspaceFolder}/tools/zig".to_string();
    cfg.build.build_file = PathBuf::from("${workspaceFolder}/build.zig");
    cfg.build.step_args = vec!["--prefix=${workspaceFolder}/out".to_string()];
    cfg.test.args = vec!["${fileBasenameNoExtension}".to_string()];
    cfg.debugger.command = "${workspaceFolder}/bin/lldb".to_string();
    cfg.debugger.args = vec!["--source=${workspaceFolder}/.lldbinit".to_string()];

    let resolved = resolver().resolve_config(&cfg);

    assert_eq!(resolved.toolchain.path, "/home/dev/project/tools/zig");
    assert_eq!(resolved.build.build_file, Path::new("/home/dev/project/build.zig"));
    assert_eq!(resolved.build.step_args, vec!["--prefix=/home/dev/project/out"]);
    assert_eq!(resolved.test.args, vec!["${fileBasenameNoExtension}"]);
    assert_eq!(resolved.debugger.command, "/home/dev/project/bin/lldb");
    assert_eq!(resolved.debugger.args, vec!["--source=/home/dev/project/.lldbinit"]);
}
