// tests/escape.rs

use proptest::prelude::*;
use steprunner::exec::{command_line, escape_arg};

#[test]
fn plain_arguments_pass_through() {
    assert_eq!(escape_arg("build"), "build");
    assert_eq!(escape_arg("--build-file"), "--build-file");
    assert_eq!(escape_arg("-femit-bin=/tmp/out"), "-femit-bin=/tmp/out");
}

#[test]
fn whitespace_is_wrapped_in_double_quotes() {
    assert_eq!(escape_arg("my file.zig"), "\"my file.zig\"");
    assert_eq!(escape_arg("a\tb"), "\"a\tb\"");
}

#[test]
fn escaped_spaces_are_unescaped_when_quoting() {
    assert_eq!(escape_arg("dir\\ one/my file"), "\"dir one/my file\"");
}

#[test]
fn escaped_spaces_alone_are_quoted_as_plain_spaces() {
    assert_eq!(escape_arg("dir\\ one"), "\"dir one\"");
}

#[test]
fn shell_metacharacters_are_quoted() {
    assert_eq!(escape_arg("foo(bar)"), "\"foo(bar)\"");
    assert_eq!(escape_arg("a;b"), "\"a;b\"");
    assert_eq!(escape_arg("*.zig"), "\"*.zig\"");
    assert_eq!(escape_arg("~/x"), "\"~/x\"");
}

#[test]
fn expansion_characters_are_escaped_inside_quotes() {
    assert_eq!(escape_arg("a$HOME"), "\"a\\$HOME\"");
    assert_eq!(escape_arg("C:\\x"), "\"C:\\\\x\"");
    assert_eq!(escape_arg("a`b"), "\"a\\`b\"");
}

#[test]
fn already_quoted_arguments_are_untouched() {
    assert_eq!(escape_arg("\"a b\""), "\"a b\"");
    assert_eq!(escape_arg("'a b'"), "'a b'");
    assert_eq!(escape_arg("`pwd`"), "`pwd`");
}

#[test]
fn arguments_with_inner_quotes_are_untouched() {
    assert_eq!(escape_arg("name=\"x y\""), "name=\"x y\"");
    assert_eq!(escape_arg("it's here"), "it's here");
}

#[test]
fn command_line_joins_escaped_parts() {
    let args = vec![
        "build".to_string(),
        "run".to_string(),
        "--build-file".to_string(),
        "/work/my project/build.zig".to_string(),
    ];
    assert_eq!(
        command_line("zig", &args),
        "zig build run --build-file \"/work/my project/build.zig\""
    );
}

#[test]
fn command_line_escapes_the_program() {
    assert_eq!(
        command_line("/opt/zig 0.13/zig", &[]),
        "\"/opt/zig 0.13/zig\""
    );
}

/// Split a command line the way a POSIX shell would for double-quoted and
/// bare words (enough for the strings generated below).
fn split_words(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_word = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                has_word = true;
            }
            '\\' if in_quotes && matches!(chars.peek(), Some('$' | '`' | '\\' | '"')) => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            ' ' if !in_quotes => {
                if has_word {
                    words.push(std::mem::take(&mut current));
                    has_word = false;
                }
            }
            _ => {
                current.push(c);
                has_word = true;
            }
        }
    }
    if has_word {
        words.push(current);
    }
    words
}

/// Words over plain and shell-special characters. No word starts or ends
/// with a backtick, and none ends in a backslash that would escape the
/// following space.
fn word() -> String {
    let head = r"a-z0-9_./$()&;|<>*?{}#~!\[\]\\-";
    let mid = r"a-z0-9_./$()&;|<>*?{}#~!\[\]\\`-";
    let tail = r"a-z0-9_./$()&;|<>*?{}#~!\[\]-";
    format!("(?:[{head}][{mid}]{{0,6}})?[{tail}]")
}

proptest! {
    #[test]
    fn spaced_arguments_survive_shell_splitting(
        args in proptest::collection::vec(
            proptest::string::string_regex(&format!("{w}( {w}){{0,2}}", w = word())).unwrap(),
            1..5,
        )
    ) {
        let line = command_line("tool", &args);
        let words = split_words(&line);
        prop_assert_eq!(&words[0], "tool");
        prop_assert_eq!(&words[1..], &args[..]);
    }

    #[test]
    fn arguments_without_whitespace_are_unchanged(arg in "[A-Za-z0-9_=./:-]{0,24}") {
        prop_assert_eq!(escape_arg(&arg), arg);
    }
}
