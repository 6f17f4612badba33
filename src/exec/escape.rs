// src/exec/escape.rs

//! Shell escaping for arguments appended to a command line.
//!
//! The command line is executed through the platform shell, so arguments
//! with spaces or shell metacharacters need quoting. Arguments the caller
//! already quoted are left alone.

/// Characters a POSIX shell would interpret in a bare word.
const SHELL_METACHARS: &[char] = &[
    '$', '`', '\\', '(', ')', ';', '&', '|', '<', '>', '*', '?', '[', ']', '{', '}', '#', '~', '!',
];

/// Escape a single argument for inclusion in a shell command line.
///
/// - Already quoted or backticked arguments, and arguments containing an
///   unescaped quote, pass through unchanged.
/// - Arguments containing unescaped whitespace or a shell metacharacter are
///   wrapped in double quotes. Any `\ ` escapes inside are turned back into
///   plain spaces first; `$`, `` ` ``, `\` and `"` are then backslash-escaped.
/// - Everything else passes through unchanged.
pub fn escape_arg(arg: &str) -> String {
    if is_wrapped(arg) || has_unescaped(arg, |c| c == '"' || c == '\'') {
        return arg.to_string();
    }

    if has_unescaped(arg, char::is_whitespace) || arg.contains(SHELL_METACHARS) {
        return double_quote(&arg.replace("\\ ", " "));
    }

    arg.to_string()
}

fn double_quote(arg: &str) -> String {
    let mut quoted = String::with_capacity(arg.len() + 2);
    quoted.push('"');
    for c in arg.chars() {
        if matches!(c, '$' | '`' | '\\' | '"') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// Build the full command line: the program followed by escaped arguments.
pub fn command_line(program: &str, args: &[String]) -> String {
    let mut line = escape_arg(program);
    for arg in args {
        line.push(' ');
        line.push_str(&escape_arg(arg));
    }
    line
}

fn is_wrapped(arg: &str) -> bool {
    if arg.len() < 2 {
        return false;
    }
    ['"', '\'', '`']
        .iter()
        .any(|&q| arg.starts_with(q) && arg.ends_with(q))
}

fn has_unescaped(arg: &str, pred: impl Fn(char) -> bool) -> bool {
    let mut prev = None;
    for c in arg.chars() {
        if pred(c) && prev != Some('\\') {
            return true;
        }
        prev = Some(c);
    }
    false
}
