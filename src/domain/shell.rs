//! POSIX shell quoting for remote command construction.
//!
//! Every caller-supplied fragment goes through [`quote`] or [`quote_path`]
//! before it is placed on a shell line.

/// Single-quote a string for a POSIX shell. Internal `'` become `'\''`.
///
/// # Examples
///
/// ```
/// use mcp_ssh_inspector::domain::shell;
///
/// assert_eq!(shell::quote("hello"), "'hello'");
/// assert_eq!(shell::quote("it's"), "'it'\\''s'");
/// assert_eq!(shell::quote(""), "''");
/// ```
#[must_use]
pub fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

/// Quote a path argument.
///
/// - `~` and `~/rest` become `"$HOME"` and `"$HOME"/'rest'` so the remote
///   shell expands the home directory and nothing else.
/// - `~user` and `~user/rest` keep the tilde prefix unquoted when `user` is
///   a portable login name, so the remote shell expands that user's home.
///   Any other `~` prefix stays literal.
/// - A relative path starting with `-` gains a `./` prefix so it cannot be
///   read as an option.
///
/// # Examples
///
/// ```
/// use mcp_ssh_inspector::domain::shell;
///
/// assert_eq!(shell::quote_path("/var/log"), "'/var/log'");
/// assert_eq!(shell::quote_path("~/notes.txt"), "\"$HOME\"/'notes.txt'");
/// assert_eq!(shell::quote_path("~alice/notes"), "~alice/'notes'");
/// assert_eq!(shell::quote_path("-rf"), "'./-rf'");
/// ```
#[must_use]
pub fn quote_path(path: &str) -> String {
    if path == "~" {
        return "\"$HOME\"".to_string();
    }
    if let Some(rest) = path.strip_prefix("~/") {
        if rest.is_empty() {
            return "\"$HOME\"/".to_string();
        }
        return format!("\"$HOME\"/{}", quote(rest));
    }
    if let Some(tilde_prefix) = path.strip_prefix('~') {
        let (user, rest) = tilde_prefix
            .split_once('/')
            .map_or((tilde_prefix, None), |(user, rest)| (user, Some(rest)));
        if is_login_name(user) {
            return match rest {
                None => format!("~{user}"),
                Some("") => format!("~{user}/"),
                Some(rest) => format!("~{user}/{}", quote(rest)),
            };
        }
    }
    if path.starts_with('-') {
        return quote(&format!("./{path}"));
    }
    quote(path)
}

/// POSIX portable user name: `[A-Za-z0-9._-]`, not starting with `-`
fn is_login_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('-')
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'))
}

/// Quote every token and join with single spaces
#[must_use]
pub fn quote_all<S: AsRef<str>>(tokens: &[S]) -> String {
    tokens
        .iter()
        .map(|t| quote(t.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Build a "change directory then run command" one-liner.
///
/// `cmd` must already be quoted.
#[must_use]
pub fn cd_and_run(dir: &str, cmd: &str) -> String {
    format!("cd {} && {cmd}", quote_path(dir))
}

/// Build a command that checks whether an executable exists
#[must_use]
pub fn command_exists(name: &str) -> String {
    format!("command -v {} >/dev/null 2>&1", quote(name))
}
