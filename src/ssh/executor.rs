//! Remote operations over a pooled session.
//!
//! Every function here takes validated inputs only and builds its shell line
//! from quoted fragments.

use std::fmt::Write as _;
use std::time::Duration;

use serde::Serialize;
use tokio::time::{Instant, timeout};
use tracing::{debug, warn};

use crate::domain::shell::{cd_and_run, command_exists, quote_all, quote_path};
use crate::domain::truncate::{cap, truncate_utf8};
use crate::error::{InspectError, Result};
use crate::ports::{ExecOutput, RemoteSession};
use crate::security::{ValidatedCommand, ValidatedPath};

/// Exit code reported when the local deadline expires
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Extra time granted to the local await beyond the remote `timeout`
const LOCAL_TIMEOUT_GRACE: Duration = Duration::from_secs(2);

/// Longest stderr excerpt carried into an error
const MAX_ERROR_DETAIL: usize = 500;

/// Entries rendered by the `find` fallback before the tree is cut short
pub const MAX_TREE_ENTRIES: usize = 2000;

/// Outcome of one command run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    /// `-1` when the channel closed without an exit status
    pub exit_code: i32,
    pub duration_ms: u64,
    pub timed_out: bool,
}

impl CommandResult {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }
}

/// What a remote path refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PathKind {
    File,
    Directory,
    Absent,
}

/// One line of a directory listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirEntry {
    pub name: String,
    pub size: u64,
    pub permissions: String,
    pub modified: String,
    pub is_dir: bool,
}

/// File content, possibly cut at `max_bytes`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileContent {
    pub content: String,
    pub was_truncated: bool,
}

fn exit_status(output: &ExecOutput) -> i32 {
    output
        .exit_code
        .and_then(|code| i32::try_from(code).ok())
        .unwrap_or(-1)
}

fn remote_failure(what: &str, path: &ValidatedPath, output: &ExecOutput) -> InspectError {
    let stderr = output.stderr_lossy();
    let detail = stderr.trim();
    let reason = if detail.is_empty() {
        format!("{what} {path} failed with exit code {}", exit_status(output))
    } else {
        cap(detail, MAX_ERROR_DETAIL)
    };
    InspectError::Exec { reason }
}

/// Classify a path as file, directory or absent.
///
/// # Errors
///
/// Returns a transport error if the session fails, or `Exec` if the remote
/// shell answers with something unexpected.
pub async fn stat_path<S>(conn: &S, path: &ValidatedPath) -> Result<PathKind>
where
    S: RemoteSession + ?Sized,
{
    let quoted = quote_path(path.as_str());
    let line = format!(
        "if [ -d {quoted} ]; then echo d; elif [ -e {quoted} ]; then echo f; else echo n; fi"
    );
    let output = conn.exec(&line).await?;

    match output.stdout_lossy().trim() {
        "d" => Ok(PathKind::Directory),
        "f" => Ok(PathKind::File),
        "n" => Ok(PathKind::Absent),
        other => Err(InspectError::Exec {
            reason: format!("unexpected stat answer for {path}: {}", cap(other, 80)),
        }),
    }
}

/// Read a file, keeping at most `max_bytes` bytes.
///
/// One extra byte is requested so truncation can be detected without a
/// second round trip. The cut never splits a UTF-8 character.
///
/// # Errors
///
/// Returns `Exec` when the remote read fails, for example on permissions.
pub async fn read_file<S>(conn: &S, path: &ValidatedPath, max_bytes: usize) -> Result<FileContent>
where
    S: RemoteSession + ?Sized,
{
    let line = format!(
        "head -c {} -- {}",
        max_bytes.saturating_add(1),
        quote_path(path.as_str())
    );
    let output = conn.exec(&line).await?;
    if exit_status(&output) != 0 {
        return Err(remote_failure("read", path, &output));
    }

    let (content, was_truncated) = truncate_utf8(&output.stdout, max_bytes);
    if was_truncated {
        debug!(path = %path, max_bytes, "File content truncated");
    }
    Ok(FileContent {
        content,
        was_truncated,
    })
}

/// List a directory, directories first, then by name.
///
/// # Errors
///
/// Returns `Exec` when `ls` fails remotely.
pub async fn list_directory<S>(conn: &S, path: &ValidatedPath) -> Result<Vec<DirEntry>>
where
    S: RemoteSession + ?Sized,
{
    let line = format!(
        "LC_ALL=C ls -lA --time-style=long-iso -- {}",
        quote_path(path.as_str())
    );
    let output = conn.exec(&line).await?;
    if exit_status(&output) != 0 {
        return Err(remote_failure("list", path, &output));
    }

    let mut entries: Vec<DirEntry> = output
        .stdout_lossy()
        .lines()
        .filter_map(parse_ls_line)
        .collect();
    entries.sort_by(|a, b| b.is_dir.cmp(&a.is_dir).then_with(|| a.name.cmp(&b.name)));
    Ok(entries)
}

/// Split off the first `n` whitespace-separated fields and return the rest
/// verbatim, so names with spaces survive.
fn split_fields(line: &str, n: usize) -> Option<(Vec<&str>, &str)> {
    let mut fields = Vec::with_capacity(n);
    let mut rest = line.trim_start();
    for _ in 0..n {
        let end = rest.find(char::is_whitespace)?;
        fields.push(&rest[..end]);
        rest = rest[end..].trim_start();
    }
    Some((fields, rest))
}

/// Parse one `ls -l --time-style=long-iso` line.
///
/// `total` lines and anything unrecognised yield `None`.
fn parse_ls_line(line: &str) -> Option<DirEntry> {
    // perms links owner group size date time name
    let (fields, mut name) = split_fields(line, 7)?;
    let permissions = fields[0];
    if permissions.len() < 10 {
        return None;
    }

    // Device files print "major, minor" where the size would be
    let (size, date, time) = if fields[4].ends_with(',') {
        // fields[5] is the minor number, so the time spills into the rest
        let (time, rest) = split_fields(name, 1)?;
        name = rest;
        (0, fields[6], time[0])
    } else {
        (fields[4].parse().unwrap_or(0), fields[5], fields[6])
    };

    if permissions.starts_with('l') {
        if let Some((link, _)) = name.split_once(" -> ") {
            name = link;
        }
    }
    if name.is_empty() {
        return None;
    }

    Some(DirEntry {
        name: name.to_string(),
        size,
        permissions: permissions.to_string(),
        modified: format!("{date} {time}"),
        is_dir: permissions.starts_with('d'),
    })
}

/// Render a listing as aligned text
#[must_use]
pub fn render_listing(path: &ValidatedPath, entries: &[DirEntry]) -> String {
    if entries.is_empty() {
        return format!("{path}: empty directory");
    }

    let width = entries
        .iter()
        .map(|e| e.size.to_string().len())
        .max()
        .unwrap_or(1);

    let mut out = format!("{path}: {} entries\n", entries.len());
    for entry in entries {
        let suffix = if entry.is_dir { "/" } else { "" };
        let _ = writeln!(
            out,
            "{} {:>width$} {}  {}{suffix}",
            entry.permissions, entry.size, entry.modified, entry.name
        );
    }
    out.truncate(out.trim_end().len());
    out
}

/// Render a directory tree to `max_depth` levels.
///
/// Uses the remote `tree` when it exists, otherwise lists with `find` and
/// indents locally.
///
/// # Errors
///
/// Returns `Exec` when the remote listing fails.
pub async fn tree_directory<S>(conn: &S, path: &ValidatedPath, max_depth: u32) -> Result<String>
where
    S: RemoteSession + ?Sized,
{
    let depth = max_depth.max(1);
    let quoted = quote_path(path.as_str());

    let probe = conn.exec(&command_exists("tree")).await?;
    if exit_status(&probe) == 0 {
        let output = conn
            .exec(&format!("tree -a -L {depth} --noreport {quoted}"))
            .await?;
        if !is_partial_listing(&output) {
            return Err(remote_failure("tree", path, &output));
        }
        return Ok(output.stdout_lossy().trim_end().to_string());
    }

    debug!(path = %path, "tree not available, falling back to find");
    let find = format!(
        "find . -mindepth 1 -maxdepth {depth} \\( -type d -exec printf '%s/\\n' {{}} + \\) -o -print"
    );
    let output = conn.exec(&cd_and_run(path.as_str(), &find)).await?;
    if !is_partial_listing(&output) {
        return Err(remote_failure("tree", path, &output));
    }
    if exit_status(&output) != 0 {
        debug!(path = %path, "Some subdirectories could not be read");
    }
    Ok(render_find_tree(path.as_str(), &output.stdout_lossy()))
}

/// Success, or exit 1 with output: `tree` and `find` both exit 1 when only
/// some subdirectories are unreadable
fn is_partial_listing(output: &ExecOutput) -> bool {
    match exit_status(output) {
        0 => true,
        1 => !output.stdout.is_empty(),
        _ => false,
    }
}

/// Indent `find` output (one `./relative` path per line, directories with a
/// trailing `/`) into a tree under `root`.
#[must_use]
pub fn render_find_tree(root: &str, find_output: &str) -> String {
    let mut paths: Vec<(Vec<&str>, bool)> = find_output
        .lines()
        .filter_map(|line| {
            let rel = line.strip_prefix("./").unwrap_or(line);
            let is_dir = rel.ends_with('/');
            let components: Vec<&str> = rel.split('/').filter(|c| !c.is_empty()).collect();
            (!components.is_empty()).then_some((components, is_dir))
        })
        .collect();
    paths.sort();
    paths.dedup_by(|a, b| a.0 == b.0);

    let mut out = root.trim_end_matches('/').to_string();
    out.push('/');
    for (components, is_dir) in paths.iter().take(MAX_TREE_ENTRIES) {
        let indent = "  ".repeat(components.len());
        let name = components.last().copied().unwrap_or_default();
        let suffix = if *is_dir { "/" } else { "" };
        let _ = write!(out, "\n{indent}{name}{suffix}");
    }
    if paths.len() > MAX_TREE_ENTRIES {
        let _ = write!(out, "\n... {} more entries", paths.len() - MAX_TREE_ENTRIES);
    }
    out
}

/// Run a validated command in `working_dir`.
///
/// The remote `timeout` bounds the process; a local deadline of
/// `timeout_seconds + 2s` bounds the wait. Hitting the local deadline is a
/// normal result with exit code 124 and `timed_out` set. A non-zero remote
/// exit is a normal result too.
///
/// # Errors
///
/// Only transport failures are errors.
pub async fn run_command<S>(
    conn: &S,
    working_dir: &ValidatedPath,
    command: &ValidatedCommand,
    timeout_seconds: u64,
) -> Result<CommandResult>
where
    S: RemoteSession + ?Sized,
{
    let line = cd_and_run(
        working_dir.as_str(),
        &format!("timeout {timeout_seconds} {}", quote_all(command.tokens())),
    );
    debug!(host = %conn.host_name(), program = %command.program(), "Running command");

    let start = Instant::now();
    let deadline = Duration::from_secs(timeout_seconds) + LOCAL_TIMEOUT_GRACE;
    let outcome = timeout(deadline, conn.exec(&line)).await;
    let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

    match outcome {
        Ok(output) => {
            let output = output?;
            let exit_code = exit_status(&output);
            Ok(CommandResult {
                stdout: output.stdout_lossy(),
                stderr: output.stderr_lossy(),
                exit_code,
                duration_ms,
                timed_out: exit_code == TIMEOUT_EXIT_CODE,
            })
        }
        Err(_) => {
            warn!(host = %conn.host_name(), timeout_secs = timeout_seconds, "Command exceeded local deadline");
            Ok(CommandResult {
                stdout: String::new(),
                stderr: format!("command timed out after {timeout_seconds}s"),
                exit_code: TIMEOUT_EXIT_CODE,
                duration_ms,
                timed_out: true,
            })
        }
    }
}
