//! Command building for gobbled processes.
//!
//! A process either runs its program directly, or through a shell prefix
//! such as `/bin/sh -c`. In the latter case the program and its arguments
//! are quoted into a single command string so that spaces and shell
//! metacharacters reach the program untouched.
//!
//! # Example
//!
//! ```ignore
//! use gobbler_core::shell::build_command;
//!
//! let cmd = build_command(
//!     "make",
//!     &["test".to_string()],
//!     Some("/path/to/project"),
//!     Some("/bin/bash -c"),
//! )?;
//! ```

use std::process::Command;

use crate::error::ProcessError;

/// Shells that do not accept a `-c` command the POSIX way.
#[cfg(unix)]
const NON_POSIX_SHELLS: [&str; 6] = ["fish", "nu", "nushell", "elvish", "xonsh", "ion"];

/// Build a command for `program` with `args`.
///
/// Without a shell prefix the program is executed directly. An empty
/// prefix selects the user's default shell (see [`default_shell_prefix`]).
pub fn build_command(
    program: &str,
    args: &[String],
    working_dir: Option<&str>,
    shell_prefix: Option<&str>,
) -> Result<Command, ProcessError> {
    let mut cmd = match shell_prefix {
        None => {
            let mut cmd = Command::new(program);
            cmd.args(args);
            cmd
        }
        Some(prefix) => shell_command(program, args, prefix)?,
    };

    if let Some(dir) = working_dir {
        cmd.current_dir(dir);
    }
    Ok(cmd)
}

fn shell_command(program: &str, args: &[String], prefix: &str) -> Result<Command, ProcessError> {
    let prefix = if prefix.trim().is_empty() {
        default_shell_prefix()
    } else {
        prefix.to_string()
    };

    let prefix_parts = shlex::split(&prefix)
        .filter(|parts| !parts.is_empty())
        .ok_or_else(|| ProcessError::InvalidCommand(format!("Invalid shell prefix: {prefix}")))?;

    let mut command_parts = Vec::with_capacity(args.len() + 1);
    for part in std::iter::once(program).chain(args.iter().map(String::as_str)) {
        let quoted = shlex::try_quote(part)
            .map_err(|_| ProcessError::InvalidCommand(format!("Invalid argument: {part}")))?;
        command_parts.push(quoted.into_owned());
    }

    let mut cmd = Command::new(&prefix_parts[0]);
    cmd.args(&prefix_parts[1..]).arg(command_parts.join(" "));
    Ok(cmd)
}

/// Shell prefix used when none is configured.
///
/// On Unix this is `$SHELL -c`, falling back to `/bin/sh -c` when `$SHELL`
/// is unset or names a non-POSIX shell.
#[cfg(unix)]
pub fn default_shell_prefix() -> String {
    let shell = std::env::var("SHELL").unwrap_or_default();
    let shell_name = std::path::Path::new(&shell)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    if shell_name.is_empty() || NON_POSIX_SHELLS.contains(&shell_name) {
        "/bin/sh -c".to_string()
    } else {
        format!("{} -c", shell)
    }
}

#[cfg(windows)]
pub fn default_shell_prefix() -> String {
    "cmd /C".to_string()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn args_of(cmd: &Command) -> Vec<String> {
        cmd.get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn direct_command_keeps_arguments() {
        let args = ["a b".to_string(), "$HOME".to_string()];
        let cmd = build_command("echo", &args, None, None).unwrap();
        assert_eq!(cmd.get_program(), "echo");
        assert_eq!(args_of(&cmd), vec!["a b", "$HOME"]);
    }

    #[test]
    fn working_dir_is_applied() {
        let cmd = build_command("ls", &[], Some("/tmp"), None).unwrap();
        assert_eq!(cmd.get_current_dir(), Some(std::path::Path::new("/tmp")));
    }

    #[test]
    fn shell_prefix_quotes_inner_command() {
        let cmd = build_command(
            "/path/with spaces/tool",
            &["--key=$VALUE".to_string()],
            None,
            Some("/bin/bash -c"),
        )
        .unwrap();

        assert_eq!(cmd.get_program(), "/bin/bash");
        let args = args_of(&cmd);
        assert_eq!(args[0], "-c");
        assert_eq!(
            shlex::split(&args[1]).unwrap(),
            vec!["/path/with spaces/tool", "--key=$VALUE"]
        );
    }

    #[test]
    fn unbalanced_prefix_is_rejected() {
        let err = build_command("ls", &[], None, Some("sh -c '")).unwrap_err();
        assert!(matches!(err, ProcessError::InvalidCommand(_)));
    }

    #[test]
    fn nul_in_argument_is_rejected() {
        let err = build_command("ls", &["a\0b".to_string()], None, Some("sh -c")).unwrap_err();
        assert!(err.to_string().contains("Invalid argument"));
    }

    #[test]
    #[cfg(unix)]
    fn empty_prefix_uses_default_shell() {
        let cmd = build_command("true", &[], None, Some("")).unwrap();
        let args = args_of(&cmd);
        assert_eq!(args.last().map(String::as_str), Some("true"));
        assert!(default_shell_prefix().ends_with(" -c"));
    }
}
