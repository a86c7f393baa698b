//! Static command allowlists.
//!
//! The check compares the raw requested program name against the list.
//! Nothing is resolved or normalised first, so `/bin/rm`, `./date` or
//! `date/../rm` never match an allowed bare name.

use std::collections::BTreeSet;

use super::gateway::GatewayError;

/// Commands users may run through the interactive shell path.
pub const SHELL_COMMANDS: &[&str] = &[
    "neofetch",
    "fastfetch",
    "fortune",
    "uptime",
    "dig",
    "man",
    "date",
    "free",
    "whois",
    "traceroute",
    "nping",
    "ping",
];

/// External tools driven by the media pipeline.
pub const MEDIA_TOOLS: &[&str] = &["ffmpeg", "wget"];

/// A fixed set of program names a gateway may spawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPolicy {
    allowed: BTreeSet<String>,
}

impl CommandPolicy {
    pub fn shell_commands() -> Self {
        Self::from_names(SHELL_COMMANDS.iter().copied())
    }

    pub fn media_tools() -> Self {
        Self::from_names(MEDIA_TOOLS.iter().copied())
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_allowed(&self, command: &str) -> bool {
        !command.is_empty() && self.allowed.contains(command)
    }

    /// Reject `command` unless it is on the list.
    pub fn check(&self, command: &str) -> Result<(), GatewayError> {
        if self.is_allowed(command) {
            Ok(())
        } else {
            Err(GatewayError::CommandNotAllowed {
                command: command.to_string(),
            })
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.allowed.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn shell_list_allows_known_commands() {
        let policy = CommandPolicy::shell_commands();
        for name in SHELL_COMMANDS {
            assert!(policy.is_allowed(name), "{name} should be allowed");
        }
    }

    #[test]
    fn unknown_command_is_rejected() {
        let policy = CommandPolicy::shell_commands();
        assert_matches!(
            policy.check("rm"),
            Err(GatewayError::CommandNotAllowed { command }) if command == "rm"
        );
    }

    #[test]
    fn path_tricks_do_not_match() {
        let policy = CommandPolicy::shell_commands();
        for name in ["/bin/date", "./date", "date/../rm", " date", "date ", "DATE", ""] {
            assert!(!policy.is_allowed(name), "{name:?} must not be allowed");
        }
    }

    #[test]
    fn media_tools_are_separate_from_shell_commands() {
        let media = CommandPolicy::media_tools();
        assert!(media.is_allowed("ffmpeg"));
        assert!(!media.is_allowed("date"));
        assert!(!CommandPolicy::shell_commands().is_allowed("ffmpeg"));
    }
}
