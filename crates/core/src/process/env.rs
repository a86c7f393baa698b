//! Environment handed to spawned processes.
//!
//! Children start from an empty environment; only the variables listed here
//! are copied from the parent. Anything else the parent holds, bot tokens
//! and API keys included, never reaches a child.

use std::ffi::{OsStr, OsString};

/// Variables copied verbatim from the parent when present.
pub const PASSTHROUGH_VARS: &[&str] = &["PATH", "HOME", "LD_PRELOAD", "LANG"];

/// Restricted environment applied to every spawned process.
#[derive(Debug, Clone)]
pub struct AllowedEnv {
    vars: Vec<(String, OsString)>,
}

impl AllowedEnv {
    /// Capture the allow-listed variables from the current process.
    ///
    /// `PAGER` is forced to `cat` so tools like `man` never wait on a pager,
    /// and `SHELL` points at the running executable rather than a real shell.
    pub fn from_parent() -> Self {
        let shell = std::env::current_exe().ok().map(OsString::from);
        Self::from_lookup(|name| std::env::var_os(name), shell)
    }

    /// Build the environment from an arbitrary lookup.
    pub fn from_lookup<F>(lookup: F, shell: Option<OsString>) -> Self
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let mut vars = vec![("PAGER".to_string(), OsString::from("cat"))];
        for name in PASSTHROUGH_VARS {
            if let Some(value) = lookup(name) {
                vars.push((name.to_string(), value));
            }
        }
        if let Some(shell) = shell {
            vars.push(("SHELL".to_string(), shell));
        }
        Self { vars }
    }

    pub fn get(&self, name: &str) -> Option<&OsStr> {
        self.vars
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_os_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OsStr)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_os_str()))
    }

    /// Names a child may ever see.
    pub fn is_permitted_name(name: &str) -> bool {
        name == "PAGER" || name == "SHELL" || PASSTHROUGH_VARS.contains(&name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secrets_are_not_copied() {
        let env = AllowedEnv::from_lookup(
            |name| match name {
                "PATH" => Some("/usr/bin:/bin".into()),
                "BOT_TOKEN" => Some("123:secret".into()),
                _ => None,
            },
            None,
        );
        assert_eq!(env.get("PATH"), Some(OsStr::new("/usr/bin:/bin")));
        assert_eq!(env.get("BOT_TOKEN"), None);
        assert!(env.iter().all(|(k, _)| AllowedEnv::is_permitted_name(k)));
    }

    #[test]
    fn pager_is_always_cat() {
        let env = AllowedEnv::from_lookup(|_| None, None);
        assert_eq!(env.get("PAGER"), Some(OsStr::new("cat")));
        assert_eq!(env.iter().count(), 1);
    }

    #[test]
    fn shell_is_the_given_interpreter() {
        let env = AllowedEnv::from_lookup(|_| None, Some("/opt/sino/bin/sino-worker".into()));
        assert_eq!(env.get("SHELL"), Some(OsStr::new("/opt/sino/bin/sino-worker")));
    }
}
