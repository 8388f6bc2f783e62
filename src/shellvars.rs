// Instance Agent - Shell Variable Files
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Line-preserving editor for shell-style variable files.
//!
//! Files such as `/etc/rc.conf` or `/etc/sysconfig/network` are a list of
//! `KEY=value` and `KEY=(word ...)` assignments mixed with comments and
//! anything else the administrator put there. [`ShellConfig`] keeps every
//! line as it was read and only rewrites the lines an operation targets,
//! so whatever the agent doesn't own comes back out byte for byte.
//!
//! Nothing is evaluated. Only unindented assignments are recognised, and
//! when a name is assigned more than once the first assignment wins.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

static ASSIGNMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)=(.*)$").expect("assignment pattern is valid")
});

/// Parsed shell-variable file.
#[derive(Debug, Clone, Default)]
pub struct ShellConfig {
    /// One slot per input line; `None` marks a removed line. A rewritten
    /// slot may hold several lines joined by `\n`.
    lines: Vec<Option<String>>,
    /// Variable name → slot of its first assignment.
    index: HashMap<String, usize>,
}

impl ShellConfig {
    /// Parse file content.
    pub fn parse(text: &str) -> Self {
        let mut config = Self::default();

        let mut raw: Vec<&str> = text.split('\n').collect();
        if raw.last() == Some(&"") {
            raw.pop();
        }

        for line in raw {
            config.push(line.to_string());
        }

        config
    }

    fn push(&mut self, line: String) -> usize {
        let slot = self.lines.len();
        if let Some(name) = assignment_name(&line) {
            self.index.entry(name.to_string()).or_insert(slot);
        }
        self.lines.push(Some(line));
        slot
    }

    /// Whether `name` is assigned anywhere in the file.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Raw value text of the first assignment of `name`.
    pub fn value(&self, name: &str) -> Option<&str> {
        let slot = *self.index.get(name)?;
        let block = self.lines.get(slot)?.as_deref()?;
        block
            .split('\n')
            .filter_map(|line| ASSIGNMENT.captures(line))
            .find(|c| c.get(1).map(|m| m.as_str()) == Some(name))
            .and_then(|c| c.get(2))
            .map(|m| m.as_str())
    }

    /// Words of an array (or scalar) variable, exactly as written.
    pub fn array_values(&self, name: &str) -> Option<Vec<String>> {
        self.value(name).map(split_words)
    }

    /// Variable names an array references, with any leading `!` stripped.
    fn referenced_names(&self, name: &str) -> Vec<String> {
        self.array_values(name)
            .unwrap_or_default()
            .into_iter()
            .map(|word| word.trim_start_matches('!').to_string())
            .filter(|word| word != name)
            .collect()
    }

    /// Replace an array variable and the variables it references.
    ///
    /// Every variable the current array lists is removed, then the array's
    /// slot receives one `key="value"` line per entry followed by
    /// `NAME=(key ...)`. A missing array is appended at the end.
    pub fn replace_array_variable(&mut self, name: &str, entries: &[(String, String)]) {
        let slot = match self.index.get(name).copied() {
            Some(slot) => {
                for referenced in self.referenced_names(name) {
                    if let Some(old) = self.index.remove(&referenced) {
                        self.lines[old] = None;
                    }
                }
                slot
            }
            None => {
                self.lines.push(None);
                self.index.insert(name.to_string(), self.lines.len() - 1);
                self.lines.len() - 1
            }
        };

        let mut block: Vec<String> = entries
            .iter()
            .map(|(key, value)| format!("{}=\"{}\"", key, value))
            .collect();
        let keys: Vec<&str> = entries.iter().map(|(key, _)| key.as_str()).collect();
        block.push(format!("{}=({})", name, keys.join(" ")));

        self.lines[slot] = Some(block.join("\n"));
    }

    /// Comment out a variable and every variable its array references.
    ///
    /// Returns false when the variable is not assigned.
    pub fn comment_out_variable(&mut self, name: &str) -> bool {
        let Some(slot) = self.index.get(name).copied() else {
            return false;
        };

        for referenced in self.referenced_names(name) {
            if let Some(old) = self.index.remove(&referenced) {
                comment_slot(&mut self.lines[old]);
            }
        }

        comment_slot(&mut self.lines[slot]);
        self.index.remove(name);
        true
    }

    /// Set a scalar variable in place, or append it.
    pub fn update_scalar_variable(&mut self, name: &str, value: &str) {
        let line = format!("{}={}", name, value);
        match self.index.get(name).copied() {
            Some(slot) => self.lines[slot] = Some(line),
            None => {
                self.push(line);
            }
        }
    }

    /// Rewrite an existing array variable with new words.
    ///
    /// Returns false (and changes nothing) when the variable is not assigned.
    pub fn set_array_variable(&mut self, name: &str, words: &[String]) -> bool {
        match self.index.get(name).copied() {
            Some(slot) => {
                self.lines[slot] = Some(format!("{}=({})", name, words.join(" ")));
                true
            }
            None => false,
        }
    }

    /// Drop every line whose text starts with one of `prefixes`.
    ///
    /// Leading whitespace is ignored when matching. Returns the number of
    /// lines removed.
    pub fn remove_lines_with_prefix(&mut self, prefixes: &[&str]) -> usize {
        let mut removed = 0;
        for slot in self.lines.iter_mut() {
            let matches = slot
                .as_deref()
                .map(|line| {
                    let line = line.trim_start();
                    prefixes.iter().any(|p| line.starts_with(p))
                })
                .unwrap_or(false);
            if matches {
                *slot = None;
                removed += 1;
            }
        }
        let lines = &self.lines;
        self.index.retain(|_, slot| lines[*slot].is_some());
        removed
    }

    /// Append a line at the end of the file.
    pub fn append_line(&mut self, line: impl Into<String>) {
        self.push(line.into());
    }

    /// Render the file, one newline-terminated line per surviving slot.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for line in self.lines.iter().flatten() {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

fn assignment_name(line: &str) -> Option<&str> {
    ASSIGNMENT
        .captures(line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

fn comment_slot(slot: &mut Option<String>) {
    if let Some(line) = slot.take() {
        let commented: Vec<String> = line.split('\n').map(|l| format!("#{}", l)).collect();
        *slot = Some(commented.join("\n"));
    }
}

/// Split a variable value into words, removing array parens, quotes and a
/// trailing comment.
fn split_words(value: &str) -> Vec<String> {
    let value = value.trim();
    let inner = if let Some(rest) = value.strip_prefix('(') {
        match rest.rfind(')') {
            Some(end) => &rest[..end],
            None => rest,
        }
    } else {
        let unquoted = value.split('#').next().unwrap_or("").trim();
        unquoted.trim_matches(|c| c == '"' || c == '\'')
    };

    inner
        .split_whitespace()
        .map(|w| w.trim_matches(|c| c == '"' || c == '\'').to_string())
        .filter(|w| !w.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const RC_CONF: &str = "\
# /etc/rc.conf
LOCALE=\"en_US.UTF-8\"

eth0=\"eth0 10.0.0.2 netmask 255.255.255.0\"
INTERFACES=(eth0 !wlan0)
wlan0=\"dhcp\"
gateway=\"default gw 10.0.0.1\"
ROUTES=(!gateway)
DAEMONS=(syslog-ng !network @net-profiles crond)
";

    #[test]
    fn test_untouched_file_round_trips() {
        assert_eq!(ShellConfig::parse(RC_CONF).serialize(), RC_CONF);

        let odd = "  indented=1\n\n#comment\nno newline";
        assert_eq!(ShellConfig::parse(odd).serialize(), format!("{}\n", odd));
    }

    #[test]
    fn test_first_definition_wins() {
        let config = ShellConfig::parse("A=1\nA=2\n");
        assert_eq!(config.value("A"), Some("1"));
    }

    #[test]
    fn test_replace_array_variable() {
        let mut config = ShellConfig::parse(RC_CONF);
        config.replace_array_variable(
            "INTERFACES",
            &[("eth0".into(), "eth0 10.0.0.5 netmask 255.255.255.0".into())],
        );

        let expected = "\
# /etc/rc.conf
LOCALE=\"en_US.UTF-8\"

eth0=\"eth0 10.0.0.5 netmask 255.255.255.0\"
INTERFACES=(eth0)
gateway=\"default gw 10.0.0.1\"
ROUTES=(!gateway)
DAEMONS=(syslog-ng !network @net-profiles crond)
";
        assert_eq!(config.serialize(), expected);

        // Applying the same change again is a no-op
        let mut again = ShellConfig::parse(expected);
        again.replace_array_variable(
            "INTERFACES",
            &[("eth0".into(), "eth0 10.0.0.5 netmask 255.255.255.0".into())],
        );
        assert_eq!(again.serialize(), expected);
    }

    #[test]
    fn test_replace_missing_array_appends() {
        let mut config = ShellConfig::parse("A=1\n");
        config.replace_array_variable("ROUTES", &[("gateway".into(), "default gw 1.2.3.4".into())]);
        assert_eq!(
            config.serialize(),
            "A=1\ngateway=\"default gw 1.2.3.4\"\nROUTES=(gateway)\n"
        );
    }

    #[test]
    fn test_comment_out_variable() {
        let mut config = ShellConfig::parse("net1=\"x\"\nNETWORKS=(net1 !net2)\nnet2=\"y\"\nB=2\n");
        assert!(config.comment_out_variable("NETWORKS"));
        assert_eq!(
            config.serialize(),
            "#net1=\"x\"\n#NETWORKS=(net1 !net2)\n#net2=\"y\"\nB=2\n"
        );
        assert!(!config.contains("NETWORKS"));
        assert!(!config.comment_out_variable("NETWORKS"));
    }

    #[test]
    fn test_update_scalar_variable() {
        let mut config = ShellConfig::parse("# keep\nHOSTNAME=old\nX=1\n");
        config.update_scalar_variable("HOSTNAME", "\"new\"");
        config.update_scalar_variable("NETWORKING_IPV6", "yes");
        assert_eq!(
            config.serialize(),
            "# keep\nHOSTNAME=\"new\"\nX=1\nNETWORKING_IPV6=yes\n"
        );
    }

    #[test]
    fn test_array_values_keep_bang() {
        let config = ShellConfig::parse(RC_CONF);
        assert_eq!(
            config.array_values("DAEMONS").unwrap(),
            vec!["syslog-ng", "!network", "@net-profiles", "crond"]
        );
        assert_eq!(config.array_values("LOCALE").unwrap(), vec!["en_US.UTF-8"]);
        assert!(config.array_values("MISSING").is_none());
    }

    #[test]
    fn test_set_array_variable() {
        let mut config = ShellConfig::parse("DAEMONS=(a b) # trailing\n");
        assert!(config.set_array_variable("DAEMONS", &["a".into(), "c".into()]));
        assert_eq!(config.serialize(), "DAEMONS=(a c)\n");
        assert!(!config.set_array_variable("NOPE", &[]));
    }

    #[test]
    fn test_remove_lines_with_prefix() {
        let mut config = ShellConfig::parse("ifconfig_re0=\"DHCP\"\nsshd_enable=\"YES\"\nhostname=\"x\"\n");
        assert_eq!(config.remove_lines_with_prefix(&["ifconfig", "hostname"]), 2);
        config.append_line("hostname=y");
        assert_eq!(config.serialize(), "sshd_enable=\"YES\"\nhostname=y\n");
        assert_eq!(config.value("hostname"), Some("y"));
    }
}
