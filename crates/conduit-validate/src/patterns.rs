// SPDX-License-Identifier: MIT OR Apache-2.0
//! Built-in injection-pattern detectors.

use std::sync::LazyLock;

use regex::Regex;

macro_rules! pattern {
    ($name:ident, $re:expr) => {
        static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($re).expect("static pattern compiles"));
    };
}

pattern!(
    SQL_INJECTION,
    r"(?i)(\bunion\s+select\b|\bor\s+1\s*=\s*1\b|;\s*drop\s+table\b|--\s|\bxp_cmdshell\b)"
);
pattern!(NOSQL_INJECTION, r"(\$where\b|\$ne\b|\$gt\b|\$regex\b|\$\{)");
pattern!(
    COMMAND_INJECTION,
    r"(;\s*(rm|cat|curl|wget|nc)\s|\|\s*(sh|bash)\b|`[^`]*`|\$\([^)]*\))"
);
pattern!(LDAP_INJECTION, r"(\*\)|\(\||\(&|\(!\()");
pattern!(PATH_TRAVERSAL, r"(\.\./|\.\.\\|%2e%2e%2f)");
pattern!(HTML_INJECTION, r"(?i)(<script[\s>]|javascript:|onerror\s*=|onload\s*=)");

/// One recognized injection category, matched independently so the
/// middleware can report exactly which rule fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionKind {
    /// SQL injection patterns (`UNION SELECT`, tautologies, stacked queries).
    Sql,
    /// NoSQL operator injection (`$where`, `$ne`, ...).
    NoSql,
    /// Shell/command injection via pipes, backticks, or subshells.
    Command,
    /// LDAP filter injection.
    Ldap,
    /// Path traversal sequences.
    PathTraversal,
    /// HTML/script injection.
    Html,
}

impl InjectionKind {
    /// The rule name reported on a [`conduit_core::ValidationError`].
    #[must_use]
    pub fn rule_name(&self) -> &'static str {
        match self {
            Self::Sql => "sql_injection",
            Self::NoSql => "nosql_injection",
            Self::Command => "command_injection",
            Self::Ldap => "ldap_injection",
            Self::PathTraversal => "path_traversal",
            Self::Html => "html_injection",
        }
    }

    fn pattern(&self) -> &'static Regex {
        match self {
            Self::Sql => &SQL_INJECTION,
            Self::NoSql => &NOSQL_INJECTION,
            Self::Command => &COMMAND_INJECTION,
            Self::Ldap => &LDAP_INJECTION,
            Self::PathTraversal => &PATH_TRAVERSAL,
            Self::Html => &HTML_INJECTION,
        }
    }

    /// Whether `text` matches this injection category's pattern.
    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        self.pattern().is_match(text)
    }
}

/// Every injection kind the built-in checks recognize, in a fixed order.
pub const ALL_INJECTION_KINDS: [InjectionKind; 6] = [
    InjectionKind::Sql,
    InjectionKind::NoSql,
    InjectionKind::Command,
    InjectionKind::Ldap,
    InjectionKind::PathTraversal,
    InjectionKind::Html,
];

/// Whether `text` contains a control character (excluding plain whitespace).
#[must_use]
pub fn has_control_characters(text: &str) -> bool {
    text.chars().any(|c| c.is_control() && c != '\n' && c != '\r' && c != '\t')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sql_injection_detects_union_select() {
        assert!(InjectionKind::Sql.matches("1 UNION SELECT password FROM users"));
        assert!(!InjectionKind::Sql.matches("a normal order note"));
    }

    #[test]
    fn command_injection_detects_backticks_and_pipes() {
        assert!(InjectionKind::Command.matches("foo `rm -rf /`"));
        assert!(InjectionKind::Command.matches("input | sh"));
    }

    #[test]
    fn path_traversal_detects_dot_dot_slash() {
        assert!(InjectionKind::PathTraversal.matches("../../etc/passwd"));
        assert!(!InjectionKind::PathTraversal.matches("reports/2024/summary.pdf"));
    }

    #[test]
    fn html_injection_detects_script_tag() {
        assert!(InjectionKind::Html.matches("<script>alert(1)</script>"));
    }

    #[test]
    fn control_characters_detected_excluding_common_whitespace() {
        assert!(has_control_characters("bad\u{0007}bell"));
        assert!(!has_control_characters("line one\nline two\t end"));
    }
}
