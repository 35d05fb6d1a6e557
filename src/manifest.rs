//! Manifest data model: ordered sections, substitution rules, and the
//! rendering helpers that turn section content into the output document.
//!
//! All types double as the config-file schema, so a manifest layout can be
//! supplied as YAML or JSON.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One named unit of manifest content. Sections are ordered; list order
/// defines output order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    #[serde(flatten)]
    pub source: SectionSource,
}

impl Section {
    pub fn file(title: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            title: title.into(),
            source: SectionSource::File(path.into()),
        }
    }

    pub fn command(title: impl Into<String>, spec: CommandSpec) -> Self {
        Self {
            title: title.into(),
            source: SectionSource::Command(spec),
        }
    }
}

/// Where a section's body comes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionSource {
    /// Literal file contents, resolved against the configured working
    /// directory when relative.
    File(PathBuf),
    /// Captured standard output of an external command.
    Command(CommandSpec),
}

/// An external command invocation: program, arguments, and an optional
/// working directory overriding the aggregator's.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            working_dir: None,
        }
    }
}

/// An ordered literal find/replace applied over the whole output buffer.
/// Not a regex. Listed order is a contract: later rules see the result of
/// earlier ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubstitutionRule {
    pub pattern: String,
    pub replacement: String,
}

impl SubstitutionRule {
    pub fn new(pattern: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            replacement: replacement.into(),
        }
    }
}

/// HTML entities the external tool's template renderer escapes, decoded back
/// to literal characters in this order.
pub fn default_substitutions() -> Vec<SubstitutionRule> {
    [
        ("&quot;", "\""),
        ("&#x27;", "'"),
        ("&#x3D;", "="),
        ("&#x60;", "`"),
        ("&lt;", "<"),
        ("&gt;", ">"),
    ]
    .iter()
    .map(|(pattern, replacement)| SubstitutionRule::new(*pattern, *replacement))
    .collect()
}

/// Applies every rule in listed order, each replacing all non-overlapping
/// occurrences of its pattern left-to-right.
pub fn apply_substitutions(buffer: &str, rules: &[SubstitutionRule]) -> String {
    let mut out = buffer.to_string();
    for rule in rules {
        out = out.replace(&rule.pattern, &rule.replacement);
    }
    out
}

/// Appends a section to the output buffer: a `# `-prefixed header, a blank
/// line, the content, and a trailing blank line of separation. Content that
/// does not end in a newline gets one so the separator stays a single blank
/// line.
pub fn push_section(buffer: &mut String, title: &str, content: &str) {
    buffer.push_str("# ");
    buffer.push_str(title);
    buffer.push_str("\n\n");
    buffer.push_str(content);
    if !buffer.ends_with('\n') {
        buffer.push('\n');
    }
    buffer.push('\n');
}
