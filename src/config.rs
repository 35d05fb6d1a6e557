use crate::manifest::{
    CommandSpec, Section, SectionSource, SubstitutionRule, default_substitutions,
};
use crate::preflight::ToolPreflight;
use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_DESTINATION: &str = "assets/licenses.md";
const DEFAULT_THEME_LICENSES: &str = "assets/themes/LICENSES";
const DEFAULT_ICON_LICENSES: &str = "assets/icons/LICENSES";
const DEFAULT_SCAN_CONFIG: &str = "script/licenses/about.toml";
const DEFAULT_SCAN_TEMPLATE: &str = "script/licenses/template.md.hbs";
const PINNED_SCANNER_VERSION: &str = "0.6.1";

#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    pub working_dir: PathBuf,
    pub destination: PathBuf,
    pub sections: Vec<Section>,
    pub substitutions: Vec<SubstitutionRule>,
    pub command_timeout: Option<Duration>,
    pub preflight: Option<ToolPreflight>,
}

impl AggregatorConfig {
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let CliArgs {
            destination: cli_destination,
            config,
            working_dir: cli_working_dir,
            command_timeout_secs: cli_command_timeout_secs,
            skip_preflight: cli_skip_preflight,
        } = args;

        let file_config = if let Some(path) = config.as_ref() {
            load_config_file(path)?
        } else {
            PartialConfig::default()
        };

        let PartialConfig {
            working_dir: file_working_dir,
            destination: file_destination,
            sections: file_sections,
            substitutions: file_substitutions,
            command_timeout_secs: file_command_timeout_secs,
            preflight: file_preflight,
            skip_preflight: file_skip_preflight,
        } = file_config;

        let working_dir = cli_working_dir
            .or(file_working_dir)
            .unwrap_or_else(|| PathBuf::from("."));

        let destination = cli_destination
            .or(file_destination)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DESTINATION));

        let sections = file_sections.unwrap_or_else(default_sections);
        let substitutions = file_substitutions.unwrap_or_else(default_substitutions);

        let command_timeout = cli_command_timeout_secs
            .or(file_command_timeout_secs)
            .map(Duration::from_secs);

        let skip_preflight = cli_skip_preflight || file_skip_preflight.unwrap_or(false);
        let preflight = if skip_preflight {
            None
        } else {
            file_preflight.or_else(|| Some(default_preflight()))
        };

        Ok(Self {
            working_dir,
            destination,
            sections,
            substitutions,
            command_timeout,
            preflight,
        })
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            !self.sections.is_empty(),
            "at least one manifest section must be configured"
        );
        for section in &self.sections {
            anyhow::ensure!(
                !section.title.trim().is_empty(),
                "section titles cannot be empty"
            );
            if let SectionSource::Command(spec) = &section.source {
                anyhow::ensure!(
                    !spec.program.trim().is_empty(),
                    "section '{}' names an empty program",
                    section.title
                );
            }
        }
        for rule in &self.substitutions {
            anyhow::ensure!(
                !rule.pattern.is_empty(),
                "substitution patterns cannot be empty"
            );
        }
        anyhow::ensure!(
            self.destination.file_name().is_some(),
            "destination {:?} has no file name",
            self.destination
        );
        Ok(())
    }

    pub fn resolve_path<P: AsRef<Path>>(&self, relative: P) -> PathBuf {
        let relative = relative.as_ref();
        if relative.is_absolute() {
            relative.to_path_buf()
        } else {
            self.working_dir.join(relative)
        }
    }
}

/// The layout the original release tooling used: two bundled-asset license
/// files followed by a third-party scan emitted by cargo-about.
fn default_sections() -> Vec<Section> {
    vec![
        Section::file("THEME LICENSES", DEFAULT_THEME_LICENSES),
        Section::file("ICON LICENSES", DEFAULT_ICON_LICENSES),
        Section::command(
            "CODE LICENSES",
            CommandSpec::new(
                "cargo",
                [
                    "about",
                    "generate",
                    "--fail",
                    "-c",
                    DEFAULT_SCAN_CONFIG,
                    DEFAULT_SCAN_TEMPLATE,
                ],
            ),
        ),
    ]
}

fn default_preflight() -> ToolPreflight {
    ToolPreflight {
        program: "cargo".to_string(),
        version_args: vec!["about".to_string(), "--version".to_string()],
        expected: format!("cargo-about {PINNED_SCANNER_VERSION}"),
        install: Some(CommandSpec::new(
            "cargo",
            [
                "install",
                "cargo-about",
                "--locked",
                "--version",
                PINNED_SCANNER_VERSION,
            ],
        )),
    }
}

#[derive(Parser, Debug, Default, Clone)]
#[command(
    name = "license-manifest",
    about = "Aggregates bundled and third-party license texts into a single Markdown manifest",
    version
)]
pub struct CliArgs {
    #[arg(
        value_name = "FILE",
        help = "Destination path for the generated manifest"
    )]
    pub destination: Option<PathBuf>,

    #[arg(
        long,
        value_name = "FILE",
        help = "Path to a manifest layout file (YAML or JSON)"
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        env = "LICENSE_MANIFEST_WORKING_DIR",
        value_name = "DIR",
        help = "Directory relative asset paths and commands resolve against"
    )]
    pub working_dir: Option<PathBuf>,

    #[arg(
        long,
        env = "LICENSE_MANIFEST_COMMAND_TIMEOUT_SECS",
        value_name = "SECS",
        help = "Deadline applied to each external command invocation",
        value_parser = clap::value_parser!(u64)
    )]
    pub command_timeout_secs: Option<u64>,

    #[arg(
        long,
        env = "LICENSE_MANIFEST_SKIP_PREFLIGHT",
        help = "Skip the external tool version preflight"
    )]
    pub skip_preflight: bool,
}

#[derive(Debug, Default, Deserialize)]
struct PartialConfig {
    working_dir: Option<PathBuf>,
    destination: Option<PathBuf>,
    sections: Option<Vec<Section>>,
    substitutions: Option<Vec<SubstitutionRule>>,
    command_timeout_secs: Option<u64>,
    preflight: Option<ToolPreflight>,
    skip_preflight: Option<bool>,
}

fn load_config_file(path: &Path) -> Result<PartialConfig> {
    if !path.exists() {
        anyhow::bail!("config file {:?} does not exist", path);
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {:?}", path))?;
    let ext = path
        .extension()
        .and_then(|os| os.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let parsed = match ext.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse YAML config {:?}", path))?,
        "json" => serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse JSON config {:?}", path))?,
        other => anyhow::bail!("unsupported config extension: {other}"),
    };
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_mirror_the_release_layout() {
        let config = AggregatorConfig::from_args(CliArgs::default()).expect("defaults resolve");
        assert_eq!(config.destination, PathBuf::from(DEFAULT_DESTINATION));
        assert_eq!(config.sections.len(), 3);
        assert_eq!(config.sections[0].title, "THEME LICENSES");
        assert_eq!(config.sections[2].title, "CODE LICENSES");
        assert_eq!(config.substitutions.len(), 6);
        assert!(config.command_timeout.is_none());
        let preflight = config.preflight.as_ref().expect("default preflight present");
        assert_eq!(preflight.expected, "cargo-about 0.6.1");
        assert!(preflight.install.is_some());
        config.validate().expect("defaults validate");
    }

    #[test]
    fn positional_destination_overrides_default() {
        let args = CliArgs {
            destination: Some(PathBuf::from("out/licenses.md")),
            ..CliArgs::default()
        };
        let config = AggregatorConfig::from_args(args).expect("resolve");
        assert_eq!(config.destination, PathBuf::from("out/licenses.md"));
    }

    #[test]
    fn skip_preflight_drops_the_preflight_step() {
        let args = CliArgs {
            skip_preflight: true,
            ..CliArgs::default()
        };
        let config = AggregatorConfig::from_args(args).expect("resolve");
        assert!(config.preflight.is_none());
    }

    #[test]
    fn resolve_path_honors_absolute_paths() {
        let config = AggregatorConfig::from_args(CliArgs::default()).expect("resolve");
        assert_eq!(
            config.resolve_path("/etc/hosts"),
            PathBuf::from("/etc/hosts")
        );
        assert_eq!(
            config.resolve_path("assets/licenses.md"),
            PathBuf::from("./assets/licenses.md")
        );
    }

    #[test]
    fn validate_rejects_empty_substitution_pattern() {
        let mut config = AggregatorConfig::from_args(CliArgs::default()).expect("resolve");
        config.substitutions.push(SubstitutionRule::new("", "x"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_section_list() {
        let mut config = AggregatorConfig::from_args(CliArgs::default()).expect("resolve");
        config.sections.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn unsupported_config_extension_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("layout.toml");
        fs::write(&path, "sections: []").expect("write config");
        let err = load_config_file(&path).unwrap_err();
        assert!(err.to_string().contains("unsupported config extension"));
    }
}
