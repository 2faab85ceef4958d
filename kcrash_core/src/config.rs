use serde::Deserialize;
use std::path::Path;

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct ReporterConfig {
    /// `os/vmarch[/arch]`; overrides the target given on the command line.
    #[serde(default)]
    pub target: Option<String>,
    /// Title regexes of crashes to skip entirely.
    #[serde(default)]
    pub ignores: Vec<String>,
    /// Extra benign signatures, matched like the built-in ones.
    #[serde(default)]
    pub suppressions: Vec<String>,
    #[serde(default = "default_max_report_lines")]
    pub max_report_lines: usize,
}

pub fn default_max_report_lines() -> usize {
    1000
}

impl ReporterConfig {
    pub fn load_from_file(path: &Path) -> Result<Self, anyhow::Error> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file at {:?}: {}", path, e))?;

        let config: ReporterConfig = toml::from_str(&content).map_err(|e| {
            anyhow::anyhow!("Failed to parse TOML from config file {:?}: {}", path, e)
        })?;

        if config.max_report_lines == 0 {
            anyhow::bail!("max-report-lines in {:?} must be at least 1", path);
        }
        Ok(config)
    }
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            target: None,
            ignores: Vec::new(),
            suppressions: Vec::new(),
            max_report_lines: default_max_report_lines(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(content.as_bytes())
            .expect("Failed to write temp config");
        file
    }

    #[test]
    fn full_config_parses() {
        let file = write_config(
            r#"
target = "linux/arm64"
ignores = ["^WARNING in foo$"]
suppressions = ["my benign thing"]
max-report-lines = 200
"#,
        );
        let config = ReporterConfig::load_from_file(file.path()).expect("valid config");
        assert_eq!(config.target.as_deref(), Some("linux/arm64"));
        assert_eq!(config.ignores, vec!["^WARNING in foo$".to_string()]);
        assert_eq!(config.suppressions, vec!["my benign thing".to_string()]);
        assert_eq!(config.max_report_lines, 200);
    }

    #[test]
    fn empty_config_uses_defaults() {
        let file = write_config("");
        let config = ReporterConfig::load_from_file(file.path()).expect("empty config is valid");
        assert_eq!(config, ReporterConfig::default());
        assert_eq!(config.max_report_lines, 1000);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let file = write_config("http = \"127.0.0.1:56741\"\n");
        let err = ReporterConfig::load_from_file(file.path())
            .expect_err("unknown keys must not be silently ignored");
        assert!(
            err.to_string().contains("Failed to parse TOML"),
            "Unexpected error: {err}"
        );
    }

    #[test]
    fn zero_line_cap_is_rejected() {
        let file = write_config("max-report-lines = 0\n");
        assert!(ReporterConfig::load_from_file(file.path()).is_err());
    }

    #[test]
    fn missing_file_reports_path() {
        let err = ReporterConfig::load_from_file(Path::new("/nonexistent/kcrash.toml"))
            .expect_err("missing file");
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
