use crate::error::{ErrorKind, Result};
use crate::model::{Configuration, OutputFormat, PaperSize};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::Serialize;
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "QUIRE_";

/// Values given explicitly on the command line.
///
/// Every field is optional; only the ones that are `Some` override the
/// lower layers. Boolean flags should be set to `Some(true)` when present and
/// left as `None` otherwise, so that an absent flag never masks a value from
/// the config file.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Overrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scanner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exact: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flatbed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mono: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplex: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paper: Option<PaperSize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<OutputFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browse_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verbose: Option<bool>,
}

/// Location of the per-user configuration file, if the platform has one.
pub fn default_config_file() -> Option<PathBuf> {
    ProjectDirs::from("", "", "quire").map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Builds and validates the [`Configuration`].
///
/// Layers, lowest priority first:
/// 1. built-in defaults,
/// 2. the TOML file at `file` (or [`default_config_file`]); a missing file is
///    not an error,
/// 3. `QUIRE_*` environment variables,
/// 4. command-line `overrides`.
pub fn load(file: Option<&Path>, overrides: &Overrides) -> Result<Configuration> {
    let file = file.map(Path::to_path_buf).or_else(default_config_file);
    let config: Configuration = figment(file.as_deref(), overrides).extract().or_raise(|| ErrorKind::Load)?;
    config.validate()?;
    tracing::debug!(file = ?file, tags = config.tags.len(), "Configuration loaded");
    Ok(config)
}

fn figment(file: Option<&Path>, overrides: &Overrides) -> Figment {
    let mut figment = Figment::from(Serialized::defaults(Configuration::default()));
    if let Some(file) = file {
        figment = figment.merge(Toml::file(file));
    }
    figment.merge(Env::prefixed(ENV_PREFIX)).merge(Serialized::defaults(overrides))
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_layers_in_priority_order() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "quire.toml",
                r#"
                    dir = "/from/file"
                    resolution = 300
                    tags = ["reports", "audit"]

                    [[devices]]
                    name = "Desk Scanner"
                    path = "/srv/pages"
                "#,
            )?;
            jail.set_env("QUIRE_RESOLUTION", "600");
            let overrides = Overrides { dir: Some("/from/cli".into()), ..Default::default() };
            let config = load(Some(Path::new("quire.toml")), &overrides).unwrap();
            assert_eq!(config.dir, PathBuf::from("/from/cli"));
            assert_eq!(config.resolution, Some(600));
            assert_eq!(config.tags, ["reports", "audit"]);
            assert_eq!(config.devices.len(), 1);
            assert_eq!(config.devices[0].name, "Desk Scanner");
            Ok(())
        });
    }

    #[test]
    fn test_absent_flags_do_not_mask_file() {
        Jail::expect_with(|jail| {
            jail.create_file("quire.toml", "dir = \"/out\"\nbatch = true\nformat = \"tiff\"\npaper = \"a4\"")?;
            let config = load(Some(Path::new("quire.toml")), &Overrides::default()).unwrap();
            assert!(config.batch);
            assert_eq!(config.format, OutputFormat::Tiff);
            assert_eq!(config.paper, PaperSize::A4);
            Ok(())
        });
    }

    #[test]
    fn test_exact_flag_applies_to_scanner_from_file() {
        Jail::expect_with(|jail| {
            jail.create_file("quire.toml", "dir = \"/out\"\nscanner = \"EPSON Perfection V39\"")?;
            let overrides = Overrides { exact: Some(true), ..Default::default() };
            let config = load(Some(Path::new("quire.toml")), &overrides).unwrap();
            assert_eq!(config.scanner.as_deref(), Some("EPSON Perfection V39"));
            assert!(config.exact);
            Ok(())
        });
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        Jail::expect_with(|_jail| {
            let overrides = Overrides { dir: Some("/out".into()), ..Default::default() };
            let config = load(Some(Path::new("does-not-exist.toml")), &overrides).unwrap();
            assert_eq!(config.browse_secs, 10);
            assert!(config.tags.is_empty());
            Ok(())
        });
    }

    #[test]
    fn test_validation_runs_after_merge() {
        Jail::expect_with(|_jail| {
            let overrides = Overrides { tags: Some(vec!["../escape".into()]), dir: Some("/out".into()), ..Default::default() };
            let err = load(Some(Path::new("none.toml")), &overrides).unwrap_err();
            assert!(matches!(*err, ErrorKind::InvalidValue("tags", _)));
            Ok(())
        });
    }

    #[test]
    fn test_malformed_file() {
        Jail::expect_with(|jail| {
            jail.create_file("quire.toml", "resolution = \"lots\"")?;
            let err = load(Some(Path::new("quire.toml")), &Overrides::default()).unwrap_err();
            assert_eq!(*err, ErrorKind::Load);
            Ok(())
        });
    }
}
