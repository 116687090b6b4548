use crate::error::{ErrorKind, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Paper size requested from a document feeder.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaperSize {
    /// US Letter (8.5 × 11 in)
    #[default]
    Letter,
    /// US Legal (8.5 × 14 in)
    Legal,
    /// ISO A4 (210 × 297 mm)
    A4,
}

/// Format of the files written to the output directory.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// All pages combined into a single multi-page document.
    #[default]
    Pdf,
    /// One TIFF file per page.
    Tiff,
    /// One JPEG file per page.
    Jpeg,
}
impl OutputFormat {
    /// File extension (without the leading dot) for files of this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Tiff => "tif",
            Self::Jpeg => "jpg",
        }
    }

    /// Whether the pages must be merged into one document before writing.
    pub fn is_merged(&self) -> bool {
        matches!(self, Self::Pdf)
    }
}

/// A directory of page images exposed as a scanner.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderDevice {
    pub name: String,
    pub path: PathBuf,
    /// Deliver pages as raster bands instead of files.
    #[serde(default)]
    pub memory: bool,
}

/// The complete, validated option set for one invocation.
///
/// Boolean options have presence semantics: a flag that was never given is
/// `false`. Construct through [`load`](crate::load) (which validates) or
/// build one directly in tests and call [`validate`](Self::validate).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Case-insensitive substring used to select a device by name.
    pub scanner: Option<String>,
    /// Require the device name to equal `scanner` instead of containing it.
    pub exact: bool,
    /// Use the flatbed instead of the document feeder.
    pub flatbed: bool,
    /// Requested resolution in dpi. The transfer mode picks a default.
    pub resolution: Option<u32>,
    /// Scan 1-bit black & white instead of 8-bit RGB.
    pub mono: bool,
    /// Scan both sides of each sheet (feeder only).
    pub duplex: bool,
    pub paper: PaperSize,
    /// Prompt for another page after each completed scan.
    pub batch: bool,
    pub format: OutputFormat,
    /// Root of the output tree.
    pub dir: PathBuf,
    /// File stem override; defaults to `scan_HHMMSS`.
    pub name: Option<String>,
    /// Ordered tags: the first is the primary location, the rest are aliases.
    pub tags: Vec<String>,
    /// Open the primary output in the default viewer once written.
    pub open: bool,
    /// Only list discovered devices, never scan.
    pub list: bool,
    pub browse_secs: u64,
    /// Maximum silence from the device before the session is abandoned.
    pub session_secs: u64,
    pub verbose: bool,
    pub devices: Vec<FolderDevice>,
}
impl Default for Configuration {
    fn default() -> Self {
        Self {
            scanner: None,
            exact: false,
            flatbed: false,
            resolution: None,
            mono: false,
            duplex: false,
            paper: PaperSize::default(),
            batch: false,
            format: OutputFormat::default(),
            dir: PathBuf::new(),
            name: None,
            tags: Vec::new(),
            open: false,
            list: false,
            browse_secs: 10,
            session_secs: 120,
            verbose: false,
            devices: Vec::new(),
        }
    }
}
impl Configuration {
    pub fn browse_timeout(&self) -> Duration {
        Duration::from_secs(self.browse_secs)
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_secs)
    }

    /// The primary tag, if any tags were given.
    pub fn primary_tag(&self) -> Option<&str> {
        self.tags.first().map(String::as_str)
    }

    /// Tags after the first; each one becomes an alias of the primary output.
    pub fn alias_tags(&self) -> &[String] {
        self.tags.get(1..).unwrap_or_default()
    }

    /// Checks the invariants downstream components rely on.
    ///
    /// Listing devices needs no output directory, so `dir` is only required
    /// when `list` is not set.
    pub fn validate(&self) -> Result<()> {
        if !self.list && self.dir.as_os_str().is_empty() {
            exn::bail!(ErrorKind::MissingDirectory);
        }
        if self.browse_secs == 0 {
            exn::bail!(ErrorKind::InvalidValue("browse_secs", "must be at least one second".to_string()));
        }
        if self.session_secs == 0 {
            exn::bail!(ErrorKind::InvalidValue("session_secs", "must be at least one second".to_string()));
        }
        if self.resolution == Some(0) {
            exn::bail!(ErrorKind::InvalidValue("resolution", "must be greater than zero".to_string()));
        }
        if let Some(scanner) = &self.scanner
            && scanner.trim().is_empty()
        {
            exn::bail!(ErrorKind::InvalidValue("scanner", "must not be blank".to_string()));
        }
        for tag in &self.tags {
            validate_segment("tags", tag)?;
        }
        if let Some(name) = &self.name {
            validate_segment("name", name)?;
        }
        Ok(())
    }
}

/// Ensures a value can be used as exactly one path component.
///
/// Tags become directory names and names become file stems, so neither may
/// be empty, traverse upwards, or smuggle in a separator.
pub fn validate_segment(field: &'static str, value: &str) -> Result<()> {
    let invalid = value.trim().is_empty()
        || value == "."
        || value == ".."
        || value.contains(['/', '\\', '\0']);
    if invalid {
        exn::bail!(ErrorKind::InvalidValue(field, format!("`{value}` is not a single path segment")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn valid() -> Configuration {
        Configuration { dir: PathBuf::from("/out"), ..Default::default() }
    }

    #[test]
    fn test_defaults() {
        let config = Configuration::default();
        assert_eq!(config.browse_timeout(), Duration::from_secs(10));
        assert_eq!(config.paper, PaperSize::Letter);
        assert_eq!(config.format, OutputFormat::Pdf);
        assert!(config.format.is_merged());
    }

    #[test]
    fn test_requires_directory_unless_listing() {
        let mut config = Configuration::default();
        let err = config.validate().unwrap_err();
        assert_eq!(*err, ErrorKind::MissingDirectory);
        config.list = true;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_tag_split() {
        let config = Configuration { tags: vec!["reports".into(), "audit".into(), "tax".into()], ..valid() };
        assert_eq!(config.primary_tag(), Some("reports"));
        assert_eq!(config.alias_tags(), ["audit".to_string(), "tax".to_string()]);
        let untagged = valid();
        assert_eq!(untagged.primary_tag(), None);
        assert!(untagged.alias_tags().is_empty());
    }

    #[rstest]
    #[case("")]
    #[case("  ")]
    #[case(".")]
    #[case("..")]
    #[case("a/b")]
    #[case("a\\b")]
    fn test_rejects_bad_tags(#[case] tag: &str) {
        let config = Configuration { tags: vec!["fine".into(), tag.to_string()], ..valid() };
        assert!(matches!(*config.validate().unwrap_err(), ErrorKind::InvalidValue("tags", _)));
    }

    #[test]
    fn test_rejects_zero_values() {
        assert!(Configuration { browse_secs: 0, ..valid() }.validate().is_err());
        assert!(Configuration { session_secs: 0, ..valid() }.validate().is_err());
        assert!(Configuration { resolution: Some(0), ..valid() }.validate().is_err());
        assert!(Configuration { resolution: Some(300), ..valid() }.validate().is_ok());
    }

    #[rstest]
    #[case(OutputFormat::Pdf, "pdf")]
    #[case(OutputFormat::Tiff, "tif")]
    #[case(OutputFormat::Jpeg, "jpg")]
    fn test_extensions(#[case] format: OutputFormat, #[case] ext: &str) {
        assert_eq!(format.extension(), ext);
    }
}
