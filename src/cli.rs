//! Command-line arguments.
//!
//! Purely declarative: [`Cli::overrides`] turns the parsed arguments into the
//! top configuration layer. Flags that were not given stay `None` so they
//! never mask the config file or environment.

use clap::Parser;
use quire_config::{OutputFormat, Overrides, PaperSize};
use std::path::PathBuf;

/// Scan documents and file them under tagged folders.
///
/// Each trailing TAG names a folder below the output directory. The scan is
/// written under the first tag; every further tag gets a link to it.
#[derive(Parser, Debug)]
#[command(name = "quire", version, about)]
pub struct Cli {
    /// Configuration file [default: the per-user config.toml].
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Select the scanner whose name contains this text.
    #[arg(short, long)]
    pub scanner: Option<String>,
    /// Require the scanner name to match exactly.
    #[arg(long)]
    pub exact: bool,
    /// List available scanners and exit.
    #[arg(long)]
    pub list: bool,
    /// Seconds to wait for scanners to appear.
    #[arg(long, value_name = "SECS")]
    pub browse_secs: Option<u64>,
    /// Seconds of scanner silence before giving up.
    #[arg(long, value_name = "SECS")]
    pub session_secs: Option<u64>,

    /// Scan from the flatbed instead of the document feeder.
    #[arg(long)]
    pub flatbed: bool,
    /// Resolution in dpi.
    #[arg(short, long, value_name = "DPI")]
    pub resolution: Option<u32>,
    /// Scan in black & white.
    #[arg(long)]
    pub mono: bool,
    /// Scan both sides of each sheet.
    #[arg(long)]
    pub duplex: bool,
    /// US Legal paper.
    #[arg(long, conflicts_with = "a4")]
    pub legal: bool,
    /// ISO A4 paper.
    #[arg(long)]
    pub a4: bool,
    /// Ask for another page after each scan.
    #[arg(long)]
    pub batch: bool,

    /// One TIFF per page instead of a PDF.
    #[arg(long, conflicts_with = "jpeg")]
    pub tiff: bool,
    /// One JPEG per page instead of a PDF.
    #[arg(long)]
    pub jpeg: bool,
    /// Output directory.
    #[arg(short, long)]
    pub dir: Option<PathBuf>,
    /// File name to use instead of scan_HHMMSS.
    #[arg(short, long)]
    pub name: Option<String>,
    /// Open the result in the default viewer.
    #[arg(long)]
    pub open: bool,

    /// Show diagnostic output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Folders to file the scan under.
    #[arg(value_name = "TAG")]
    pub tags: Vec<String>,
}

fn flag(set: bool) -> Option<bool> {
    set.then_some(true)
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        let paper = match (self.legal, self.a4) {
            (true, _) => Some(PaperSize::Legal),
            (_, true) => Some(PaperSize::A4),
            _ => None,
        };
        let format = match (self.tiff, self.jpeg) {
            (true, _) => Some(OutputFormat::Tiff),
            (_, true) => Some(OutputFormat::Jpeg),
            _ => None,
        };
        Overrides {
            scanner: self.scanner.clone(),
            exact: flag(self.exact),
            flatbed: flag(self.flatbed),
            resolution: self.resolution,
            mono: flag(self.mono),
            duplex: flag(self.duplex),
            paper,
            batch: flag(self.batch),
            format,
            dir: self.dir.clone(),
            name: self.name.clone(),
            tags: (!self.tags.is_empty()).then(|| self.tags.clone()),
            open: flag(self.open),
            list: flag(self.list),
            browse_secs: self.browse_secs,
            session_secs: self.session_secs,
            verbose: flag(self.verbose),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use rstest::rstest;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("quire").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_absent_flags_stay_unset() {
        let overrides = parse(&[]).overrides();
        assert_eq!(overrides.batch, None);
        assert_eq!(overrides.paper, None);
        assert_eq!(overrides.format, None);
        assert_eq!(overrides.tags, None);
        assert_eq!(overrides.dir, None);
    }

    #[test]
    fn test_flags_and_tags() {
        let overrides =
            parse(&["--batch", "--duplex", "-r", "300", "--dir", "/out", "--name", "taxes", "reports", "audit"])
                .overrides();
        assert_eq!(overrides.batch, Some(true));
        assert_eq!(overrides.duplex, Some(true));
        assert_eq!(overrides.mono, None);
        assert_eq!(overrides.resolution, Some(300));
        assert_eq!(overrides.dir, Some(PathBuf::from("/out")));
        assert_eq!(overrides.name.as_deref(), Some("taxes"));
        assert_eq!(overrides.tags, Some(vec!["reports".to_string(), "audit".to_string()]));
    }

    #[rstest]
    #[case(&["--legal"], Some(PaperSize::Legal), None)]
    #[case(&["--a4"], Some(PaperSize::A4), None)]
    #[case(&["--tiff"], None, Some(OutputFormat::Tiff))]
    #[case(&["--jpeg", "--a4"], Some(PaperSize::A4), Some(OutputFormat::Jpeg))]
    fn test_paper_and_format(
        #[case] args: &[&str],
        #[case] paper: Option<PaperSize>,
        #[case] format: Option<OutputFormat>,
    ) {
        let overrides = parse(args).overrides();
        assert_eq!(overrides.paper, paper);
        assert_eq!(overrides.format, format);
    }

    #[test]
    fn test_exact_without_scanner() {
        // The scanner name may come from the config file instead.
        let overrides = parse(&["--exact"]).overrides();
        assert_eq!(overrides.exact, Some(true));
        assert_eq!(overrides.scanner, None);
    }

    #[rstest]
    #[case(&["--legal", "--a4"])]
    #[case(&["--tiff", "--jpeg"])]
    fn test_rejected_combinations(#[case] args: &[&str]) {
        assert!(Cli::try_parse_from(std::iter::once("quire").chain(args.iter().copied())).is_err());
    }
}
