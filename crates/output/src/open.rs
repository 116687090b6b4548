use std::path::{Path, PathBuf};
use std::process::Command;

/// A program that opens files in the user's preferred application.
enum Opener {
    /// Takes the file as its only argument.
    Direct(PathBuf),
    /// GIO needs the `open` subcommand.
    Gio(PathBuf),
}
impl Opener {
    fn discover() -> Option<Self> {
        // TODO: Windows has no opener executable; `cmd /C start` needs quoting care.
        for exe in ["xdg-open", "open"] {
            if let Ok(path) = which::which(exe) {
                return Some(Self::Direct(path));
            }
        }
        which::which("gio").ok().map(Self::Gio)
    }

    fn command(&self, file: &Path) -> Command {
        match self {
            Self::Direct(path) => {
                let mut command = Command::new(path);
                command.arg(file);
                command
            },
            Self::Gio(path) => {
                let mut command = Command::new(path);
                command.arg("open").arg(file);
                command
            },
        }
    }

    /// Launches a viewer per file and returns how many launched.
    fn open_each<'a>(&self, files: impl IntoIterator<Item = &'a Path>) -> usize {
        files
            .into_iter()
            .filter(|file| match self.command(file).spawn() {
                Ok(_) => true,
                Err(e) => {
                    tracing::warn!(error = %e, path = %file.display(), "Could not open output in viewer");
                    false
                },
            })
            .count()
    }
}

/// Opens each of `files` in the default viewer without waiting for it.
///
/// Failing to open is never an error for the caller; the files have already
/// been written.
pub(crate) fn open_in_viewer<'a>(files: impl IntoIterator<Item = &'a Path>) {
    let Some(opener) = Opener::discover() else {
        tracing::warn!("No program found to open files with; tried xdg-open, open and gio");
        return;
    };
    let launched = opener.open_each(files);
    tracing::debug!(launched, "Opened outputs in viewer");
}
