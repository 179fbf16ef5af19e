//! Writing the finished PDF into the user's Downloads directory.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::InvoiceError;

/// Which convention to use when locating Downloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// `%USERPROFILE%\Downloads`
    Windows,
    /// `<home>/Downloads`
    Posix,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Posix
        }
    }
}

/// Locate the Downloads directory for `platform`.
///
/// `env` looks up environment variables and `home` returns the home
/// directory; both are injected so every branch can be exercised.
pub fn resolve_downloads_dir(
    platform: Platform,
    env: impl Fn(&str) -> Option<OsString>,
    home: impl Fn() -> Option<PathBuf>,
) -> Result<PathBuf, InvoiceError> {
    let base = match platform {
        Platform::Windows => env("USERPROFILE")
            .filter(|profile| !profile.is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| InvoiceError::FileSystem {
                message: "USERPROFILE is not set; cannot locate the Downloads folder".into(),
                source: None,
            })?,
        Platform::Posix => home().ok_or_else(|| InvoiceError::FileSystem {
            message: "home directory could not be determined".into(),
            source: None,
        })?,
    };
    Ok(base.join("Downloads"))
}

/// Downloads directory of the current user on the current platform.
pub fn downloads_dir() -> Result<PathBuf, InvoiceError> {
    resolve_downloads_dir(Platform::current(), |key| std::env::var_os(key), dirs::home_dir)
}

pub fn invoice_filename(order_number: &str) -> String {
    format!("invoice_{order_number}.pdf")
}

/// Write `bytes` as `invoice_<order_number>.pdf` inside `dir` and return the
/// absolute path of the file.
///
/// `dir` must already exist. The PDF is written to a hidden sibling first and
/// renamed into place, so a failed write never leaves a truncated invoice.
pub fn write_invoice(dir: &Path, order_number: &str, bytes: &[u8]) -> Result<PathBuf, InvoiceError> {
    if !dir.is_dir() {
        return Err(InvoiceError::FileSystem {
            message: format!("output directory '{}' does not exist", dir.display()),
            source: None,
        });
    }

    let filename = invoice_filename(order_number);
    let target = dir.join(&filename);
    let tmp_path = dir.join(format!(".{filename}.part"));

    let written = fs::write(&tmp_path, bytes).and_then(|()| fs::rename(&tmp_path, &target));
    if let Err(e) = written {
        // Best effort; the original error is the one worth reporting.
        let _ = fs::remove_file(&tmp_path);
        return Err(InvoiceError::file_system(
            format!("failed to write '{}'", target.display()),
            e,
        ));
    }

    let path = std::path::absolute(&target).map_err(|e| {
        InvoiceError::file_system(format!("failed to resolve '{}'", target.display()), e)
    })?;
    log::info!("wrote {} bytes to {}", bytes.len(), path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<OsString> {
        None
    }

    #[test]
    fn filename_uses_order_number() {
        assert_eq!(invoice_filename("INV-1001"), "invoice_INV-1001.pdf");
    }

    #[test]
    fn windows_uses_userprofile() {
        let dir = resolve_downloads_dir(
            Platform::Windows,
            |key| (key == "USERPROFILE").then(|| OsString::from("C:\\Users\\jo")),
            || None,
        )
        .unwrap();
        assert_eq!(dir, PathBuf::from("C:\\Users\\jo").join("Downloads"));
    }

    #[test]
    fn windows_without_userprofile_fails() {
        let err = resolve_downloads_dir(Platform::Windows, no_env, || Some("/home/jo".into()))
            .unwrap_err();
        assert!(matches!(err, InvoiceError::FileSystem { .. }));
        assert_eq!(err.stage(), "output");

        let err = resolve_downloads_dir(Platform::Windows, |_| Some(OsString::new()), || None)
            .unwrap_err();
        assert!(matches!(err, InvoiceError::FileSystem { .. }));
    }

    #[test]
    fn posix_uses_home() {
        let dir = resolve_downloads_dir(Platform::Posix, no_env, || Some("/home/jo".into())).unwrap();
        assert_eq!(dir, PathBuf::from("/home/jo/Downloads"));

        let err = resolve_downloads_dir(Platform::Posix, no_env, || None).unwrap_err();
        assert!(matches!(err, InvoiceError::FileSystem { .. }));
    }

    #[test]
    fn writes_file_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_invoice(dir.path(), "INV-1001", b"%PDF-1.7 test").unwrap();

        assert!(path.is_absolute());
        assert_eq!(path, dir.path().join("invoice_INV-1001.pdf"));
        assert_eq!(fs::read(&path).unwrap(), b"%PDF-1.7 test");

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![OsString::from("invoice_INV-1001.pdf")]);
    }

    #[test]
    fn overwrites_existing_invoice() {
        let dir = tempfile::tempdir().unwrap();
        write_invoice(dir.path(), "A-1", b"old").unwrap();
        let path = write_invoice(dir.path(), "A-1", b"new").unwrap();
        assert_eq!(fs::read(path).unwrap(), b"new");
    }

    #[test]
    fn missing_directory_is_not_created() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("Downloads");
        let err = write_invoice(&missing, "INV-1001", b"x").unwrap_err();
        assert!(matches!(err, InvoiceError::FileSystem { .. }));
        assert!(!missing.exists());
    }

    #[test]
    fn failed_rename_cleans_up_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        // A directory squatting on the target name makes the rename fail.
        fs::create_dir(dir.path().join("invoice_X.pdf")).unwrap();
        fs::write(dir.path().join("invoice_X.pdf").join("keep"), b"").unwrap();

        let err = write_invoice(dir.path(), "X", b"pdf").unwrap_err();
        assert!(matches!(err, InvoiceError::FileSystem { .. }));
        assert!(!dir.path().join(".invoice_X.pdf.part").exists());
    }
}
