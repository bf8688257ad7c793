//! Zip extraction for release assets

use crate::error::{InstallerError, IoContext, Result};
use std::path::Path;
use std::sync::Arc;

/// Called before each entry is written with the entry name, its 1-based
/// position and the number of entries in the archive
pub type UnpackProgress = Arc<dyn Fn(&str, usize, usize) + Send + Sync>;

/// Extract every entry of `archive` below `dest`.
///
/// Directories are created on demand. The first unreadable entry aborts with
/// `ArchiveRead`; files written before it stay in place and a re-run
/// overwrites them. Returns the number of entries processed.
pub fn unpack_archive_to(
    archive: &Path,
    dest: &Path,
    progress: Option<UnpackProgress>,
) -> Result<usize> {
    let file = std::fs::File::open(archive).io_context("Failed to open archive", archive)?;
    let mut zip = zip::ZipArchive::new(file)
        .map_err(|e| InstallerError::ArchiveRead(format!("{}: {}", archive.display(), e)))?;

    std::fs::create_dir_all(dest).io_context("Failed to create directory", dest)?;

    let total = zip.len();
    for i in 0..total {
        let mut entry = zip
            .by_index(i)
            .map_err(|e| InstallerError::ArchiveRead(format!("entry {}: {}", i, e)))?;
        let entry_name = entry.name().to_string();
        let relative = sanitize_path(&entry_name);
        if relative.is_empty() {
            continue;
        }
        let outpath = dest.join(&relative);

        if let Some(progress) = &progress {
            progress(&entry_name, i + 1, total);
        }

        if entry.is_dir() {
            std::fs::create_dir_all(&outpath).io_context("Failed to create directory", &outpath)?;
        } else {
            if let Some(parent) = outpath.parent() {
                std::fs::create_dir_all(parent).io_context("Failed to create directory", parent)?;
            }
            let mut outfile =
                std::fs::File::create(&outpath).io_context("Failed to create file", &outpath)?;
            std::io::copy(&mut entry, &mut outfile)
                .map_err(|e| InstallerError::ArchiveRead(format!("{}: {}", entry_name, e)))?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Some(mode) = entry.unix_mode() {
                    std::fs::set_permissions(&outpath, std::fs::Permissions::from_mode(mode))
                        .io_context("Failed to set permissions", &outpath)?;
                }
            }
        }
    }

    tracing::debug!(
        "Unpacked {} entries from {} into {}",
        total,
        archive.display(),
        dest.display()
    );
    Ok(total)
}

/// Sanitize path to prevent directory traversal
fn sanitize_path(path: &str) -> String {
    path.replace('\\', "/")
        .split('/')
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Build a zip with the given (name, contents) entries. Names ending in
    /// `/` become directories.
    pub(crate) fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let file = std::fs::File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        for (name, contents) in entries {
            if name.ends_with('/') {
                zip.add_directory(*name, options).unwrap();
            } else {
                zip.start_file(*name, options).unwrap();
                zip.write_all(contents.as_bytes()).unwrap();
            }
        }
        zip.finish().unwrap();
    }

    /// Single-entry zip whose file is marked executable
    pub(crate) fn write_executable_zip(path: &Path, name: &str, contents: &str) {
        let file = std::fs::File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default().unix_permissions(0o755);
        zip.start_file(name, options).unwrap();
        zip.write_all(contents.as_bytes()).unwrap();
        zip.finish().unwrap();
    }

    #[test]
    fn test_unpack_creates_nested_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("loader.zip");
        write_zip(
            &archive,
            &[
                ("Geode.dll", "dll"),
                ("geode/", ""),
                ("geode/resources/deep/file.txt", "hello"),
            ],
        );

        let dest = tmp.path().join("out/target");
        let count = unpack_archive_to(&archive, &dest, None).unwrap();
        assert_eq!(count, 3);
        assert_eq!(std::fs::read_to_string(dest.join("Geode.dll")).unwrap(), "dll");
        assert_eq!(
            std::fs::read_to_string(dest.join("geode/resources/deep/file.txt")).unwrap(),
            "hello"
        );
    }

    #[test]
    fn test_unpack_reports_progress() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("a.zip");
        write_zip(&archive, &[("a.txt", "a"), ("b.txt", "b")]);

        let seen = Arc::new(AtomicUsize::new(0));
        let seen_cb = seen.clone();
        let cb: UnpackProgress = Arc::new(move |_entry: &str, done, total| {
            assert_eq!(total, 2);
            seen_cb.store(done, Ordering::SeqCst);
        });
        unpack_archive_to(&archive, &tmp.path().join("out"), Some(cb)).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_corrupt_archive_is_archive_error() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("broken.zip");
        std::fs::write(&archive, b"definitely not a zip").unwrap();

        let err = unpack_archive_to(&archive, &tmp.path().join("out"), None).unwrap_err();
        assert!(matches!(err, InstallerError::ArchiveRead(_)));
    }

    #[test]
    fn test_missing_archive_is_io_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err =
            unpack_archive_to(&tmp.path().join("nope.zip"), tmp.path(), None).unwrap_err();
        assert!(matches!(err, InstallerError::Io { .. }));
    }

    #[test]
    fn test_sanitize_path() {
        assert_eq!(sanitize_path("geode/mods/x.geode"), "geode/mods/x.geode");
        assert_eq!(sanitize_path("geode\\mods\\x.geode"), "geode/mods/x.geode");
        assert_eq!(sanitize_path("../../../etc/passwd"), "etc/passwd");
        assert_eq!(sanitize_path("./foo/./bar"), "foo/bar");
    }
}
