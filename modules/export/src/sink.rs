use pg_session::Result;
use std::fs::{File, Permissions};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Output file that only appears at its destination once committed.
/// Dropping it uncommitted removes the partial data.
/// A new file gets the mode `File::create` would give it; an overwritten
/// file keeps its current permissions.
pub struct AtomicFile {
    dest: PathBuf,
    tmp: NamedTempFile,
    keep: Option<Permissions>,
}

impl AtomicFile {
    pub fn create(dest: &Path) -> Result<Self> {
        let dir = match dest.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;
        let keep = std::fs::metadata(dest).ok().map(|m| m.permissions());
        let mut builder = tempfile::Builder::new();
        builder.prefix(".pgcsv-").suffix(".partial");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            // 0o666 less the umask, same as File::create.
            builder.permissions(Permissions::from_mode(0o666));
        }
        let tmp = builder.tempfile_in(dir)?;
        Ok(AtomicFile { dest: dest.to_path_buf(), tmp, keep })
    }

    pub fn file(&mut self) -> &mut File {
        self.tmp.as_file_mut()
    }

    pub fn commit(self) -> Result<PathBuf> {
        if let Some(perms) = self.keep {
            self.tmp.as_file().set_permissions(perms)?;
        }
        self.tmp.as_file().sync_all()?;
        self.tmp.persist(&self.dest).map_err(|e| e.error)?;
        Ok(self.dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn commit_moves_file_into_place() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("nested/out.csv");
        let mut f = AtomicFile::create(&dest).unwrap();
        f.file().write_all(b"id\n1\n").unwrap();
        assert!(!dest.exists());
        f.commit().unwrap();
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "id\n1\n");
    }

    #[test]
    fn uncommitted_file_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.csv");
        {
            let mut f = AtomicFile::create(&dest).unwrap();
            f.file().write_all(b"partial").unwrap();
        }
        assert!(!dest.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn commit_overwrites_existing_output() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.csv");
        std::fs::write(&dest, "old").unwrap();
        let mut f = AtomicFile::create(&dest).unwrap();
        f.file().write_all(b"new").unwrap();
        f.commit().unwrap();
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "new");
    }

    #[cfg(unix)]
    #[test]
    fn new_output_gets_default_file_mode() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("plain.csv");
        File::create(&plain).unwrap();
        let dest = dir.path().join("out.csv");
        AtomicFile::create(&dest).unwrap().commit().unwrap();
        let mode = |p: &Path| std::fs::metadata(p).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(&dest), mode(&plain));
    }

    #[cfg(unix)]
    #[test]
    fn overwrite_keeps_existing_mode() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.csv");
        std::fs::write(&dest, "old").unwrap();
        std::fs::set_permissions(&dest, Permissions::from_mode(0o644)).unwrap();
        let mut f = AtomicFile::create(&dest).unwrap();
        f.file().write_all(b"new").unwrap();
        f.commit().unwrap();
        assert_eq!(std::fs::metadata(&dest).unwrap().permissions().mode() & 0o777, 0o644);

        std::fs::set_permissions(&dest, Permissions::from_mode(0o640)).unwrap();
        AtomicFile::create(&dest).unwrap().commit().unwrap();
        assert_eq!(std::fs::metadata(&dest).unwrap().permissions().mode() & 0o777, 0o640);
    }
}
