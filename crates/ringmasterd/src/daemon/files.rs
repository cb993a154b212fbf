use std::io::{self, Write};
use std::path::Path;

use tempfile::Builder;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Replaces `path` with `contents` through a rename.
///
/// The payload is fsync'd before the rename so a reader polling the health
/// file never sees a half-written snapshot.
pub(super) fn atomic_write(path: &Path, contents: &[u8]) -> io::Result<()> {
    let directory = path.parent().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            "target path did not have a parent directory",
        )
    })?;

    let mut builder = Builder::new();
    builder.prefix(
        path.file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("ringmasterd"),
    );
    #[cfg(unix)]
    {
        use std::fs::Permissions;
        builder.permissions(Permissions::from_mode(0o600));
    }

    let mut file = builder.tempfile_in(directory)?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|error| error.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn replaces_existing_contents() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("ringmasterd.health");
        fs::write(&path, b"old").expect("seed file");

        atomic_write(&path, b"{\"status\":\"ready\"}\n").expect("atomic write");

        let contents = fs::read_to_string(&path).expect("read back");
        assert_eq!(contents, "{\"status\":\"ready\"}\n");
        let leftovers = fs::read_dir(dir.path()).expect("list dir").count();
        assert_eq!(leftovers, 1, "temporary file should be renamed away");
    }
}
