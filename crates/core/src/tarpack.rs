//! Tar+gzip packing and hardened unpacking.
//!
//! Packing lays the *children* of an artifact folder at the archive root —
//! no folder-name prefix — so a pulled artifact unpacks directly into a
//! cache entry directory. Unpacking screens every member name for a
//! leading `/` or a `..` segment before any file is written, and does the
//! screening in a separate pass against a scratch directory so a rejected
//! archive leaves nothing on disk.

use crate::errors::{CtxPackError, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Cursor, Read, Write};
use std::path::Path;
use tar::Archive;

/// Pack the direct children of `folder` into a gzip-compressed tar archive,
/// held in memory.
pub fn pack_dir_gz(folder: &Path) -> Result<Vec<u8>> {
    let mut tar_bytes = Vec::new();
    {
        let mut builder = tar::Builder::new(&mut tar_bytes);
        append_children(&mut builder, folder)?;
        builder.finish()?;
    }

    let mut gz_bytes = Vec::new();
    {
        let mut encoder = GzEncoder::new(&mut gz_bytes, Compression::default());
        encoder.write_all(&tar_bytes)?;
        encoder.finish()?;
    }
    Ok(gz_bytes)
}

fn append_children<W: Write>(builder: &mut tar::Builder<W>, folder: &Path) -> Result<()> {
    let mut entries: Vec<_> = std::fs::read_dir(folder)?.collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        let name = entry.file_name();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            builder.append_dir_all(&name, &path)?;
        } else if file_type.is_file() {
            builder.append_path_with_name(&path, &name)?;
        }
    }
    Ok(())
}

/// Decompress and extract a gzip-compressed tar archive into `dest`.
///
/// Every member name is screened for a leading `/` or a `..` path segment
/// *before* anything is extracted. Extraction itself happens into a scratch
/// directory beside `dest` so a rejected or partially-read archive never
/// touches `dest`; only after every member is screened and extracted
/// successfully are the scratch directory's contents moved into place.
pub fn unpack_tar_gz(gz_bytes: &[u8], dest: &Path) -> Result<()> {
    let mut tar_bytes = Vec::new();
    GzDecoder::new(gz_bytes).read_to_end(&mut tar_bytes)?;

    screen_members(&tar_bytes)?;

    std::fs::create_dir_all(dest)?;
    let scratch_parent = dest.parent().unwrap_or_else(|| Path::new("."));
    let scratch = tempfile::Builder::new()
        .prefix(".ctxpack-unpack-")
        .tempdir_in(scratch_parent)?;

    let mut archive = Archive::new(Cursor::new(&tar_bytes));
    archive.unpack(scratch.path())?;

    for entry in std::fs::read_dir(scratch.path())? {
        let entry = entry?;
        let target = dest.join(entry.file_name());
        if target.exists() {
            if target.is_dir() {
                std::fs::remove_dir_all(&target)?;
            } else {
                std::fs::remove_file(&target)?;
            }
        }
        std::fs::rename(entry.path(), &target)?;
    }

    Ok(())
}

/// Reject an archive containing any member whose name escapes the
/// extraction directory, without extracting a single byte.
fn screen_members(tar_bytes: &[u8]) -> Result<()> {
    let mut archive = Archive::new(Cursor::new(tar_bytes));
    for entry in archive.entries()? {
        let entry = entry?;
        let path = entry.path()?;
        let name = path.to_string_lossy().replace('\\', "/");

        if name.starts_with('/') || name.split('/').any(|segment| segment == "..") {
            return Err(CtxPackError::Security { member: name });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::tempdir;

    fn build_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut tar_bytes = Vec::new();
        {
            let mut builder = tar::Builder::new(&mut tar_bytes);
            for (name, contents) in entries {
                let mut header = tar::Header::new_gnu();
                header.set_size(contents.len() as u64);
                header.set_mode(0o644);
                header.set_cksum();
                builder.append_data(&mut header, name, *contents).unwrap();
            }
            builder.finish().unwrap();
        }
        let mut gz = Vec::new();
        let mut encoder = GzEncoder::new(&mut gz, Compression::default());
        encoder.write_all(&tar_bytes).unwrap();
        encoder.finish().unwrap();
        gz
    }

    #[test]
    fn pack_then_unpack_round_trips_children() {
        let src = tempdir().unwrap();
        std::fs::write(src.path().join("a.txt"), "hello").unwrap();
        std::fs::create_dir(src.path().join("nested")).unwrap();
        std::fs::write(src.path().join("nested/b.txt"), "world").unwrap();

        let archive = pack_dir_gz(src.path()).unwrap();

        let dest = tempdir().unwrap();
        unpack_tar_gz(&archive, dest.path()).unwrap();

        assert_eq!(
            std::fs::read_to_string(dest.path().join("a.txt")).unwrap(),
            "hello"
        );
        assert_eq!(
            std::fs::read_to_string(dest.path().join("nested/b.txt")).unwrap(),
            "world"
        );
    }

    #[test]
    fn unpack_rejects_absolute_member_path() {
        let archive = build_archive(&[("/etc/passwd", b"pwned")]);
        let dest = tempdir().unwrap();
        let result = unpack_tar_gz(&archive, dest.path());
        assert!(matches!(result, Err(CtxPackError::Security { .. })));
        assert!(std::fs::read_dir(dest.path()).unwrap().next().is_none());
    }

    #[test]
    fn unpack_rejects_parent_traversal() {
        let archive = build_archive(&[("../escape.txt", b"pwned")]);
        let dest = tempdir().unwrap();
        let result = unpack_tar_gz(&archive, dest.path());
        assert!(matches!(result, Err(CtxPackError::Security { .. })));
    }

    #[test]
    fn unpack_leaves_no_partial_writes_on_rejection() {
        let archive = build_archive(&[("good.txt", b"ok"), ("../bad.txt", b"bad")]);
        let dest = tempdir().unwrap();
        let _ = unpack_tar_gz(&archive, dest.path());
        assert!(!dest.path().join("good.txt").exists());
    }
}
