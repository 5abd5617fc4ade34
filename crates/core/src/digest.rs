//! Streaming SHA-256 hashing and recursive input-directory digesting.
//!
//! The [`Hasher`] reads a byte source in fixed-size chunks and feeds each
//! chunk into a `sha2::Sha256` as it goes, so a caller never has to buffer
//! a whole file (or re-open it afterward) just to verify what it wrote.

use crate::errors::{CtxPackError, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Read chunk size for streaming hashing.
const CHUNK_SIZE: usize = 8 * 1024;

/// Compute the SHA-256 hex digest of a reader without buffering its full
/// contents.
pub fn hash_reader<R: Read>(mut reader: R) -> Result<String> {
    let mut hasher = Sha256::new();
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Copy `reader` into `writer` while hashing every chunk as it passes
/// through, so the digest reflects exactly the bytes written — not a
/// separate read-back pass.
pub fn copy_and_hash<R: Read, W: Write>(mut reader: R, mut writer: W) -> Result<String> {
    let mut hasher = Sha256::new();
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        writer.write_all(&buf[..n])?;
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Hash the contents of a single regular file on disk.
pub fn hash_file(path: &Path) -> Result<String> {
    let file = File::open(path)?;
    hash_reader(file)
}

/// Stream a file's raw bytes, in 8 KiB chunks, directly into a running
/// hash. Used by [`digest_dir`] to fold a file's content into the same
/// `Sha256` instance as its path, rather than hashing the file on its
/// own and feeding the *hex digest string* back in — which is a
/// different value entirely.
fn update_with_file(hasher: &mut Sha256, path: &Path) -> Result<()> {
    let mut file = File::open(path)?;
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(())
}

/// Recursively enumerate every regular file under `dir`, in the order the
/// original reference implementation produced them: sorted by the full
/// path string built up during recursion, not by the path relative to
/// `dir`. Two implementations that walk the same tree must agree on this
/// ordering bit-for-bit or they will compute different identities for
/// identical inputs.
fn enumerate_files_full_path_order(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    walk(dir, &mut found)?;
    found.sort_by(|a, b| a.to_string_lossy().cmp(&b.to_string_lossy()));
    Ok(found)
}

fn walk(dir: &Path, found: &mut Vec<PathBuf>) -> Result<()> {
    let mut entries: Vec<_> = std::fs::read_dir(dir)?.collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.file_name());
    for entry in entries {
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            // A real directory, not a symlink to one — `file_type()`
            // doesn't follow symlinks, so this only recurses into
            // entries that are directories themselves.
            walk(&path, found)?;
        } else if let Ok(metadata) = std::fs::metadata(&path) {
            // `metadata` follows symlinks, so a symlink that resolves to
            // a regular file is included here; a dangling symlink or one
            // pointing at a directory is silently skipped.
            if metadata.is_file() {
                found.push(path);
            }
        }
    }
    Ok(())
}

/// Digest an input directory into a single SHA-256 value: the relative
/// path bytes and raw content of every regular file, streamed into one
/// running hash in full-path sort order. Replacing a `path` input with
/// this `digest` makes contract identity depend only on input content,
/// never on where the files happened to live on disk.
pub fn digest_dir(dir: &Path) -> Result<String> {
    if !dir.is_dir() {
        return Err(CtxPackError::other(format!(
            "input path is not a directory: {}",
            dir.display()
        )));
    }

    let files = enumerate_files_full_path_order(dir)?;
    let mut hasher = Sha256::new();
    for full_path in files {
        let relative = full_path
            .strip_prefix(dir)
            .unwrap_or(&full_path)
            .to_string_lossy()
            .replace('\\', "/");
        hasher.update(relative.as_bytes());
        update_with_file(&mut hasher, &full_path)?;
    }

    Ok(format!("sha256:{:x}", hasher.finalize()))
}
