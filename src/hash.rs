use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use walkdir::WalkDir;

/// Run `f` against a fresh SHA-256 hasher and return the lowercase hex digest.
pub fn stable_hash_with(f: impl FnOnce(&mut Sha256)) -> String {
    let mut hasher = Sha256::new();
    f(&mut hasher);
    to_hex(&hasher.finalize())
}

/// Feed a length-prefixed field so adjacent fields cannot run together.
pub fn update_field(hasher: &mut Sha256, value: &[u8]) {
    hasher.update((value.len() as u64).to_le_bytes());
    hasher.update(value);
}

/// Hash every regular file under `root` in sorted relative-path order.
///
/// Both the relative path and the bytes are hashed, so renames change the digest.
pub fn hash_directory(root: &Path) -> io::Result<String> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry.map_err(io::Error::other)?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    files.sort();

    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    for path in files {
        let rel = path.strip_prefix(root).unwrap_or(&path);
        update_field(&mut hasher, rel.to_string_lossy().as_bytes());
        let mut file = File::open(&path)?;
        loop {
            let read = file.read(&mut buf)?;
            if read == 0 {
                break;
            }
            hasher.update(&buf[..read]);
        }
    }
    Ok(to_hex(&hasher.finalize()))
}

fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}
