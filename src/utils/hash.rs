// src/utils/hash.rs
use std::fs::File;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

/// Computes the SHA-256 hash of a file, streaming it in 8 KiB chunks.
/// The hex digest identifies the source document in every extracted
/// section, so downstream consumers can deduplicate re-uploads.
pub fn file_sha256<P: AsRef<Path>>(path: P) -> Result<String, std::io::Error> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_hash_is_stable() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"troubleshooting section content").unwrap();
        f.flush().unwrap();

        let first = file_sha256(f.path()).unwrap();
        let second = file_sha256(f.path()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 64); // hex-encoded sha-256
    }

    #[test]
    fn test_different_content_different_hash() {
        let mut a = tempfile::NamedTempFile::new().unwrap();
        let mut b = tempfile::NamedTempFile::new().unwrap();
        a.write_all(b"manual one").unwrap();
        b.write_all(b"manual two").unwrap();

        assert_ne!(
            file_sha256(a.path()).unwrap(),
            file_sha256(b.path()).unwrap()
        );
    }
}
