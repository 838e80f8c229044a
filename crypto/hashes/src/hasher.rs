use crate::Hash;
use sha2::{Digest, Sha256};
use std::io::Write;

/// Compute SHA256(SHA256(data))
pub fn double_sha256(data: &[u8]) -> Hash {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    Hash::from_bytes(second.into())
}

/// Compute SHA256(data)
pub fn sha256(data: &[u8]) -> Hash {
    Hash::from_bytes(Sha256::digest(data).into())
}

/// Streaming SHA-256 that implements `io::Write`, so encoders can hash
/// without building an intermediate buffer.
#[derive(Clone)]
pub struct HashWriter(Sha256);

impl HashWriter {
    pub fn new() -> Self {
        Self(Sha256::new())
    }

    pub fn update(&mut self, data: impl AsRef<[u8]>) -> &mut Self {
        self.0.update(data.as_ref());
        self
    }

    /// Single SHA-256 of everything written so far
    pub fn finalize(self) -> Hash {
        Hash::from_bytes(self.0.finalize().into())
    }

    /// SHA-256 applied to the single SHA-256 of everything written so far
    pub fn finalize_double(self) -> Hash {
        let first = self.0.finalize();
        Hash::from_bytes(Sha256::digest(first).into())
    }
}

impl Write for HashWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Default for HashWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_double_sha256() {
        let hash = double_sha256(b"hello");
        assert_eq!(hash.to_bytes(), hex!("9595c9df90075148eb06860365df33584b75bff782a510c6cd4883a419833d50"));
    }

    #[test]
    fn test_hash_writer() {
        let mut writer = HashWriter::new();
        writer.write_all(b"hello").unwrap();
        assert_eq!(writer.finalize().to_bytes(), hex!("2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"));
    }

    #[test]
    fn test_hash_writer_double_matches() {
        let mut writer = HashWriter::new();
        writer.update(b"hel").update(b"lo");
        assert_eq!(writer.finalize_double(), double_sha256(b"hello"));
    }
}
