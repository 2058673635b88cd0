//! Streaming authenticated encryption for backup artifacts.
//!
//! Artifacts are sealed with the ChaCha20-Poly1305 STREAM construction
//! (big-endian 32-bit counter), in fixed 64 KiB plaintext chunks so memory use
//! is independent of artifact size. File layout:
//!
//! ```text
//! +----------+-------------------+------------------------------------+
//! | magic(8) | nonce prefix (7)  | chunk_0 | chunk_1 | ... | last     |
//! +----------+-------------------+------------------------------------+
//! ```
//!
//! Every chunk carries a 16-byte tag; the last chunk is sealed with the
//! "last block" flag so truncation is detected.

use crate::error::{BackupError, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use camino::Utf8Path;
use chacha20poly1305::aead::generic_array::GenericArray;
use chacha20poly1305::aead::stream::{DecryptorBE32, EncryptorBE32};
use chacha20poly1305::aead::KeyInit;
use chacha20poly1305::{ChaCha20Poly1305, Key};
use rand::RngCore;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::{debug, warn};
use zeroize::Zeroizing;

/// Key size in bytes (256 bits)
pub const KEY_SIZE: usize = 32;

/// Plaintext bytes per sealed chunk
pub const CHUNK_SIZE: usize = 64 * 1024;

/// File signature of an encrypted artifact
pub const ENCRYPTED_MAGIC: &[u8; 8] = b"LZRENC01";

/// Extension appended to encrypted artifacts
pub const ENCRYPTED_EXTENSION: &str = "enc";

const NONCE_PREFIX_SIZE: usize = 7;
const TAG_SIZE: usize = 16;

/// Symmetric artifact key, wiped from memory on drop
#[derive(Clone)]
pub struct BackupKey(Zeroizing<[u8; KEY_SIZE]>);

impl BackupKey {
    /// Generate a fresh random key
    pub fn generate() -> Self {
        let mut bytes = Zeroizing::new([0u8; KEY_SIZE]);
        rand::rng().fill_bytes(bytes.as_mut());
        Self(bytes)
    }

    /// Decode a base64 key as stored on disk
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let decoded = Zeroizing::new(
            BASE64
                .decode(encoded.trim())
                .map_err(|e| BackupError::Key(format!("key is not valid base64: {}", e)))?,
        );
        if decoded.len() != KEY_SIZE {
            return Err(BackupError::Key(format!(
                "key must be {} bytes, got {}",
                KEY_SIZE,
                decoded.len()
            )));
        }
        let mut bytes = Zeroizing::new([0u8; KEY_SIZE]);
        bytes.copy_from_slice(&decoded);
        Ok(Self(bytes))
    }

    fn to_base64(&self) -> Zeroizing<String> {
        Zeroizing::new(BASE64.encode(self.0.as_ref()))
    }

    fn cipher(&self) -> ChaCha20Poly1305 {
        ChaCha20Poly1305::new(Key::from_slice(self.0.as_ref()))
    }
}

impl std::fmt::Debug for BackupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BackupKey(..)")
    }
}

/// How the key in use came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOrigin {
    /// Read from an existing key file
    Loaded,
    /// Provisioned on this run; operators must be told
    Generated,
}

/// Load the key at `path`, or provision one there when allowed.
pub fn load_or_provision_key(path: &Utf8Path, auto_generate: bool) -> Result<(BackupKey, KeyOrigin)> {
    match fs::read_to_string(path) {
        Ok(content) => {
            debug!("Loaded backup encryption key from {}", path);
            Ok((BackupKey::from_base64(&content)?, KeyOrigin::Loaded))
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            if !auto_generate {
                return Err(BackupError::KeyMissing {
                    path: path.to_string(),
                });
            }
            let key = BackupKey::generate();
            persist_key(path, &key)?;
            warn!(
                "Provisioned a NEW backup encryption key at {}. Back it up: artifacts cannot be decrypted without it",
                path
            );
            Ok((key, KeyOrigin::Generated))
        }
        Err(e) => Err(BackupError::Key(format!("failed to read {}: {}", path, e))),
    }
}

/// Write a key file readable only by its owner. Never overwrites.
fn persist_key(path: &Utf8Path, key: &BackupKey) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options
        .open(path)
        .map_err(|e| BackupError::Key(format!("failed to create {}: {}", path, e)))?;
    file.write_all(key.to_base64().as_bytes())?;
    file.sync_all()?;
    Ok(())
}

/// Seals and opens artifacts with a single key
#[derive(Debug, Clone)]
pub struct FileEncryptor {
    key: BackupKey,
}

impl FileEncryptor {
    pub fn new(key: BackupKey) -> Self {
        Self { key }
    }

    /// Encrypt `input` into `output`. Returns plaintext bytes processed.
    ///
    /// A partially written output is removed on failure.
    pub fn encrypt_file(&self, input: &Path, output: &Path) -> Result<u64> {
        let reader = BufReader::new(File::open(input)?);
        let writer = BufWriter::new(File::create(output)?);
        let result = self.encrypt_stream(reader, writer);
        if result.is_err() {
            let _ = fs::remove_file(output);
        }
        result
    }

    /// Decrypt `input` into `output`. Returns plaintext bytes written.
    pub fn decrypt_file(&self, input: &Path, output: &Path) -> Result<u64> {
        let reader = BufReader::new(File::open(input)?);
        let writer = BufWriter::new(File::create(output)?);
        let result = self
            .decrypt_stream(reader, writer)
            .map_err(|e| match e {
                BackupError::Decryption { message, .. } => {
                    BackupError::decryption(input.display(), message)
                }
                other => other,
            });
        if result.is_err() {
            let _ = fs::remove_file(output);
        }
        result
    }

    pub fn encrypt_stream<R: Read, W: Write>(&self, mut reader: R, mut writer: W) -> Result<u64> {
        let mut nonce_prefix = [0u8; NONCE_PREFIX_SIZE];
        rand::rng().fill_bytes(&mut nonce_prefix);

        writer.write_all(ENCRYPTED_MAGIC)?;
        writer.write_all(&nonce_prefix)?;

        let mut encryptor =
            EncryptorBE32::from_aead(self.key.cipher(), GenericArray::from_slice(&nonce_prefix));
        let mut buffer = vec![0u8; CHUNK_SIZE];
        let mut total = 0u64;

        loop {
            let read = read_full(&mut reader, &mut buffer)?;
            total += read as u64;

            if read == CHUNK_SIZE {
                let sealed = encryptor
                    .encrypt_next(&buffer[..])
                    .map_err(|e| BackupError::Encryption(e.to_string()))?;
                writer.write_all(&sealed)?;
            } else {
                let sealed = encryptor
                    .encrypt_last(&buffer[..read])
                    .map_err(|e| BackupError::Encryption(e.to_string()))?;
                writer.write_all(&sealed)?;
                break;
            }
        }

        writer.flush()?;
        Ok(total)
    }

    pub fn decrypt_stream<R: Read, W: Write>(&self, mut reader: R, mut writer: W) -> Result<u64> {
        let mut magic = [0u8; 8];
        let mut nonce_prefix = [0u8; NONCE_PREFIX_SIZE];
        if read_full(&mut reader, &mut magic)? != magic.len() || &magic != ENCRYPTED_MAGIC {
            return Err(BackupError::decryption("stream", "not an encrypted artifact"));
        }
        if read_full(&mut reader, &mut nonce_prefix)? != NONCE_PREFIX_SIZE {
            return Err(BackupError::decryption("stream", "truncated header"));
        }

        let mut decryptor =
            DecryptorBE32::from_aead(self.key.cipher(), GenericArray::from_slice(&nonce_prefix));
        let mut buffer = vec![0u8; CHUNK_SIZE + TAG_SIZE];
        let mut total = 0u64;

        loop {
            let read = read_full(&mut reader, &mut buffer)?;

            if read == buffer.len() {
                let plain = decryptor
                    .decrypt_next(&buffer[..])
                    .map_err(|_| BackupError::decryption("stream", "authentication failed"))?;
                total += plain.len() as u64;
                writer.write_all(&plain)?;
            } else {
                let plain = decryptor
                    .decrypt_last(&buffer[..read])
                    .map_err(|_| BackupError::decryption("stream", "authentication failed or truncated"))?;
                total += plain.len() as u64;
                writer.write_all(&plain)?;
                break;
            }
        }

        writer.flush()?;
        Ok(total)
    }
}

/// Whether the file starts with the encrypted artifact signature
pub fn is_encrypted(path: &Path) -> Result<bool> {
    let mut magic = [0u8; 8];
    let mut file = File::open(path)?;
    Ok(read_full(&mut file, &mut magic)? == magic.len() && &magic == ENCRYPTED_MAGIC)
}

/// Fill `buf` as far as the reader allows; short only at end of stream
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn roundtrip(data: &[u8]) -> Vec<u8> {
        let encryptor = FileEncryptor::new(BackupKey::generate());
        let mut sealed = Vec::new();
        encryptor.encrypt_stream(Cursor::new(data), &mut sealed).unwrap();
        let mut opened = Vec::new();
        encryptor
            .decrypt_stream(Cursor::new(sealed), &mut opened)
            .unwrap();
        opened
    }

    #[test]
    fn test_roundtrip_sizes_around_chunk_boundary() {
        for size in [0, 1, CHUNK_SIZE - 1, CHUNK_SIZE, CHUNK_SIZE + 1, 3 * CHUNK_SIZE + 17] {
            let data: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
            assert_eq!(roundtrip(&data), data, "size {}", size);
        }
    }

    #[test]
    fn test_tampered_chunk_is_rejected() {
        let encryptor = FileEncryptor::new(BackupKey::generate());
        let data = vec![7u8; CHUNK_SIZE * 2];
        let mut sealed = Vec::new();
        encryptor.encrypt_stream(Cursor::new(&data), &mut sealed).unwrap();

        let index = ENCRYPTED_MAGIC.len() + NONCE_PREFIX_SIZE + 10;
        sealed[index] ^= 0xff;

        let result = encryptor.decrypt_stream(Cursor::new(sealed), Vec::new());
        assert!(matches!(result, Err(BackupError::Decryption { .. })));
    }

    #[test]
    fn test_truncated_stream_is_rejected() {
        let encryptor = FileEncryptor::new(BackupKey::generate());
        let data = vec![1u8; CHUNK_SIZE * 2 + 5];
        let mut sealed = Vec::new();
        encryptor.encrypt_stream(Cursor::new(&data), &mut sealed).unwrap();

        // Drop the final (short) chunk entirely
        sealed.truncate(ENCRYPTED_MAGIC.len() + NONCE_PREFIX_SIZE + 2 * (CHUNK_SIZE + TAG_SIZE));

        assert!(encryptor
            .decrypt_stream(Cursor::new(sealed), Vec::new())
            .is_err());
    }

    #[test]
    fn test_wrong_key_is_rejected() {
        let mut sealed = Vec::new();
        FileEncryptor::new(BackupKey::generate())
            .encrypt_stream(Cursor::new(b"secret dump"), &mut sealed)
            .unwrap();

        let other = FileEncryptor::new(BackupKey::generate());
        assert!(other.decrypt_stream(Cursor::new(sealed), Vec::new()).is_err());
    }

    #[test]
    fn test_key_provisioning_requires_opt_in() {
        let temp = TempDir::new().unwrap();
        let path = Utf8PathBuf::from_path_buf(temp.path().join("keys/backup.key")).unwrap();

        assert!(matches!(
            load_or_provision_key(&path, false),
            Err(BackupError::KeyMissing { .. })
        ));

        let (_, origin) = load_or_provision_key(&path, true).unwrap();
        assert_eq!(origin, KeyOrigin::Generated);

        let (_, origin) = load_or_provision_key(&path, true).unwrap();
        assert_eq!(origin, KeyOrigin::Loaded);
    }

    #[cfg(unix)]
    #[test]
    fn test_provisioned_key_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let path = Utf8PathBuf::from_path_buf(temp.path().join("backup.key")).unwrap();
        load_or_provision_key(&path, true).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_malformed_key_file() {
        assert!(matches!(
            BackupKey::from_base64("not base64!!"),
            Err(BackupError::Key(_))
        ));
        assert!(matches!(
            BackupKey::from_base64(&BASE64.encode([0u8; 16])),
            Err(BackupError::Key(_))
        ));
    }
}
