//! Password-based encryption
//!
//! AES-256-GCM with a PBKDF2-HMAC-SHA256 derived key. Used for the CLI's
//! encrypted mnemonics and, in its chunked stream form, for wallet backups.

use std::io::{ErrorKind, Read, Write};

use aes_gcm::{
    aead::{
        generic_array::GenericArray,
        stream::{DecryptorBE32, EncryptorBE32},
        Aead, KeyInit, OsRng,
    },
    Aes256Gcm, Nonce,
};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const PBKDF2_ROUNDS: u32 = 600_000;
/// AES-GCM nonce minus the 5 bytes the BE32 stream uses for counter and flag
const STREAM_NONCE_LEN: usize = 7;
const STREAM_CHUNK_LEN: usize = 4096;

/// Encryption errors
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Decryption error: {0}")]
    Decryption(String),

    /// Authentication tag mismatch, almost always a wrong password
    #[error("Wrong password")]
    WrongPassword,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn derive_key(password: &str, salt: &[u8]) -> [u8; 32] {
    let mut key_bytes = [0u8; 32];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, PBKDF2_ROUNDS, &mut key_bytes);
    key_bytes
}

/// Encrypt data using AES-256-GCM with password-derived key
///
/// - PBKDF2-HMAC-SHA256 with 600,000 iterations
/// - Random 128-bit salt
/// - Random 96-bit nonce for each encryption
/// - Returns: salt (16 bytes) || nonce (12 bytes) || ciphertext || tag (16 bytes)
///
/// # Arguments
///
/// * `data` - Plaintext bytes to encrypt
/// * `password` - Password for encryption
///
/// # Returns
///
/// Encrypted data as hex string
///
/// # Example
///
/// ```ignore
/// let encrypted = encrypt_data(b"secret", "my_password")?;
/// let decrypted = decrypt_data(&encrypted, "my_password")?;
/// ```
pub fn encrypt_data(data: &[u8], password: &str) -> Result<String, CryptoError> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);

    let key_bytes = derive_key(password, &salt);
    let cipher = Aes256Gcm::new(aes_gcm::Key::<Aes256Gcm>::from_slice(&key_bytes));

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, data)
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    let mut result = salt.to_vec();
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&ciphertext);

    Ok(hex::encode(result))
}

/// Decrypt data encrypted with [`encrypt_data`]
///
/// # Arguments
///
/// * `encrypted_hex` - Hex-encoded encrypted data (salt + nonce + ciphertext + tag)
/// * `password` - Password used for encryption
pub fn decrypt_data(encrypted_hex: &str, password: &str) -> Result<Vec<u8>, CryptoError> {
    let encrypted_bytes =
        hex::decode(encrypted_hex).map_err(|e| CryptoError::Decryption(e.to_string()))?;

    if encrypted_bytes.len() < SALT_LEN + NONCE_LEN + TAG_LEN {
        return Err(CryptoError::Decryption(
            "Data too short (minimum 44 bytes required)".to_string(),
        ));
    }

    let (salt, rest) = encrypted_bytes.split_at(SALT_LEN);
    let (nonce_bytes, ciphertext) = rest.split_at(NONCE_LEN);
    let nonce = Nonce::from_slice(nonce_bytes);

    let key_bytes = derive_key(password, salt);
    let cipher = Aes256Gcm::new(aes_gcm::Key::<Aes256Gcm>::from_slice(&key_bytes));

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CryptoError::WrongPassword)
}

/// Encrypt a mnemonic phrase for storage
pub fn encrypt_mnemonic(mnemonic: &str, password: &str) -> Result<String, CryptoError> {
    encrypt_data(mnemonic.as_bytes(), password)
}

/// Decrypt a mnemonic phrase encrypted with [`encrypt_mnemonic`]
pub fn decrypt_mnemonic(encrypted_hex: &str, password: &str) -> Result<String, CryptoError> {
    let bytes = decrypt_data(encrypted_hex, password)?;
    String::from_utf8(bytes).map_err(|e| CryptoError::Decryption(e.to_string()))
}

/// Fill `buf` from `reader`, stopping early only at end of input
fn read_chunk<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Encrypt everything read from `reader` into `writer`, chunk by chunk
///
/// Output layout: salt (16 bytes) || stream nonce (7 bytes) || chunks. Every
/// chunk but the last holds 4096 plaintext bytes plus a 16 byte tag, so
/// memory use does not grow with the input size.
pub fn encrypt_stream<R: Read, W: Write>(
    mut reader: R,
    mut writer: W,
    password: &str,
) -> Result<(), CryptoError> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let mut nonce = [0u8; STREAM_NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let key_bytes = derive_key(password, &salt);
    let cipher = Aes256Gcm::new(aes_gcm::Key::<Aes256Gcm>::from_slice(&key_bytes));
    let mut encryptor = EncryptorBE32::from_aead(cipher, GenericArray::from_slice(&nonce));

    writer.write_all(&salt)?;
    writer.write_all(&nonce)?;

    let mut buffer = [0u8; STREAM_CHUNK_LEN];
    loop {
        let read = read_chunk(&mut reader, &mut buffer)?;
        if read == STREAM_CHUNK_LEN {
            let ciphertext = encryptor
                .encrypt_next(buffer.as_slice())
                .map_err(|e| CryptoError::Encryption(e.to_string()))?;
            writer.write_all(&ciphertext)?;
        } else {
            let ciphertext = encryptor
                .encrypt_last(&buffer[..read])
                .map_err(|e| CryptoError::Encryption(e.to_string()))?;
            writer.write_all(&ciphertext)?;
            break;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Decrypt a stream written by [`encrypt_stream`]
///
/// A tag mismatch on any chunk, including a truncated stream, is reported
/// as [`CryptoError::WrongPassword`]. Plaintext of chunks preceding the
/// failing one may already have been written.
pub fn decrypt_stream<R: Read, W: Write>(
    mut reader: R,
    mut writer: W,
    password: &str,
) -> Result<(), CryptoError> {
    let mut salt = [0u8; SALT_LEN];
    let mut nonce = [0u8; STREAM_NONCE_LEN];
    if read_chunk(&mut reader, &mut salt)? < SALT_LEN
        || read_chunk(&mut reader, &mut nonce)? < STREAM_NONCE_LEN
    {
        return Err(CryptoError::Decryption(
            "Stream too short (missing header)".to_string(),
        ));
    }

    let key_bytes = derive_key(password, &salt);
    let cipher = Aes256Gcm::new(aes_gcm::Key::<Aes256Gcm>::from_slice(&key_bytes));
    let mut decryptor = DecryptorBE32::from_aead(cipher, GenericArray::from_slice(&nonce));

    let mut buffer = [0u8; STREAM_CHUNK_LEN + TAG_LEN];
    loop {
        let read = read_chunk(&mut reader, &mut buffer)?;
        if read == buffer.len() {
            let cleartext = decryptor
                .decrypt_next(buffer.as_slice())
                .map_err(|_| CryptoError::WrongPassword)?;
            writer.write_all(&cleartext)?;
        } else {
            let cleartext = decryptor
                .decrypt_last(&buffer[..read])
                .map_err(|_| CryptoError::WrongPassword)?;
            writer.write_all(&cleartext)?;
            break;
        }
    }
    writer.flush()?;
    Ok(())
}
