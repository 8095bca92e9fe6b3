use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use std::fmt;
use tracing::warn;

/// Base64 text produced by [`SecretCipher::encrypt`].
#[derive(Clone, PartialEq, Eq, Default)]
pub struct EncryptedBlob(String);

impl EncryptedBlob {
    pub fn from_stored(raw: String) -> Self {
        Self(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for EncryptedBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncryptedBlob({} bytes)", self.0.len())
    }
}

/// Reversible XOR-with-secret transform, base64 encoded.
///
/// Obfuscation only; it keeps passwords out of plain sight at rest and nothing more.
#[derive(Clone)]
pub struct SecretCipher {
    key: Vec<u8>,
}

impl SecretCipher {
    /// An empty secret would make the transform the identity, so it falls back to one space.
    pub fn new(secret: &str) -> Self {
        let key = if secret.is_empty() {
            warn!("security.encryption_key is empty; using a placeholder key");
            b" ".to_vec()
        } else {
            secret.as_bytes().to_vec()
        };
        Self { key }
    }

    pub fn encrypt(&self, plain: &str) -> EncryptedBlob {
        if plain.is_empty() {
            return EncryptedBlob::default();
        }
        EncryptedBlob(STANDARD.encode(self.xor(plain.as_bytes())))
    }

    /// `None` when the blob is not valid base64 or does not decode to UTF-8.
    pub fn decrypt(&self, blob: &EncryptedBlob) -> Option<String> {
        if blob.is_empty() {
            return Some(String::new());
        }
        let bytes = match STANDARD.decode(blob.as_str()) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "Stored credential is not valid base64");
                return None;
            }
        };
        match String::from_utf8(self.xor(&bytes)) {
            Ok(plain) => Some(plain),
            Err(_) => {
                warn!("Stored credential did not decrypt to UTF-8; wrong encryption key?");
                None
            }
        }
    }

    fn xor(&self, input: &[u8]) -> Vec<u8> {
        input
            .iter()
            .zip(self.key.iter().cycle())
            .map(|(b, k)| b ^ k)
            .collect()
    }
}
