use base64::{engine::general_purpose, Engine as _};
use thiserror::Error;

use crate::crypto::aes::{self, SecureKey};
use crate::error::Result;
use crate::models::session::SessionRecord;

/// Leading byte of every cookie value. Bumped whenever `SessionRecord`
/// changes shape so old cookies read as absent instead of as garbage.
pub const FORMAT_VERSION: u8 = 1;

/// Browsers drop cookies larger than this, so encoding refuses to produce one.
pub const MAX_COOKIE_BYTES: usize = 4096;

const KEY_SALT: &[u8] = b"gatehouse.session-cookie.v1";

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("session encode failed: {0}")]
    Encode(String),

    /// The cookie authenticated under our key but its payload did not
    /// decode. Only a server-side format bug can produce this.
    #[error("session record is corrupt: {0}")]
    Corrupt(String),
}

/// Seals session records into cookie values and opens them again.
///
/// Layout: `base64url(version || aes-gcm(bincode(record)) || nonce)`. The
/// version byte and cookie name are bound as associated data.
pub struct SessionCodec {
    key: SecureKey,
    cookie_name: String,
}

impl SessionCodec {
    /// Derives the sealing key from `secret`.
    pub fn new(secret: &str, cookie_name: &str) -> Result<Self> {
        Ok(Self {
            key: aes::derive_key(secret.as_bytes(), KEY_SALT)?,
            cookie_name: cookie_name.to_string(),
        })
    }

    fn aad(&self) -> Vec<u8> {
        let mut aad = Vec::with_capacity(self.cookie_name.len() + 1);
        aad.push(FORMAT_VERSION);
        aad.extend_from_slice(self.cookie_name.as_bytes());
        aad
    }

    pub fn encode(&self, record: &SessionRecord) -> std::result::Result<String, CodecError> {
        let plaintext = bincode::encode_to_vec(record, bincode::config::standard())
            .map_err(|e| CodecError::Encode(e.to_string()))?;

        let sealed = aes::seal(&self.key, &plaintext, &self.aad())
            .map_err(|e| CodecError::Encode(e.to_string()))?;

        let mut framed = Vec::with_capacity(sealed.len() + 1);
        framed.push(FORMAT_VERSION);
        framed.extend_from_slice(&sealed);

        let value = general_purpose::URL_SAFE_NO_PAD.encode(framed);
        if value.len() > MAX_COOKIE_BYTES {
            return Err(CodecError::Encode(format!(
                "cookie is {} bytes, browsers drop anything over {}",
                value.len(),
                MAX_COOKIE_BYTES
            )));
        }
        Ok(value)
    }

    /// `Ok(None)` covers every way a client can hand us a cookie we cannot
    /// use: bad encoding, another key, tampering, an old format. `Err` is
    /// reserved for failures on our side.
    pub fn decode(&self, value: &str) -> std::result::Result<Option<SessionRecord>, CodecError> {
        let Ok(framed) = general_purpose::URL_SAFE_NO_PAD.decode(value) else {
            tracing::debug!("Session cookie is not valid base64");
            return Ok(None);
        };

        let Some((&version, sealed)) = framed.split_first() else {
            return Ok(None);
        };
        if version != FORMAT_VERSION {
            tracing::debug!(version, "Session cookie has an unsupported format version");
            return Ok(None);
        }

        let Some(plaintext) = aes::open(&self.key, sealed, &self.aad()) else {
            tracing::debug!("Session cookie failed authentication");
            return Ok(None);
        };

        let (record, read) =
            bincode::decode_from_slice::<SessionRecord, _>(&plaintext, bincode::config::standard())
                .map_err(|e| CodecError::Corrupt(e.to_string()))?;

        if read != plaintext.len() {
            return Err(CodecError::Corrupt(format!(
                "{} trailing bytes after record",
                plaintext.len() - read
            )));
        }

        Ok(Some(record))
    }

    /// Seals arbitrary bytes in the current frame, bypassing the record
    /// encoder. Lets tests produce authentic but undecodable cookies.
    #[cfg(test)]
    pub(crate) fn seal_raw(&self, plaintext: &[u8]) -> String {
        let sealed = aes::seal(&self.key, plaintext, &self.aad()).unwrap();
        let mut framed = vec![FORMAT_VERSION];
        framed.extend_from_slice(&sealed);
        general_purpose::URL_SAFE_NO_PAD.encode(framed)
    }
}
