//! Credential Encryption
//!
//! Tenant provider secrets (SendGrid API keys, Twilio auth tokens) are stored
//! encrypted at rest and only decrypted while building a client.
//!
//! # Format
//!
//! `v1:<base64(nonce || ciphertext)>`
//!
//! - **Cipher**: XChaCha20-Poly1305 AEAD, 32-byte key
//! - **Nonce**: random 24 bytes per value
//! - **Key**: 64 hex chars, or a passphrase hashed with SHA-256
//!
//! The module also carries the format validators used before a credential
//! is accepted or used.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use zeroize::Zeroizing;

use crate::error::{MessagingError, MessagingResult};

/// Key size (256 bits)
const KEY_SIZE: usize = 32;

/// XChaCha20 nonce size
const NONCE_SIZE: usize = 24;

const FORMAT_V1: &str = "v1:";

/// Encrypts and decrypts stored provider credentials
pub struct CredentialCipher {
    key: Zeroizing<[u8; KEY_SIZE]>,
}

impl CredentialCipher {
    /// Build from a 64-char hex key
    pub fn from_hex(hex_key: &str) -> MessagingResult<Self> {
        let bytes = Zeroizing::new(
            hex::decode(hex_key.trim())
                .map_err(|e| MessagingError::Crypto(format!("invalid hex key: {}", e)))?,
        );
        if bytes.len() != KEY_SIZE {
            return Err(MessagingError::Crypto(format!(
                "key must be {} bytes, got {}",
                KEY_SIZE,
                bytes.len()
            )));
        }
        let mut key = Zeroizing::new([0u8; KEY_SIZE]);
        key.copy_from_slice(&bytes);
        Ok(Self { key })
    }

    /// Derive a key from an arbitrary secret
    pub fn from_passphrase(secret: &str) -> Self {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(secret.as_bytes());
        let digest = hasher.finalize();
        let mut key = Zeroizing::new([0u8; KEY_SIZE]);
        key.copy_from_slice(&digest);
        Self { key }
    }

    /// Hex keys are used as-is, anything else is treated as a passphrase
    pub fn from_config_key(value: &str) -> Self {
        let trimmed = value.trim();
        let is_hex_key =
            trimmed.len() == KEY_SIZE * 2 && trimmed.chars().all(|c| c.is_ascii_hexdigit());
        if is_hex_key {
            if let Ok(cipher) = Self::from_hex(trimmed) {
                return cipher;
            }
        }
        Self::from_passphrase(trimmed)
    }

    fn cipher(&self) -> XChaCha20Poly1305 {
        XChaCha20Poly1305::new(Key::from_slice(&self.key[..]))
    }

    pub fn encrypt(&self, plaintext: &str) -> MessagingResult<String> {
        let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher()
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| MessagingError::Crypto("encryption failed".to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(nonce.as_slice());
        sealed.extend_from_slice(&ciphertext);
        Ok(format!("{}{}", FORMAT_V1, STANDARD.encode(sealed)))
    }

    pub fn decrypt(&self, sealed: &str) -> MessagingResult<Zeroizing<String>> {
        let encoded = sealed
            .trim()
            .strip_prefix(FORMAT_V1)
            .ok_or_else(|| MessagingError::Crypto("unsupported credential format".to_string()))?;
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| MessagingError::Crypto(format!("invalid base64: {}", e)))?;
        if bytes.len() <= NONCE_SIZE {
            return Err(MessagingError::Crypto("ciphertext too short".to_string()));
        }

        let (nonce, ciphertext) = bytes.split_at(NONCE_SIZE);
        let plaintext = Zeroizing::new(
            self.cipher()
                .decrypt(XNonce::from_slice(nonce), ciphertext)
                .map_err(|_| MessagingError::Crypto("decryption failed".to_string()))?,
        );
        let text = std::str::from_utf8(&plaintext)
            .map_err(|_| MessagingError::Crypto("credential is not utf-8".to_string()))?;
        Ok(Zeroizing::new(text.to_string()))
    }
}

impl std::fmt::Debug for CredentialCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CredentialCipher([REDACTED])")
    }
}

/// Display form of a secret: first and last four characters
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len().max(4));
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}…{}", head, tail)
}

// ============================================================================
// Validators
// ============================================================================

/// `AC` followed by 32 hex chars
pub fn validate_twilio_account_sid(sid: &str) -> MessagingResult<()> {
    let valid = sid.len() == 34
        && sid.starts_with("AC")
        && sid[2..].chars().all(|c| c.is_ascii_hexdigit());
    if !valid {
        return Err(MessagingError::Validation(
            "Twilio account SID must be AC followed by 32 hex characters".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_twilio_auth_token(token: &str) -> MessagingResult<()> {
    if token.len() != 32 || !token.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(MessagingError::Validation(
            "Twilio auth token must be 32 alphanumeric characters".to_string(),
        ));
    }
    Ok(())
}

/// E.164: `+` then 8 to 15 digits, no leading zero
pub fn validate_phone_number(phone: &str) -> MessagingResult<()> {
    let digits = phone.strip_prefix('+').unwrap_or("");
    let valid = (8..=15).contains(&digits.len())
        && digits.chars().all(|c| c.is_ascii_digit())
        && !digits.starts_with('0');
    if !valid {
        return Err(MessagingError::Validation(format!(
            "phone number {} is not in E.164 format",
            phone
        )));
    }
    Ok(())
}

pub fn validate_sendgrid_api_key(key: &str) -> MessagingResult<()> {
    if !key.starts_with("SG.") || key.len() < 20 || key.chars().any(char::is_whitespace) {
        return Err(MessagingError::Validation(
            "SendGrid API key must start with SG.".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> MessagingResult<()> {
    let invalid = || MessagingError::Validation(format!("invalid email address: {}", email));
    if email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    let domain_ok = domain.contains('.')
        && !domain.contains('@')
        && !domain.starts_with('.')
        && !domain.ends_with('.');
    if local.is_empty() || !domain_ok {
        return Err(invalid());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    #[test]
    fn test_encrypt_decrypt() {
        let cipher = CredentialCipher::from_hex(KEY).unwrap();
        let sealed = cipher.encrypt("SG.secret-api-key-value").unwrap();

        assert!(sealed.starts_with("v1:"));
        assert!(!sealed.contains("secret"));
        assert_eq!(cipher.decrypt(&sealed).unwrap().as_str(), "SG.secret-api-key-value");
    }

    #[test]
    fn test_nonce_is_random() {
        let cipher = CredentialCipher::from_hex(KEY).unwrap();
        assert_ne!(cipher.encrypt("same").unwrap(), cipher.encrypt("same").unwrap());
    }

    #[test]
    fn test_wrong_key_fails() {
        let sealed = CredentialCipher::from_hex(KEY).unwrap().encrypt("token").unwrap();
        let other = CredentialCipher::from_passphrase("another secret");
        assert!(matches!(other.decrypt(&sealed), Err(MessagingError::Crypto(_))));
    }

    #[test]
    fn test_rejects_bad_input() {
        let cipher = CredentialCipher::from_hex(KEY).unwrap();
        assert!(cipher.decrypt("plaintext-token").is_err());
        assert!(cipher.decrypt("v1:!!!").is_err());
        assert!(cipher.decrypt("v1:AAAA").is_err());
        assert!(CredentialCipher::from_hex("abcd").is_err());
    }

    #[test]
    fn test_config_key_modes() {
        let hex_cipher = CredentialCipher::from_config_key(KEY);
        let sealed = CredentialCipher::from_hex(KEY).unwrap().encrypt("x").unwrap();
        assert_eq!(hex_cipher.decrypt(&sealed).unwrap().as_str(), "x");

        let pass = CredentialCipher::from_config_key("correct horse battery staple");
        let sealed = pass.encrypt("y").unwrap();
        assert_eq!(
            CredentialCipher::from_passphrase("correct horse battery staple")
                .decrypt(&sealed)
                .unwrap()
                .as_str(),
            "y"
        );
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("SG.abcdefghijklmnopwxyz"), "SG.a…wxyz");
        assert_eq!(mask_secret("short"), "*****");
        assert_eq!(mask_secret(""), "****");
    }

    #[test]
    fn test_validators() {
        assert!(validate_twilio_account_sid("AC0123456789abcdef0123456789abcdef").is_ok());
        assert!(validate_twilio_account_sid("AB0123456789abcdef0123456789abcdef").is_err());
        assert!(validate_twilio_account_sid("AC123").is_err());

        assert!(validate_twilio_auth_token("0123456789abcdef0123456789abcdef").is_ok());
        assert!(validate_twilio_auth_token("short").is_err());

        assert!(validate_phone_number("+15555550100").is_ok());
        assert!(validate_phone_number("5555550100").is_err());
        assert!(validate_phone_number("+0555550100").is_err());
        assert!(validate_phone_number("+1555-555-0100").is_err());

        assert!(validate_sendgrid_api_key("SG.abcdefghijklmnopqrstuvwxyz").is_ok());
        assert!(validate_sendgrid_api_key("abcdefghijklmnopqrstuvwxyz").is_err());

        assert!(validate_email("front@smiledental.com").is_ok());
        assert!(validate_email("front@localhost").is_err());
        assert!(validate_email("front desk@smile.com").is_err());
        assert!(validate_email("@smile.com").is_err());
    }
}
