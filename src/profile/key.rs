//! Password-derived profile encryption key.

use rand::rngs::OsRng;
use rand::RngCore;
use sha3::Sha3_512;
use zeroize::Zeroizing;

use crate::crypto::EntropyUnavailable;

/// Length of the random salt stored in the `SALT` file.
pub const SALT_LEN: usize = 128;

/// Length of the derived database key.
pub const KEY_LEN: usize = 32;

/// PBKDF2 iteration count.
pub const PBKDF2_ROUNDS: u32 = 4096;

/// Database key derived from the profile password; zeroized on drop.
pub struct ProfileKey(Zeroizing<[u8; KEY_LEN]>);

impl ProfileKey {
    /// PBKDF2-HMAC-SHA3-512 of `password` over `salt`.
    pub fn derive(password: &str, salt: &[u8; SALT_LEN]) -> Self {
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        pbkdf2::pbkdf2_hmac::<Sha3_512>(password.as_bytes(), salt, PBKDF2_ROUNDS, &mut key[..]);
        Self(key)
    }

    /// Draws a fresh salt and derives the key for it.
    pub fn create(password: &str) -> Result<(Self, [u8; SALT_LEN]), EntropyUnavailable> {
        let mut salt = [0u8; SALT_LEN];
        OsRng.try_fill_bytes(&mut salt)?;
        Ok((Self::derive(password, &salt), salt))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Lowercase hex form, as used in the SQLCipher key pragma.
    pub(crate) fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(&self.0[..]))
    }
}

impl std::fmt::Debug for ProfileKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ProfileKey(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derivation_is_deterministic() {
        let salt = [9u8; SALT_LEN];
        let a = ProfileKey::derive("be gay do crime", &salt);
        let b = ProfileKey::derive("be gay do crime", &salt);
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_password_and_salt_both_matter() {
        let salt = [9u8; SALT_LEN];
        let base = ProfileKey::derive("one", &salt);
        assert_ne!(base.as_bytes(), ProfileKey::derive("two", &salt).as_bytes());
        assert_ne!(base.as_bytes(), ProfileKey::derive("one", &[8u8; SALT_LEN]).as_bytes());
    }

    #[test]
    fn test_create_uses_fresh_salt() {
        let (key_a, salt_a) = ProfileKey::create("pw").unwrap();
        let (key_b, salt_b) = ProfileKey::create("pw").unwrap();
        assert_ne!(salt_a, salt_b);
        assert_ne!(key_a.as_bytes(), key_b.as_bytes());
        assert_eq!(key_a.as_bytes(), ProfileKey::derive("pw", &salt_a).as_bytes());
    }

    #[test]
    fn test_debug_hides_key() {
        let key = ProfileKey::derive("pw", &[0u8; SALT_LEN]);
        assert_eq!(format!("{:?}", key), "ProfileKey(..)");
        assert_eq!(key.to_hex().len(), KEY_LEN * 2);
    }
}
