use std::fmt;
use std::str::FromStr;

use ed25519_dalek::{Signature, Signer as _, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

pub const ADDRESS_LEN: usize = 20;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("malformed address {0:?}")]
    MalformedAddress(String),
    #[error("malformed secret key")]
    MalformedSecret,
    #[error("malformed public key")]
    MalformedKey,
    #[error("malformed signature")]
    MalformedSignature,
    #[error("signature does not match the signed call")]
    InvalidSignature,
}

/// Account identity: the trailing 20 bytes of `SHA-256(ed25519 public key)`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    pub const fn from_bytes(bytes: [u8; ADDRESS_LEN]) -> Self {
        Address(bytes)
    }

    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        let digest: [u8; 32] = Sha256::digest(key.as_bytes()).into();
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes.copy_from_slice(&digest[32 - ADDRESS_LEN..]);
        Address(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        let bytes =
            hex::decode(digits).map_err(|_| IdentityError::MalformedAddress(s.to_string()))?;
        let bytes: [u8; ADDRESS_LEN] = bytes
            .try_into()
            .map_err(|_| IdentityError::MalformedAddress(s.to_string()))?;
        Ok(Address(bytes))
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        encoded.parse().map_err(D::Error::custom)
    }
}

/// An ed25519 key pair able to authorize calls.
#[derive(Clone)]
pub struct Signer {
    key: SigningKey,
}

impl Signer {
    pub fn generate() -> Self {
        let mut rng = OsRng;
        Self {
            key: SigningKey::generate(&mut rng),
        }
    }

    pub fn from_secret_hex(secret_hex: &str) -> Result<Self, IdentityError> {
        let bytes = hex::decode(secret_hex.trim()).map_err(|_| IdentityError::MalformedSecret)?;
        let secret: [u8; 32] = bytes
            .try_into()
            .map_err(|_| IdentityError::MalformedSecret)?;
        Ok(Self {
            key: SigningKey::from_bytes(&secret),
        })
    }

    pub fn secret_hex(&self) -> String {
        hex::encode(self.key.to_bytes())
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.key.verifying_key().to_bytes()
    }

    pub fn address(&self) -> Address {
        Address::from_verifying_key(&self.key.verifying_key())
    }

    pub fn sign_digest(&self, digest: &[u8; 32]) -> [u8; 64] {
        self.key.sign(digest).to_bytes()
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

/// Checks `signature` over `digest` and returns the signer's address.
pub fn recover_signer(
    public_key: &[u8],
    digest: &[u8; 32],
    signature: &[u8],
) -> Result<Address, IdentityError> {
    let key_bytes: [u8; 32] = public_key
        .try_into()
        .map_err(|_| IdentityError::MalformedKey)?;
    let key = VerifyingKey::from_bytes(&key_bytes).map_err(|_| IdentityError::MalformedKey)?;
    let signature =
        Signature::from_slice(signature).map_err(|_| IdentityError::MalformedSignature)?;
    key.verify_strict(digest, &signature)
        .map_err(|_| IdentityError::InvalidSignature)?;
    Ok(Address::from_verifying_key(&key))
}

pub(crate) mod serde_bytes {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        hex::decode(&encoded).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_is_stable_for_a_key() {
        let signer = Signer::generate();
        let restored = Signer::from_secret_hex(&signer.secret_hex()).unwrap();
        assert_eq!(signer.address(), restored.address());
        assert_ne!(signer.address(), Signer::generate().address());
    }

    #[test]
    fn address_text_form() {
        let address = Address::from_bytes([0xab; ADDRESS_LEN]);
        let text = address.to_string();
        assert_eq!(text, format!("0x{}", "ab".repeat(ADDRESS_LEN)));
        assert_eq!(text.parse::<Address>().unwrap(), address);
        assert_eq!(
            "AB".repeat(ADDRESS_LEN).parse::<Address>().unwrap(),
            address
        );
        assert!(matches!(
            "0x1234".parse::<Address>(),
            Err(IdentityError::MalformedAddress(_))
        ));
    }

    #[test]
    fn recovers_the_signing_address() {
        let signer = Signer::generate();
        let digest = [7u8; 32];
        let sig = signer.sign_digest(&digest);
        let address = recover_signer(&signer.public_key(), &digest, &sig).unwrap();
        assert_eq!(address, signer.address());
    }

    #[test]
    fn rejects_signature_over_other_digest() {
        let signer = Signer::generate();
        let sig = signer.sign_digest(&[1u8; 32]);
        let err = recover_signer(&signer.public_key(), &[2u8; 32], &sig).unwrap_err();
        assert_eq!(err, IdentityError::InvalidSignature);
        let err = recover_signer(&[0u8; 3], &[2u8; 32], &sig).unwrap_err();
        assert_eq!(err, IdentityError::MalformedKey);
        let err = recover_signer(&signer.public_key(), &[1u8; 32], &sig[..10]).unwrap_err();
        assert_eq!(err, IdentityError::MalformedSignature);
    }

    #[test]
    fn rejects_short_secret() {
        assert_eq!(
            Signer::from_secret_hex("abcd").unwrap_err(),
            IdentityError::MalformedSecret
        );
    }
}
