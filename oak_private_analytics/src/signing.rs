//
// Copyright 2026 The Project Oak Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Ethereum-style personal message signing over secp256k1.
//!
//! Signatures are 65 bytes `r ‖ s ‖ v` with `v = 27 + recovery id`, and
//! signers are identified by the last 20 bytes of the Keccak-256 hash of
//! their uncompressed public key.

use core::{fmt, str::FromStr};

use k256::{
    ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey},
    elliptic_curve::sec1::ToEncodedPoint,
};
use rand_core::OsRng;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Keccak256};

use crate::{AnalyticsError, Result};

pub const ADDRESS_SIZE: usize = 20;
pub const SIGNATURE_SIZE: usize = 65;
pub const HASH_SIZE: usize = 32;

/// Prefix prepended, together with the decimal message length, before hashing
/// a personal message.
pub const PERSONAL_MESSAGE_PREFIX: &str = "\x19Ethereum Signed Message:\n";

const RECOVERY_ID_OFFSET: u8 = 27;

pub fn keccak256(data: &[u8]) -> [u8; HASH_SIZE] {
    Keccak256::digest(data).into()
}

/// Hash signed by `personal_sign`: Keccak-256 over the prefix, the decimal
/// byte length of `message` and `message` itself.
pub fn personal_message_hash(message: &[u8]) -> [u8; HASH_SIZE] {
    let mut hasher = Keccak256::new();
    hasher.update(PERSONAL_MESSAGE_PREFIX.as_bytes());
    hasher.update(message.len().to_string().as_bytes());
    hasher.update(message);
    hasher.finalize().into()
}

/// A 20-byte account address, displayed with the mixed-case checksum.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Address([u8; ADDRESS_SIZE]);

impl Address {
    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        let point = key.to_encoded_point(false);
        // Skip the 0x04 SEC1 tag.
        let hash = keccak256(&point.as_bytes()[1..]);
        let mut address = [0u8; ADDRESS_SIZE];
        address.copy_from_slice(&hash[HASH_SIZE - ADDRESS_SIZE..]);
        Self(address)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_SIZE] {
        &self.0
    }

    /// Returns the `0x`-prefixed checksummed form.
    pub fn to_checksum_string(&self) -> String {
        let lower = hex::encode(self.0);
        let hash = keccak256(lower.as_bytes());
        let mut checksummed = String::with_capacity(2 + lower.len());
        checksummed.push_str("0x");
        for (i, c) in lower.chars().enumerate() {
            let byte = hash[i / 2];
            let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };
            if c.is_ascii_alphabetic() && nibble >= 8 {
                checksummed.push(c.to_ascii_uppercase());
            } else {
                checksummed.push(c);
            }
        }
        checksummed
    }
}

impl From<[u8; ADDRESS_SIZE]> for Address {
    fn from(bytes: [u8; ADDRESS_SIZE]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_checksum_string())
    }
}

/// Parses a hex address with or without the `0x` prefix. The checksum casing is
/// not enforced.
impl FromStr for Address {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self> {
        let mut bytes = [0u8; ADDRESS_SIZE];
        decode_prefixed_hex(s, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> core::result::Result<Self, D::Error> {
        String::deserialize(deserializer)?.parse().map_err(de::Error::custom)
    }
}

/// A recoverable signature in `r ‖ s ‖ v` layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecoverableSignature([u8; SIGNATURE_SIZE]);

impl RecoverableSignature {
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_SIZE] {
        &self.0
    }

    fn split(&self) -> Result<(Signature, RecoveryId)> {
        let signature = Signature::from_slice(&self.0[..64])
            .map_err(|err| AnalyticsError::InvalidSignature(format!("malformed r or s: {err}")))?;
        // Accept both the 27/28 and the raw 0/1 encodings of v.
        let v = self.0[64];
        let recovery_byte = if v >= RECOVERY_ID_OFFSET { v - RECOVERY_ID_OFFSET } else { v };
        let recovery_id = RecoveryId::from_byte(recovery_byte)
            .ok_or_else(|| AnalyticsError::InvalidSignature(format!("invalid v value {v}")))?;
        Ok((signature, recovery_id))
    }
}

impl From<[u8; SIGNATURE_SIZE]> for RecoverableSignature {
    fn from(bytes: [u8; SIGNATURE_SIZE]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for RecoverableSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for RecoverableSignature {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self> {
        let mut bytes = [0u8; SIGNATURE_SIZE];
        decode_prefixed_hex(s, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl Serialize for RecoverableSignature {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RecoverableSignature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> core::result::Result<Self, D::Error> {
        String::deserialize(deserializer)?.parse().map_err(de::Error::custom)
    }
}

fn decode_prefixed_hex(s: &str, out: &mut [u8]) -> Result<()> {
    let digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    hex::decode_to_slice(digits, out).map_err(|err| {
        AnalyticsError::InvalidParameter(format!(
            "expected {} hex-encoded bytes, got {:?}: {err}",
            out.len(),
            s
        ))
    })
}

/// The process-wide signing key. Created once at startup and used for every
/// response; the private key never leaves this type.
pub struct SigningIdentity {
    key: SigningKey,
    address: Address,
}

impl SigningIdentity {
    /// Creates a fresh identity from the operating system's entropy source.
    pub fn generate() -> Self {
        Self::from_key(SigningKey::random(&mut OsRng))
    }

    /// Loads an identity from a 32-byte big-endian secret scalar.
    pub fn from_bytes(secret: &[u8]) -> Result<Self> {
        let key = SigningKey::from_slice(secret).map_err(|err| {
            AnalyticsError::InvalidParameter(format!("invalid secp256k1 secret key: {err}"))
        })?;
        Ok(Self::from_key(key))
    }

    fn from_key(key: SigningKey) -> Self {
        let address = Address::from_verifying_key(key.verifying_key());
        Self { key, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Signs `message` with the personal message scheme.
    pub fn sign_personal_message(&self, message: &[u8]) -> Result<RecoverableSignature> {
        let hash = personal_message_hash(message);
        let (signature, recovery_id) = self
            .key
            .sign_prehash_recoverable(&hash)
            .map_err(|err| AnalyticsError::SigningFailure(err.to_string()))?;
        let mut bytes = [0u8; SIGNATURE_SIZE];
        bytes[..64].copy_from_slice(&signature.to_bytes());
        bytes[64] = RECOVERY_ID_OFFSET + recovery_id.to_byte();
        Ok(RecoverableSignature(bytes))
    }
}

impl fmt::Debug for SigningIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningIdentity").field("address", &self.address).finish_non_exhaustive()
    }
}

/// Returns the address whose key produced `signature` over `message`.
pub fn recover_signer(message: &[u8], signature: &RecoverableSignature) -> Result<Address> {
    let hash = personal_message_hash(message);
    let (signature, recovery_id) = signature.split()?;
    let key = VerifyingKey::recover_from_prehash(&hash, &signature, recovery_id)
        .map_err(|err| AnalyticsError::InvalidSignature(err.to_string()))?;
    Ok(Address::from_verifying_key(&key))
}

/// Checks that `signature` over `message` was produced by `expected`.
///
/// Returns `Ok(false)` for a well-formed signature by some other key and an
/// error for a signature no key could have produced.
pub fn verify_signature(
    message: &[u8],
    signature: &RecoverableSignature,
    expected: &Address,
) -> Result<bool> {
    Ok(recover_signer(message, signature)? == *expected)
}
