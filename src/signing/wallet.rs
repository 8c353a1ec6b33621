//! Signing identities
//!
//! A [`Wallet`] is a secp256k1 key plus the ledger address derived from it.
//! Signatures are RFC 6979 deterministic and low-s normalized, so the same
//! digest and key always produce the same `(v, r, s)`.

use alloy_primitives::{keccak256, Address, B256};
use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroizing;

use crate::types::{b256_hex, NotaryError, Result};

/// Recoverable ECDSA signature in ledger form (`v` is 27 or 28)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub v: u8,
    #[serde(with = "b256_hex")]
    pub r: B256,
    #[serde(with = "b256_hex")]
    pub s: B256,
}

impl Signature {
    /// 65-byte `r || s || v`
    pub fn to_bytes(&self) -> [u8; 65] {
        let mut out = [0u8; 65];
        out[..32].copy_from_slice(self.r.as_slice());
        out[32..64].copy_from_slice(self.s.as_slice());
        out[64] = self.v;
        out
    }

    /// Recovery parity (0 or 1)
    pub fn parity(&self) -> Result<u8> {
        match self.v {
            27 | 28 => Ok(self.v - 27),
            0 | 1 => Ok(self.v),
            other => Err(NotaryError::Signing(format!("invalid recovery byte {other}"))),
        }
    }
}

/// A signing identity
#[derive(Clone)]
pub struct Wallet {
    key: SigningKey,
    address: Address,
}

impl Wallet {
    /// Load from a hex private key (0x prefix optional)
    pub fn from_hex(secret: &str) -> Result<Self> {
        let trimmed = secret.trim();
        let trimmed = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = Zeroizing::new(
            hex::decode(trimmed).map_err(|e| NotaryError::Signing(format!("private key is not hex: {e}")))?,
        );
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(secret: &[u8]) -> Result<Self> {
        if secret.len() != 32 {
            return Err(NotaryError::Signing(format!(
                "private key must be 32 bytes, got {}",
                secret.len()
            )));
        }
        let key = SigningKey::from_slice(secret)
            .map_err(|e| NotaryError::Signing(format!("unusable private key: {e}")))?;
        let address = address_of(key.verifying_key());
        Ok(Self { key, address })
    }

    /// Fresh random identity (development mode)
    pub fn random() -> Self {
        let key = SigningKey::random(&mut OsRng);
        let address = address_of(key.verifying_key());
        Self { key, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Key material for transaction signers
    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.key
    }

    /// Sign a 32-byte digest
    pub fn sign_digest(&self, digest: &B256) -> Result<Signature> {
        let (sig, recid) = self
            .key
            .sign_prehash_recoverable(digest.as_slice())
            .map_err(|e| NotaryError::Signing(format!("signing failed: {e}")))?;

        // Ledgers only accept low-s signatures; flipping s flips the parity
        let (sig, recid) = match sig.normalize_s() {
            Some(normalized) => (
                normalized,
                RecoveryId::new(!recid.is_y_odd(), recid.is_x_reduced()),
            ),
            None => (sig, recid),
        };

        let bytes = sig.to_bytes();
        Ok(Signature {
            v: 27 + recid.to_byte(),
            r: B256::from_slice(&bytes[..32]),
            s: B256::from_slice(&bytes[32..]),
        })
    }
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet").field("address", &self.address).finish_non_exhaustive()
    }
}

/// Ledger address of a public key: last 20 bytes of keccak(x || y)
pub fn address_of(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}

/// Recover the signer address of `digest`
pub fn recover(digest: &B256, signature: &Signature) -> Result<Address> {
    let parity = signature.parity()?;
    let mut rs = [0u8; 64];
    rs[..32].copy_from_slice(signature.r.as_slice());
    rs[32..].copy_from_slice(signature.s.as_slice());

    let sig = EcdsaSignature::from_slice(&rs)
        .map_err(|e| NotaryError::Signing(format!("malformed signature: {e}")))?;
    let recid = RecoveryId::from_byte(parity)
        .ok_or_else(|| NotaryError::Signing("invalid recovery id".to_string()))?;
    let key = VerifyingKey::recover_from_prehash(digest.as_slice(), &sig, recid)
        .map_err(|e| NotaryError::Signing(format!("signature does not recover: {e}")))?;
    Ok(address_of(&key))
}

/// Whether `signature` over `digest` was produced by `expected`
pub fn verify(digest: &B256, signature: &Signature, expected: &Address) -> bool {
    matches!(recover(digest, signature), Ok(addr) if addr == *expected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    // Well-known development key #0
    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_address_derivation() {
        let wallet = Wallet::from_hex(DEV_KEY).unwrap();
        assert_eq!(wallet.address(), address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266"));
    }

    #[test]
    fn test_sign_and_recover() {
        let wallet = Wallet::from_hex(DEV_KEY).unwrap();
        let digest = keccak256(b"meeting");
        let sig = wallet.sign_digest(&digest).unwrap();
        assert!(sig.v == 27 || sig.v == 28);
        assert_eq!(recover(&digest, &sig).unwrap(), wallet.address());
        assert!(verify(&digest, &sig, &wallet.address()));
        assert!(!verify(&keccak256(b"other"), &sig, &wallet.address()));
    }

    #[test]
    fn test_deterministic_signatures() {
        let wallet = Wallet::from_hex(DEV_KEY).unwrap();
        let digest = keccak256(b"same input");
        assert_eq!(wallet.sign_digest(&digest).unwrap(), wallet.sign_digest(&digest).unwrap());
    }

    #[test]
    fn test_low_s() {
        // secp256k1 order / 2
        let half_n = B256::from_slice(
            &hex::decode("7fffffffffffffffffffffffffffffff5d576e7357a4501ddfe92f46681b20a0").unwrap(),
        );
        let wallet = Wallet::random();
        for i in 0u8..16 {
            let sig = wallet.sign_digest(&keccak256([i])).unwrap();
            assert!(sig.s <= half_n);
        }
    }

    #[test]
    fn test_unusable_keys() {
        assert!(matches!(Wallet::from_hex("not-hex"), Err(NotaryError::Signing(_))));
        assert!(matches!(Wallet::from_hex("0x1234"), Err(NotaryError::Signing(_))));
        assert!(matches!(Wallet::from_bytes(&[0u8; 32]), Err(NotaryError::Signing(_))));
    }

    #[test]
    fn test_debug_hides_key() {
        let wallet = Wallet::from_hex(DEV_KEY).unwrap();
        let debug = format!("{wallet:?}");
        assert!(!debug.contains("ac0974"));
    }
}
