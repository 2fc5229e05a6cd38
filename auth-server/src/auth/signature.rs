// auth-server/src/auth/signature.rs
use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, VerifyingKey};
use sha3::{Digest, Keccak256};
use thiserror::Error;

pub type Address = [u8; 20];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature is not valid hex")]
    InvalidHex,

    #[error("signature must decode to 65 bytes, got {0}")]
    InvalidLength(usize),

    #[error("recovery id must be 0/1 or 27/28, got {0}")]
    InvalidRecoveryId(u8),

    #[error("invalid ECDSA signature bytes")]
    InvalidSignature,

    #[error("failed recovering signer from signature")]
    RecoveryFailed,
}

/// Keccak-256 of `data`
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// EIP-191 `personal_sign` digest of a text message
pub fn eip191_hash(message: &str) -> [u8; 32] {
    let bytes = message.as_bytes();
    let prefix = format!("\x19Ethereum Signed Message:\n{}", bytes.len());
    let mut hasher = Keccak256::new();
    hasher.update(prefix.as_bytes());
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// Decode a hex signature, `0x` prefix optional
pub fn decode_signature(value: &str) -> Result<Vec<u8>, SignatureError> {
    let trimmed = value.trim();
    let hex_part = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    hex::decode(hex_part).map_err(|_| SignatureError::InvalidHex)
}

fn normalize_recovery_id(raw: u8) -> Result<RecoveryId, SignatureError> {
    let id = match raw {
        27 | 28 => raw - 27,
        0 | 1 => raw,
        _ => return Err(SignatureError::InvalidRecoveryId(raw)),
    };
    RecoveryId::try_from(id).map_err(|_| SignatureError::InvalidRecoveryId(raw))
}

/// Recover the signer of a 65-byte `r || s || v` signature over `prehash`
pub fn recover_address(prehash: &[u8; 32], signature: &[u8]) -> Result<Address, SignatureError> {
    if signature.len() != 65 {
        return Err(SignatureError::InvalidLength(signature.len()));
    }

    let sig = EcdsaSignature::try_from(&signature[..64]).map_err(|_| SignatureError::InvalidSignature)?;
    let recovery_id = normalize_recovery_id(signature[64])?;

    let verifying_key = VerifyingKey::recover_from_prehash(prehash, &sig, recovery_id)
        .map_err(|_| SignatureError::RecoveryFailed)?;

    Ok(address_from_verifying_key(&verifying_key))
}

/// Ethereum address of a secp256k1 public key
pub fn address_from_verifying_key(key: &VerifyingKey) -> Address {
    let encoded = key.to_encoded_point(false);
    // Uncompressed point: 0x04 || X || Y
    let digest = keccak256(&encoded.as_bytes()[1..]);

    let mut address = [0u8; 20];
    address.copy_from_slice(&digest[12..]);
    address
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::ecdsa::SigningKey;

    // Well-known development key (anvil/hardhat account #0)
    const DEV_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const DEV_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    fn sign(key: &SigningKey, message: &str, v_offset: u8) -> Vec<u8> {
        let (sig, recid) = key.sign_prehash_recoverable(&eip191_hash(message)).unwrap();
        let mut bytes = sig.to_bytes().to_vec();
        bytes.push(recid.to_byte() + v_offset);
        bytes
    }

    #[test]
    fn test_address_of_dev_key() {
        let key = SigningKey::from_slice(&hex::decode(DEV_KEY).unwrap()).unwrap();
        let address = address_from_verifying_key(key.verifying_key());
        assert_eq!(siwe::eip55(&address), DEV_ADDRESS);
    }

    #[test]
    fn test_recovers_signer_with_both_v_conventions() {
        let key = SigningKey::from_slice(&hex::decode(DEV_KEY).unwrap()).unwrap();
        let expected = address_from_verifying_key(key.verifying_key());
        let hash = eip191_hash("hello");

        for v_offset in [0, 27] {
            let sig = sign(&key, "hello", v_offset);
            assert_eq!(recover_address(&hash, &sig).unwrap(), expected);
        }

        // Same signature over another message recovers someone else
        let sig = sign(&key, "hello", 27);
        assert_ne!(recover_address(&eip191_hash("hello!"), &sig).ok(), Some(expected));
    }

    #[test]
    fn test_rejects_malformed_signatures() {
        let hash = eip191_hash("hello");
        assert_eq!(recover_address(&hash, &[0u8; 10]), Err(SignatureError::InvalidLength(10)));

        let mut sig = vec![1u8; 65];
        sig[64] = 5;
        assert_eq!(recover_address(&hash, &sig), Err(SignatureError::InvalidRecoveryId(5)));

        assert_eq!(decode_signature("0xzz"), Err(SignatureError::InvalidHex));
        assert_eq!(decode_signature("0x0a0b").unwrap(), vec![0x0a, 0x0b]);
        assert_eq!(decode_signature("0a0b").unwrap(), vec![0x0a, 0x0b]);
    }
}
