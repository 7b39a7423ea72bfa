//! Local signing with session key material.

use crate::{error::SigningError, store::PrivateKey, types::KeyType};
use alloy_primitives::{B256, Bytes, hex};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use ecdsa::RecoveryId;
use p256::{
    ecdsa::{
        Signature as P256Signature, SigningKey as P256SigningKey, VerifyingKey,
        signature::hazmat::PrehashSigner,
    },
    elliptic_curve::sec1::ToEncodedPoint,
};

/// A fresh keypair. The public key is in the form the wallet expects for `key_type`.
#[derive(Debug)]
pub struct GeneratedKey {
    pub key_type: KeyType,
    pub public_key: String,
    pub private_key: PrivateKey,
}

/// Signs a prepared-call `digest`.
///
/// * `p256`: low-S `r || s || v` with `v = 27 + y parity`.
/// * `secp256k1`: the 65-byte recoverable signature.
pub fn sign_digest(
    key_type: KeyType,
    private_key: &PrivateKey,
    digest: &[u8],
) -> Result<Bytes, SigningError> {
    let digest =
        B256::try_from(digest).map_err(|_| SigningError::MalformedDigest(digest.len()))?;
    match key_type {
        KeyType::P256 => sign_p256(private_key, &digest),
        KeyType::Secp256k1 => {
            let signer = parse_private_key_secp256k1(private_key)?;
            let signature = signer.sign_hash_sync(&digest)?;
            Ok(Bytes::copy_from_slice(&signature.as_bytes()))
        }
        KeyType::WebAuthnP256 => Err(SigningError::UnsupportedKeyType(key_type)),
    }
}

fn sign_p256(private_key: &PrivateKey, digest: &B256) -> Result<Bytes, SigningError> {
    let signing_key = parse_private_key_p256(private_key)?;
    let signature: P256Signature = signing_key.sign_prehash(digest.as_slice())?;
    let signature = signature.normalize_s().unwrap_or(signature);
    let recovery_id = RecoveryId::trial_recovery_from_prehash(
        signing_key.verifying_key(),
        digest.as_slice(),
        &signature,
    )?;

    let mut bytes = Vec::with_capacity(65);
    bytes.extend_from_slice(&signature.to_bytes());
    bytes.push(27 + u8::from(recovery_id.is_y_odd()));
    Ok(bytes.into())
}

fn parse_private_key_p256(private_key: &PrivateKey) -> Result<P256SigningKey, SigningError> {
    P256SigningKey::from_bytes((&private_key.as_b256().0).into())
        .map_err(|_| SigningError::InvalidKey("not a valid p256 scalar".to_string()))
}

fn parse_private_key_secp256k1(private_key: &PrivateKey) -> Result<PrivateKeySigner, SigningError> {
    PrivateKeySigner::from_bytes(private_key.as_b256())
        .map_err(|_| SigningError::InvalidKey("not a valid secp256k1 scalar".to_string()))
}

/// Derives the public key the wallet registers for `private_key`.
///
/// p256 keys are the uncompressed point without the SEC1 tag, secp256k1 keys are the address.
pub fn public_key(key_type: KeyType, private_key: &PrivateKey) -> Result<String, SigningError> {
    match key_type {
        KeyType::P256 => {
            let signing_key = parse_private_key_p256(private_key)?;
            let point = VerifyingKey::from(&signing_key).as_affine().to_encoded_point(false);
            Ok(hex::encode_prefixed(&point.as_bytes()[1..]))
        }
        KeyType::Secp256k1 => {
            let signer = parse_private_key_secp256k1(private_key)?;
            Ok(hex::encode_prefixed(signer.address()))
        }
        KeyType::WebAuthnP256 => Err(SigningError::UnsupportedKeyType(key_type)),
    }
}

/// Generates a random keypair for `key_type`.
pub fn generate_key(key_type: KeyType) -> Result<GeneratedKey, SigningError> {
    if key_type == KeyType::WebAuthnP256 {
        return Err(SigningError::UnsupportedKeyType(key_type));
    }
    // almost every 32-byte string is a valid scalar on both curves
    for _ in 0..16 {
        let private_key = PrivateKey::new(B256::random());
        if let Ok(public_key) = public_key(key_type, &private_key) {
            return Ok(GeneratedKey { key_type, public_key, private_key });
        }
    }
    Err(SigningError::InvalidKey("failed to sample a private key".to_string()))
}
