use bls::{AggregatePublicKey, PublicKey, PublicKeyBytes, Signature, SignatureBytes};
use ring::digest::{digest, SHA256};
use ssz::DecodeError;
use std::convert::TryInto;
use tree_hash::TreeHash;
use types::primitives::{Domain, H256};

pub fn hash(input: &[u8]) -> Vec<u8> {
    digest(&SHA256, input).as_ref().to_vec()
}

pub fn hash_tree_root<T: TreeHash>(value: &T) -> H256 {
    H256::from_slice(&value.tree_hash_root())
}

/// The root signed by a block/header/exit's accompanying BLS signature. Domain separation for
/// this protocol version is carried entirely by `bls_verify`'s `Domain` argument, not folded into
/// the hashed message, so this is just the object's own hash tree root.
pub fn signed_root<T: TreeHash>(value: &T) -> H256 {
    hash_tree_root(value)
}

pub fn bls_verify(
    pubkey: &PublicKeyBytes,
    message: &[u8],
    signature: &SignatureBytes,
    domain: Domain,
) -> Result<bool, DecodeError> {
    let public_key: PublicKey = pubkey.try_into()?;
    let signature: Signature = signature.try_into()?;

    Ok(signature.verify(message, domain.to_integer(), &public_key))
}

pub fn bls_aggregate_pubkeys(pubkeys: &[PublicKey]) -> AggregatePublicKey {
    let mut aggregated = AggregatePublicKey::new();
    for pubkey in pubkeys {
        aggregated.add(pubkey);
    }
    aggregated
}
