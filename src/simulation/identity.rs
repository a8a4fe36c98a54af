//! Provisional transaction identity.

use crate::types::{ProvisionalTransaction, TransactionBody, UnsignedTransaction};
use alloy::{
    consensus::SignableTransaction,
    primitives::{Address, Signature, TxHash, U256},
};

/// The signature a provisional transaction sent by `from` is stamped with.
///
/// `r` carries the sender so identical bodies of different senders get different hashes. `s = 0`
/// is outside the valid range of secp256k1 signatures, so it never recovers to a signer and
/// cannot be mistaken for a real one.
pub fn provisional_signature(from: Address) -> Signature {
    Signature::new(U256::from_be_slice(from.as_slice()), U256::ZERO, false)
}

/// Stamps `transaction` with the [`provisional_signature`] of its sender and returns it together
/// with the resulting hash.
///
/// The hash gives the transaction a stable identity before it is signed by the user. The returned
/// [`ProvisionalTransaction`] is not validly signed and must never be broadcast.
pub fn stamp_provisional_identity(transaction: UnsignedTransaction) -> ProvisionalTransaction {
    let hash = provisional_hash(transaction.from, &transaction.body);
    ProvisionalTransaction::new_unchecked(transaction.from, transaction.body, hash)
}

fn provisional_hash(from: Address, body: &TransactionBody) -> TxHash {
    let signature = provisional_signature(from);
    match body.clone() {
        TransactionBody::Legacy(tx) => *tx.into_signed(signature).hash(),
        TransactionBody::Eip2930(tx) => *tx.into_signed(signature).hash(),
        TransactionBody::Eip1559(tx) => *tx.into_signed(signature).hash(),
    }
}
