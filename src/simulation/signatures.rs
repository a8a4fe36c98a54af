//! Co-execution of signed messages.
//!
//! Messages are never signed for real. Instead the ecrecover precompile is moved away and replaced
//! by a contract that answers the claimed signer for every known digest, so contracts verifying
//! the message (e.g. permits) behave as if it had been signed.

use crate::{
    constants::{CODE_READER_ADDRESS, ECRECOVER_ADDRESS, MOVED_ECRECOVER_ADDRESS},
    error::SimulationError,
    types::{SignedMessage, SignedMessageRequest},
};
use alloy::{
    primitives::{B256, Bytes, eip191_hash_message, hex, map::B256HashMap},
    rpc::types::state::{AccountOverride, StateOverride},
};

/// Replacement ecrecover code.
///
/// Returns `sload(calldataload(0))` if it is set, otherwise forwards the call to the precompile at
/// [`MOVED_ECRECOVER_ADDRESS`] and returns its output.
const ECRECOVER_OVERRIDE_PREFIX: [u8; 32] =
    hex!("60003554801560115760005260206000f35b5036600060003760206000366000");
const ECRECOVER_OVERRIDE_SUFFIX: [u8; 7] = hex!("5afa503d6000f3");

/// Returns the code of the address passed as the first calldata word.
const CODE_READER_CODE: [u8; 15] = hex!("600035803b8060006000843c6000f3");

/// Digest a contract verifying `request` passes to ecrecover.
pub fn message_digest(request: &SignedMessageRequest) -> Result<B256, SimulationError> {
    match request {
        SignedMessageRequest::PersonalSign { message } => Ok(eip191_hash_message(message)),
        SignedMessageRequest::TypedDataV3 { typed_data }
        | SignedMessageRequest::TypedDataV4 { typed_data } => typed_data
            .eip712_signing_hash()
            .map_err(|err| SimulationError::InvalidMessage(err.to_string())),
        SignedMessageRequest::TypedDataV1 { .. } | SignedMessageRequest::EthSign { .. } => {
            Err(SimulationError::NotImplemented(request.method().to_string()))
        }
    }
}

/// Code installed at the ecrecover address while signed messages are simulated.
pub fn ecrecover_override_code() -> Bytes {
    [
        ECRECOVER_OVERRIDE_PREFIX.as_slice(),
        &[0x73],
        MOVED_ECRECOVER_ADDRESS.as_slice(),
        ECRECOVER_OVERRIDE_SUFFIX.as_slice(),
    ]
    .concat()
    .into()
}

/// Adds the overrides that make `messages` appear signed to `overrides`.
///
/// Does nothing without messages.
pub fn extend_with_signature_overrides(
    overrides: &mut StateOverride,
    messages: &[SignedMessage],
) -> Result<(), SimulationError> {
    if messages.is_empty() {
        return Ok(());
    }

    let signers = messages
        .iter()
        .map(|message| Ok((message_digest(&message.request)?, message.signer.into_word())))
        .collect::<Result<B256HashMap<B256>, SimulationError>>()?;

    let account = overrides.entry(ECRECOVER_ADDRESS).or_default();
    account.code = Some(ecrecover_override_code());
    account.move_precompile_to = Some(MOVED_ECRECOVER_ADDRESS);
    account.state_diff.get_or_insert_default().extend(signers);
    Ok(())
}

/// Override installing the code reader helper at [`CODE_READER_ADDRESS`].
pub fn code_reader_override() -> StateOverride {
    let mut overrides = StateOverride::default();
    overrides.insert(
        CODE_READER_ADDRESS,
        AccountOverride::default().with_code(Bytes::from_static(&CODE_READER_CODE)),
    );
    overrides
}
