//! Writing credential pointers onto cards.

use kiosk_codec::{encoded_len, BlockLayout, CodecError, DecodeOutcome};
use kiosk_types::{CardId, CredentialPointer};
use serde_json::Value;
use tracing::info;

use crate::session::{read_payload, write_payload, CardKey};
use crate::transport::CardTransport;
use crate::CardError;

/// Build the compact pointer object a card stores, checking that it fits
/// `layout` before anything touches a card.
pub fn prepare_card_payload(
    registry_key: &str,
    asset_ref: &str,
    holder_id: &str,
    layout: &BlockLayout,
) -> Result<Value, CardError> {
    let payload = CredentialPointer::new(registry_key, asset_ref, holder_id).to_payload();
    let size = encoded_len(&payload)?;
    let capacity = layout.capacity();
    if size > capacity {
        return Err(CodecError::PayloadTooLarge { size, capacity }.into());
    }
    Ok(payload)
}

/// Write `payload` and read it back. Returns the number of blocks used.
pub fn provision_card(
    transport: &mut dyn CardTransport,
    card: &CardId,
    payload: &Value,
    layout: &BlockLayout,
    key: &CardKey,
) -> Result<usize, CardError> {
    let written = write_payload(transport, card, payload, layout, key)?;
    match read_payload(transport, card, layout, key)? {
        DecodeOutcome::Payload(read) if &read == payload => {
            info!(card = %card, blocks = written, "card provisioned");
            Ok(written)
        }
        DecodeOutcome::Payload(read) => Err(CardError::ReadBackMismatch(read.to_string())),
        DecodeOutcome::Empty => Err(CardError::ReadBackMismatch("card reads back empty".into())),
        DecodeOutcome::Malformed(reason) => Err(CardError::ReadBackMismatch(reason)),
    }
}
