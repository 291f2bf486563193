//! Lead capture from the public WhatsApp widget.

use tracing::info;

use crate::backend::{Backend, BackendError};
use crate::entities::WhatsAppContact;
use crate::record::{from_row, to_row, Record};

/// Store one contact event and return it as stored.
///
/// Not an optimistic mutation: visitors never see the contacts list.
pub async fn record_contact(
    backend: &dyn Backend,
    contact: WhatsAppContact,
) -> Result<WhatsAppContact, BackendError> {
    let row = to_row(&contact).map_err(|e| BackendError::Payload(e.to_string()))?;
    let stored = backend.insert(WhatsAppContact::TABLE, row).await?;
    let stored: WhatsAppContact =
        from_row(stored).map_err(|e| BackendError::Payload(e.to_string()))?;
    info!(id = %stored.id, source = ?stored.source_page, "whatsapp contact recorded");
    Ok(stored)
}
