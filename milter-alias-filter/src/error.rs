use thiserror::Error;

#[derive(Debug, Error)]
pub enum FilterError {
    /// The milter protocol carries recipients as C strings.
    #[error("Recipient {0:?} contains a NUL byte and cannot be handed to the MTA")]
    NulInRecipient(String),

    #[error("Failed to add recipient {recipient}: {reason}")]
    Action { recipient: String, reason: String },
}
