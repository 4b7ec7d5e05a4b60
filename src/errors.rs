//! Error types for mailpost.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Terminal failure for one send operation. Each variant names the
/// offending input so the caller can report it verbatim.
#[derive(Error, Debug)]
pub enum Error {
    /// A From/To/Cc/Bcc entry failed the address pattern check.
    #[error("invalid email address: {0}")]
    InvalidAddress(String),

    /// The message carried no To recipients at all.
    #[error("at least one To recipient is required")]
    NoRecipients,

    #[error("subject is {len} bytes, exceeding the {limit} byte limit")]
    SubjectTooLong { len: usize, limit: usize },

    #[error("email body must not be empty")]
    EmptyBody,

    /// stat/open/read/zip failure on a specific attachment path.
    #[error("attachment I/O failure on {}: {source}", path.display())]
    AttachmentIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("attachments total {total} bytes, exceeding the {limit} byte limit")]
    AttachmentTooLarge { total: u64, limit: u64 },

    /// Deny-listed extension under the reject policy.
    #[error("attachment '{0}' has a restricted extension")]
    RestrictedAttachment(String),

    /// Internal MIME-writer error. Unreachable under valid inputs.
    #[error("failed to compose message: {0}")]
    Compose(String),

    #[error("SMTP authentication failed: {0}")]
    Auth(String),

    /// Connection, protocol, or recipient rejection from the server,
    /// surfaced verbatim.
    #[error("SMTP transport failure: {0}")]
    Transport(String),
}
