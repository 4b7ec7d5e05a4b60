//! mailpost — compose multipart email and deliver it over authenticated SMTP.
//!
//! The pipeline for one send is validate → package → guard → compose →
//! deliver: recipient addresses are pattern-checked, folder attachments are
//! zipped in place, aggregate size and subject length are enforced, a
//! multipart/mixed wire message is built, and a single SMTP session
//! transmits it to the full envelope (To ∪ Cc ∪ Bcc — Bcc recipients never
//! appear in headers). A companion [`archive`] module also bundles raw
//! files into an email-bound zip and unpacks received archives, reversing
//! the `.safe` rename used to defeat filename-based attachment filtering.

pub mod address;
pub mod archive;
pub mod compose;
pub mod dispatch;
pub mod encoding;
pub mod errors;
pub mod guard;
pub mod message;
pub mod transport;

// Re-exports
pub use address::{is_valid_address, validate_addresses};
pub use archive::{
    bundle_attachments, is_restricted, package_attachments, unpack_archive, zip_directory,
    RestrictedPolicy, SAFE_SUFFIX,
};
pub use compose::{Composer, MimeComposer};
pub use dispatch::{send, send_with};
pub use errors::{Error, Result};
pub use guard::{
    check_subject, check_total_size, default_subject, total_size, MAX_ATTACHMENT_TOTAL,
    MAX_SUBJECT_BYTES,
};
pub use message::{Attachment, Message, MessageOptions, WireMessage};
pub use transport::{SmtpEndpoint, SmtpTransport, Transport};
