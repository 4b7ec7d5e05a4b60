//! The single send pipeline: validate, package, guard, compose, deliver.
//! No state is shared across calls; parallel sends are independent.

use crate::archive::RestrictedPolicy;
use crate::compose::{Composer, MimeComposer};
use crate::errors::Result;
use crate::message::{Message, MessageOptions};
use crate::transport::{SmtpEndpoint, SmtpTransport, Transport};
use tracing::info;

/// Sends one message through the default composer and SMTP transport.
/// Zip archives derived from folder attachments are left on disk at
/// `<folder>.zip` for the caller to clean up.
pub async fn send(
    endpoint: &SmtpEndpoint,
    options: MessageOptions,
    policy: RestrictedPolicy,
) -> Result<()> {
    send_with(&MimeComposer, &SmtpTransport, endpoint, options, policy).await
}

/// Same pipeline with explicit composer and transport, for hosts that swap
/// in their own implementations (and for tests).
pub async fn send_with<C, T>(
    composer: &C,
    transport: &T,
    endpoint: &SmtpEndpoint,
    options: MessageOptions,
    policy: RestrictedPolicy,
) -> Result<()>
where
    C: Composer + Sync,
    T: Transport + Sync,
{
    let message = Message::new(&endpoint.from_address, options, policy)?;
    let wire = composer.compose(&message)?;
    let envelope = message.envelope();
    info!(
        recipients = envelope.len(),
        attachments = message.attachments.len(),
        bytes = wire.len(),
        "composed message, delivering"
    );
    transport.deliver(endpoint, &envelope, &wire).await
}
