//! Message data model: raw send options, the validated [`Message`], and the
//! composed wire bytes.

use crate::address::is_valid_address;
use crate::archive::{self, attachment_io, RestrictedPolicy};
use crate::errors::{Error, Result};
use crate::guard;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Raw, caller-supplied fields for one send. The CLI/config collaborator
/// fills this in; nothing here is validated yet.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageOptions {
    pub to: Vec<String>,
    #[serde(default)]
    pub cc: Vec<String>,
    #[serde(default)]
    pub bcc: Vec<String>,
    /// Empty means "not supplied"; a timestamped default is substituted.
    #[serde(default)]
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub is_html: bool,
    /// File or folder paths; folders are zipped during finalization.
    #[serde(default)]
    pub attachments: Vec<PathBuf>,
}

/// One finalized attachment. `wire_name` is the filename written into the
/// MIME part, which the rename policy may have suffixed with `.safe`; the
/// file on disk is never touched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub path: PathBuf,
    pub wire_name: String,
    pub size_bytes: u64,
}

/// A validated, ready-to-compose message. Constructing one runs the whole
/// pre-composition pipeline: address validation, folder packaging, the
/// restricted-extension policy, and the size/subject/body guards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub from: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub body: String,
    pub is_html: bool,
    pub attachments: Vec<Attachment>,
}

impl Message {
    pub fn new(from: &str, options: MessageOptions, policy: RestrictedPolicy) -> Result<Self> {
        if options.to.is_empty() {
            return Err(Error::NoRecipients);
        }
        // To/Cc/Bcc are caller input and get the pattern check; `from`
        // comes from configuration and is taken as-is.
        for address in options
            .to
            .iter()
            .chain(options.cc.iter())
            .chain(options.bcc.iter())
        {
            if !is_valid_address(address) {
                return Err(Error::InvalidAddress(address.clone()));
            }
        }

        let subject = if options.subject.is_empty() {
            guard::default_subject()
        } else {
            options.subject
        };
        guard::check_subject(&subject)?;

        if options.body.is_empty() {
            return Err(Error::EmptyBody);
        }

        // The policy applies to real input files only; `<dir>.zip` archives
        // the packager derives are this crate's own byproduct and exempt,
        // even though `.zip` sits on the deny list. A packaged path that
        // differs from its input is such a derived archive.
        let packaged = archive::package_attachments(&options.attachments)?;
        let mut attachments = Vec::with_capacity(packaged.len());
        for (original, path) in options.attachments.iter().zip(packaged) {
            let name = archive::file_name_of(&path);
            let wire_name = if &path == original {
                policy.apply(&name)?
            } else {
                name
            };
            let size_bytes = fs::metadata(&path)
                .map_err(|e| attachment_io(&path, e))?
                .len();
            attachments.push(Attachment {
                path,
                wire_name,
                size_bytes,
            });
        }

        let paths: Vec<PathBuf> = attachments.iter().map(|a| a.path.clone()).collect();
        guard::check_total_size(&paths)?;

        Ok(Self {
            from: from.to_string(),
            to: options.to,
            cc: options.cc,
            bcc: options.bcc,
            subject,
            body: options.body,
            is_html: options.is_html,
            attachments,
        })
    }

    /// The full SMTP `RCPT TO` set: To ∪ Cc ∪ Bcc. This is the only place
    /// Bcc recipients ever appear; headers never carry them.
    pub fn envelope(&self) -> Vec<String> {
        let mut all = self.to.clone();
        all.extend(self.cc.iter().cloned());
        all.extend(self.bcc.iter().cloned());
        all
    }
}

/// Immutable composed byte sequence: headers plus boundary-delimited MIME
/// parts. Produced once per send and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct WireMessage(Vec<u8>);

impl WireMessage {
    pub(crate) fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn options(to: &str) -> MessageOptions {
        MessageOptions {
            to: vec![to.to_string()],
            body: "hello".to_string(),
            ..MessageOptions::default()
        }
    }

    #[test]
    fn rejects_empty_recipient_list() {
        let opts = MessageOptions {
            body: "hello".to_string(),
            ..MessageOptions::default()
        };
        let err = Message::new("from@example.com", opts, RestrictedPolicy::Reject).unwrap_err();
        assert!(matches!(err, Error::NoRecipients));
    }

    #[test]
    fn rejects_invalid_recipient() {
        let err =
            Message::new("from@example.com", options("user@@bad"), RestrictedPolicy::Reject)
                .unwrap_err();
        assert!(matches!(err, Error::InvalidAddress(a) if a == "user@@bad"));
    }

    #[test]
    fn from_address_is_taken_as_configured() {
        // "dispatch@localhost" fails the recipient pattern (no dotted
        // domain) but sender identity comes from config unchecked.
        let message = Message::new(
            "dispatch@localhost",
            options("to@example.com"),
            RestrictedPolicy::Reject,
        )
        .unwrap();
        assert_eq!(message.from, "dispatch@localhost");
    }

    #[test]
    fn rejects_invalid_cc_entry() {
        let mut opts = options("to@example.com");
        opts.cc = vec!["not-an-address".to_string()];
        let err = Message::new("from@example.com", opts, RestrictedPolicy::Reject).unwrap_err();
        assert!(matches!(err, Error::InvalidAddress(a) if a == "not-an-address"));
    }

    #[test]
    fn rejects_empty_body() {
        let mut opts = options("to@example.com");
        opts.body = String::new();
        let err = Message::new("from@example.com", opts, RestrictedPolicy::Reject).unwrap_err();
        assert!(matches!(err, Error::EmptyBody));
    }

    #[test]
    fn substitutes_timestamped_default_subject() {
        let message =
            Message::new("from@example.com", options("to@example.com"), RestrictedPolicy::Reject)
                .unwrap();
        assert!(message.subject.starts_with("Email sent at "));
    }

    #[test]
    fn rejects_restricted_file_under_reject_policy() {
        let tmp = tempfile::tempdir().unwrap();
        let nasty = tmp.path().join("payload.exe");
        std::fs::write(&nasty, b"MZ").unwrap();

        let mut opts = options("to@example.com");
        opts.attachments = vec![nasty];
        let err = Message::new("from@example.com", opts, RestrictedPolicy::Reject).unwrap_err();
        assert!(matches!(err, Error::RestrictedAttachment(n) if n == "payload.exe"));
    }

    #[test]
    fn renames_restricted_file_on_the_wire_only() {
        let tmp = tempfile::tempdir().unwrap();
        let nasty = tmp.path().join("payload.exe");
        std::fs::write(&nasty, b"MZ").unwrap();

        let mut opts = options("to@example.com");
        opts.attachments = vec![nasty.clone()];
        let message =
            Message::new("from@example.com", opts, RestrictedPolicy::RenameSafe).unwrap();
        assert_eq!(message.attachments[0].wire_name, "payload.exe.safe");
        assert_eq!(message.attachments[0].path, nasty);
        assert!(nasty.exists());
    }

    #[test]
    fn derived_folder_zip_is_exempt_from_the_deny_list() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("reports");
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(dir.join("a.txt"), b"alpha").unwrap();

        let mut opts = options("to@example.com");
        opts.attachments = vec![dir];
        let message = Message::new("from@example.com", opts, RestrictedPolicy::Reject).unwrap();
        assert_eq!(message.attachments[0].wire_name, "reports.zip");
    }

    #[test]
    fn packages_files_and_folders_through_one_path() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("notes.txt");
        std::fs::write(&file, b"notes").unwrap();
        let dir = tmp.path().join("folder");
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(dir.join("inner.txt"), b"inner").unwrap();

        let mut opts = options("to@example.com");
        opts.attachments = vec![file.clone(), dir];
        let message = Message::new("from@example.com", opts, RestrictedPolicy::Reject).unwrap();

        assert_eq!(message.attachments[0].wire_name, "notes.txt");
        assert_eq!(message.attachments[0].path, file);
        assert_eq!(message.attachments[0].size_bytes, 5);
        assert_eq!(message.attachments[1].wire_name, "folder.zip");
        assert!(message.attachments[1].size_bytes > 0);
    }

    #[test]
    fn envelope_unions_to_cc_and_bcc() {
        let mut opts = options("to@example.com");
        opts.cc = vec!["cc@example.com".to_string()];
        opts.bcc = vec!["hidden@x.com".to_string()];
        let message =
            Message::new("from@example.com", opts, RestrictedPolicy::Reject).unwrap();
        assert_eq!(
            message.envelope(),
            vec![
                "to@example.com".to_string(),
                "cc@example.com".to_string(),
                "hidden@x.com".to_string(),
            ]
        );
    }
}
