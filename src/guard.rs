//! Size and subject policy enforced before composition proceeds.

use crate::archive::attachment_io;
use crate::errors::{Error, Result};
use chrono::Utc;
use std::fs;
use std::path::PathBuf;

/// Aggregate attachment ceiling, a proxy for common provider limits.
pub const MAX_ATTACHMENT_TOTAL: u64 = 25 * 1024 * 1024;

/// Subject ceiling per the RFC 2822 line-length convention.
pub const MAX_SUBJECT_BYTES: usize = 78;

/// Sums the stat sizes of `paths`.
pub fn total_size(paths: &[PathBuf]) -> Result<u64> {
    let mut total = 0u64;
    for path in paths {
        let meta = fs::metadata(path).map_err(|e| attachment_io(path, e))?;
        total += meta.len();
    }
    Ok(total)
}

/// Fails the send when the aggregate attachment size exceeds the ceiling.
pub fn check_total_size(paths: &[PathBuf]) -> Result<u64> {
    let total = total_size(paths)?;
    if total > MAX_ATTACHMENT_TOTAL {
        return Err(Error::AttachmentTooLarge {
            total,
            limit: MAX_ATTACHMENT_TOTAL,
        });
    }
    Ok(total)
}

/// Fails composition when the subject exceeds the byte ceiling. Exactly
/// the limit is accepted.
pub fn check_subject(subject: &str) -> Result<()> {
    if subject.len() > MAX_SUBJECT_BYTES {
        return Err(Error::SubjectTooLong {
            len: subject.len(),
            limit: MAX_SUBJECT_BYTES,
        });
    }
    Ok(())
}

/// Deterministic substitute when no subject was supplied.
pub fn default_subject() -> String {
    format!(
        "Email sent at {}",
        Utc::now().format("%a, %d %b %Y %H:%M:%S GMT")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    #[test]
    fn subject_at_limit_is_accepted() {
        check_subject(&"a".repeat(MAX_SUBJECT_BYTES)).unwrap();
    }

    #[test]
    fn subject_over_limit_is_rejected() {
        let err = check_subject(&"a".repeat(MAX_SUBJECT_BYTES + 1)).unwrap_err();
        assert!(matches!(err, Error::SubjectTooLong { len: 79, limit: 78 }));
    }

    #[test]
    fn default_subject_is_prefixed_and_within_limit() {
        let subject = default_subject();
        assert!(subject.starts_with("Email sent at "));
        check_subject(&subject).unwrap();
    }

    #[test]
    fn total_size_is_additive() {
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("a.bin");
        let b = tmp.path().join("b.bin");
        std::fs::write(&a, vec![0u8; 1200]).unwrap();
        std::fs::write(&b, vec![0u8; 800]).unwrap();

        assert_eq!(total_size(&[a.clone()]).unwrap(), 1200);
        assert_eq!(total_size(&[b.clone()]).unwrap(), 800);
        assert_eq!(total_size(&[a, b]).unwrap(), 2000);
    }

    #[test]
    fn oversized_aggregate_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("20mib.bin");
        let b = tmp.path().join("10mib.bin");
        File::create(&a).unwrap().set_len(20 * 1024 * 1024).unwrap();
        File::create(&b).unwrap().set_len(10 * 1024 * 1024).unwrap();

        let err = check_total_size(&[a, b]).unwrap_err();
        assert!(matches!(
            err,
            Error::AttachmentTooLarge { total, limit }
                if total == 30 * 1024 * 1024 && limit == MAX_ATTACHMENT_TOTAL
        ));
    }

    #[test]
    fn aggregate_at_limit_is_accepted() {
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("25mib.bin");
        File::create(&a).unwrap().set_len(MAX_ATTACHMENT_TOTAL).unwrap();
        assert_eq!(check_total_size(&[a]).unwrap(), MAX_ATTACHMENT_TOTAL);
    }
}
