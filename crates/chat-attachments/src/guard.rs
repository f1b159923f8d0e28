//! Size and count ceilings

use chat_core::config::IntakeLimits;

use crate::error::RejectReason;
use crate::model::{Attachment, AttachmentKind};

/// Enforces per-item size, aggregate text size and image count ceilings
///
/// Sizes are always the original candidate size, before any compression.
#[derive(Debug, Clone, Copy, Default)]
pub struct SizeGuard {
    limits: IntakeLimits,
}

impl SizeGuard {
    pub fn new(limits: IntakeLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &IntakeLimits {
        &self.limits
    }

    /// Check a candidate of `size` bytes against the committed attachments
    pub fn check(
        &self,
        size: u64,
        kind: AttachmentKind,
        committed: &[Attachment],
    ) -> Result<(), RejectReason> {
        match kind {
            AttachmentKind::Image => {
                let images = committed.iter().filter(|a| a.is_image()).count();
                if images >= self.limits.max_images {
                    return Err(RejectReason::ImageLimitReached {
                        max: self.limits.max_images,
                    });
                }
                self.check_item(size)
            }
            AttachmentKind::TextFile => {
                self.check_item(size)?;

                let total = text_bytes(committed) + size;
                if total > self.limits.max_total_text_bytes {
                    return Err(RejectReason::TotalSizeExceeded {
                        total,
                        max: self.limits.max_total_text_bytes,
                    });
                }
                Ok(())
            }
            AttachmentKind::YoutubeLink | AttachmentKind::WikipediaLink => Ok(()),
        }
    }

    fn check_item(&self, size: u64) -> Result<(), RejectReason> {
        if size > self.limits.max_item_bytes {
            return Err(RejectReason::FileTooLarge {
                size,
                max: self.limits.max_item_bytes,
            });
        }
        Ok(())
    }
}

/// Summed original size of the committed text files
pub fn text_bytes(committed: &[Attachment]) -> u64 {
    committed
        .iter()
        .filter(|a| a.is_text_file())
        .filter_map(|a| a.size_bytes())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use chat_core::units::MIB;

    fn text(size: u64) -> Attachment {
        Attachment::text_file(
            "notes.txt",
            Bytes::from(vec![b'a'; size as usize]),
            "text/plain",
            "txt",
        )
    }

    fn image() -> Attachment {
        Attachment::image("pic.png", Bytes::from_static(b"png"), "image/png", 3)
    }

    #[test]
    fn test_item_ceiling() {
        let guard = SizeGuard::default();
        assert_eq!(guard.limits(), &IntakeLimits::default());

        assert!(guard.check(10 * MIB, AttachmentKind::TextFile, &[]).is_ok());
        assert_eq!(
            guard.check(10 * MIB + 1, AttachmentKind::Image, &[]),
            Err(RejectReason::FileTooLarge {
                size: 10 * MIB + 1,
                max: 10 * MIB
            })
        );
        assert!(matches!(
            guard.check(11 * MIB, AttachmentKind::TextFile, &[]),
            Err(RejectReason::FileTooLarge { .. })
        ));
    }

    #[test]
    fn test_aggregate_text_ceiling() {
        let guard = SizeGuard::default();
        let committed = vec![text(3 * MIB), text(3 * MIB), text(3 * MIB)];

        assert!(guard.check(MIB, AttachmentKind::TextFile, &committed).is_ok());
        assert_eq!(
            guard.check(3 * MIB, AttachmentKind::TextFile, &committed),
            Err(RejectReason::TotalSizeExceeded {
                total: 12 * MIB,
                max: 10 * MIB
            })
        );
    }

    #[test]
    fn test_images_do_not_count_toward_text_total() {
        let guard = SizeGuard::default();
        let committed = vec![
            Attachment::image("big.jpg", Bytes::from_static(b"jpg"), "image/jpeg", 9 * MIB),
            text(MIB),
        ];

        assert_eq!(text_bytes(&committed), MIB);
        assert!(guard.check(8 * MIB, AttachmentKind::TextFile, &committed).is_ok());
    }

    #[test]
    fn test_image_count_ceiling() {
        let guard = SizeGuard::default();
        let mut committed: Vec<Attachment> = (0..7).map(|_| image()).collect();
        committed.push(text(10));

        assert!(guard.check(100, AttachmentKind::Image, &committed).is_ok());

        committed.push(image());
        assert_eq!(
            guard.check(100, AttachmentKind::Image, &committed),
            Err(RejectReason::ImageLimitReached { max: 8 })
        );
    }

    #[test]
    fn test_links_are_unbounded() {
        let guard = SizeGuard::new(IntakeLimits {
            max_item_bytes: 0,
            max_total_text_bytes: 0,
            max_images: 0,
        });

        assert!(guard.check(0, AttachmentKind::YoutubeLink, &[]).is_ok());
        assert!(guard.check(0, AttachmentKind::WikipediaLink, &[]).is_ok());
    }
}
