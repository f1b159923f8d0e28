//! Attachment Store
//!
//! Ordered collection of pending attachments, the single source of truth
//! for what goes out with the next message.

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::RejectReason;
use crate::guard::text_bytes;
use crate::model::Attachment;

/// Counts derived from the current sequence
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreSummary {
    pub total: usize,
    pub images: usize,
    pub text_bytes: u64,
}

/// Pending attachments in submission order
///
/// Every mutation happens under the write lock, so readers never see a
/// partially applied change.
#[derive(Debug, Default)]
pub struct AttachmentStore {
    attachments: RwLock<Vec<Attachment>>,
}

impl AttachmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an attachment, returning its position
    pub async fn push(&self, attachment: Attachment) -> usize {
        let mut attachments = self.attachments.write().await;
        attachments.push(attachment);
        attachments.len() - 1
    }

    /// Append an attachment if `check` accepts the current sequence
    ///
    /// The check and the append happen under one write lock.
    pub async fn push_checked<F>(
        &self,
        attachment: Attachment,
        check: F,
    ) -> Result<(usize, Vec<Attachment>), RejectReason>
    where
        F: FnOnce(&[Attachment]) -> Result<(), RejectReason>,
    {
        let mut attachments = self.attachments.write().await;
        check(attachments.as_slice())?;
        attachments.push(attachment);
        Ok((attachments.len() - 1, attachments.clone()))
    }

    /// Remove the attachment at `position`; out-of-range positions are ignored
    pub async fn remove_at(&self, position: usize) -> Option<(Attachment, Vec<Attachment>)> {
        let mut attachments = self.attachments.write().await;
        if position >= attachments.len() {
            debug!(position, len = attachments.len(), "Remove position out of range");
            return None;
        }
        let removed = attachments.remove(position);
        Some((removed, attachments.clone()))
    }

    /// Remove everything, returning how many attachments were dropped
    pub async fn clear(&self) -> usize {
        let mut attachments = self.attachments.write().await;
        let count = attachments.len();
        attachments.clear();
        count
    }

    /// Snapshot of the current sequence
    pub async fn list(&self) -> Vec<Attachment> {
        self.attachments.read().await.clone()
    }

    pub async fn get(&self, position: usize) -> Option<Attachment> {
        self.attachments.read().await.get(position).cloned()
    }

    pub async fn len(&self) -> usize {
        self.attachments.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.attachments.read().await.is_empty()
    }

    pub async fn summary(&self) -> StoreSummary {
        let attachments = self.attachments.read().await;
        StoreSummary {
            total: attachments.len(),
            images: attachments.iter().filter(|a| a.is_image()).count(),
            text_bytes: text_bytes(&attachments),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LinkKind;
    use bytes::Bytes;
    use std::sync::Arc;

    fn text(name: &str) -> Attachment {
        Attachment::text_file(name, Bytes::from_static(b"abc"), "text/plain", "txt")
    }

    async fn names(store: &AttachmentStore) -> Vec<String> {
        store
            .list()
            .await
            .iter()
            .map(|a| a.display_name().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_push_preserves_order() {
        let store = AttachmentStore::new();
        assert_eq!(store.push(text("a.txt")).await, 0);
        assert_eq!(store.push(text("b.txt")).await, 1);
        assert_eq!(store.push(text("c.txt")).await, 2);

        assert_eq!(names(&store).await, ["a.txt", "b.txt", "c.txt"]);
    }

    #[tokio::test]
    async fn test_remove_at() {
        let store = AttachmentStore::new();
        for name in ["a.txt", "b.txt", "c.txt", "d.txt"] {
            store.push(text(name)).await;
        }

        let (removed, remaining) = store.remove_at(1).await.unwrap();
        assert_eq!(removed.display_name(), "b.txt");
        assert_eq!(remaining.len(), 3);
        assert_eq!(names(&store).await, ["a.txt", "c.txt", "d.txt"]);
        assert_eq!(store.get(1).await.unwrap().display_name(), "c.txt");
    }

    #[tokio::test]
    async fn test_remove_out_of_range_is_noop() {
        let store = AttachmentStore::new();
        store.push(text("a.txt")).await;

        assert!(store.remove_at(1).await.is_none());
        assert!(store.remove_at(usize::MAX).await.is_none());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let store = AttachmentStore::new();
        store.push(text("a.txt")).await;
        store.push(text("b.txt")).await;

        assert_eq!(store.clear().await, 2);
        assert!(store.is_empty().await);
        assert_eq!(store.clear().await, 0);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_push_checked_rejects_without_mutation() {
        let store = AttachmentStore::new();
        store.push(text("a.txt")).await;

        let result = store
            .push_checked(text("b.txt"), |_| Err(RejectReason::InvalidEncoding))
            .await;

        assert_eq!(result.unwrap_err(), RejectReason::InvalidEncoding);
        assert_eq!(names(&store).await, ["a.txt"]);
    }

    #[tokio::test]
    async fn test_push_checked_sees_current_sequence() {
        let store = AttachmentStore::new();
        store.push(text("a.txt")).await;

        let (position, snapshot) = store
            .push_checked(text("b.txt"), |current| {
                assert_eq!(current.len(), 1);
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(position, 1);
        assert_eq!(snapshot.len(), 2);
    }

    #[tokio::test]
    async fn test_summary() {
        let store = AttachmentStore::new();
        store.push(text("a.txt")).await;
        store
            .push(Attachment::image("p.png", Bytes::from_static(b"p"), "image/png", 1))
            .await;
        store
            .push(Attachment::link(LinkKind::Youtube, "https://youtu.be/x"))
            .await;

        assert_eq!(
            store.summary().await,
            StoreSummary {
                total: 3,
                images: 1,
                text_bytes: 3
            }
        );
    }

    #[tokio::test]
    async fn test_concurrent_pushes_are_serialized() {
        let store = Arc::new(AttachmentStore::new());
        let mut handles = Vec::new();

        for i in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .push_checked(text(&format!("{}.txt", i)), |current| {
                        if current.len() >= 10 {
                            Err(RejectReason::ImageLimitReached { max: 10 })
                        } else {
                            Ok(())
                        }
                    })
                    .await
            }));
        }

        let mut accepted = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                accepted += 1;
            }
        }

        assert_eq!(accepted, 10);
        assert_eq!(store.len().await, 10);
    }
}
