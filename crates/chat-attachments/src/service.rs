//! Attachment Intake Service
//!
//! Runs each candidate through classification, size checks and the
//! transform stage, then commits it to the store or rejects it.

use std::sync::Arc;

use async_trait::async_trait;
use chat_core::config::{IntakeLimits, SharedSettings};
use tracing::{debug, info, instrument};

use crate::classify::{classify_image, Classifier};
use crate::error::{IntakeStage, RejectReason, Rejection};
use crate::guard::SizeGuard;
use crate::model::{Attachment, AttachmentKind, FileCandidate, LinkKind};
use crate::sniff::ContentSniffer;
use crate::store::{AttachmentStore, StoreSummary};
use crate::transform::{ImageCompressor, TransformStage};

/// Host callbacks
///
/// Snapshots arrive in mutation order only while one operation runs at a
/// time. Notifications are sent after the store lock is released, so
/// concurrent intakes on a multi-threaded runtime may deliver them out of
/// order; the latest `attachments()` call is always authoritative.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IntakeObserver: Send + Sync {
    /// Called after every store mutation with the new sequence
    async fn attachments_changed(&self, attachments: &[Attachment]);

    /// Called when a candidate is rejected
    ///
    /// The next candidate of a batch waits until this returns.
    async fn rejected(&self, rejection: &Rejection);
}

/// Observer that ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

#[async_trait]
impl IntakeObserver for NoopObserver {
    async fn attachments_changed(&self, _attachments: &[Attachment]) {}

    async fn rejected(&self, _rejection: &Rejection) {}
}

/// Final state of a single candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeOutcome {
    Committed(Attachment),
    Rejected(Rejection),
}

impl IntakeOutcome {
    pub fn stage(&self) -> IntakeStage {
        match self {
            Self::Committed(_) => IntakeStage::Committed,
            Self::Rejected(_) => IntakeStage::Rejected,
        }
    }

    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed(_))
    }

    pub fn attachment(&self) -> Option<&Attachment> {
        match self {
            Self::Committed(a) => Some(a),
            Self::Rejected(_) => None,
        }
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Rejected(r) => Some(r),
            Self::Committed(_) => None,
        }
    }
}

/// Intake service
///
/// Owns the pending attachments of one chat session. Compression settings
/// are read from the shared handle once per candidate, so changes made by
/// the host apply to the next candidate.
pub struct IntakeService<Sn, C, O = NoopObserver>
where
    Sn: ContentSniffer + ?Sized,
    C: ImageCompressor + ?Sized,
    O: IntakeObserver + ?Sized,
{
    store: Arc<AttachmentStore>,
    classifier: Classifier<Sn>,
    guard: SizeGuard,
    transform: TransformStage<C>,
    settings: SharedSettings,
    observer: Arc<O>,
}

impl<Sn, C> IntakeService<Sn, C, NoopObserver>
where
    Sn: ContentSniffer + ?Sized,
    C: ImageCompressor + ?Sized,
{
    pub fn new(sniffer: Arc<Sn>, compressor: Arc<C>, settings: SharedSettings) -> Self {
        Self::with_observer(sniffer, compressor, settings, Arc::new(NoopObserver))
    }
}

impl<Sn, C, O> IntakeService<Sn, C, O>
where
    Sn: ContentSniffer + ?Sized,
    C: ImageCompressor + ?Sized,
    O: IntakeObserver + ?Sized,
{
    pub fn with_observer(
        sniffer: Arc<Sn>,
        compressor: Arc<C>,
        settings: SharedSettings,
        observer: Arc<O>,
    ) -> Self {
        Self {
            store: Arc::new(AttachmentStore::new()),
            classifier: Classifier::new(sniffer),
            guard: SizeGuard::default(),
            transform: TransformStage::new(compressor),
            settings,
            observer,
        }
    }

    /// Override the default ceilings
    pub fn limits(mut self, limits: IntakeLimits) -> Self {
        self.guard = SizeGuard::new(limits);
        self
    }

    pub fn store(&self) -> &Arc<AttachmentStore> {
        &self.store
    }

    pub fn settings(&self) -> &SharedSettings {
        &self.settings
    }

    /// Submit images, one at a time in input order
    #[instrument(skip(self, files), fields(count = files.len()))]
    pub async fn submit_images(&self, files: Vec<FileCandidate>) -> Vec<IntakeOutcome> {
        let mut outcomes = Vec::with_capacity(files.len());
        for file in files {
            let outcome = match self.intake_image(&file).await {
                Ok(attachment) => IntakeOutcome::Committed(attachment),
                Err(rejection) => self.reject(rejection).await,
            };
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Submit text files, one at a time in input order
    #[instrument(skip(self, files), fields(count = files.len()))]
    pub async fn submit_files(&self, files: Vec<FileCandidate>) -> Vec<IntakeOutcome> {
        let mut outcomes = Vec::with_capacity(files.len());
        for file in files {
            let outcome = match self.intake_file(&file).await {
                Ok(attachment) => IntakeOutcome::Committed(attachment),
                Err(rejection) => self.reject(rejection).await,
            };
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Submit a YouTube or Wikipedia link
    #[instrument(skip(self))]
    pub async fn submit_link(&self, kind: LinkKind, url: &str) -> IntakeOutcome {
        let url = url.trim();
        if url.is_empty() || !kind.matches(url) {
            let rejection = Rejection::new(
                url,
                IntakeStage::Submitted,
                RejectReason::InvalidLink {
                    kind,
                    url: url.to_string(),
                },
            );
            return self.reject(rejection).await;
        }

        let attachment = Attachment::link(kind, url);
        match self.commit(attachment, 0, kind.attachment_kind()).await {
            Ok(attachment) => IntakeOutcome::Committed(attachment),
            Err(reason) => {
                self.reject(Rejection::new(url, IntakeStage::SizeChecking, reason))
                    .await
            }
        }
    }

    /// Remove the attachment at `position`
    ///
    /// Out-of-range positions are ignored and trigger no notification.
    #[instrument(skip(self))]
    pub async fn remove_attachment(&self, position: usize) -> Option<Attachment> {
        let (removed, remaining) = self.store.remove_at(position).await?;
        info!(
            position,
            name = %removed.display_name(),
            remaining = remaining.len(),
            "Attachment removed"
        );
        self.observer.attachments_changed(&remaining).await;
        Some(removed)
    }

    /// Drop every pending attachment, e.g. once the message has been sent
    #[instrument(skip(self))]
    pub async fn clear_attachments(&self) {
        let count = self.store.clear().await;
        info!(count, "Attachments cleared");
        self.observer.attachments_changed(&[]).await;
    }

    /// Current pending attachments in order
    pub async fn attachments(&self) -> Vec<Attachment> {
        self.store.list().await
    }

    pub async fn summary(&self) -> StoreSummary {
        self.store.summary().await
    }

    async fn intake_image(&self, file: &FileCandidate) -> Result<Attachment, Rejection> {
        let reject = |stage, reason| Rejection::new(&file.name, stage, reason);
        debug!(name = %file.name, size = file.size(), "Classifying image");

        let content_type =
            classify_image(file).map_err(|r| reject(IntakeStage::Classifying, r))?;

        let original_size = file.size();
        let committed = self.store.list().await;
        self.guard
            .check(original_size, AttachmentKind::Image, &committed)
            .map_err(|r| reject(IntakeStage::SizeChecking, r))?;

        let settings = self.settings.snapshot();
        let output = self.transform.apply(&file.data, &content_type, &settings).await;

        let attachment =
            Attachment::image(&file.name, output.data, output.content_type, original_size);
        self.commit(attachment, original_size, AttachmentKind::Image)
            .await
            .map_err(|r| reject(IntakeStage::SizeChecking, r))
    }

    async fn intake_file(&self, file: &FileCandidate) -> Result<Attachment, Rejection> {
        let reject = |stage, reason| Rejection::new(&file.name, stage, reason);
        debug!(name = %file.name, size = file.size(), "Classifying file");

        let class = self
            .classifier
            .classify_file(file)
            .await
            .map_err(|r| reject(IntakeStage::Classifying, r))?;

        let size = file.size();
        let committed = self.store.list().await;
        self.guard
            .check(size, AttachmentKind::TextFile, &committed)
            .map_err(|r| reject(IntakeStage::SizeChecking, r))?;

        let attachment = Attachment::text_file(
            &file.name,
            file.data.clone(),
            class.content_type,
            class.extension,
        );
        self.commit(attachment, size, AttachmentKind::TextFile)
            .await
            .map_err(|r| reject(IntakeStage::SizeChecking, r))
    }

    /// Re-run the guard against the live sequence and append
    async fn commit(
        &self,
        attachment: Attachment,
        size: u64,
        kind: AttachmentKind,
    ) -> Result<Attachment, RejectReason> {
        let guard = self.guard;
        let (position, snapshot) = self
            .store
            .push_checked(attachment.clone(), |current| guard.check(size, kind, current))
            .await?;

        info!(
            position,
            name = %attachment.display_name(),
            kind = %kind,
            size,
            stored = attachment.stored_size().unwrap_or_default(),
            "Attachment committed"
        );
        self.observer.attachments_changed(&snapshot).await;
        Ok(attachment)
    }

    async fn reject(&self, rejection: Rejection) -> IntakeOutcome {
        info!(
            candidate = %rejection.candidate,
            stage = %rejection.stage,
            code = rejection.reason.code(),
            "Candidate rejected"
        );
        self.observer.rejected(&rejection).await;
        IntakeOutcome::Rejected(rejection)
    }
}
