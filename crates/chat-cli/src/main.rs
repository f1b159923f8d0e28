//! Chat attachment intake CLI
//!
//! Runs files and links through the attachment intake pipeline and prints
//! the resulting pending attachments as JSON.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use clap::Parser;
use serde::Serialize;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chat_attachments::{
    Attachment, FileCandidate, IntakeObserver, IntakeOutcome, IntakeService, LinkKind,
    MagicSniffer, RasterCompressor, Rejection,
};
use chat_core::config::{IntakeConfig, SharedSettings};

#[derive(Debug, Parser)]
#[command(name = "chat-attach", version, about = "Validate and stage chat attachments")]
struct Args {
    /// Image files to attach (JPEG, PNG, WebP, GIF)
    #[arg(long = "image", value_name = "PATH")]
    images: Vec<PathBuf>,

    /// Text or code files to attach
    #[arg(long = "file", value_name = "PATH")]
    files: Vec<PathBuf>,

    /// YouTube links to attach
    #[arg(long = "youtube", value_name = "URL")]
    youtube: Vec<String>,

    /// Wikipedia links to attach
    #[arg(long = "wikipedia", value_name = "URL")]
    wikipedia: Vec<String>,

    /// Positions to remove afterwards, applied in order
    #[arg(long = "remove", value_name = "POS")]
    remove: Vec<usize>,

    /// Attach images without compressing them
    #[arg(long)]
    no_compress: bool,

    /// Lossy encoding quality (1-100)
    #[arg(long)]
    quality: Option<u8>,

    /// Bound on the longer image side, in pixels
    #[arg(long, value_name = "PX")]
    max_dimension: Option<u32>,
}

/// Prints rejections the way a host would show a dialog
struct ConsoleObserver;

#[async_trait]
impl IntakeObserver for ConsoleObserver {
    async fn attachments_changed(&self, attachments: &[Attachment]) {
        debug!(count = attachments.len(), "Pending attachments changed");
    }

    async fn rejected(&self, rejection: &Rejection) {
        eprintln!("rejected: {}", rejection);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    dotenvy::dotenv().ok();
    let config = IntakeConfig::from_env().unwrap_or_else(|e| {
        warn!("Failed to load config from env: {}, using defaults", e);
        IntakeConfig::default()
    });

    let args = Args::parse();

    let settings = SharedSettings::new(config.compression);
    settings
        .update(|s| {
            if args.no_compress {
                s.enabled = false;
            }
            if let Some(quality) = args.quality {
                s.quality = quality;
            }
            if let Some(max) = args.max_dimension {
                s.max_width_or_height = max;
            }
        })
        .context("invalid compression options")?;

    info!(settings = ?settings.snapshot(), "Starting attachment intake");

    let service = IntakeService::with_observer(
        Arc::new(MagicSniffer::new()),
        Arc::new(RasterCompressor::new()),
        settings,
        Arc::new(ConsoleObserver),
    )
    .limits(config.limits);

    let mut outcomes = Vec::new();
    let mut unreadable = Vec::new();

    let (images, failed) = read_candidates(&args.images, true).await;
    unreadable.extend(failed);
    outcomes.extend(service.submit_images(images).await);

    let (files, failed) = read_candidates(&args.files, false).await;
    unreadable.extend(failed);
    outcomes.extend(service.submit_files(files).await);

    for url in &args.youtube {
        outcomes.push(service.submit_link(LinkKind::Youtube, url).await);
    }
    for url in &args.wikipedia {
        outcomes.push(service.submit_link(LinkKind::Wikipedia, url).await);
    }

    for position in &args.remove {
        if service.remove_attachment(*position).await.is_none() {
            warn!(position, "No attachment at position");
        }
    }

    let attachments: Vec<_> = service
        .attachments()
        .await
        .iter()
        .map(Attachment::summary)
        .collect();
    let rejections: Vec<_> = outcomes
        .iter()
        .filter_map(IntakeOutcome::rejection)
        .map(rejection_json)
        .collect();

    let report = serde_json::json!({
        "attachments": attachments,
        "summary": service.summary().await,
        "rejections": rejections,
        "unreadable": unreadable,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}

/// A path that could not be turned into a candidate
#[derive(Debug, Serialize)]
struct ReadFailure {
    path: String,
    error: String,
}

/// Read files from disk into candidates
///
/// Images are declared with the type guessed from their extension; text
/// files are left undeclared so content and extension decide. A path that
/// cannot be read is reported and skipped.
async fn read_candidates(
    paths: &[PathBuf],
    declare_type: bool,
) -> (Vec<FileCandidate>, Vec<ReadFailure>) {
    let mut candidates = Vec::with_capacity(paths.len());
    let mut failures = Vec::new();
    for path in paths {
        let data = match tokio::fs::read(path).await {
            Ok(data) => data,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read file");
                eprintln!("rejected: {}: {}", path.display(), e);
                failures.push(ReadFailure {
                    path: path.display().to_string(),
                    error: e.to_string(),
                });
                continue;
            }
        };

        let mut candidate = FileCandidate::new(display_name(path), bytes::Bytes::from(data));
        if declare_type {
            if let Some(mime) = mime_guess::from_path(path).first_raw() {
                candidate = candidate.content_type(mime);
            }
        }
        candidates.push(candidate);
    }
    (candidates, failures)
}

fn rejection_json(rejection: &Rejection) -> serde_json::Value {
    serde_json::json!({
        "candidate": rejection.candidate,
        "stage": rejection.stage,
        "category": rejection.category(),
        "code": rejection.reason.code(),
        "message": rejection.reason.to_string(),
    })
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Initialize tracing subscriber
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,chat_attachments=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_file(true)
                .with_line_number(true),
        )
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_attachments::{IntakeStage, RejectReason};

    #[test]
    fn test_parse_args() {
        let args = Args::try_parse_from([
            "chat-attach",
            "--image",
            "a.png",
            "--image",
            "b.jpg",
            "--file",
            "notes.md",
            "--youtube",
            "https://youtu.be/x",
            "--remove",
            "0",
            "--quality",
            "60",
            "--no-compress",
        ])
        .unwrap();

        assert_eq!(args.images, [PathBuf::from("a.png"), PathBuf::from("b.jpg")]);
        assert_eq!(args.files, [PathBuf::from("notes.md")]);
        assert_eq!(args.youtube, ["https://youtu.be/x"]);
        assert!(args.wikipedia.is_empty());
        assert_eq!(args.remove, [0usize]);
        assert_eq!(args.quality, Some(60));
        assert!(args.no_compress);
        assert_eq!(args.max_dimension, None);
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name(Path::new("/tmp/dir/photo.png")), "photo.png");
        assert_eq!(display_name(Path::new("notes.md")), "notes.md");
    }

    #[test]
    fn test_rejection_json() {
        let rejection = Rejection::new(
            "b.exe",
            IntakeStage::Classifying,
            RejectReason::UnsupportedExtension {
                extension: "exe".to_string(),
            },
        );
        let json = rejection_json(&rejection);

        assert_eq!(json["candidate"], "b.exe");
        assert_eq!(json["stage"], "classifying");
        assert_eq!(json["category"], "unsupported_format");
        assert_eq!(json["code"], "unsupported_extension");
    }

    #[tokio::test]
    async fn test_read_candidates_skips_missing_file() {
        let dir = std::env::temp_dir().join(format!("chat-attach-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let present = dir.join("notes.md");
        tokio::fs::write(&present, "# Notes").await.unwrap();

        let paths = [PathBuf::from("/nonexistent/file.txt"), present];
        let (candidates, failures) = read_candidates(&paths, false).await;

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].name, "notes.md");
        assert_eq!(candidates[0].content_type, None);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].path, "/nonexistent/file.txt");

        tokio::fs::remove_dir_all(&dir).await.ok();
    }
}
