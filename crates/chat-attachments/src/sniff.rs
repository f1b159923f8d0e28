//! Content Sniffing
//!
//! Detects well-known binary formats from leading bytes, independent of the
//! file name or declared type.

use async_trait::async_trait;
use serde::Serialize;

/// A format recognized from file content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DetectedFormat {
    pub name: &'static str,
    pub mime: &'static str,
    pub extension: &'static str,
}

impl std::fmt::Display for DetectedFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.mime)
    }
}

/// Content sniffer trait
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentSniffer: Send + Sync {
    /// Identify the format of `data`, or `None` if nothing conclusive matched
    async fn sniff(&self, data: &[u8]) -> Option<DetectedFormat>;
}

/// Byte pattern at a fixed offset
struct Signature {
    offset: usize,
    magic: &'static [u8],
    /// Further pattern that must also match, e.g. the RIFF subtype
    also: Option<(usize, &'static [u8])>,
    format: DetectedFormat,
}

const fn format(name: &'static str, mime: &'static str, extension: &'static str) -> DetectedFormat {
    DetectedFormat {
        name,
        mime,
        extension,
    }
}

const fn sig(magic: &'static [u8], format: DetectedFormat) -> Signature {
    Signature {
        offset: 0,
        magic,
        also: None,
        format,
    }
}

const SIGNATURES: &[Signature] = &[
    // Documents
    sig(b"%PDF-", format("PDF", "application/pdf", "pdf")),
    sig(b"{\\rtf", format("RTF", "application/rtf", "rtf")),
    sig(
        &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1],
        format("OLE2 compound document", "application/x-cfb", "cfb"),
    ),
    // Archives
    sig(b"PK\x03\x04", format("ZIP", "application/zip", "zip")),
    sig(b"PK\x05\x06", format("ZIP", "application/zip", "zip")),
    sig(b"PK\x07\x08", format("ZIP", "application/zip", "zip")),
    sig(&[0x1F, 0x8B], format("GZIP", "application/gzip", "gz")),
    sig(b"BZh", format("BZIP2", "application/x-bzip2", "bz2")),
    sig(
        &[0xFD, b'7', b'z', b'X', b'Z', 0x00],
        format("XZ", "application/x-xz", "xz"),
    ),
    sig(
        &[b'7', b'z', 0xBC, 0xAF, 0x27, 0x1C],
        format("7-Zip", "application/x-7z-compressed", "7z"),
    ),
    sig(b"Rar!\x1A\x07", format("RAR", "application/vnd.rar", "rar")),
    sig(
        &[0x28, 0xB5, 0x2F, 0xFD],
        format("Zstandard", "application/zstd", "zst"),
    ),
    Signature {
        offset: 257,
        magic: b"ustar",
        also: None,
        format: format("TAR", "application/x-tar", "tar"),
    },
    // Executables
    sig(b"\x7FELF", format("ELF", "application/x-elf", "elf")),
    sig(b"MZ", format("Windows executable", "application/x-msdownload", "exe")),
    sig(
        &[0xCF, 0xFA, 0xED, 0xFE],
        format("Mach-O", "application/x-mach-binary", "macho"),
    ),
    sig(
        &[0xFE, 0xED, 0xFA, 0xCF],
        format("Mach-O", "application/x-mach-binary", "macho"),
    ),
    sig(
        &[0xCA, 0xFE, 0xBA, 0xBE],
        format("Java class", "application/java-vm", "class"),
    ),
    sig(b"\0asm", format("WebAssembly", "application/wasm", "wasm")),
    sig(
        b"SQLite format 3\0",
        format("SQLite", "application/x-sqlite3", "sqlite"),
    ),
    // Images
    sig(
        &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A],
        format("PNG", "image/png", "png"),
    ),
    sig(&[0xFF, 0xD8, 0xFF], format("JPEG", "image/jpeg", "jpg")),
    sig(b"GIF87a", format("GIF", "image/gif", "gif")),
    sig(b"GIF89a", format("GIF", "image/gif", "gif")),
    Signature {
        offset: 0,
        magic: b"RIFF",
        also: Some((8, b"WEBP".as_slice())),
        format: format("WebP", "image/webp", "webp"),
    },
    sig(b"II*\0", format("TIFF", "image/tiff", "tif")),
    sig(b"MM\0*", format("TIFF", "image/tiff", "tif")),
    sig(&[0x00, 0x00, 0x01, 0x00], format("ICO", "image/x-icon", "ico")),
    sig(b"8BPS", format("Photoshop", "image/vnd.adobe.photoshop", "psd")),
    Signature {
        offset: 4,
        magic: b"ftypavif",
        also: None,
        format: format("AVIF", "image/avif", "avif"),
    },
    Signature {
        offset: 4,
        magic: b"ftypheic",
        also: None,
        format: format("HEIC", "image/heic", "heic"),
    },
    // Audio and video
    sig(b"ID3", format("MP3", "audio/mpeg", "mp3")),
    sig(b"OggS", format("Ogg", "audio/ogg", "ogg")),
    sig(b"fLaC", format("FLAC", "audio/flac", "flac")),
    Signature {
        offset: 0,
        magic: b"RIFF",
        also: Some((8, b"WAVE".as_slice())),
        format: format("WAV", "audio/wav", "wav"),
    },
    Signature {
        offset: 0,
        magic: b"RIFF",
        also: Some((8, b"AVI ".as_slice())),
        format: format("AVI", "video/x-msvideo", "avi"),
    },
    sig(
        &[0x1A, 0x45, 0xDF, 0xA3],
        format("Matroska", "video/x-matroska", "mkv"),
    ),
    // Any other ISO base media file: MP4, MOV, M4A
    Signature {
        offset: 4,
        magic: b"ftyp",
        also: None,
        format: format("MP4", "video/mp4", "mp4"),
    },
    // Fonts
    sig(b"wOFF", format("WOFF", "font/woff", "woff")),
    sig(b"wOF2", format("WOFF2", "font/woff2", "woff2")),
    sig(b"OTTO", format("OpenType", "font/otf", "otf")),
    sig(&[0x00, 0x01, 0x00, 0x00, 0x00], format("TrueType", "font/ttf", "ttf")),
];

impl Signature {
    fn matches(&self, data: &[u8]) -> bool {
        let at = |offset: usize, magic: &[u8]| {
            data.get(offset..offset + magic.len())
                .map_or(false, |window| window == magic)
        };

        at(self.offset, self.magic) && self.also.map_or(true, |(offset, magic)| at(offset, magic))
    }
}

/// Magic-number sniffer
///
/// Plain text never starts with the byte sequences in the table, with the
/// exception of short ASCII magics such as `MZ` or `BZh`; those files are
/// treated as binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct MagicSniffer;

impl MagicSniffer {
    pub fn new() -> Self {
        Self
    }

    pub fn detect(data: &[u8]) -> Option<DetectedFormat> {
        SIGNATURES
            .iter()
            .find(|s| s.matches(data))
            .map(|s| s.format)
    }
}

#[async_trait]
impl ContentSniffer for MagicSniffer {
    async fn sniff(&self, data: &[u8]) -> Option<DetectedFormat> {
        Self::detect(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_common_binaries() {
        let cases: &[(&[u8], &str)] = &[
            (b"%PDF-1.7\n", "application/pdf"),
            (b"PK\x03\x04\x14\x00", "application/zip"),
            (&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0], "image/png"),
            (&[0xFF, 0xD8, 0xFF, 0xE0], "image/jpeg"),
            (b"GIF89a\x01\x00", "image/gif"),
            (b"RIFF\x24\x00\x00\x00WEBPVP8 ", "image/webp"),
            (b"RIFF\x24\x00\x00\x00WAVEfmt ", "audio/wav"),
            (b"\x7FELF\x02\x01\x01", "application/x-elf"),
            (b"\x00\x00\x00\x18ftypmp42", "video/mp4"),
            (b"\x00\x00\x00\x1cftypavif", "image/avif"),
        ];

        for (data, mime) in cases {
            let detected = MagicSniffer::detect(data);
            assert_eq!(detected.map(|f| f.mime), Some(*mime), "Data: {:?}", data);
        }
    }

    #[test]
    fn test_detects_tar_at_offset() {
        let mut data = vec![0u8; 512];
        data[257..262].copy_from_slice(b"ustar");
        assert_eq!(MagicSniffer::detect(&data).map(|f| f.extension), Some("tar"));
    }

    #[test]
    fn test_plain_text_is_inconclusive() {
        let samples: &[&[u8]] = &[
            b"fn main() {\n    println!(\"hi\");\n}\n",
            b"# Heading\n\nSome *markdown*.",
            b"{\"key\": [1, 2, 3]}",
            b"id,name\n1,alice\n",
            b"",
            b"RIFF but not really",
        ];

        for data in samples {
            assert_eq!(MagicSniffer::detect(data), None, "Data: {:?}", data);
        }
    }

    #[tokio::test]
    async fn test_sniffer_trait() {
        let sniffer = MagicSniffer::new();
        let detected = sniffer.sniff(b"%PDF-1.4").await.unwrap();
        assert_eq!(detected.name, "PDF");
        assert_eq!(detected.to_string(), "PDF (application/pdf)");
    }
}
