//! Compression and archive layer for staged exports.
//!
//! Wraps the staged file with one of:
//!
//! - **None** — bytes pass through unchanged; the codec's content type and
//!   filename are kept.
//! - **Gzip** — each buffer the codec emits is compressed as an independent
//!   member of one continuous multi-member gzip stream (decoders that only
//!   read the first member must use a multi-member decoder such as
//!   `flate2::read::MultiGzDecoder`). Content type `application/gzip`,
//!   suffix `.gz`.
//! - **Archive** — all codec output lands in a single named entry inside a
//!   zip (`application/zip`, `.zip`, feature `archive-zip`) or tar+gzip
//!   (`application/gzip`, `.tgz`, feature `archive-tar`) archive. The entry
//!   name is the intrinsic filename, and the archive trailer is only
//!   written by [`CompressedSink::finalize`] — the export is not complete
//!   until finalize returns. The tar path spools entry bytes to an
//!   unlinked temp file because tar headers carry the entry size up
//!   front; the spool is copied into the archive at the finalize barrier,
//!   keeping memory bounded by the chunk size.
//!
//! The mode also decides the upload content type and the suffix appended
//! after the intrinsic format extension.

use crate::error::{Result, TransferError};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::File;
use std::io::{BufWriter, Write};
#[cfg(feature = "archive-tar")]
use std::io::{Seek, SeekFrom};

/// How the staged artifact is compressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionMode {
    /// No compression; codec output is staged as-is.
    None,
    /// Single continuous multi-member gzip stream.
    #[default]
    Gzip,
    /// Single-entry archive.
    Archive(ArchiveKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    TarGzip,
}

impl CompressionMode {
    /// Content type of the staged artifact, given the codec's own type.
    pub fn content_type<'a>(&self, codec_type: &'a str) -> &'a str {
        match self {
            Self::None => codec_type,
            Self::Gzip | Self::Archive(ArchiveKind::TarGzip) => "application/gzip",
            Self::Archive(ArchiveKind::Zip) => "application/zip",
        }
    }

    /// Suffix appended after the intrinsic format extension.
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::None => "",
            Self::Gzip => ".gz",
            Self::Archive(ArchiveKind::Zip) => ".zip",
            Self::Archive(ArchiveKind::TarGzip) => ".tgz",
        }
    }
}

enum Sink {
    Plain(BufWriter<File>),
    Gzip(File),
    #[cfg(feature = "archive-zip")]
    Zip(zip::ZipWriter<File>),
    #[cfg(feature = "archive-tar")]
    TarGzip {
        file: File,
        entry_name: String,
        /// Unlinked temp file holding the entry until its size is known.
        spool: File,
    },
}

/// Staged output sink with the compression mode applied.
///
/// Write codec output with [`write`](Self::write); nothing is durable until
/// [`finalize`](Self::finalize) has returned, since archive writers emit
/// their trailer there.
pub struct CompressedSink {
    sink: Sink,
}

impl CompressedSink {
    /// Open a sink over `file` for `mode`. `entry_name` is the intrinsic
    /// filename used for the single archive entry.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error when the requested archive support
    /// is compiled out, or a `Compression` error if the archive writer
    /// cannot be opened.
    pub fn new(file: File, mode: CompressionMode, entry_name: &str) -> Result<Self> {
        let sink = match mode {
            CompressionMode::None => Sink::Plain(BufWriter::new(file)),
            CompressionMode::Gzip => Sink::Gzip(file),
            CompressionMode::Archive(ArchiveKind::Zip) => {
                #[cfg(feature = "archive-zip")]
                {
                    let mut writer = zip::ZipWriter::new(file);
                    writer
                        .start_file(entry_name, zip::write::SimpleFileOptions::default())
                        .map_err(|err| {
                            TransferError::compression("start zip entry failed", err)
                        })?;
                    Sink::Zip(writer)
                }
                #[cfg(not(feature = "archive-zip"))]
                {
                    return Err(TransferError::Configuration(
                        "zip archive support is not compiled in".into(),
                    ));
                }
            }
            CompressionMode::Archive(ArchiveKind::TarGzip) => {
                #[cfg(feature = "archive-tar")]
                {
                    Sink::TarGzip {
                        file,
                        entry_name: entry_name.to_string(),
                        spool: tempfile::tempfile()?,
                    }
                }
                #[cfg(not(feature = "archive-tar"))]
                {
                    return Err(TransferError::Configuration(
                        "tar archive support is not compiled in".into(),
                    ));
                }
            }
        };
        Ok(Self { sink })
    }

    /// Write one codec buffer. Empty buffers are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying write or compression fails.
    pub fn write(&mut self, buffer: &[u8]) -> Result<()> {
        if buffer.is_empty() {
            return Ok(());
        }
        match &mut self.sink {
            Sink::Plain(writer) => writer.write_all(buffer)?,
            Sink::Gzip(file) => {
                // One gzip member per buffer, concatenated in the file.
                let mut encoder = GzEncoder::new(&mut *file, Compression::default());
                encoder.write_all(buffer)?;
                encoder.finish()?;
            }
            #[cfg(feature = "archive-zip")]
            Sink::Zip(writer) => writer.write_all(buffer)?,
            #[cfg(feature = "archive-tar")]
            Sink::TarGzip { spool, .. } => spool.write_all(buffer)?,
        }
        Ok(())
    }

    /// Flush, write any archive trailer, and make the file durable.
    ///
    /// # Errors
    ///
    /// Returns a `Compression` error (with the writer's error attached)
    /// when archive finalization fails, or an I/O error from the final
    /// flush/sync.
    pub fn finalize(self) -> Result<()> {
        let file = match self.sink {
            Sink::Plain(writer) => writer
                .into_inner()
                .map_err(|err| TransferError::compression("flush staged file failed", err))?,
            Sink::Gzip(file) => file,
            #[cfg(feature = "archive-zip")]
            Sink::Zip(writer) => writer
                .finish()
                .map_err(|err| TransferError::compression("zip finalize failed", err))?,
            #[cfg(feature = "archive-tar")]
            Sink::TarGzip {
                file,
                entry_name,
                mut spool,
            } => {
                let size = spool.seek(SeekFrom::End(0))?;
                spool.seek(SeekFrom::Start(0))?;
                let encoder = GzEncoder::new(file, Compression::default());
                let mut archive = tar::Builder::new(encoder);
                let mut header = tar::Header::new_gnu();
                header.set_size(size);
                header.set_mode(0o644);
                header.set_cksum();
                archive
                    .append_data(&mut header, &entry_name, &mut spool)
                    .map_err(|err| TransferError::compression("tar append failed", err))?;
                let encoder = archive
                    .into_inner()
                    .map_err(|err| TransferError::compression("tar finalize failed", err))?;
                encoder
                    .finish()
                    .map_err(|err| TransferError::compression("gzip finalize failed", err))?
            }
        };
        // Durable close instead of a settle delay before upload.
        file.sync_all()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_resolves_content_type_and_suffix() {
        assert_eq!(CompressionMode::None.content_type("text/csv"), "text/csv");
        assert_eq!(
            CompressionMode::Gzip.content_type("text/csv"),
            "application/gzip"
        );
        assert_eq!(
            CompressionMode::Archive(ArchiveKind::Zip).content_type("text/csv"),
            "application/zip"
        );
        assert_eq!(CompressionMode::Gzip.suffix(), ".gz");
        assert_eq!(CompressionMode::Archive(ArchiveKind::TarGzip).suffix(), ".tgz");
        assert_eq!(CompressionMode::None.suffix(), "");
    }
}
