//! Streaming zip snapshot of a project directory
//!
//! The archive is written on a blocking worker into a bounded channel. The
//! receiving half is an [`ArchiveStream`] that becomes the HTTP request body,
//! so at most `CHANNEL_CAPACITY` chunks are ever held in memory and a slow
//! upload throttles the archiver.

use std::ffi::OsStr;
use std::fmt;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};

use anyhow::Context;
use futures::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use walkdir::WalkDir;
use zip::CompressionMethod;
use zip::write::{SimpleFileOptions, ZipWriter};

/// Entries never shipped, at any depth, even though dotfiles are included.
pub const EXCLUDED_NAMES: &[&str] = &[
    "node_modules",
    ".git",
    ".idea",
    ".mdb",
    "Dockerfile",
    "docker-compose.yml",
    "docker-compose.yaml",
    ".dockerignore",
];

const CHUNK_SIZE: usize = 64 * 1024;
const CHANNEL_CAPACITY: usize = 8;

type Chunk = io::Result<Vec<u8>>;

/// Events reported while the archive is produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveEvent {
    /// Running total of source bytes added so far.
    Progress { processed_bytes: u64 },
    /// Non-fatal problem; the entry was skipped.
    Warning(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub files: usize,
    pub processed_bytes: u64,
}

pub fn is_excluded(name: &OsStr) -> bool {
    name.to_str()
        .is_some_and(|name| EXCLUDED_NAMES.contains(&name))
}

/// One archive for one upload attempt.
#[derive(Debug, Clone)]
pub struct ArchiveJob {
    root: PathBuf,
}

impl ArchiveJob {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Start archiving. The stream ends after the last chunk; an archiving
    /// error is delivered as the stream's final item so the upload fails too.
    pub fn spawn<F>(
        self,
        observer: F,
    ) -> (ArchiveStream, JoinHandle<anyhow::Result<ArchiveSummary>>)
    where
        F: Fn(ArchiveEvent) + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let handle = tokio::task::spawn_blocking(move || {
            let error_tx = tx.clone();
            let result = self.write_archive(ChannelWriter::new(tx), &observer);
            if let Err(err) = &result {
                if !error_tx.is_closed() {
                    let _ = error_tx.blocking_send(Err(io::Error::other(format!("{err:#}"))));
                }
            }
            result
        });
        (ArchiveStream { rx }, handle)
    }

    fn write_archive(
        &self,
        writer: ChannelWriter,
        observer: &dyn Fn(ArchiveEvent),
    ) -> anyhow::Result<ArchiveSummary> {
        let mut zip = ZipWriter::new_stream(writer);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut summary = ArchiveSummary::default();

        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();

        for entry in walker.filter_entry(|e| e.depth() == 0 || !is_excluded(e.file_name())) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) if is_vanished(&err) => {
                    observer(ArchiveEvent::Warning(format!("Skipping entry: {}", err)));
                    continue;
                }
                Err(err) => {
                    return Err(anyhow::Error::new(err).context(format!(
                        "Failed to read directory entry under {}",
                        self.root.display()
                    )));
                }
            };

            if entry.depth() == 0 || entry.file_type().is_dir() {
                continue;
            }

            let name = entry_name(&self.root, entry.path())?;
            if entry.file_type().is_symlink() {
                observer(ArchiveEvent::Warning(format!(
                    "Skipping symbolic link: {}",
                    name
                )));
                continue;
            }

            let mut file = match File::open(entry.path()) {
                Ok(file) => file,
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    observer(ArchiveEvent::Warning(format!("File vanished: {}", name)));
                    continue;
                }
                Err(err) => {
                    return Err(anyhow::Error::new(err)
                        .context(format!("Failed to open {}", entry.path().display())));
                }
            };

            #[allow(unused_mut)]
            let mut file_options = options;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Ok(meta) = file.metadata() {
                    file_options = file_options.unix_permissions(meta.permissions().mode());
                }
            }

            zip.start_file(name.as_str(), file_options)
                .with_context(|| format!("Failed to add {} to archive", name))?;
            let copied = io::copy(&mut file, &mut zip)
                .with_context(|| format!("Failed to compress {}", name))?;

            summary.files += 1;
            summary.processed_bytes += copied;
            observer(ArchiveEvent::Progress {
                processed_bytes: summary.processed_bytes,
            });
        }

        let mut writer = zip.finish().context("Failed to finalize archive")?;
        writer.flush().context("Failed to flush archive")?;

        tracing::debug!(
            files = summary.files,
            bytes = summary.processed_bytes,
            "Archive complete"
        );
        Ok(summary)
    }
}

fn is_vanished(err: &walkdir::Error) -> bool {
    err.io_error()
        .is_some_and(|e| e.kind() == io::ErrorKind::NotFound)
}

/// Archive entry name: path relative to the root with `/` separators.
fn entry_name(root: &Path, path: &Path) -> anyhow::Result<String> {
    let relative = path
        .strip_prefix(root)
        .with_context(|| format!("{} is outside {}", path.display(), root.display()))?;
    Ok(relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/"))
}

/// Chunking writer feeding the bounded channel.
struct ChannelWriter {
    tx: mpsc::Sender<Chunk>,
    buffer: Vec<u8>,
}

impl ChannelWriter {
    fn new(tx: mpsc::Sender<Chunk>) -> Self {
        Self {
            tx,
            buffer: Vec::with_capacity(CHUNK_SIZE),
        }
    }

    fn send_buffer(&mut self) -> io::Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let chunk = std::mem::replace(&mut self.buffer, Vec::with_capacity(CHUNK_SIZE));
        self.tx
            .blocking_send(Ok(chunk))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "upload stream closed"))
    }
}

impl Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        if self.buffer.len() >= CHUNK_SIZE {
            self.send_buffer()?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.send_buffer()
    }
}

/// Receiving half of an archive; usable directly as an HTTP body.
pub struct ArchiveStream {
    rx: mpsc::Receiver<Chunk>,
}

impl ArchiveStream {
    pub fn into_body(self) -> reqwest::Body {
        reqwest::Body::wrap_stream(self)
    }
}

impl fmt::Debug for ArchiveStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveStream").finish_non_exhaustive()
    }
}

impl Stream for ArchiveStream {
    type Item = Chunk;

    fn poll_next(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}
