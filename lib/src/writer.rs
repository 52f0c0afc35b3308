//! A pool of append-mode output files, keyed by path.
//!
//! Callers may address any number of paths, but at most `streams` files are
//! open at once. Files are kept in an LRU cache; when a new path needs a slot
//! the least recently used file is ended and its close is awaited before the
//! new file is opened. Every cache mutation happens while holding a single
//! async mutex, so two callers asking for the same new path never open it twice.

use crate::errors::FragmentError;
use crate::pool::ConcurrentPromiseManager;
use anyhow::{anyhow, Context, Result};
use futures::FutureExt;
use log::{debug, info};
use lru::LruCache;
use oxigraph::io::{RdfFormat, RdfSerializer, WriterQuadSerializer};
use oxigraph::model::Quad;
use std::fs::File;
use std::io::BufWriter;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

type Encoder = WriterQuadSerializer<BufWriter<File>>;

/// Counters shared between the writer and its streams.
#[derive(Debug, Default)]
struct HandleCounters {
    open: AtomicUsize,
    peak: AtomicUsize,
    opened: AtomicUsize,
}

/// An open output file together with its serializer.
pub struct WriteStream {
    path: PathBuf,
    encoder: Mutex<Option<Encoder>>,
    counters: Arc<HandleCounters>,
}

impl WriteStream {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_closed(&self) -> bool {
        self.encoder
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_none()
    }

    /// Serializes `quad` to the end of the file.
    pub fn write_quad(&self, quad: &Quad) -> Result<()> {
        let mut encoder = self.encoder.lock().unwrap_or_else(|e| e.into_inner());
        let encoder = encoder.as_mut().ok_or_else(|| FragmentError::StreamClosed {
            path: self.path.display().to_string(),
        })?;
        encoder
            .serialize_quad(quad)
            .with_context(|| format!("Failed to write to {}", self.path.display()))
    }

    /// Finishes the serializer and flushes the file. Ending an already ended
    /// stream does nothing.
    fn end(&self) -> Result<()> {
        let encoder = self
            .encoder
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let Some(encoder) = encoder else {
            return Ok(());
        };
        // the handle is released whether or not the flush succeeds
        let result = encoder
            .finish()
            .and_then(|buffered| buffered.into_inner().map_err(|e| e.into_error()))
            .map(drop)
            .with_context(|| format!("Failed to close {}", self.path.display()));
        self.counters.open.fetch_sub(1, Ordering::SeqCst);
        debug!("Closed write stream {}", self.path.display());
        result
    }
}

pub struct ParallelFileWriter {
    streams: usize,
    cache: tokio::sync::Mutex<LruCache<PathBuf, Arc<WriteStream>>>,
    counters: Arc<HandleCounters>,
}

impl ParallelFileWriter {
    pub fn new(streams: usize) -> Self {
        let streams = streams.max(1);
        Self {
            streams,
            cache: tokio::sync::Mutex::new(LruCache::new(
                NonZeroUsize::new(streams).unwrap_or(NonZeroUsize::MIN),
            )),
            counters: Arc::new(HandleCounters::default()),
        }
    }

    /// Maximum number of files open at once.
    pub fn streams(&self) -> usize {
        self.streams
    }

    /// Files currently open.
    pub fn open_handles(&self) -> usize {
        self.counters.open.load(Ordering::SeqCst)
    }

    /// Highest number of files that were open at the same time.
    pub fn peak_open_handles(&self) -> usize {
        self.counters.peak.load(Ordering::SeqCst)
    }

    /// Total number of times a file was opened, including reopens after eviction.
    pub fn total_opened(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    /// Returns the stream for `path`, opening it in append mode if needed.
    pub async fn get_write_stream(&self, path: &Path, content_type: &str) -> Result<Arc<WriteStream>> {
        let mut cache = self.cache.lock().await;
        if let Some(stream) = cache.get(path) {
            return Ok(stream.clone());
        }

        let format = RdfFormat::from_media_type(content_type).ok_or_else(|| {
            FragmentError::UnsupportedContentType {
                content_type: content_type.to_string(),
            }
        })?;

        if cache.len() >= self.streams {
            if let Some((evicted, stream)) = cache.pop_lru() {
                debug!("Evicting write stream {}", evicted.display());
                end_stream(stream).await?;
            }
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .with_context(|| format!("Failed to open {}", path.display()))?
            .into_std()
            .await;
        let encoder = RdfSerializer::from_format(format).for_writer(BufWriter::new(file));

        let open = self.counters.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.peak.fetch_max(open, Ordering::SeqCst);
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        debug!("Opened write stream {} ({} open)", path.display(), open);

        let stream = Arc::new(WriteStream {
            path: path.to_path_buf(),
            encoder: Mutex::new(Some(encoder)),
            counters: self.counters.clone(),
        });
        cache.put(path.to_path_buf(), stream.clone());
        Ok(stream)
    }

    /// Writes one quad to `path`. A stream that is evicted between lookup and
    /// write is reopened.
    pub async fn write(&self, path: &Path, content_type: &str, quad: &Quad) -> Result<()> {
        loop {
            let stream = self.get_write_stream(path, content_type).await?;
            match stream.write_quad(quad) {
                Err(e)
                    if matches!(
                        e.downcast_ref::<FragmentError>(),
                        Some(FragmentError::StreamClosed { .. })
                    ) =>
                {
                    continue
                }
                result => return result,
            }
        }
    }

    /// Ends every open stream and waits until all of them are flushed.
    /// Fails with the first error, after every stream has been handled.
    pub async fn close(&self) -> Result<()> {
        let mut cache = self.cache.lock().await;
        let mut pool = ConcurrentPromiseManager::new(self.streams);
        let mut first_error = None;
        while let Some((path, stream)) = cache.pop_lru() {
            let label = path.display().to_string();
            if let Err(e) = pool.push(label, end_stream(stream).boxed()).await {
                first_error.get_or_insert(e);
            }
        }
        // a failed close leaves the others queued
        while pool.size() > 0 {
            if let Err(e) = pool.wait_until_queue_empty().await {
                first_error.get_or_insert(e);
            }
        }
        let closed = pool.results().len();
        info!("Closed {} write streams", closed);
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Ends `stream` on a blocking thread.
async fn end_stream(stream: Arc<WriteStream>) -> Result<()> {
    let path = stream.path.clone();
    tokio::task::spawn_blocking(move || stream.end())
        .await
        .map_err(|e| anyhow!("Closing {} panicked: {}", path.display(), e))?
}
