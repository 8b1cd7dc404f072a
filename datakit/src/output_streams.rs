//! Named, buffered output files.
//!
//! Values written to a stream are kept in memory and appended to its file once
//! `max_chunks` of them have piled up, on [`OutputStreams::force`], or on
//! [`OutputStreams::close_all`].

use std::path::{Path, PathBuf};

use hashbrown::HashMap;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Error)]
pub enum OutputStreamsError {
    #[error("Stream {0} is not set")]
    UnknownStream(String),
    #[error("Failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type OutputStreamsResult<T> = Result<T, OutputStreamsError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputStreamsConfig {
    /// Buffered values per stream before they are written out.
    pub max_chunks: usize,
}

impl Default for OutputStreamsConfig {
    fn default() -> Self {
        Self { max_chunks: 10 }
    }
}

#[derive(Debug)]
struct Stream {
    path: PathBuf,
    file: File,
    chunks: Vec<String>,
    written: usize,
}

impl Stream {
    async fn flush_chunks(&mut self) -> OutputStreamsResult<()> {
        if self.chunks.is_empty() {
            return Ok(());
        }

        let data = self.chunks.concat();
        self.chunks.clear();
        self.file
            .write_all(data.as_bytes())
            .await
            .map_err(|source| self.io_error(source))
    }

    async fn close(mut self) -> OutputStreamsResult<()> {
        self.flush_chunks().await?;
        self.file
            .shutdown()
            .await
            .map_err(|source| self.io_error(source))
    }

    fn io_error(&self, source: std::io::Error) -> OutputStreamsError {
        OutputStreamsError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[derive(Debug, Default)]
pub struct OutputStreams {
    config: OutputStreamsConfig,
    streams: HashMap<String, Stream>,
}

impl OutputStreams {
    pub fn new(config: OutputStreamsConfig) -> Self {
        Self {
            config,
            streams: HashMap::new(),
        }
    }

    pub fn config(&self) -> &OutputStreamsConfig {
        &self.config
    }

    /// Adds every `(name, path)` stream.
    pub async fn init<I, N, P>(&mut self, streams: I) -> OutputStreamsResult<&mut Self>
    where
        I: IntoIterator<Item = (N, P)>,
        N: Into<String>,
        P: AsRef<Path>,
    {
        for (name, path) in streams {
            self.add(name, path).await?;
        }
        Ok(self)
    }

    /// Creates (or truncates) the file behind a new stream. Adding a name that
    /// is already present keeps the existing stream.
    pub async fn add(
        &mut self,
        name: impl Into<String>,
        path: impl AsRef<Path>,
    ) -> OutputStreamsResult<&mut Self> {
        let name = name.into();
        if self.streams.contains_key(&name) {
            return Ok(self);
        }

        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)
            .await
            .map_err(|source| OutputStreamsError::Io {
                path: path.clone(),
                source,
            })?;
        debug!("Opened output stream {name} at {}", path.display());

        self.streams.insert(
            name,
            Stream {
                path,
                file,
                chunks: Vec::new(),
                written: 0,
            },
        );
        Ok(self)
    }

    /// Buffers a value and writes the buffer out once it holds `max_chunks`
    /// values.
    pub async fn write(
        &mut self,
        name: &str,
        value: impl Into<String>,
    ) -> OutputStreamsResult<&mut Self> {
        let max_chunks = self.config.max_chunks;
        let stream = self
            .streams
            .get_mut(name)
            .ok_or_else(|| OutputStreamsError::UnknownStream(name.to_string()))?;

        stream.chunks.push(value.into());
        stream.written += 1;
        if stream.chunks.len() >= max_chunks {
            stream.flush_chunks().await?;
        }
        Ok(self)
    }

    /// Writes the stream's buffer out now.
    pub async fn force(&mut self, name: &str) -> OutputStreamsResult<&mut Self> {
        self.streams
            .get_mut(name)
            .ok_or_else(|| OutputStreamsError::UnknownStream(name.to_string()))?
            .flush_chunks()
            .await?;
        Ok(self)
    }

    /// Writes to the stream named after `path`, creating it on first use.
    pub async fn write_to(
        &mut self,
        path: impl AsRef<Path>,
        value: impl Into<String>,
    ) -> OutputStreamsResult<&mut Self> {
        let path = path.as_ref();
        let name = path.to_string_lossy().into_owned();
        self.add(name.as_str(), path).await?;
        self.write(&name, value).await?;
        Ok(self)
    }

    /// Number of values written to a stream so far, buffered ones included.
    pub fn written(&self, name: &str) -> Option<usize> {
        self.streams.get(name).map(|stream| stream.written)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.streams.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Writes every buffer out and closes every file. The registry is empty
    /// afterwards, even when closing one of the files fails.
    pub async fn close_all(&mut self) -> OutputStreamsResult<()> {
        let count = self.streams.len();
        let mut first_error = None;

        for (_, stream) in self.streams.drain() {
            if let Err(err) = stream.close().await {
                warn!("{err}");
                first_error.get_or_insert(err);
            }
        }
        debug!("Closed {count} output stream(s)");

        first_error.map_or(Ok(()), Err)
    }
}

impl Drop for OutputStreams {
    fn drop(&mut self) {
        let pending: usize = self.streams.values().map(|stream| stream.chunks.len()).sum();
        if pending > 0 {
            warn!(
                "OutputStreams dropped with {pending} buffered value(s); call OutputStreams::close_all() first"
            );
        }
    }
}
