// src/exec/lazy_writer.rs

//! A stream sink that creates its backing file only once there is something
//! to put in it.
//!
//! The supervisor uses this for the child's stderr: a run that never writes
//! to stderr leaves no `stderr` file at all, in contrast to the `out` marker
//! which exists from the moment the run starts.

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Bounded read size so one busy stream cannot monopolise a poll iteration.
const CHUNK_SIZE: usize = 16 * 1024;

pub struct LazyOutputWriter<R> {
    source: R,
    dest: PathBuf,
    sink: Option<File>,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> LazyOutputWriter<R> {
    pub fn new(source: R, dest: PathBuf) -> Self {
        Self {
            source,
            dest,
            sink: None,
            buf: vec![0; CHUNK_SIZE],
        }
    }

    /// Pump one chunk from the stream to the file.
    ///
    /// Returns `Ok(false)` exactly when the stream reported end-of-file.
    /// The file write is synchronous, so a caller that cancels the pending
    /// read (e.g. via a poll timeout) can never lose an already-read chunk.
    pub async fn progress(&mut self) -> Result<bool> {
        let n = self
            .source
            .read(&mut self.buf)
            .await
            .context("reading from child stream")?;
        if n == 0 {
            return Ok(false);
        }

        if self.sink.is_none() {
            let file = File::create(&self.dest)
                .with_context(|| format!("creating {}", self.dest.display()))?;
            self.sink = Some(file);
        }
        if let Some(sink) = self.sink.as_mut() {
            sink.write_all(&self.buf[..n])
                .with_context(|| format!("writing to {}", self.dest.display()))?;
        }
        Ok(true)
    }

    /// Flush and close the backing file, if one was ever opened.
    pub fn close(&mut self) -> Result<()> {
        if let Some(mut sink) = self.sink.take() {
            sink.flush()
                .with_context(|| format!("flushing {}", self.dest.display()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[tokio::test]
    async fn empty_stream_leaves_no_file() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("stderr");
        let mut writer = LazyOutputWriter::new(&b""[..], dest.clone());
        assert!(!writer.progress().await.unwrap());
        writer.close().unwrap();
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn single_byte_creates_file_with_that_byte() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("stderr");
        let mut writer = LazyOutputWriter::new(&b"x"[..], dest.clone());
        assert!(writer.progress().await.unwrap());
        assert!(!writer.progress().await.unwrap());
        writer.close().unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"x");
    }

    #[tokio::test]
    async fn large_stream_is_copied_in_chunks() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("stderr");
        let data = vec![7u8; CHUNK_SIZE * 2 + 13];
        let mut writer = LazyOutputWriter::new(&data[..], dest.clone());
        while writer.progress().await.unwrap() {}
        writer.close().unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), data);
    }
}
