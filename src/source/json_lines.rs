//! Newline-delimited JSON source (stdin or a file)

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::domain::RawEvent;

use super::{EventSource, SourceError};

/// Reads one JSON object per line. Blank lines are skipped.
pub struct JsonLinesSource<R> {
    reader: R,
    line: u64,
    buf: String,
}

impl<R: AsyncBufRead + Unpin + Send> JsonLinesSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: 0,
            buf: String::new(),
        }
    }
}

impl JsonLinesSource<BufReader<tokio::io::Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

impl JsonLinesSource<BufReader<tokio::fs::File>> {
    pub async fn open(path: impl AsRef<std::path::Path>) -> Result<Self, SourceError> {
        let file = tokio::fs::File::open(path).await?;
        Ok(Self::new(BufReader::new(file)))
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> EventSource for JsonLinesSource<R> {
    async fn next_event(&mut self) -> Result<Option<RawEvent>, SourceError> {
        loop {
            self.buf.clear();
            if self.reader.read_line(&mut self.buf).await? == 0 {
                return Ok(None);
            }
            self.line += 1;

            let record = self.buf.trim();
            if record.is_empty() {
                continue;
            }

            return serde_json::from_str(record)
                .map(Some)
                .map_err(|source| SourceError::Decode {
                    line: self.line,
                    source,
                });
        }
    }
}
