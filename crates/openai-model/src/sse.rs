//! Server-sent events over a stream of byte chunks.

#[cfg(test)]
use std::collections::VecDeque;
use std::fmt::{self, Display};

use bytes::{Buf, Bytes, BytesMut};
use reqwest::Response;

/// Errors while reading events.
#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    /// The underlying body stream failed.
    Transport(String),
    /// An event was not valid UTF-8.
    InvalidPayload,
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Transport(reason) => write!(f, "transport error: {reason}"),
            Error::InvalidPayload => write!(f, "invalid event payload"),
        }
    }
}

/// Where the bytes come from.
pub enum Chunks {
    Response(Response),
    #[cfg(test)]
    VecDeque(VecDeque<Bytes>),
}

impl Chunks {
    #[inline]
    pub fn from_response(response: Response) -> Self {
        Chunks::Response(response)
    }

    #[cfg(test)]
    pub fn from_vec_deque(vec: VecDeque<Bytes>) -> Self {
        Chunks::VecDeque(vec)
    }

    async fn next_chunk(&mut self) -> Result<Option<Bytes>, Error> {
        match self {
            Chunks::Response(response) => response
                .chunk()
                .await
                .map_err(|err| Error::Transport(format!("{err}"))),
            #[cfg(test)]
            Chunks::VecDeque(vec) => Ok(vec.pop_front()),
        }
    }
}

/// Reads `data` payloads of server-sent events.
///
/// Only the `data` field is surfaced; comments and the `event`, `id` and
/// `retry` fields are skipped. Multiple `data` lines in one event are
/// joined with a line feed. Bytes are buffered until a whole event is
/// available, so multi-byte characters split across chunks are fine. A
/// trailing event without its blank-line terminator is discarded.
pub struct Sse {
    buf: BytesMut,
    chunks: Chunks,
    exhausted: bool,
}

impl Sse {
    #[inline]
    pub fn new(chunks: Chunks) -> Self {
        Self {
            buf: BytesMut::new(),
            chunks,
            exhausted: false,
        }
    }

    pub async fn next_event(&mut self) -> Result<Option<String>, Error> {
        loop {
            while let Some(block) = self.take_block() {
                if let Some(data) = parse_block(&block)? {
                    return Ok(Some(data));
                }
            }
            if self.exhausted {
                return Ok(None);
            }
            match self.chunks.next_chunk().await? {
                Some(bytes) => self.push(&bytes),
                None => self.exhausted = true,
            }
        }
    }

    fn push(&mut self, bytes: &[u8]) {
        // Carriage returns only ever appear as part of line endings here.
        self.buf
            .extend(bytes.iter().copied().filter(|byte| *byte != b'\r'));
    }

    fn take_block(&mut self) -> Option<BytesMut> {
        let end = self.buf.windows(2).position(|w| w == b"\n\n")?;
        let block = self.buf.split_to(end);
        self.buf.advance(2);
        Some(block)
    }
}

fn parse_block(block: &[u8]) -> Result<Option<String>, Error> {
    let text = str::from_utf8(block).map_err(|_| Error::InvalidPayload)?;
    let mut data: Option<String> = None;
    for line in text.split('\n') {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => {
                (field, value.strip_prefix(' ').unwrap_or(value))
            }
            None => (line, ""),
        };
        if field != "data" {
            continue;
        }
        match &mut data {
            Some(data) => {
                data.push('\n');
                data.push_str(value);
            }
            None => data = Some(value.to_owned()),
        }
    }
    Ok(data)
}
