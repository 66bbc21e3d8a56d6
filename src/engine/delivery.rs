//! Simulated incremental delivery.
//!
//! A resolved text is cut into word-level chunks and wrapped in frames:
//!
//! ```text
//! "Hi there  friend"  ──▶  Start │ "Hi " │ "there  " │ "friend" │ Done
//!                          t=0    +d      +d          +d         +d
//! ```
//!
//! A chunk is optional leading whitespace (first chunk only), a word, and the
//! whitespace that follows it. Nothing is dropped or normalised, so the deltas
//! concatenate back to the input byte for byte.
//!
//! The same frames back both API surfaces; only the transport encoding differs.

use futures::Stream;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Role/start marker, sent immediately.
    Start,
    Delta(String),
    /// Terminal marker after the last delta.
    Done,
}

/// Byte length of the first chunk of `text`.
fn chunk_end(text: &str) -> usize {
    let word_start = text.find(|c: char| !c.is_whitespace()).unwrap_or(text.len());
    let after_word = &text[word_start..];
    let word_end = word_start + after_word.find(char::is_whitespace).unwrap_or(after_word.len());
    let after_space = &text[word_end..];
    word_end + after_space.find(|c: char| !c.is_whitespace()).unwrap_or(after_space.len())
}

/// Borrowing chunk iterator, see [`chunks`].
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    rest: &'a str,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        if self.rest.is_empty() {
            return None;
        }
        let (chunk, rest) = self.rest.split_at(chunk_end(self.rest));
        self.rest = rest;
        Some(chunk)
    }
}

pub fn chunks(text: &str) -> Chunks<'_> {
    Chunks { rest: text }
}

struct OwnedChunks {
    text: String,
    pos: usize,
}

impl Iterator for OwnedChunks {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let rest = &self.text[self.pos..];
        if rest.is_empty() {
            return None;
        }
        let end = chunk_end(rest);
        self.pos += end;
        Some(rest[..end].to_string())
    }
}

/// `Start`, one `Delta` per chunk, `Done`. Lazy: chunks are cut as frames are pulled.
pub fn frames(text: String) -> impl Iterator<Item = Frame> + Send + 'static {
    std::iter::once(Frame::Start)
        .chain(OwnedChunks { text, pos: 0 }.map(Frame::Delta))
        .chain(std::iter::once(Frame::Done))
}

/// [`frames`] paced on the tokio clock: the first frame is immediate, then
/// `delay` elapses before each following frame.
pub fn stream(text: String, delay: Duration) -> impl Stream<Item = Frame> + Send + 'static {
    futures::stream::unfold((frames(text), true), move |(mut frames, first)| async move {
        let frame = frames.next()?;
        if !first && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Some((frame, (frames, false)))
    })
}
