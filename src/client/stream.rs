//! Fabricated streaming.
//!
//! The generate endpoint returns a complete response. These helpers replay
//! it as a sequence of growing word prefixes ("snapshots"), paced by a fixed
//! delay and stoppable with a [`CancellationToken`].

use std::time::Duration;

use futures_util::stream::{self, Stream};
use tokio_util::sync::CancellationToken;

use crate::error::Error;

/// Receives the snapshots of a fabricated stream.
///
/// Only `on_chunk` is required; any `FnMut(&str)` closure is a handler.
pub trait StreamHandler {
    /// Called with the text revealed so far.
    fn on_chunk(&mut self, snapshot: &str);

    /// Called once with the full text after the last chunk.
    fn on_complete(&mut self, _full_text: &str) {}

    /// Called instead of any chunk when the response could not be fetched.
    fn on_error(&mut self, _error: &Error) {}
}

impl<F: FnMut(&str)> StreamHandler for F {
    fn on_chunk(&mut self, snapshot: &str) {
        self(snapshot)
    }
}

/// Byte offset of the next snapshot end, shared by the borrowed and owned
/// snapshot sequences.
#[derive(Debug, Clone, Copy, Default)]
struct Cursor {
    search_from: usize,
    done: bool,
}

impl Cursor {
    fn advance(&mut self, text: &str) -> Option<usize> {
        if self.done {
            return None;
        }
        match text[self.search_from..].find(' ') {
            Some(offset) => {
                let end = self.search_from + offset;
                self.search_from = end + 1;
                Some(end)
            }
            None => {
                self.done = true;
                Some(text.len())
            }
        }
    }
}

/// Word-prefix snapshots of `text`.
///
/// Splits on single spaces exactly like `str::split(' ')`, so snapshot `i`
/// is the first `i` pieces rejoined with `' '`. Empty text yields one empty
/// snapshot.
#[derive(Debug, Clone)]
pub struct WordSnapshots<'a> {
    text: &'a str,
    cursor: Cursor,
}

impl<'a> WordSnapshots<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            cursor: Cursor::default(),
        }
    }
}

impl<'a> Iterator for WordSnapshots<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let end = self.cursor.advance(self.text)?;
        Some(&self.text[..end])
    }
}

/// Owned, paced, cancellable snapshot stream over `text`.
///
/// Waits `delay` before each snapshot. Ends early, without yielding
/// anything further, once `cancel` fires.
pub fn paced_snapshots(
    text: String,
    delay: Duration,
    cancel: CancellationToken,
) -> impl Stream<Item = String> + Send + 'static {
    stream::unfold(
        (text, Cursor::default(), cancel),
        move |(text, mut cursor, cancel)| async move {
            if cancel.is_cancelled() {
                return None;
            }
            let end = cursor.advance(&text)?;

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return None,
                _ = tokio::time::sleep(delay) => {}
            }

            let snapshot = text[..end].to_string();
            Some((snapshot, (text, cursor, cancel)))
        },
    )
}
