// fifo_source.rs: the listener's end of the cooperation FIFO as a calloop source
//
// Forwarders write one URI per line. Writes of a single line are atomic on a
// FIFO, but a wakeup may still deliver several lines at once, or (for lines
// longer than PIPE_BUF) a partial one, so bytes are buffered until a newline
// arrives.

use std::{
    fs::File,
    io::{ErrorKind, Read},
};

use calloop::{
    generic::Generic, EventSource, Interest, Mode, Poll, PostAction, Readiness, Token, TokenFactory,
};

const READ_CHUNK: usize = 4096;

/// An unterminated line longer than this is dropped, up to and including
/// its eventual newline.
pub const MAX_LINE: usize = 64 * 1024;

/// Wraps the FIFO read descriptor as a calloop `EventSource`.
/// Emits one event per complete, whitespace-stripped, non-empty line and
/// never asks to be removed.
pub struct FifoSource {
    fifo: Generic<File>,
    lines: LineBuffer,
}

impl FifoSource {
    /// `fifo` must have been opened non-blocking.
    pub fn new(fifo: File) -> Self {
        Self {
            fifo: Generic::new(fifo, Interest::READ, Mode::Level),
            lines: LineBuffer::default(),
        }
    }
}

impl EventSource for FifoSource {
    type Event = String;
    type Metadata = ();
    type Ret = ();
    type Error = std::io::Error;

    fn process_events<F>(
        &mut self,
        readiness: Readiness,
        token: Token,
        mut callback: F,
    ) -> Result<PostAction, Self::Error>
    where
        F: FnMut(Self::Event, &mut Self::Metadata) -> Self::Ret,
    {
        let lines = &mut self.lines;
        self.fifo.process_events(readiness, token, |_, fifo| {
            drain_into(fifo, lines);
            Ok(PostAction::Continue)
        })?;

        for uri in self.lines.take_lines() {
            callback(uri, &mut ());
        }

        Ok(PostAction::Continue)
    }

    fn register(
        &mut self,
        poll: &mut Poll,
        token_factory: &mut TokenFactory,
    ) -> calloop::Result<()> {
        self.fifo.register(poll, token_factory)
    }

    fn reregister(
        &mut self,
        poll: &mut Poll,
        token_factory: &mut TokenFactory,
    ) -> calloop::Result<()> {
        self.fifo.reregister(poll, token_factory)
    }

    fn unregister(&mut self, poll: &mut Poll) -> calloop::Result<()> {
        self.fifo.unregister(poll)
    }
}

// ── reading ───────────────────────────────────────────────────────────────────

fn drain_into(mut fifo: &File, lines: &mut LineBuffer) {
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        match fifo.read(&mut chunk) {
            // Only reachable if every writer, including our own RDWR end, is gone.
            Ok(0) => break,
            Ok(n) => lines.extend(&chunk[..n]),
            Err(e) if e.kind() == ErrorKind::WouldBlock => break,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::warn!("FIFO read error: {e}");
                break;
            }
        }
    }
}

// ── line splitting ────────────────────────────────────────────────────────────

/// Bytes read from the FIFO that have not formed a complete line yet.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
    /// Set after an oversized line was dropped: skip up to the next newline.
    discarding: bool,
}

impl LineBuffer {
    pub fn extend(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    /// Remove every complete line and return the non-blank ones, trimmed. An
    /// unterminated tail stays buffered unless it exceeds [`MAX_LINE`].
    pub fn take_lines(&mut self) -> Vec<String> {
        if self.discarding {
            match self.pending.iter().position(|&b| b == b'\n') {
                Some(end) => {
                    self.pending.drain(..=end);
                    self.discarding = false;
                }
                None => {
                    self.pending.clear();
                    return Vec::new();
                }
            }
        }

        let lines = match self.pending.iter().rposition(|&b| b == b'\n') {
            Some(last_newline) => {
                let complete: Vec<u8> = self.pending.drain(..=last_newline).collect();
                complete
                    .split(|&b| b == b'\n')
                    .map(|line| String::from_utf8_lossy(line).trim().to_owned())
                    .filter(|line| !line.is_empty())
                    .collect()
            }
            None => Vec::new(),
        };

        if self.pending.len() > MAX_LINE {
            tracing::warn!(
                "Dropping {} bytes of unterminated FIFO input",
                self.pending.len()
            );
            self.pending.clear();
            self.discarding = true;
        }

        lines
    }
}

// ── tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(bytes: &[u8]) -> LineBuffer {
        let mut buf = LineBuffer::default();
        buf.extend(bytes);
        buf
    }

    #[test]
    fn complete_lines_are_trimmed() {
        let mut buf = buffer(b"  http://a.org \nhttps://b.org\r\n");
        assert_eq!(buf.take_lines(), vec!["http://a.org", "https://b.org"]);
        assert!(buf.pending().is_empty());
    }

    #[test]
    fn partial_line_waits_for_newline() {
        let mut buf = buffer(b"http://a.org\nhttp://b.");
        assert_eq!(buf.take_lines(), vec!["http://a.org"]);
        assert_eq!(buf.pending(), b"http://b.");

        buf.extend(b"org\n");
        assert_eq!(buf.take_lines(), vec!["http://b.org"]);
        assert!(buf.pending().is_empty());
    }

    #[test]
    fn blank_lines_yield_nothing() {
        let mut buf = buffer(b"\n   \n\t\n");
        assert!(buf.take_lines().is_empty());
        assert!(buf.pending().is_empty());
    }

    #[test]
    fn no_newline_no_lines() {
        let mut buf = buffer(b"about:blank");
        assert!(buf.take_lines().is_empty());
        assert_eq!(buf.pending(), b"about:blank");
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let mut buf = buffer(b"http://x.org/\xff\n");
        assert_eq!(buf.take_lines(), vec!["http://x.org/\u{fffd}"]);
    }

    #[test]
    fn oversized_line_is_dropped_through_its_newline() {
        let mut buf = buffer(&[b'a'; 60_000]);
        assert!(buf.take_lines().is_empty());

        buf.extend(&[b'b'; 10_000]);
        assert!(buf.take_lines().is_empty());
        assert!(buf.pending().is_empty());

        buf.extend(&[b'b'; 5_000]);
        assert!(buf.take_lines().is_empty());

        buf.extend(b"ccc\nhttp://ok.example\n");
        assert_eq!(buf.take_lines(), vec!["http://ok.example"]);
        assert!(buf.pending().is_empty());
    }

    #[test]
    fn oversized_tail_after_good_lines() {
        let mut buf = buffer(b"http://first.example\n");
        buf.extend(&[b'x'; MAX_LINE + 1]);
        assert_eq!(buf.take_lines(), vec!["http://first.example"]);

        buf.extend(b"tail\nabout:blank\n");
        assert_eq!(buf.take_lines(), vec!["about:blank"]);
    }
}
