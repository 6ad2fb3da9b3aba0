//! Accumulation buffer with terminal decoding and tail search.
//!
//! Raw chunks are decoded into text as they arrive. By default ANSI/VT
//! escape sequences are dropped by a `vte` parser so patterns never have
//! to account for colour codes or cursor movement. Prompt detection only
//! searches the last `search_depth` bytes of the buffer, which keeps large
//! captures (full BGP tables and the like) cheap to scan.

use std::borrow::Cow;

use vte::{Parser, Perform};

use super::patterns::PromptMatcher;

/// Default number of trailing bytes searched for the prompt.
pub const DEFAULT_SEARCH_DEPTH: usize = 1000;

/// Buffer for accumulating output and searching it for patterns.
pub struct PatternBuffer {
    /// The accumulated, decoded output.
    text: String,

    /// How many bytes from the end to search for the prompt.
    search_depth: usize,

    decoder: Decoder,
}

impl PatternBuffer {
    /// Create a buffer that strips escape sequences.
    pub fn new(search_depth: usize) -> Self {
        Self::with_decoder(search_depth, Decoder::terminal())
    }

    /// Create a buffer that keeps the stream verbatim (lossy UTF-8 only).
    pub fn raw(search_depth: usize) -> Self {
        Self::with_decoder(search_depth, Decoder::Utf8(Vec::new()))
    }

    fn with_decoder(search_depth: usize, decoder: Decoder) -> Self {
        Self {
            text: String::with_capacity(4096),
            search_depth,
            decoder,
        }
    }

    /// Decode a chunk and append it.
    pub fn extend(&mut self, data: &[u8]) {
        self.decoder.decode(data, &mut self.text);
    }

    /// Replace the contents with rewritten text.
    pub fn replace(&mut self, text: String) {
        self.text = text;
    }

    /// The part of the buffer searched for the prompt.
    ///
    /// Covers at least the last `search_depth` bytes, widened back to the
    /// start of the line containing the cut. Line-anchored prompts never
    /// see a fragment of a line as if it were a whole one.
    pub fn tail(&self) -> &str {
        let cut = self.text.len().saturating_sub(self.search_depth);
        let start = self.text.as_bytes()[..cut]
            .iter()
            .rposition(|&b| b == b'\n')
            .map_or(0, |nl| nl + 1);
        &self.text[start..]
    }

    /// Check if the tail contains a prompt match.
    pub fn tail_contains(&self, pattern: &impl PromptMatcher) -> bool {
        pattern.is_match(self.tail())
    }

    /// Take ownership of the buffer contents and reset.
    pub fn take(&mut self) -> String {
        self.decoder.reset();
        std::mem::take(&mut self.text)
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Clear the buffer and any partially decoded input.
    pub fn clear(&mut self) {
        self.text.clear();
        self.decoder.reset();
    }

    pub fn search_depth(&self) -> usize {
        self.search_depth
    }
}

impl Default for PatternBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_SEARCH_DEPTH)
    }
}

impl std::fmt::Debug for PatternBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatternBuffer")
            .field("len", &self.text.len())
            .field("search_depth", &self.search_depth)
            .finish()
    }
}

enum Decoder {
    /// vte state machine; keeps state across chunk boundaries.
    Terminal(Box<Parser>),
    /// Bytes of an incomplete UTF-8 sequence carried to the next chunk.
    Utf8(Vec<u8>),
}

impl Decoder {
    fn terminal() -> Self {
        Decoder::Terminal(Box::new(Parser::new()))
    }

    fn decode(&mut self, data: &[u8], out: &mut String) {
        match self {
            Decoder::Terminal(parser) => {
                let mut sink = Printable { out };
                parser.advance(&mut sink, data);
            }
            Decoder::Utf8(pending) => {
                pending.extend_from_slice(data);
                let mut rest: &[u8] = &pending[..];
                loop {
                    match std::str::from_utf8(rest) {
                        Ok(valid) => {
                            out.push_str(valid);
                            rest = &[];
                            break;
                        }
                        Err(e) => {
                            let (valid, after) = rest.split_at(e.valid_up_to());
                            out.push_str(&String::from_utf8_lossy(valid));
                            match e.error_len() {
                                Some(len) => {
                                    out.push(char::REPLACEMENT_CHARACTER);
                                    rest = &after[len..];
                                }
                                // incomplete sequence at the end of the chunk
                                None => {
                                    rest = after;
                                    break;
                                }
                            }
                        }
                    }
                }
                let keep = rest.len();
                let drop = pending.len() - keep;
                pending.drain(..drop);
            }
        }
    }

    fn reset(&mut self) {
        match self {
            Decoder::Terminal(parser) => **parser = Parser::new(),
            Decoder::Utf8(pending) => pending.clear(),
        }
    }
}

/// Collects printable characters and line-structure control codes.
struct Printable<'a> {
    out: &'a mut String,
}

impl Perform for Printable<'_> {
    fn print(&mut self, c: char) {
        self.out.push(c);
    }

    fn execute(&mut self, byte: u8) {
        if matches!(byte, b'\n' | b'\r' | b'\t') {
            self.out.push(byte as char);
        }
    }
}

/// Lossy view used in log lines.
pub(crate) fn preview(text: &str, max: usize) -> Cow<'_, str> {
    if text.len() <= max {
        return Cow::Borrowed(text);
    }
    let mut start = text.len() - max;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    Cow::Owned(format!("...{}", &text[start..]))
}
