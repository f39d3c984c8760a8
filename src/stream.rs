//! Input stream boundary: lookahead, consumption, and rewind.
//!
//! The engine speculates heavily — it looks ahead during prediction and
//! rewinds before committing — so the only contract it needs from an input
//! source is `la`/`consume`/`index`/`seek` plus `mark`/`release` pairs that
//! must nest correctly even on exceptional exit. Buffering policy belongs to
//! the host; the in-memory implementation here backs the tests and small
//! hosts.

use crate::EOF;

/// A stream of integer symbols: token types for the parser, Unicode code
/// points for the lexer.
pub trait IntStream {
    /// Symbol `k` positions ahead of the cursor (`k >= 1`). `la(1)` is the
    /// current symbol. Returns [`EOF`] past the end.
    fn la(&mut self, k: isize) -> i32;

    /// Advance the cursor by one symbol. No-op at EOF.
    fn consume(&mut self);

    /// Current cursor position (symbols consumed so far).
    fn index(&self) -> usize;

    /// Move the cursor to absolute position `index`.
    fn seek(&mut self, index: usize);

    /// Begin a speculation region; the returned marker must be passed to
    /// exactly one matching [`release`](IntStream::release).
    fn mark(&mut self) -> isize;

    /// End the speculation region opened by `marker`.
    fn release(&mut self, marker: isize);

    /// Total number of symbols, excluding EOF.
    fn size(&self) -> usize;
}

/// Marker trait: a stream of token types.
pub trait TokenStream: IntStream {}

/// A stream of code points with text extraction for token spans.
pub trait CharStream: IntStream {
    /// The text of the half-open span `start..stop` in code points.
    fn text(&self, start: usize, stop: usize) -> String;
}

/// In-memory symbol stream over a vector of token types.
#[derive(Debug, Clone)]
pub struct VecTokenStream {
    symbols: Vec<i32>,
    cursor: usize,
    marks: isize,
}

impl VecTokenStream {
    pub fn new(symbols: Vec<i32>) -> Self {
        VecTokenStream { symbols, cursor: 0, marks: 0 }
    }

    /// Number of outstanding marks (for nesting checks in tests).
    pub fn outstanding_marks(&self) -> isize {
        self.marks
    }
}

impl IntStream for VecTokenStream {
    fn la(&mut self, k: isize) -> i32 {
        debug_assert!(k != 0, "la(0) is undefined");
        if k < 0 {
            let back = (-k) as usize;
            if back > self.cursor {
                return EOF;
            }
            return self.symbols[self.cursor - back];
        }
        let pos = self.cursor + (k as usize - 1);
        if pos >= self.symbols.len() { EOF } else { self.symbols[pos] }
    }

    fn consume(&mut self) {
        if self.cursor < self.symbols.len() {
            self.cursor += 1;
        }
    }

    fn index(&self) -> usize {
        self.cursor
    }

    fn seek(&mut self, index: usize) {
        self.cursor = index.min(self.symbols.len());
    }

    fn mark(&mut self) -> isize {
        self.marks += 1;
        self.marks
    }

    fn release(&mut self, marker: isize) {
        debug_assert_eq!(marker, self.marks, "marks must be released in LIFO order");
        self.marks -= 1;
    }

    fn size(&self) -> usize {
        self.symbols.len()
    }
}

impl TokenStream for VecTokenStream {}

/// In-memory character stream over a string, exposed as code points.
#[derive(Debug, Clone)]
pub struct StrCharStream {
    chars: Vec<char>,
    cursor: usize,
    marks: isize,
}

impl StrCharStream {
    pub fn new(input: &str) -> Self {
        StrCharStream { chars: input.chars().collect(), cursor: 0, marks: 0 }
    }

    /// Number of outstanding marks (for nesting checks in tests).
    pub fn outstanding_marks(&self) -> isize {
        self.marks
    }
}

impl IntStream for StrCharStream {
    fn la(&mut self, k: isize) -> i32 {
        debug_assert!(k != 0, "la(0) is undefined");
        if k < 0 {
            let back = (-k) as usize;
            if back > self.cursor {
                return EOF;
            }
            return self.chars[self.cursor - back] as i32;
        }
        let pos = self.cursor + (k as usize - 1);
        if pos >= self.chars.len() { EOF } else { self.chars[pos] as i32 }
    }

    fn consume(&mut self) {
        if self.cursor < self.chars.len() {
            self.cursor += 1;
        }
    }

    fn index(&self) -> usize {
        self.cursor
    }

    fn seek(&mut self, index: usize) {
        self.cursor = index.min(self.chars.len());
    }

    fn mark(&mut self) -> isize {
        self.marks += 1;
        self.marks
    }

    fn release(&mut self, marker: isize) {
        debug_assert_eq!(marker, self.marks, "marks must be released in LIFO order");
        self.marks -= 1;
    }

    fn size(&self) -> usize {
        self.chars.len()
    }
}

impl CharStream for StrCharStream {
    fn text(&self, start: usize, stop: usize) -> String {
        self.chars[start..stop.min(self.chars.len())].iter().collect()
    }
}
