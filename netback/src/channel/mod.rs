//! Channel layer: pattern matching and the interactive session engine.
//!
//! This module handles everything between raw stream bytes and the text
//! of one command's output: decoding, prompt detection and interrupt rules.

pub mod buffer;
pub mod interrupt;
mod patterns;
mod session;
mod stream;

pub use buffer::PatternBuffer;
pub use interrupt::InterruptPass;
pub use patterns::{InterruptRule, PatternRule, PromptMatcher, PromptPattern, SecretRule};
pub use session::{LINE_TERMINATOR, Session};
pub use stream::{IoStream, Stream};
