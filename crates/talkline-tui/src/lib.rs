//! Terminal frontend for talkline
//!
//! Supplies the terminal implementations of the console capabilities that
//! [`talkline_client::Runtime`] is generic over. All session logic lives in
//! the client crate.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;
pub mod input;
pub mod terminal;

pub use error::RuntimeError;
pub use input::{KeyInput, MaskedAction, MaskedInput};
pub use terminal::{InputService, TerminalPrompt, TerminalScreen, TerminalTrust};
