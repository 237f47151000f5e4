//! Masked line editing for password entry.
//!
//! Key events are converted to [`KeyInput`] by the terminal layer, then fed
//! to [`MaskedInput`], which owns the secret buffer and says what to echo.

use zeroize::Zeroizing;

/// Key input events from the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyInput {
    /// Character input.
    Char(char),
    /// Enter/Return key.
    Enter,
    /// Backspace key.
    Backspace,
    /// Escape key.
    Esc,
    /// Ctrl+C.
    Interrupt,
}

/// What the terminal should do after a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskedAction {
    /// Write this to the terminal.
    Echo(&'static str),
    /// Entry is complete.
    Submit,
    /// Entry was cancelled.
    Cancel,
    /// Nothing to do.
    Ignore,
}

/// Echo for one accepted character.
pub const MASK: &str = "*";

/// Echo that erases the last mask character.
pub const ERASE: &str = "\x08 \x08";

/// Buffer for one masked entry.
///
/// The buffer is zeroized on drop.
#[derive(Debug, Default)]
pub struct MaskedInput {
    buffer: Zeroizing<String>,
}

impl MaskedInput {
    /// Create an empty entry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of characters entered so far.
    pub fn len(&self) -> usize {
        self.buffer.chars().count()
    }

    /// Whether nothing has been entered.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Apply one key.
    pub fn handle_key(&mut self, key: KeyInput) -> MaskedAction {
        match key {
            KeyInput::Char(c) if !c.is_control() => {
                self.buffer.push(c);
                MaskedAction::Echo(MASK)
            },
            KeyInput::Backspace => match self.buffer.pop() {
                Some(_) => MaskedAction::Echo(ERASE),
                None => MaskedAction::Ignore,
            },
            KeyInput::Enter => MaskedAction::Submit,
            KeyInput::Interrupt => MaskedAction::Cancel,
            KeyInput::Char(_) | KeyInput::Esc => MaskedAction::Ignore,
        }
    }

    /// Take the entered text.
    pub fn finish(mut self) -> String {
        std::mem::take(&mut *self.buffer)
    }
}
