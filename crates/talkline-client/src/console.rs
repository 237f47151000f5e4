//! Console capabilities the session logic depends on.
//!
//! Input and output are split: [`Prompt`] is owned by whoever drives the
//! conversation (the handshake, then the outbound half of the session), while
//! [`Screen`] is cloned into the inbound task so server pushes can be shown
//! while the user is typing.

use std::{future::Future, io};

/// Line-oriented user input.
pub trait Prompt: Send {
    /// Read one line of input without its trailing newline.
    ///
    /// Returns `Ok(None)` once input is exhausted. Must be cancel-safe: a
    /// read abandoned by the session's shutdown signal must not lose a line
    /// that a later call would otherwise return.
    fn read_line(&mut self) -> impl Future<Output = io::Result<Option<String>>> + Send;

    /// Read one line with echo suppressed.
    ///
    /// Returns `Ok(None)` if the user cancels the entry or input is
    /// exhausted.
    fn read_secret(&mut self) -> impl Future<Output = io::Result<Option<String>>> + Send;
}

/// Text output.
pub trait Screen: Send + Sync {
    /// Write text without a trailing newline (prompts such as `> `).
    fn print(&self, text: &str);

    /// Write text followed by a newline.
    fn println(&self, text: &str);

    /// Show a message the user must not miss (kick/ban notices).
    fn alert(&self, text: &str) {
        self.println(&format!("\n{text}"));
    }

    /// Clear the visible console.
    fn clear(&self);
}

/// Print `question` and read the answer.
pub async fn ask<P, S>(prompt: &mut P, screen: &S, question: &str) -> io::Result<Option<String>>
where
    P: Prompt,
    S: Screen + ?Sized,
{
    screen.print(question);
    prompt.read_line().await
}

/// Ask a yes/no question. End of input counts as "no".
pub async fn confirm<P, S>(prompt: &mut P, screen: &S, question: &str) -> io::Result<bool>
where
    P: Prompt,
    S: Screen + ?Sized,
{
    Ok(ask(prompt, screen, question).await?.is_some_and(|answer| is_affirmative(&answer)))
}

/// `y` or `yes`, case-insensitive.
pub fn is_affirmative(answer: &str) -> bool {
    let answer = answer.trim();
    answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes")
}
