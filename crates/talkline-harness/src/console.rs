//! Scripted console capabilities.

use std::{
    io,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use talkline_client::{CertificateIssue, Prompt, Screen, TrustPrompt};
use tokio::sync::mpsc;

/// [`Prompt`] answering from a queue of lines.
///
/// Secrets come from the same queue as ordinary lines. Once every
/// [`ScriptHandle`] is dropped and the queue is drained, reads report end of
/// input.
#[derive(Debug)]
pub struct ScriptedPrompt {
    lines: mpsc::UnboundedReceiver<String>,
}

/// Feeds lines to a [`ScriptedPrompt`].
#[derive(Debug, Clone)]
pub struct ScriptHandle {
    lines: mpsc::UnboundedSender<String>,
}

impl ScriptedPrompt {
    /// Prompt with an open script.
    pub fn open() -> (Self, ScriptHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { lines: rx }, ScriptHandle { lines: tx })
    }

    /// Prompt that returns `lines` in order, then end of input.
    pub fn from_lines<I, L>(lines: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<String>,
    {
        let (prompt, handle) = Self::open();
        handle.push_all(lines);
        prompt
    }
}

impl Prompt for ScriptedPrompt {
    async fn read_line(&mut self) -> io::Result<Option<String>> {
        Ok(self.lines.recv().await)
    }

    async fn read_secret(&mut self) -> io::Result<Option<String>> {
        Ok(self.lines.recv().await)
    }
}

impl ScriptHandle {
    /// Queue one line.
    pub fn push(&self, line: impl Into<String>) {
        // The prompt may already be gone; the line is then simply unread.
        let _ = self.lines.send(line.into());
    }

    /// Queue several lines.
    pub fn push_all<I, L>(&self, lines: I)
    where
        I: IntoIterator<Item = L>,
        L: Into<String>,
    {
        for line in lines {
            self.push(line);
        }
    }
}

/// One call made on a [`RecordingScreen`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreenEvent {
    /// [`Screen::print`].
    Print(String),
    /// [`Screen::println`].
    Line(String),
    /// [`Screen::alert`].
    Alert(String),
    /// [`Screen::clear`].
    Clear,
}

/// [`Screen`] that records everything shown.
///
/// Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct RecordingScreen {
    events: Arc<Mutex<Vec<ScreenEvent>>>,
}

impl RecordingScreen {
    /// Empty recording.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ScreenEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, event: ScreenEvent) {
        self.lock().push(event);
    }

    /// Every recorded call, in order.
    pub fn events(&self) -> Vec<ScreenEvent> {
        self.lock().clone()
    }

    /// Everything shown, as the user would have seen it.
    pub fn transcript(&self) -> String {
        let mut text = String::new();
        for event in self.lock().iter() {
            match event {
                ScreenEvent::Print(s) => text.push_str(s),
                ScreenEvent::Line(s) => {
                    text.push_str(s);
                    text.push('\n');
                },
                ScreenEvent::Alert(s) => {
                    text.push('\n');
                    text.push_str(s);
                    text.push('\n');
                },
                ScreenEvent::Clear => {},
            }
        }
        text
    }

    /// Whether `needle` appears anywhere in the transcript.
    pub fn contains(&self, needle: &str) -> bool {
        self.transcript().contains(needle)
    }

    /// Alerts shown so far.
    pub fn alerts(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|event| match event {
                ScreenEvent::Alert(s) => Some(s.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of times the screen was cleared.
    pub fn clears(&self) -> usize {
        self.lock().iter().filter(|event| **event == ScreenEvent::Clear).count()
    }

    /// Wait until `needle` appears, up to `limit`. Returns whether it did.
    pub async fn wait_for(&self, needle: &str, limit: Duration) -> bool {
        let poll = async {
            while !self.contains(needle) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };
        tokio::time::timeout(limit, poll).await.is_ok()
    }
}

impl Screen for RecordingScreen {
    fn print(&self, text: &str) {
        self.record(ScreenEvent::Print(text.to_string()));
    }

    fn println(&self, text: &str) {
        self.record(ScreenEvent::Line(text.to_string()));
    }

    fn alert(&self, text: &str) {
        self.record(ScreenEvent::Alert(text.to_string()));
    }

    fn clear(&self) {
        self.record(ScreenEvent::Clear);
    }
}

/// [`TrustPrompt`] with a fixed answer that records what it was asked.
///
/// Clones share the same record.
#[derive(Debug, Clone)]
pub struct ScriptedTrust {
    answer: bool,
    asked: Arc<Mutex<Vec<CertificateIssue>>>,
}

impl ScriptedTrust {
    /// Accept every certificate put to it.
    pub fn accepting() -> Self {
        Self { answer: true, asked: Arc::default() }
    }

    /// Reject every certificate put to it.
    pub fn rejecting() -> Self {
        Self { answer: false, asked: Arc::default() }
    }

    /// Issues the user was asked about, in order.
    pub fn asked(&self) -> Vec<CertificateIssue> {
        self.asked.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl TrustPrompt for ScriptedTrust {
    fn confirm_untrusted(&self, issue: &CertificateIssue) -> bool {
        self.asked.lock().unwrap_or_else(PoisonError::into_inner).push(issue.clone());
        self.answer
    }
}
