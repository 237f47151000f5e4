//! Console capabilities backed by the process terminal.
//!
//! Stdin is owned by one dedicated thread. Every read, whether a plain line,
//! a masked secret, or the certificate question asked from inside the TLS
//! handshake, is queued to that thread and answered in order. An async read
//! that is abandoned keeps its place in the queue and is picked up again by
//! the next read, so no typed line is lost.

use std::{
    io::{self, BufRead, IsTerminal, Write},
    sync::mpsc,
    thread,
};

use crossterm::{
    cursor::MoveTo,
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType, disable_raw_mode, enable_raw_mode},
};
use talkline_client::{CertificateIssue, Prompt, Screen, TrustPrompt, is_affirmative};
use tokio::sync::oneshot;

use crate::{KeyInput, MaskedAction, MaskedInput};

type ReadResult = io::Result<Option<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputKind {
    Line,
    Secret,
}

#[derive(Debug)]
enum Reply {
    Async(oneshot::Sender<ReadResult>),
    Blocking(mpsc::Sender<ReadResult>),
}

#[derive(Debug)]
struct Request {
    kind: InputKind,
    reply: Reply,
}

/// Handle to the stdin reader thread.
#[derive(Debug, Clone)]
pub struct InputService {
    requests: mpsc::Sender<Request>,
}

impl InputService {
    /// Start the reader thread.
    pub fn spawn() -> io::Result<Self> {
        let (requests, queue) = mpsc::channel();
        thread::Builder::new().name("console-input".to_string()).spawn(move || serve(queue))?;
        Ok(Self { requests })
    }

    fn submit(&self, kind: InputKind, reply: Reply) -> io::Result<()> {
        self.requests
            .send(Request { kind, reply })
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "console input thread stopped"))
    }

    fn submit_async(&self, kind: InputKind) -> io::Result<oneshot::Receiver<ReadResult>> {
        let (tx, rx) = oneshot::channel();
        self.submit(kind, Reply::Async(tx))?;
        Ok(rx)
    }

    /// Read one line, blocking the calling thread.
    fn read_line_blocking(&self) -> ReadResult {
        let (tx, rx) = mpsc::channel();
        self.submit(InputKind::Line, Reply::Blocking(tx))?;
        rx.recv()
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "console input thread stopped"))?
    }
}

fn serve(queue: mpsc::Receiver<Request>) {
    for Request { kind, reply } in queue {
        let result = match kind {
            InputKind::Line => read_stdin_line(),
            InputKind::Secret => read_masked(),
        };
        // The requester may have given up; the answer is then discarded.
        match reply {
            Reply::Async(tx) => {
                let _ = tx.send(result);
            },
            Reply::Blocking(tx) => {
                let _ = tx.send(result);
            },
        }
    }
    tracing::debug!("Console input thread exiting");
}

fn read_stdin_line() -> ReadResult {
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    let trimmed = line.trim_end_matches(['\r', '\n']).len();
    line.truncate(trimmed);
    Ok(Some(line))
}

/// Leaves raw mode when dropped.
struct RawMode;

impl RawMode {
    fn enable() -> io::Result<Self> {
        enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

fn read_masked() -> ReadResult {
    if !io::stdin().is_terminal() {
        return read_stdin_line();
    }

    let mut input = MaskedInput::new();
    let submitted = {
        let _raw = RawMode::enable()?;
        loop {
            let Event::Key(key) = event::read()? else {
                continue;
            };
            if key.kind != KeyEventKind::Press {
                continue;
            }
            let Some(key) = convert_key(key.code, key.modifiers) else {
                continue;
            };

            match input.handle_key(key) {
                MaskedAction::Echo(text) => {
                    let mut out = io::stdout().lock();
                    out.write_all(text.as_bytes())?;
                    out.flush()?;
                },
                MaskedAction::Submit => break true,
                MaskedAction::Cancel => break false,
                MaskedAction::Ignore => {},
            }
        }
    };

    let mut out = io::stdout().lock();
    out.write_all(b"\n")?;
    out.flush()?;

    Ok(submitted.then(|| input.finish()))
}

/// Convert a crossterm key to a [`KeyInput`].
fn convert_key(code: KeyCode, modifiers: KeyModifiers) -> Option<KeyInput> {
    match code {
        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
            Some(KeyInput::Interrupt)
        },
        KeyCode::Char(c) => Some(KeyInput::Char(c)),
        KeyCode::Enter => Some(KeyInput::Enter),
        KeyCode::Backspace => Some(KeyInput::Backspace),
        KeyCode::Esc => Some(KeyInput::Esc),
        _ => None,
    }
}

/// [`Prompt`] reading from the terminal.
#[derive(Debug)]
pub struct TerminalPrompt {
    input: InputService,
    pending: Option<oneshot::Receiver<ReadResult>>,
}

impl TerminalPrompt {
    /// Prompt backed by `input`.
    pub fn new(input: InputService) -> Self {
        Self { input, pending: None }
    }

    /// Resume an abandoned read, or queue a new one.
    ///
    /// A resumed read returns whatever the abandoned request produced, even
    /// if `kind` differs.
    async fn read(&mut self, kind: InputKind) -> ReadResult {
        let rx = match self.pending.take() {
            Some(rx) => rx,
            None => self.input.submit_async(kind)?,
        };
        let rx = self.pending.insert(rx);
        let result = rx.await;
        self.pending = None;

        result
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "console input thread stopped"))?
    }
}

impl Prompt for TerminalPrompt {
    async fn read_line(&mut self) -> io::Result<Option<String>> {
        self.read(InputKind::Line).await
    }

    async fn read_secret(&mut self) -> io::Result<Option<String>> {
        self.read(InputKind::Secret).await
    }
}

/// [`Screen`] writing to stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalScreen;

impl Screen for TerminalScreen {
    fn print(&self, text: &str) {
        let mut out = io::stdout().lock();
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }

    fn println(&self, text: &str) {
        let mut out = io::stdout().lock();
        let _ = writeln!(out, "{text}");
        let _ = out.flush();
    }

    fn alert(&self, text: &str) {
        let mut out = io::stdout().lock();
        let _ = execute!(
            out,
            SetForegroundColor(Color::Red),
            Print(format!("\n{text}\n")),
            ResetColor
        );
    }

    fn clear(&self) {
        let mut out = io::stdout().lock();
        let _ = execute!(out, Clear(ClearType::All), MoveTo(0, 0));
    }
}

/// [`TrustPrompt`] asking on the terminal.
///
/// Blocks the calling thread until the user answers.
#[derive(Debug)]
pub struct TerminalTrust {
    input: InputService,
    screen: TerminalScreen,
}

impl TerminalTrust {
    /// Trust prompt reading answers through `input`.
    pub fn new(input: InputService) -> Self {
        Self { input, screen: TerminalScreen }
    }
}

impl TrustPrompt for TerminalTrust {
    fn confirm_untrusted(&self, issue: &CertificateIssue) -> bool {
        self.screen.println(&format!("Certificate error: {issue}"));
        self.screen
            .print("The server's security certificate is not trusted. Connect anyway? (y/n): ");

        match self.input.read_line_blocking() {
            Ok(Some(answer)) => is_affirmative(&answer),
            Ok(None) => false,
            Err(e) => {
                tracing::warn!("Failed to read certificate answer: {}", e);
                false
            },
        }
    }
}
