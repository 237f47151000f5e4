//! Duplex chat session.
//!
//! After authentication the stream is split: a spawned inbound task reads and
//! displays server pushes while the caller's task reads user input and writes
//! it out. Neither half blocks the other. The only shared state is the
//! [`Shutdown`] signal; whichever half stops first triggers it, and the other
//! half wakes from its pending read.
//!
//! There is no framing. Each completed read is displayed as one unit and each
//! line of input is sent with one write.

use std::time::Duration;

use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf},
    task::JoinHandle,
};

use crate::{
    ClientConfig, Prompt, Screen, Shutdown,
    commands::{self, Input, LOCAL_HELP},
};

/// Server text that ends the session: the user was kicked from the server.
pub const KICKED_MARKER: &str = "kicked";

/// Server text that ends the session: the account is banned.
pub const BANNED_MARKER: &str = "account is banned";

/// Whether a server push forces the session to end.
pub fn is_forced_termination(text: &str) -> bool {
    text.contains(KICKED_MARKER) || text.contains(BANNED_MARKER)
}

/// How the inbound half ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEnd {
    /// Shutdown was triggered by the outbound half.
    Stopped,
    /// Server closed the connection (zero-length read).
    ServerClosed,
    /// Server kicked or banned the user. Carries the notice.
    ForcedOut(String),
    /// Read failed.
    Failed(String),
}

/// How the outbound half ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundEnd {
    /// Shutdown was triggered by the inbound half.
    Stopped,
    /// User sent `/quit` or `/logout`.
    Quit,
    /// Console input reached end of file.
    InputClosed,
    /// Reading console input failed.
    InputFailed(String),
    /// Writing to the server failed.
    WriteFailed(String),
}

/// How each half of a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    /// Inbound (server to console) half.
    pub inbound: InboundEnd,
    /// Outbound (console to server) half.
    pub outbound: OutboundEnd,
}

/// An authenticated stream ready for free messaging.
pub struct Session<T> {
    stream: T,
    shutdown: Shutdown,
    kick_grace: Duration,
    buffer_size: usize,
}

impl<T> Session<T>
where
    T: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    /// Wrap an authenticated `stream`.
    pub fn new(stream: T, shutdown: Shutdown, config: &ClientConfig) -> Self {
        Self {
            stream,
            shutdown,
            kick_grace: config.kick_grace,
            buffer_size: config.read_buffer_size,
        }
    }

    /// Run both halves until the session ends, then close the stream.
    ///
    /// The stream is shut down and dropped exactly once, after both halves
    /// have stopped.
    pub async fn run<P, S>(self, prompt: &mut P, screen: &S) -> SessionReport
    where
        P: Prompt,
        S: Screen + Clone + 'static,
    {
        let Self { stream, shutdown, kick_grace, buffer_size } = self;
        let (reader, mut writer) = tokio::io::split(stream);

        let inbound: JoinHandle<(InboundEnd, ReadHalf<T>)> = tokio::spawn(receive_loop(
            reader,
            screen.clone(),
            shutdown.clone(),
            kick_grace,
            buffer_size,
        ));

        let outbound = send_loop(&mut writer, prompt, screen, &shutdown).await;
        shutdown.trigger();

        let inbound = match inbound.await {
            Ok((end, reader)) => {
                let mut stream = reader.unsplit(writer);
                if let Err(e) = stream.shutdown().await {
                    tracing::debug!("Stream shutdown failed: {}", e);
                }
                end
            },
            Err(e) => {
                tracing::error!("Inbound task failed: {}", e);
                if let Err(e) = writer.shutdown().await {
                    tracing::debug!("Stream shutdown failed: {}", e);
                }
                InboundEnd::Failed(e.to_string())
            },
        };

        tracing::info!("Session ended: inbound={:?} outbound={:?}", inbound, outbound);
        SessionReport { inbound, outbound }
    }
}

/// Read and display server pushes until shutdown or the connection ends.
///
/// Hands the read half back so the caller can reunite the stream.
async fn receive_loop<T, S>(
    mut reader: ReadHalf<T>,
    screen: S,
    shutdown: Shutdown,
    kick_grace: Duration,
    buffer_size: usize,
) -> (InboundEnd, ReadHalf<T>)
where
    T: AsyncRead + Unpin,
    S: Screen,
{
    let mut buf = vec![0u8; buffer_size];

    let end = loop {
        if shutdown.is_triggered() {
            break InboundEnd::Stopped;
        }

        let read = tokio::select! {
            biased;
            () = shutdown.triggered() => None,
            read = reader.read(&mut buf) => Some(read),
        };
        let Some(read) = read else {
            break InboundEnd::Stopped;
        };

        match read {
            Ok(0) => {
                tracing::info!("Server closed the connection");
                screen.println("\nServer disconnected.");
                shutdown.trigger();
                break InboundEnd::ServerClosed;
            },
            Ok(n) => {
                let text = String::from_utf8_lossy(&buf[..n]).into_owned();
                if is_forced_termination(&text) {
                    tracing::warn!("Forced out by server: {}", text.trim_end());
                    screen.alert(&text);
                    shutdown.trigger();
                    tokio::time::sleep(kick_grace).await;
                    break InboundEnd::ForcedOut(text);
                }
                screen.println(&format!("\n{text}"));
                screen.print("> ");
            },
            Err(e) => {
                tracing::warn!("Receive failed: {}", e);
                if !shutdown.is_triggered() {
                    screen.println(&format!("\nReceive error: {e}"));
                }
                shutdown.trigger();
                break InboundEnd::Failed(e.to_string());
            },
        }
    };

    (end, reader)
}

/// Read console lines and forward them until shutdown or the user leaves.
async fn send_loop<T, P, S>(
    writer: &mut WriteHalf<T>,
    prompt: &mut P,
    screen: &S,
    shutdown: &Shutdown,
) -> OutboundEnd
where
    T: AsyncWrite,
    P: Prompt,
    S: Screen + ?Sized,
{
    loop {
        if shutdown.is_triggered() {
            return OutboundEnd::Stopped;
        }

        screen.print("> ");
        let read = tokio::select! {
            biased;
            () = shutdown.triggered() => None,
            line = prompt.read_line() => Some(line),
        };

        let line = match read {
            None => return OutboundEnd::Stopped,
            Some(Ok(Some(line))) => line,
            Some(Ok(None)) => {
                tracing::info!("Console input closed");
                shutdown.trigger();
                return OutboundEnd::InputClosed;
            },
            Some(Err(e)) => {
                tracing::warn!("Console input failed: {}", e);
                shutdown.trigger();
                return OutboundEnd::InputFailed(e.to_string());
            },
        };

        match commands::classify(&line) {
            Input::Empty => {},
            Input::Clear => screen.clear(),
            Input::LocalHelp => screen.println(LOCAL_HELP),
            Input::Leave(text) => {
                if let Err(e) = send(writer, text).await {
                    screen.println(&format!("Error sending message: {e}"));
                    shutdown.trigger();
                    return OutboundEnd::WriteFailed(e.to_string());
                }
                shutdown.trigger();
                return OutboundEnd::Quit;
            },
            Input::Message(text) => {
                if let Err(e) = send(writer, text).await {
                    tracing::warn!("Send failed: {}", e);
                    screen.println(&format!("Error sending message: {e}"));
                    shutdown.trigger();
                    return OutboundEnd::WriteFailed(e.to_string());
                }
            },
        }
    }
}

async fn send<T: AsyncWrite>(writer: &mut WriteHalf<T>, text: &str) -> std::io::Result<()> {
    writer.write_all(text.as_bytes()).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forced_termination_markers() {
        assert!(is_forced_termination("You have been kicked from the server"));
        assert!(is_forced_termination("Your account is banned."));
        assert!(!is_forced_termination("Kicked"));
        assert!(!is_forced_termination("Account is banned"));
        assert!(!is_forced_termination("alice: hello"));
    }
}
