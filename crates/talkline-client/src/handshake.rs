//! Login/register handshake.
//!
//! A two-state machine: `Unauthenticated` until a server response contains
//! [`SUCCESS_MARKER`], then `Authenticated` (terminal). The exchange is plain
//! text with no framing: one write per request, one read per response.
//!
//! Success detection is a case-sensitive substring match on free text, so a
//! response such as "unsuccessful" also authenticates.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use zeroize::Zeroizing;

use crate::{Prompt, SavedList, Screen, SessionError, Shutdown, confirm, menu};

/// Substring of a server response that signals a successful login/register.
pub const SUCCESS_MARKER: &str = "successful";

/// Whether `response` signals a successful handshake.
pub fn is_success(response: &str) -> bool {
    response.contains(SUCCESS_MARKER)
}

/// Which request to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Log in to an existing account.
    Login,
    /// Create a new account.
    Register,
}

impl AuthMode {
    /// Server command prefix, including the trailing space.
    pub fn command(self) -> &'static str {
        match self {
            Self::Login => "/login ",
            Self::Register => "/register ",
        }
    }

    /// Parse the menu choice: `1` is login, `2` is register.
    pub fn from_choice(choice: &str) -> Option<Self> {
        match choice.trim() {
            "1" => Some(Self::Login),
            "2" => Some(Self::Register),
            _ => None,
        }
    }
}

/// One login/register attempt.
///
/// Never persisted. The password is zeroized when the value is dropped.
pub struct Credentials {
    mode: AuthMode,
    username: String,
    password: Zeroizing<String>,
}

impl Credentials {
    /// Bundle an attempt.
    pub fn new(mode: AuthMode, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self { mode, username: username.into(), password: Zeroizing::new(password.into()) }
    }

    /// Request mode.
    pub fn mode(&self) -> AuthMode {
        self.mode
    }

    /// Username for the attempt.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Serialize to the wire message, consuming the credentials.
    ///
    /// `"/login user:pass"` or `"/register user:pass"` as UTF-8.
    pub fn into_message(self) -> Zeroizing<Vec<u8>> {
        let mut message = Vec::with_capacity(
            self.mode.command().len() + self.username.len() + 1 + self.password.len(),
        );
        message.extend_from_slice(self.mode.command().as_bytes());
        message.extend_from_slice(self.username.as_bytes());
        message.push(b':');
        message.extend_from_slice(self.password.as_bytes());
        Zeroizing::new(message)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("mode", &self.mode)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// How the handshake ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeOutcome {
    /// Server accepted the credentials.
    Authenticated {
        /// Account that is now logged in.
        username: String,
    },
    /// Input ended or shutdown was triggered before authenticating.
    Abandoned,
}

/// Drives the handshake over a stream.
pub struct Handshake<'a, P, S: ?Sized> {
    prompt: &'a mut P,
    screen: &'a S,
    users: &'a mut SavedList<String>,
    shutdown: &'a Shutdown,
    buffer_size: usize,
}

impl<'a, P, S> Handshake<'a, P, S>
where
    P: Prompt,
    S: Screen + ?Sized,
{
    /// Handshake reading responses of up to `buffer_size` bytes.
    pub fn new(
        prompt: &'a mut P,
        screen: &'a S,
        users: &'a mut SavedList<String>,
        shutdown: &'a Shutdown,
        buffer_size: usize,
    ) -> Self {
        Self { prompt, screen, users, shutdown, buffer_size }
    }

    /// Read the welcome banner, then loop until authenticated or abandoned.
    ///
    /// Any read or write failure on `stream` is fatal; there is no retry.
    pub async fn run<T>(mut self, stream: &mut T) -> Result<HandshakeOutcome, SessionError>
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        let mut buf = vec![0u8; self.buffer_size];

        let banner = read_chunk(stream, &mut buf).await.map_err(|e| {
            self.screen.println(&format!("Error reading welcome message: {e}"));
            SessionError::Transport(e)
        })?;
        self.screen.println(&banner);

        while !self.shutdown.is_triggered() {
            let Some(credentials) = self.collect_credentials().await? else {
                return Ok(HandshakeOutcome::Abandoned);
            };
            let username = credentials.username().to_string();

            let response = exchange(stream, credentials, &mut buf).await.map_err(|e| {
                self.screen.println(&format!("Error during authentication: {e}"));
                SessionError::Transport(e)
            })?;
            self.screen.println(&response);

            if is_success(&response) {
                tracing::info!("Authenticated as {}", username);
                self.screen.println("Authentication successful!");
                self.offer_remember(&username).await?;
                return Ok(HandshakeOutcome::Authenticated { username });
            }
            tracing::debug!("Handshake response did not signal success");
        }

        Ok(HandshakeOutcome::Abandoned)
    }

    /// Ask for mode, username and password. `None` if input ended.
    async fn collect_credentials(&mut self) -> Result<Option<Credentials>, SessionError> {
        let mode = loop {
            self.screen.println("\nOptions:");
            self.screen.println("1. Login");
            self.screen.println("2. Register");
            self.screen.print("> ");

            let Some(choice) = self.prompt.read_line().await.map_err(SessionError::Input)? else {
                return Ok(None);
            };
            match AuthMode::from_choice(&choice) {
                Some(mode) => break mode,
                None => self.screen.println("Invalid option. Please choose 1 or 2."),
            }
        };

        let saved: &[String] = match mode {
            AuthMode::Login => self.users.entries(),
            AuthMode::Register => &[],
        };
        let Some(username) = menu::select_username(&mut *self.prompt, self.screen, saved)
            .await
            .map_err(SessionError::Input)?
        else {
            return Ok(None);
        };

        self.screen.print("Enter password: ");
        let Some(password) = self.prompt.read_secret().await.map_err(SessionError::Input)? else {
            return Ok(None);
        };

        Ok(Some(Credentials::new(mode, username, password)))
    }

    /// Offer to save a username that is not already saved.
    async fn offer_remember(&mut self, username: &str) -> Result<(), SessionError> {
        let username = username.to_string();
        if self.users.contains(&username) {
            return Ok(());
        }

        let question = "Remember this username for future logins? (y/n): ";
        if !confirm(&mut *self.prompt, self.screen, question).await.map_err(SessionError::Input)? {
            return Ok(());
        }

        match self.users.remember(username) {
            Ok(_) => self.screen.println("Username saved!"),
            Err(e) => {
                tracing::warn!("Failed to save username: {}", e);
                self.screen.println(&format!("Error saving users: {e}"));
            },
        }
        Ok(())
    }
}

/// Send one request and read one response chunk.
async fn exchange<T>(stream: &mut T, credentials: Credentials, buf: &mut [u8]) -> io::Result<String>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let mode = credentials.mode();
    let message = credentials.into_message();
    stream.write_all(&message).await?;
    stream.flush().await?;
    tracing::debug!("Sent {:?} request ({} bytes)", mode, message.len());

    read_chunk(stream, buf).await
}

/// Read one chunk as text. A closed stream is an error here.
async fn read_chunk<T>(stream: &mut T, buf: &mut [u8]) -> io::Result<String>
where
    T: AsyncRead + Unpin,
{
    let n = stream.read(buf).await?;
    if n == 0 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "server closed the connection"));
    }
    Ok(String::from_utf8_lossy(&buf[..n]).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_message_format() {
        let message = Credentials::new(AuthMode::Login, "alice", "s3cret").into_message();
        assert_eq!(message.as_slice(), b"/login alice:s3cret");
    }

    #[test]
    fn register_message_format() {
        let message = Credentials::new(AuthMode::Register, "bob", "pw:with:colons").into_message();
        assert_eq!(message.as_slice(), b"/register bob:pw:with:colons");
    }

    #[test]
    fn success_is_case_sensitive_substring() {
        assert!(is_success("Login successful. Welcome!"));
        assert!(is_success("Registration successful"));
        assert!(is_success("unsuccessful attempt"));
        assert!(!is_success("Login Successful"));
        assert!(!is_success("Invalid username or password"));
    }

    #[test]
    fn menu_choice_parsing() {
        assert_eq!(AuthMode::from_choice("1"), Some(AuthMode::Login));
        assert_eq!(AuthMode::from_choice("2\n"), Some(AuthMode::Register));
        assert_eq!(AuthMode::from_choice("3"), None);
        assert_eq!(AuthMode::from_choice("login"), None);
    }

    #[test]
    fn debug_redacts_password() {
        let credentials = Credentials::new(AuthMode::Login, "alice", "hunter2");
        let debug = format!("{credentials:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("alice"));
    }
}
