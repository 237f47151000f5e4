//! One client run from endpoint selection to exit.

use std::path::Path;

use crate::{
    ClientConfig, Connector, Endpoint, Handshake, HandshakeOutcome, ListEntry, Prompt, SavedList,
    Screen, Session, SessionError, SessionReport, Shutdown, TrustPolicy,
    commands::{CHAT_READY, LOCAL_HELP},
    confirm, menu,
};

/// How a run ended without a pre-session error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunReport {
    /// Input ended before a session started.
    Abandoned,
    /// A chat session ran to completion.
    Finished {
        /// Account the session was authenticated as.
        username: String,
        /// How each half of the session ended.
        session: SessionReport,
    },
}

/// Drives the whole client lifecycle over caller-supplied console
/// capabilities.
///
/// `Connecting -> Handshaking -> Chatting -> Closed`, with any pre-session
/// failure jumping straight to `Closed`.
pub struct Runtime<P, S> {
    config: ClientConfig,
    prompt: P,
    screen: S,
    trust: TrustPolicy,
    endpoint: Option<Endpoint>,
}

impl<P, S> Runtime<P, S>
where
    P: Prompt,
    S: Screen + Clone + 'static,
{
    /// Create a runtime that asks the user which server to connect to.
    pub fn new(config: ClientConfig, prompt: P, screen: S, trust: TrustPolicy) -> Self {
        Self { config, prompt, screen, trust, endpoint: None }
    }

    /// Skip the server menu and connect to `endpoint`.
    pub fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    /// Run until the session ends or setup fails, then wait for the final
    /// acknowledgement.
    ///
    /// Errors are printed before they are returned.
    pub async fn run(mut self) -> Result<RunReport, SessionError> {
        let result = self.connect_and_chat().await;

        if let Err(e) = &result {
            tracing::error!("Run failed: {}", e);
            self.screen.println(&format!("Error: {e}"));
            if let Some(hint) = e.hint() {
                self.screen.println(hint);
            }
        }

        self.screen.println("\nDisconnected from server.");
        self.screen.print("Press Enter to exit...");
        if let Err(e) = self.prompt.read_line().await {
            tracing::debug!("Final acknowledgement failed: {}", e);
        }

        result
    }

    async fn connect_and_chat(&mut self) -> Result<RunReport, SessionError> {
        let mut servers: SavedList<Endpoint> =
            load_or_empty(&self.config.servers_file, "servers", &self.screen);
        let mut users: SavedList<String> =
            load_or_empty(&self.config.users_file, "users", &self.screen);

        let endpoint = match self.endpoint.take() {
            Some(endpoint) => endpoint,
            None => {
                let chosen =
                    menu::select_endpoint(&mut self.prompt, &self.screen, servers.entries())
                        .await
                        .map_err(SessionError::Input)?;
                match chosen {
                    Some(endpoint) => endpoint,
                    None => return Ok(RunReport::Abandoned),
                }
            },
        };

        let security = if endpoint.secure { "Secure" } else { "Non-secure" };
        self.screen.println(&format!("Connecting to {} ({security})...", endpoint.address()));

        let connector = Connector::new(&self.config, self.trust.clone())?;
        let mut transport = connector.connect(&endpoint, &self.screen).await?;

        self.offer_remember_server(&mut servers, endpoint).await?;

        let shutdown = Shutdown::new();
        let outcome = Handshake::new(
            &mut self.prompt,
            &self.screen,
            &mut users,
            &shutdown,
            self.config.read_buffer_size,
        )
        .run(&mut transport)
        .await?;

        let HandshakeOutcome::Authenticated { username } = outcome else {
            tracing::info!("Handshake abandoned");
            return Ok(RunReport::Abandoned);
        };

        self.screen.println(LOCAL_HELP);
        self.screen.println(CHAT_READY);

        let session = Session::new(transport, shutdown, &self.config);
        let session = session.run(&mut self.prompt, &self.screen).await;

        Ok(RunReport::Finished { username, session })
    }

    async fn offer_remember_server(
        &mut self,
        servers: &mut SavedList<Endpoint>,
        endpoint: Endpoint,
    ) -> Result<(), SessionError> {
        if servers.contains(&endpoint) {
            return Ok(());
        }

        let question = "Remember this server for future connections? (y/n): ";
        if !confirm(&mut self.prompt, &self.screen, question).await.map_err(SessionError::Input)? {
            return Ok(());
        }

        match servers.remember(endpoint) {
            Ok(_) => self.screen.println("Server saved!"),
            Err(e) => {
                tracing::warn!("Failed to save server: {}", e);
                self.screen.println(&format!("Error saving servers: {e}"));
            },
        }
        Ok(())
    }
}

/// Load a saved list, falling back to an empty one on error.
fn load_or_empty<T, S>(path: &Path, what: &str, screen: &S) -> SavedList<T>
where
    T: ListEntry,
    S: Screen + ?Sized,
{
    SavedList::load(path).unwrap_or_else(|e| {
        tracing::warn!("Failed to load saved {}: {}", what, e);
        screen.println(&format!("Error loading saved {what}: {e}"));
        SavedList::empty(path)
    })
}
