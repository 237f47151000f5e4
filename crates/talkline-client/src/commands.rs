//! Classification of chat input lines.
//!
//! Local commands are matched case-insensitively against the whole line and
//! never reach the server. Everything else is forwarded verbatim.

/// Reference text for the local command set, followed by the server commands
/// most servers understand.
pub const LOCAL_HELP: &str = "\n=== Client Commands ===
/help - Show server commands
/localhelp - Show client commands
/clear - Clear console
/quit or /logout - Disconnect from server

=== Server Commands ===
Use /help to see server commands
/create-room [name] - Create a new room
/join-room [name] - Join an existing room
/list-rooms - List all available rooms
/dm [username] [message] - Send private message
/users - List users in your room";

/// Printed once when the chat phase begins.
pub const CHAT_READY: &str = "\nYou can now chat. Type '/help' for available commands.";

/// What the outbound loop should do with one line of input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input<'a> {
    /// Nothing typed. Ignored.
    Empty,
    /// `/clear`: clear the console locally.
    Clear,
    /// `/localhelp`: reprint [`LOCAL_HELP`] locally.
    LocalHelp,
    /// `/quit` or `/logout`: forward, then end the session.
    Leave(&'a str),
    /// Anything else: forward verbatim.
    Message(&'a str),
}

/// Classify one input line.
pub fn classify(line: &str) -> Input<'_> {
    if line.is_empty() {
        Input::Empty
    } else if line.eq_ignore_ascii_case("/clear") {
        Input::Clear
    } else if line.eq_ignore_ascii_case("/localhelp") {
        Input::LocalHelp
    } else if line.eq_ignore_ascii_case("/quit") || line.eq_ignore_ascii_case("/logout") {
        Input::Leave(line)
    } else {
        Input::Message(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_commands_ignore_case() {
        assert_eq!(classify("/clear"), Input::Clear);
        assert_eq!(classify("/CLEAR"), Input::Clear);
        assert_eq!(classify("/LocalHelp"), Input::LocalHelp);
    }

    #[test]
    fn leave_commands_keep_original_text() {
        assert_eq!(classify("/QUIT"), Input::Leave("/QUIT"));
        assert_eq!(classify("/logout"), Input::Leave("/logout"));
    }

    #[test]
    fn partial_matches_are_messages() {
        assert_eq!(classify("/clear all"), Input::Message("/clear all"));
        assert_eq!(classify(" /quit"), Input::Message(" /quit"));
        assert_eq!(classify("/help"), Input::Message("/help"));
        assert_eq!(classify("/dm bob hi"), Input::Message("/dm bob hi"));
    }

    #[test]
    fn only_the_empty_line_is_empty() {
        assert_eq!(classify(""), Input::Empty);
        assert_eq!(classify(" "), Input::Message(" "));
    }
}
