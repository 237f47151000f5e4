//! Numbered selection menus for saved servers and usernames.

use std::{fmt::Display, io};

use crate::{Endpoint, Prompt, Screen, ask, confirm};

/// Host used when manual entry leaves the field blank.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Port used when manual entry leaves the field blank or unparsable.
pub const DEFAULT_PORT: u16 = 12345;

/// Result of a numbered menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    /// Index into the listed entries.
    Saved(usize),
    /// The trailing "new entry" option, or an invalid answer.
    New,
}

/// Interpret a menu answer for `count` saved entries plus one "new" option.
///
/// Invalid or out-of-range answers fall through to [`MenuChoice::New`].
pub fn parse_choice(answer: &str, count: usize) -> MenuChoice {
    match answer.trim().parse::<usize>() {
        Ok(n) if (1..=count).contains(&n) => MenuChoice::Saved(n - 1),
        _ => MenuChoice::New,
    }
}

/// List `entries` under `title`, add `new_label` as the last option, and
/// read the answer. `None` if input ended.
pub async fn choose<P, S, T>(
    prompt: &mut P,
    screen: &S,
    title: &str,
    entries: &[T],
    new_label: &str,
) -> io::Result<Option<MenuChoice>>
where
    P: Prompt,
    S: Screen + ?Sized,
    T: Display,
{
    screen.println(title);
    for (i, entry) in entries.iter().enumerate() {
        screen.println(&format!("{}. {entry}", i + 1));
    }
    screen.println(&format!("{}. {new_label}", entries.len() + 1));

    let answer = ask(prompt, screen, "\nSelect an option: ").await?;
    Ok(answer.map(|answer| parse_choice(&answer, entries.len())))
}

/// Pick a saved endpoint or enter a new one. `None` if input ended.
pub async fn select_endpoint<P, S>(
    prompt: &mut P,
    screen: &S,
    saved: &[Endpoint],
) -> io::Result<Option<Endpoint>>
where
    P: Prompt,
    S: Screen + ?Sized,
{
    if !saved.is_empty() {
        match choose(prompt, screen, "Saved servers:", saved, "Connect to a new server").await? {
            Some(MenuChoice::Saved(index)) => return Ok(saved.get(index).cloned()),
            Some(MenuChoice::New) => {},
            None => return Ok(None),
        }
    }

    prompt_endpoint(prompt, screen).await
}

/// Ask for host, port and security. Blank answers take the defaults.
pub async fn prompt_endpoint<P, S>(prompt: &mut P, screen: &S) -> io::Result<Option<Endpoint>>
where
    P: Prompt,
    S: Screen + ?Sized,
{
    let question = format!("Enter server IP address (press Enter for default {DEFAULT_HOST}):\n");
    let Some(host) = ask(prompt, screen, &question).await? else {
        return Ok(None);
    };
    let host = match host.trim() {
        "" => DEFAULT_HOST.to_string(),
        host => host.to_string(),
    };

    let question = format!("Enter server port (press Enter for default {DEFAULT_PORT}):\n");
    let Some(port) = ask(prompt, screen, &question).await? else {
        return Ok(None);
    };
    let port = port.trim().parse().unwrap_or(DEFAULT_PORT);

    let secure = confirm(prompt, screen, "Use secure connection (SSL/TLS)? (y/n):\n").await?;

    Ok(Some(Endpoint::new(host, port, secure)))
}

/// Pick a saved username or type a new one. `None` if input ended.
///
/// With no saved usernames this goes straight to free entry.
pub async fn select_username<P, S>(
    prompt: &mut P,
    screen: &S,
    saved: &[String],
) -> io::Result<Option<String>>
where
    P: Prompt,
    S: Screen + ?Sized,
{
    if !saved.is_empty() {
        match choose(prompt, screen, "\nSaved users:", saved, "Use a new username").await? {
            Some(MenuChoice::Saved(index)) => return Ok(saved.get(index).cloned()),
            Some(MenuChoice::New) => {},
            None => return Ok(None),
        }
    }

    ask(prompt, screen, "Enter username: ").await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_choices_select_saved_entries() {
        assert_eq!(parse_choice("1", 3), MenuChoice::Saved(0));
        assert_eq!(parse_choice(" 3 ", 3), MenuChoice::Saved(2));
    }

    #[test]
    fn new_option_and_garbage_fall_through() {
        assert_eq!(parse_choice("4", 3), MenuChoice::New);
        assert_eq!(parse_choice("0", 3), MenuChoice::New);
        assert_eq!(parse_choice("99", 3), MenuChoice::New);
        assert_eq!(parse_choice("abc", 3), MenuChoice::New);
        assert_eq!(parse_choice("", 0), MenuChoice::New);
    }
}
