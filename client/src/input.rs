//! Local input handling for the terminal client.

pub const HELP_TEXT: &str = "Local commands:
  /quit /exit   Leave the chat
  /help         Show this help message
Anything else is sent to the server as typed.";

/// What to do with one line typed by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Send the line to the server
    Send(String),
    Quit,
    Help,
}

/// Interprets a typed line. Blank lines produce nothing.
pub fn parse_input(line: &str) -> Option<Input> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    match trimmed {
        "/quit" | "/exit" => Some(Input::Quit),
        "/help" => Some(Input::Help),
        _ => Some(Input::Send(line.trim_end_matches(['\r', '\n']).to_string())),
    }
}

/// The bytes put on the wire for a chat line.
pub fn encode_line(text: &str) -> Vec<u8> {
    let mut data = Vec::with_capacity(text.len() + 1);
    data.extend_from_slice(text.as_bytes());
    data.push(b'\n');
    data
}
