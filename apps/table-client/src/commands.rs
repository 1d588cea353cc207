//! Line commands read from stdin.

use game_sync::{GameAction, Suit};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Act(GameAction),
    Status,
    Reconnect,
    Quit,
}

pub const USAGE: &str = "commands: play <card> | trump <suit> | pass | status | reconnect | quit";

pub fn parse(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Err(USAGE.to_string());
    };
    let arg = words.next();

    let command = match (verb.to_ascii_lowercase().as_str(), arg) {
        ("play", Some(card)) => Command::Act(GameAction::PlayCard {
            card: card.to_ascii_uppercase(),
        }),
        ("trump", Some(suit)) => Command::Act(GameAction::DeclareTrump {
            suit: suit.parse::<Suit>()?,
        }),
        ("pass", None) => Command::Act(GameAction::PassBid),
        ("status", None) => Command::Status,
        ("reconnect", None) => Command::Reconnect,
        ("quit" | "exit", None) => Command::Quit,
        _ => return Err(USAGE.to_string()),
    };
    Ok(command)
}
