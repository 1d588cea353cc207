//! Seat order of the players in a game, owned outside the sync core.

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    players: Vec<String>,
}

impl Roster {
    pub fn new<I, S>(players: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            players: players.into_iter().map(Into::into).collect(),
        }
    }

    pub fn name_at(&self, position: u8) -> Option<&str> {
        self.players.get(position as usize).map(String::as_str)
    }

    pub fn position_of(&self, player: &str) -> Option<u8> {
        self.players
            .iter()
            .position(|name| name == player)
            .and_then(|idx| u8::try_from(idx).ok())
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}
