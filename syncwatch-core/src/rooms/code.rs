use std::fmt::{self, Display};

use rand::{thread_rng, Rng};
use thiserror::Error;

/// Every character a room code may contain. Visually ambiguous glyphs
/// (0/O, 1/I) are excluded.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// The fixed length of a room code.
pub const CODE_LENGTH: usize = 6;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoomCodeError {
    #[error("room codes are {CODE_LENGTH} characters, got {0}")]
    WrongLength(usize),
    #[error("'{0}' is not a valid room code character")]
    InvalidCharacter(char),
}

/// A six character identifier for a room, unique within the store.
/// Always stored uppercase, making lookups case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomCode(String);

impl RoomCode {
    /// Generates a new code by uniform random selection per character.
    pub fn generate() -> Self {
        let mut rng = thread_rng();

        let code = (0..CODE_LENGTH)
            .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
            .collect();

        Self(code)
    }

    /// Parses user input, normalizing to uppercase.
    pub fn parse(input: &str) -> Result<Self, RoomCodeError> {
        let normalized = input.trim().to_uppercase();
        let length = normalized.chars().count();

        if length != CODE_LENGTH {
            return Err(RoomCodeError::WrongLength(length));
        }

        if let Some(invalid) = normalized
            .chars()
            .find(|c| !c.is_ascii() || !CODE_ALPHABET.contains(&(*c as u8)))
        {
            return Err(RoomCodeError::InvalidCharacter(invalid));
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
