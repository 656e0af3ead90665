use rand::Rng;
use thiserror::Error;

/// Characters used for generated event codes
pub const EVENT_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Length of generated event codes
pub const GENERATED_CODE_LEN: usize = 6;

/// Longest code accepted from an owner
pub const MAX_CODE_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidEventCode {
    #[error("event code is empty")]
    Empty,

    #[error("event code is longer than {max} characters")]
    TooLong { max: usize },

    #[error("event code contains invalid character {0:?}")]
    InvalidCharacter(char),
}

/// Generate a short public event code, e.g. `K7Q2ZD`
pub fn generate_event_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..GENERATED_CODE_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..EVENT_CODE_ALPHABET.len());
            EVENT_CODE_ALPHABET[idx] as char
        })
        .collect()
}

/// Validate an owner-supplied event code.
///
/// Codes appear in URLs and object keys, so only ASCII letters, digits,
/// `-` and `_` are accepted.
pub fn validate_event_code(code: &str) -> Result<(), InvalidEventCode> {
    if code.is_empty() {
        return Err(InvalidEventCode::Empty);
    }
    if code.len() > MAX_CODE_LEN {
        return Err(InvalidEventCode::TooLong { max: MAX_CODE_LEN });
    }
    if let Some(bad) = code
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
    {
        return Err(InvalidEventCode::InvalidCharacter(bad));
    }
    Ok(())
}
