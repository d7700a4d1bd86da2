//! Identity checks applied before a name is sent to the server.

const MAX_NAME_BYTES: usize = 16;

/// A user name is 1 to 16 bytes of printable, non-space characters.
pub fn validate_user_name(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_NAME_BYTES {
        return false;
    }
    name.chars()
        .all(|c| !c.is_whitespace() && !c.is_control() && !is_format_char(c))
}

// Unicode general category Cf, the invisible formatting characters that can
// be used to spoof names (bidi overrides, zero-width joiners, ...).
fn is_format_char(c: char) -> bool {
    matches!(
        c,
        '\u{00AD}'
            | '\u{0600}'..='\u{0605}'
            | '\u{061C}'
            | '\u{06DD}'
            | '\u{070F}'
            | '\u{180E}'
            | '\u{200B}'..='\u{200F}'
            | '\u{202A}'..='\u{202E}'
            | '\u{2060}'..='\u{2064}'
            | '\u{2066}'..='\u{206F}'
            | '\u{FEFF}'
            | '\u{FFF9}'..='\u{FFFB}'
            | '\u{E0001}'
            | '\u{E0020}'..='\u{E007F}'
    )
}
