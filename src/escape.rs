use thiserror::Error;

/// Problems with a backslash escaped string.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EscapeError {
    /// A backslash was followed by a character with no meaning.
    #[error("Invalid escape `\\{escape}` in `{text}`")]
    Unknown {
        /// The character following the backslash.
        escape: char,

        /// The string it was found in.
        text: String,
    },

    /// The string ended right after a backslash.
    #[error("Unterminated escape at the end of `{text}`")]
    Trailing {
        /// The string it was found in.
        text: String,
    },
}

/// Expand backslash escapes in `text` into the raw bytes to put on the wire.
///
/// The recognized escapes are `\\`, `\a`, `\b`, `\f`, `\t`, `\r`, `\n`, `\v` and `\0`.
/// Anything else after a backslash is an error.
///
/// At most `max_len - 1` bytes are produced; one slot of the destination is reserved
/// for a terminator. Expansion stops silently once that bound is reached.
pub fn expand(text: &str, max_len: usize) -> Result<Vec<u8>, EscapeError> {
    let limit = max_len.saturating_sub(1);
    let mut out = Vec::with_capacity(text.len().min(limit));
    let mut bytes = text.bytes();

    while out.len() < limit {
        let Some(byte) = bytes.next() else {
            break;
        };

        if byte != b'\\' {
            out.push(byte);
            continue;
        }

        let expanded = match bytes.next() {
            Some(b'\\') => b'\\',
            Some(b'a') => 0x07,
            Some(b'b') => 0x08,
            Some(b'f') => 0x0c,
            Some(b't') => b'\t',
            Some(b'r') => b'\r',
            Some(b'n') => b'\n',
            Some(b'v') => 0x0b,
            Some(b'0') => 0x00,
            Some(_) => {
                // Report the whole (possibly multi-byte) character.
                let position = text.len() - bytes.len() - 1;
                let escape = text[position..].chars().next().unwrap_or('?');

                return Err(EscapeError::Unknown {
                    escape,
                    text: text.into(),
                });
            }
            None => return Err(EscapeError::Trailing { text: text.into() }),
        };

        out.push(expanded);
    }

    Ok(out)
}
