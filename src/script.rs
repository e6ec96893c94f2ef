use crate::escape::{self, EscapeError};

/// Bound used when expanding each initialization string.
pub const INIT_BUFFER_LEN: usize = 1024;

/// The commands sent to a device after it has been (re)configured, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitScript(Vec<Vec<u8>>);

impl InitScript {
    /// Expand each of the given texts.
    /// Fails on the first text with a malformed escape.
    pub fn from_texts<S: AsRef<str>>(texts: &[S]) -> Result<Self, EscapeError> {
        texts
            .iter()
            .map(|text| escape::expand(text.as_ref(), INIT_BUFFER_LEN))
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    /// The command at `index`, if the script is that long.
    pub fn get(&self, index: usize) -> Option<&[u8]> {
        self.0.get(index).map(Vec::as_slice)
    }

    /// How many commands there are.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if there is nothing to send.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Vec<u8>>> for InitScript {
    fn from(commands: Vec<Vec<u8>>) -> Self {
        Self(commands)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn expands_in_order() {
        let script = InitScript::from_texts(&[r"ATZ\r\n", r"ATS82=76\r\n"]).unwrap();

        assert_eq!(script.len(), 2);
        assert_eq!(script.get(0), Some(&b"ATZ\r\n"[..]));
        assert_eq!(script.get(1), Some(&b"ATS82=76\r\n"[..]));
        assert_eq!(script.get(2), None);
    }

    #[test]
    fn one_bad_text_spoils_the_script() {
        let err = InitScript::from_texts(&["ATZ", r"AT\x"]).unwrap_err();

        assert!(matches!(err, EscapeError::Unknown { escape: 'x', .. }));
    }

    #[test]
    fn long_text_is_bounded() {
        let text = "A".repeat(INIT_BUFFER_LEN * 2);
        let script = InitScript::from_texts(&[text]).unwrap();

        assert_eq!(script.get(0).unwrap().len(), INIT_BUFFER_LEN - 1);
    }
}
