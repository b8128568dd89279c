use crate::codec::Codec;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt::Display;

/// A short code identifying a [`ShortLink`](crate::ShortLink).
///
/// Codes are produced by a [`Codec`] from a sequence value and are immutable
/// once assigned.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShortCode(SmolStr);

impl ShortCode {
    /// Parses `code`, accepting it only if `codec` can decode it.
    ///
    /// Returns the code together with the sequence value it encodes.
    pub fn parse(code: &str, codec: &Codec) -> Result<(Self, u64)> {
        let sequence = codec.decode(code)?;
        Ok((Self(SmolStr::new(code)), sequence))
    }

    /// Creates a `ShortCode` without validation.
    ///
    /// Use this only for codes produced by trusted internal sources
    /// (the codec itself, or rows read back from the mapping store).
    pub fn new_unchecked(code: impl AsRef<str>) -> Self {
        Self(SmolStr::new(code))
    }

    /// Generates the full shortened URL based on the provided base URL.
    pub fn to_url(&self, base_url: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self)
    }

    /// Returns the short code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ShortCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ShortCode").field(&self.0).finish()
    }
}

impl Display for ShortCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ShortCode {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    #[test]
    fn parse_returns_sequence_value() {
        let (code, sequence) = ShortCode::parse("b7", &Codec::new()).unwrap();
        assert_eq!(code.as_str(), "b7");
        assert_eq!(sequence, 2301);
    }

    #[test]
    fn parse_rejects_malformed_code() {
        let err = ShortCode::parse("no/pe", &Codec::new()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidCodeFormat(_)));
    }

    #[test]
    fn display_matches_as_str() {
        let code = Codec::new().encode(14_773_059);
        assert_eq!(code.to_string(), "zz99");
        assert_eq!(code.as_str(), "zz99");
    }

    #[test]
    fn to_url_joins_base() {
        let code = ShortCode::new_unchecked("b7");
        assert_eq!(code.to_url("https://sho.rt"), "https://sho.rt/b7");
        assert_eq!(code.to_url("https://sho.rt/"), "https://sho.rt/b7");
    }

    #[test]
    fn serializes_as_plain_string() {
        let code = ShortCode::new_unchecked("b7");
        assert_eq!(serde_json::to_string(&code).unwrap(), "\"b7\"");
        let back: ShortCode = serde_json::from_str("\"b7\"").unwrap();
        assert_eq!(back, code);
    }
}
