use crate::error::Result;
use shortify_core::Codec;
use typed_builder::TypedBuilder;

/// Tunables for a [`ShortenerEngine`](crate::ShortenerEngine).
#[derive(Debug, Clone, Default, PartialEq, Eq, TypedBuilder)]
pub struct EngineSettings {
    /// Codes shorter than this are left-padded with `'0'`. At most 11.
    #[builder(default)]
    pub min_code_length: usize,
}

impl EngineSettings {
    /// Builds the codec these settings describe.
    pub fn codec(&self) -> Result<Codec> {
        Ok(Codec::with_min_length(self.min_code_length)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EngineError;

    #[test]
    fn default_codec_does_not_pad() {
        let codec = EngineSettings::default().codec().unwrap();
        assert_eq!(codec.encode(2301).as_str(), "b7");
    }

    #[test]
    fn min_length_pads_codes() {
        let settings = EngineSettings::builder().min_code_length(6).build();
        assert_eq!(settings.codec().unwrap().encode(2301).as_str(), "0000b7");
    }

    #[test]
    fn oversized_min_length_is_rejected() {
        let settings = EngineSettings::builder().min_code_length(12).build();
        assert!(matches!(
            settings.codec(),
            Err(EngineError::InvalidCodeFormat(_))
        ));
    }
}
