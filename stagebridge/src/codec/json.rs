//! JSON-per-line codec.

use super::Codec;
use crate::errors::CodecError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::marker::PhantomData;

/// Encodes inputs as compact JSON and decodes worker lines as JSON.
///
/// An empty line or a literal `null` from the worker means "nothing to
/// emit"; any other line that fails to parse is a decoding error.
pub struct JsonCodec<IN, OUT> {
    _marker: PhantomData<fn(IN) -> OUT>,
}

impl<IN, OUT> JsonCodec<IN, OUT> {
    /// Creates a new JSON codec.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<IN, OUT> Default for JsonCodec<IN, OUT> {
    fn default() -> Self {
        Self::new()
    }
}

impl<IN, OUT> Clone for JsonCodec<IN, OUT> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<IN, OUT> fmt::Debug for JsonCodec<IN, OUT> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonCodec")
            .field("input", &std::any::type_name::<IN>())
            .field("output", &std::any::type_name::<OUT>())
            .finish()
    }
}

impl<IN, OUT> Codec for JsonCodec<IN, OUT>
where
    IN: Serialize + Send,
    OUT: DeserializeOwned + Send,
{
    type Input = IN;
    type Output = OUT;

    fn encode(&self, input: &IN) -> Result<Option<String>, CodecError> {
        Ok(Some(serde_json::to_string(input)?))
    }

    fn decode(&self, line: &str) -> Result<Option<OUT>, CodecError> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed == "null" {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(trimmed)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Tweet {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sentiment: Option<String>,
    }

    #[test]
    fn test_encode_is_single_line() {
        let codec = JsonCodec::<Tweet, Tweet>::new();
        let tweet = Tweet {
            text: "multi\nline".to_string(),
            sentiment: None,
        };

        let line = codec.encode(&tweet).unwrap().unwrap();
        assert_eq!(line, r#"{"text":"multi\nline"}"#);
        assert!(!line.contains('\n'));
    }

    #[test]
    fn test_decode_record() {
        let codec = JsonCodec::<Tweet, Tweet>::new();
        let decoded = codec
            .decode(r#"{"text":"great day","sentiment":"positive"}"#)
            .unwrap();

        assert_eq!(
            decoded,
            Some(Tweet {
                text: "great day".to_string(),
                sentiment: Some("positive".to_string()),
            })
        );
    }

    #[test]
    fn test_decode_empty_and_null_are_no_output() {
        let codec = JsonCodec::<Tweet, Tweet>::new();
        assert_eq!(codec.decode("").unwrap(), None);
        assert_eq!(codec.decode("   ").unwrap(), None);
        assert_eq!(codec.decode("null").unwrap(), None);
    }

    #[test]
    fn test_decode_garbage_is_error() {
        let codec = JsonCodec::<Tweet, Tweet>::new();
        assert!(matches!(codec.decode("{not json"), Err(CodecError::Json(_))));
        assert!(codec.decode(r#"{"sentiment":"x"}"#).is_err());
    }
}
