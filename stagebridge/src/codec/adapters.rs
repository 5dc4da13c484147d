//! Plain-text, closure-backed and filtering codecs.

use super::Codec;
use crate::errors::CodecError;
use std::fmt;
use std::marker::PhantomData;

/// Passes lines through unchanged.
///
/// An empty worker line means "nothing to emit".
#[derive(Debug, Clone, Copy, Default)]
pub struct LineCodec;

impl Codec for LineCodec {
    type Input = String;
    type Output = String;

    fn encode(&self, input: &String) -> Result<Option<String>, CodecError> {
        Ok(Some(input.clone()))
    }

    fn decode(&self, line: &str) -> Result<Option<String>, CodecError> {
        if line.is_empty() {
            return Ok(None);
        }
        Ok(Some(line.to_string()))
    }
}

/// A codec built from an encode closure and a decode closure.
pub struct FnCodec<IN, OUT, E, D> {
    encode: E,
    decode: D,
    _marker: PhantomData<fn(IN) -> OUT>,
}

impl<IN, OUT, E, D> FnCodec<IN, OUT, E, D>
where
    E: Fn(&IN) -> Result<Option<String>, CodecError> + Send + Sync,
    D: Fn(&str) -> Result<Option<OUT>, CodecError> + Send + Sync,
{
    /// Creates a codec from the two closures.
    pub fn new(encode: E, decode: D) -> Self {
        Self {
            encode,
            decode,
            _marker: PhantomData,
        }
    }
}

impl<IN, OUT, E, D> fmt::Debug for FnCodec<IN, OUT, E, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCodec").finish_non_exhaustive()
    }
}

impl<IN, OUT, E, D> Codec for FnCodec<IN, OUT, E, D>
where
    IN: Send,
    OUT: Send,
    E: Fn(&IN) -> Result<Option<String>, CodecError> + Send + Sync,
    D: Fn(&str) -> Result<Option<OUT>, CodecError> + Send + Sync,
{
    type Input = IN;
    type Output = OUT;

    fn encode(&self, input: &IN) -> Result<Option<String>, CodecError> {
        (self.encode)(input)
    }

    fn decode(&self, line: &str) -> Result<Option<OUT>, CodecError> {
        (self.decode)(line)
    }
}

/// Wraps a codec so that inputs matching a predicate are skipped before
/// they reach the worker.
pub struct Filtered<C, P> {
    inner: C,
    skip: P,
}

impl<C: fmt::Debug, P> fmt::Debug for Filtered<C, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filtered")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl<C, P> Codec for Filtered<C, P>
where
    C: Codec,
    P: Fn(&C::Input) -> bool + Send + Sync,
{
    type Input = C::Input;
    type Output = C::Output;

    fn encode(&self, input: &Self::Input) -> Result<Option<String>, CodecError> {
        if (self.skip)(input) {
            return Ok(None);
        }
        self.inner.encode(input)
    }

    fn decode(&self, line: &str) -> Result<Option<Self::Output>, CodecError> {
        self.inner.decode(line)
    }
}

/// Combinators available on every codec.
pub trait CodecExt: Codec + Sized {
    /// Skips inputs for which `predicate` returns true.
    fn skip_if<P>(self, predicate: P) -> Filtered<Self, P>
    where
        P: Fn(&Self::Input) -> bool + Send + Sync,
    {
        Filtered {
            inner: self,
            skip: predicate,
        }
    }
}

impl<C: Codec> CodecExt for C {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_codec() {
        let codec = LineCodec;
        assert_eq!(codec.encode(&"hello".to_string()).unwrap(), Some("hello".to_string()));
        assert_eq!(codec.decode("HELLO").unwrap(), Some("HELLO".to_string()));
        assert_eq!(codec.decode("").unwrap(), None);
    }

    #[test]
    fn test_fn_codec() {
        let codec = FnCodec::new(
            |n: &u32| Ok(Some(n.to_string())),
            |line: &str| {
                line.parse::<u32>()
                    .map(Some)
                    .map_err(|e| CodecError::custom(e.to_string()))
            },
        );

        assert_eq!(codec.encode(&7).unwrap(), Some("7".to_string()));
        assert_eq!(codec.decode("8").unwrap(), Some(8));
        assert!(codec.decode("eight").is_err());
    }

    #[test]
    fn test_skip_if() {
        let codec = LineCodec.skip_if(|s: &String| s.starts_with('#'));

        assert_eq!(codec.encode(&"# comment".to_string()).unwrap(), None);
        assert_eq!(codec.encode(&"data".to_string()).unwrap(), Some("data".to_string()));
        assert_eq!(codec.decode("x").unwrap(), Some("x".to_string()));
    }
}
