//! Record codecs for the line-oriented worker protocol.
//!
//! A codec turns an input record into exactly one line of text for the
//! worker, and one line of worker output back into an output record.
//! Either direction may answer `None` to mean "produce nothing for this
//! record", which is distinct from an error.

mod adapters;
mod json;

pub use adapters::{CodecExt, Filtered, FnCodec, LineCodec};
pub use json::JsonCodec;

use crate::errors::CodecError;

/// Converts records to and from single lines of text.
pub trait Codec: Send + Sync {
    /// Record type accepted by the stage.
    type Input: Send;
    /// Record type emitted by the stage.
    type Output: Send;

    /// Encodes a record into one line, without the trailing separator.
    ///
    /// Returns `Ok(None)` to skip the record without contacting the worker.
    fn encode(&self, input: &Self::Input) -> Result<Option<String>, CodecError>;

    /// Decodes one worker line, already stripped of its line separator.
    ///
    /// Returns `Ok(None)` when the worker intentionally produced nothing.
    fn decode(&self, line: &str) -> Result<Option<Self::Output>, CodecError>;
}

/// Rejects encoded records that would break line framing.
pub(crate) fn ensure_single_line(line: &str) -> Result<(), CodecError> {
    if line.contains(['\n', '\r']) {
        return Err(CodecError::MultiLine);
    }
    Ok(())
}
