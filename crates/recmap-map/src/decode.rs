//! Pre-transform decode chain.
//!
//! A column's `decode` steps run in order over the raw bytes of the cell.
//! `base64` is handled here; `word_doc` needs a [`DocumentDecoder`] supplied
//! by the caller, since extracting text from legacy documents is format
//! specific.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use recmap_model::{Decoding, Value};

use crate::error::{MapError, Result};

/// Boxed error returned by document decoders.
pub type DecoderError = Box<dyn std::error::Error + Send + Sync>;

/// Converts an embedded document into plain text.
pub trait DocumentDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> std::result::Result<String, DecoderError>;
}

impl<F> DocumentDecoder for F
where
    F: Fn(&[u8]) -> std::result::Result<String, DecoderError> + Send + Sync,
{
    fn decode(&self, bytes: &[u8]) -> std::result::Result<String, DecoderError> {
        self(bytes)
    }
}

impl fmt::Debug for dyn DocumentDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DocumentDecoder")
    }
}

/// Runs the decode chain over one raw value.
///
/// Null and blank values are passed through untouched.
pub(crate) fn decode_value(
    value: Value,
    steps: &[Decoding],
    decoder: Option<&dyn DocumentDecoder>,
    column: &str,
) -> Result<Value> {
    if steps.is_empty() || value.is_blank() {
        return Ok(value);
    }
    let mut bytes = value.to_raw_string().into_bytes();
    for step in steps {
        bytes = match step {
            Decoding::Base64 => {
                let compact: Vec<u8> = bytes
                    .into_iter()
                    .filter(|byte| !byte.is_ascii_whitespace())
                    .collect();
                STANDARD.decode(compact).map_err(|err| MapError::Decode {
                    column: column.to_string(),
                    reason: err.to_string(),
                })?
            }
            Decoding::WordDoc => {
                let decoder = decoder.ok_or_else(|| MapError::Decode {
                    column: column.to_string(),
                    reason: "no document decoder installed".to_string(),
                })?;
                decoder
                    .decode(&bytes)
                    .map_err(|err| MapError::Decode {
                        column: column.to_string(),
                        reason: err.to_string(),
                    })?
                    .into_bytes()
            }
        };
    }
    Ok(Value::Text(String::from_utf8_lossy(&bytes).into_owned()))
}
