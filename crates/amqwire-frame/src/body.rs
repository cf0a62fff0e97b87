//! Frame body decoding.
//!
//! The parser only delimits frames. Turning the body region into a typed
//! value is delegated to a [`BodyDecoder`], which reads a prefix of the
//! region and reports how many bytes it used. Whatever it leaves behind
//! becomes the frame payload.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::DecodeError;

/// What a decoder found at the front of a body region.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedValue<B> {
    /// A value from the frame body family.
    Body(B),
    /// A well-formed value of some other kind.
    Other { kind: String },
    /// An explicit null.
    Null,
}

/// A decoded value and the number of bytes it occupied.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<B> {
    pub value: DecodedValue<B>,
    pub consumed: usize,
}

impl<B> Decoded<B> {
    /// A frame body that occupied `consumed` bytes.
    pub fn body(body: B, consumed: usize) -> Self {
        Self {
            value: DecodedValue::Body(body),
            consumed,
        }
    }
}

/// Turns the encoded bytes of a frame body into a typed value.
pub trait BodyDecoder {
    /// The frame body family this decoder produces.
    type Body;

    /// Decode one value from the front of `src`.
    ///
    /// `src` is never empty. `consumed` must not exceed `src.len()`.
    fn decode(&mut self, src: &[u8]) -> Result<Decoded<Self::Body>, DecodeError>;
}

impl<D: BodyDecoder + ?Sized> BodyDecoder for &mut D {
    type Body = D::Body;

    fn decode(&mut self, src: &[u8]) -> Result<Decoded<Self::Body>, DecodeError> {
        (**self).decode(src)
    }
}

/// Decodes frame bodies encoded as a single JSON object.
///
/// JSON objects form the frame body family and are deserialized into `B`.
/// Any other JSON kind is reported as [`DecodedValue::Other`].
pub struct JsonBodyDecoder<B = Map<String, Value>> {
    _body: PhantomData<fn() -> B>,
}

impl<B> JsonBodyDecoder<B> {
    pub fn new() -> Self {
        Self { _body: PhantomData }
    }
}

impl<B> Default for JsonBodyDecoder<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B> std::fmt::Debug for JsonBodyDecoder<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonBodyDecoder").finish()
    }
}

impl<B: DeserializeOwned> BodyDecoder for JsonBodyDecoder<B> {
    type Body = B;

    fn decode(&mut self, src: &[u8]) -> Result<Decoded<B>, DecodeError> {
        let mut values = serde_json::Deserializer::from_slice(src).into_iter::<Value>();
        let value = match values.next() {
            Some(value) => value?,
            None => return Err(DecodeError::new("frame body contains no value")),
        };
        let consumed = values.byte_offset();

        let value = match value {
            Value::Object(map) => DecodedValue::Body(serde_json::from_value(Value::Object(map))?),
            Value::Null => DecodedValue::Null,
            other => DecodedValue::Other {
                kind: json_kind(&other).to_string(),
            },
        };

        Ok(Decoded { value, consumed })
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
