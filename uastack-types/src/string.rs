// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! The OPC UA string type.
//!
//! Unlike a Rust `String`, an OPC UA string can be null, and null and empty
//! are different values on the wire (length -1 versus length 0). The type is
//! named `UAString` so it can be imported alongside `std::string::String`.

use std::{
    fmt,
    io::{Read, Write},
};

use crate::{
    encoding::{process_decode_io_result, process_encode_io_result, write_i32, EncodingResult},
    read_i32, DecodingOptions, Error, SimpleBinaryDecodable, SimpleBinaryEncodable,
};

/// Error for range operations that fall outside the value.
#[derive(Debug, thiserror::Error)]
#[error("Value out of range")]
pub struct OutOfRange;

/// A possibly-null UTF-8 string.
#[derive(Eq, PartialEq, Debug, Clone, Hash, Default)]
pub struct UAString {
    value: Option<String>,
}

impl UAString {
    /// The null string. Not the same value as `""`.
    pub fn null() -> UAString {
        UAString { value: None }
    }

    /// Whether this is the null string.
    pub fn is_null(&self) -> bool {
        self.value.is_none()
    }

    /// Whether this is null or has no characters.
    pub fn is_empty(&self) -> bool {
        self.as_ref().is_empty()
    }

    /// Byte length of the string, -1 when null.
    pub fn len(&self) -> isize {
        self.value.as_ref().map(|v| v.len() as isize).unwrap_or(-1)
    }

    /// The inner optional value.
    pub fn value(&self) -> &Option<String> {
        &self.value
    }

    /// Replace the inner value.
    pub fn set_value(&mut self, value: Option<String>) {
        self.value = value;
    }

    /// Slice out the bytes `min..=max` for index-range reads. `min` must be
    /// inside the string; `max` may run past the end and is clamped. Null
    /// strings have no addressable range.
    pub fn substring(&self, min: usize, max: usize) -> Result<UAString, OutOfRange> {
        let Some(v) = self.value.as_ref() else {
            return Err(OutOfRange);
        };
        if min >= v.len() {
            return Err(OutOfRange);
        }
        let end = max.min(v.len() - 1);
        Ok(UAString::from(&v[min..=end]))
    }
}

impl fmt::Display for UAString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(v) => f.write_str(v),
            None => f.write_str("[null]"),
        }
    }
}

impl AsRef<str> for UAString {
    fn as_ref(&self) -> &str {
        self.value.as_deref().unwrap_or("")
    }
}

impl From<&str> for UAString {
    fn from(value: &str) -> Self {
        value.to_string().into()
    }
}

impl From<&String> for UAString {
    fn from(value: &String) -> Self {
        value.clone().into()
    }
}

impl From<String> for UAString {
    fn from(value: String) -> Self {
        UAString { value: Some(value) }
    }
}

impl From<Option<String>> for UAString {
    fn from(value: Option<String>) -> Self {
        UAString { value }
    }
}

impl From<UAString> for String {
    fn from(value: UAString) -> Self {
        value.value.unwrap_or_default()
    }
}

impl PartialEq<str> for UAString {
    fn eq(&self, other: &str) -> bool {
        // Null compares unequal to everything, including ""
        self.value.as_deref() == Some(other)
    }
}

impl SimpleBinaryEncodable for UAString {
    fn byte_len(&self) -> usize {
        4 + self.value.as_ref().map(|v| v.len()).unwrap_or(0)
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        match &self.value {
            None => write_i32(stream, -1),
            Some(v) => {
                write_i32(stream, v.len() as i32)?;
                process_encode_io_result(stream.write_all(v.as_bytes()))
            }
        }
    }
}

impl SimpleBinaryDecodable for UAString {
    fn decode<S: Read + ?Sized>(
        stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        let len = read_i32(stream)?;
        match len {
            -1 => Ok(UAString::null()),
            n if n < -1 => Err(Error::decoding(format!("Bad string length {n}"))),
            n if n as usize > decoding_options.max_string_length => Err(Error::decoding(format!(
                "String of {} bytes exceeds the {} byte limit",
                n, decoding_options.max_string_length
            ))),
            n => {
                let mut buf = vec![0u8; n as usize];
                process_decode_io_result(stream.read_exact(&mut buf))?;
                String::from_utf8(buf)
                    .map(UAString::from)
                    .map_err(|e| Error::decoding(format!("String is not UTF-8: {e}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn null_and_empty_are_different() {
        let null = UAString::null();
        let empty = UAString::from("");
        assert_ne!(null, empty);
        assert_eq!(null.len(), -1);
        assert_eq!(empty.len(), 0);
        assert!(null.is_empty() && empty.is_empty());
        // On the wire: -1 versus 0
        assert_eq!(null.encode_to_vec(), (-1i32).to_le_bytes());
        assert_eq!(empty.encode_to_vec(), 0i32.to_le_bytes());
    }

    #[test]
    fn round_trip_and_length_limit() {
        let s = UAString::from("überdruck");
        let bytes = s.encode_to_vec();
        assert_eq!(bytes.len(), s.byte_len());
        let opts = DecodingOptions::test();
        assert_eq!(UAString::decode(&mut Cursor::new(&bytes), &opts).unwrap(), s);

        let tight = DecodingOptions {
            max_string_length: 4,
            ..DecodingOptions::test()
        };
        assert!(UAString::decode(&mut Cursor::new(&bytes), &tight).is_err());
    }

    #[test]
    fn substring_ranges() {
        let s = UAString::from("conveyor");
        assert_eq!(s.substring(0, 3).unwrap().as_ref(), "conv");
        assert_eq!(s.substring(4, 400).unwrap().as_ref(), "eyor");
        assert!(s.substring(8, 9).is_err());
        assert!(UAString::null().substring(0, 1).is_err());
    }

    #[test]
    fn str_comparison() {
        assert!(UAString::from("valve") == *"valve");
        assert!(UAString::from("valve") != *"valve2");
        assert!(UAString::null() != *"");
    }
}
