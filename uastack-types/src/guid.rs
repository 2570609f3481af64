// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! Contains the implementation of `Guid`.

use std::{
    fmt,
    io::{Read, Write},
    str::FromStr,
};

use uuid::Uuid;

use crate::{
    encoding::{process_decode_io_result, process_encode_io_result, EncodingResult},
    DecodingOptions, SimpleBinaryDecodable, SimpleBinaryEncodable,
};

/// A 16-byte globally unique identifier.
#[derive(Eq, PartialEq, Clone, Hash, Default)]
pub struct Guid {
    uuid: Uuid,
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uuid.hyphenated())
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uuid.hyphenated())
    }
}

impl SimpleBinaryEncodable for Guid {
    fn byte_len(&self) -> usize {
        16
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        // The GUID is encoded in its mixed-endian on-the-wire layout: the
        // first three fields little-endian, the last eight bytes as-is.
        let (data1, data2, data3, data4) = self.uuid.as_fields();
        process_encode_io_result(stream.write_all(&data1.to_le_bytes()))?;
        process_encode_io_result(stream.write_all(&data2.to_le_bytes()))?;
        process_encode_io_result(stream.write_all(&data3.to_le_bytes()))?;
        process_encode_io_result(stream.write_all(data4))
    }
}

impl SimpleBinaryDecodable for Guid {
    fn decode<S: Read + ?Sized>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        let mut data1 = [0u8; 4];
        process_decode_io_result(stream.read_exact(&mut data1))?;
        let mut data2 = [0u8; 2];
        process_decode_io_result(stream.read_exact(&mut data2))?;
        let mut data3 = [0u8; 2];
        process_decode_io_result(stream.read_exact(&mut data3))?;
        let mut data4 = [0u8; 8];
        process_decode_io_result(stream.read_exact(&mut data4))?;
        Ok(Guid {
            uuid: Uuid::from_fields(
                u32::from_le_bytes(data1),
                u16::from_le_bytes(data2),
                u16::from_le_bytes(data3),
                &data4,
            ),
        })
    }
}

impl FromStr for Guid {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(|uuid| Guid { uuid }).map_err(|_| ())
    }
}

impl From<Uuid> for Guid {
    fn from(uuid: Uuid) -> Self {
        Guid { uuid }
    }
}

impl Guid {
    /// Create a guid of nothing but zeroes.
    pub fn null() -> Guid {
        Guid { uuid: Uuid::nil() }
    }

    /// Create a new random Guid.
    pub fn new() -> Guid {
        Guid {
            uuid: Uuid::new_v4(),
        }
    }

    /// Return the bytes of the Guid.
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.uuid.as_bytes()
    }
}

#[test]
fn guid_round_trip() {
    use std::io::Cursor;
    let g = Guid::new();
    let bytes = g.encode_to_vec();
    assert_eq!(bytes.len(), 16);
    let decoded = Guid::decode(&mut Cursor::new(bytes), &DecodingOptions::test()).unwrap();
    assert_eq!(decoded, g);
}
