// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! Node identifiers.
//!
//! A node id pairs a namespace index with one of four identifier kinds.
//! On the wire the kind is a discriminant byte, and numeric ids additionally
//! use the two compressed forms of part 6 when namespace and value are small
//! enough.

use std::{
    fmt,
    io::{Read, Write},
    str::FromStr,
    sync::{
        atomic::{AtomicU32, Ordering},
        LazyLock,
    },
};

use crate::{
    encoding::{BinaryDecodable, BinaryEncodable, EncodingResult},
    read_u16, read_u32, read_u8, write_u16, write_u32, write_u8, ByteString, DataTypeId, Error,
    Guid, ObjectId, ReferenceTypeId, StatusCode, UAString, VariableId,
};

// Wire discriminants for the identifier forms.
const FORM_TWO_BYTE: u8 = 0x00;
const FORM_FOUR_BYTE: u8 = 0x01;
const FORM_NUMERIC: u8 = 0x02;
const FORM_STRING: u8 = 0x03;
const FORM_GUID: u8 = 0x04;
const FORM_BYTE_STRING: u8 = 0x05;

/// The identifier half of a node id.
#[derive(Eq, PartialEq, Clone, Debug, Hash)]
pub enum Identifier {
    /// `i=...`, a 32 bit number.
    Numeric(u32),
    /// `s=...`, a string.
    String(UAString),
    /// `g=...`, a 16 byte guid.
    Guid(Guid),
    /// `b=...`, opaque bytes.
    ByteString(ByteString),
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Identifier::Numeric(n) => write!(f, "i={n}"),
            Identifier::String(s) => write!(f, "s={s}"),
            Identifier::Guid(g) => write!(f, "g={g}"),
            Identifier::ByteString(b) => write!(f, "b={}", b.as_base64()),
        }
    }
}

macro_rules! identifier_from {
    ($(($t:ty, $variant:ident)),* $(,)?) => {
        $(
            impl From<$t> for Identifier {
                fn from(value: $t) -> Self {
                    Identifier::$variant(value.into())
                }
            }
        )*
    };
}

identifier_from!(
    (u32, Numeric),
    (UAString, String),
    (&str, String),
    (String, String),
    (Guid, Guid),
    (ByteString, ByteString),
);

/// Error produced when a node id cannot be interpreted as a well-known id.
#[derive(Debug, thiserror::Error)]
#[error("NodeIdError")]
pub struct NodeIdError;

/// Identifies a node within a server's address space.
#[derive(PartialEq, Eq, Clone, Debug, Hash)]
pub struct NodeId {
    /// Index into the server's namespace array.
    pub namespace: u16,
    /// The identifier within that namespace.
    pub identifier: Identifier,
}

impl Default for NodeId {
    fn default() -> Self {
        NodeId::null()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // Namespace 0 is implied and left off the text form
        if self.namespace == 0 {
            self.identifier.fmt(f)
        } else {
            write!(f, "ns={};{}", self.namespace, self.identifier)
        }
    }
}

impl NodeId {
    /// Build a node id from a namespace index and anything convertible to an
    /// identifier.
    pub fn new<T: Into<Identifier>>(namespace: u16, value: T) -> NodeId {
        NodeId {
            namespace,
            identifier: value.into(),
        }
    }

    /// The null node id: namespace 0, numeric 0.
    pub fn null() -> NodeId {
        NodeId::new(0, 0u32)
    }

    /// A node is null exactly when both namespace and numeric value are 0.
    pub fn is_null(&self) -> bool {
        self.namespace == 0 && matches!(self.identifier, Identifier::Numeric(0))
    }

    /// Hand out a fresh numeric id, counting up from 1000. Used when a
    /// caller asks the server to assign ids.
    pub fn next_numeric(namespace: u16) -> NodeId {
        static COUNTER: AtomicU32 = AtomicU32::new(1000);
        NodeId::new(namespace, COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Whether the identifier is numeric.
    pub fn is_numeric(&self) -> bool {
        matches!(self.identifier, Identifier::Numeric(_))
    }

    /// The numeric value, when the identifier is numeric.
    pub fn as_u32(&self) -> Option<u32> {
        match self.identifier {
            Identifier::Numeric(n) => Some(n),
            _ => None,
        }
    }

    // Numeric value when this id lives in namespace 0, the precondition for
    // all of the well-known id lookups.
    fn ns0_numeric(&self) -> Option<u32> {
        if self.namespace == 0 {
            self.as_u32()
        } else {
            None
        }
    }
}

macro_rules! well_known_id {
    ($(($id_ty:ty, $as_fn:ident)),* $(,)?) => {
        $(
            impl NodeId {
                /// Interpret this id as the corresponding well-known id.
                pub fn $as_fn(&self) -> Result<$id_ty, NodeIdError> {
                    self.ns0_numeric()
                        .and_then(|n| <$id_ty>::try_from(n).ok())
                        .ok_or(NodeIdError)
                }
            }

            impl PartialEq<$id_ty> for NodeId {
                fn eq(&self, other: &$id_ty) -> bool {
                    self.ns0_numeric() == Some(*other as u32)
                }
            }
        )*
    };
}

well_known_id!(
    (ObjectId, as_object_id),
    (ReferenceTypeId, as_reference_type_id),
    (DataTypeId, as_data_type_id),
    (VariableId, as_variable_id),
);

impl From<&NodeId> for NodeId {
    fn from(value: &NodeId) -> Self {
        value.clone()
    }
}

impl From<(u16, u32)> for NodeId {
    fn from((namespace, value): (u16, u32)) -> Self {
        NodeId::new(namespace, value)
    }
}

impl<'a> From<(u16, &'a str)> for NodeId {
    fn from((namespace, value): (u16, &'a str)) -> Self {
        NodeId::new(namespace, value)
    }
}

impl BinaryEncodable for NodeId {
    fn byte_len(&self, ctx: &crate::Context<'_>) -> usize {
        match &self.identifier {
            Identifier::Numeric(n) if self.namespace == 0 && *n <= u8::MAX as u32 => 2,
            Identifier::Numeric(n) if self.namespace <= u8::MAX as u16 && *n <= u16::MAX as u32 => {
                4
            }
            Identifier::Numeric(_) => 7,
            Identifier::String(s) => 3 + s.byte_len(ctx),
            Identifier::Guid(g) => 3 + g.byte_len(ctx),
            Identifier::ByteString(b) => 3 + b.byte_len(ctx),
        }
    }

    fn encode<S: Write + ?Sized>(
        &self,
        stream: &mut S,
        ctx: &crate::Context<'_>,
    ) -> EncodingResult<()> {
        match &self.identifier {
            Identifier::Numeric(n) => {
                // Numeric ids shrink to the two and four byte forms when
                // namespace and value fit
                if self.namespace == 0 && *n <= u8::MAX as u32 {
                    write_u8(stream, FORM_TWO_BYTE)?;
                    write_u8(stream, *n as u8)
                } else if self.namespace <= u8::MAX as u16 && *n <= u16::MAX as u32 {
                    write_u8(stream, FORM_FOUR_BYTE)?;
                    write_u8(stream, self.namespace as u8)?;
                    write_u16(stream, *n as u16)
                } else {
                    write_u8(stream, FORM_NUMERIC)?;
                    write_u16(stream, self.namespace)?;
                    write_u32(stream, *n)
                }
            }
            Identifier::String(s) => {
                write_u8(stream, FORM_STRING)?;
                write_u16(stream, self.namespace)?;
                s.encode(stream, ctx)
            }
            Identifier::Guid(g) => {
                write_u8(stream, FORM_GUID)?;
                write_u16(stream, self.namespace)?;
                g.encode(stream, ctx)
            }
            Identifier::ByteString(b) => {
                write_u8(stream, FORM_BYTE_STRING)?;
                write_u16(stream, self.namespace)?;
                b.encode(stream, ctx)
            }
        }
    }
}

impl BinaryDecodable for NodeId {
    fn decode<S: Read + ?Sized>(stream: &mut S, ctx: &crate::Context<'_>) -> EncodingResult<Self> {
        let form = read_u8(stream)?;
        match form {
            FORM_TWO_BYTE => Ok(NodeId::new(0, read_u8(stream)? as u32)),
            FORM_FOUR_BYTE => {
                let namespace = read_u8(stream)? as u16;
                Ok(NodeId::new(namespace, read_u16(stream)? as u32))
            }
            FORM_NUMERIC => {
                let namespace = read_u16(stream)?;
                Ok(NodeId::new(namespace, read_u32(stream)?))
            }
            FORM_STRING => {
                let namespace = read_u16(stream)?;
                Ok(NodeId::new(namespace, UAString::decode(stream, ctx)?))
            }
            FORM_GUID => {
                let namespace = read_u16(stream)?;
                Ok(NodeId::new(namespace, Guid::decode(stream, ctx)?))
            }
            FORM_BYTE_STRING => {
                let namespace = read_u16(stream)?;
                Ok(NodeId::new(namespace, ByteString::decode(stream, ctx)?))
            }
            other => Err(Error::decoding(format!("Bad node id form byte {other}"))),
        }
    }
}

// The text form from part 6 5.3.1.10: an optional "ns=<n>;" prefix followed
// by "<kind>=<value>" where kind is one of i, s, g, b.
static NODE_ID_RE: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"^(?:ns=(\d+);)?([isgb])=(.+)$").unwrap());

impl FromStr for NodeId {
    type Err = StatusCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let captures = NODE_ID_RE.captures(s).ok_or(StatusCode::BadNodeIdInvalid)?;

        let namespace = match captures.get(1) {
            Some(ns) => ns
                .as_str()
                .parse::<u16>()
                .map_err(|_| StatusCode::BadNodeIdInvalid)?,
            None => 0,
        };
        let value = captures[3].to_string();
        let identifier = match &captures[2] {
            "i" => value
                .parse::<u32>()
                .map(Identifier::Numeric)
                .map_err(|_| StatusCode::BadNodeIdInvalid)?,
            "s" => Identifier::String(value.into()),
            "g" => Guid::from_str(&value)
                .map(Identifier::Guid)
                .map_err(|_| StatusCode::BadNodeIdInvalid)?,
            "b" => ByteString::from_base64(&value)
                .map(Identifier::ByteString)
                .ok_or(StatusCode::BadNodeIdInvalid)?,
            _ => return Err(StatusCode::BadNodeIdInvalid),
        };
        Ok(NodeId {
            namespace,
            identifier,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ContextOwned;
    use std::io::Cursor;

    fn round_trip(id: NodeId, expected_len: usize) {
        let ctx_owned = ContextOwned::new_default();
        let ctx = ctx_owned.context();
        let bytes = id.encode_to_vec(&ctx);
        assert_eq!(bytes.len(), expected_len);
        assert_eq!(bytes.len(), id.byte_len(&ctx));
        assert_eq!(NodeId::decode(&mut Cursor::new(bytes), &ctx).unwrap(), id);
    }

    #[test]
    fn numeric_ids_use_the_smallest_form() {
        round_trip(NodeId::new(0, 72u32), 2);
        round_trip(NodeId::new(3, 1025u32), 4);
        round_trip(NodeId::new(700, 1u32), 7);
        round_trip(NodeId::new(2, 100_000u32), 7);
    }

    #[test]
    fn non_numeric_forms() {
        let ctx_owned = ContextOwned::new_default();
        let ctx = ctx_owned.context();
        for id in [
            NodeId::new(4, "pump.1/flow"),
            NodeId::new(5, Guid::new()),
            NodeId::new(6, ByteString::from(vec![0xde, 0xad])),
        ] {
            let bytes = id.encode_to_vec(&ctx);
            assert_eq!(
                NodeId::decode(&mut Cursor::new(bytes), &ctx).unwrap(),
                id
            );
        }
    }

    #[test]
    fn null_is_ns0_numeric_0_only() {
        assert!(NodeId::null().is_null());
        assert!(!NodeId::new(2, 0u32).is_null());
        assert!(!NodeId::new(0, "").is_null());
    }

    #[test]
    fn text_form() {
        assert_eq!(
            "i=2258".parse::<NodeId>().unwrap(),
            NodeId::from(VariableId::Server_ServerStatus_CurrentTime)
        );
        assert_eq!(
            "ns=4;s=pump.1".parse::<NodeId>().unwrap(),
            NodeId::new(4, "pump.1")
        );
        assert_eq!(NodeId::new(4, "pump.1").to_string(), "ns=4;s=pump.1");
        for bad in ["", "x=1", "ns=;i=1", "i=notanumber"] {
            assert!(bad.parse::<NodeId>().is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn well_known_lookups() {
        let id: NodeId = ObjectId::Server.into();
        assert_eq!(id.as_object_id().unwrap(), ObjectId::Server);
        assert!(id.as_reference_type_id().is_err());
        assert!(NodeId::new(1, 35u32).as_reference_type_id().is_err());
        assert_eq!(NodeId::new(0, 35u32), ReferenceTypeId::Organizes);
    }
}
