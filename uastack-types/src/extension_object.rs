// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! Contains the implementation of `ExtensionObject`.

use std::io::{Cursor, Read, Write};

use crate::{
    encoding::{BinaryDecodable, BinaryEncodable, EncodingResult},
    read_i32, read_u8, write_i32, write_u8, ByteString, Context, Error, MessageInfo, NodeId,
    StatusCode, Variant,
};

/// An extension object carries a structure identified by the node id of its
/// encoding. The body is either absent ("not encoded") or a length-prefixed
/// binary blob.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct ExtensionObject {
    /// The node id of the binary encoding of the body.
    pub node_id: NodeId,
    /// The encoded body, `None` when the object carries no body.
    pub body: Option<ByteString>,
}

impl BinaryEncodable for ExtensionObject {
    fn byte_len(&self, ctx: &Context<'_>) -> usize {
        let mut size = self.node_id.byte_len(ctx) + 1;
        if let Some(ref body) = self.body {
            size += body.byte_len(ctx);
        }
        size
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S, ctx: &Context<'_>) -> EncodingResult<()> {
        self.node_id.encode(stream, ctx)?;
        match &self.body {
            Some(body) => {
                write_u8(stream, 0x1)?;
                body.encode(stream, ctx)
            }
            None => write_u8(stream, 0x0),
        }
    }
}

impl BinaryDecodable for ExtensionObject {
    fn decode<S: Read + ?Sized>(stream: &mut S, ctx: &Context<'_>) -> EncodingResult<Self> {
        let node_id = NodeId::decode(stream, ctx)?;
        let encoding_type = read_u8(stream)?;
        let body = match encoding_type {
            0x0 => None,
            0x1 => Some(ByteString::decode(stream, ctx)?),
            0x2 => {
                // An XML body. We cannot interpret it, but we must consume it
                // to keep the stream aligned.
                let len = read_i32(stream)?;
                if len > 0 {
                    crate::skip_bytes(stream, len as u64)?;
                }
                None
            }
            r => {
                return Err(Error::decoding(format!(
                    "Invalid extension object encoding type {r}"
                )));
            }
        };
        Ok(ExtensionObject { node_id, body })
    }
}

impl ExtensionObject {
    /// An extension object with a null node id and no body.
    pub fn null() -> ExtensionObject {
        ExtensionObject::default()
    }

    /// Test if the object has a null id and no body.
    pub fn is_null(&self) -> bool {
        self.node_id.is_null() && self.body.is_none()
    }

    /// Create an extension object from anything that knows its encoding id.
    pub fn from_message<T>(value: &T, ctx: &Context<'_>) -> ExtensionObject
    where
        T: BinaryEncodable + MessageInfo,
    {
        ExtensionObject {
            node_id: value.type_id().into(),
            body: Some(ByteString::from(value.encode_to_vec(ctx))),
        }
    }

    /// Decode the body as the given type. The caller must have checked the
    /// node id first.
    pub fn decode_inner<T>(&self, ctx: &Context<'_>) -> EncodingResult<T>
    where
        T: BinaryDecodable,
    {
        let Some(ref body) = self.body else {
            return Err(Error::new(
                StatusCode::BadStructureMissing,
                "Extension object has no body",
            ));
        };
        let mut stream = Cursor::new(body.as_ref());
        T::decode(&mut stream, ctx)
    }

    /// Decode the body as a custom type through the context's custom type
    /// table, per the `custom_types` contract of the codec. Returns
    /// `BadDataTypeIdUnknown` if no decoder is registered for the id.
    pub fn decode_custom(&self, ctx: &Context<'_>) -> EncodingResult<Variant> {
        let Some(decoder) = ctx.custom_types().get(&self.node_id) else {
            return Err(Error::new(
                StatusCode::BadDataTypeIdUnknown,
                format!("No custom type registered for {}", self.node_id),
            ));
        };
        let Some(ref body) = self.body else {
            return Err(Error::new(
                StatusCode::BadStructureMissing,
                "Extension object has no body",
            ));
        };
        let mut stream = Cursor::new(body.as_ref());
        decoder(&mut stream, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ContextOwned, CustomTypeTable, DecodingOptions, NamespaceMap};

    fn ctx_with_custom() -> ContextOwned {
        let mut table = CustomTypeTable::new();
        table.add(NodeId::new(2, 1200u32), |stream, ctx| {
            Ok(Variant::Int32(crate::BinaryDecodable::decode(stream, ctx)?))
        });
        ContextOwned::new(NamespaceMap::new(), table, DecodingOptions::test())
    }

    #[test]
    fn round_trip() {
        let ctx_owned = ContextOwned::new_default();
        let ctx = ctx_owned.context();
        for obj in [
            ExtensionObject::null(),
            ExtensionObject {
                node_id: NodeId::new(0, 298u32),
                body: Some(ByteString::from(vec![1u8, 2, 3, 4])),
            },
        ] {
            let bytes = obj.encode_to_vec(&ctx);
            assert_eq!(bytes.len(), obj.byte_len(&ctx));
            let decoded =
                ExtensionObject::decode(&mut Cursor::new(bytes), &ctx).unwrap();
            assert_eq!(decoded, obj);
        }
    }

    #[test]
    fn custom_type_table() {
        let ctx_owned = ctx_with_custom();
        let ctx = ctx_owned.context();
        let obj = ExtensionObject {
            node_id: NodeId::new(2, 1200u32),
            body: Some(ByteString::from(42i32.to_le_bytes().to_vec())),
        };
        assert_eq!(obj.decode_custom(&ctx).unwrap(), Variant::Int32(42));

        let unknown = ExtensionObject {
            node_id: NodeId::new(2, 9999u32),
            body: Some(ByteString::from(vec![0u8])),
        };
        assert_eq!(
            unknown.decode_custom(&ctx).unwrap_err().status(),
            StatusCode::BadDataTypeIdUnknown
        );
    }
}
