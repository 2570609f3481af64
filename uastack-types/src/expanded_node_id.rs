// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! Contains the implementation of `ExpandedNodeId`.

use std::{
    fmt,
    io::{Cursor, Read, Write},
};

use crate::{
    encoding::{BinaryDecodable, BinaryEncodable, EncodingResult},
    read_u32, write_u32, Context, NamespaceMap, NodeId, UAString,
};

/// A NodeId that allows the namespace URI to be specified instead of an index,
/// used at boundaries where the namespace index may not yet be resolved.
#[derive(PartialEq, Eq, Clone, Debug, Hash, Default)]
pub struct ExpandedNodeId {
    /// The inner node id.
    pub node_id: NodeId,
    /// Namespace URI, only set when the namespace index is not known.
    pub namespace_uri: UAString,
    /// Index of the server holding the node, 0 for the local server.
    pub server_index: u32,
}

impl fmt::Display for ExpandedNodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.namespace_uri.is_null() {
            write!(f, "{}", self.node_id)
        } else {
            write!(f, "nsu={};{}", self.namespace_uri, self.node_id.identifier)
        }
    }
}

impl BinaryEncodable for ExpandedNodeId {
    fn byte_len(&self, ctx: &Context<'_>) -> usize {
        let mut size = self.node_id.byte_len(ctx);
        if !self.namespace_uri.is_null() {
            size += self.namespace_uri.byte_len(ctx);
        }
        if self.server_index != 0 {
            size += 4;
        }
        size
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S, ctx: &Context<'_>) -> EncodingResult<()> {
        // The expanded node id is the node id with flag bits in the type byte
        // for the namespace uri and server index.
        let mut buf = Cursor::new(Vec::with_capacity(self.node_id.byte_len(ctx)));
        self.node_id.encode(&mut buf, ctx)?;
        let mut data = buf.into_inner();
        if !self.namespace_uri.is_null() {
            data[0] |= 0x80;
        }
        if self.server_index != 0 {
            data[0] |= 0x40;
        }
        stream.write_all(&data).map_err(crate::Error::encoding)?;
        if !self.namespace_uri.is_null() {
            self.namespace_uri.encode(stream, ctx)?;
        }
        if self.server_index != 0 {
            write_u32(stream, self.server_index)?;
        }
        Ok(())
    }
}

impl BinaryDecodable for ExpandedNodeId {
    fn decode<S: Read + ?Sized>(stream: &mut S, ctx: &Context<'_>) -> EncodingResult<Self> {
        // Peel the flag bits off the identifier byte, then decode the node id
        // from the remainder.
        let data_encoding = crate::read_u8(stream)?;
        let mut wrapped = FlagStrippedStream {
            first: Some(data_encoding & 0x3f),
            inner: &mut *stream,
        };
        let node_id = NodeId::decode(&mut wrapped, ctx)?;
        drop(wrapped);

        let namespace_uri = if data_encoding & 0x80 != 0 {
            UAString::decode(stream, ctx)?
        } else {
            UAString::null()
        };
        let server_index = if data_encoding & 0x40 != 0 {
            read_u32(stream)?
        } else {
            0
        };
        Ok(ExpandedNodeId {
            node_id,
            namespace_uri,
            server_index,
        })
    }
}

/// Replays the stripped identifier byte before continuing with the inner stream.
struct FlagStrippedStream<'a, S: ?Sized> {
    first: Option<u8>,
    inner: &'a mut S,
}

impl<S: Read + ?Sized> Read for FlagStrippedStream<'_, S> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if let Some(b) = self.first.take() {
            if buf.is_empty() {
                self.first = Some(b);
                return Ok(0);
            }
            buf[0] = b;
            Ok(1)
        } else {
            self.inner.read(buf)
        }
    }
}

impl From<NodeId> for ExpandedNodeId {
    fn from(node_id: NodeId) -> Self {
        ExpandedNodeId {
            node_id,
            namespace_uri: UAString::null(),
            server_index: 0,
        }
    }
}

impl From<&NodeId> for ExpandedNodeId {
    fn from(node_id: &NodeId) -> Self {
        node_id.clone().into()
    }
}

impl ExpandedNodeId {
    /// Create a new expanded node id referring to the local server.
    pub fn new(node_id: impl Into<NodeId>) -> ExpandedNodeId {
        node_id.into().into()
    }

    /// Returns a null expanded node id.
    pub fn null() -> ExpandedNodeId {
        NodeId::null().into()
    }

    /// Test if the expanded node id is null.
    pub fn is_null(&self) -> bool {
        self.node_id.is_null() && self.namespace_uri.is_null()
    }

    /// Resolve this into a local [`NodeId`], looking up the namespace URI in
    /// the namespace map if one is set. Returns `None` if the node lives on
    /// another server or the namespace is unknown.
    pub fn try_resolve(&self, namespaces: &NamespaceMap) -> Option<NodeId> {
        if self.server_index != 0 {
            return None;
        }
        if self.namespace_uri.is_null() {
            Some(self.node_id.clone())
        } else {
            let index = namespaces.get_index(self.namespace_uri.as_ref())?;
            Some(NodeId {
                namespace: index,
                identifier: self.node_id.identifier.clone(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ContextOwned;
    use std::io::Cursor;

    fn round_trip(id: &ExpandedNodeId) {
        let ctx_owned = ContextOwned::new_default();
        let ctx = ctx_owned.context();
        let bytes = id.encode_to_vec(&ctx);
        assert_eq!(bytes.len(), id.byte_len(&ctx));
        let decoded = ExpandedNodeId::decode(&mut Cursor::new(bytes), &ctx).unwrap();
        assert_eq!(&decoded, id);
    }

    #[test]
    fn expanded_node_id_round_trip() {
        round_trip(&ExpandedNodeId::new(NodeId::new(1, "hello")));
        round_trip(&ExpandedNodeId {
            node_id: NodeId::new(0, 2253u32),
            namespace_uri: "urn:some:namespace".into(),
            server_index: 3,
        });
    }

    #[test]
    fn resolve() {
        let mut map = NamespaceMap::new();
        map.add_namespace("urn:test");
        let id = ExpandedNodeId {
            node_id: NodeId::new(0, 100u32),
            namespace_uri: "urn:test".into(),
            server_index: 0,
        };
        assert_eq!(id.try_resolve(&map), Some(NodeId::new(1, 100u32)));
        let remote = ExpandedNodeId {
            server_index: 1,
            ..id
        };
        assert_eq!(remote.try_resolve(&map), None);
    }
}
