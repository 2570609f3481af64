// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! Contains the implementation of `QualifiedName`.

use std::{
    fmt,
    io::{Read, Write},
};

use crate::{
    encoding::{BinaryDecodable, BinaryEncodable, EncodingResult},
    read_u16, write_u16, Context, UAString,
};

/// A name qualified by a namespace index; the browse name of a node.
#[derive(PartialEq, Eq, Debug, Clone, Hash, Default)]
pub struct QualifiedName {
    /// The namespace index.
    pub namespace_index: u16,
    /// The name.
    pub name: UAString,
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace_index != 0 {
            write!(f, "{}:{}", self.namespace_index, self.name)
        } else {
            write!(f, "{}", self.name)
        }
    }
}

impl BinaryEncodable for QualifiedName {
    fn byte_len(&self, ctx: &Context<'_>) -> usize {
        2 + self.name.byte_len(ctx)
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S, ctx: &Context<'_>) -> EncodingResult<()> {
        write_u16(stream, self.namespace_index)?;
        self.name.encode(stream, ctx)
    }
}

impl BinaryDecodable for QualifiedName {
    fn decode<S: Read + ?Sized>(stream: &mut S, ctx: &Context<'_>) -> EncodingResult<Self> {
        let namespace_index = read_u16(stream)?;
        let name = UAString::decode(stream, ctx)?;
        Ok(QualifiedName {
            namespace_index,
            name,
        })
    }
}

impl<'a> From<&'a str> for QualifiedName {
    fn from(value: &'a str) -> Self {
        QualifiedName {
            namespace_index: 0,
            name: value.into(),
        }
    }
}

impl From<String> for QualifiedName {
    fn from(value: String) -> Self {
        QualifiedName {
            namespace_index: 0,
            name: value.into(),
        }
    }
}

impl<T> From<(u16, T)> for QualifiedName
where
    T: Into<UAString>,
{
    fn from(value: (u16, T)) -> Self {
        QualifiedName {
            namespace_index: value.0,
            name: value.1.into(),
        }
    }
}

impl QualifiedName {
    /// Create a new qualified name.
    pub fn new(namespace_index: u16, name: impl Into<UAString>) -> QualifiedName {
        QualifiedName {
            namespace_index,
            name: name.into(),
        }
    }

    /// The null qualified name: namespace 0 and a null name.
    pub fn null() -> QualifiedName {
        QualifiedName {
            namespace_index: 0,
            name: UAString::null(),
        }
    }

    /// Test if this is the null qualified name.
    pub fn is_null(&self) -> bool {
        self.namespace_index == 0 && self.name.is_null()
    }

    /// A 32-bit FNV-1a hash of the name, used for fast sibling lookups.
    pub fn name_hash(&self) -> u32 {
        const FNV_PRIME: u32 = 16777619;
        let mut hash: u32 = 2166136261;
        for b in self.name.as_ref().as_bytes() {
            hash ^= u32::from(*b);
            hash = hash.wrapping_mul(FNV_PRIME);
        }
        hash
    }
}
