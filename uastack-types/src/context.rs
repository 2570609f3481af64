// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! Encoding context, shared between all encode and decode operations on a
//! channel. Holds the namespace map, the decoding limits, and the table of
//! custom types consulted when decoding extension objects that are not part
//! of the standard set.

use std::io::Read;

use hashbrown::HashMap;

use crate::{DecodingOptions, EncodingResult, NodeId, Variant};

/// Map of namespace URIs to their index in the server namespace array.
#[derive(Debug, Clone, Default)]
pub struct NamespaceMap {
    known_namespaces: HashMap<String, u16>,
}

/// The OPC UA core namespace URI, always index 0.
pub const OPC_UA_NAMESPACE: &str = "http://opcfoundation.org/UA/";

impl NamespaceMap {
    /// Create a new namespace map containing only the core namespace.
    pub fn new() -> Self {
        let mut known_namespaces = HashMap::new();
        known_namespaces.insert(OPC_UA_NAMESPACE.to_owned(), 0u16);
        Self { known_namespaces }
    }

    /// Add a namespace, returning its index. If the namespace is already
    /// known the existing index is returned.
    pub fn add_namespace(&mut self, namespace: &str) -> u16 {
        if let Some(idx) = self.known_namespaces.get(namespace) {
            return *idx;
        }
        let max = self
            .known_namespaces
            .values()
            .max()
            .copied()
            .unwrap_or_default();
        self.known_namespaces.insert(namespace.to_owned(), max + 1);
        max + 1
    }

    /// Get the index of the given namespace URI, if known.
    pub fn get_index(&self, namespace: &str) -> Option<u16> {
        self.known_namespaces.get(namespace).copied()
    }

    /// Get the URI for the given index, if known.
    pub fn get_uri(&self, index: u16) -> Option<&str> {
        self.known_namespaces
            .iter()
            .find(|(_, i)| **i == index)
            .map(|(uri, _)| uri.as_str())
    }

    /// Inner map of known namespaces.
    pub fn known_namespaces(&self) -> &HashMap<String, u16> {
        &self.known_namespaces
    }

    /// The namespace array in index order, for the NamespaceArray variable.
    pub fn as_array(&self) -> Vec<String> {
        let mut arr: Vec<_> = self.known_namespaces.iter().collect();
        arr.sort_by_key(|(_, i)| **i);
        arr.into_iter().map(|(uri, _)| uri.clone()).collect()
    }
}

/// Function decoding the body of a custom extension object into a variant.
pub type CustomDecodeFn = fn(&mut dyn Read, &Context<'_>) -> EncodingResult<Variant>;

/// Table of custom data types, keyed by the node id of their binary
/// encoding. Consulted when decoding extension objects whose encoding id is
/// not in the standard set.
#[derive(Debug, Clone, Default)]
pub struct CustomTypeTable {
    decoders: HashMap<NodeId, CustomDecodeFn>,
}

impl CustomTypeTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a decoder for the given binary encoding id.
    pub fn add(&mut self, encoding_id: NodeId, decoder: CustomDecodeFn) {
        self.decoders.insert(encoding_id, decoder);
    }

    /// Look up the decoder for the given encoding id.
    pub fn get(&self, encoding_id: &NodeId) -> Option<CustomDecodeFn> {
        self.decoders.get(encoding_id).copied()
    }
}

/// Owned variant of the encoding context, typically shared in a lock.
#[derive(Debug, Clone, Default)]
pub struct ContextOwned {
    namespaces: NamespaceMap,
    custom_types: CustomTypeTable,
    options: DecodingOptions,
}

impl ContextOwned {
    /// Create a new owned context.
    pub fn new(
        namespaces: NamespaceMap,
        custom_types: CustomTypeTable,
        options: DecodingOptions,
    ) -> Self {
        Self {
            namespaces,
            custom_types,
            options,
        }
    }

    /// Create a context with default limits and only the core namespace.
    pub fn new_default() -> Self {
        Self::new(
            NamespaceMap::new(),
            CustomTypeTable::new(),
            DecodingOptions::default(),
        )
    }

    /// Borrow as a [`Context`].
    pub fn context(&self) -> Context<'_> {
        Context { owned: self }
    }

    /// Get the decoding options.
    pub fn options(&self) -> &DecodingOptions {
        &self.options
    }

    /// Get a mutable reference to the decoding options.
    pub fn options_mut(&mut self) -> &mut DecodingOptions {
        &mut self.options
    }

    /// Get the namespace map.
    pub fn namespaces(&self) -> &NamespaceMap {
        &self.namespaces
    }

    /// Get a mutable reference to the namespace map.
    pub fn namespaces_mut(&mut self) -> &mut NamespaceMap {
        &mut self.namespaces
    }

    /// Get the custom type table.
    pub fn custom_types(&self) -> &CustomTypeTable {
        &self.custom_types
    }

    /// Get a mutable reference to the custom type table.
    pub fn custom_types_mut(&mut self) -> &mut CustomTypeTable {
        &mut self.custom_types
    }
}

/// Borrowed encoding context passed to every encode/decode call.
#[derive(Debug, Clone, Copy)]
pub struct Context<'a> {
    owned: &'a ContextOwned,
}

impl<'a> Context<'a> {
    /// Get the decoding options.
    pub fn options(&self) -> &'a DecodingOptions {
        &self.owned.options
    }

    /// Get the namespace map.
    pub fn namespaces(&self) -> &'a NamespaceMap {
        &self.owned.namespaces
    }

    /// Get the custom type table.
    pub fn custom_types(&self) -> &'a CustomTypeTable {
        &self.owned.custom_types
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_map() {
        let mut map = NamespaceMap::new();
        assert_eq!(map.get_index(OPC_UA_NAMESPACE), Some(0));
        let idx = map.add_namespace("urn:test");
        assert_eq!(idx, 1);
        // Adding again returns the same index
        assert_eq!(map.add_namespace("urn:test"), 1);
        assert_eq!(map.as_array(), vec![
            OPC_UA_NAMESPACE.to_owned(),
            "urn:test".to_owned()
        ]);
    }
}
