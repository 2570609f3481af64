// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! The numeric attribute ids defined in part 4.

use crate::StatusCode;

/// Numeric selector over the attributes of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum AttributeId {
    /// Node id.
    NodeId = 1,
    /// Node class.
    NodeClass = 2,
    /// Browse name.
    BrowseName = 3,
    /// Display name.
    DisplayName = 4,
    /// Description.
    Description = 5,
    /// Write mask.
    WriteMask = 6,
    /// User write mask.
    UserWriteMask = 7,
    /// Whether a type is abstract.
    IsAbstract = 8,
    /// Whether a reference type is symmetric.
    Symmetric = 9,
    /// Inverse name of a reference type.
    InverseName = 10,
    /// Whether a view contains loops.
    ContainsNoLoops = 11,
    /// Event notifier of an object or view.
    EventNotifier = 12,
    /// Current value of a variable.
    Value = 13,
    /// Data type of a variable.
    DataType = 14,
    /// Value rank of a variable.
    ValueRank = 15,
    /// Array dimensions of a variable.
    ArrayDimensions = 16,
    /// Access level of a variable.
    AccessLevel = 17,
    /// User access level of a variable.
    UserAccessLevel = 18,
    /// Minimum sampling interval of a variable.
    MinimumSamplingInterval = 19,
    /// Whether a variable is historizing.
    Historizing = 20,
    /// Whether a method is executable.
    Executable = 21,
    /// Whether a method is executable by the current user.
    UserExecutable = 22,
}

impl TryFrom<u32> for AttributeId {
    type Error = StatusCode;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Ok(match value {
            1 => AttributeId::NodeId,
            2 => AttributeId::NodeClass,
            3 => AttributeId::BrowseName,
            4 => AttributeId::DisplayName,
            5 => AttributeId::Description,
            6 => AttributeId::WriteMask,
            7 => AttributeId::UserWriteMask,
            8 => AttributeId::IsAbstract,
            9 => AttributeId::Symmetric,
            10 => AttributeId::InverseName,
            11 => AttributeId::ContainsNoLoops,
            12 => AttributeId::EventNotifier,
            13 => AttributeId::Value,
            14 => AttributeId::DataType,
            15 => AttributeId::ValueRank,
            16 => AttributeId::ArrayDimensions,
            17 => AttributeId::AccessLevel,
            18 => AttributeId::UserAccessLevel,
            19 => AttributeId::MinimumSamplingInterval,
            20 => AttributeId::Historizing,
            21 => AttributeId::Executable,
            22 => AttributeId::UserExecutable,
            _ => return Err(StatusCode::BadAttributeIdInvalid),
        })
    }
}
