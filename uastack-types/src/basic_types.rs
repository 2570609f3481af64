// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! Common enumerations shared across service sets. OPC UA enumerations are
//! encoded as Int32 on the wire.

use uastack_macros::UaEnum;

// Alias for the derive macros.
#[allow(unused)]
mod opcua {
    pub use crate as types;
}

/// The class of a node, a bit field with exactly one bit set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, UaEnum)]
#[repr(i32)]
pub enum NodeClass {
    /// No node class specified, invalid in most contexts.
    #[default]
    Unspecified = 0,
    /// An object node.
    Object = 1,
    /// A variable node.
    Variable = 2,
    /// A method node.
    Method = 4,
    /// An object type node.
    ObjectType = 8,
    /// A variable type node.
    VariableType = 16,
    /// A reference type node.
    ReferenceType = 32,
    /// A data type node.
    DataType = 64,
    /// A view node.
    View = 128,
}

/// Message security mode of an endpoint or channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, UaEnum)]
#[repr(i32)]
pub enum MessageSecurityMode {
    /// Invalid mode.
    #[default]
    Invalid = 0,
    /// Messages are neither signed nor encrypted.
    None = 1,
    /// Messages are signed.
    Sign = 2,
    /// Messages are signed and encrypted.
    SignAndEncrypt = 3,
}

/// Type of an OpenSecureChannel request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, UaEnum)]
#[repr(i32)]
pub enum SecurityTokenRequestType {
    /// Open a new channel.
    #[default]
    Issue = 0,
    /// Renew the token of an existing channel.
    Renew = 1,
}

/// Which timestamps to return on read and monitoring operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, UaEnum)]
#[repr(i32)]
pub enum TimestampsToReturn {
    /// Source timestamp only.
    Source = 0,
    /// Server timestamp only.
    Server = 1,
    /// Both timestamps.
    #[default]
    Both = 2,
    /// No timestamps.
    Neither = 3,
    /// Invalid value.
    Invalid = 4,
}

/// Monitoring mode of a monitored item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, UaEnum)]
#[repr(i32)]
pub enum MonitoringMode {
    /// Sampling and reporting are disabled.
    Disabled = 0,
    /// The item is sampled but notifications are not reported.
    Sampling = 1,
    /// The item is sampled and notifications are reported.
    #[default]
    Reporting = 2,
}

/// Direction to browse references in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, UaEnum)]
#[repr(i32)]
pub enum BrowseDirection {
    /// Follow references in their forward direction.
    #[default]
    Forward = 0,
    /// Follow references in their inverse direction.
    Inverse = 1,
    /// Follow references both ways.
    Both = 2,
}

/// The type of an application advertised in an application description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, UaEnum)]
#[repr(i32)]
pub enum ApplicationType {
    /// A server.
    #[default]
    Server = 0,
    /// A client.
    Client = 1,
    /// Both a client and a server.
    ClientAndServer = 2,
    /// A discovery server.
    DiscoveryServer = 3,
}

/// The type of a user token policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, UaEnum)]
#[repr(i32)]
pub enum UserTokenType {
    /// Anonymous access.
    #[default]
    Anonymous = 0,
    /// User name and password.
    UserName = 1,
    /// X509 certificate.
    Certificate = 2,
    /// Token issued by an external authority.
    IssuedToken = 3,
}

/// Operators usable in a content filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, UaEnum)]
#[repr(i32)]
pub enum FilterOperator {
    /// Both operands are equal.
    #[default]
    Equals = 0,
    /// The operand is null.
    IsNull = 1,
    /// The first operand is greater than the second.
    GreaterThan = 2,
    /// The first operand is less than the second.
    LessThan = 3,
    /// The first operand is greater than or equal to the second.
    GreaterThanOrEqual = 4,
    /// The first operand is less than or equal to the second.
    LessThanOrEqual = 5,
    /// The first operand matches the pattern of the second.
    Like = 6,
    /// Logical negation of the operand.
    Not = 7,
    /// The first operand is between the second and the third.
    Between = 8,
    /// The first operand is equal to one of the remaining operands.
    InList = 9,
    /// Logical and of the two operands.
    And = 10,
    /// Logical or of the two operands.
    Or = 11,
    /// Cast the first operand to the type of the second.
    Cast = 12,
    /// The operand is a node in the given view.
    InView = 13,
    /// The event is of the given type or a subtype.
    OfType = 14,
    /// The operands are related as given.
    RelatedTo = 15,
    /// Bitwise and of the two operands.
    BitwiseAnd = 16,
    /// Bitwise or of the two operands.
    BitwiseOr = 17,
}

/// The type of deadband in a data change filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, UaEnum)]
#[repr(i32)]
pub enum DeadbandType {
    /// No deadband.
    #[default]
    None = 0,
    /// Absolute deadband.
    Absolute = 1,
    /// Percent of the EU range.
    Percent = 2,
}

/// What changes trigger a data change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, UaEnum)]
#[repr(i32)]
pub enum DataChangeTrigger {
    /// Report on status changes only.
    Status = 0,
    /// Report on status or value changes.
    #[default]
    StatusValue = 1,
    /// Report on status, value or timestamp changes.
    StatusValueTimestamp = 2,
}

bitflags::bitflags! {
    /// The write mask attribute bits, restricting which attributes the
    /// Write service may change.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct WriteMask: u32 {
        /// AccessLevel attribute is writable.
        const ACCESS_LEVEL = 1;
        /// ArrayDimensions attribute is writable.
        const ARRAY_DIMENSIONS = 1 << 1;
        /// BrowseName attribute is writable.
        const BROWSE_NAME = 1 << 2;
        /// ContainsNoLoops attribute is writable.
        const CONTAINS_NO_LOOPS = 1 << 3;
        /// DataType attribute is writable.
        const DATA_TYPE = 1 << 4;
        /// Description attribute is writable.
        const DESCRIPTION = 1 << 5;
        /// DisplayName attribute is writable.
        const DISPLAY_NAME = 1 << 6;
        /// EventNotifier attribute is writable.
        const EVENT_NOTIFIER = 1 << 7;
        /// Executable attribute is writable.
        const EXECUTABLE = 1 << 8;
        /// Historizing attribute is writable.
        const HISTORIZING = 1 << 9;
        /// InverseName attribute is writable.
        const INVERSE_NAME = 1 << 10;
        /// IsAbstract attribute is writable.
        const IS_ABSTRACT = 1 << 11;
        /// MinimumSamplingInterval attribute is writable.
        const MINIMUM_SAMPLING_INTERVAL = 1 << 12;
        /// NodeClass attribute is writable.
        const NODE_CLASS = 1 << 13;
        /// NodeId attribute is writable.
        const NODE_ID = 1 << 14;
        /// Symmetric attribute is writable.
        const SYMMETRIC = 1 << 15;
        /// UserAccessLevel attribute is writable.
        const USER_ACCESS_LEVEL = 1 << 16;
        /// UserExecutable attribute is writable.
        const USER_EXECUTABLE = 1 << 17;
        /// UserWriteMask attribute is writable.
        const USER_WRITE_MASK = 1 << 18;
        /// ValueRank attribute is writable.
        const VALUE_RANK = 1 << 19;
        /// WriteMask attribute is writable.
        const WRITE_MASK = 1 << 20;
        /// Value attribute is writable for variable types.
        const VALUE_FOR_VARIABLE_TYPE = 1 << 21;
    }
}

/// Value rank constants, see part 3.
pub mod value_rank {
    /// The value can be a scalar or an array of any dimensionality.
    pub const ANY: i32 = -2;
    /// The value must be a scalar.
    pub const SCALAR: i32 = -1;
    /// The value can be a scalar or a one dimensional array.
    pub const SCALAR_OR_ONE_DIMENSION: i32 = -3;
    /// The value must be an array of one or more dimensions.
    pub const ONE_OR_MORE_DIMENSIONS: i32 = 0;
    /// The value must be a one dimensional array.
    pub const ONE_DIMENSION: i32 = 1;
}
