// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! Contains the implementation of `Variant`.

use std::io::{Read, Write};

use crate::{
    encoding::{BinaryDecodable, BinaryEncodable, EncodingResult},
    read_i32, read_u8, write_i32, write_u8, ByteString, Context, DataTypeId, DataValue, DateTime,
    DiagnosticInfo, Error, ExpandedNodeId, ExtensionObject, Guid, LocalizedText, NodeId,
    QualifiedName, StatusCode, UAString,
};

/// The type id of a scalar variant value, doubling as the binary encoding
/// byte of the variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum VariantScalarTypeId {
    Boolean = 1,
    SByte = 2,
    Byte = 3,
    Int16 = 4,
    UInt16 = 5,
    Int32 = 6,
    UInt32 = 7,
    Int64 = 8,
    UInt64 = 9,
    Float = 10,
    Double = 11,
    String = 12,
    DateTime = 13,
    Guid = 14,
    ByteString = 15,
    NodeId = 17,
    ExpandedNodeId = 18,
    StatusCode = 19,
    QualifiedName = 20,
    LocalizedText = 21,
    ExtensionObject = 22,
    DataValue = 23,
    Variant = 24,
    DiagnosticInfo = 25,
}

impl VariantScalarTypeId {
    /// Try to convert from the encoding byte, sans flag bits.
    pub fn try_from_encoding(value: u8) -> Result<Self, Error> {
        Ok(match value {
            1 => Self::Boolean,
            2 => Self::SByte,
            3 => Self::Byte,
            4 => Self::Int16,
            5 => Self::UInt16,
            6 => Self::Int32,
            7 => Self::UInt32,
            8 => Self::Int64,
            9 => Self::UInt64,
            10 => Self::Float,
            11 => Self::Double,
            12 => Self::String,
            13 => Self::DateTime,
            14 => Self::Guid,
            15 => Self::ByteString,
            17 => Self::NodeId,
            18 => Self::ExpandedNodeId,
            19 => Self::StatusCode,
            20 => Self::QualifiedName,
            21 => Self::LocalizedText,
            22 => Self::ExtensionObject,
            23 => Self::DataValue,
            24 => Self::Variant,
            25 => Self::DiagnosticInfo,
            r => {
                return Err(Error::decoding(format!(
                    "Unrecognized variant type id {r}"
                )))
            }
        })
    }

    /// The data type node id corresponding to this scalar type.
    pub fn data_type_id(&self) -> DataTypeId {
        match self {
            Self::Boolean => DataTypeId::Boolean,
            Self::SByte => DataTypeId::SByte,
            Self::Byte => DataTypeId::Byte,
            Self::Int16 => DataTypeId::Int16,
            Self::UInt16 => DataTypeId::UInt16,
            Self::Int32 => DataTypeId::Int32,
            Self::UInt32 => DataTypeId::UInt32,
            Self::Int64 => DataTypeId::Int64,
            Self::UInt64 => DataTypeId::UInt64,
            Self::Float => DataTypeId::Float,
            Self::Double => DataTypeId::Double,
            Self::String => DataTypeId::String,
            Self::DateTime => DataTypeId::DateTime,
            Self::Guid => DataTypeId::Guid,
            Self::ByteString => DataTypeId::ByteString,
            Self::NodeId => DataTypeId::NodeId,
            Self::ExpandedNodeId => DataTypeId::ExpandedNodeId,
            Self::StatusCode => DataTypeId::StatusCode,
            Self::QualifiedName => DataTypeId::QualifiedName,
            Self::LocalizedText => DataTypeId::LocalizedText,
            Self::ExtensionObject => DataTypeId::Structure,
            Self::DataValue => DataTypeId::DataValue,
            Self::Variant => DataTypeId::BaseDataType,
            Self::DiagnosticInfo => DataTypeId::DiagnosticInfo,
        }
    }

    /// `true` if this is a fixed-size numeric type, usable on the PubSub
    /// realtime path.
    pub fn is_fixed_size(&self) -> bool {
        matches!(
            self,
            Self::Boolean
                | Self::SByte
                | Self::Byte
                | Self::Int16
                | Self::UInt16
                | Self::Int32
                | Self::UInt32
                | Self::Int64
                | Self::UInt64
                | Self::Float
                | Self::Double
                | Self::DateTime
                | Self::StatusCode
        )
    }
}

/// The full type of a variant: empty, a scalar, or an array with optional
/// dimensions.
#[derive(Debug, Clone, PartialEq)]
pub enum VariantTypeId {
    /// The empty variant.
    Empty,
    /// A scalar value.
    Scalar(VariantScalarTypeId),
    /// An array with optional dimensions.
    Array(VariantScalarTypeId, Option<Vec<u32>>),
}

/// An array of variant values, all of the same scalar type. Multi
/// dimensional arrays set `dimensions`; the product of the dimensions must
/// equal the number of values.
#[derive(Debug, Clone, PartialEq)]
pub struct Array {
    /// The scalar type of every element.
    pub value_type: VariantScalarTypeId,
    /// The elements, flattened in row-major order.
    pub values: Vec<Variant>,
    /// Array dimensions, `None` for a one dimensional array.
    pub dimensions: Option<Vec<u32>>,
}

impl Array {
    /// Create a one dimensional array, checking element types.
    pub fn new(
        value_type: VariantScalarTypeId,
        values: impl Into<Vec<Variant>>,
    ) -> Result<Self, Error> {
        let values = values.into();
        Self::validate(value_type, &values, None)?;
        Ok(Self {
            value_type,
            values,
            dimensions: None,
        })
    }

    /// Create a multi dimensional array, checking element types and that the
    /// dimensions match the element count.
    pub fn new_multi(
        value_type: VariantScalarTypeId,
        values: impl Into<Vec<Variant>>,
        dimensions: Vec<u32>,
    ) -> Result<Self, Error> {
        let values = values.into();
        Self::validate(value_type, &values, Some(&dimensions))?;
        Ok(Self {
            value_type,
            values,
            dimensions: Some(dimensions),
        })
    }

    fn validate(
        value_type: VariantScalarTypeId,
        values: &[Variant],
        dimensions: Option<&Vec<u32>>,
    ) -> Result<(), Error> {
        if values
            .iter()
            .any(|v| v.scalar_type_id() != Some(value_type))
        {
            return Err(Error::new(
                StatusCode::BadInvalidArgument,
                "Array elements are not all of the declared type",
            ));
        }
        if let Some(dimensions) = dimensions {
            let expected: u64 = dimensions.iter().map(|d| *d as u64).product();
            if expected != values.len() as u64 {
                return Err(Error::new(
                    StatusCode::BadInvalidArgument,
                    format!(
                        "Array dimensions product {} does not match element count {}",
                        expected,
                        values.len()
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// `true` if the array has no elements.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A `Variant` holds built-in OPC UA data types, including single and multi dimensional arrays.
///
/// As variants may be passed around a lot on the stack, Boxes are used for more complex types to
/// keep the size of this type down a bit, especially when used in arrays.
#[derive(PartialEq, Debug, Clone, Default)]
pub enum Variant {
    /// Empty type has no value. It is equivalent to a Null value (part 6 5.1.6)
    #[default]
    Empty,
    /// Boolean
    Boolean(bool),
    /// Signed byte
    SByte(i8),
    /// Unsigned byte
    Byte(u8),
    /// Signed 16-bit int
    Int16(i16),
    /// Unsigned 16-bit int
    UInt16(u16),
    /// Signed 32-bit int
    Int32(i32),
    /// Unsigned 32-bit int
    UInt32(u32),
    /// Signed 64-bit int
    Int64(i64),
    /// Unsigned 64-bit int
    UInt64(u64),
    /// Float
    Float(f32),
    /// Double
    Double(f64),
    /// String
    String(UAString),
    /// DateTime
    DateTime(Box<DateTime>),
    /// Guid
    Guid(Box<Guid>),
    /// StatusCode
    StatusCode(StatusCode),
    /// ByteString
    ByteString(ByteString),
    /// QualifiedName
    QualifiedName(Box<QualifiedName>),
    /// LocalizedText
    LocalizedText(Box<LocalizedText>),
    /// NodeId
    NodeId(Box<NodeId>),
    /// ExpandedNodeId
    ExpandedNodeId(Box<ExpandedNodeId>),
    /// ExtensionObject
    ExtensionObject(ExtensionObject),
    /// DataValue
    DataValue(Box<DataValue>),
    /// Variant containing a nested variant.
    Variant(Box<Variant>),
    /// DiagnosticInfo
    DiagnosticInfo(Box<DiagnosticInfo>),
    /// Single dimension array which can contain any scalar type, all the same type.
    /// To represent matrices, set the `dimensions` field on the `Array`.
    Array(Box<Array>),
}

const ARRAY_VALUES_BIT: u8 = 1 << 7;
const ARRAY_DIMENSIONS_BIT: u8 = 1 << 6;

macro_rules! from_impls {
    ($(($t:ty, $variant:ident)),* $(,)?) => {
        $(
            impl From<$t> for Variant {
                fn from(value: $t) -> Self {
                    Variant::$variant(value)
                }
            }
        )*
    };
}

from_impls!(
    (bool, Boolean),
    (i8, SByte),
    (u8, Byte),
    (i16, Int16),
    (u16, UInt16),
    (i32, Int32),
    (u32, UInt32),
    (i64, Int64),
    (u64, UInt64),
    (f32, Float),
    (f64, Double),
    (UAString, String),
    (StatusCode, StatusCode),
    (ByteString, ByteString),
    (ExtensionObject, ExtensionObject),
);

macro_rules! from_boxed_impls {
    ($(($t:ty, $variant:ident)),* $(,)?) => {
        $(
            impl From<$t> for Variant {
                fn from(value: $t) -> Self {
                    Variant::$variant(Box::new(value))
                }
            }
        )*
    };
}

// DataValue deliberately has no From impl: DataValue itself converts from
// anything Into<Variant>, which would collide with a reflexive conversion.
from_boxed_impls!(
    (DateTime, DateTime),
    (Guid, Guid),
    (QualifiedName, QualifiedName),
    (LocalizedText, LocalizedText),
    (NodeId, NodeId),
    (ExpandedNodeId, ExpandedNodeId),
    (DiagnosticInfo, DiagnosticInfo),
);

impl<'a> From<&'a str> for Variant {
    fn from(value: &'a str) -> Self {
        Variant::String(value.into())
    }
}

impl From<String> for Variant {
    fn from(value: String) -> Self {
        Variant::String(value.into())
    }
}

impl From<Array> for Variant {
    fn from(value: Array) -> Self {
        Variant::Array(Box::new(value))
    }
}

impl Variant {
    /// The scalar type id of this variant, the element type for arrays.
    pub fn scalar_type_id(&self) -> Option<VariantScalarTypeId> {
        match self {
            Variant::Empty => None,
            Variant::Boolean(_) => Some(VariantScalarTypeId::Boolean),
            Variant::SByte(_) => Some(VariantScalarTypeId::SByte),
            Variant::Byte(_) => Some(VariantScalarTypeId::Byte),
            Variant::Int16(_) => Some(VariantScalarTypeId::Int16),
            Variant::UInt16(_) => Some(VariantScalarTypeId::UInt16),
            Variant::Int32(_) => Some(VariantScalarTypeId::Int32),
            Variant::UInt32(_) => Some(VariantScalarTypeId::UInt32),
            Variant::Int64(_) => Some(VariantScalarTypeId::Int64),
            Variant::UInt64(_) => Some(VariantScalarTypeId::UInt64),
            Variant::Float(_) => Some(VariantScalarTypeId::Float),
            Variant::Double(_) => Some(VariantScalarTypeId::Double),
            Variant::String(_) => Some(VariantScalarTypeId::String),
            Variant::DateTime(_) => Some(VariantScalarTypeId::DateTime),
            Variant::Guid(_) => Some(VariantScalarTypeId::Guid),
            Variant::StatusCode(_) => Some(VariantScalarTypeId::StatusCode),
            Variant::ByteString(_) => Some(VariantScalarTypeId::ByteString),
            Variant::QualifiedName(_) => Some(VariantScalarTypeId::QualifiedName),
            Variant::LocalizedText(_) => Some(VariantScalarTypeId::LocalizedText),
            Variant::NodeId(_) => Some(VariantScalarTypeId::NodeId),
            Variant::ExpandedNodeId(_) => Some(VariantScalarTypeId::ExpandedNodeId),
            Variant::ExtensionObject(_) => Some(VariantScalarTypeId::ExtensionObject),
            Variant::DataValue(_) => Some(VariantScalarTypeId::DataValue),
            Variant::Variant(_) => Some(VariantScalarTypeId::Variant),
            Variant::DiagnosticInfo(_) => Some(VariantScalarTypeId::DiagnosticInfo),
            Variant::Array(a) => Some(a.value_type),
        }
    }

    /// The full type of this variant. An array of length 1 is distinct from
    /// a scalar.
    pub fn type_id(&self) -> VariantTypeId {
        match self {
            Variant::Array(a) => VariantTypeId::Array(a.value_type, a.dimensions.clone()),
            v => v
                .scalar_type_id()
                .map(VariantTypeId::Scalar)
                .unwrap_or(VariantTypeId::Empty),
        }
    }

    /// Test if the variant is empty (null).
    pub fn is_empty(&self) -> bool {
        matches!(self, Variant::Empty)
    }

    /// Test if the variant is an array.
    pub fn is_array(&self) -> bool {
        matches!(self, Variant::Array(_))
    }

    /// The data type node id of the value, if it has one.
    pub fn data_type(&self) -> Option<NodeId> {
        self.scalar_type_id().map(|t| t.data_type_id().into())
    }

    /// Apply a one-dimensional numeric range to this value, returning the
    /// sub-array or substring. Only meaningful for arrays, strings and
    /// byte strings.
    pub fn range_of(&self, min: usize, max: usize) -> Result<Variant, StatusCode> {
        match self {
            Variant::String(s) => s
                .substring(min, max)
                .map(Variant::String)
                .map_err(|_| StatusCode::BadIndexRangeNoData),
            Variant::ByteString(s) => s
                .substring(min, max)
                .map(Variant::ByteString)
                .map_err(|_| StatusCode::BadIndexRangeNoData),
            Variant::Array(a) => {
                if min >= a.values.len() {
                    return Err(StatusCode::BadIndexRangeNoData);
                }
                let max = max.min(a.values.len() - 1);
                let values = a.values[min..=max].to_vec();
                Ok(Variant::Array(Box::new(Array {
                    value_type: a.value_type,
                    values,
                    dimensions: None,
                })))
            }
            _ => Err(StatusCode::BadIndexRangeNoData),
        }
    }

    // Encode the value of this variant, without the type byte.
    fn encode_value<S: Write + ?Sized>(
        &self,
        stream: &mut S,
        ctx: &Context<'_>,
    ) -> EncodingResult<()> {
        match self {
            Variant::Empty => Ok(()),
            Variant::Boolean(v) => v.encode(stream, ctx),
            Variant::SByte(v) => v.encode(stream, ctx),
            Variant::Byte(v) => v.encode(stream, ctx),
            Variant::Int16(v) => v.encode(stream, ctx),
            Variant::UInt16(v) => v.encode(stream, ctx),
            Variant::Int32(v) => v.encode(stream, ctx),
            Variant::UInt32(v) => v.encode(stream, ctx),
            Variant::Int64(v) => v.encode(stream, ctx),
            Variant::UInt64(v) => v.encode(stream, ctx),
            Variant::Float(v) => v.encode(stream, ctx),
            Variant::Double(v) => v.encode(stream, ctx),
            Variant::String(v) => v.encode(stream, ctx),
            Variant::DateTime(v) => v.encode(stream, ctx),
            Variant::Guid(v) => v.encode(stream, ctx),
            Variant::StatusCode(v) => v.encode(stream, ctx),
            Variant::ByteString(v) => v.encode(stream, ctx),
            Variant::QualifiedName(v) => v.encode(stream, ctx),
            Variant::LocalizedText(v) => v.encode(stream, ctx),
            Variant::NodeId(v) => v.encode(stream, ctx),
            Variant::ExpandedNodeId(v) => v.encode(stream, ctx),
            Variant::ExtensionObject(v) => v.encode(stream, ctx),
            Variant::DataValue(v) => v.encode(stream, ctx),
            Variant::Variant(v) => v.encode(stream, ctx),
            Variant::DiagnosticInfo(v) => v.encode(stream, ctx),
            Variant::Array(_) => Err(Error::encoding(
                "Array variant value must be encoded via encode()",
            )),
        }
    }

    fn value_byte_len(&self, ctx: &Context<'_>) -> usize {
        match self {
            Variant::Empty => 0,
            Variant::Boolean(v) => v.byte_len(ctx),
            Variant::SByte(v) => v.byte_len(ctx),
            Variant::Byte(v) => v.byte_len(ctx),
            Variant::Int16(v) => v.byte_len(ctx),
            Variant::UInt16(v) => v.byte_len(ctx),
            Variant::Int32(v) => v.byte_len(ctx),
            Variant::UInt32(v) => v.byte_len(ctx),
            Variant::Int64(v) => v.byte_len(ctx),
            Variant::UInt64(v) => v.byte_len(ctx),
            Variant::Float(v) => v.byte_len(ctx),
            Variant::Double(v) => v.byte_len(ctx),
            Variant::String(v) => v.byte_len(ctx),
            Variant::DateTime(v) => v.byte_len(ctx),
            Variant::Guid(v) => v.byte_len(ctx),
            Variant::StatusCode(v) => v.byte_len(ctx),
            Variant::ByteString(v) => v.byte_len(ctx),
            Variant::QualifiedName(v) => v.byte_len(ctx),
            Variant::LocalizedText(v) => v.byte_len(ctx),
            Variant::NodeId(v) => v.byte_len(ctx),
            Variant::ExpandedNodeId(v) => v.byte_len(ctx),
            Variant::ExtensionObject(v) => v.byte_len(ctx),
            Variant::DataValue(v) => v.byte_len(ctx),
            Variant::Variant(v) => v.byte_len(ctx),
            Variant::DiagnosticInfo(v) => v.byte_len(ctx),
            Variant::Array(a) => {
                let mut size = 4;
                size += a
                    .values
                    .iter()
                    .map(|v| v.value_byte_len(ctx))
                    .sum::<usize>();
                if let Some(ref dimensions) = a.dimensions {
                    size += 4 + dimensions.len() * 4;
                }
                size
            }
        }
    }

    // Decode a single value of the given scalar type, without a type byte.
    fn decode_value<S: Read + ?Sized>(
        type_id: VariantScalarTypeId,
        stream: &mut S,
        ctx: &Context<'_>,
    ) -> EncodingResult<Variant> {
        Ok(match type_id {
            VariantScalarTypeId::Boolean => Variant::Boolean(bool::decode(stream, ctx)?),
            VariantScalarTypeId::SByte => Variant::SByte(i8::decode(stream, ctx)?),
            VariantScalarTypeId::Byte => Variant::Byte(u8::decode(stream, ctx)?),
            VariantScalarTypeId::Int16 => Variant::Int16(i16::decode(stream, ctx)?),
            VariantScalarTypeId::UInt16 => Variant::UInt16(u16::decode(stream, ctx)?),
            VariantScalarTypeId::Int32 => Variant::Int32(i32::decode(stream, ctx)?),
            VariantScalarTypeId::UInt32 => Variant::UInt32(u32::decode(stream, ctx)?),
            VariantScalarTypeId::Int64 => Variant::Int64(i64::decode(stream, ctx)?),
            VariantScalarTypeId::UInt64 => Variant::UInt64(u64::decode(stream, ctx)?),
            VariantScalarTypeId::Float => Variant::Float(f32::decode(stream, ctx)?),
            VariantScalarTypeId::Double => Variant::Double(f64::decode(stream, ctx)?),
            VariantScalarTypeId::String => Variant::String(UAString::decode(stream, ctx)?),
            VariantScalarTypeId::DateTime => {
                Variant::DateTime(Box::new(DateTime::decode(stream, ctx)?))
            }
            VariantScalarTypeId::Guid => Variant::Guid(Box::new(Guid::decode(stream, ctx)?)),
            VariantScalarTypeId::StatusCode => {
                Variant::StatusCode(StatusCode::decode(stream, ctx)?)
            }
            VariantScalarTypeId::ByteString => {
                Variant::ByteString(ByteString::decode(stream, ctx)?)
            }
            VariantScalarTypeId::QualifiedName => {
                Variant::QualifiedName(Box::new(QualifiedName::decode(stream, ctx)?))
            }
            VariantScalarTypeId::LocalizedText => {
                Variant::LocalizedText(Box::new(LocalizedText::decode(stream, ctx)?))
            }
            VariantScalarTypeId::NodeId => Variant::NodeId(Box::new(NodeId::decode(stream, ctx)?)),
            VariantScalarTypeId::ExpandedNodeId => {
                Variant::ExpandedNodeId(Box::new(ExpandedNodeId::decode(stream, ctx)?))
            }
            VariantScalarTypeId::ExtensionObject => {
                Variant::ExtensionObject(ExtensionObject::decode(stream, ctx)?)
            }
            VariantScalarTypeId::DataValue => {
                Variant::DataValue(Box::new(DataValue::decode(stream, ctx)?))
            }
            VariantScalarTypeId::Variant => {
                Variant::Variant(Box::new(Variant::decode(stream, ctx)?))
            }
            VariantScalarTypeId::DiagnosticInfo => {
                Variant::DiagnosticInfo(Box::new(DiagnosticInfo::decode(stream, ctx)?))
            }
        })
    }
}

impl BinaryEncodable for Variant {
    fn byte_len(&self, ctx: &Context<'_>) -> usize {
        // Encoding byte + value
        1 + self.value_byte_len(ctx)
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S, ctx: &Context<'_>) -> EncodingResult<()> {
        match self {
            Variant::Empty => write_u8(stream, 0u8),
            Variant::Array(a) => {
                let mut encoding_mask = a.value_type as u8 | ARRAY_VALUES_BIT;
                if a.dimensions.is_some() {
                    encoding_mask |= ARRAY_DIMENSIONS_BIT;
                }
                write_u8(stream, encoding_mask)?;
                write_i32(stream, a.values.len() as i32)?;
                for value in &a.values {
                    value.encode_value(stream, ctx)?;
                }
                if let Some(ref dimensions) = a.dimensions {
                    write_i32(stream, dimensions.len() as i32)?;
                    for d in dimensions {
                        d.encode(stream, ctx)?;
                    }
                }
                Ok(())
            }
            v => {
                let Some(type_id) = v.scalar_type_id() else {
                    return write_u8(stream, 0u8);
                };
                write_u8(stream, type_id as u8)?;
                v.encode_value(stream, ctx)
            }
        }
    }
}

impl BinaryDecodable for Variant {
    fn decode<S: Read + ?Sized>(stream: &mut S, ctx: &Context<'_>) -> EncodingResult<Self> {
        // Nested variants could recurse deeply
        let _depth_lock = ctx.options().depth_lock()?;

        let encoding_mask = read_u8(stream)?;
        if encoding_mask == 0 {
            return Ok(Variant::Empty);
        }
        let type_id = VariantScalarTypeId::try_from_encoding(
            encoding_mask & !(ARRAY_VALUES_BIT | ARRAY_DIMENSIONS_BIT),
        )?;

        if encoding_mask & ARRAY_VALUES_BIT == 0 {
            return Variant::decode_value(type_id, stream, ctx);
        }

        let len = read_i32(stream)?;
        if len < -1 {
            return Err(Error::decoding(format!("Invalid array length {len}")));
        }
        if len == -1 {
            return Ok(Variant::Empty);
        }
        if len as usize > ctx.options().max_array_length {
            return Err(Error::decoding(format!(
                "Array length {} exceeds decoding limit {}",
                len,
                ctx.options().max_array_length
            )));
        }
        let mut values = Vec::with_capacity(len as usize);
        for _ in 0..len {
            values.push(Variant::decode_value(type_id, stream, ctx)?);
        }
        let dimensions = if encoding_mask & ARRAY_DIMENSIONS_BIT != 0 {
            <Option<Vec<u32>>>::decode(stream, ctx)?
        } else {
            None
        };
        if let Some(ref dimensions) = dimensions {
            let expected: u64 = dimensions.iter().map(|d| *d as u64).product();
            if expected != values.len() as u64 {
                return Err(Error::decoding(format!(
                    "Array dimensions product {} does not match array length {}",
                    expected,
                    values.len()
                )));
            }
        }
        Ok(Variant::Array(Box::new(Array {
            value_type: type_id,
            values,
            dimensions,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ContextOwned;
    use std::io::Cursor;

    fn round_trip(v: &Variant) {
        let ctx_owned = ContextOwned::new_default();
        let ctx = ctx_owned.context();
        let bytes = v.encode_to_vec(&ctx);
        assert_eq!(bytes.len(), v.byte_len(&ctx), "byte_len mismatch for {v:?}");
        let decoded = Variant::decode(&mut Cursor::new(bytes), &ctx).unwrap();
        assert_eq!(&decoded, v);
    }

    #[test]
    fn scalar_round_trips() {
        round_trip(&Variant::Empty);
        round_trip(&Variant::Boolean(true));
        round_trip(&Variant::Int32(-42));
        round_trip(&Variant::UInt64(u64::MAX));
        round_trip(&Variant::Double(1.5));
        round_trip(&Variant::from("hello"));
        round_trip(&Variant::from(DateTime::now()));
        round_trip(&Variant::from(NodeId::new(1, "borehole")));
        round_trip(&Variant::from(LocalizedText::new("en", "hi")));
        round_trip(&Variant::StatusCode(StatusCode::BadTypeMismatch));
        round_trip(&Variant::Variant(Box::new(Variant::Int32(5))));
    }

    #[test]
    fn array_round_trips() {
        let arr = Array::new(
            VariantScalarTypeId::Int32,
            vec![Variant::Int32(1), Variant::Int32(2), Variant::Int32(3)],
        )
        .unwrap();
        round_trip(&Variant::from(arr));

        let matrix = Array::new_multi(
            VariantScalarTypeId::Byte,
            (0u8..6).map(Variant::Byte).collect::<Vec<_>>(),
            vec![2, 3],
        )
        .unwrap();
        round_trip(&Variant::from(matrix));
    }

    #[test]
    fn single_element_array_is_not_scalar() {
        let arr = Variant::from(Array::new(VariantScalarTypeId::Int32, vec![Variant::Int32(1)]).unwrap());
        assert_ne!(arr, Variant::Int32(1));
        assert!(arr.is_array());
        assert_eq!(arr.scalar_type_id(), Some(VariantScalarTypeId::Int32));
    }

    #[test]
    fn mismatched_array_type_rejected() {
        assert!(Array::new(
            VariantScalarTypeId::Int32,
            vec![Variant::Int32(1), Variant::Byte(2)]
        )
        .is_err());
        assert!(Array::new_multi(
            VariantScalarTypeId::Int32,
            vec![Variant::Int32(1)],
            vec![2, 2]
        )
        .is_err());
    }
}
