// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! Contains the implementation of `DiagnosticInfo`.

use std::io::{Read, Write};

use crate::{
    encoding::{BinaryDecodable, BinaryEncodable, EncodingResult},
    read_i32, read_u8, write_i32, write_u8, Context, StatusCode, UAString,
};

/// Vendor specific diagnostic information attached to a response. All fields
/// are optional and flagged in an encoding mask byte.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct DiagnosticInfo {
    /// Index into the string table of the response header.
    pub symbolic_id: Option<i32>,
    /// Index into the string table for the namespace uri.
    pub namespace_uri: Option<i32>,
    /// Index into the string table for the locale.
    pub locale: Option<i32>,
    /// Index into the string table for the localized error text.
    pub localized_text: Option<i32>,
    /// Vendor specific additional info.
    pub additional_info: Option<UAString>,
    /// Status code of an inner operation.
    pub inner_status_code: Option<StatusCode>,
    /// Nested diagnostic info.
    pub inner_diagnostic_info: Option<Box<DiagnosticInfo>>,
}

mod mask {
    pub const SYMBOLIC_ID: u8 = 0x01;
    pub const NAMESPACE: u8 = 0x02;
    pub const LOCALIZED_TEXT: u8 = 0x04;
    pub const LOCALE: u8 = 0x08;
    pub const ADDITIONAL_INFO: u8 = 0x10;
    pub const INNER_STATUS_CODE: u8 = 0x20;
    pub const INNER_DIAGNOSTIC_INFO: u8 = 0x40;
}

impl BinaryEncodable for DiagnosticInfo {
    fn byte_len(&self, ctx: &Context<'_>) -> usize {
        let mut size = 1;
        if self.symbolic_id.is_some() {
            size += 4;
        }
        if self.namespace_uri.is_some() {
            size += 4;
        }
        if self.locale.is_some() {
            size += 4;
        }
        if self.localized_text.is_some() {
            size += 4;
        }
        if let Some(ref info) = self.additional_info {
            size += info.byte_len(ctx);
        }
        if self.inner_status_code.is_some() {
            size += 4;
        }
        if let Some(ref inner) = self.inner_diagnostic_info {
            size += inner.byte_len(ctx);
        }
        size
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S, ctx: &Context<'_>) -> EncodingResult<()> {
        let mut encoding_mask = 0u8;
        if self.symbolic_id.is_some() {
            encoding_mask |= mask::SYMBOLIC_ID;
        }
        if self.namespace_uri.is_some() {
            encoding_mask |= mask::NAMESPACE;
        }
        if self.localized_text.is_some() {
            encoding_mask |= mask::LOCALIZED_TEXT;
        }
        if self.locale.is_some() {
            encoding_mask |= mask::LOCALE;
        }
        if self.additional_info.is_some() {
            encoding_mask |= mask::ADDITIONAL_INFO;
        }
        if self.inner_status_code.is_some() {
            encoding_mask |= mask::INNER_STATUS_CODE;
        }
        if self.inner_diagnostic_info.is_some() {
            encoding_mask |= mask::INNER_DIAGNOSTIC_INFO;
        }
        write_u8(stream, encoding_mask)?;
        if let Some(v) = self.symbolic_id {
            write_i32(stream, v)?;
        }
        if let Some(v) = self.namespace_uri {
            write_i32(stream, v)?;
        }
        if let Some(v) = self.locale {
            write_i32(stream, v)?;
        }
        if let Some(v) = self.localized_text {
            write_i32(stream, v)?;
        }
        if let Some(ref v) = self.additional_info {
            v.encode(stream, ctx)?;
        }
        if let Some(v) = self.inner_status_code {
            v.encode(stream, ctx)?;
        }
        if let Some(ref v) = self.inner_diagnostic_info {
            v.encode(stream, ctx)?;
        }
        Ok(())
    }
}

impl BinaryDecodable for DiagnosticInfo {
    fn decode<S: Read + ?Sized>(stream: &mut S, ctx: &Context<'_>) -> EncodingResult<Self> {
        // Nested diagnostics could recurse deeply
        let _depth_lock = ctx.options().depth_lock()?;
        let encoding_mask = read_u8(stream)?;
        let mut diagnostic_info = DiagnosticInfo::default();
        if encoding_mask & mask::SYMBOLIC_ID != 0 {
            diagnostic_info.symbolic_id = Some(read_i32(stream)?);
        }
        if encoding_mask & mask::NAMESPACE != 0 {
            diagnostic_info.namespace_uri = Some(read_i32(stream)?);
        }
        if encoding_mask & mask::LOCALE != 0 {
            diagnostic_info.locale = Some(read_i32(stream)?);
        }
        if encoding_mask & mask::LOCALIZED_TEXT != 0 {
            diagnostic_info.localized_text = Some(read_i32(stream)?);
        }
        if encoding_mask & mask::ADDITIONAL_INFO != 0 {
            diagnostic_info.additional_info = Some(UAString::decode(stream, ctx)?);
        }
        if encoding_mask & mask::INNER_STATUS_CODE != 0 {
            diagnostic_info.inner_status_code = Some(StatusCode::decode(stream, ctx)?);
        }
        if encoding_mask & mask::INNER_DIAGNOSTIC_INFO != 0 {
            diagnostic_info.inner_diagnostic_info =
                Some(Box::new(DiagnosticInfo::decode(stream, ctx)?));
        }
        Ok(diagnostic_info)
    }
}

impl DiagnosticInfo {
    /// An empty diagnostic info, encoding to a single zero byte.
    pub fn null() -> DiagnosticInfo {
        DiagnosticInfo::default()
    }
}
