// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! The [`RequestMessage`] and [`ResponseMessage`] enums over every service
//! message the stack implements, and the [`Message`] trait the chunker uses
//! to encode and decode them.

use std::io::{Read, Write};

use uastack_types::{
    BinaryEncodable, Context, EncodingResult, Error, MessageInfo, NodeId, ObjectId,
    RequestHeader, ResponseHeader, ServiceFault, StatusCode,
};

use crate::comms::message_chunk::MessageChunkType;

/// Trait of messages that can be sent through the chunker: the request and
/// response enums.
pub trait Message: BinaryEncodable + std::fmt::Debug + Send + Sync {
    /// The request handle from the message header.
    fn request_handle(&self) -> u32;

    /// The node id of the message's binary encoding, prefixed to the body.
    fn type_id(&self) -> NodeId;

    /// Which kind of chunk carries the message.
    fn message_type(&self) -> MessageChunkType;

    /// Decode the message body matching the given object id.
    fn decode_by_object_id<S: Read + ?Sized>(
        stream: &mut S,
        object_id: ObjectId,
        ctx: &Context<'_>,
    ) -> EncodingResult<Self>
    where
        Self: Sized;
}

macro_rules! message_enum {
    (
        $(#[$enum_doc:meta])*
        pub enum $name:ident: $header:ty = $header_field:ident {
            $( $variant:ident: $ty:ty = $object_id:ident, )*
        }
    ) => {
        $(#[$enum_doc])*
        #[derive(Debug, PartialEq)]
        pub enum $name {
            $(
                #[doc = concat!("A ", stringify!($variant), " message.")]
                $variant(Box<$ty>),
            )*
        }

        $(
            impl From<$ty> for $name {
                fn from(value: $ty) -> Self {
                    Self::$variant(Box::new(value))
                }
            }
        )*

        impl BinaryEncodable for $name {
            fn byte_len(&self, ctx: &Context<'_>) -> usize {
                match self {
                    $( Self::$variant(value) => value.byte_len(ctx), )*
                }
            }

            fn encode<S: Write + ?Sized>(
                &self,
                stream: &mut S,
                ctx: &Context<'_>,
            ) -> EncodingResult<()> {
                match self {
                    $( Self::$variant(value) => value.encode(stream, ctx), )*
                }
            }
        }

        impl $name {
            /// The header of the message.
            pub fn header(&self) -> &$header {
                match self {
                    $( Self::$variant(value) => &value.$header_field, )*
                }
            }
        }

        impl Message for $name {
            fn request_handle(&self) -> u32 {
                self.header().request_handle
            }

            fn type_id(&self) -> NodeId {
                match self {
                    $( Self::$variant(value) => MessageInfo::type_id(value.as_ref()).into(), )*
                }
            }

            fn message_type(&self) -> MessageChunkType {
                match self {
                    Self::OpenSecureChannel(_) => MessageChunkType::OpenSecureChannel,
                    Self::CloseSecureChannel(_) => MessageChunkType::CloseSecureChannel,
                    _ => MessageChunkType::Message,
                }
            }

            fn decode_by_object_id<S: Read + ?Sized>(
                stream: &mut S,
                object_id: ObjectId,
                ctx: &Context<'_>,
            ) -> EncodingResult<Self> {
                match object_id {
                    $(
                        ObjectId::$object_id => {
                            Ok(Self::$variant(Box::new(
                                uastack_types::BinaryDecodable::decode(stream, ctx)?,
                            )))
                        }
                    )*
                    _ => Err(Error::new(
                        StatusCode::BadServiceUnsupported,
                        format!("decoding unsupported for object id {:?}", object_id),
                    )),
                }
            }
        }
    };
}

message_enum! {
    /// A service request, decoded from the chunks of a message.
    pub enum RequestMessage: RequestHeader = request_header {
        OpenSecureChannel: uastack_types::OpenSecureChannelRequest = OpenSecureChannelRequest_Encoding_DefaultBinary,
        CloseSecureChannel: uastack_types::CloseSecureChannelRequest = CloseSecureChannelRequest_Encoding_DefaultBinary,
        CreateSession: uastack_types::CreateSessionRequest = CreateSessionRequest_Encoding_DefaultBinary,
        ActivateSession: uastack_types::ActivateSessionRequest = ActivateSessionRequest_Encoding_DefaultBinary,
        CloseSession: uastack_types::CloseSessionRequest = CloseSessionRequest_Encoding_DefaultBinary,
        Cancel: uastack_types::CancelRequest = CancelRequest_Encoding_DefaultBinary,
        Read: uastack_types::ReadRequest = ReadRequest_Encoding_DefaultBinary,
        Write: uastack_types::WriteRequest = WriteRequest_Encoding_DefaultBinary,
        Call: uastack_types::CallRequest = CallRequest_Encoding_DefaultBinary,
        AddNodes: uastack_types::AddNodesRequest = AddNodesRequest_Encoding_DefaultBinary,
        AddReferences: uastack_types::AddReferencesRequest = AddReferencesRequest_Encoding_DefaultBinary,
        DeleteNodes: uastack_types::DeleteNodesRequest = DeleteNodesRequest_Encoding_DefaultBinary,
        DeleteReferences: uastack_types::DeleteReferencesRequest = DeleteReferencesRequest_Encoding_DefaultBinary,
        CreateSubscription: uastack_types::CreateSubscriptionRequest = CreateSubscriptionRequest_Encoding_DefaultBinary,
        SetPublishingMode: uastack_types::SetPublishingModeRequest = SetPublishingModeRequest_Encoding_DefaultBinary,
        DeleteSubscriptions: uastack_types::DeleteSubscriptionsRequest = DeleteSubscriptionsRequest_Encoding_DefaultBinary,
        CreateMonitoredItems: uastack_types::CreateMonitoredItemsRequest = CreateMonitoredItemsRequest_Encoding_DefaultBinary,
        DeleteMonitoredItems: uastack_types::DeleteMonitoredItemsRequest = DeleteMonitoredItemsRequest_Encoding_DefaultBinary,
        Publish: uastack_types::PublishRequest = PublishRequest_Encoding_DefaultBinary,
        Republish: uastack_types::RepublishRequest = RepublishRequest_Encoding_DefaultBinary,
    }
}

message_enum! {
    /// A service response, decoded from the chunks of a message.
    pub enum ResponseMessage: ResponseHeader = response_header {
        OpenSecureChannel: uastack_types::OpenSecureChannelResponse = OpenSecureChannelResponse_Encoding_DefaultBinary,
        CloseSecureChannel: uastack_types::CloseSecureChannelResponse = CloseSecureChannelResponse_Encoding_DefaultBinary,
        CreateSession: uastack_types::CreateSessionResponse = CreateSessionResponse_Encoding_DefaultBinary,
        ActivateSession: uastack_types::ActivateSessionResponse = ActivateSessionResponse_Encoding_DefaultBinary,
        CloseSession: uastack_types::CloseSessionResponse = CloseSessionResponse_Encoding_DefaultBinary,
        Cancel: uastack_types::CancelResponse = CancelResponse_Encoding_DefaultBinary,
        Read: uastack_types::ReadResponse = ReadResponse_Encoding_DefaultBinary,
        Write: uastack_types::WriteResponse = WriteResponse_Encoding_DefaultBinary,
        Call: uastack_types::CallResponse = CallResponse_Encoding_DefaultBinary,
        AddNodes: uastack_types::AddNodesResponse = AddNodesResponse_Encoding_DefaultBinary,
        AddReferences: uastack_types::AddReferencesResponse = AddReferencesResponse_Encoding_DefaultBinary,
        DeleteNodes: uastack_types::DeleteNodesResponse = DeleteNodesResponse_Encoding_DefaultBinary,
        DeleteReferences: uastack_types::DeleteReferencesResponse = DeleteReferencesResponse_Encoding_DefaultBinary,
        CreateSubscription: uastack_types::CreateSubscriptionResponse = CreateSubscriptionResponse_Encoding_DefaultBinary,
        SetPublishingMode: uastack_types::SetPublishingModeResponse = SetPublishingModeResponse_Encoding_DefaultBinary,
        DeleteSubscriptions: uastack_types::DeleteSubscriptionsResponse = DeleteSubscriptionsResponse_Encoding_DefaultBinary,
        CreateMonitoredItems: uastack_types::CreateMonitoredItemsResponse = CreateMonitoredItemsResponse_Encoding_DefaultBinary,
        DeleteMonitoredItems: uastack_types::DeleteMonitoredItemsResponse = DeleteMonitoredItemsResponse_Encoding_DefaultBinary,
        Publish: uastack_types::PublishResponse = PublishResponse_Encoding_DefaultBinary,
        Republish: uastack_types::RepublishResponse = RepublishResponse_Encoding_DefaultBinary,
        ServiceFault: uastack_types::ServiceFault = ServiceFault_Encoding_DefaultBinary,
    }
}

impl ResponseMessage {
    /// Create a service fault response for a request.
    pub fn service_fault(request_header: &RequestHeader, status: StatusCode) -> ResponseMessage {
        ServiceFault::new(request_header, status).into()
    }

    /// The service result of the response.
    pub fn service_result(&self) -> StatusCode {
        self.header().service_result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uastack_types::{CloseSessionRequest, ContextOwned};

    #[test]
    fn request_type_ids() {
        let request: RequestMessage = CloseSessionRequest {
            request_header: RequestHeader::dummy(),
            delete_subscriptions: true,
        }
        .into();
        assert_eq!(
            request.type_id(),
            NodeId::new(0, ObjectId::CloseSessionRequest_Encoding_DefaultBinary as u32)
        );
        assert_eq!(request.message_type(), MessageChunkType::Message);
        assert_eq!(request.request_handle(), 1);
    }

    #[test]
    fn decode_unknown_object_id_fails() {
        let ctx_owned = ContextOwned::new_default();
        let ctx = ctx_owned.context();
        let mut stream = std::io::Cursor::new(Vec::<u8>::new());
        let err = RequestMessage::decode_by_object_id(&mut stream, ObjectId::RootFolder, &ctx)
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BadServiceUnsupported);
    }
}
