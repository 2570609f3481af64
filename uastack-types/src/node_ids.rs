// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! Well-known node ids in namespace 0. Only the subset actually used by the
//! stack is listed; the values come from the OPC UA NodeIds table and are
//! protocol constants.

use crate::NodeId;

macro_rules! ua_node_id_enum {
    (
        $(#[$enum_doc:meta])*
        pub enum $name:ident {
            $( $(#[$doc:meta])* $variant:ident = $value:expr, )*
        }
    ) => {
        $(#[$enum_doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u32)]
        #[allow(missing_docs)]
        pub enum $name {
            $( $(#[$doc])* $variant = $value, )*
        }

        impl TryFrom<u32> for $name {
            type Error = ();
            fn try_from(value: u32) -> Result<Self, Self::Error> {
                match value {
                    $( $value => Ok(Self::$variant), )*
                    _ => Err(()),
                }
            }
        }

        impl From<$name> for NodeId {
            fn from(value: $name) -> Self {
                NodeId::new(0, value as u32)
            }
        }

        impl From<$name> for crate::ExpandedNodeId {
            fn from(value: $name) -> Self {
                crate::ExpandedNodeId::new(NodeId::from(value))
            }
        }
    };
}

ua_node_id_enum! {
    /// Well-known object ids, including the binary encoding ids of the
    /// service messages and extension object bodies.
    pub enum ObjectId {
        ModellingRule_Mandatory = 78,
        ModellingRule_Optional = 80,
        RootFolder = 84,
        ObjectsFolder = 85,
        TypesFolder = 86,
        ViewsFolder = 87,
        Server = 2253,
        Argument_Encoding_DefaultBinary = 298,
        AnonymousIdentityToken_Encoding_DefaultBinary = 321,
        UserNameIdentityToken_Encoding_DefaultBinary = 324,
        X509IdentityToken_Encoding_DefaultBinary = 327,
        IssuedIdentityToken_Encoding_DefaultBinary = 940,
        ObjectAttributes_Encoding_DefaultBinary = 354,
        VariableAttributes_Encoding_DefaultBinary = 357,
        MethodAttributes_Encoding_DefaultBinary = 360,
        ObjectTypeAttributes_Encoding_DefaultBinary = 363,
        VariableTypeAttributes_Encoding_DefaultBinary = 366,
        ReferenceTypeAttributes_Encoding_DefaultBinary = 369,
        DataTypeAttributes_Encoding_DefaultBinary = 372,
        ViewAttributes_Encoding_DefaultBinary = 375,
        ServiceFault_Encoding_DefaultBinary = 397,
        OpenSecureChannelRequest_Encoding_DefaultBinary = 446,
        OpenSecureChannelResponse_Encoding_DefaultBinary = 449,
        CloseSecureChannelRequest_Encoding_DefaultBinary = 452,
        CloseSecureChannelResponse_Encoding_DefaultBinary = 455,
        CreateSessionRequest_Encoding_DefaultBinary = 461,
        CreateSessionResponse_Encoding_DefaultBinary = 464,
        ActivateSessionRequest_Encoding_DefaultBinary = 467,
        ActivateSessionResponse_Encoding_DefaultBinary = 470,
        CloseSessionRequest_Encoding_DefaultBinary = 473,
        CloseSessionResponse_Encoding_DefaultBinary = 476,
        CancelRequest_Encoding_DefaultBinary = 479,
        CancelResponse_Encoding_DefaultBinary = 482,
        AddNodesRequest_Encoding_DefaultBinary = 488,
        AddNodesResponse_Encoding_DefaultBinary = 491,
        AddReferencesRequest_Encoding_DefaultBinary = 494,
        AddReferencesResponse_Encoding_DefaultBinary = 497,
        DeleteNodesRequest_Encoding_DefaultBinary = 500,
        DeleteNodesResponse_Encoding_DefaultBinary = 503,
        DeleteReferencesRequest_Encoding_DefaultBinary = 506,
        DeleteReferencesResponse_Encoding_DefaultBinary = 509,
        ContentFilterElement_Encoding_DefaultBinary = 585,
        ContentFilter_Encoding_DefaultBinary = 588,
        ElementOperand_Encoding_DefaultBinary = 594,
        LiteralOperand_Encoding_DefaultBinary = 597,
        AttributeOperand_Encoding_DefaultBinary = 600,
        SimpleAttributeOperand_Encoding_DefaultBinary = 603,
        ReadRequest_Encoding_DefaultBinary = 631,
        ReadResponse_Encoding_DefaultBinary = 634,
        WriteRequest_Encoding_DefaultBinary = 673,
        WriteResponse_Encoding_DefaultBinary = 676,
        CallRequest_Encoding_DefaultBinary = 712,
        CallResponse_Encoding_DefaultBinary = 715,
        DataChangeFilter_Encoding_DefaultBinary = 724,
        EventFilter_Encoding_DefaultBinary = 727,
        EventFilterResult_Encoding_DefaultBinary = 735,
        CreateMonitoredItemsRequest_Encoding_DefaultBinary = 751,
        CreateMonitoredItemsResponse_Encoding_DefaultBinary = 754,
        DeleteMonitoredItemsRequest_Encoding_DefaultBinary = 781,
        DeleteMonitoredItemsResponse_Encoding_DefaultBinary = 784,
        CreateSubscriptionRequest_Encoding_DefaultBinary = 787,
        CreateSubscriptionResponse_Encoding_DefaultBinary = 790,
        SetPublishingModeRequest_Encoding_DefaultBinary = 799,
        SetPublishingModeResponse_Encoding_DefaultBinary = 802,
        DataChangeNotification_Encoding_DefaultBinary = 811,
        StatusChangeNotification_Encoding_DefaultBinary = 820,
        PublishRequest_Encoding_DefaultBinary = 826,
        PublishResponse_Encoding_DefaultBinary = 829,
        RepublishRequest_Encoding_DefaultBinary = 832,
        RepublishResponse_Encoding_DefaultBinary = 835,
        DeleteSubscriptionsRequest_Encoding_DefaultBinary = 847,
        DeleteSubscriptionsResponse_Encoding_DefaultBinary = 850,
        EventNotificationList_Encoding_DefaultBinary = 916,
        NotificationMessage_Encoding_DefaultBinary = 805,
    }
}

ua_node_id_enum! {
    /// Well-known reference type ids.
    pub enum ReferenceTypeId {
        References = 31,
        NonHierarchicalReferences = 32,
        HierarchicalReferences = 33,
        HasChild = 34,
        Organizes = 35,
        HasEventSource = 36,
        HasModellingRule = 37,
        HasEncoding = 38,
        HasDescription = 39,
        HasTypeDefinition = 40,
        GeneratesEvent = 41,
        Aggregates = 44,
        HasSubtype = 45,
        HasProperty = 46,
        HasComponent = 47,
        HasNotifier = 48,
        HasOrderedComponent = 49,
    }
}

ua_node_id_enum! {
    /// Well-known data type ids.
    pub enum DataTypeId {
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
        XmlElement = 16,
        NodeId = 17,
        ExpandedNodeId = 18,
        StatusCode = 19,
        QualifiedName = 20,
        LocalizedText = 21,
        Structure = 22,
        DataValue = 23,
        BaseDataType = 24,
        DiagnosticInfo = 25,
        Number = 26,
        Integer = 27,
        UInteger = 28,
        Enumeration = 29,
        Duration = 290,
        UtcTime = 294,
        Argument = 296,
    }
}

ua_node_id_enum! {
    /// Well-known object type ids.
    pub enum ObjectTypeId {
        BaseObjectType = 58,
        FolderType = 61,
        BaseEventType = 2041,
        ModellingRuleType = 77,
    }
}

ua_node_id_enum! {
    /// Well-known variable type ids.
    pub enum VariableTypeId {
        BaseVariableType = 62,
        BaseDataVariableType = 63,
        PropertyType = 68,
    }
}

ua_node_id_enum! {
    /// Well-known variable ids.
    pub enum VariableId {
        Server_ServerArray = 2254,
        Server_NamespaceArray = 2255,
        Server_ServerStatus = 2256,
        Server_ServerStatus_StartTime = 2257,
        Server_ServerStatus_CurrentTime = 2258,
        Server_ServerStatus_State = 2259,
    }
}

#[test]
fn well_known_ids() {
    assert_eq!(ObjectId::try_from(84).unwrap(), ObjectId::RootFolder);
    assert!(ObjectId::try_from(123456).is_err());
    assert_eq!(
        NodeId::from(ReferenceTypeId::Organizes),
        NodeId::new(0, 35u32)
    );
}
