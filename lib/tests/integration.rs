// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! End to end tests driving a server through a real client connection.

use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

use uastack::client::{Client, ClientConfig};
use uastack::server::{Server, ServerConfig, ServerHandle};
use uastack::types::*;

static NEXT_PORT: AtomicU16 = AtomicU16::new(4855);

async fn start_server() -> (ServerHandle, String) {
    let port = NEXT_PORT.fetch_add(1, Ordering::Relaxed);
    let config = ServerConfig {
        port,
        ..Default::default()
    };
    let url = config.base_endpoint_url();
    let server = Server::new(config);
    let handle = server.handle();
    {
        let mut state = handle.state().lock();
        state.add_namespace("urn:uastack:test");
    }
    tokio::spawn(server.run());
    // Give the listener a moment to come up
    tokio::time::sleep(Duration::from_millis(50)).await;
    (handle, url)
}

async fn connect(url: &str) -> uastack::client::Session {
    let client = Client::new(ClientConfig::default());
    client.connect_to_endpoint(url).await.unwrap()
}

fn add_the_answer_request(session_header: RequestHeader) -> AddNodesRequest {
    let ctx_owned = ContextOwned::new_default();
    let ctx = ctx_owned.context();
    let attributes = VariableAttributes {
        specified_attributes: (AttributesMask::VALUE
            | AttributesMask::DATA_TYPE
            | AttributesMask::ACCESS_LEVEL
            | AttributesMask::USER_ACCESS_LEVEL)
            .bits(),
        value: Variant::Int32(42),
        data_type: DataTypeId::Int32.into(),
        access_level: 0x3,
        user_access_level: 0x3,
        ..Default::default()
    };
    AddNodesRequest {
        request_header: session_header,
        nodes_to_add: Some(vec![AddNodesItem {
            parent_node_id: ExpandedNodeId::new(NodeId::from(ObjectId::ObjectsFolder)),
            reference_type_id: ReferenceTypeId::Organizes.into(),
            requested_new_node_id: ExpandedNodeId::new(NodeId::new(1, "the.answer")),
            browse_name: QualifiedName::new(1, "the answer"),
            node_class: NodeClass::Variable,
            node_attributes: ExtensionObject::from_message(&attributes, &ctx),
            type_definition: ExpandedNodeId::new(NodeId::from(
                VariableTypeId::BaseDataVariableType,
            )),
        }]),
    }
}

#[tokio::test]
async fn read_current_time() {
    let (handle, url) = start_server().await;
    let session = connect(&url).await;

    let results = session
        .read(
            vec![ReadValueId::value_of(NodeId::from(
                VariableId::Server_ServerStatus_CurrentTime,
            ))],
            TimestampsToReturn::Both,
            0.0,
        )
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    let value = &results[0];
    assert_eq!(value.status(), StatusCode::Good);
    assert!(value.server_timestamp.is_some());
    assert!(matches!(value.value, Some(Variant::DateTime(_))));

    session.disconnect().await.unwrap();
    handle.shutdown();
}

#[tokio::test]
async fn add_and_read_variable() {
    let (handle, url) = start_server().await;
    let session = connect(&url).await;

    // Add ns=1;s=the.answer under the objects folder
    let request = add_the_answer_request(session.make_request_header());
    let response = session.send(request.into()).await.unwrap();
    let uastack::core::ResponseMessage::AddNodes(response) = response else {
        panic!("Wrong response type");
    };
    let results = response.results.unwrap();
    assert_eq!(results[0].status_code, StatusCode::Good);
    assert_eq!(results[0].added_node_id, NodeId::new(1, "the.answer"));

    // Read back value and metadata
    let node_id = NodeId::new(1, "the.answer");
    let read_of = |attribute: AttributeId| ReadValueId {
        node_id: node_id.clone(),
        attribute_id: attribute as u32,
        ..Default::default()
    };
    let results = session
        .read(
            vec![
                read_of(AttributeId::Value),
                read_of(AttributeId::BrowseName),
                read_of(AttributeId::DisplayName),
                read_of(AttributeId::ValueRank),
            ],
            TimestampsToReturn::Both,
            0.0,
        )
        .await
        .unwrap();

    assert_eq!(results[0].value, Some(Variant::Int32(42)));
    assert_eq!(
        results[1].value,
        Some(Variant::from(QualifiedName::new(1, "the answer")))
    );
    assert_eq!(
        results[2].value,
        Some(Variant::from(LocalizedText::from("the answer")))
    );
    // Value rank defaults to Any
    assert_eq!(results[3].value, Some(Variant::Int32(-2)));

    session.disconnect().await.unwrap();
    handle.shutdown();
}

#[tokio::test]
async fn write_with_mismatched_type_rejected() {
    let (handle, url) = start_server().await;
    let session = connect(&url).await;

    let response = session
        .send(add_the_answer_request(session.make_request_header()).into())
        .await
        .unwrap();
    let uastack::core::ResponseMessage::AddNodes(_) = response else {
        panic!("Wrong response type");
    };

    let node_id = NodeId::new(1, "the.answer");
    // The node is Int32; writing a string must fail with BadTypeMismatch
    let results = session
        .write(vec![WriteValue {
            node_id: node_id.clone(),
            attribute_id: AttributeId::Value as u32,
            index_range: UAString::null(),
            value: DataValue::from(Variant::from("foo")),
        }])
        .await
        .unwrap();
    assert_eq!(results, vec![StatusCode::BadTypeMismatch]);

    // The value is unchanged
    let read = session
        .read(
            vec![ReadValueId::value_of(node_id.clone())],
            TimestampsToReturn::Both,
            0.0,
        )
        .await
        .unwrap();
    assert_eq!(read[0].value, Some(Variant::Int32(42)));

    // A compatible write passes
    let results = session
        .write(vec![WriteValue {
            node_id,
            attribute_id: AttributeId::Value as u32,
            index_range: UAString::null(),
            value: DataValue::from(Variant::Int32(43)),
        }])
        .await
        .unwrap();
    assert_eq!(results, vec![StatusCode::Good]);

    session.disconnect().await.unwrap();
    handle.shutdown();
}

#[tokio::test]
async fn subscription_delivers_data_change() {
    let (handle, url) = start_server().await;
    let session = connect(&url).await;

    let (subscription_id, revised_interval) = session
        .create_subscription(100.0, 20, 5)
        .await
        .unwrap();
    assert!(revised_interval >= 10.0);

    let results = session
        .create_monitored_items(
            subscription_id,
            vec![MonitoredItemCreateRequest {
                item_to_monitor: ReadValueId::value_of(NodeId::from(
                    VariableId::Server_ServerStatus_CurrentTime,
                )),
                monitoring_mode: MonitoringMode::Reporting,
                requested_parameters: MonitoringParameters {
                    client_handle: 7,
                    sampling_interval: 100.0,
                    queue_size: 10,
                    discard_oldest: true,
                    ..Default::default()
                },
            }],
        )
        .await
        .unwrap();
    assert_eq!(results[0].status_code, StatusCode::Good);

    // The first publish carries the initial data change for CurrentTime
    let (sub, message) = session.publish(Vec::new()).await.unwrap();
    assert_eq!(sub, subscription_id);
    let notifications = message.notification_data.unwrap();
    assert!(!notifications.is_empty());
    let ctx_owned = ContextOwned::new_default();
    let ctx = ctx_owned.context();
    let data_change: DataChangeNotification = notifications[0].decode_inner(&ctx).unwrap();
    let items = data_change.monitored_items.unwrap();
    assert_eq!(items[0].client_handle, 7);
    assert!(matches!(items[0].value.value, Some(Variant::DateTime(_))));

    session.disconnect().await.unwrap();
    handle.shutdown();
}

#[tokio::test]
async fn event_filter_validation_drops_bad_select_clause() {
    let (handle, url) = start_server().await;
    let session = connect(&url).await;

    let (subscription_id, _) = session.create_subscription(100.0, 20, 5).await.unwrap();

    let ctx_owned = ContextOwned::new_default();
    let ctx = ctx_owned.context();
    let select = |type_def: NodeId| SimpleAttributeOperand {
        type_definition_id: type_def,
        browse_path: Some(vec![QualifiedName::new(0, "Message")]),
        attribute_id: AttributeId::Value as u32,
        index_range: UAString::null(),
    };
    let filter = EventFilter {
        select_clauses: Some(vec![
            select(ObjectTypeId::BaseEventType.into()),
            // NS0/Number is not an event type: the clause is dropped but
            // the item is still created
            select(DataTypeId::Number.into()),
        ]),
        where_clause: Default::default(),
    };
    let results = session
        .create_monitored_items(
            subscription_id,
            vec![MonitoredItemCreateRequest {
                item_to_monitor: ReadValueId {
                    node_id: ObjectId::Server.into(),
                    attribute_id: AttributeId::EventNotifier as u32,
                    ..Default::default()
                },
                monitoring_mode: MonitoringMode::Reporting,
                requested_parameters: MonitoringParameters {
                    client_handle: 8,
                    filter: ExtensionObject::from_message(&filter, &ctx),
                    queue_size: 10,
                    discard_oldest: true,
                    ..Default::default()
                },
            }],
        )
        .await
        .unwrap();

    assert_eq!(results[0].status_code, StatusCode::Good);
    let filter_result: EventFilterResult = results[0].filter_result.decode_inner(&ctx).unwrap();
    let clause_results = filter_result.select_clause_results.unwrap();
    assert_eq!(clause_results[0], StatusCode::Good);
    assert_eq!(clause_results[1], StatusCode::BadTypeDefinitionInvalid);

    session.disconnect().await.unwrap();
    handle.shutdown();
}
