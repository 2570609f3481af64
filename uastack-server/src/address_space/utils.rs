// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! Validation and instantiation helpers for the address space: value /
//! declared-type compatibility, the AddNodes pipeline, and the hand-built
//! core namespace bootstrap.

use log::{debug, error};

use uastack_nodes::{
    DataType, DefaultTypeTree, Method, Node, NodeBase, NodeType, Object, ObjectType,
    ReferenceType, TypeTree, ValueSource, Variable, VariableType,
};
use uastack_types::{
    value_rank, Context, DataTypeId, DataValue, DateTime, ExtensionObject, LocalizedText,
    MethodAttributes, NodeClass, NodeId, ObjectAttributes, ObjectId, ObjectTypeAttributes,
    ObjectTypeId, QualifiedName, ReferenceTypeAttributes, ReferenceTypeId, StatusCode, UAString,
    Variant, VariableAttributes, VariableId, VariableTypeAttributes, VariableTypeId,
};

use super::AddressSpace;

/// Test whether a value is compatible with a declared data type, value rank
/// and array dimensions. Writes that would break compatibility are rejected
/// with `BadTypeMismatch` by the caller.
pub fn is_value_compatible(
    value: &Variant,
    data_type: &NodeId,
    declared_value_rank: i32,
    declared_dimensions: Option<&Vec<u32>>,
    type_tree: &DefaultTypeTree,
) -> bool {
    // An empty value is compatible with anything; it clears the slot.
    if value.is_empty() {
        return true;
    }

    // Data type: the value's type must equal the declared type or be a
    // subtype of it, which covers the abstract types like Number and
    // BaseDataType.
    if let Some(value_type) = value.data_type() {
        if !type_tree.is_subtype_of(&value_type, data_type) {
            return false;
        }
    } else {
        return false;
    }

    // Value rank
    let is_array = value.is_array();
    let dims_len = match value {
        Variant::Array(a) => a.dimensions.as_ref().map(|d| d.len()).unwrap_or(1),
        _ => 0,
    };
    let rank_ok = match declared_value_rank {
        value_rank::ANY => true,
        value_rank::SCALAR => !is_array,
        value_rank::SCALAR_OR_ONE_DIMENSION => !is_array || dims_len == 1,
        value_rank::ONE_OR_MORE_DIMENSIONS => is_array,
        rank if rank >= 1 => is_array && dims_len == rank as usize,
        _ => false,
    };
    if !rank_ok {
        return false;
    }

    // Array dimensions, where 0 in the declaration means any length
    if let (Some(declared), Variant::Array(a)) = (declared_dimensions, value) {
        let actual: Vec<u32> = match &a.dimensions {
            Some(d) => d.clone(),
            None => vec![a.values.len() as u32],
        };
        if declared.len() != actual.len() {
            return false;
        }
        for (d, a) in declared.iter().zip(actual.iter()) {
            if *d != 0 && d != a {
                return false;
            }
        }
    }

    true
}

/// Validate a write of the value attribute against the variable's
/// declaration.
pub fn validate_value_to_write(
    variable: &Variable,
    value: &Variant,
    type_tree: &DefaultTypeTree,
) -> Result<(), StatusCode> {
    if is_value_compatible(
        value,
        variable.data_type(),
        variable.value_rank(),
        variable.array_dimensions(),
        type_tree,
    ) {
        Ok(())
    } else {
        debug!(
            "Write to {} rejected, value is not compatible with data type {}, rank {}",
            variable.node_id(),
            variable.data_type(),
            variable.value_rank()
        );
        Err(StatusCode::BadTypeMismatch)
    }
}

/// The parameters of one AddNodes operation after id resolution.
#[derive(Debug)]
pub struct AddNodeItem {
    /// The parent node the new node hangs off.
    pub parent_node_id: NodeId,
    /// The reference type between parent and new node.
    pub reference_type_id: NodeId,
    /// The requested node id, null to let the server assign one.
    pub requested_new_node_id: NodeId,
    /// The browse name of the new node.
    pub browse_name: QualifiedName,
    /// The node class of the new node.
    pub node_class: NodeClass,
    /// The class specific attributes.
    pub node_attributes: ExtensionObject,
    /// The type definition, for objects and variables.
    pub type_definition: NodeId,
}

/// Run the full AddNodes pipeline for one node: validation, construction of
/// the node from its attributes, instantiation of mandatory children from
/// the type definition, type checking, and the constructor chain. On any
/// failure the partial subtree is destructed in reverse order and removed.
pub fn add_node(
    space: &mut AddressSpace,
    item: AddNodeItem,
    ctx: &Context<'_>,
) -> Result<NodeId, StatusCode> {
    // (1) The parent must exist and the reference to it must be a
    // hierarchical reference type; type nodes hang off their parent with
    // HasSubtype.
    if !space.node_exists(&item.parent_node_id) {
        return Err(StatusCode::BadParentNodeIdInvalid);
    }
    if space.type_tree().get_node_class(&item.reference_type_id)
        != Some(NodeClass::ReferenceType)
    {
        return Err(StatusCode::BadReferenceTypeIdInvalid);
    }
    let is_type_node = matches!(
        item.node_class,
        NodeClass::ObjectType | NodeClass::VariableType | NodeClass::ReferenceType | NodeClass::DataType
    );
    if is_type_node {
        if item.reference_type_id != ReferenceTypeId::HasSubtype {
            return Err(StatusCode::BadReferenceNotAllowed);
        }
    } else if !space.type_tree().is_hierarchical(&item.reference_type_id) {
        return Err(StatusCode::BadReferenceNotAllowed);
    }
    if item.browse_name.is_null() {
        return Err(StatusCode::BadBrowseNameInvalid);
    }

    // (2) The type definition must exist and match the node class.
    match item.node_class {
        NodeClass::Object => {
            if space.type_tree().get_node_class(&item.type_definition)
                != Some(NodeClass::ObjectType)
            {
                return Err(StatusCode::BadTypeDefinitionInvalid);
            }
            check_abstract_instantiation(space, &item, NodeClass::Object)?;
        }
        NodeClass::Variable => {
            if space.type_tree().get_node_class(&item.type_definition)
                != Some(NodeClass::VariableType)
            {
                return Err(StatusCode::BadTypeDefinitionInvalid);
            }
            check_abstract_instantiation(space, &item, NodeClass::Variable)?;
        }
        NodeClass::Unspecified => return Err(StatusCode::BadNodeClassInvalid),
        _ => {
            if !item.type_definition.is_null() {
                return Err(StatusCode::BadTypeDefinitionInvalid);
            }
        }
    }

    // Resolve the node id.
    let node_id = if item.requested_new_node_id.is_null() {
        space
            .switch_mut()
            .next_node_id(item.parent_node_id.namespace)?
    } else {
        if space.node_exists(&item.requested_new_node_id) {
            return Err(StatusCode::BadNodeIdExists);
        }
        item.requested_new_node_id.clone()
    };

    // Build the node from the class specific attributes.
    let node = build_node_from_attributes(&node_id, &item, ctx)?;

    // (4) Type check variables against their variable type.
    if let NodeType::Variable(variable) = &node {
        let type_node = space.find_node(&item.type_definition);
        if let Some(NodeType::VariableType(vt)) = type_node {
            if !space
                .type_tree()
                .is_subtype_of(variable.data_type(), vt.data_type())
            {
                return Err(StatusCode::BadTypeMismatch);
            }
            let value = variable
                .value(Default::default(), &Default::default())
                .value
                .unwrap_or_default();
            if !is_value_compatible(
                &value,
                variable.data_type(),
                variable.value_rank(),
                variable.array_dimensions(),
                space.type_tree(),
            ) {
                return Err(StatusCode::BadTypeMismatch);
            }
        }
    }

    // Insert the node and its references.
    space.switch_mut().insert(node)?;
    space.insert_reference(&item.parent_node_id, &node_id, item.reference_type_id.clone());
    if !item.type_definition.is_null() {
        space.insert_reference(
            &node_id,
            &item.type_definition,
            ReferenceTypeId::HasTypeDefinition,
        );
    }
    if is_type_node {
        space.type_tree_mut().add_type_node(
            &node_id,
            Some(&item.parent_node_id),
            item.node_class,
        );
    }

    // (3) Instantiate mandatory children of the type definition, walking up
    // through the supertypes so inherited children appear too.
    let mut created = vec![node_id.clone()];
    if matches!(item.node_class, NodeClass::Object | NodeClass::Variable) {
        if let Err(e) = instantiate_children(space, &node_id, &item.type_definition, &mut created)
        {
            rollback(space, &created);
            return Err(e);
        }
    }

    // (5) Constructors run children first, then the node itself. On failure
    // destructors unwind in reverse and the subtree is removed.
    for id in created.iter().rev() {
        if let Err(e) = space.run_constructors(id) {
            error!("Constructor for {id} failed: {e}");
            rollback(space, &created);
            return Err(e);
        }
    }

    Ok(node_id)
}

// Abstract types can only be instantiated in specific places, part 5:
// abstract variable types only under the base variable/object subtrees,
// abstract object types only for event types or under the base object tree.
fn check_abstract_instantiation(
    space: &AddressSpace,
    item: &AddNodeItem,
    node_class: NodeClass,
) -> Result<(), StatusCode> {
    let is_abstract = match space.find_node(&item.type_definition) {
        Some(NodeType::ObjectType(t)) => t.is_abstract(),
        Some(NodeType::VariableType(t)) => t.is_abstract(),
        _ => false,
    };
    if !is_abstract {
        return Ok(());
    }
    let tree = space.type_tree();
    let parent_type = space
        .type_definition_of(&item.parent_node_id)
        .unwrap_or_else(NodeId::null);
    let permitted = match node_class {
        NodeClass::Variable => {
            tree.is_subtype_of(&parent_type, &VariableTypeId::BaseDataVariableType.into())
                || tree.is_subtype_of(&parent_type, &ObjectTypeId::BaseObjectType.into())
        }
        NodeClass::Object => {
            tree.is_subtype_of(&item.type_definition, &ObjectTypeId::BaseEventType.into())
                || tree.is_subtype_of(&parent_type, &ObjectTypeId::BaseObjectType.into())
        }
        _ => false,
    };
    if permitted {
        Ok(())
    } else {
        error!(
            "Rejecting instantiation of abstract type {}",
            item.type_definition
        );
        Err(StatusCode::BadTypeDefinitionInvalid)
    }
}

fn build_node_from_attributes(
    node_id: &NodeId,
    item: &AddNodeItem,
    ctx: &Context<'_>,
) -> Result<NodeType, StatusCode> {
    let bad_attrs = |e: uastack_types::Error| {
        error!("Cannot decode node attributes: {e}");
        StatusCode::BadNodeAttributesInvalid
    };
    let node = match item.node_class {
        NodeClass::Object => {
            let attrs: ObjectAttributes = item.node_attributes.decode_inner(ctx).map_err(bad_attrs)?;
            let mut node = Object::new(
                node_id,
                item.browse_name.clone(),
                display_name_or(&attrs.display_name, &item.browse_name),
                uastack_nodes::EventNotifier::from_bits_truncate(attrs.event_notifier),
            );
            node.set_description(attrs.description.clone());
            node.into()
        }
        NodeClass::Variable => {
            let attrs: VariableAttributes =
                item.node_attributes.decode_inner(ctx).map_err(bad_attrs)?;
            let mask = uastack_types::AttributesMask::from_bits_truncate(attrs.specified_attributes);
            let mut node = Variable::new(
                node_id,
                item.browse_name.clone(),
                display_name_or(&attrs.display_name, &item.browse_name),
                attrs.data_type.clone(),
                attrs.value.clone(),
            );
            // Unspecified attributes keep their part 3 defaults: value rank
            // Any, read access.
            if mask.contains(uastack_types::AttributesMask::VALUE_RANK) {
                node.set_value_rank(attrs.value_rank);
            }
            node.set_array_dimensions(attrs.array_dimensions.clone());
            if mask.contains(uastack_types::AttributesMask::ACCESS_LEVEL) {
                node.set_access_level(uastack_nodes::AccessLevel::from_bits_truncate(
                    attrs.access_level,
                ));
            }
            if mask.contains(uastack_types::AttributesMask::USER_ACCESS_LEVEL) {
                node.set_user_access_level(uastack_nodes::AccessLevel::from_bits_truncate(
                    attrs.user_access_level,
                ));
            }
            node.into()
        }
        NodeClass::Method => {
            let attrs: MethodAttributes = item.node_attributes.decode_inner(ctx).map_err(bad_attrs)?;
            Method::new(
                node_id,
                item.browse_name.clone(),
                display_name_or(&attrs.display_name, &item.browse_name),
                attrs.executable,
                attrs.user_executable,
            )
            .into()
        }
        NodeClass::ObjectType => {
            let attrs: ObjectTypeAttributes =
                item.node_attributes.decode_inner(ctx).map_err(bad_attrs)?;
            ObjectType::new(
                node_id,
                item.browse_name.clone(),
                display_name_or(&attrs.display_name, &item.browse_name),
                attrs.is_abstract,
            )
            .into()
        }
        NodeClass::VariableType => {
            let attrs: VariableTypeAttributes =
                item.node_attributes.decode_inner(ctx).map_err(bad_attrs)?;
            let mut node = VariableType::new(
                node_id,
                item.browse_name.clone(),
                display_name_or(&attrs.display_name, &item.browse_name),
                attrs.is_abstract,
            );
            node.set_data_type(attrs.data_type.clone());
            node.set_value_rank(attrs.value_rank);
            node.into()
        }
        NodeClass::ReferenceType => {
            let attrs: ReferenceTypeAttributes =
                item.node_attributes.decode_inner(ctx).map_err(bad_attrs)?;
            let mut node = ReferenceType::new(
                node_id,
                item.browse_name.clone(),
                display_name_or(&attrs.display_name, &item.browse_name),
                attrs.symmetric,
                attrs.is_abstract,
            );
            node.set_inverse_name(Some(attrs.inverse_name.clone()));
            node.into()
        }
        NodeClass::DataType => {
            let attrs: uastack_types::DataTypeAttributes =
                item.node_attributes.decode_inner(ctx).map_err(bad_attrs)?;
            DataType::new(
                node_id,
                item.browse_name.clone(),
                display_name_or(&attrs.display_name, &item.browse_name),
                attrs.is_abstract,
            )
            .into()
        }
        _ => return Err(StatusCode::BadNodeClassInvalid),
    };
    Ok(node)
}

fn display_name_or(display_name: &LocalizedText, browse_name: &QualifiedName) -> LocalizedText {
    if display_name.text.is_null() {
        LocalizedText {
            locale: UAString::null(),
            text: browse_name.name.clone(),
        }
    } else {
        display_name.clone()
    }
}

// Copy the mandatory children of the type definition, and of its super
// types, onto the new instance. Children reachable through Aggregates
// references are considered; methods are not copied but referenced, so a
// Call on the instance resolves to the shared method node.
fn instantiate_children(
    space: &mut AddressSpace,
    instance_id: &NodeId,
    type_definition: &NodeId,
    created: &mut Vec<NodeId>,
) -> Result<(), StatusCode> {
    // Walk the type and its supertypes, nearest type first so overridden
    // children win.
    let mut type_chain = vec![type_definition.clone()];
    let mut current = type_definition.clone();
    loop {
        let parent = space
            .find_references(
                &current,
                Some((ReferenceTypeId::HasSubtype, false)),
                uastack_types::BrowseDirection::Inverse,
            )
            .next()
            .map(|r| r.target_node.clone());
        let Some(parent) = parent else {
            break;
        };
        type_chain.push(parent.clone());
        current = parent;
    }

    for type_id in type_chain {
        let children: Vec<(NodeId, NodeId)> = space
            .find_references(
                &type_id,
                Some((ReferenceTypeId::Aggregates, true)),
                uastack_types::BrowseDirection::Forward,
            )
            .map(|r| (r.target_node.clone(), r.reference_type.clone()))
            .collect();

        for (child_id, reference_type) in children {
            let (browse_name, is_method) = match space.find_node(&child_id) {
                Some(child) => (
                    child.as_node().browse_name().clone(),
                    matches!(child, NodeType::Method(_)),
                ),
                None => continue,
            };

            // Skip children the instance already has, e.g. from a subtype
            // that overrides them.
            if space
                .find_child_by_browse_name(instance_id, &browse_name)
                .is_some()
            {
                continue;
            }

            // Only mandatory children are copied.
            if !has_modelling_rule(space, &child_id, ObjectId::ModellingRule_Mandatory) {
                continue;
            }

            if is_method {
                // Methods are shared with the type, not copied.
                space.insert_reference(instance_id, &child_id, reference_type);
            } else {
                let new_child_id = space.switch_mut().next_node_id(instance_id.namespace)?;
                let Some(copy) = clone_instance(space.find_node(&child_id), &new_child_id) else {
                    continue;
                };
                let child_type = space.type_definition_of(&child_id);
                space.switch_mut().insert(copy)?;
                created.push(new_child_id.clone());
                space.insert_reference(instance_id, &new_child_id, reference_type);
                if let Some(child_type) = child_type {
                    space.insert_reference(
                        &new_child_id,
                        &child_type,
                        ReferenceTypeId::HasTypeDefinition,
                    );
                    // Grandchildren of the child's own type
                    instantiate_children(space, &new_child_id, &child_type, created)?;
                }
            }
        }
    }
    Ok(())
}

fn has_modelling_rule(space: &AddressSpace, node_id: &NodeId, rule: ObjectId) -> bool {
    let rule: NodeId = rule.into();
    space
        .find_references(
            node_id,
            Some((ReferenceTypeId::HasModellingRule, false)),
            uastack_types::BrowseDirection::Forward,
        )
        .any(|r| r.target_node == &rule)
}

// Deep copy a node for instantiation. Value callbacks cannot be copied;
// callback-backed variables start out with a null internal value.
fn clone_instance(node: Option<&NodeType>, new_id: &NodeId) -> Option<NodeType> {
    match node? {
        NodeType::Variable(v) => {
            let mut copy = Variable::new(
                new_id,
                v.browse_name().clone(),
                v.display_name().clone(),
                v.data_type().clone(),
                Variant::Empty,
            );
            copy.set_value_rank(v.value_rank());
            copy.set_array_dimensions(v.array_dimensions().cloned());
            copy.set_access_level(v.access_level());
            copy.set_user_access_level(v.user_access_level());
            let source = match v.value_source() {
                ValueSource::Internal(value) => ValueSource::Internal(value.clone()),
                ValueSource::External(cell) => ValueSource::External(cell.clone()),
                ValueSource::Callback { .. } => ValueSource::Internal(DataValue::null()),
            };
            copy.set_value_source(source);
            Some(copy.into())
        }
        NodeType::Object(o) => Some(
            Object::new(
                new_id,
                o.browse_name().clone(),
                o.display_name().clone(),
                o.event_notifier(),
            )
            .into(),
        ),
        _ => None,
    }
}

fn rollback(space: &mut AddressSpace, created: &[NodeId]) {
    // Destructors in reverse construction order, then remove the subtree.
    for id in created.iter() {
        space.run_destructors(id);
    }
    for id in created.iter().rev() {
        let _ = space.delete_node(id, true);
    }
}

/// Build the hand-maintained subset of the core namespace: the folder
/// hierarchy, the base types, the modelling rules, and the server object
/// with its status variables. The full generated namespace 0 is delivered
/// separately as a data blob and is not part of this crate.
pub fn load_core_namespace(space: &mut AddressSpace) {
    use uastack_nodes::ReferenceDirection::*;

    // Reference type nodes for the hierarchy the type tree is seeded with.
    let ref_types: &[(ReferenceTypeId, Option<ReferenceTypeId>, bool, bool)] = &[
        (ReferenceTypeId::References, None, true, true),
        (
            ReferenceTypeId::HierarchicalReferences,
            Some(ReferenceTypeId::References),
            false,
            true,
        ),
        (
            ReferenceTypeId::NonHierarchicalReferences,
            Some(ReferenceTypeId::References),
            false,
            true,
        ),
        (
            ReferenceTypeId::HasChild,
            Some(ReferenceTypeId::HierarchicalReferences),
            false,
            true,
        ),
        (
            ReferenceTypeId::Organizes,
            Some(ReferenceTypeId::HierarchicalReferences),
            false,
            false,
        ),
        (
            ReferenceTypeId::HasEventSource,
            Some(ReferenceTypeId::HierarchicalReferences),
            false,
            false,
        ),
        (
            ReferenceTypeId::HasNotifier,
            Some(ReferenceTypeId::HasEventSource),
            false,
            false,
        ),
        (
            ReferenceTypeId::Aggregates,
            Some(ReferenceTypeId::HasChild),
            false,
            true,
        ),
        (
            ReferenceTypeId::HasSubtype,
            Some(ReferenceTypeId::HasChild),
            false,
            false,
        ),
        (
            ReferenceTypeId::HasComponent,
            Some(ReferenceTypeId::Aggregates),
            false,
            false,
        ),
        (
            ReferenceTypeId::HasProperty,
            Some(ReferenceTypeId::Aggregates),
            false,
            false,
        ),
        (
            ReferenceTypeId::HasOrderedComponent,
            Some(ReferenceTypeId::HasComponent),
            false,
            false,
        ),
        (
            ReferenceTypeId::HasModellingRule,
            Some(ReferenceTypeId::NonHierarchicalReferences),
            false,
            false,
        ),
        (
            ReferenceTypeId::HasTypeDefinition,
            Some(ReferenceTypeId::NonHierarchicalReferences),
            false,
            false,
        ),
        (
            ReferenceTypeId::HasEncoding,
            Some(ReferenceTypeId::NonHierarchicalReferences),
            false,
            false,
        ),
        (
            ReferenceTypeId::HasDescription,
            Some(ReferenceTypeId::NonHierarchicalReferences),
            false,
            false,
        ),
        (
            ReferenceTypeId::GeneratesEvent,
            Some(ReferenceTypeId::NonHierarchicalReferences),
            false,
            false,
        ),
    ];
    for (ty, parent, symmetric, is_abstract) in ref_types {
        let id: NodeId = (*ty).into();
        let name = format!("{ty:?}");
        let node = ReferenceType::new(&id, name.as_str(), name.as_str(), *symmetric, *is_abstract);
        space.insert::<ReferenceType, NodeId>(node, None);
        if let Some(parent) = parent {
            space.insert_reference(&(*parent).into(), &id, ReferenceTypeId::HasSubtype);
        }
    }

    // Data type hierarchy, both as nodes and in the type tree.
    let data_types: &[(DataTypeId, DataTypeId, bool)] = &[
        (DataTypeId::Number, DataTypeId::BaseDataType, true),
        (DataTypeId::Integer, DataTypeId::Number, true),
        (DataTypeId::UInteger, DataTypeId::Number, true),
        (DataTypeId::Enumeration, DataTypeId::BaseDataType, true),
        (DataTypeId::Boolean, DataTypeId::BaseDataType, false),
        (DataTypeId::SByte, DataTypeId::Integer, false),
        (DataTypeId::Byte, DataTypeId::UInteger, false),
        (DataTypeId::Int16, DataTypeId::Integer, false),
        (DataTypeId::UInt16, DataTypeId::UInteger, false),
        (DataTypeId::Int32, DataTypeId::Integer, false),
        (DataTypeId::UInt32, DataTypeId::UInteger, false),
        (DataTypeId::Int64, DataTypeId::Integer, false),
        (DataTypeId::UInt64, DataTypeId::UInteger, false),
        (DataTypeId::Float, DataTypeId::Number, false),
        (DataTypeId::Double, DataTypeId::Number, false),
        (DataTypeId::String, DataTypeId::BaseDataType, false),
        (DataTypeId::DateTime, DataTypeId::BaseDataType, false),
        (DataTypeId::Guid, DataTypeId::BaseDataType, false),
        (DataTypeId::ByteString, DataTypeId::BaseDataType, false),
        (DataTypeId::XmlElement, DataTypeId::BaseDataType, false),
        (DataTypeId::NodeId, DataTypeId::BaseDataType, false),
        (DataTypeId::ExpandedNodeId, DataTypeId::BaseDataType, false),
        (DataTypeId::StatusCode, DataTypeId::BaseDataType, false),
        (DataTypeId::QualifiedName, DataTypeId::BaseDataType, false),
        (DataTypeId::LocalizedText, DataTypeId::BaseDataType, false),
        (DataTypeId::Structure, DataTypeId::BaseDataType, true),
        (DataTypeId::DataValue, DataTypeId::BaseDataType, false),
        (DataTypeId::DiagnosticInfo, DataTypeId::BaseDataType, false),
        (DataTypeId::Duration, DataTypeId::Double, false),
        (DataTypeId::UtcTime, DataTypeId::DateTime, false),
        (DataTypeId::Argument, DataTypeId::Structure, false),
    ];
    let base: NodeId = DataTypeId::BaseDataType.into();
    space.insert::<DataType, NodeId>(
        DataType::new(&base, "BaseDataType", "BaseDataType", true),
        None,
    );
    space
        .type_tree_mut()
        .add_type_node(&base, None, NodeClass::DataType);
    for (ty, parent, is_abstract) in data_types {
        let id: NodeId = (*ty).into();
        let parent_id: NodeId = (*parent).into();
        let name = format!("{ty:?}");
        space.insert::<DataType, NodeId>(
            DataType::new(&id, name.as_str(), name.as_str(), *is_abstract),
            None,
        );
        space.insert_reference(&parent_id, &id, ReferenceTypeId::HasSubtype);
        space
            .type_tree_mut()
            .add_type_node(&id, Some(&parent_id), NodeClass::DataType);
    }

    // Object and variable types.
    let base_object: NodeId = ObjectTypeId::BaseObjectType.into();
    space.insert::<ObjectType, NodeId>(
        ObjectType::new(&base_object, "BaseObjectType", "BaseObjectType", false),
        None,
    );
    space
        .type_tree_mut()
        .add_type_node(&base_object, None, NodeClass::ObjectType);
    for (ty, name, is_abstract) in [
        (ObjectTypeId::FolderType, "FolderType", false),
        (ObjectTypeId::BaseEventType, "BaseEventType", true),
        (ObjectTypeId::ModellingRuleType, "ModellingRuleType", false),
    ] {
        let id: NodeId = ty.into();
        space.insert::<ObjectType, NodeId>(ObjectType::new(&id, name, name, is_abstract), None);
        space.insert_reference(&base_object, &id, ReferenceTypeId::HasSubtype);
        space
            .type_tree_mut()
            .add_type_node(&id, Some(&base_object), NodeClass::ObjectType);
    }

    let base_variable: NodeId = VariableTypeId::BaseVariableType.into();
    space.insert::<VariableType, NodeId>(
        VariableType::new(&base_variable, "BaseVariableType", "BaseVariableType", true),
        None,
    );
    space
        .type_tree_mut()
        .add_type_node(&base_variable, None, NodeClass::VariableType);
    for (ty, name) in [
        (VariableTypeId::BaseDataVariableType, "BaseDataVariableType"),
        (VariableTypeId::PropertyType, "PropertyType"),
    ] {
        let id: NodeId = ty.into();
        space.insert::<VariableType, NodeId>(VariableType::new(&id, name, name, false), None);
        space.insert_reference(&base_variable, &id, ReferenceTypeId::HasSubtype);
        space
            .type_tree_mut()
            .add_type_node(&id, Some(&base_variable), NodeClass::VariableType);
    }

    // Modelling rules.
    for (id, name) in [
        (ObjectId::ModellingRule_Mandatory, "Mandatory"),
        (ObjectId::ModellingRule_Optional, "Optional"),
    ] {
        let node_id: NodeId = id.into();
        space.insert::<Object, NodeId>(
            Object::new(&node_id, name, name, Default::default()),
            None,
        );
        space.insert_reference(
            &node_id,
            &ObjectTypeId::ModellingRuleType.into(),
            ReferenceTypeId::HasTypeDefinition,
        );
    }

    // The folder hierarchy.
    let root: NodeId = ObjectId::RootFolder.into();
    space.insert::<Object, NodeId>(Object::new(&root, "Root", "Root", Default::default()), None);
    space.insert_reference(
        &root,
        &ObjectTypeId::FolderType.into(),
        ReferenceTypeId::HasTypeDefinition,
    );
    for (id, name) in [
        (ObjectId::ObjectsFolder, "Objects"),
        (ObjectId::TypesFolder, "Types"),
        (ObjectId::ViewsFolder, "Views"),
    ] {
        let node_id: NodeId = id.into();
        let node = Object::new(&node_id, name, name, Default::default());
        space.insert::<Object, _>(
            node,
            Some(&[(&root, &ReferenceTypeId::Organizes, Forward)]),
        );
        space.insert_reference(
            &node_id,
            &ObjectTypeId::FolderType.into(),
            ReferenceTypeId::HasTypeDefinition,
        );
    }

    // The server object with its status variables.
    let objects_folder: NodeId = ObjectId::ObjectsFolder.into();
    let server: NodeId = ObjectId::Server.into();
    space.insert::<Object, _>(
        Object::new(&server, "Server", "Server", Default::default()),
        Some(&[(&objects_folder, &ReferenceTypeId::Organizes, Forward)]),
    );

    let server_status: NodeId = VariableId::Server_ServerStatus.into();
    let mut status = Variable::new(
        &server_status,
        "ServerStatus",
        "ServerStatus",
        DataTypeId::Structure,
        Variant::Empty,
    );
    status.set_value_rank(value_rank::SCALAR);
    space.insert::<Variable, _>(
        status,
        Some(&[(&server, &ReferenceTypeId::HasComponent, Inverse)]),
    );

    let start_time: NodeId = VariableId::Server_ServerStatus_StartTime.into();
    space.insert::<Variable, _>(
        Variable::new(
            &start_time,
            "StartTime",
            "StartTime",
            DataTypeId::UtcTime,
            DateTime::now(),
        ),
        Some(&[(
            &server_status,
            &ReferenceTypeId::HasComponent,
            Inverse,
        )]),
    );

    let current_time: NodeId = VariableId::Server_ServerStatus_CurrentTime.into();
    let mut current = Variable::new(
        &current_time,
        "CurrentTime",
        "CurrentTime",
        DataTypeId::UtcTime,
        Variant::Empty,
    );
    current.set_value_source(ValueSource::Callback {
        on_read: Box::new(|_| Ok(DataValue::new_now(DateTime::now()))),
        on_write: None,
    });
    space.insert::<Variable, _>(
        current,
        Some(&[(
            &server_status,
            &ReferenceTypeId::HasComponent,
            Inverse,
        )]),
    );

    let state: NodeId = VariableId::Server_ServerStatus_State.into();
    space.insert::<Variable, _>(
        Variable::new(&state, "State", "State", DataTypeId::Int32, 0i32),
        Some(&[(
            &server_status,
            &ReferenceTypeId::HasComponent,
            Inverse,
        )]),
    );

    // Namespace and server arrays, refreshed when namespaces change.
    for (id, name) in [
        (VariableId::Server_NamespaceArray, "NamespaceArray"),
        (VariableId::Server_ServerArray, "ServerArray"),
    ] {
        let node_id: NodeId = id.into();
        let mut node = Variable::new(
            &node_id,
            name,
            name,
            DataTypeId::String,
            Variant::Empty,
        );
        node.set_value_rank(value_rank::ONE_DIMENSION);
        space.insert::<Variable, _>(
            node,
            Some(&[(&server, &ReferenceTypeId::HasProperty, Inverse)]),
        );
        space.insert_reference(
            &node_id,
            &VariableTypeId::PropertyType.into(),
            ReferenceTypeId::HasTypeDefinition,
        );
    }
    refresh_namespace_array(space);
}

/// Rewrite the NamespaceArray variable from the namespace table. Called
/// whenever a namespace is added or removed.
pub fn refresh_namespace_array(space: &mut AddressSpace) {
    let array = space.namespace_array();
    let values: Vec<Variant> = array.into_iter().map(Variant::from).collect();
    let Ok(value) = uastack_types::Array::new(uastack_types::VariantScalarTypeId::String, values)
    else {
        return;
    };
    let id: NodeId = VariableId::Server_NamespaceArray.into();
    if let Some(node) = space.find_node_mut(&id).and_then(|n| n.as_variable_mut()) {
        let _ = node.set_value_now(Variant::from(value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> DefaultTypeTree {
        let mut space = AddressSpace::new();
        load_core_namespace(&mut space);
        std::mem::take(space.type_tree_mut())
    }

    #[test]
    fn value_compatibility() {
        let tree = tree();
        let int32: NodeId = DataTypeId::Int32.into();
        let number: NodeId = DataTypeId::Number.into();
        let base: NodeId = DataTypeId::BaseDataType.into();

        // Exact and subtype matches
        assert!(is_value_compatible(&Variant::Int32(5), &int32, value_rank::ANY, None, &tree));
        assert!(is_value_compatible(&Variant::Int32(5), &number, value_rank::ANY, None, &tree));
        assert!(is_value_compatible(&Variant::from("x"), &base, value_rank::ANY, None, &tree));
        // Type mismatch
        assert!(!is_value_compatible(&Variant::from("x"), &int32, value_rank::ANY, None, &tree));
        // Rank enforcement
        assert!(!is_value_compatible(
            &Variant::Int32(5),
            &int32,
            value_rank::ONE_DIMENSION,
            None,
            &tree
        ));
        let arr = Variant::from(
            uastack_types::Array::new(
                uastack_types::VariantScalarTypeId::Int32,
                vec![Variant::Int32(1), Variant::Int32(2)],
            )
            .unwrap(),
        );
        assert!(is_value_compatible(&arr, &int32, value_rank::ONE_DIMENSION, None, &tree));
        assert!(!is_value_compatible(&arr, &int32, value_rank::SCALAR, None, &tree));
        // Dimension enforcement, 0 means any
        assert!(is_value_compatible(
            &arr,
            &int32,
            value_rank::ONE_DIMENSION,
            Some(&vec![0]),
            &tree
        ));
        assert!(!is_value_compatible(
            &arr,
            &int32,
            value_rank::ONE_DIMENSION,
            Some(&vec![3]),
            &tree
        ));
    }
}
