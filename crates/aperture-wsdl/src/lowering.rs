use std::collections::HashSet;

use aperture_core::{ApiKind, DataType, Operation, OperationMeta, Parameter, ParameterLocation, WsdlMeta};

use crate::dialect::{BindingInfo, SchemaField, WsdlDocument};

const MAX_SCHEMA_DEPTH: usize = 8;

fn xsd_type_to_data_type(xsd_type: &str) -> DataType {
    match strip_xsd_prefix(xsd_type) {
        "int" | "integer" | "long" | "short" | "byte" | "unsignedInt" | "unsignedLong" => DataType::Integer,
        "float" | "double" | "decimal" => DataType::Number,
        "boolean" => DataType::Boolean,
        _ => DataType::String,
    }
}

fn strip_xsd_prefix(value: &str) -> &str {
    value.rsplit(':').next().unwrap_or(value)
}

/// Builds a nested [`Parameter`] for one field of a resolved schema object,
/// recursing into named complex types with cycle protection (`visited`
/// tracks complex-type names already on the current path).
fn parameter_for_field(doc: &WsdlDocument, field: &SchemaField, depth: usize, visited: &HashSet<String>) -> Parameter {
    let Some(type_name) = &field.type_name else {
        return Parameter {
            name: field.name.clone(),
            location: ParameterLocation::Body,
            required: true,
            data_type: DataType::String,
            ..Default::default()
        };
    };
    if depth >= MAX_SCHEMA_DEPTH || visited.contains(type_name) {
        return Parameter {
            name: field.name.clone(),
            location: ParameterLocation::Body,
            required: true,
            data_type: DataType::Object,
            ..Default::default()
        };
    }
    if let Some(nested_fields) = doc.schema_complex_types.get(type_name) {
        let mut visited = visited.clone();
        visited.insert(type_name.clone());
        let children = nested_fields
            .iter()
            .map(|f| parameter_for_field(doc, f, depth + 1, &visited))
            .collect();
        return Parameter {
            name: field.name.clone(),
            location: ParameterLocation::Body,
            required: true,
            data_type: DataType::Object,
            children,
            ..Default::default()
        };
    }
    Parameter {
        name: field.name.clone(),
        location: ParameterLocation::Body,
        required: true,
        data_type: xsd_type_to_data_type(type_name),
        ..Default::default()
    }
}

/// Resolves a part's `element` attribute against the WSDL's embedded schema
/// (§4.4 "object children become nested params, location=body"). Falls back
/// to a flat, childless object when the element isn't declared in the
/// scanned schema — e.g. it's defined in an `<xsd:import>`ed document this
/// structural scan didn't follow.
fn parameter_for_element(doc: &WsdlDocument, part_name: &str, element_name: &str) -> Parameter {
    let Some(element) = doc.schema_elements.get(element_name) else {
        return Parameter {
            name: part_name.to_string(),
            location: ParameterLocation::Body,
            required: true,
            data_type: DataType::Object,
            ..Default::default()
        };
    };
    let mut visited = HashSet::new();
    visited.insert(element_name.to_string());
    if !element.fields.is_empty() {
        let children = element
            .fields
            .iter()
            .map(|f| parameter_for_field(doc, f, 1, &visited))
            .collect();
        return Parameter {
            name: part_name.to_string(),
            location: ParameterLocation::Body,
            required: true,
            data_type: DataType::Object,
            children,
            ..Default::default()
        };
    }
    if let Some(type_name) = &element.type_name {
        if let Some(nested_fields) = doc.schema_complex_types.get(type_name) {
            let children = nested_fields
                .iter()
                .map(|f| parameter_for_field(doc, f, 1, &visited))
                .collect();
            return Parameter {
                name: part_name.to_string(),
                location: ParameterLocation::Body,
                required: true,
                data_type: DataType::Object,
                children,
                ..Default::default()
            };
        }
        return Parameter {
            name: part_name.to_string(),
            location: ParameterLocation::Body,
            required: true,
            data_type: xsd_type_to_data_type(type_name),
            ..Default::default()
        };
    }
    Parameter {
        name: part_name.to_string(),
        location: ParameterLocation::Body,
        required: true,
        data_type: DataType::Object,
        ..Default::default()
    }
}

/// Parameters for one operation, derived from its input message's parts and
/// their referenced schema elements (§4.4 "WSDL parser"). A part carrying
/// `type` maps directly via the XSD primitive table; a part carrying
/// `element` is resolved against the document's embedded/imported
/// `<xsd:schema>` so object children become nested params.
fn parameters_for_message(doc: &WsdlDocument, message_name: &str) -> Vec<Parameter> {
    let Some(parts) = doc.messages.get(message_name) else {
        return Vec::new();
    };
    parts
        .iter()
        .map(|part| {
            if let Some(xsd_type) = &part.xsd_type {
                Parameter {
                    name: part.name.clone(),
                    location: ParameterLocation::Body,
                    required: true,
                    data_type: xsd_type_to_data_type(xsd_type),
                    ..Default::default()
                }
            } else if let Some(element_name) = &part.element {
                parameter_for_element(doc, &part.name, element_name)
            } else {
                Parameter {
                    name: part.name.clone(),
                    location: ParameterLocation::Body,
                    required: true,
                    data_type: DataType::Object,
                    ..Default::default()
                }
            }
        })
        .collect()
}

fn operations_for_binding(doc: &WsdlDocument, binding: &BindingInfo, base_url: &str) -> Vec<Operation> {
    let Some(port_type_name) = &binding.port_type else {
        return Vec::new();
    };
    let Some(port_type_ops) = doc.port_types.get(port_type_name) else {
        return Vec::new();
    };

    binding
        .operations
        .iter()
        .filter_map(|binding_op| {
            let port_type_op = port_type_ops.iter().find(|op| op.name == binding_op.name)?;
            let parameters = port_type_op
                .input_message
                .as_deref()
                .map(|msg| parameters_for_message(doc, msg))
                .unwrap_or_default();

            Some(Operation {
                definition_id: None,
                api_kind: ApiKind::Wsdl,
                display_name: binding_op.name.clone(),
                method: "POST".to_string(),
                url_path: None,
                base_url: base_url.to_string(),
                operation_id: format!("{}:{}", binding.name, binding_op.name),
                summary: None,
                description: None,
                deprecated: false,
                tags: Vec::new(),
                parameters,
                security: Vec::new(),
                request_content_types: vec!["text/xml; charset=utf-8".to_string()],
                response_content_types: vec!["text/xml; charset=utf-8".to_string()],
                return_type: None,
                meta: OperationMeta::Wsdl {
                    soap_action: binding_op.soap_action.clone(),
                    soap_version: if binding.soap_version.is_empty() {
                        "1.1".to_string()
                    } else {
                        binding.soap_version.clone()
                    },
                    binding: binding.name.clone(),
                },
            })
        })
        .collect()
}

/// Lowers every `binding/operation` into one [`Operation`] (§4.4 "WSDL
/// parser").
pub fn lower(doc: &WsdlDocument, base_url: &str) -> Vec<Operation> {
    doc.bindings
        .iter()
        .flat_map(|binding| operations_for_binding(doc, binding, base_url))
        .collect()
}

/// Builds the summary [`WsdlMeta`] attached to the owning `ApiDefinition`.
pub fn summarize(doc: &WsdlDocument) -> WsdlMeta {
    let soap_version = doc
        .bindings
        .iter()
        .find(|b| !b.soap_version.is_empty())
        .map(|b| b.soap_version.clone())
        .unwrap_or_else(|| "1.1".to_string());
    WsdlMeta {
        target_namespace: doc.target_namespace.clone(),
        service_count: doc.service_count,
        soap_version,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::parse_document;

    const SIMPLE_WSDL: &str = r#"<?xml version="1.0"?>
<definitions name="Calc" targetNamespace="urn:calc"
  xmlns="http://schemas.xmlsoap.org/wsdl/"
  xmlns:soap="http://schemas.xmlsoap.org/wsdl/soap/">
  <message name="AddRequest">
    <part name="a" type="xsd:int"/>
    <part name="b" type="xsd:int"/>
  </message>
  <message name="AddResponse">
    <part name="result" type="xsd:int"/>
  </message>
  <portType name="CalcPortType">
    <operation name="Add">
      <input message="tns:AddRequest"/>
      <output message="tns:AddResponse"/>
    </operation>
  </portType>
  <binding name="CalcBinding" type="tns:CalcPortType">
    <soap:binding transport="http://schemas.xmlsoap.org/soap/http" style="document"/>
    <operation name="Add">
      <soap:operation soapAction="urn:calc#Add"/>
    </operation>
  </binding>
  <service name="CalcService">
    <port name="CalcPort" binding="tns:CalcBinding">
      <soap:address location="http://example.test/calc"/>
    </port>
  </service>
</definitions>"#;

    #[test]
    fn lowers_binding_operation_with_soap_action_and_params() {
        let doc = parse_document(SIMPLE_WSDL.as_bytes()).unwrap();
        let ops = lower(&doc, "http://example.test/calc");
        assert_eq!(ops.len(), 1);
        let op = &ops[0];
        assert_eq!(op.method, "POST");
        assert_eq!(op.parameters.len(), 2);
        match &op.meta {
            OperationMeta::Wsdl { soap_action, soap_version, binding } => {
                assert_eq!(soap_action, "urn:calc#Add");
                assert_eq!(soap_version, "1.1");
                assert_eq!(binding, "CalcBinding");
            }
            _ => panic!("expected Wsdl meta"),
        }
    }

    #[test]
    fn summary_carries_target_namespace_and_service_count() {
        let doc = parse_document(SIMPLE_WSDL.as_bytes()).unwrap();
        let meta = summarize(&doc);
        assert_eq!(meta.target_namespace, "urn:calc");
        assert_eq!(meta.service_count, 1);
    }

    const DOCUMENT_STYLE_WSDL: &str = r#"<?xml version="1.0"?>
<definitions name="Users" targetNamespace="urn:users"
  xmlns="http://schemas.xmlsoap.org/wsdl/"
  xmlns:soap="http://schemas.xmlsoap.org/wsdl/soap/"
  xmlns:xsd="http://www.w3.org/2001/XMLSchema">
  <types>
    <xsd:schema targetNamespace="urn:users">
      <xsd:complexType name="Address">
        <xsd:sequence>
          <xsd:element name="city" type="xsd:string"/>
          <xsd:element name="zip" type="xsd:string"/>
        </xsd:sequence>
      </xsd:complexType>
      <xsd:element name="CreateUserRequest">
        <xsd:complexType>
          <xsd:sequence>
            <xsd:element name="name" type="xsd:string"/>
            <xsd:element name="age" type="xsd:int"/>
            <xsd:element name="address" type="tns:Address"/>
          </xsd:sequence>
        </xsd:complexType>
      </xsd:element>
    </xsd:schema>
  </types>
  <message name="CreateUserRequest">
    <part name="parameters" element="tns:CreateUserRequest"/>
  </message>
  <message name="CreateUserResponse">
    <part name="result" type="xsd:string"/>
  </message>
  <portType name="UsersPortType">
    <operation name="CreateUser">
      <input message="tns:CreateUserRequest"/>
      <output message="tns:CreateUserResponse"/>
    </operation>
  </portType>
  <binding name="UsersBinding" type="tns:UsersPortType">
    <soap:binding transport="http://schemas.xmlsoap.org/soap/http" style="document"/>
    <operation name="CreateUser">
      <soap:operation soapAction="urn:users#CreateUser"/>
    </operation>
  </binding>
  <service name="UsersService">
    <port name="UsersPort" binding="tns:UsersBinding">
      <soap:address location="http://example.test/users"/>
    </port>
  </service>
</definitions>"#;

    #[test]
    fn element_carrying_part_expands_nested_object_children() {
        let doc = parse_document(DOCUMENT_STYLE_WSDL.as_bytes()).unwrap();
        let ops = lower(&doc, "http://example.test/users");
        assert_eq!(ops.len(), 1);
        let op = &ops[0];
        assert_eq!(op.parameters.len(), 1);
        let param = &op.parameters[0];
        assert_eq!(param.name, "parameters");
        assert_eq!(param.data_type, DataType::Object);
        assert_eq!(param.location, ParameterLocation::Body);
        assert_eq!(param.children.len(), 3);

        let name_field = param.children.iter().find(|c| c.name == "name").unwrap();
        assert_eq!(name_field.data_type, DataType::String);
        let age_field = param.children.iter().find(|c| c.name == "age").unwrap();
        assert_eq!(age_field.data_type, DataType::Integer);

        let address_field = param.children.iter().find(|c| c.name == "address").unwrap();
        assert_eq!(address_field.data_type, DataType::Object);
        assert_eq!(address_field.children.len(), 2);
        assert!(address_field.children.iter().any(|c| c.name == "city" && c.data_type == DataType::String));
        assert!(address_field.children.iter().any(|c| c.name == "zip" && c.data_type == DataType::String));
    }

    #[test]
    fn unresolved_element_falls_back_to_flat_object() {
        let mut doc = parse_document(SIMPLE_WSDL.as_bytes()).unwrap();
        doc.messages.insert(
            "OrphanRequest".to_string(),
            vec![crate::dialect::MessagePart {
                name: "body".to_string(),
                xsd_type: None,
                element: Some("NotDeclaredAnywhere".to_string()),
            }],
        );
        let params = parameters_for_message(&doc, "OrphanRequest");
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].data_type, DataType::Object);
        assert!(params[0].children.is_empty());
    }
}
