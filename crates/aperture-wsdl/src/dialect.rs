use std::collections::HashMap;

use aperture_error::{ApertureError, ErrorCode};
use quick_xml::events::Event;
use quick_xml::Reader;

/// One `<part>` of a WSDL `<message>`.
#[derive(Debug, Clone, Default)]
pub struct MessagePart {
    /// Part name.
    pub name: String,
    /// `type` attribute, an XSD primitive or complex type QName.
    pub xsd_type: Option<String>,
    /// `element` attribute, referencing a global XSD element.
    pub element: Option<String>,
}

/// One `<operation>` under a `portType`/`interface`.
#[derive(Debug, Clone, Default)]
pub struct PortTypeOperation {
    /// Operation name.
    pub name: String,
    /// Referenced input `<message>` name, local part (namespace stripped).
    pub input_message: Option<String>,
}

/// One `<operation>` under a `<binding>`, carrying its SOAP action.
#[derive(Debug, Clone, Default)]
pub struct BindingOperation {
    /// Operation name, matches the `portType` operation of the same name.
    pub name: String,
    /// `soapAction` attribute of the nested `soap:operation`.
    pub soap_action: String,
}

/// One `<binding>` element.
#[derive(Debug, Clone, Default)]
pub struct BindingInfo {
    /// Binding name.
    pub name: String,
    /// Referenced `portType`/`interface` name, local part.
    pub port_type: Option<String>,
    /// `"1.1"` or `"1.2"`, from the SOAP namespace prefix used.
    pub soap_version: String,
    /// Operations declared directly under this binding.
    pub operations: Vec<BindingOperation>,
}

/// One field of a `<xsd:complexType>`'s `<xsd:sequence>`, either inline
/// inside a `<xsd:element>` or declared as a standalone named complex type.
#[derive(Debug, Clone, Default)]
pub struct SchemaField {
    /// Field name.
    pub name: String,
    /// `type` attribute, an XSD primitive or complex type QName (namespace
    /// prefix stripped).
    pub type_name: Option<String>,
}

/// A top-level `<xsd:element>` declaration: either a direct `type` reference
/// or an inline anonymous complex type with its own field sequence.
#[derive(Debug, Clone, Default)]
pub struct SchemaElement {
    /// Element name.
    pub name: String,
    /// `type` attribute, when the element isn't carrying an inline
    /// `complexType`.
    pub type_name: Option<String>,
    /// Fields of an inline anonymous `complexType`, if any.
    pub fields: Vec<SchemaField>,
}

/// Flattened structural extraction of a WSDL document. Deliberately not a
/// full XML-Schema-aware model: parts reference XSD types/elements by name,
/// resolved in `lowering`. Schema capture is shallow — one level of
/// `complexType`/`sequence` nesting, enough to surface object children
/// without implementing general XSD type resolution.
#[derive(Debug, Clone, Default)]
pub struct WsdlDocument {
    /// `targetNamespace` of the root `definitions`/`description` element.
    pub target_namespace: String,
    /// `message name -> parts`.
    pub messages: HashMap<String, Vec<MessagePart>>,
    /// `portType/interface name -> operations`.
    pub port_types: HashMap<String, Vec<PortTypeOperation>>,
    /// All `<binding>` elements.
    pub bindings: Vec<BindingInfo>,
    /// Number of `<service>` elements.
    pub service_count: u32,
    /// `element name -> declaration`, from embedded/imported `<xsd:schema>`.
    pub schema_elements: HashMap<String, SchemaElement>,
    /// `complexType name -> fields`, for named complex types referenced by
    /// `type` rather than declared inline inside an element.
    pub schema_complex_types: HashMap<String, Vec<SchemaField>>,
}

fn local_name(qname: quick_xml::name::QName<'_>) -> String {
    String::from_utf8_lossy(qname.local_name().as_ref()).to_string()
}

fn strip_prefix(value: &str) -> &str {
    value.rsplit(':').next().unwrap_or(value)
}

fn attr_value(e: &quick_xml::events::BytesStart<'_>, name: &str) -> Option<String> {
    e.attributes().flatten().find_map(|attr| {
        if local_name(attr.key) == name {
            Some(String::from_utf8_lossy(&attr.value).to_string())
        } else {
            None
        }
    })
}

fn element_prefix(e: &quick_xml::events::BytesStart<'_>) -> String {
    let raw = String::from_utf8_lossy(e.name().as_ref()).to_string();
    raw.split(':').next().unwrap_or("").to_lowercase()
}

/// Scans raw WSDL 1.1/2.0 XML bytes into a [`WsdlDocument`]. Single forward
/// pass; order-dependent elements (bindings declared before their
/// `portType`) are resolved afterward in `lowering`, not here.
pub fn parse_document(bytes: &[u8]) -> Result<WsdlDocument, ApertureError> {
    let text = std::str::from_utf8(bytes).map_err(|source| {
        ApertureError::new(ErrorCode::ParseDocumentInvalid, "WSDL document is not valid UTF-8")
            .with_context("utf8_error", source.to_string())
    })?;
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut doc = WsdlDocument::default();

    let mut current_message: Option<String> = None;
    let mut current_port_type: Option<String> = None;
    let mut current_port_type_op: Option<PortTypeOperation> = None;
    let mut current_binding: Option<BindingInfo> = None;
    let mut current_binding_op: Option<BindingOperation> = None;
    let mut current_schema_element: Option<SchemaElement> = None;
    let mut current_named_complex_type: Option<(String, Vec<SchemaField>)> = None;
    let mut inside_inline_complex_type = false;

    loop {
        match reader.read_event() {
            Ok(Event::Eof) => break,
            Ok(ev @ (Event::Start(_) | Event::Empty(_))) => {
                let is_empty = matches!(ev, Event::Empty(_));
                let e = match ev {
                    Event::Start(e) | Event::Empty(e) => e,
                    _ => unreachable!(),
                };
                let name = local_name(e.name());
                match name.as_str() {
                    "definitions" | "description" => {
                        if let Some(tns) = attr_value(&e, "targetNamespace") {
                            doc.target_namespace = tns;
                        }
                    }
                    "message" => {
                        if let Some(msg_name) = attr_value(&e, "name") {
                            doc.messages.entry(msg_name.clone()).or_default();
                            current_message = Some(msg_name);
                        }
                    }
                    "part" => {
                        if let Some(msg_name) = &current_message {
                            let part = MessagePart {
                                name: attr_value(&e, "name").unwrap_or_default(),
                                xsd_type: attr_value(&e, "type").map(|t| strip_prefix(&t).to_string()),
                                element: attr_value(&e, "element").map(|t| strip_prefix(&t).to_string()),
                            };
                            doc.messages.entry(msg_name.clone()).or_default().push(part);
                        }
                    }
                    "portType" | "interface" => {
                        if let Some(pt_name) = attr_value(&e, "name") {
                            doc.port_types.entry(pt_name.clone()).or_default();
                            current_port_type = Some(pt_name);
                        }
                    }
                    "operation" if current_port_type.is_some() && current_binding.is_none() => {
                        current_port_type_op = Some(PortTypeOperation {
                            name: attr_value(&e, "name").unwrap_or_default(),
                            input_message: None,
                        });
                    }
                    "input" if current_port_type_op.is_some() => {
                        if let Some(op) = current_port_type_op.as_mut() {
                            op.input_message = attr_value(&e, "message").map(|m| strip_prefix(&m).to_string());
                        }
                    }
                    "binding" => {
                        if let Some(binding_name) = attr_value(&e, "name") {
                            current_binding = Some(BindingInfo {
                                name: binding_name,
                                port_type: attr_value(&e, "type")
                                    .or_else(|| attr_value(&e, "interface"))
                                    .map(|t| strip_prefix(&t).to_string()),
                                soap_version: String::new(),
                                operations: Vec::new(),
                            });
                        }
                    }
                    "operation" if current_binding.is_some() => {
                        current_binding_op = Some(BindingOperation {
                            name: attr_value(&e, "name").unwrap_or_default(),
                            soap_action: String::new(),
                        });
                    }
                    "service" => {
                        doc.service_count += 1;
                    }
                    "element" if current_named_complex_type.is_some() => {
                        if let Some((_, fields)) = current_named_complex_type.as_mut() {
                            fields.push(SchemaField {
                                name: attr_value(&e, "name").unwrap_or_default(),
                                type_name: attr_value(&e, "type").map(|t| strip_prefix(&t).to_string()),
                            });
                        }
                    }
                    "element" if current_schema_element.is_some() && inside_inline_complex_type => {
                        if let Some(parent) = current_schema_element.as_mut() {
                            parent.fields.push(SchemaField {
                                name: attr_value(&e, "name").unwrap_or_default(),
                                type_name: attr_value(&e, "type").map(|t| strip_prefix(&t).to_string()),
                            });
                        }
                    }
                    "element" if current_schema_element.is_none() && !is_empty => {
                        current_schema_element = Some(SchemaElement {
                            name: attr_value(&e, "name").unwrap_or_default(),
                            type_name: attr_value(&e, "type").map(|t| strip_prefix(&t).to_string()),
                            fields: Vec::new(),
                        });
                    }
                    "element" if current_schema_element.is_none() && is_empty => {
                        if let Some(elem_name) = attr_value(&e, "name") {
                            doc.schema_elements.insert(
                                elem_name.clone(),
                                SchemaElement {
                                    name: elem_name,
                                    type_name: attr_value(&e, "type").map(|t| strip_prefix(&t).to_string()),
                                    fields: Vec::new(),
                                },
                            );
                        }
                    }
                    "complexType" if current_schema_element.is_some() => {
                        if !is_empty {
                            inside_inline_complex_type = true;
                        }
                    }
                    "complexType" => {
                        if let Some(type_name) = attr_value(&e, "name") {
                            if is_empty {
                                doc.schema_complex_types.insert(type_name, Vec::new());
                            } else {
                                current_named_complex_type = Some((type_name, Vec::new()));
                            }
                        }
                    }
                    _ => {}
                }

                // SOAP-prefixed `<soap:binding>` / `<soap12:binding>` nested inside `<binding>`.
                if name == "binding" {
                    let prefix = element_prefix(&e);
                    if let Some(binding) = current_binding.as_mut() {
                        if prefix.contains("soap12") {
                            binding.soap_version = "1.2".to_string();
                        } else if prefix.contains("soap") && binding.soap_version.is_empty() {
                            binding.soap_version = "1.1".to_string();
                        }
                    }
                }
                if name == "operation" {
                    let prefix = element_prefix(&e);
                    if let (Some(binding_op), true) = (current_binding_op.as_mut(), prefix.contains("soap")) {
                        if let Some(action) = attr_value(&e, "soapAction") {
                            binding_op.soap_action = action;
                        }
                    }
                }
            }
            Ok(Event::End(e)) => {
                let name = local_name(e.name());
                match name.as_str() {
                    "message" => current_message = None,
                    "portType" | "interface" => current_port_type = None,
                    "operation" => {
                        if let Some(op) = current_port_type_op.take() {
                            if let Some(pt_name) = &current_port_type {
                                doc.port_types.entry(pt_name.clone()).or_default().push(op);
                            }
                        }
                        if let Some(op) = current_binding_op.take() {
                            if let Some(binding) = current_binding.as_mut() {
                                binding.operations.push(op);
                            }
                        }
                    }
                    "binding" => {
                        if let Some(binding) = current_binding.take() {
                            doc.bindings.push(binding);
                        }
                    }
                    "complexType" => {
                        if let Some((type_name, fields)) = current_named_complex_type.take() {
                            doc.schema_complex_types.insert(type_name, fields);
                        }
                        inside_inline_complex_type = false;
                    }
                    "element" if !inside_inline_complex_type => {
                        if let Some(elem) = current_schema_element.take() {
                            doc.schema_elements.insert(elem.name.clone(), elem);
                        }
                    }
                    _ => {}
                }
            }
            Ok(_) => {}
            Err(source) => {
                return Err(ApertureError::new(ErrorCode::ParseDocumentInvalid, "malformed WSDL XML")
                    .with_context("xml_error", source.to_string()));
            }
        }
    }

    if doc.target_namespace.is_empty() && doc.bindings.is_empty() && doc.messages.is_empty() {
        return Err(ApertureError::new(
            ErrorCode::ParseDocumentInvalid,
            "document has no recognizable WSDL definitions/description root",
        ));
    }

    Ok(doc)
}
