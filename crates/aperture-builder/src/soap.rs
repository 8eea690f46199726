use aperture_core::{Operation, OperationMeta};
use aperture_error::ApertureError;

use crate::defaults::{effective_value, scalar_to_string, ParamValues};
use crate::{apply_auth, BuildContext, HttpRequest, RequestBuilder, DEFAULT_BUILDER_USER_AGENT};

/// Builds SOAP 1.1/1.2 envelopes from `OperationMeta::Wsdl` operations.
#[derive(Debug, Default)]
pub struct SoapRequestBuilder;

const SOAP11_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
const SOAP12_NS: &str = "http://www.w3.org/2003/05/soap-envelope";

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

impl RequestBuilder for SoapRequestBuilder {
    fn build(
        &self,
        ctx: &BuildContext,
        operation: &Operation,
        values: &ParamValues,
    ) -> Result<HttpRequest, ApertureError> {
        let OperationMeta::Wsdl {
            soap_action,
            soap_version,
            ..
        } = &operation.meta
        else {
            return Err(ApertureError::new(
                aperture_error::ErrorCode::Internal,
                "SoapRequestBuilder requires an OperationMeta::Wsdl operation",
            ));
        };

        let is_soap12 = soap_version == "1.2";
        let envelope_ns = if is_soap12 { SOAP12_NS } else { SOAP11_NS };

        let mut body_fields = String::new();
        for param in &operation.parameters {
            if let Some(v) = effective_value(param, values) {
                let text = escape_xml(&scalar_to_string(&v));
                body_fields.push_str(&format!("<{0}>{1}</{0}>", param.name, text));
            }
        }

        let op_name = &operation.display_name;
        let xml = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
<soap:Envelope xmlns:soap=\"{envelope_ns}\">\
<soap:Body>\
<{op_name}>{body_fields}</{op_name}>\
</soap:Body>\
</soap:Envelope>"
        );

        let content_type = if is_soap12 {
            format!("application/soap+xml; charset=utf-8; action=\"{soap_action}\"")
        } else {
            "text/xml; charset=utf-8".to_string()
        };

        let mut request = HttpRequest {
            url: operation.base_url.clone(),
            method: "POST".to_string(),
            headers: ctx.caller_headers.clone(),
            body: Some(xml.into_bytes()),
            ..Default::default()
        };

        if !request.headers.iter().any(|(k, _)| k.eq_ignore_ascii_case("user-agent")) {
            request.set_header("User-Agent", DEFAULT_BUILDER_USER_AGENT);
        }
        request.set_header("Content-Type", content_type);
        if !is_soap12 {
            request.set_header("SOAPAction", format!("\"{soap_action}\""));
        }

        apply_auth(&mut request, &ctx.auth.0);
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aperture_core::{ApiKind, DataType, Parameter, ParameterLocation};

    fn wsdl_op(soap_version: &str, parameters: Vec<Parameter>) -> Operation {
        Operation {
            definition_id: None,
            api_kind: ApiKind::Wsdl,
            display_name: "Add".into(),
            method: "POST".into(),
            url_path: None,
            base_url: "http://example.test/calc".into(),
            operation_id: "CalcBinding:Add".into(),
            summary: None,
            description: None,
            deprecated: false,
            tags: vec![],
            parameters,
            security: vec![],
            request_content_types: vec!["text/xml; charset=utf-8".into()],
            response_content_types: vec!["text/xml; charset=utf-8".into()],
            return_type: None,
            meta: OperationMeta::Wsdl {
                soap_action: "urn:calc#Add".into(),
                soap_version: soap_version.into(),
                binding: "CalcBinding".into(),
            },
        }
    }

    fn body_param(name: &str, data_type: DataType) -> Parameter {
        Parameter {
            name: name.into(),
            location: ParameterLocation::Body,
            required: true,
            data_type,
            ..Default::default()
        }
    }

    #[test]
    fn soap11_sets_soap_action_and_text_xml_content_type() {
        let operation = wsdl_op("1.1", vec![body_param("a", DataType::Integer), body_param("b", DataType::Integer)]);
        let ctx = BuildContext::default();
        let mut values = ParamValues::new();
        values.insert("a".into(), serde_json::json!(2));
        values.insert("b".into(), serde_json::json!(3));
        let request = SoapRequestBuilder.build(&ctx, &operation, &values).unwrap();
        assert_eq!(request.content_type(), Some("text/xml; charset=utf-8"));
        assert!(request.headers.iter().any(|(k, v)| k == "SOAPAction" && v == "\"urn:calc#Add\""));
        let body = String::from_utf8(request.body.unwrap()).unwrap();
        assert!(body.contains("<Add><a>2</a><b>3</b></Add>"));
    }

    #[test]
    fn soap12_uses_application_soap_xml_and_no_soap_action_header() {
        let operation = wsdl_op("1.2", vec![]);
        let ctx = BuildContext::default();
        let request = SoapRequestBuilder.build(&ctx, &operation, &ParamValues::new()).unwrap();
        assert!(request.content_type().unwrap().starts_with("application/soap+xml"));
        assert!(!request.headers.iter().any(|(k, _)| k == "SOAPAction"));
    }

    #[test]
    fn body_values_are_xml_escaped() {
        let operation = wsdl_op("1.1", vec![body_param("name", DataType::String)]);
        let ctx = BuildContext::default();
        let mut values = ParamValues::new();
        values.insert("name".into(), serde_json::json!("<a & b>"));
        let request = SoapRequestBuilder.build(&ctx, &operation, &values).unwrap();
        let body = String::from_utf8(request.body.unwrap()).unwrap();
        assert!(body.contains("&lt;a &amp; b&gt;"));
    }
}
