use aperture_core::{Detector, Severity};

use crate::predicates::{
    aasa_predicate, assetlinks_predicate, backup_dotenv_predicate, change_password_predicate,
    cloud_metadata_predicate, crossdomain_predicate, graphql_introspection_predicate,
    host_meta_predicate, jolokia_predicate, kubernetes_api_predicate, mta_sts_predicate,
    openapi_document_predicate, prometheus_metrics_predicate, saml_metadata_predicate,
    sbom_predicate, security_txt_predicate, vcs_leak_predicate, wsdl_document_predicate, VcsKind,
};

/// Canned introspection query body sent by the GraphQL discovery detector —
/// enough to confirm the endpoint is a GraphQL server without pulling the
/// full schema.
const GRAPHQL_INTROSPECTION_PROBE_BODY: &str =
    r#"{"query":"query{__schema{queryType{name}}}"}"#;

fn paths(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// Builds the full catalog of representative and supplemental content
/// discovery detectors. Detectors are plain data — composed here, not by
/// trait inheritance — so new families are added by appending entries.
pub fn build_catalog() -> Vec<Detector> {
    vec![
        Detector {
            name: "cloud-metadata-service".to_string(),
            paths: paths(&[
                "latest/meta-data/",
                "latest/meta-data/ami-id",
                "computeMetadata/v1/",
                "metadata/instance?api-version=2021-02-01",
            ]),
            method: "GET".to_string(),
            headers: vec![("Metadata".to_string(), "true".to_string())],
            body: None,
            predicate: cloud_metadata_predicate(),
            issue_code: "cloud-metadata-exposed".to_string(),
            stop_after_valid: true,
            severity_override: Some(Severity::High),
            is_api_detector: false,
        },
        Detector {
            name: "kubernetes-api".to_string(),
            paths: paths(&["api/", "apis/", "api/v1/namespaces"]),
            method: "GET".to_string(),
            headers: Vec::new(),
            body: None,
            predicate: kubernetes_api_predicate(),
            issue_code: "kubernetes-api-exposed".to_string(),
            stop_after_valid: false,
            severity_override: Some(Severity::High),
            is_api_detector: false,
        },
        Detector {
            name: "vcs-leak-git".to_string(),
            paths: paths(&[".git/HEAD", ".git/config", ".git/index"]),
            method: "GET".to_string(),
            headers: Vec::new(),
            body: None,
            predicate: vcs_leak_predicate(VcsKind::Git),
            issue_code: "vcs-leak-git".to_string(),
            stop_after_valid: true,
            severity_override: Some(Severity::High),
            is_api_detector: false,
        },
        Detector {
            name: "vcs-leak-svn".to_string(),
            paths: paths(&[".svn/entries", ".svn/wc.db"]),
            method: "GET".to_string(),
            headers: Vec::new(),
            body: None,
            predicate: vcs_leak_predicate(VcsKind::Svn),
            issue_code: "vcs-leak-svn".to_string(),
            stop_after_valid: true,
            severity_override: Some(Severity::High),
            is_api_detector: false,
        },
        Detector {
            name: "backup-dotenv".to_string(),
            paths: paths(&[
                ".env", ".env.local", ".env.production", "web.config", "config.php.bak",
                "backup.sql", "database.sql.gz",
            ]),
            method: "GET".to_string(),
            headers: Vec::new(),
            body: None,
            predicate: backup_dotenv_predicate(),
            issue_code: "backup-or-dotenv-exposed".to_string(),
            stop_after_valid: false,
            severity_override: Some(Severity::High),
            is_api_detector: false,
        },
        Detector {
            name: "well-known-security-txt".to_string(),
            paths: paths(&[".well-known/security.txt", "security.txt"]),
            method: "GET".to_string(),
            headers: Vec::new(),
            body: None,
            predicate: security_txt_predicate(),
            issue_code: "security-txt-present".to_string(),
            stop_after_valid: true,
            severity_override: Some(Severity::Info),
            is_api_detector: false,
        },
        Detector {
            name: "well-known-mta-sts".to_string(),
            paths: paths(&[".well-known/mta-sts.txt"]),
            method: "GET".to_string(),
            headers: Vec::new(),
            body: None,
            predicate: mta_sts_predicate(),
            issue_code: "mta-sts-policy-present".to_string(),
            stop_after_valid: true,
            severity_override: Some(Severity::Info),
            is_api_detector: false,
        },
        Detector {
            name: "well-known-apple-app-site-association".to_string(),
            paths: paths(&[
                ".well-known/apple-app-site-association",
                "apple-app-site-association",
            ]),
            method: "GET".to_string(),
            headers: Vec::new(),
            body: None,
            predicate: aasa_predicate(),
            issue_code: "aasa-document-present".to_string(),
            stop_after_valid: true,
            severity_override: Some(Severity::Info),
            is_api_detector: false,
        },
        Detector {
            name: "well-known-assetlinks".to_string(),
            paths: paths(&[".well-known/assetlinks.json"]),
            method: "GET".to_string(),
            headers: Vec::new(),
            body: None,
            predicate: assetlinks_predicate(),
            issue_code: "assetlinks-document-present".to_string(),
            stop_after_valid: true,
            severity_override: Some(Severity::Info),
            is_api_detector: false,
        },
        Detector {
            name: "well-known-sbom".to_string(),
            paths: paths(&[
                ".well-known/sbom",
                "sbom.json",
                "bom.json",
                ".well-known/security.txt.sbom",
            ]),
            method: "GET".to_string(),
            headers: Vec::new(),
            body: None,
            predicate: sbom_predicate(),
            issue_code: "sbom-document-present".to_string(),
            stop_after_valid: true,
            severity_override: Some(Severity::Info),
            is_api_detector: false,
        },
        Detector {
            name: "well-known-host-meta".to_string(),
            paths: paths(&[".well-known/host-meta", ".well-known/host-meta.json"]),
            method: "GET".to_string(),
            headers: Vec::new(),
            body: None,
            predicate: host_meta_predicate(),
            issue_code: "host-meta-document-present".to_string(),
            stop_after_valid: true,
            severity_override: Some(Severity::Info),
            is_api_detector: false,
        },
        Detector {
            name: "well-known-change-password".to_string(),
            paths: paths(&[".well-known/change-password"]),
            method: "GET".to_string(),
            headers: Vec::new(),
            body: None,
            predicate: change_password_predicate(),
            issue_code: "change-password-url-present".to_string(),
            stop_after_valid: true,
            severity_override: Some(Severity::Info),
            is_api_detector: false,
        },
        Detector {
            name: "flash-crossdomain-policy".to_string(),
            paths: paths(&["crossdomain.xml"]),
            method: "GET".to_string(),
            headers: Vec::new(),
            body: None,
            predicate: crossdomain_predicate(),
            issue_code: "crossdomain-policy-permissive".to_string(),
            stop_after_valid: true,
            severity_override: None,
            is_api_detector: false,
        },
        Detector {
            name: "prometheus-metrics".to_string(),
            paths: paths(&["metrics", "actuator/prometheus"]),
            method: "GET".to_string(),
            headers: Vec::new(),
            body: None,
            predicate: prometheus_metrics_predicate(),
            issue_code: "prometheus-metrics-exposed".to_string(),
            stop_after_valid: true,
            severity_override: Some(Severity::Medium),
            is_api_detector: false,
        },
        Detector {
            name: "saml-metadata".to_string(),
            paths: paths(&[
                "saml/metadata",
                "simplesaml/saml2/idp/metadata.php",
                ".well-known/saml-configuration",
            ]),
            method: "GET".to_string(),
            headers: Vec::new(),
            body: None,
            predicate: saml_metadata_predicate(),
            issue_code: "saml-metadata-exposed".to_string(),
            stop_after_valid: true,
            severity_override: Some(Severity::Info),
            is_api_detector: false,
        },
        Detector {
            name: "jolokia-bridge".to_string(),
            paths: paths(&["jolokia/", "jolokia/list", "jolokia/version"]),
            method: "GET".to_string(),
            headers: Vec::new(),
            body: None,
            predicate: jolokia_predicate(),
            issue_code: "jolokia-bridge-exposed".to_string(),
            stop_after_valid: true,
            severity_override: Some(Severity::High),
            is_api_detector: false,
        },
        Detector {
            name: "openapi-document".to_string(),
            paths: paths(&[
                "openapi.json",
                "swagger.json",
                "v2/api-docs",
                "v3/api-docs",
                "openapi.yaml",
                "swagger.yaml",
                ".well-known/openapi.json",
            ]),
            method: "GET".to_string(),
            headers: Vec::new(),
            body: None,
            predicate: openapi_document_predicate(),
            issue_code: "openapi-document-discovered".to_string(),
            stop_after_valid: false,
            severity_override: Some(Severity::Info),
            is_api_detector: true,
        },
        Detector {
            name: "graphql-introspection".to_string(),
            paths: paths(&["graphql", "api/graphql", "graphql/console", "graphiql"]),
            method: "POST".to_string(),
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: Some(GRAPHQL_INTROSPECTION_PROBE_BODY.as_bytes().to_vec()),
            predicate: graphql_introspection_predicate(),
            issue_code: "graphql-introspection-enabled".to_string(),
            stop_after_valid: false,
            severity_override: Some(Severity::Info),
            is_api_detector: true,
        },
        Detector {
            name: "wsdl-document".to_string(),
            paths: paths(&["service.wsdl", "service?wsdl", "?wsdl", "ws/service?wsdl"]),
            method: "GET".to_string(),
            headers: Vec::new(),
            body: None,
            predicate: wsdl_document_predicate(),
            issue_code: "wsdl-document-discovered".to_string(),
            stop_after_valid: false,
            severity_override: Some(Severity::Info),
            is_api_detector: true,
        },
    ]
}
