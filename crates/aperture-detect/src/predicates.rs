use aperture_core::{HistoryRecord, PredicateOutcome, ValidationContext, ValidationPredicate};
use std::sync::Arc;

use crate::gates::{hard_reject, looks_like_html};
use crate::score::ScoreBuilder;

fn body_text(record: &HistoryRecord) -> std::borrow::Cow<'_, str> {
    record.body_text()
}

fn is_json_content_type(record: &HistoryRecord) -> bool {
    record
        .content_type
        .as_deref()
        .is_some_and(|ct| ct.to_ascii_lowercase().contains("json"))
}

fn parses_as_json(record: &HistoryRecord) -> Option<serde_json::Value> {
    serde_json::from_slice(&record.body).ok()
}

/// Cloud-metadata-service detector: looks for provider-specific response
/// keys, scored per provider (AWS IMDS, GCP metadata server, Azure IMDS).
pub fn cloud_metadata_predicate() -> ValidationPredicate {
    Arc::new(|record: &HistoryRecord, _ctx: &ValidationContext| {
        if let Some(reason) = hard_reject(record, false, true, true) {
            let _ = reason;
            return PredicateOutcome::no_match();
        }
        let text = body_text(record);
        ScoreBuilder::new()
            .add_if(text.contains("ami-id"), 60, "AWS ami-id key present")
            .add_if(
                text.contains("instance-id") && text.contains("ami-id"),
                15,
                "AWS instance-id alongside ami-id",
            )
            .add_if(
                text.contains("computeMetadata/v1"),
                60,
                "GCP computeMetadata/v1 marker",
            )
            .add_if(text.contains("azEnvironment"), 60, "Azure azEnvironment key")
            .finish(50)
    })
}

/// Kubernetes API detector: a 401/403 carrying a Kubernetes-shaped error
/// body is a high-confidence *authenticated API* finding; a 200 requires
/// multiple resource-shape keys and a JSON content-type.
pub fn kubernetes_api_predicate() -> ValidationPredicate {
    Arc::new(|record: &HistoryRecord, _ctx: &ValidationContext| {
        if looks_like_html(record) || record.body.is_empty() {
            return PredicateOutcome::no_match();
        }

        let Some(json) = parses_as_json(record) else {
            return PredicateOutcome::no_match();
        };

        if matches!(record.status_code, 401 | 403) {
            let looks_kubernetes = json.get("kind").and_then(|v| v.as_str()) == Some("Status")
                && json.get("apiVersion").is_some()
                && json
                    .get("message")
                    .and_then(|v| v.as_str())
                    .is_some_and(|m| m.contains("forbidden") || m.contains("Unauthorized"));
            return ScoreBuilder::new()
                .add_if(looks_kubernetes, 85, "401/403 with Kubernetes Status body")
                .finish(50);
        }

        if record.status_code == 200 {
            let resource_keys = ["kind", "apiVersion", "items", "resources", "paths"];
            let present = resource_keys
                .iter()
                .filter(|k| json.get(*(*k)).is_some())
                .count();
            return ScoreBuilder::new()
                .add_if(is_json_content_type(record) && present >= 2, 60, "resource-shaped JSON body")
                .add_if(present >= 3, 15, "three or more resource-shape keys")
                .finish(50);
        }

        PredicateOutcome::no_match()
    })
}

/// Which version-control marker family to look for.
#[derive(Debug, Clone, Copy)]
pub enum VcsKind {
    /// `.git/` leak.
    Git,
    /// `.svn/` leak.
    Svn,
}

/// VCS leak detector: requires explicit format markers in addition to a
/// non-HTML content-type — pattern counting alone is never sufficient.
pub fn vcs_leak_predicate(kind: VcsKind) -> ValidationPredicate {
    Arc::new(move |record: &HistoryRecord, _ctx: &ValidationContext| {
        if hard_reject(record, false, true, true).is_some() {
            return PredicateOutcome::no_match();
        }
        let text = body_text(record);
        let markers_present = match kind {
            VcsKind::Git => text.contains("[core]") || text.contains("ref: refs/"),
            VcsKind::Svn => text.contains("svn:wc:ra_dav:version-url") || text.contains("dir\n"),
        };
        ScoreBuilder::new()
            .add_if(markers_present, 70, "explicit VCS format marker present")
            .finish(50)
    })
}

/// Backup/dotenv file detector: must be non-HTML *and* contain
/// `KEY=VALUE`-shaped lines or a language-specific fragment.
pub fn backup_dotenv_predicate() -> ValidationPredicate {
    Arc::new(|record: &HistoryRecord, _ctx: &ValidationContext| {
        if hard_reject(record, false, true, true).is_some() {
            return PredicateOutcome::no_match();
        }
        let text = body_text(record);
        let env_lines = text
            .lines()
            .filter(|line| {
                let line = line.trim();
                !line.is_empty()
                    && !line.starts_with('#')
                    && line.contains('=')
                    && line.split('=').next().is_some_and(|k| {
                        !k.is_empty() && k.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                    })
            })
            .count();
        ScoreBuilder::new()
            .add_if(env_lines >= 2, 65, "multiple KEY=VALUE lines")
            .add_if(text.contains("<?php"), 65, "PHP fragment")
            .add_if(text.contains("<connectionStrings>"), 65, ".NET connection-strings fragment")
            .finish(50)
    })
}

/// `.well-known/security.txt` (RFC 9116): requires at least one `Contact:`
/// field; an HTML home-page redirect is always rejected by the HTML gate.
pub fn security_txt_predicate() -> ValidationPredicate {
    Arc::new(|record: &HistoryRecord, _ctx: &ValidationContext| {
        if hard_reject(record, false, true, true).is_some() {
            return PredicateOutcome::no_match();
        }
        let text = body_text(record);
        let has_contact = text
            .lines()
            .any(|line| line.trim_start().to_ascii_lowercase().starts_with("contact:"));
        ScoreBuilder::new()
            .add_if(has_contact, 70, "Contact: field present")
            .finish(50)
    })
}

/// `.well-known/mta-sts.txt` (RFC 8461 MTA-STS policy): plain-text
/// `key: value` lines, requires the fixed `version: STSv1` line plus a
/// `mode:` field.
pub fn mta_sts_predicate() -> ValidationPredicate {
    Arc::new(|record: &HistoryRecord, _ctx: &ValidationContext| {
        if hard_reject(record, false, true, true).is_some() {
            return PredicateOutcome::no_match();
        }
        let text = body_text(record);
        let lines: Vec<&str> = text.lines().map(str::trim).collect();
        let has_version = lines.iter().any(|l| l.eq_ignore_ascii_case("version: STSv1"));
        let has_mode = lines.iter().any(|l| l.to_ascii_lowercase().starts_with("mode:"));
        let has_mx = lines.iter().any(|l| l.to_ascii_lowercase().starts_with("mx:"));
        ScoreBuilder::new()
            .add_if(has_version, 55, "version: STSv1 line present")
            .add_if(has_mode, 25, "mode: field present")
            .add_if(has_mx, 10, "mx: field present")
            .finish(50)
    })
}

/// `apple-app-site-association` (AASA): JSON requiring at least one of the
/// three recognized top-level sections (`applinks`, `webcredentials`,
/// `appclips`).
pub fn aasa_predicate() -> ValidationPredicate {
    Arc::new(|record: &HistoryRecord, _ctx: &ValidationContext| {
        if hard_reject(record, false, true, true).is_some() {
            return PredicateOutcome::no_match();
        }
        let Some(json) = parses_as_json(record) else {
            return PredicateOutcome::no_match();
        };
        let Some(obj) = json.as_object() else {
            return PredicateOutcome::no_match();
        };
        let has_applinks = obj.get("applinks").and_then(|v| v.get("details")).is_some();
        let has_webcredentials = obj.contains_key("webcredentials");
        let has_appclips = obj.contains_key("appclips");
        ScoreBuilder::new()
            .add_if(has_applinks, 70, "applinks.details present")
            .add_if(has_webcredentials, 30, "webcredentials section present")
            .add_if(has_appclips, 15, "appclips section present")
            .finish(50)
    })
}

/// `.well-known/assetlinks.json` (Android Digital Asset Links): a JSON
/// array of statements, each naming an `android_app` target namespace.
pub fn assetlinks_predicate() -> ValidationPredicate {
    Arc::new(|record: &HistoryRecord, _ctx: &ValidationContext| {
        if hard_reject(record, false, true, true).is_some() {
            return PredicateOutcome::no_match();
        }
        let Some(json) = parses_as_json(record) else {
            return PredicateOutcome::no_match();
        };
        let Some(statements) = json.as_array() else {
            return PredicateOutcome::no_match();
        };
        let android_app_statements = statements
            .iter()
            .filter(|s| {
                s.pointer("/target/namespace").and_then(|v| v.as_str()) == Some("android_app")
                    && s.get("relation").is_some()
            })
            .count();
        ScoreBuilder::new()
            .add_if(android_app_statements >= 1, 70, "android_app statement present")
            .add_if(android_app_statements >= 2, 10, "multiple statements")
            .finish(50)
    })
}

/// Software Bill of Materials document: CycloneDX (`bomFormat`/`specVersion`)
/// or SPDX (`spdxVersion`/`SPDXID`) JSON.
pub fn sbom_predicate() -> ValidationPredicate {
    Arc::new(|record: &HistoryRecord, _ctx: &ValidationContext| {
        if hard_reject(record, false, true, true).is_some() {
            return PredicateOutcome::no_match();
        }
        let Some(json) = parses_as_json(record) else {
            return PredicateOutcome::no_match();
        };
        let is_cyclonedx =
            json.get("bomFormat").and_then(|v| v.as_str()) == Some("CycloneDX") && json.get("specVersion").is_some();
        let is_spdx = json
            .get("spdxVersion")
            .and_then(|v| v.as_str())
            .is_some_and(|v| v.starts_with("SPDX-"))
            && json.get("SPDXID").is_some();
        ScoreBuilder::new()
            .add_if(is_cyclonedx, 75, "CycloneDX bomFormat/specVersion present")
            .add_if(is_spdx, 75, "SPDX spdxVersion/SPDXID present")
            .finish(50)
    })
}

/// `.well-known/host-meta` (RFC 6415): an XRD document (`<XRD ...>` root) or
/// its JRD JSON sibling (a `links` array), each entry carrying a `rel`.
pub fn host_meta_predicate() -> ValidationPredicate {
    Arc::new(|record: &HistoryRecord, _ctx: &ValidationContext| {
        if hard_reject(record, false, true, true).is_some() {
            return PredicateOutcome::no_match();
        }
        let text = body_text(record);
        if let Some(json) = parses_as_json(record) {
            let has_rel_link = json
                .get("links")
                .and_then(|v| v.as_array())
                .is_some_and(|links| links.iter().any(|l| l.get("rel").is_some()));
            return ScoreBuilder::new()
                .add_if(has_rel_link, 65, "JRD links array with rel entries")
                .finish(50);
        }
        let has_xrd_root = text.contains("<XRD");
        let has_link_rel = text.contains("<Link") && text.contains("rel=");
        ScoreBuilder::new()
            .add_if(has_xrd_root, 55, "<XRD root element present")
            .add_if(has_link_rel, 20, "<Link rel=...> entry present")
            .finish(50)
    })
}

/// `.well-known/change-password` (W3C well-known URL): per spec this URL is
/// a redirect target, not a content format, so the signal is a 3xx with a
/// `Location` header rather than any body shape.
pub fn change_password_predicate() -> ValidationPredicate {
    Arc::new(|record: &HistoryRecord, _ctx: &ValidationContext| {
        if !record.is_status_class(3) {
            return PredicateOutcome::no_match();
        }
        let has_location = record.header("location").is_some_and(|v| !v.is_empty());
        ScoreBuilder::new()
            .add_if(has_location, 70, "redirect carries a Location header")
            .finish(50)
    })
}

fn xml_local_name(qname: quick_xml::name::QName<'_>) -> String {
    String::from_utf8_lossy(qname.local_name().as_ref()).to_string()
}

fn xml_attr_value(e: &quick_xml::events::BytesStart<'_>, name: &str) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| xml_local_name(attr.key) == name)
        .map(|attr| String::from_utf8_lossy(&attr.value).to_string())
}

/// One `<allow-access-from>`/`<allow-access-from-identity>` entry.
struct AllowAccessFrom {
    domain: String,
    secure: bool,
}

/// Flattened structural scan of a `crossdomain.xml` policy document.
struct CrossDomainPolicy {
    allow_access_from: Vec<AllowAccessFrom>,
    allows_sensitive_headers: bool,
}

/// Parses `crossdomain.xml` with a single forward pass over the element
/// tree (mirroring `aperture-wsdl`'s structural scan), walking every
/// `<allow-access-from>` and `<allow-http-request-headers-from>` element
/// rather than string-sniffing the raw body — so a `domain="*.org"` entry,
/// multiple policy blocks, or a comment containing the same substrings are
/// all handled correctly. Returns `None` when no `<cross-domain-policy>`
/// root is present.
fn parse_crossdomain_xml(text: &str) -> Option<CrossDomainPolicy> {
    use quick_xml::events::Event;

    let mut reader = quick_xml::Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut found_root = false;
    let mut policy = CrossDomainPolicy {
        allow_access_from: Vec::new(),
        allows_sensitive_headers: false,
    };

    loop {
        match reader.read_event() {
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match xml_local_name(e.name()).as_str() {
                "cross-domain-policy" => found_root = true,
                "allow-access-from" | "allow-access-from-identity" => {
                    policy.allow_access_from.push(AllowAccessFrom {
                        domain: xml_attr_value(&e, "domain").unwrap_or_default(),
                        secure: xml_attr_value(&e, "secure")
                            .map(|v| !v.eq_ignore_ascii_case("false"))
                            .unwrap_or(true),
                    });
                }
                "allow-http-request-headers-from" => policy.allows_sensitive_headers = true,
                _ => {}
            },
            Ok(_) => {}
            Err(_) => return None,
        }
    }

    found_root.then_some(policy)
}

/// Flash/Silverlight `crossdomain.xml` policy analysis. Confidence bands
/// stand in for the severity classification spec.md describes, so the
/// orchestrator's confidence→severity fallback (documented in
/// `DESIGN.md`) recovers the intended `High`/`Medium`/`Low` grading
/// without the predicate signature needing a severity field of its own.
pub fn crossdomain_predicate() -> ValidationPredicate {
    Arc::new(|record: &HistoryRecord, _ctx: &ValidationContext| {
        if hard_reject(record, false, true, true).is_some() {
            return PredicateOutcome::no_match();
        }
        let text = body_text(record);
        let Some(policy) = parse_crossdomain_xml(&text) else {
            return PredicateOutcome::no_match();
        };

        let wildcard_domain = policy.allow_access_from.iter().any(|a| a.domain == "*");
        let wildcard_tld = policy
            .allow_access_from
            .iter()
            .any(|a| a.domain.starts_with("*.") && a.domain.len() > 2);
        let allows_insecure = policy.allow_access_from.iter().any(|a| !a.secure);

        let confidence = if wildcard_domain || wildcard_tld {
            95 // High
        } else if policy.allows_sensitive_headers {
            65 // Medium
        } else if allows_insecure {
            30 // Low
        } else {
            55 // Medium-ish default: policy exists and is at least somewhat permissive
        };

        ScoreBuilder::new()
            .add(confidence, "cross-domain-policy parsed")
            .finish(1)
    })
}

/// Prometheus text-exposition format: requires a `# HELP`/`# TYPE` pair and
/// a `text/plain` content-type.
pub fn prometheus_metrics_predicate() -> ValidationPredicate {
    Arc::new(|record: &HistoryRecord, _ctx: &ValidationContext| {
        if hard_reject(record, false, true, true).is_some() {
            return PredicateOutcome::no_match();
        }
        let text = body_text(record);
        let has_help = text.lines().any(|l| l.starts_with("# HELP"));
        let has_type = text.lines().any(|l| l.starts_with("# TYPE"));
        let plain_text = record
            .content_type
            .as_deref()
            .is_some_and(|ct| ct.to_ascii_lowercase().starts_with("text/plain"));
        ScoreBuilder::new()
            .add_if(has_help && has_type, 60, "HELP/TYPE line pair present")
            .add_if(plain_text, 15, "text/plain content-type")
            .finish(50)
    })
}

/// SAML metadata XML: requires an `EntityDescriptor` root element and the
/// SAML metadata XML namespace.
pub fn saml_metadata_predicate() -> ValidationPredicate {
    Arc::new(|record: &HistoryRecord, _ctx: &ValidationContext| {
        if hard_reject(record, false, true, true).is_some() {
            return PredicateOutcome::no_match();
        }
        let text = body_text(record);
        let has_entity_descriptor = text.contains("EntityDescriptor");
        let has_namespace = text.contains("urn:oasis:names:tc:SAML");
        ScoreBuilder::new()
            .add_if(has_entity_descriptor && has_namespace, 70, "EntityDescriptor + SAML namespace")
            .finish(50)
    })
}

/// Jolokia JSON-over-HTTP bridge: requires a `"request"`/`"value"`
/// top-level key and `mbean`-shaped content.
pub fn jolokia_predicate() -> ValidationPredicate {
    Arc::new(|record: &HistoryRecord, _ctx: &ValidationContext| {
        if hard_reject(record, false, true, true).is_some() {
            return PredicateOutcome::no_match();
        }
        let Some(json) = parses_as_json(record) else {
            return PredicateOutcome::no_match();
        };
        let has_request_or_value = json.get("request").is_some() || json.get("value").is_some();
        let mentions_mbean = record.body_text().contains("mbean");
        ScoreBuilder::new()
            .add_if(has_request_or_value, 55, "request/value top-level key")
            .add_if(mentions_mbean, 20, "mbean-shaped content")
            .finish(50)
    })
}

/// OpenAPI/Swagger document discovery: the body must parse as JSON (or, for
/// `.yaml`/`.yml` candidates, pass a minimal `key: value` structural check)
/// and declare an `openapi` or `swagger` version key alongside a `paths`
/// map — format-grammar checks before free-text matching, per §4.2.
pub fn openapi_document_predicate() -> ValidationPredicate {
    Arc::new(|record: &HistoryRecord, _ctx: &ValidationContext| {
        if hard_reject(record, false, true, true).is_some() {
            return PredicateOutcome::no_match();
        }

        if let Some(json) = parses_as_json(record) {
            let version_key = json.get("openapi").and_then(|v| v.as_str()).is_some()
                || json.get("swagger").and_then(|v| v.as_str()).is_some();
            let has_paths = json.get("paths").and_then(|v| v.as_object()).is_some();
            return ScoreBuilder::new()
                .add_if(version_key, 55, "openapi/swagger version key present")
                .add_if(has_paths, 30, "paths map present")
                .finish(50);
        }

        let text = body_text(record);
        let yaml_version_line = text
            .lines()
            .any(|l| l.starts_with("openapi:") || l.starts_with("swagger:"));
        let yaml_paths_line = text.lines().any(|l| l.trim_end() == "paths:");
        ScoreBuilder::new()
            .add_if(yaml_version_line, 55, "openapi/swagger version line present")
            .add_if(yaml_paths_line, 30, "paths: section present")
            .finish(50)
    })
}

/// GraphQL introspection discovery: the probe body carries a canned
/// `__schema` introspection query; a match requires a JSON response whose
/// `data.__schema` object is present.
pub fn graphql_introspection_predicate() -> ValidationPredicate {
    Arc::new(|record: &HistoryRecord, _ctx: &ValidationContext| {
        if hard_reject(record, false, true, true).is_some() {
            return PredicateOutcome::no_match();
        }
        let Some(json) = parses_as_json(record) else {
            return PredicateOutcome::no_match();
        };
        let has_schema = json.pointer("/data/__schema").and_then(|v| v.as_object()).is_some();
        let has_errors_only = json.get("errors").is_some() && !has_schema;
        ScoreBuilder::new()
            .add_if(has_schema, 80, "data.__schema object present")
            .add_if(has_errors_only && json.get("data").is_some(), 40, "GraphQL-shaped error envelope")
            .finish(50)
    })
}

/// WSDL document discovery: requires a `wsdl:definitions`/`definitions`
/// root element carrying the WSDL XML namespace.
pub fn wsdl_document_predicate() -> ValidationPredicate {
    Arc::new(|record: &HistoryRecord, _ctx: &ValidationContext| {
        if hard_reject(record, false, true, true).is_some() {
            return PredicateOutcome::no_match();
        }
        let text = body_text(record);
        let has_definitions_root = text.contains("definitions") && text.contains("<?xml");
        let has_wsdl_namespace = text.contains("schemas.xmlsoap.org/wsdl/");
        ScoreBuilder::new()
            .add_if(has_definitions_root && has_wsdl_namespace, 75, "WSDL definitions root + namespace")
            .finish(50)
    })
}
