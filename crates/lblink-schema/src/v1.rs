//! Version 1 record set.
//!
//! Field layout follows the wire convention: a request payload carries only
//! the semantic fields: the name lives in the storage key, and the response
//! plus originating relation ride alongside the record in memory without
//! entering the payload or the digest.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::codec::{self, ValidationFailure, Violations};
use crate::hash::{digest, ContentHash};
use crate::ids::{RelationId, RequestId};

/// Traffic protocol of an endpoint or health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    /// Plain HTTP.
    Http,
    /// HTTP over TLS.
    Https,
    /// Raw TCP.
    Tcp,
    /// Raw UDP.
    Udp,
}

/// Why a request could not be fulfilled.
///
/// Fulfilment failures are payload, not control flow: they ride inside the
/// response so the requester reacts to them through the same change
/// detection as successes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The fulfilling side does not support something the request asked for.
    Unsupported,
    /// Provisioning the endpoint failed.
    ProviderError,
    /// The request content itself was judged invalid.
    Validation,
}

/// One health probe attached to a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HealthCheck {
    /// Probe protocol.
    pub protocol: Option<Protocol>,
    /// Probe port.
    pub port: Option<u16>,
    /// Probe path, for protocols that have one.
    pub path: Option<String>,
    /// Seconds between probes.
    #[serde(default = "default_interval")]
    pub interval: u32,
    /// Failures tolerated before a backend is marked down.
    #[serde(default = "default_retries")]
    pub retries: u32,
}

fn default_interval() -> u32 {
    30
}

fn default_retries() -> u32 {
    3
}

impl HealthCheck {
    /// A probe with the given protocol and port and default timing.
    pub fn new(protocol: Protocol, port: u16) -> Self {
        Self {
            protocol: Some(protocol),
            port: Some(port),
            path: None,
            interval: default_interval(),
            retries: default_retries(),
        }
    }

    /// Check field constraints, reporting every violation.
    pub fn validate(&self) -> Result<(), ValidationFailure> {
        let mut violations = Violations::default();
        if self.protocol.is_none() {
            violations.push("protocol", "required");
        }
        match self.port {
            None => violations.push("port", "required"),
            Some(0) => violations.push("port", "must be between 1 and 65535"),
            Some(_) => {}
        }
        if self.interval == 0 {
            violations.push("interval", "must be positive");
        }
        violations.into_result()
    }
}

/// A request for one load balancer endpoint.
///
/// Created on the requesting side, replicated to the fulfilling side, and
/// superseded in place on update: the same name always maps to the same
/// storage slot. Removal is the disappearance of that slot; there is no
/// tombstone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Request {
    /// Request name, unique per namespace. Lives in the storage key, not in
    /// the payload.
    #[serde(skip)]
    pub name: String,
    /// Relation the request was read from, where known.
    #[serde(skip)]
    pub relation: Option<RelationId>,
    /// The response answering this request. Empty (and invalid to encode)
    /// until the fulfilling side populates it.
    #[serde(skip)]
    pub response: Response,

    /// Traffic protocol of the requested endpoint.
    pub protocol: Option<Protocol>,
    /// Backend addresses. Empty means "default from the member addresses
    /// observed alongside the relation".
    #[serde(default)]
    pub backends: Vec<String>,
    /// Backend ports; at least one is required.
    #[serde(default)]
    pub backend_ports: Vec<u16>,
    /// Load balancing algorithm hints, in preference order.
    #[serde(default)]
    pub algorithm: Vec<String>,
    /// Whether sessions should stick to one backend.
    #[serde(default)]
    pub sticky: bool,
    /// Health probes for the backends.
    #[serde(default)]
    pub health_checks: Vec<HealthCheck>,
    /// Whether the endpoint is publicly reachable.
    #[serde(default = "default_public")]
    pub public: bool,
    /// Whether the balancer terminates TLS.
    #[serde(default)]
    pub tls_termination: bool,
    /// Certificate for TLS termination; paired with `tls_key`.
    pub tls_cert: Option<String>,
    /// Private key for TLS termination; paired with `tls_cert`.
    pub tls_key: Option<String>,
    /// Fixed ingress address, when the requester needs a specific one.
    pub ingress_address: Option<String>,
    /// Ports the endpoint should listen on.
    #[serde(default)]
    pub ingress_ports: Vec<u16>,
}

fn default_public() -> bool {
    true
}

impl Request {
    /// An unpopulated request bound to a name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            response: Response::new(name.clone()),
            name,
            relation: None,
            protocol: None,
            backends: Vec::new(),
            backend_ports: Vec::new(),
            algorithm: Vec::new(),
            sticky: false,
            health_checks: Vec::new(),
            public: true,
            tls_termination: false,
            tls_cert: None,
            tls_key: None,
            ingress_address: None,
            ingress_ports: Vec::new(),
        }
    }

    /// An identity-only stand-in for a request whose content is gone.
    pub fn placeholder(id: &RequestId) -> Self {
        let mut request = Self::new(id.name.clone());
        request.relation = Some(id.relation);
        request
    }

    /// Stable identity, once the originating relation is known.
    pub fn id(&self) -> Option<RequestId> {
        self.relation
            .map(|relation| RequestId::new(relation, self.name.clone()))
    }

    /// Append a health probe.
    pub fn add_health_check(&mut self, check: HealthCheck) -> &mut Self {
        self.health_checks.push(check);
        self
    }

    /// Check field and cross-field constraints, reporting every violation.
    pub fn validate(&self) -> Result<(), ValidationFailure> {
        let mut violations = Violations::default();
        if self.protocol.is_none() {
            violations.push("protocol", "required");
        }
        if self.backend_ports.is_empty() {
            violations.push("backend_ports", "at least one port is required");
        }
        if self.backend_ports.contains(&0) {
            violations.push("backend_ports", "ports must be between 1 and 65535");
        }
        if self.ingress_ports.contains(&0) {
            violations.push("ingress_ports", "ports must be between 1 and 65535");
        }
        for (index, check) in self.health_checks.iter().enumerate() {
            if let Err(failure) = check.validate() {
                violations.extend_nested(&format!("health_checks[{index}]"), failure);
            }
        }
        if self.tls_termination && self.tls_cert.is_some() != self.tls_key.is_some() {
            violations.push("tls_key", "tls_cert and tls_key must be provided together");
        }
        violations.into_result()
    }

    /// Canonical payload text; fails with the aggregate violation list.
    pub fn encode(&self) -> Result<String, ValidationFailure> {
        self.validate()?;
        codec::canonical_json(self)
    }

    /// Decode and validate a stored payload for the named request.
    pub fn decode(name: impl Into<String>, text: &str) -> Result<Self, ValidationFailure> {
        let mut request: Self = codec::parse_json(text)?;
        request.name = name.into();
        request.response = Response::new(request.name.clone());
        request.validate()?;
        Ok(request)
    }

    /// Digest of the canonical payload, or the failure for callers that
    /// need to know which fields are wrong.
    pub fn try_hash(&self) -> Result<ContentHash, ValidationFailure> {
        Ok(digest(self.encode()?.as_bytes()))
    }

    /// Digest of the canonical payload; `None` when the record does not
    /// validate.
    pub fn hash(&self) -> Option<ContentHash> {
        self.try_hash().ok()
    }
}

/// The answer to one request, stored under a key derived from the request
/// name in the fulfilling side's namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Response {
    /// Name of the request this answers. Lives in the storage key.
    #[serde(skip)]
    pub name: String,

    /// Why fulfilment failed; absent on success.
    pub error: Option<ErrorKind>,
    /// Human-readable detail; required when `error` is set.
    pub message: Option<String>,
    /// Address of the provisioned endpoint; required on success.
    pub address: Option<String>,
    /// Offending request fields, for `ErrorKind::Validation` style failures.
    #[serde(default)]
    pub error_fields: BTreeMap<String, String>,
    /// Correlation token: the digest of the request content this response
    /// answers, stamped at send time.
    pub received_hash: Option<ContentHash>,
}

impl Response {
    /// An unpopulated response for a request name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// A successful response carrying the provisioned address.
    pub fn success(name: impl Into<String>, address: impl Into<String>) -> Self {
        let mut response = Self::new(name);
        response.address = Some(address.into());
        response
    }

    /// A failed response carrying the error taxonomy and detail.
    pub fn failure(
        name: impl Into<String>,
        error: ErrorKind,
        message: impl Into<String>,
    ) -> Self {
        let mut response = Self::new(name);
        response.error = Some(error);
        response.message = Some(message.into());
        response
    }

    /// Whether fulfilment succeeded.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Check cross-field constraints, reporting every violation.
    pub fn validate(&self) -> Result<(), ValidationFailure> {
        let mut violations = Violations::default();
        if self.is_success() {
            if self.address.as_deref().unwrap_or("").is_empty() {
                violations.push("address", "required on success");
            }
        } else if self.message.as_deref().unwrap_or("").is_empty() {
            violations.push("message", "required on failure");
        }
        violations.into_result()
    }

    /// Canonical payload text; fails with the aggregate violation list.
    pub fn encode(&self) -> Result<String, ValidationFailure> {
        self.validate()?;
        codec::canonical_json(self)
    }

    /// Decode and validate a stored payload for the named request.
    pub fn decode(name: impl Into<String>, text: &str) -> Result<Self, ValidationFailure> {
        let mut response: Self = codec::parse_json(text)?;
        response.name = name.into();
        response.validate()?;
        Ok(response)
    }

    /// Digest of the canonical payload, or the failure itself.
    pub fn try_hash(&self) -> Result<ContentHash, ValidationFailure> {
        Ok(digest(self.encode()?.as_bytes()))
    }

    /// Digest of the canonical payload; `None` when the record does not
    /// validate.
    pub fn hash(&self) -> Option<ContentHash> {
        self.try_hash().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_request() -> Request {
        let mut request = Request::new("web");
        request.protocol = Some(Protocol::Https);
        request.backend_ports = vec![443];
        request
    }

    #[test]
    fn fresh_request_has_defaults() {
        let request = Request::new("web");
        assert!(request.backends.is_empty());
        assert!(request.health_checks.is_empty());
        assert!(request.public);
        assert!(!request.sticky);
        assert!(request.response.hash().is_none());
    }

    #[test]
    fn unpopulated_request_reports_every_missing_field() {
        let failure = Request::new("web").encode().unwrap_err();
        assert!(failure.names("protocol"));
        assert!(failure.names("backend_ports"));
        assert_eq!(failure.violations.len(), 2);
    }

    #[test]
    fn decode_rejects_unknown_fields() {
        let failure = Request::decode("web", r#"{"protocol":"https","backend_ports":[443],"flavor":"plain"}"#)
            .unwrap_err();
        assert!(failure.to_string().contains("flavor"));
    }

    #[test]
    fn decode_applies_defaults() {
        let request = Request::decode("web", r#"{"protocol":"https","backend_ports":[443]}"#)
            .unwrap();
        assert!(request.public);
        assert!(request.backends.is_empty());
        assert_eq!(request.name, "web");
    }

    #[test]
    fn decode_rejects_invalid_stored_payload() {
        // Decodes structurally but violates the port constraint.
        let failure = Request::decode("web", r#"{"protocol":"https","backend_ports":[0]}"#)
            .unwrap_err();
        assert!(failure.names("backend_ports"));
    }

    #[test]
    fn canonical_form_is_pinned() {
        // Guards digest stability across releases: a change to the
        // canonical encoding would desynchronise change detection between
        // differently-built peers mid-relationship.
        let request = valid_request();
        assert_eq!(
            request.encode().unwrap(),
            r#"{"algorithm":[],"backend_ports":[443],"backends":[],"health_checks":[],"ingress_address":null,"ingress_ports":[],"protocol":"https","public":true,"sticky":false,"tls_cert":null,"tls_key":null,"tls_termination":false}"#
        );
        assert_eq!(
            request.hash().unwrap().to_hex(),
            "69465056e83e7f531a060dbad4c8d02d6920d1cb3e9926ca0a2a8438fd9f3ee9"
        );

        let response = Response::success("web", "lb-web");
        assert_eq!(
            response.encode().unwrap(),
            r#"{"address":"lb-web","error":null,"error_fields":{},"message":null,"received_hash":null}"#
        );
        assert_eq!(
            response.hash().unwrap().to_hex(),
            "ab907d76f2bc803c468fc9028d71f205b53cdd2b84eb7dd05cb74ff6740dc220"
        );
    }

    #[test]
    fn encode_round_trip_is_canonical() {
        let mut request = valid_request();
        request.add_health_check(HealthCheck::new(Protocol::Https, 443));
        let text = request.encode().unwrap();
        let reread = Request::decode("web", &text).unwrap();
        assert_eq!(reread.encode().unwrap(), text);
        assert_eq!(reread.hash(), request.hash());
    }

    #[test]
    fn payload_excludes_name_relation_and_response() {
        let mut a = valid_request();
        let mut b = valid_request();
        b.name = "other".into();
        b.relation = Some(RelationId(7));
        b.response = Response::success("other", "lb-other");
        assert_eq!(a.encode().unwrap(), b.encode().unwrap());
        assert_eq!(a.hash(), b.hash());
        // And a stored payload never contains them.
        a.relation = Some(RelationId(1));
        assert!(!a.encode().unwrap().contains("name"));
    }

    #[test]
    fn hash_is_none_when_invalid() {
        let mut request = valid_request();
        request.protocol = None;
        assert!(request.hash().is_none());
        assert!(request.try_hash().is_err());
    }

    #[test]
    fn hash_changes_with_every_semantic_field() {
        let base = valid_request().hash().unwrap();
        let mutations: Vec<Box<dyn Fn(&mut Request)>> = vec![
            Box::new(|r| r.protocol = Some(Protocol::Tcp)),
            Box::new(|r| r.backends = vec!["10.0.0.1".into()]),
            Box::new(|r| r.backend_ports = vec![8443]),
            Box::new(|r| r.algorithm = vec!["round_robin".into()]),
            Box::new(|r| r.sticky = true),
            Box::new(|r| {
                r.add_health_check(HealthCheck::new(Protocol::Tcp, 443));
            }),
            Box::new(|r| r.public = false),
            Box::new(|r| {
                r.tls_termination = true;
                r.tls_cert = Some("cert".into());
                r.tls_key = Some("key".into());
            }),
            Box::new(|r| r.ingress_address = Some("10.1.1.1".into())),
            Box::new(|r| r.ingress_ports = vec![443]),
        ];
        for mutate in mutations {
            let mut request = valid_request();
            mutate(&mut request);
            assert_ne!(request.hash().unwrap(), base);
        }
    }

    #[test]
    fn health_check_defaults_and_constraints() {
        let check = HealthCheck::new(Protocol::Https, 443);
        assert_eq!(check.interval, 30);
        assert_eq!(check.retries, 3);
        assert!(check.validate().is_ok());

        let mut bad = HealthCheck::new(Protocol::Https, 443);
        bad.port = Some(0);
        bad.interval = 0;
        let failure = bad.validate().unwrap_err();
        assert!(failure.names("port"));
        assert!(failure.names("interval"));
    }

    #[test]
    fn nested_health_check_violations_carry_their_index() {
        let mut request = valid_request();
        request.health_checks.push(HealthCheck {
            protocol: None,
            port: None,
            path: None,
            interval: 30,
            retries: 3,
        });
        let failure = request.validate().unwrap_err();
        assert!(failure.names("health_checks[0].protocol"));
        assert!(failure.names("health_checks[0].port"));
    }

    #[test]
    fn tls_materials_must_be_paired() {
        let mut request = valid_request();
        request.tls_termination = true;
        request.tls_cert = Some("cert".into());
        let failure = request.validate().unwrap_err();
        assert!(failure.names("tls_key"));

        request.tls_key = Some("key".into());
        assert!(request.validate().is_ok());

        // Termination without local materials is also fine.
        request.tls_cert = None;
        request.tls_key = None;
        assert!(request.validate().is_ok());
    }

    #[test]
    fn response_success_requires_address() {
        let failure = Response::new("web").encode().unwrap_err();
        assert!(failure.names("address"));
        assert!(Response::success("web", "lb-web").encode().is_ok());
    }

    #[test]
    fn response_failure_requires_message() {
        let mut response = Response::new("web");
        response.error = Some(ErrorKind::Unsupported);
        let failure = response.encode().unwrap_err();
        assert!(failure.names("message"));

        let response = Response::failure("web", ErrorKind::Unsupported, "udp not supported");
        assert!(response.encode().is_ok());
        assert!(!response.is_success());
    }

    #[test]
    fn response_error_taxonomy_round_trips() {
        let mut response = Response::failure("web", ErrorKind::Validation, "bad ports");
        response
            .error_fields
            .insert("backend_ports".into(), "out of range".into());
        let text = response.encode().unwrap();
        let reread = Response::decode("web", &text).unwrap();
        assert_eq!(reread.error, Some(ErrorKind::Validation));
        assert_eq!(reread.error_fields.get("backend_ports").map(String::as_str), Some("out of range"));
        assert_eq!(reread.hash(), response.hash());
    }

    #[test]
    fn correlation_token_survives_the_wire() {
        let request = valid_request();
        let mut response = Response::success("web", "lb-web");
        response.received_hash = request.hash();
        let text = response.encode().unwrap();
        let reread = Response::decode("web", &text).unwrap();
        assert_eq!(reread.received_hash, request.hash());
    }

    #[test]
    fn response_hash_stable_and_content_sensitive() {
        let response = Response::success("web", "lb-web");
        assert_eq!(response.hash(), response.hash());
        let mut changed = response.clone();
        changed.address = Some("lb-web-2".into());
        assert_ne!(changed.hash(), response.hash());
    }
}
