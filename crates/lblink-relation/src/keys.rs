//! The storage key convention.
//!
//! Key names are stable across protocol versions so that mixed-version
//! debugging stays possible. All key construction and parsing lives here;
//! call sites never concatenate strings.

/// Key under which a peer announces its protocol version.
pub const VERSION_KEY: &str = "version";

/// Prefix of request keys, used for enumeration.
pub const REQUEST_KEY_PREFIX: &str = "request_";

/// Prefix of response keys, used for enumeration.
pub const RESPONSE_KEY_PREFIX: &str = "response_";

/// Storage key of the request with the given name.
pub fn request_key(name: &str) -> String {
    format!("{REQUEST_KEY_PREFIX}{name}")
}

/// Storage key of the response answering the given request name.
pub fn response_key(name: &str) -> String {
    format!("{RESPONSE_KEY_PREFIX}{name}")
}

/// The request name a key addresses, if it is a request key.
pub fn request_name(key: &str) -> Option<&str> {
    key.strip_prefix(REQUEST_KEY_PREFIX)
}

/// The request name a key addresses, if it is a response key.
pub fn response_name(key: &str) -> Option<&str> {
    key.strip_prefix(RESPONSE_KEY_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_round_trip() {
        assert_eq!(request_key("web"), "request_web");
        assert_eq!(response_key("web"), "response_web");
        assert_eq!(request_name("request_web"), Some("web"));
        assert_eq!(response_name("response_web"), Some("web"));
    }

    #[test]
    fn parsers_reject_foreign_keys() {
        assert_eq!(request_name("response_web"), None);
        assert_eq!(response_name("version"), None);
    }
}
