//! Record builders for concise test setup.

use lblink_schema::{Protocol, Request};

/// A minimal valid HTTPS request: one backend port, everything else
/// defaulted.
pub fn sample_request(name: &str) -> Request {
    let mut request = Request::new(name);
    request.protocol = Some(Protocol::Https);
    request.backend_ports = vec![443];
    request
}
