//! Canonical-encoding properties over generated records.
//!
//! `encode(decode(encode(r))) == encode(r)` must hold for every valid
//! record, and digests must be a pure function of the canonical bytes.

use proptest::collection::vec;
use proptest::option;
use proptest::prelude::*;

use lblink_schema::{digest, HealthCheck, Protocol, Request, Response};

fn protocol() -> impl Strategy<Value = Protocol> {
    prop_oneof![
        Just(Protocol::Http),
        Just(Protocol::Https),
        Just(Protocol::Tcp),
        Just(Protocol::Udp),
    ]
}

fn port() -> impl Strategy<Value = u16> {
    1u16..=65535
}

fn health_check() -> impl Strategy<Value = HealthCheck> {
    (protocol(), port(), option::of("/[a-z]{1,8}"), 1u32..600, 0u32..10).prop_map(
        |(protocol, port, path, interval, retries)| {
            let mut check = HealthCheck::new(protocol, port);
            check.path = path;
            check.interval = interval;
            check.retries = retries;
            check
        },
    )
}

fn request() -> impl Strategy<Value = Request> {
    (
        protocol(),
        vec("[a-z0-9.]{1,12}", 0..4),
        vec(port(), 1..4),
        vec("[a-z_]{1,10}", 0..3),
        any::<bool>(),
        vec(health_check(), 0..3),
        any::<bool>(),
        option::of("[a-z0-9.]{1,12}"),
        vec(port(), 0..3),
    )
        .prop_map(
            |(
                protocol,
                backends,
                backend_ports,
                algorithm,
                sticky,
                health_checks,
                public,
                ingress_address,
                ingress_ports,
            )| {
                let mut request = Request::new("prop");
                request.protocol = Some(protocol);
                request.backends = backends;
                request.backend_ports = backend_ports;
                request.algorithm = algorithm;
                request.sticky = sticky;
                request.health_checks = health_checks;
                request.public = public;
                request.ingress_address = ingress_address;
                request.ingress_ports = ingress_ports;
                request
            },
        )
}

proptest! {
    #[test]
    fn request_encoding_is_a_fixed_point(request in request()) {
        let first = request.encode().unwrap();
        let reread = Request::decode("prop", &first).unwrap();
        prop_assert_eq!(reread.encode().unwrap(), first.clone());
        prop_assert_eq!(reread, request);
    }

    #[test]
    fn request_hash_is_the_digest_of_the_encoding(request in request()) {
        let text = request.encode().unwrap();
        prop_assert_eq!(request.hash().unwrap(), digest(text.as_bytes()));
    }

    #[test]
    fn response_encoding_is_a_fixed_point(
        address in "[a-z0-9.-]{1,16}",
        token in option::of(vec(any::<u8>(), 32)),
    ) {
        let mut response = Response::success("prop", address);
        response.received_hash = token.map(|bytes| {
            let mut raw = [0u8; 32];
            raw.copy_from_slice(&bytes);
            lblink_schema::ContentHash(raw)
        });
        let first = response.encode().unwrap();
        let reread = Response::decode("prop", &first).unwrap();
        prop_assert_eq!(reread.encode().unwrap(), first);
        prop_assert_eq!(reread, response);
    }
}
