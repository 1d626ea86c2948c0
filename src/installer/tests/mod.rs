use super::test_helpers::*;
use super::*;
use crate::error::{ExtractError, IntegrityError, MetadataError, TransportError};
use crate::types::{LibraryOutcome, NativesOutcome, UnitOutcome};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};


/// Serve `body` at `route`, asserting it is requested exactly `times` times
async fn serve(server: &MockServer, route: &str, body: &[u8], times: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .expect(times)
        .mount(server)
        .await;
}
