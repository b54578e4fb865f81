#![allow(dead_code)]

use recordkit::{ClientConfig, MockCloud, RecordClient};

pub type MockClient = RecordClient<MockCloud, MockCloud>;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn client_with(cloud: &MockCloud) -> MockClient {
    init_tracing();
    RecordClient::with_service(ClientConfig::default(), cloud.clone())
}
