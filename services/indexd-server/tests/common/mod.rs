// Common test utilities and fixtures

pub mod client;

// Re-export commonly used items
// Note: Each integration test binary uses a different subset
#[allow(unused_imports)]
pub use client::TestClient;
#[allow(unused_imports)]
pub use helpers::{
    create_test_services, create_test_services_with, next_event, write_file, wait_for,
    TestServices,
};
