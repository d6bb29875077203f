pub mod client;
pub mod method;
pub mod model;
pub mod stub;

pub use client::{dispatch, LiteClient};
pub use method::LiteMethod;
pub use stub::StubLiteClient;

#[cfg(test)]
test_r::enable!();
