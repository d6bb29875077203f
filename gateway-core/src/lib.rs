pub mod cache;
pub mod consensus;
pub mod dispatcher;
pub mod get_transactions;
pub mod manager;
pub mod supervisor;

pub use manager::Manager;
pub use supervisor::ClientFactory;

#[cfg(test)]
test_r::enable!();
