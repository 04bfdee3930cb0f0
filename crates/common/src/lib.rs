pub mod account;
pub mod fork;
pub mod log;
pub mod utils;

pub use account::Account;
pub use fork::Fork;
pub use log::Log;

pub use ethereum_types::{H160, H256, U256, U512};

/// A 160-bit account identifier.
pub type Address = H160;
