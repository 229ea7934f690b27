pub mod address_set;
pub mod config;
pub mod error;
pub mod logging;
pub mod template;
pub mod traits;

pub use tracing;

pub use self::address_set::AddressSet;
