mod config;
mod interface;
mod lock;
mod mutex;
mod phase;

pub use config::*;
pub use interface::*;
pub use lock::*;
pub(crate) use mutex::*;
pub use phase::*;
