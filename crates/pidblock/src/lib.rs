mod allocator;
mod backoff;
mod codec;
mod error;
mod lease;
mod store;

pub use crate::allocator::*;
pub use crate::backoff::*;
pub use crate::codec::*;
pub use crate::error::*;
pub use crate::lease::*;
pub use crate::store::*;
