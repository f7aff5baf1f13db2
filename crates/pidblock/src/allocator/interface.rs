use core::fmt;

use crate::ProducerId;

/// A minimal interface for handing out producer IDs.
///
/// Consumers such as a transaction coordinator depend on this capability
/// rather than on a concrete allocator.
pub trait ProducerIdGenerator {
    /// The error type returned by [`ProducerIdGenerator::generate_producer_id`].
    type Err: fmt::Debug;

    /// Returns the next producer ID.
    ///
    /// IDs from one generator are dense and strictly increasing; IDs from
    /// different generators never collide.
    ///
    /// # Errors
    ///
    /// Implementation specific; see the implementor's error type.
    fn generate_producer_id(&self) -> Result<ProducerId, Self::Err>;

    /// Stops the generator and reports the last producer ID it handed out,
    /// if any.
    ///
    /// # Errors
    ///
    /// Implementation specific; see the implementor's error type.
    fn shutdown(&self) -> Result<Option<ProducerId>, Self::Err>;
}
