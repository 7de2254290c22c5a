//! Frame comparison for the scan pipeline's change gate.

pub mod comparators;
pub mod factory;
pub mod gate;
pub mod sampling;

pub use comparators::{FrameComparator, SampledExactComparator, SampledLumaComparator};
pub use factory::{ComparatorFactory, ComparatorKind, ComparatorSettings};
pub use gate::ChangeGate;
pub use sampling::ComparisonReport;

#[cfg(test)]
mod tests;
