//! Budget Module
//!
//! Priority arithmetic for attention allocation:
//! - Scalar priority in [0, 1] with NaN as the tombstone state
//! - Lock-free priority cells (CAS on the raw f32 bits)
//! - Pluggable merge policies with explicit overflow reporting
//! - Lazy forgetting curves (linear, exponential) evaluated on touch

mod decay;
mod merge;
mod priority;

pub use decay::Forgetting;
pub use merge::MergePolicy;
pub use priority::{is_live, Budget, CasMerge, PriorityCell, CAS_RETRY_BUDGET, TOMBSTONE};
