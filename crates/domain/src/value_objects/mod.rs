pub mod affinity;
pub mod heat;
pub mod power_tier;

pub use affinity::{Affinity, Disposition, DispositionMilestone};
pub use heat::Heat;
pub use power_tier::{composition_for_gap, PowerTier};
