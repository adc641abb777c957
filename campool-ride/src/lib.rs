pub mod expiry;
pub mod service;

pub use expiry::{ExpirationSweeper, SweepSummary};
pub use service::{RideDraft, RideFilter, RideService};
