pub mod analysis;
pub mod company;
pub mod liveness;
pub mod readiness;
pub mod upload;
