//! Session Core Components
//!
//! Clock, expiry arithmetic, single-flight coordination and HTTP plumbing.

pub mod clock;
pub mod expiry;
pub mod single_flight;
pub mod transport;

pub use clock::*;
pub use expiry::{
    is_expired, should_renew_soon, time_until_expiry, ExpiryPolicy, DEFAULT_LEAD_TIME,
};
pub use single_flight::*;
pub use transport::*;
