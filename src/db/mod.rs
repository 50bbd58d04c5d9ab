//! Persistence for accounts, the catalog, enrollments and progress.
//!
//! Every function takes the pool and returns `AppError`; multi-statement
//! operations run inside one transaction so a failure leaves nothing behind.

pub mod accounts;
pub mod approvals;
pub mod courses;
pub mod enrollments;
pub mod lessons;
pub mod progress;
pub mod sessions;

pub use accounts::*;
pub use approvals::*;
pub use courses::*;
pub use enrollments::*;
pub use lessons::*;
pub use progress::*;
pub use sessions::*;
