pub mod assignments;
pub mod auth;
pub mod certificates;
pub mod commissions;
pub mod core;
pub mod courses;
pub mod currencies;
pub mod orders;
pub mod progress;
pub mod ratings;
pub mod refunds;
pub mod settings;
pub mod tracking;
pub mod wallet;
