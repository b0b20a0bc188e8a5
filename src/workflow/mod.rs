//! Review lifecycle shared by every submission kind, plus the role policy,
//! visibility rules and dashboard aggregation built on top of it.

pub mod dashboard;
pub mod error;
pub mod lifecycle;
pub mod policy;
pub mod visibility;
