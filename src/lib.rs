//! service-rules - Rule-driven service classification
//!
//! Maps discovered container endpoints to service types using ordered,
//! declarative signature files. Instances are projected into a flat attribute
//! namespace, each candidate ruleset is compiled and evaluated against it, and
//! the first match assigns the service type.

pub mod attributes;
pub mod cli;
pub mod config;
pub mod error;
pub mod filtering;
pub mod ruler;
pub mod services;
pub mod signatures;

pub use error::{Result, ServiceRulesError};
pub use filtering::RuleFilter;
