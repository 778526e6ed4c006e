//! Collision promotion, duplicate analysis, and hardlink plan building
//! and execution (spec.md §4.4-§4.7).

pub mod analyzer;
pub mod collision;
pub mod plan;
