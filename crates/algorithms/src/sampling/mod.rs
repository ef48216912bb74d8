//! Reference point sampling
//!
//! - Stratified: per-class quota, seeded and reproducible

mod stratified;

pub use stratified::{stratified_sample, StratifiedParams};
