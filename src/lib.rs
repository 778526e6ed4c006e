//! Content-addressed filesystem catalog and hardlink-deduplication
//! engine: scans directory trees into a persistent catalog, resolves
//! byte-identical files into hardlinks, groups files into payloads, and
//! reconciles payloads against an external torrent-client view.

pub mod catalog;
pub mod config;
pub mod dedup;
pub mod error;
pub mod identity;
pub mod payload;
pub mod scanner;
pub mod telemetry;
