//! Coverability graphs of place/transition nets and their comparison with
//! reference graphs produced by other tools.

pub mod analysis;
pub mod config;
pub mod extern_tools;
pub mod net;
pub mod options;
pub mod report;
