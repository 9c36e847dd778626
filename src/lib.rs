//! `tmbf-trigger` - Trigger orchestration for bunch-by-bunch feedback capture
//!
//! Coordinates the DDR and BUF capture targets and the sequencer against
//! the shared trigger hardware: arming, synchronised firing, automatic
//! rearming, blanking and phase monitoring.

pub mod cli;
pub mod config;
pub mod error;
pub mod hardware;
pub mod observability;
pub mod trigger;
