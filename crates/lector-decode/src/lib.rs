//! Barcode decoding for the lector pipeline.
//!
//! The symbol reader itself sits behind the [`Decoder`] trait; this crate
//! decides which preprocessed variants of a frame are offered to it and in
//! which order ([`StrategySet`]), and normalizes what comes back.

pub mod error;
pub mod strategy;
pub mod symbol;
pub mod traits;

#[cfg(feature = "rxing")]
pub mod rxing;

pub use error::DecodeError;
pub use strategy::{Detection, FirstOutcome, Strategy, StrategyReport, StrategySet};
pub use symbol::{Symbol, Symbology, normalize};
pub use traits::Decoder;

#[cfg(feature = "rxing")]
pub use crate::rxing::RxingDecoder;
