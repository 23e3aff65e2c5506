//! Ordered preprocessing strategies.
//!
//! Every strategy turns the captured frame into one candidate image and hands
//! it to the [`Decoder`]. The worker path ([`StrategySet::decode_first`])
//! stops at the first strategy that yields a symbol; the diagnostic path
//! ([`StrategySet::decode_all`]) runs them all and keeps every result.

use crate::{DecodeError, Decoder, Symbol, normalize};
use lector_image::{Image, ImageError, adjust_contrast, otsu_threshold, sharpen, to_gray};
use std::borrow::Cow;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

// contrast stretch parameters
const CONTRAST_ALPHA: f32 = 1.5;
const CONTRAST_BETA: f32 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    RawColor,
    Grayscale,
    GrayscaleContrast,
    GrayscaleSharpened,
    GrayscaleThreshold,
}

impl Strategy {
    /// Default priority order.
    pub const ALL: [Strategy; 5] = [
        Strategy::RawColor,
        Strategy::Grayscale,
        Strategy::GrayscaleContrast,
        Strategy::GrayscaleSharpened,
        Strategy::GrayscaleThreshold,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Strategy::RawColor => "raw_color",
            Strategy::Grayscale => "grayscale",
            Strategy::GrayscaleContrast => "grayscale_contrast",
            Strategy::GrayscaleSharpened => "grayscale_sharpened",
            Strategy::GrayscaleThreshold => "grayscale_threshold",
        }
    }

    pub fn needs_gray(&self) -> bool {
        !matches!(self, Strategy::RawColor)
    }

    /// Build this strategy's candidate image.
    ///
    /// `gray` must be the grayscale version of `color`; it is only read by
    /// strategies that [`need_gray`](Self::needs_gray).
    pub fn prepare<'a>(&self, color: &'a Image, gray: &'a Image) -> Result<Cow<'a, Image>, ImageError> {
        match self {
            Strategy::RawColor => Ok(Cow::Borrowed(color)),
            Strategy::Grayscale => Ok(Cow::Borrowed(gray)),
            Strategy::GrayscaleContrast => {
                adjust_contrast(gray, CONTRAST_ALPHA, CONTRAST_BETA).map(Cow::Owned)
            }
            Strategy::GrayscaleSharpened => sharpen(gray).map(Cow::Owned),
            Strategy::GrayscaleThreshold => otsu_threshold(gray).map(|(_, binary)| Cow::Owned(binary)),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Symbols found by one strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub strategy: Strategy,
    pub symbols: Vec<Symbol>,
}

/// Result of [`StrategySet::decode_first`].
#[derive(Debug, Default)]
pub struct FirstOutcome {
    /// The first strategy that found anything, if any did.
    pub detection: Option<Detection>,
    /// Strategies tried before that which failed outright.
    pub errors: Vec<(Strategy, DecodeError)>,
}

/// Result of one strategy in [`StrategySet::decode_all`].
#[derive(Debug)]
pub struct StrategyReport {
    pub strategy: Strategy,
    /// The candidate image the decoder saw, when it could be built.
    pub image: Option<Image>,
    pub result: Result<Vec<Symbol>, DecodeError>,
}

/// An ordered list of strategies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategySet {
    strategies: Vec<Strategy>,
}

impl Default for StrategySet {
    fn default() -> Self {
        Self {
            strategies: Strategy::ALL.to_vec(),
        }
    }
}

// run the decoder, turning a panic into an error
fn guarded_decode(decoder: &dyn Decoder, image: &Image) -> Result<Vec<Symbol>, DecodeError> {
    match panic::catch_unwind(AssertUnwindSafe(|| decoder.decode(image))) {
        Ok(result) => result.map(normalize),
        Err(payload) => {
            let msg = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(DecodeError::Panic(msg))
        }
    }
}

impl StrategySet {
    /// Strategies in the given order. Repeats are dropped.
    pub fn new(strategies: impl IntoIterator<Item = Strategy>) -> Self {
        let mut ordered = Vec::new();
        for strategy in strategies {
            if !ordered.contains(&strategy) {
                ordered.push(strategy);
            }
        }
        Self { strategies: ordered }
    }

    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    /// The strategies worth running with `decoder`: `RawColor` would hand a
    /// luma-only reader the same pixels as `Grayscale`, so it is left out.
    pub fn applicable(&self, decoder: &dyn Decoder) -> Vec<Strategy> {
        let reads_color = decoder.reads_color();
        self.strategies
            .iter()
            .copied()
            .filter(|strategy| reads_color || strategy.needs_gray())
            .collect()
    }

    /// Try each strategy in order and stop at the first one that decodes at
    /// least one symbol. Failing strategies are recorded and skipped.
    pub fn decode_first(&self, decoder: &dyn Decoder, image: &Image) -> FirstOutcome {
        let mut outcome = FirstOutcome::default();
        // grayscale is shared by every gray strategy, so convert once
        let mut gray: Option<Cow<'_, Image>> = None;

        for strategy in self.applicable(decoder) {
            if strategy.needs_gray() && gray.is_none() {
                match to_gray(image) {
                    Ok(converted) => gray = Some(converted),
                    Err(e) => {
                        outcome.errors.push((strategy, e.into()));
                        continue;
                    }
                }
            }
            let gray_ref = gray.as_deref().unwrap_or(image);

            let candidate = match strategy.prepare(image, gray_ref) {
                Ok(candidate) => candidate,
                Err(e) => {
                    outcome.errors.push((strategy, e.into()));
                    continue;
                }
            };

            match guarded_decode(decoder, &candidate) {
                Ok(symbols) if !symbols.is_empty() => {
                    outcome.detection = Some(Detection { strategy, symbols });
                    break;
                }
                Ok(_) => {}
                Err(e) => outcome.errors.push((strategy, e)),
            }
        }

        outcome
    }

    /// Run every applicable strategy, for diagnostics.
    pub fn decode_all(&self, decoder: &dyn Decoder, image: &Image) -> Vec<StrategyReport> {
        let gray = to_gray(image);

        self.applicable(decoder)
            .into_iter()
            .map(|strategy| {
                let candidate = match &gray {
                    Ok(gray) => strategy.prepare(image, gray).map_err(DecodeError::from),
                    Err(e) if strategy.needs_gray() => Err(DecodeError::Backend(e.to_string())),
                    Err(_) => Ok(Cow::Borrowed(image)),
                };
                match candidate {
                    Ok(candidate) => {
                        let result = guarded_decode(decoder, &candidate);
                        StrategyReport {
                            strategy,
                            image: Some(candidate.into_owned()),
                            result,
                        }
                    }
                    Err(e) => StrategyReport {
                        strategy,
                        image: None,
                        result: Err(e),
                    },
                }
            })
            .collect()
    }
}
