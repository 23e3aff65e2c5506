use crate::{DecodeError, Symbol};
use lector_image::Image;

/// Symbol reader capability.
///
/// Implementations take RGB or grayscale images and return every symbol
/// they find, in any order. Finding nothing is `Ok(vec![])`, not an error.
pub trait Decoder: Send + Sync {
    fn name(&self) -> &str;

    fn decode(&self, image: &Image) -> Result<Vec<Symbol>, DecodeError>;

    /// Whether colour carries information for this reader. A luma-only
    /// reader sees an RGB frame exactly as its grayscale conversion.
    fn reads_color(&self) -> bool {
        true
    }
}
