use crate::{DecodeError, Decoder, Symbol, Symbology};
use lector_image::{Image, to_gray};
use rxing::{BarcodeFormat, Exceptions};

/// [`Decoder`] backed by the `rxing` multi-format reader.
///
/// Reads the luma plane of the image and keeps only the configured
/// symbologies (all linear ones by default).
pub struct RxingDecoder {
    symbologies: Vec<Symbology>,
}

impl Default for RxingDecoder {
    fn default() -> Self {
        Self {
            symbologies: Symbology::ALL.to_vec(),
        }
    }
}

impl RxingDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict results to `symbologies`.
    pub fn with_symbologies(mut self, symbologies: Vec<Symbology>) -> Self {
        self.symbologies = symbologies;
        self
    }

    pub fn symbologies(&self) -> &[Symbology] {
        &self.symbologies
    }
}

fn symbology_of(format: &BarcodeFormat) -> Option<Symbology> {
    match format {
        BarcodeFormat::CODE_128 => Some(Symbology::Code128),
        BarcodeFormat::CODE_39 => Some(Symbology::Code39),
        BarcodeFormat::EAN_13 => Some(Symbology::Ean13),
        BarcodeFormat::EAN_8 => Some(Symbology::Ean8),
        BarcodeFormat::UPC_A => Some(Symbology::UpcA),
        BarcodeFormat::UPC_E => Some(Symbology::UpcE),
        BarcodeFormat::ITF => Some(Symbology::I25),
        BarcodeFormat::CODABAR => Some(Symbology::Codabar),
        _ => None,
    }
}

impl Decoder for RxingDecoder {
    fn name(&self) -> &str {
        "rxing"
    }

    fn reads_color(&self) -> bool {
        false
    }

    fn decode(&self, image: &Image) -> Result<Vec<Symbol>, DecodeError> {
        let gray = to_gray(image)?;
        let results = match rxing::helpers::detect_multiple_in_luma(
            gray.data.clone(),
            gray.width() as u32,
            gray.height() as u32,
        ) {
            Ok(results) => results,
            Err(Exceptions::NotFoundException(_)) => return Ok(Vec::new()),
            Err(e) => return Err(DecodeError::Backend(e.to_string())),
        };

        Ok(results
            .iter()
            .filter_map(|result| {
                let symbology = symbology_of(result.getBarcodeFormat())?;
                if !self.symbologies.contains(&symbology) {
                    log::trace!("rxing: ignoring {} symbol", symbology);
                    return None;
                }
                Some(Symbol::new(result.getText(), symbology))
            })
            .collect())
    }
}
