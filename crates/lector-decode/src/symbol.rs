use std::collections::HashSet;
use std::fmt;

/// Linear symbologies the pipeline accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symbology {
    Code128,
    Code39,
    Ean13,
    Ean8,
    UpcA,
    UpcE,
    /// Interleaved 2 of 5.
    I25,
    Codabar,
}

impl Symbology {
    pub const ALL: [Symbology; 8] = [
        Symbology::Code128,
        Symbology::Code39,
        Symbology::Ean13,
        Symbology::Ean8,
        Symbology::UpcA,
        Symbology::UpcE,
        Symbology::I25,
        Symbology::Codabar,
    ];

    /// Wire name, as reported to clients.
    pub fn name(&self) -> &'static str {
        match self {
            Symbology::Code128 => "CODE128",
            Symbology::Code39 => "CODE39",
            Symbology::Ean13 => "EAN13",
            Symbology::Ean8 => "EAN8",
            Symbology::UpcA => "UPCA",
            Symbology::UpcE => "UPCE",
            Symbology::I25 => "I25",
            Symbology::Codabar => "CODABAR",
        }
    }
}

impl fmt::Display for Symbology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One decoded symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub code: String,
    pub symbology: Symbology,
}

impl Symbol {
    pub fn new(code: impl Into<String>, symbology: Symbology) -> Self {
        Self {
            code: code.into(),
            symbology,
        }
    }

    /// Build from a raw payload. Returns `None` unless it is UTF-8.
    pub fn from_bytes(payload: &[u8], symbology: Symbology) -> Option<Self> {
        std::str::from_utf8(payload)
            .ok()
            .map(|code| Self::new(code, symbology))
    }
}

/// Trim payloads, drop empty ones and collapse repeats (first one wins).
pub fn normalize(symbols: Vec<Symbol>) -> Vec<Symbol> {
    let mut seen = HashSet::new();
    symbols
        .into_iter()
        .filter_map(|symbol| {
            let code = symbol.code.trim();
            if code.is_empty() || !seen.insert(code.to_string()) {
                return None;
            }
            Some(Symbol::new(code, symbol.symbology))
        })
        .collect()
}
