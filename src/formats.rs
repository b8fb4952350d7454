//! Supported optical-code symbologies and the active format set.

use crate::errors::ScanError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;

/// One supported optical-code symbology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FormatId {
    #[serde(rename = "QR_CODE")]
    QrCode,
    #[serde(rename = "AZTEC")]
    Aztec,
    #[serde(rename = "DATA_MATRIX")]
    DataMatrix,
    #[serde(rename = "PDF_417")]
    Pdf417,
    #[serde(rename = "MAXICODE")]
    MaxiCode,
    #[serde(rename = "CODABAR")]
    Codabar,
    #[serde(rename = "CODE_39")]
    Code39,
    #[serde(rename = "CODE_93")]
    Code93,
    #[serde(rename = "CODE_128")]
    Code128,
    #[serde(rename = "EAN_8")]
    Ean8,
    #[serde(rename = "EAN_13")]
    Ean13,
    #[serde(rename = "ITF")]
    Itf,
    #[serde(rename = "UPC_A")]
    UpcA,
    #[serde(rename = "UPC_E")]
    UpcE,
    #[serde(rename = "RSS_14")]
    Rss14,
    #[serde(rename = "RSS_EXPANDED")]
    RssExpanded,
}

/// Catalog order, used for listings and the default active set.
pub const ALL_FORMATS: [FormatId; 16] = [
    FormatId::QrCode,
    FormatId::Aztec,
    FormatId::DataMatrix,
    FormatId::Pdf417,
    FormatId::MaxiCode,
    FormatId::Codabar,
    FormatId::Code39,
    FormatId::Code93,
    FormatId::Code128,
    FormatId::Ean8,
    FormatId::Ean13,
    FormatId::Itf,
    FormatId::UpcA,
    FormatId::UpcE,
    FormatId::Rss14,
    FormatId::RssExpanded,
];

impl FormatId {
    /// Canonical identifier, as used in config files and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            FormatId::QrCode => "QR_CODE",
            FormatId::Aztec => "AZTEC",
            FormatId::DataMatrix => "DATA_MATRIX",
            FormatId::Pdf417 => "PDF_417",
            FormatId::MaxiCode => "MAXICODE",
            FormatId::Codabar => "CODABAR",
            FormatId::Code39 => "CODE_39",
            FormatId::Code93 => "CODE_93",
            FormatId::Code128 => "CODE_128",
            FormatId::Ean8 => "EAN_8",
            FormatId::Ean13 => "EAN_13",
            FormatId::Itf => "ITF",
            FormatId::UpcA => "UPC_A",
            FormatId::UpcE => "UPC_E",
            FormatId::Rss14 => "RSS_14",
            FormatId::RssExpanded => "RSS_EXPANDED",
        }
    }

    /// Human-readable label
    pub fn display_name(&self) -> &'static str {
        match self {
            FormatId::QrCode => "QR Code",
            FormatId::Aztec => "Aztec",
            FormatId::DataMatrix => "Data Matrix",
            FormatId::Pdf417 => "PDF417",
            FormatId::MaxiCode => "MaxiCode",
            FormatId::Codabar => "Codabar",
            FormatId::Code39 => "Code 39",
            FormatId::Code93 => "Code 93",
            FormatId::Code128 => "Code 128",
            FormatId::Ean8 => "EAN-8",
            FormatId::Ean13 => "EAN-13",
            FormatId::Itf => "ITF",
            FormatId::UpcA => "UPC-A",
            FormatId::UpcE => "UPC-E",
            FormatId::Rss14 => "GS1 DataBar",
            FormatId::RssExpanded => "GS1 DataBar Expanded",
        }
    }

    /// Matrix (2D) symbologies as opposed to linear barcodes.
    pub fn is_two_dimensional(&self) -> bool {
        matches!(
            self,
            FormatId::QrCode
                | FormatId::Aztec
                | FormatId::DataMatrix
                | FormatId::Pdf417
                | FormatId::MaxiCode
        )
    }
}

impl std::fmt::Display for FormatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormatId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        ALL_FORMATS
            .iter()
            .copied()
            .find(|f| f.as_str() == normalized)
            .ok_or_else(|| format!("Unknown format: {}", s))
    }
}

/// Catalog entry for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatDescriptor {
    pub id: FormatId,
    pub name: String,
    pub two_dimensional: bool,
}

/// Full catalog, in catalog order.
pub fn catalog() -> Vec<FormatDescriptor> {
    ALL_FORMATS
        .iter()
        .map(|id| FormatDescriptor {
            id: *id,
            name: id.display_name().to_string(),
            two_dimensional: id.is_two_dimensional(),
        })
        .collect()
}

/// Set of enabled formats. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<FormatId>", into = "Vec<FormatId>")]
pub struct FormatSet {
    formats: BTreeSet<FormatId>,
}

impl FormatSet {
    pub fn new<I: IntoIterator<Item = FormatId>>(formats: I) -> Result<Self, ScanError> {
        let formats: BTreeSet<FormatId> = formats.into_iter().collect();
        if formats.is_empty() {
            return Err(ScanError::EmptyFormatSet);
        }
        Ok(Self { formats })
    }

    pub fn all() -> Self {
        Self {
            formats: ALL_FORMATS.iter().copied().collect(),
        }
    }

    pub fn single(format: FormatId) -> Self {
        Self {
            formats: BTreeSet::from([format]),
        }
    }

    pub fn contains(&self, format: FormatId) -> bool {
        self.formats.contains(&format)
    }

    pub fn len(&self) -> usize {
        self.formats.len()
    }

    /// Always false; kept for API symmetry with collections.
    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = FormatId> + '_ {
        self.formats.iter().copied()
    }

    /// Flip one format on or off. Removing the last enabled format puts it
    /// straight back, so the set never becomes empty. Returns whether the
    /// format is enabled afterwards.
    pub fn toggle(&mut self, format: FormatId) -> bool {
        if self.formats.remove(&format) {
            if self.formats.is_empty() {
                log::debug!("Refusing to disable last active format {}", format);
                self.formats.insert(format);
                return true;
            }
            false
        } else {
            self.formats.insert(format);
            true
        }
    }
}

impl Default for FormatSet {
    fn default() -> Self {
        Self::all()
    }
}

impl TryFrom<Vec<FormatId>> for FormatSet {
    type Error = ScanError;

    fn try_from(value: Vec<FormatId>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<FormatSet> for Vec<FormatId> {
    fn from(value: FormatSet) -> Self {
        value.formats.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_covers_every_format() {
        let catalog = catalog();
        assert_eq!(catalog.len(), ALL_FORMATS.len());
        assert_eq!(catalog[0].id, FormatId::QrCode);
        assert_eq!(catalog[0].name, "QR Code");
        assert!(catalog[0].two_dimensional);
        assert!(!FormatId::Ean13.is_two_dimensional());
    }

    #[test]
    fn test_parse_round_trips_canonical_ids() {
        for format in ALL_FORMATS {
            assert_eq!(format.as_str().parse::<FormatId>().unwrap(), format);
        }
        assert_eq!("ean-13".parse::<FormatId>().unwrap(), FormatId::Ean13);
        assert_eq!("qr code".parse::<FormatId>().unwrap(), FormatId::QrCode);
        assert!("EAN_14".parse::<FormatId>().is_err());
    }

    #[test]
    fn test_serde_uses_canonical_ids() {
        let json = serde_json::to_string(&FormatId::Ean13).unwrap();
        assert_eq!(json, "\"EAN_13\"");
        let parsed: FormatId = serde_json::from_str("\"CODE_128\"").unwrap();
        assert_eq!(parsed, FormatId::Code128);
    }

    #[test]
    fn test_empty_set_rejected() {
        assert_eq!(FormatSet::new([]), Err(ScanError::EmptyFormatSet));
        let parsed: Result<FormatSet, _> = serde_json::from_str("[]");
        assert!(parsed.is_err());
    }

    #[test]
    fn test_toggle_falls_back_to_last_removed() {
        let mut set = FormatSet::new([FormatId::QrCode, FormatId::Ean13]).unwrap();
        assert!(!set.toggle(FormatId::QrCode));
        assert_eq!(set.len(), 1);

        // Removing the only remaining format leaves it enabled.
        assert!(set.toggle(FormatId::Ean13));
        assert!(set.contains(FormatId::Ean13));
        assert_eq!(set.len(), 1);

        assert!(set.toggle(FormatId::Code39));
        assert_eq!(set.len(), 2);
    }
}
