//! Quality-score encoding detection.
//!
//! Records carry raw Phred values after decoding, so an Illumina 1.3-1.7 file whose
//! text qualities were offset by 64 shows up with every value 31 higher than it
//! should be. [`QualityEncodingDetector`] samples qualities per read group and
//! guesses the original scale from the observed range, using the ASCII bounds of
//! each scale:
//!
//! | encoding | ASCII range |
//! |----------|-------------|
//! | Standard (Phred+33) | 33-126 |
//! | Solexa (Solexa+64)  | 59-126 |
//! | Illumina (Phred+64) | 64-126 |

use ahash::AHashMap;
use bstr::ByteSlice;
use log::info;
use std::fmt;

use crate::errors::RevertError;

/// Default number of records sampled per read group.
pub const DEFAULT_MAX_RECORDS_TO_SAMPLE: usize = 10_000;

/// Value subtracted from Illumina-scaled qualities to obtain Phred values.
pub const ILLUMINA_TO_PHRED_SUBTRAHEND: u8 = 31;

const PHRED_ASCII_OFFSET: u16 = 33;
const MAX_PRINTABLE_ASCII: u16 = 126;
const SOLEXA_MIN_ASCII: u16 = 59;
const ILLUMINA_MIN_ASCII: u16 = 64;
/// Below this maximum a +64 guess is too likely to be high-quality Phred+33 data.
const MIN_PLAUSIBLE_MAX_ASCII: u16 = 75;

/// Placeholder name used in logs and errors for records without an `RG` tag.
const NO_READ_GROUP: &str = "<no read group>";

/// Quality-score scale of a read group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityEncoding {
    /// Phred+33 (Sanger / Illumina 1.8+)
    Standard,
    /// Phred+64 (Illumina 1.3-1.7)
    Illumina,
    /// Solexa+64 (Solexa / Illumina 1.0)
    Solexa,
}

impl QualityEncoding {
    /// Amount to subtract from stored qualities to reach the Phred scale.
    ///
    /// `None` for Standard, which needs no conversion, and for Solexa, which has no
    /// linear conversion.
    #[must_use]
    pub fn phred_subtrahend(&self) -> Option<u8> {
        match self {
            Self::Illumina => Some(ILLUMINA_TO_PHRED_SUBTRAHEND),
            Self::Standard | Self::Solexa => None,
        }
    }
}

impl fmt::Display for QualityEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Standard => "Standard",
            Self::Illumina => "Illumina",
            Self::Solexa => "Solexa",
        };
        f.write_str(name)
    }
}

/// Running min/max of the ASCII-encoded qualities seen for one read group.
#[derive(Debug, Clone, Copy)]
struct QualityRange {
    records: usize,
    bases: u64,
    min: u16,
    max: u16,
}

impl Default for QualityRange {
    fn default() -> Self {
        Self { records: 0, bases: 0, min: u16::MAX, max: 0 }
    }
}

impl QualityRange {
    fn observe(&mut self, quals: &[u8]) {
        self.records += 1;
        for &q in quals {
            let ascii = u16::from(q) + PHRED_ASCII_OFFSET;
            self.min = self.min.min(ascii);
            self.max = self.max.max(ascii);
        }
        self.bases += quals.len() as u64;
    }

    fn encoding(&self, read_group: &str) -> Result<QualityEncoding, RevertError> {
        if self.bases == 0 {
            return Ok(QualityEncoding::Standard);
        }
        if self.max > MAX_PRINTABLE_ASCII {
            return Err(RevertError::InvalidQualityScores {
                read_group: read_group.to_string(),
                min: self.min,
                max: self.max,
            });
        }

        let encoding = if self.min < SOLEXA_MIN_ASCII || self.max < MIN_PLAUSIBLE_MAX_ASCII {
            QualityEncoding::Standard
        } else if self.min >= ILLUMINA_MIN_ASCII {
            QualityEncoding::Illumina
        } else {
            QualityEncoding::Solexa
        };
        Ok(encoding)
    }
}

/// Samples record qualities per read group.
#[derive(Debug)]
pub struct QualityEncodingDetector {
    max_records: usize,
    ranges: AHashMap<Option<Vec<u8>>, QualityRange>,
}

impl Default for QualityEncodingDetector {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RECORDS_TO_SAMPLE)
    }
}

impl QualityEncodingDetector {
    /// Creates a detector that samples at most `max_records` records per read group.
    #[must_use]
    pub fn new(max_records: usize) -> Self {
        Self { max_records, ranges: AHashMap::new() }
    }

    /// Observes the qualities of one record. Records beyond the per-group sample size
    /// are ignored.
    pub fn observe(&mut self, read_group: Option<&[u8]>, quals: &[u8]) {
        let range = self.ranges.entry(read_group.map(<[u8]>::to_vec)).or_default();
        if range.records < self.max_records {
            range.observe(quals);
        }
    }

    /// Resolves the encoding of every observed read group and logs each one.
    ///
    /// # Errors
    /// Returns an error if a group's qualities fall outside the printable range.
    pub fn detect(&self) -> Result<QualityEncodings, RevertError> {
        let mut encodings = AHashMap::with_capacity(self.ranges.len());
        let mut names: Vec<&Option<Vec<u8>>> = self.ranges.keys().collect();
        names.sort();
        for read_group in names {
            let display = read_group
                .as_deref()
                .map_or_else(|| NO_READ_GROUP.to_string(), |rg| rg.to_str_lossy().into_owned());
            let encoding = self.ranges[read_group].encoding(&display)?;
            info!("Detected quality format for {display}: {encoding}");
            encodings.insert(read_group.clone(), encoding);
        }
        Ok(QualityEncodings { encodings })
    }
}

/// Detected encodings by read group. Unknown groups are Standard.
#[derive(Debug, Default, Clone)]
pub struct QualityEncodings {
    encodings: AHashMap<Option<Vec<u8>>, QualityEncoding>,
}

impl QualityEncodings {
    /// Builds from explicit assignments.
    #[must_use]
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (Option<&'a [u8]>, QualityEncoding)>) -> Self {
        let encodings = pairs.into_iter().map(|(rg, e)| (rg.map(<[u8]>::to_vec), e)).collect();
        Self { encodings }
    }

    /// Encoding for a read group.
    #[must_use]
    pub fn get(&self, read_group: Option<&[u8]>) -> QualityEncoding {
        self.encodings
            .get(&read_group.map(<[u8]>::to_vec))
            .copied()
            .unwrap_or(QualityEncoding::Standard)
    }

    /// Fails if any read group uses an encoding with no conversion to Phred.
    ///
    /// # Errors
    /// Returns [`RevertError::UnsupportedQualityEncoding`] for Solexa.
    pub fn ensure_convertible(&self) -> Result<(), RevertError> {
        if self.encodings.values().any(|e| *e == QualityEncoding::Solexa) {
            return Err(RevertError::UnsupportedQualityEncoding {
                encoding: QualityEncoding::Solexa.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Raw Phred values whose ASCII encoding spans `lo..=hi`.
    fn ascii_range(lo: u8, hi: u8) -> Vec<u8> {
        (lo..=hi).map(|a| a - 33).collect()
    }

    #[test]
    fn test_standard_when_low_values_seen() {
        let mut detector = QualityEncodingDetector::default();
        detector.observe(Some(b"rg1"), &ascii_range(35, 74));
        let encodings = detector.detect().unwrap();
        assert_eq!(encodings.get(Some(b"rg1")), QualityEncoding::Standard);
    }

    #[test]
    fn test_illumina_when_all_values_high() {
        let mut detector = QualityEncodingDetector::default();
        detector.observe(Some(b"rg1"), &ascii_range(66, 104));
        detector.observe(Some(b"rg2"), &ascii_range(33, 70));
        let encodings = detector.detect().unwrap();
        assert_eq!(encodings.get(Some(b"rg1")), QualityEncoding::Illumina);
        assert_eq!(encodings.get(Some(b"rg2")), QualityEncoding::Standard);
        encodings.ensure_convertible().unwrap();
    }

    #[test]
    fn test_narrow_high_range_stays_standard() {
        let mut detector = QualityEncodingDetector::default();
        detector.observe(None, &ascii_range(65, 72));
        assert_eq!(detector.detect().unwrap().get(None), QualityEncoding::Standard);
    }

    #[test]
    fn test_solexa_detected_and_rejected() {
        let mut detector = QualityEncodingDetector::default();
        detector.observe(Some(b"old"), &ascii_range(60, 100));
        let encodings = detector.detect().unwrap();
        assert_eq!(encodings.get(Some(b"old")), QualityEncoding::Solexa);
        let err = encodings.ensure_convertible().unwrap_err();
        assert!(err.to_string().contains("Solexa"));
    }

    #[test]
    fn test_out_of_range_is_an_error() {
        let mut detector = QualityEncodingDetector::default();
        detector.observe(Some(b"bad"), &[10, 120]);
        assert!(matches!(detector.detect(), Err(RevertError::InvalidQualityScores { .. })));
    }

    #[test]
    fn test_sampling_stops_after_max_records() {
        let mut detector = QualityEncodingDetector::new(2);
        detector.observe(Some(b"rg"), &ascii_range(70, 104));
        detector.observe(Some(b"rg"), &ascii_range(70, 104));
        // A third, low-valued record is beyond the sample and must not flip the call.
        detector.observe(Some(b"rg"), &[0, 1, 2]);
        assert_eq!(detector.detect().unwrap().get(Some(b"rg")), QualityEncoding::Illumina);
    }

    #[test]
    fn test_unobserved_groups_and_empty_qualities_are_standard() {
        let mut detector = QualityEncodingDetector::default();
        detector.observe(Some(b"rg"), &[]);
        let encodings = detector.detect().unwrap();
        assert_eq!(encodings.get(Some(b"rg")), QualityEncoding::Standard);
        assert_eq!(encodings.get(Some(b"other")), QualityEncoding::Standard);
    }

    #[test]
    fn test_phred_subtrahend() {
        assert_eq!(QualityEncoding::Illumina.phred_subtrahend(), Some(31));
        assert_eq!(QualityEncoding::Standard.phred_subtrahend(), None);
    }
}
