//! Storage price normalization.
//!
//! The snapshot carries `StoragePricePerEpoch` as a decimal string of attoFIL
//! for the whole piece. Records store FIL per GiB per epoch.

const ATTO_PER_FIL: f64 = 1e18;
const BYTES_PER_GIB: f64 = (1u64 << 30) as f64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// Price string is not a finite decimal number.
    Invalid { raw: String },
    /// Piece size of zero cannot be priced per GiB.
    ZeroPieceSize,
}

impl std::fmt::Display for PriceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PriceError::Invalid { raw } => write!(f, "invalid storage price per epoch '{raw}'"),
            PriceError::ZeroPieceSize => write!(f, "piece size is zero"),
        }
    }
}

impl std::error::Error for PriceError {}

/// `raw / 1e18 / piece_size * 2^30`
pub fn normalize_price(raw_price: &str, piece_size: u64) -> Result<f64, PriceError> {
    if piece_size == 0 {
        return Err(PriceError::ZeroPieceSize);
    }
    let raw: f64 = raw_price
        .trim()
        .parse()
        .map_err(|_| PriceError::Invalid {
            raw: raw_price.to_string(),
        })?;
    if !raw.is_finite() {
        return Err(PriceError::Invalid {
            raw: raw_price.to_string(),
        });
    }
    Ok(raw / ATTO_PER_FIL / piece_size as f64 * BYTES_PER_GIB)
}
