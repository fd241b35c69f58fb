use alloy::primitives::U256;
use fastnum::{
    bint,
    decimal::{Context, RoundingMode, UnsignedDecimal},
};

use crate::error::BindingError;

/// Converter between raw token amounts and decimals, scaled by
/// the token's `decimals()`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Converter {
    decimals: i32,
}

impl Converter {
    pub fn new(decimals: u8) -> Self {
        Self {
            decimals: decimals as i32,
        }
    }

    pub fn decimals(&self) -> u8 {
        self.decimals as u8
    }

    /// Scales a raw amount down, `1234567890` at 6 decimals is `1234.56789`.
    pub fn from_unsigned<const N: usize>(
        &self,
        value: U256,
    ) -> Result<UnsignedDecimal<N>, BindingError> {
        let unscaled = bint::UInt::<N>::from_le_slice(value.as_le_slice()).ok_or_else(|| {
            BindingError::CodecRange(format!("{value} does not fit {N}-word decimal"))
        })?;
        Ok(UnsignedDecimal::<N>::from_parts(
            unscaled,
            -self.decimals,
            Context::default().with_rounding_mode(RoundingMode::Floor),
        ))
    }

    /// Scales a decimal amount up to the raw amount.
    ///
    /// Amounts finer than the token's decimals are rejected rather than rounded.
    pub fn to_unsigned<const N: usize>(
        &self,
        value: UnsignedDecimal<N>,
    ) -> Result<U256, BindingError> {
        let rescaled = value.rescale(self.decimals as i16);
        if rescaled != value {
            return Err(BindingError::CodecRange(format!(
                "{value} has more than {} fractional digits",
                self.decimals
            )));
        }
        U256::try_from_le_slice(rescaled.digits().to_radix_le(256).as_slice())
            .ok_or_else(|| BindingError::CodecRange(format!("{value} does not fit uint256")))
    }
}
