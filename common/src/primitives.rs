pub use alloy::primitives::{Address, Bytes, B256, U256, U64};

/// The chain id used to derive and validate signatures (EIP-155). Fixed: this
/// deployment does not support multiple chains sharing one signer.
pub const CHAIN_ID: u64 = 1;

pub trait ToSaturatedU64 {
    fn to_saturated_u64(self) -> u64;
}

impl ToSaturatedU64 for U256 {
    fn to_saturated_u64(self) -> u64 {
        match self.into_limbs() {
            [value, 0, 0, 0] => value,
            _ => u64::MAX,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(U256::from_limbs([4, 4, 0, 0]), u64::MAX; "greater than u64::MAX")]
    #[test_case(U256::from_limbs([4, 0, 0, 0]), 4; "fits in u64")]
    fn saturates_at_numerical_bound(n: U256, expected: u64) {
        assert_eq!(n.to_saturated_u64(), expected);
    }
}
