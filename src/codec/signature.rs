use alloy::primitives::{B256, Selector, keccak256};
use itertools::Itertools;

use crate::schema::TypeSpec;

/// Canonical signature `name(type1,type2,...)`, parameter names stripped.
pub fn signature(name: &str, types: &[TypeSpec]) -> String {
    format!("{}({})", name.trim(), types.iter().map(TypeSpec::canonical).join(","))
}

/// First 4 bytes of the keccak-256 hash of the canonical method signature.
pub fn selector(signature: &str) -> Selector {
    Selector::from_slice(&keccak256(signature.as_bytes())[..4])
}

/// Keccak-256 hash of the canonical event signature.
pub fn topic0(signature: &str) -> B256 {
    keccak256(signature.as_bytes())
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{b256, hex};

    use super::*;

    #[test]
    fn test_known_selectors() {
        for (sig, expected) in [
            ("transfer(address,uint256)", hex!("a9059cbb")),
            ("balanceOf(address)", hex!("70a08231")),
            ("approve(address,uint256)", hex!("095ea7b3")),
            ("transferFrom(address,address,uint256)", hex!("23b872dd")),
            ("totalSupply()", hex!("18160ddd")),
            ("decimals()", hex!("313ce567")),
            ("Error(string)", hex!("08c379a0")),
        ] {
            assert_eq!(selector(sig), Selector::from(expected), "{sig}");
        }
    }

    #[test]
    fn test_known_topics() {
        assert_eq!(
            topic0("Transfer(address,address,uint256)"),
            b256!("ddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef")
        );
        assert_eq!(
            topic0("Approval(address,address,uint256)"),
            b256!("8c5be1e5ebec7d5bd14f71427d1e84f3dd0314c0f7b2291e5b200ac8c7c3b925")
        );
    }

    #[test]
    fn test_signature_canonical_names() {
        let types = vec![
            "uint".parse().unwrap(),
            " address ".parse().unwrap(),
            "(int,bytes32)[]".parse().unwrap(),
        ];
        assert_eq!(
            signature(" swap ", &types),
            "swap(uint256,address,(int256,bytes32)[])"
        );
    }
}
