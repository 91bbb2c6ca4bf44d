use crate::blockchain::core::chain::Block;
use crate::error::ChainError;
use crate::miner;

/// Checks block numbering, hash linkage and proof-of-work.
///
/// Every block's index must equal its 1-based position. A genesis-only chain
/// is trivially valid; an empty chain is not a chain.
pub fn validate_chain(chain: &[Block]) -> Result<(), ChainError> {
    if chain.is_empty() {
        return Err(ChainError::InvalidChain("Chain is empty".to_string()));
    }

    for (position, block) in (1u64..).zip(chain) {
        if block.index != position {
            return Err(ChainError::InvalidBlockIndex {
                position,
                index: block.index,
            });
        }
    }

    for pair in chain.windows(2) {
        let (prev, curr) = (&pair[0], &pair[1]);

        if curr.previous_hash != prev.hash() {
            return Err(ChainError::InvalidBlockLinkage { index: curr.index });
        }

        if !miner::verify(prev.proof, curr.proof) {
            return Err(ChainError::InvalidProofOfWork { index: curr.index });
        }
    }

    Ok(())
}

pub fn is_valid_chain(chain: &[Block]) -> bool {
    validate_chain(chain).is_ok()
}
