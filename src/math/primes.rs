//! The ordered chain of level primes consumed by rescaling.
use crate::error::{PackError, Result};
use once_cell::sync::Lazy;

/// Level primes, lowest level first. `LEVEL_PRIMES[level - 1]` is the modulus dropped by the next
/// rescale of a value at `level`.
pub const LEVEL_PRIMES: [u64; 64] = [
    204865537, 205651969, 206307329, 207880193, 209059841, 210370561, 211025921, 211812353,
    214171649, 215482369, 215744513, 216137729, 216924161, 217317377, 218628097, 219676673,
    220594177, 221249537, 222035969, 222167041, 222953473, 223215617, 224002049, 224133121,
    225574913, 228065281, 228458497, 228720641, 230424577, 230686721, 230817793, 231473153,
    232390657, 232652801, 234356737, 235798529, 236584961, 236716033, 239337473, 239861761,
    240648193, 241827841, 244842497, 244973569, 245235713, 245760001, 246415361, 249561089,
    253100033, 253493249, 254279681, 256376833, 256770049, 257949697, 258605057, 260571137,
    260702209, 261488641, 261881857, 263323649, 263454721, 264634369, 265420801, 268042241,
];

static GLOBAL_CHAIN: Lazy<PrimeChain> = Lazy::new(|| PrimeChain::new(LEVEL_PRIMES.to_vec()));

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrimeChain {
    primes: Vec<u64>,
}

impl PrimeChain {
    pub fn new(primes: Vec<u64>) -> Self {
        Self { primes }
    }

    /// The process-wide chain built from [`LEVEL_PRIMES`].
    pub fn global() -> &'static PrimeChain {
        &GLOBAL_CHAIN
    }

    pub fn len(&self) -> usize {
        self.primes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primes.is_empty()
    }

    /// Returns the prime consumed when rescaling a value at `level`, i.e. `primes[level - 1]`.
    pub fn at_level(&self, level: usize) -> Result<u64> {
        if level == 0 {
            return Err(PackError::InvalidLevel { level: 0 });
        }
        self.primes
            .get(level - 1)
            .copied()
            .ok_or(PackError::LevelOutOfRange {
                level,
                available: self.primes.len(),
            })
    }

    /// The `(primes[level - 1], primes[level - 2])` pair a linear layer at `level` is scaled by.
    pub fn matrix_primes(&self, level: usize) -> Result<(u64, u64)> {
        if level < 2 {
            return Err(PackError::InvalidLevel {
                level: level.saturating_sub(1),
            });
        }
        Ok((self.at_level(level)?, self.at_level(level - 1)?))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_global_chain() {
        let chain = PrimeChain::global();
        assert_eq!(chain.len(), 64);
        assert_eq!(chain.at_level(1), Ok(204865537));
        assert_eq!(chain.at_level(64), Ok(268042241));
        assert!(LEVEL_PRIMES.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_at_level_bounds() {
        let chain = PrimeChain::new(vec![11, 13]);
        assert_eq!(chain.at_level(0), Err(PackError::InvalidLevel { level: 0 }));
        assert_eq!(
            chain.at_level(3),
            Err(PackError::LevelOutOfRange {
                level: 3,
                available: 2
            })
        );
        assert_eq!(chain.matrix_primes(2), Ok((13, 11)));
        assert!(matches!(
            chain.matrix_primes(1),
            Err(PackError::InvalidLevel { .. })
        ));
    }
}
