//! Math-related constructs.
pub mod matrix;
pub mod primes;
pub mod scale;
pub mod slots;
