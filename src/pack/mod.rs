//! Operand packing for the encrypted MNIST network.
pub mod bsgs;
pub mod diagonal;
pub mod image;
pub mod layers;
pub mod layout;
pub mod operand;
pub mod program;
