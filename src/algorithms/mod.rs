pub mod dod;
pub mod overwrite;

#[cfg(test)]
mod dod_test;

// Re-export the pass sequence and the overwrite primitive
pub use dod::{DoDWipe, PassPattern};
pub use overwrite::{BlockOverwriter, Overwriter};
