pub mod receipt;
pub mod slot;
pub mod types;

pub use receipt::{Receipt, SignatureInfo};
pub use slot::{InvalidStartSlot, Slot, StartSlot};
pub use types::{Address, BlockHash, Commitment, ParseError, Signature};
