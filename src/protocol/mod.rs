//! Wire protocol: constants, codec, frame abstraction and receive parser.

pub mod frame;
pub mod rx_parser;
pub mod wire;

pub use frame::{encode_frame, RawFrame, RxFrame, TxFrame};
pub use rx_parser::RxParser;
pub use wire::{checksum, checksum_valid, ApiId, FRAME_DELIMITER, FRAME_OVERHEAD};
