//! Radio data plane: transmit requests, delivery status, received packets.

pub mod rx;
pub mod tx;

pub use rx::{RxPacket, RxPacketBuffer};
pub use tx::{Address, TxRequest, TxStatus, TxStatusMonitor, MAX_TX_PAYLOAD};
