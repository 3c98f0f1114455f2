//! The account, transaction, receipt and log types the state engine operates on.

pub mod account;
pub mod receipt;
pub mod tx;

pub use account::Account;
pub use receipt::{JsonReceipt, Log, Receipt};
pub use tx::TxWrapper;
