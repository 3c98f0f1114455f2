//! The triple-view state engine: a base trie view, a write-ahead view that stages
//! consensus-ordered transactions, and a pool that validates inbound ones.

pub mod evm;
pub mod pool;
pub mod promise;
pub mod view;
pub mod was;

pub use pool::Pool;
pub use promise::{PromiseRegistry, ReceiptPromise};
pub use view::TrieView;
pub use was::WriteAheadView;
