//! Shared primitive types.

mod balance;
pub use balance::*;

mod batch;
pub use batch::*;

mod erc20;
pub use erc20::*;

mod erc1155;
pub use erc1155::*;

mod message;
pub use message::*;

mod multicall;
pub use multicall::*;

mod state;
pub use state::*;

mod transaction;
pub use transaction::*;
