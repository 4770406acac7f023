//! RPC dispatch: handler abstraction and the method table.

pub mod handler;
pub mod table;

pub use handler::{handler_fn, FnHandler, RpcHandler};
pub use table::{DispatchTable, DispatchTableBuilder, CREATE_GAME, FIND_GAME, JOIN_GAME, LEFT_GAME};
