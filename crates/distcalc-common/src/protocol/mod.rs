pub mod error;
pub mod jsonrpc;
pub mod requests;
pub mod responses;

pub use error::{DistcalcError, Result};
pub use jsonrpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use requests::*;
pub use responses::*;
