pub mod assets;
pub mod cli;
pub mod codec;
pub mod config;
pub mod context;
pub mod error;
pub mod ops;
pub mod reflect;
pub mod refs;
pub mod remote;
pub mod resolve;
pub mod scene;
pub mod schema;
pub mod snapshot;
pub mod value;

pub use context::BridgeContext;
pub use error::BridgeError;
pub use ops::{BridgeHost, TargetAddress};
