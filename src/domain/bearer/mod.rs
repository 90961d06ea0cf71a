//! Bearer context - packet data sessions and their setup

pub mod entity;
pub mod machine;
pub mod store;
pub mod value_object;

pub use entity::{BearerContext, BearerState};
pub use machine::{DataCallRequest, DataControl, LastFailure};
pub use store::{BearerHandle, BearerStore};
pub use value_object::{
    BearerType, DataCallDescriptor, NetworkParams, NetworkStartOptions, NetworkStartRequest, PdpFailCause,
};
