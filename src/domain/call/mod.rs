//! Call context - voice call registry and lifecycle

pub mod entity;
pub mod machine;
pub mod store;
pub mod value_object;

pub use entity::{CallContext, CallEntry};
pub use machine::CallControl;
pub use store::{CallHandle, CallStore};
pub use value_object::{CallState, CallType, DtmfTone, Presentation, TypeOfAddress};
