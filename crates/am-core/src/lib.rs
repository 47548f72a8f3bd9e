pub mod emitter;
pub mod error;
pub mod id;
pub mod model;
pub mod notify;
pub mod parser;
pub mod snapshot;

pub use emitter::emit_model;
pub use error::{ModelError, ParseError};
pub use id::NodeId;
pub use model::*;
pub use notify::{
    Change, ChangeKind, ChangeLog, Notification, Observer, ObserverId, SharedObserver,
};
pub use parser::parse_model;
