pub mod command;
pub mod commands;
pub mod compound;
pub mod config;
pub mod presentation;
pub mod session;
pub mod stack;

pub use command::{Command, CommandError};
pub use commands::{
    AddNodeCommand, CreateConnectionCommand, CreateNodeCommand, CreateRelationshipCommand,
    DeleteNodeCommand, MoveChildCommand, SetFeatureCommand, delete_from_model,
};
pub use compound::CompoundCommand;
pub use config::{ConfigError, EditorConfig};
pub use presentation::{DiagramPart, Figure, PropertySection, TreePresenter};
pub use session::{Deferred, ModelSession};
pub use stack::{CommandStack, ListenerId, StackEvent};
