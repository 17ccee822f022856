//! Graph model
//!
//! The in-memory node/socket topology of a document:
//!
//! - [`Graph`]: arena of [`Node`]s keyed by [`NodeId`], plus the socket-type
//!   registry used to validate wiring
//! - Sockets addressed by [`InputAddr`] / [`OutputAddr`] values; links are
//!   stored on the child input as its parent
//! - Segment editing (`connect`, `disconnect`, `sever_crossing`) in
//!   [`segments`], with the rendered geometry it needs in [`layout`]
//! - Built-in operator nodes in [`operators`]
//!
//! Every edit either succeeds completely or returns a [`GraphError`] and
//! leaves the graph unchanged.

pub mod error;
pub mod id;
pub mod layout;
pub mod model;
pub mod node;
pub mod operators;
pub mod segments;
pub mod socket;
pub mod socket_type;
pub mod widget;

pub use error::{GraphError, GraphResult};
pub use id::{InputAddr, InputKey, NodeId, OutputAddr};
pub use model::Graph;
pub use node::{DisplayMode, Node, NodeKind};
pub use operators::Operation;
pub use socket::{InputSlot, InputSocket, OutputSocket, SocketKind, SubSocket, VariadicGroup, VariadicKind};
pub use socket_type::{SocketType, TypeRegistry, ANY};
pub use widget::{WidgetKind, WidgetSpec};

/// Output name of single-output callables and proxy nodes
pub const DEFAULT_OUTPUT: &str = "output";

/// Input name of redirect proxy nodes
pub const REDIRECT_INPUT: &str = "input";
