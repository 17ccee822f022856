//! Input and output sockets
//!
//! Sockets are owned by their node and never exist on their own. A regular
//! parameter is an [`InputSlot::Single`]; a variadic parameter is an
//! [`InputSlot::Variadic`] group made of a placeholder (addressed with
//! `InputKey::Param(param)`) and zero or more ordinal sub-sockets.

use super::id::{InputKey, OutputAddr};
use super::socket_type::SocketType;
use serde::{Deserialize, Serialize};

/// Whether a socket belongs to a callable/operator or to a proxy node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketKind {
    Input,
    Output,
    Proxy,
}

/// A single input socket
#[derive(Debug, Clone, PartialEq)]
pub struct InputSocket {
    pub name: String,
    pub socket_type: SocketType,
    pub parent: Option<OutputAddr>,
}

impl InputSocket {
    pub fn new(name: impl Into<String>, socket_type: SocketType) -> Self {
        Self {
            name: name.into(),
            socket_type,
            parent: None,
        }
    }
}

/// An output socket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSocket {
    pub name: String,
    #[serde(rename = "type", default)]
    pub socket_type: SocketType,
}

impl OutputSocket {
    pub fn new(name: impl Into<String>, socket_type: SocketType) -> Self {
        Self {
            name: name.into(),
            socket_type,
        }
    }
}

/// Whether a variadic group collects positional or keyword arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariadicKind {
    Positional,
    Keyword,
}

/// A materialized member of a variadic group
#[derive(Debug, Clone, PartialEq)]
pub struct SubSocket {
    pub ordinal: u32,
    pub parent: Option<OutputAddr>,
    /// Argument name, for keyword groups only
    pub keyword: Option<String>,
}

/// A variadic parameter's socket group
#[derive(Debug, Clone, PartialEq)]
pub struct VariadicGroup {
    pub param: String,
    pub kind: VariadicKind,
    pub socket_type: SocketType,
    /// Kept sorted by ordinal
    pub subsockets: Vec<SubSocket>,
}

impl VariadicGroup {
    pub fn new(param: impl Into<String>, kind: VariadicKind, socket_type: SocketType) -> Self {
        Self {
            param: param.into(),
            kind,
            socket_type,
            subsockets: Vec::new(),
        }
    }

    /// Ordinal the next materialized sub-socket receives
    pub fn next_ordinal(&self) -> u32 {
        self.subsockets.iter().map(|s| s.ordinal + 1).max().unwrap_or(0)
    }

    pub fn subsocket(&self, ordinal: u32) -> Option<&SubSocket> {
        self.subsockets.iter().find(|s| s.ordinal == ordinal)
    }

    pub fn subsocket_mut(&mut self, ordinal: u32) -> Option<&mut SubSocket> {
        self.subsockets.iter_mut().find(|s| s.ordinal == ordinal)
    }

    /// Insert keeping ordinal order
    pub fn insert(&mut self, sub: SubSocket) {
        let pos = self
            .subsockets
            .iter()
            .position(|s| s.ordinal > sub.ordinal)
            .unwrap_or(self.subsockets.len());
        self.subsockets.insert(pos, sub);
    }

    pub fn remove(&mut self, ordinal: u32) -> Option<SubSocket> {
        let pos = self.subsockets.iter().position(|s| s.ordinal == ordinal)?;
        Some(self.subsockets.remove(pos))
    }
}

/// One parameter's worth of input sockets
#[derive(Debug, Clone, PartialEq)]
pub enum InputSlot {
    Single(InputSocket),
    Variadic(VariadicGroup),
}

impl InputSlot {
    pub fn param(&self) -> &str {
        match self {
            InputSlot::Single(socket) => &socket.name,
            InputSlot::Variadic(group) => &group.param,
        }
    }

    pub fn socket_type(&self) -> &SocketType {
        match self {
            InputSlot::Single(socket) => &socket.socket_type,
            InputSlot::Variadic(group) => &group.socket_type,
        }
    }

    /// Keys of every concrete socket in this slot, sub-sockets in ordinal order
    pub fn keys(&self) -> Vec<InputKey> {
        match self {
            InputSlot::Single(socket) => vec![InputKey::Param(socket.name.clone())],
            InputSlot::Variadic(group) => group
                .subsockets
                .iter()
                .map(|s| InputKey::Sub {
                    param: group.param.clone(),
                    ordinal: s.ordinal,
                })
                .collect(),
        }
    }

    /// Every `(key, parent)` pair with a parent
    pub fn parents(&self) -> Vec<(InputKey, &OutputAddr)> {
        match self {
            InputSlot::Single(socket) => socket
                .parent
                .iter()
                .map(|p| (InputKey::Param(socket.name.clone()), p))
                .collect(),
            InputSlot::Variadic(group) => group
                .subsockets
                .iter()
                .filter_map(|s| {
                    s.parent.as_ref().map(|p| {
                        (
                            InputKey::Sub {
                                param: group.param.clone(),
                                ordinal: s.ordinal,
                            },
                            p,
                        )
                    })
                })
                .collect(),
        }
    }
}
