use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::messages::{DomainCommand, DomainEvent};

/// Well-known metadata keys recorded alongside every message.
pub mod keys {
    pub const KIND: &str = "Kind";
    pub const ASSEMBLY_NAME: &str = "AssemblyName";
    pub const FULL_NAME: &str = "FullName";
    pub const NAMESPACE: &str = "Namespace";
    pub const TYPE_NAME: &str = "TypeName";
    pub const SOURCE_TYPE: &str = "SourceType";
}

/// Discriminator for the two loggable message shapes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageKind {
    Event,
    Command,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::Event => f.write_str("Event"),
            MessageKind::Command => f.write_str("Command"),
        }
    }
}

impl FromStr for MessageKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Event" => Ok(MessageKind::Event),
            "Command" => Ok(MessageKind::Command),
            other => Err(format!("unknown message kind: {other}")),
        }
    }
}

/// Descriptive metadata extracted from a message.
///
/// Lookups never fail: a missing key reads as the empty string, so a log
/// written by an older extractor stays readable when new keys appear.
#[derive(Clone, Debug, Default)]
pub struct MessageMetadata {
    entries: HashMap<String, String>,
}

impl MessageMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Value for `key`, or `""` when the extractor did not supply it.
    pub fn get(&self, key: &str) -> &str {
        self.entries.get(key).map(String::as_str).unwrap_or("")
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What the log knows about a message before extraction: its kind, its Rust
/// type path, and (for events) the aggregate type that raised it.
#[derive(Clone, Copy, Debug)]
pub struct MessageDescriptor {
    pub kind: MessageKind,
    pub type_path: &'static str,
    pub source_type: &'static str,
}

impl MessageDescriptor {
    pub fn for_event<E: DomainEvent>(event: &E) -> Self {
        Self {
            kind: MessageKind::Event,
            type_path: std::any::type_name::<E>(),
            source_type: event.source_type(),
        }
    }

    pub fn for_command<C: DomainCommand>(_command: &C) -> Self {
        Self {
            kind: MessageKind::Command,
            type_path: std::any::type_name::<C>(),
            source_type: "",
        }
    }
}

/// Extraction seam: derives the descriptive metadata map for a message.
pub trait MetadataProvider: Send + Sync {
    fn get_metadata(&self, descriptor: &MessageDescriptor) -> MessageMetadata;
}

/// Default provider: splits the Rust type path into the standard descriptor
/// fields. For `registration::events::OrderPlaced` that yields assembly
/// `registration`, namespace `registration::events`, type name `OrderPlaced`,
/// and the full path as `FullName`.
#[derive(Clone, Copy, Debug, Default)]
pub struct StandardMetadataProvider;

impl MetadataProvider for StandardMetadataProvider {
    fn get_metadata(&self, descriptor: &MessageDescriptor) -> MessageMetadata {
        let path = descriptor.type_path;
        let (namespace, type_name) = match path.rsplit_once("::") {
            Some((ns, name)) => (ns, name),
            None => ("", path),
        };
        let assembly = path.split("::").next().unwrap_or("");

        let mut metadata = MessageMetadata::new();
        metadata.insert(keys::KIND, descriptor.kind.to_string());
        metadata.insert(keys::ASSEMBLY_NAME, assembly);
        metadata.insert(keys::FULL_NAME, path);
        metadata.insert(keys::NAMESPACE, namespace);
        metadata.insert(keys::TYPE_NAME, type_name);
        if !descriptor.source_type.is_empty() {
            metadata.insert(keys::SOURCE_TYPE, descriptor.source_type);
        }
        metadata
    }
}
