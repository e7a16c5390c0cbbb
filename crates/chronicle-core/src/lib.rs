pub mod ids;
pub mod messages;
pub mod metadata;
pub mod serializer;

pub use ids::RecordId;
pub use messages::{DomainCommand, DomainEvent};
pub use metadata::{
    MessageDescriptor, MessageKind, MessageMetadata, MetadataProvider, StandardMetadataProvider,
};
pub use serializer::{JsonSerializer, SerializationError, TextSerializer};
