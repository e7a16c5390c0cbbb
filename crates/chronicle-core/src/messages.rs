use serde::Serialize;

/// A domain event that can be appended to the message log.
///
/// Events are facts: immutable, serializable, and attributable to the
/// aggregate that raised them via [`source_id`](DomainEvent::source_id).
pub trait DomainEvent: Serialize {
    /// Identifier of the aggregate this event originated from.
    fn source_id(&self) -> String;

    /// Name of the aggregate type that raised the event, when known.
    /// The metadata provider records it under the `SourceType` key.
    fn source_type(&self) -> &'static str {
        ""
    }
}

/// A command that can be appended to the message log.
///
/// Commands are logged alongside events (same table, different kind) but
/// are never returned by queries.
pub trait DomainCommand: Serialize {
    /// The command's own correlation identifier.
    fn id(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct SeatsReserved {
        reservation: String,
    }

    impl DomainEvent for SeatsReserved {
        fn source_id(&self) -> String {
            self.reservation.clone()
        }
    }

    #[test]
    fn source_type_defaults_to_empty() {
        let event = SeatsReserved {
            reservation: "res-1".into(),
        };
        assert_eq!(event.source_type(), "");
        assert_eq!(event.source_id(), "res-1");
    }
}
