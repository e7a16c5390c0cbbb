use std::sync::Arc;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument};

use chronicle_core::metadata::keys;
use chronicle_core::{
    DomainCommand, DomainEvent, JsonSerializer, MessageDescriptor, MetadataProvider, RecordId,
    StandardMetadataProvider, TextSerializer,
};

use crate::criteria::Criteria;
use crate::cursor::EventCursor;
use crate::database::ConnectionConfig;
use crate::error::StoreError;
use crate::record::{format_timestamp, MessageRecord};

/// The append-only message log.
///
/// Writes events and commands as single-row appends with extracted
/// metadata; reads events back through [`query`](MessageLog::query). Every
/// save call and every cursor runs over its own scoped session, so a log
/// value can be cloned and used from any number of threads.
pub struct MessageLog<S: TextSerializer = JsonSerializer> {
    config: ConnectionConfig,
    serializer: Arc<S>,
    metadata: Arc<dyn MetadataProvider>,
}

impl MessageLog<JsonSerializer> {
    pub fn new(config: ConnectionConfig) -> Self {
        Self::with_serializer(config, JsonSerializer)
    }
}

impl<S: TextSerializer> MessageLog<S> {
    pub fn with_serializer(config: ConnectionConfig, serializer: S) -> Self {
        Self {
            config,
            serializer: Arc::new(serializer),
            metadata: Arc::new(StandardMetadataProvider),
        }
    }

    /// Replace the metadata extraction seam.
    pub fn with_metadata_provider(mut self, provider: impl MetadataProvider + 'static) -> Self {
        self.metadata = Arc::new(provider);
        self
    }

    /// Append one event. Exactly one record is written, or the call fails
    /// with nothing visible to readers. No retries.
    #[instrument(skip(self, event))]
    pub fn save_event<E: DomainEvent>(&self, event: &E) -> Result<MessageRecord, StoreError> {
        let descriptor = MessageDescriptor::for_event(event);
        self.append(descriptor, event.source_id(), event)
    }

    /// Append one command. Commands share the table with events but are
    /// never returned by [`query`](MessageLog::query).
    #[instrument(skip(self, command))]
    pub fn save_command<C: DomainCommand>(&self, command: &C) -> Result<MessageRecord, StoreError> {
        let descriptor = MessageDescriptor::for_command(command);
        self.append(descriptor, command.id(), command)
    }

    /// Build a cursor over the events matching `criteria`, decoded as `T`.
    ///
    /// Cheap: no translation and no I/O happen until the first advance.
    #[instrument(skip(self))]
    pub fn query<T: DeserializeOwned>(&self, criteria: Criteria) -> EventCursor<T, S> {
        EventCursor::new(self.config.clone(), self.serializer.clone(), criteria)
    }

    fn append<M: Serialize + ?Sized>(
        &self,
        descriptor: MessageDescriptor,
        source_id: String,
        message: &M,
    ) -> Result<MessageRecord, StoreError> {
        let metadata = self.metadata.get_metadata(&descriptor);
        let record = MessageRecord {
            id: RecordId::new(),
            source_id,
            kind: metadata.get(keys::KIND).to_string(),
            assembly_name: metadata.get(keys::ASSEMBLY_NAME).to_string(),
            full_name: metadata.get(keys::FULL_NAME).to_string(),
            namespace: metadata.get(keys::NAMESPACE).to_string(),
            type_name: metadata.get(keys::TYPE_NAME).to_string(),
            source_type: metadata.get(keys::SOURCE_TYPE).to_string(),
            creation_date: format_timestamp(Utc::now()),
            payload: self.serializer.serialize(message)?,
        };

        let session = self.config.open()?;
        session.append(&record)?;
        debug!(record_id = %record.id, kind = %record.kind, "message appended");
        Ok(record)
    }
}

impl<S: TextSerializer> Clone for MessageLog<S> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            serializer: self.serializer.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronicle_core::SerializationError;
    use serde::Deserialize;
    use std::collections::BTreeSet;

    #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
    struct SeatsReserved {
        reservation: String,
        seats: u32,
    }

    impl DomainEvent for SeatsReserved {
        fn source_id(&self) -> String {
            self.reservation.clone()
        }

        fn source_type(&self) -> &'static str {
            "Reservation"
        }
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct ReserveSeats {
        command_id: String,
        seats: u32,
    }

    impl DomainCommand for ReserveSeats {
        fn id(&self) -> String {
            self.command_id.clone()
        }
    }

    fn new_log() -> MessageLog {
        MessageLog::new(ConnectionConfig::in_memory().unwrap())
    }

    fn collect_set(log: &MessageLog, criteria: Criteria) -> BTreeSet<SeatsReserved> {
        log.query::<SeatsReserved>(criteria)
            .collect::<Result<BTreeSet<_>, _>>()
            .unwrap()
    }

    #[test]
    fn saved_event_roundtrips_through_query() {
        let log = new_log();
        let event = SeatsReserved {
            reservation: "res-1".into(),
            seats: 4,
        };
        log.save_event(&event).unwrap();

        let decoded = collect_set(&log, Criteria::new());
        assert_eq!(decoded, BTreeSet::from([event]));
    }

    #[test]
    fn commands_are_logged_but_never_queried() {
        let log = new_log();
        let event = SeatsReserved {
            reservation: "shared-source".into(),
            seats: 2,
        };
        let command = ReserveSeats {
            command_id: "shared-source".into(),
            seats: 9,
        };
        log.save_event(&event).unwrap();
        let command_record = log.save_command(&command).unwrap();
        assert_eq!(command_record.kind, "Command");
        assert_eq!(command_record.source_id, "shared-source");

        let decoded = collect_set(&log, Criteria::new());
        assert_eq!(decoded, BTreeSet::from([event]));
    }

    #[test]
    fn save_stamps_id_metadata_and_timestamp() {
        let log = new_log();
        let record = log
            .save_event(&SeatsReserved {
                reservation: "res-meta".into(),
                seats: 1,
            })
            .unwrap();

        assert!(record.id.as_str().starts_with("msg_"));
        assert_eq!(record.kind, "Event");
        assert_eq!(record.type_name, "SeatsReserved");
        assert_eq!(record.source_type, "Reservation");
        assert!(record.full_name.ends_with("::SeatsReserved"));
        assert!(!record.assembly_name.is_empty());
        assert!(record.creation_date.ends_with('Z'));
        chrono::DateTime::parse_from_rfc3339(&record.creation_date).unwrap();
    }

    #[test]
    fn scenario_three_events_one_command() {
        let log = new_log();
        let a = SeatsReserved {
            reservation: "res-a".into(),
            seats: 1,
        };
        let b = SeatsReserved {
            reservation: "res-b".into(),
            seats: 2,
        };
        let c = SeatsReserved {
            reservation: "res-c".into(),
            seats: 3,
        };
        let d = ReserveSeats {
            command_id: "cmd-d".into(),
            seats: 4,
        };
        log.save_event(&a).unwrap();
        log.save_event(&b).unwrap();
        log.save_event(&c).unwrap();
        log.save_command(&d).unwrap();

        let all = collect_set(&log, Criteria::new());
        assert_eq!(all, BTreeSet::from([a.clone(), b, c]));

        let only_a = collect_set(&log, Criteria::new().source_id_in(["res-a"]));
        assert_eq!(only_a, BTreeSet::from([a]));
    }

    #[test]
    fn query_filters_by_type_name() {
        let log = new_log();
        log.save_event(&SeatsReserved {
            reservation: "res-1".into(),
            seats: 1,
        })
        .unwrap();

        let hits = collect_set(&log, Criteria::new().type_name_in(["SeatsReserved"]));
        assert_eq!(hits.len(), 1);

        let misses = collect_set(&log, Criteria::new().type_name_in(["SomethingElse"]));
        assert!(misses.is_empty());
    }

    #[test]
    fn query_filters_by_creation_date_range() {
        let log = new_log();
        let record = log
            .save_event(&SeatsReserved {
                reservation: "res-1".into(),
                seats: 1,
            })
            .unwrap();
        let written = chrono::DateTime::parse_from_rfc3339(&record.creation_date)
            .unwrap()
            .with_timezone(&Utc);

        let inside = collect_set(
            &log,
            Criteria::new().created_between(
                Some(written - chrono::Duration::minutes(1)),
                Some(written + chrono::Duration::minutes(1)),
            ),
        );
        assert_eq!(inside.len(), 1);

        let after = collect_set(
            &log,
            Criteria::new().created_between(Some(written + chrono::Duration::minutes(1)), None),
        );
        assert!(after.is_empty());
    }

    #[test]
    fn concurrent_saves_produce_distinct_ids() {
        // File-backed so concurrent sessions go through WAL + busy_timeout.
        let dir = std::env::temp_dir().join(format!("chronicle-log-{}", uuid::Uuid::now_v7()));
        let log = MessageLog::new(ConnectionConfig::file(&dir.join("log.db")).unwrap());
        let mut handles = vec![];
        for i in 0..10 {
            let log = log.clone();
            handles.push(std::thread::spawn(move || {
                log.save_event(&SeatsReserved {
                    reservation: format!("res-{i}"),
                    seats: i,
                })
                .unwrap()
            }));
        }

        let records: Vec<MessageRecord> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();
        let ids: BTreeSet<String> = records
            .iter()
            .map(|r| r.id.as_str().to_string())
            .collect();
        assert_eq!(ids.len(), 10);

        let decoded = collect_set(&log, Criteria::new());
        assert_eq!(decoded.len(), 10);

        drop(log);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn serializer_failure_propagates_and_writes_nothing() {
        struct FailingSerializer;
        impl TextSerializer for FailingSerializer {
            fn serialize<T: Serialize + ?Sized>(
                &self,
                _value: &T,
            ) -> Result<String, SerializationError> {
                Err(SerializationError::Serialize("boom".into()))
            }
            fn deserialize<T: serde::de::DeserializeOwned>(
                &self,
                text: &str,
            ) -> Result<T, SerializationError> {
                serde_json::from_str(text)
                    .map_err(|e| SerializationError::Deserialize(e.to_string()))
            }
        }

        let config = ConnectionConfig::in_memory().unwrap();
        let failing = MessageLog::with_serializer(config.clone(), FailingSerializer);
        let result = failing.save_event(&SeatsReserved {
            reservation: "res-1".into(),
            seats: 1,
        });
        assert!(matches!(result, Err(StoreError::Serialization(_))));

        let readable = MessageLog::new(config);
        assert!(collect_set(&readable, Criteria::new()).is_empty());
    }

    #[test]
    fn custom_metadata_provider_is_honored() {
        use chronicle_core::MessageMetadata;

        struct FixedProvider;
        impl MetadataProvider for FixedProvider {
            fn get_metadata(&self, descriptor: &MessageDescriptor) -> MessageMetadata {
                let mut metadata = MessageMetadata::new();
                metadata.insert(keys::KIND, descriptor.kind.to_string());
                metadata.insert(keys::TYPE_NAME, "Renamed");
                metadata
            }
        }

        let log = MessageLog::new(ConnectionConfig::in_memory().unwrap())
            .with_metadata_provider(FixedProvider);
        let record = log
            .save_event(&SeatsReserved {
                reservation: "res-1".into(),
                seats: 1,
            })
            .unwrap();

        assert_eq!(record.type_name, "Renamed");
        // Keys the provider left out default to empty.
        assert_eq!(record.namespace, "");
        assert_eq!(record.assembly_name, "");
    }
}
