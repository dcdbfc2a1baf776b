use saldo_core::{Event, EventQuery, EventStore, OrderBy, StoreError, WriteOperation};

#[derive(Debug, Clone, PartialEq)]
struct StoredEvent {
    stream: String,
    event: Event,
}

/// Event store held in memory. Also what the SQLite store loads into for reads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryEventStore {
    events: Vec<StoredEvent>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Adds an event as is, without erasing anything.
    pub fn insert(&mut self, stream: impl Into<String>, event: Event) {
        self.events.push(StoredEvent { stream: stream.into(), event });
    }

    /// Events of one stream in insertion order.
    pub fn stream(&self, stream: &str) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.stream == stream)
            .map(|e| &e.event)
            .collect()
    }
}

impl EventStore for MemoryEventStore {
    fn get_events(&self, query: &EventQuery) -> Result<Vec<Event>, StoreError> {
        let mut found: Vec<Event> = self
            .events
            .iter()
            .filter(|e| query.matches(&e.event))
            .map(|e| e.event.clone())
            .collect();
        match query.order_by {
            Some(OrderBy::StartAscending) => found.sort_by_key(|e| e.start),
            Some(OrderBy::StartDescending) => found.sort_by(|a, b| b.start.cmp(&a.start)),
            None => {}
        }
        Ok(found)
    }

    fn apply(&mut self, operation: &WriteOperation) -> Result<(), StoreError> {
        let validity = operation
            .validity()
            .ok_or_else(|| StoreError::MissingValidity(operation.stream().to_string()))?;
        let stream = operation.stream();

        self.events.retain(|stored| {
            let erased = stored.stream == stream && stored.event.validity().overlaps(&validity);
            let replaced = operation.events.iter().any(|e| e.id == stored.event.id);
            !(erased || replaced)
        });
        for event in &operation.events {
            self.insert(stream, event.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use saldo_core::{
        Attribute, Completeness, DimSignature, EventId, Gauge, SourceMetadata, WriteMode,
    };

    fn ts(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    fn event(key: &str, day: u32) -> Event {
        Event {
            id: EventId::derive(key),
            gauge: Gauge::new("MOVEMENT", "BANK"),
            start: ts(day),
            stop: ts(day + 1),
            values: vec![Attribute::text("concept", key)],
            links: Vec::new(),
        }
    }

    fn operation(stream: &str, from: u32, to: u32, events: Vec<Event>) -> WriteOperation {
        WriteOperation {
            mode: WriteMode::InsertAndErase,
            dim_signature: DimSignature {
                name: stream.to_string(),
                exec: "test".to_string(),
                version: "1.0".to_string(),
            },
            source: SourceMetadata {
                name: "file".to_string(),
                reception_time: ts(1),
                generation_time: ts(1),
                reported_validity_start: ts(from),
                reported_validity_stop: ts(to),
                validity_start: Some(ts(from)),
                validity_stop: Some(ts(to)),
                ingestion_completeness: Completeness::default(),
            },
            events,
        }
    }

    #[test]
    fn erases_overlapping_events_of_the_same_stream() {
        let mut store = MemoryEventStore::new();
        store
            .apply(&operation("S", 1, 10, vec![event("a", 2), event("b", 8), event("c", 12)]))
            .unwrap();
        store.apply(&operation("OTHER", 1, 10, vec![event("x", 5)])).unwrap();

        store.apply(&operation("S", 5, 9, vec![event("d", 6)])).unwrap();

        let keys: Vec<_> = store.stream("S").iter().map(|e| e.text("concept").unwrap()).collect();
        assert_eq!(keys, vec!["a", "c", "d"]);
        assert_eq!(store.stream("OTHER").len(), 1);
    }

    #[test]
    fn applying_twice_equals_applying_once() {
        let op = operation("S", 1, 10, vec![event("a", 2), event("b", 3)]);
        let mut once = MemoryEventStore::new();
        once.apply(&op).unwrap();
        let mut twice = once.clone();
        twice.apply(&op).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn empty_operation_still_erases() {
        let mut store = MemoryEventStore::new();
        store.apply(&operation("S", 1, 10, vec![event("a", 2)])).unwrap();
        store.apply(&operation("S", 1, 10, vec![])).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn operation_without_validity_is_rejected() {
        let mut op = operation("S", 1, 10, vec![]);
        op.source.validity_stop = None;
        let err = MemoryEventStore::new().apply(&op).unwrap_err();
        assert!(matches!(err, StoreError::MissingValidity(s) if s == "S"));
    }

    #[test]
    fn ascending_order_is_stable() {
        let mut store = MemoryEventStore::new();
        store.insert("S", event("late", 9));
        store.insert("S", event("first", 2));
        store.insert("S", event("second", 2));
        let q = EventQuery::gauge("MOVEMENT").ordered(OrderBy::StartAscending);
        let keys: Vec<_> = store
            .get_events(&q)
            .unwrap()
            .iter()
            .map(|e| e.text("concept").unwrap().to_string())
            .collect();
        assert_eq!(keys, vec!["first", "second", "late"]);
    }
}
