//! A small aggregate used to exercise the repository against each backend.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;
use hexcore_core::aggregate::{AggregateBase, AggregateRoot};
use hexcore_core::clock::Clock;
use hexcore_core::error::DomainError;
use hexcore_core::event::{DomainEvent, EventMetadata, StoredEvent, encode_payload};
use hexcore_core::projection::UniqueKey;
use hexcore_core::repository::{AggregateRepository, Projected};
use hexcore_store::{InMemoryDatabase, InMemoryEventStore, InMemoryProjectionStore};
use hexcore_test_support::FixedClock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NoteChange {
    Created { slug: String, title: String },
    Retitled { title: String },
}

#[derive(Debug)]
pub struct NoteEvent {
    pub metadata: EventMetadata,
    pub change: NoteChange,
}

impl DomainEvent for NoteEvent {
    fn event_type(&self) -> &'static str {
        match self.change {
            NoteChange::Created { .. } => "note.created",
            NoteChange::Retitled { .. } => "note.retitled",
        }
    }

    fn to_payload(&self) -> Result<serde_json::Value, DomainError> {
        encode_payload(&self.change)
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteRecord {
    pub slug: String,
    pub title: String,
}

#[derive(Debug)]
pub struct Note {
    base: AggregateBase<NoteEvent>,
    pub slug: String,
    pub title: String,
}

impl Note {
    pub fn create(slug: &str, title: &str, clock: &dyn Clock) -> Self {
        let mut note = Self {
            base: AggregateBase::new(Uuid::new_v4()),
            slug: slug.to_owned(),
            title: title.to_owned(),
        };
        let metadata = note
            .base
            .next_metadata("note.created", Uuid::new_v4(), clock);
        note.base.record(NoteEvent {
            metadata,
            change: NoteChange::Created {
                slug: slug.to_owned(),
                title: title.to_owned(),
            },
        });
        note
    }

    pub fn retitle(&mut self, title: &str, clock: &dyn Clock) {
        let metadata = self
            .base
            .next_metadata("note.retitled", Uuid::new_v4(), clock);
        self.title = title.to_owned();
        self.base.record(NoteEvent {
            metadata,
            change: NoteChange::Retitled {
                title: title.to_owned(),
            },
        });
    }
}

impl AggregateRoot for Note {
    type Event = NoteEvent;

    fn aggregate_id(&self) -> Uuid {
        self.base.id()
    }

    fn version(&self) -> i64 {
        self.base.version()
    }

    fn pending_events(&self) -> &[NoteEvent] {
        self.base.pending()
    }

    fn clear_pending_events(&mut self) {
        self.base.clear();
    }
}

impl Projected for Note {
    const KIND: &'static str = "note";
    type Record = NoteRecord;

    fn to_record(&self) -> NoteRecord {
        NoteRecord {
            slug: self.slug.clone(),
            title: self.title.clone(),
        }
    }

    fn from_record(id: Uuid, version: i64, record: NoteRecord) -> Result<Self, DomainError> {
        Ok(Self {
            base: AggregateBase::restored(id, version),
            slug: record.slug,
            title: record.title,
        })
    }

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![UniqueKey::new("slug", self.slug.clone())]
    }
}

pub fn clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock::default())
}

pub fn memory_repository(db: &InMemoryDatabase) -> AggregateRepository<InMemoryDatabase, Note> {
    AggregateRepository::new(
        Arc::new(InMemoryEventStore::new(db)),
        Arc::new(InMemoryProjectionStore::new(db)),
        clock(),
    )
}

pub fn stored_event(aggregate_id: Uuid, sequence_number: i64) -> StoredEvent {
    StoredEvent {
        event_id: Uuid::new_v4(),
        aggregate_id,
        event_type: "note.retitled".to_owned(),
        payload: serde_json::json!({ "type": "retitled", "title": "x" }),
        sequence_number,
        correlation_id: Uuid::new_v4(),
        causation_id: Uuid::new_v4(),
        occurred_at: Utc::now(),
    }
}
