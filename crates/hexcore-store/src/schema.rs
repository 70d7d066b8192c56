//! SQL used by the `PostgreSQL` adapters.
//!
//! Tables are created by the migrations in the workspace `migrations/`
//! directory; this module only holds the statements run against them.

/// Name of the unique constraint guarding one version per stream.
pub const STREAM_VERSION_CONSTRAINT: &str = "domain_events_stream_version_key";

pub(crate) const CURRENT_VERSION: &str =
    "SELECT COALESCE(MAX(sequence_number), 0) FROM domain_events WHERE aggregate_id = $1";

pub(crate) const INSERT_EVENT: &str = r"
INSERT INTO domain_events
    (event_id, aggregate_id, event_type, payload, sequence_number,
     correlation_id, causation_id, occurred_at)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
";

pub(crate) const LOAD_EVENTS: &str = r"
SELECT event_id, aggregate_id, event_type, payload, sequence_number,
       correlation_id, causation_id, occurred_at
FROM domain_events
WHERE aggregate_id = $1 AND sequence_number > $2
ORDER BY sequence_number ASC
";

pub(crate) const DELETE_EVENTS: &str = "DELETE FROM domain_events WHERE aggregate_id = $1";

pub(crate) const INSERT_PROJECTION: &str = r"
INSERT INTO projections (kind, aggregate_id, version, data, updated_at)
VALUES ($1, $2, $3, $4, $5)
";

pub(crate) const UPDATE_PROJECTION: &str = r"
UPDATE projections
SET version = $3, data = $4, updated_at = $5
WHERE kind = $1 AND aggregate_id = $2
";

pub(crate) const DELETE_PROJECTION: &str =
    "DELETE FROM projections WHERE kind = $1 AND aggregate_id = $2";

pub(crate) const INSERT_KEY: &str = r"
INSERT INTO projection_keys (kind, key_name, key_value, aggregate_id)
VALUES ($1, $2, $3, $4)
";

pub(crate) const DELETE_KEYS: &str =
    "DELETE FROM projection_keys WHERE kind = $1 AND aggregate_id = $2";

pub(crate) const FIND_PROJECTION: &str = r"
SELECT kind, aggregate_id, version, data, updated_at
FROM projections
WHERE kind = $1 AND aggregate_id = $2
";

pub(crate) const FIND_PROJECTION_BY_KEY: &str = r"
SELECT p.kind, p.aggregate_id, p.version, p.data, p.updated_at
FROM projections p
JOIN projection_keys k ON k.kind = p.kind AND k.aggregate_id = p.aggregate_id
WHERE k.kind = $1 AND k.key_name = $2 AND k.key_value = $3
";

pub(crate) const LIST_PROJECTIONS: &str = r"
SELECT kind, aggregate_id, version, data, updated_at
FROM projections
WHERE kind = $1
ORDER BY aggregate_id
LIMIT $2 OFFSET $3
";

pub(crate) const COUNT_PROJECTIONS: &str = "SELECT COUNT(*) FROM projections WHERE kind = $1";
