//! Query construction for batch exports
//!
//! Builds the T-SQL that shapes one batch of entity-merge rows into a single
//! nested JSON document, and the scalar probe used to snapshot the maximum
//! `EntityId` at init. Both builders are pure: identical inputs always yield
//! byte-identical query text, which keeps failed batches reproducible.

use super::planner::BatchRange;

/// Builder for the per-batch export query and the max-id probe.
///
/// The batch query returns exactly one row with one column holding the JSON
/// document for the range:
///
/// ```json
/// {
///   "CommunityId": "...",
///   "Entities": [
///     { "Entity": [ { "system": ..., "type": ..., "applicationId": ..., "correlationid": ... } ] }
///   ]
/// }
/// ```
///
/// Entity groups are ordered ascending by `EntityId`, records within a group
/// ascending by `ApplicationId`, and the top-level object is emitted without
/// an array wrapper.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    table: String,
    community_id: String,
}

impl QueryBuilder {
    /// Create a builder for one source table and community.
    ///
    /// # Arguments
    /// * `table` - Source table name (unbracketed)
    /// * `community_id` - Community identifier embedded once per document
    pub fn new(table: &str, community_id: &str) -> Self {
        Self {
            table: table.to_string(),
            community_id: community_id.to_string(),
        }
    }

    /// Build the export query for one batch range.
    pub fn batch_document(&self, range: &BatchRange) -> String {
        let table = quote_identifier(&self.table);
        let community = quote_literal(&self.community_id);

        // A range may hold no live ids (sparse or deleted regions). The
        // Entities subquery then yields NULL and the outer FOR JSON PATH
        // would drop the property entirely; ISNULL pins it to an empty
        // array and JSON_QUERY keeps it from being re-escaped as a string.
        format!(
            "SELECT CommunityId = {community}, \
             Entities = JSON_QUERY(ISNULL((\
             SELECT Entity = (\
             SELECT m.ApplicationId AS [system], \
             m.EntityType AS [type], \
             m.TargetId AS [applicationId], \
             m.SourceIdValue AS [correlationid] \
             FROM {table} AS m \
             WHERE m.EntityId = e.EntityId \
             ORDER BY m.ApplicationId \
             FOR JSON PATH) \
             FROM (SELECT DISTINCT EntityId FROM {table} \
             WHERE EntityId BETWEEN {start} AND {end}) AS e \
             ORDER BY e.EntityId \
             FOR JSON PATH), '[]')) \
             FOR JSON PATH, WITHOUT_ARRAY_WRAPPER",
            start = range.start,
            end = range.end,
        )
    }

    /// Build the scalar probe returning `MAX(EntityId)` (NULL when empty).
    pub fn max_entity_id(&self) -> String {
        format!(
            "SET NOCOUNT ON; SELECT MAX(EntityId) FROM {};",
            quote_identifier(&self.table)
        )
    }
}

/// Bracket-quote a T-SQL identifier, doubling any closing bracket.
fn quote_identifier(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

/// Single-quote a T-SQL string literal, doubling embedded quotes.
fn quote_literal(value: &str) -> String {
    format!("N'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> QueryBuilder {
        QueryBuilder::new("PostScript_AllianceMerge", "LosAngeles")
    }

    #[test]
    fn test_batch_document_is_idempotent() {
        let range = BatchRange {
            start: 2501,
            end: 5000,
        };
        assert_eq!(builder().batch_document(&range), builder().batch_document(&range));
    }

    #[test]
    fn test_batch_document_embeds_range_and_community() {
        let range = BatchRange { start: 1, end: 2500 };
        let sql = builder().batch_document(&range);

        assert!(sql.contains("BETWEEN 1 AND 2500"));
        assert!(sql.contains("N'LosAngeles'"));
        assert!(sql.contains("[PostScript_AllianceMerge]"));
    }

    #[test]
    fn test_batch_document_orders_deterministically() {
        let range = BatchRange { start: 1, end: 10 };
        let sql = builder().batch_document(&range);

        assert!(sql.contains("ORDER BY e.EntityId"));
        assert!(sql.contains("ORDER BY m.ApplicationId"));
        assert!(sql.ends_with("FOR JSON PATH, WITHOUT_ARRAY_WRAPPER"));
    }

    #[test]
    fn test_batch_document_maps_output_fields() {
        let range = BatchRange { start: 1, end: 10 };
        let sql = builder().batch_document(&range);

        assert!(sql.contains("m.ApplicationId AS [system]"));
        assert!(sql.contains("m.EntityType AS [type]"));
        assert!(sql.contains("m.TargetId AS [applicationId]"));
        assert!(sql.contains("m.SourceIdValue AS [correlationid]"));
    }

    #[test]
    fn test_entities_key_survives_empty_range() {
        // A range with no live ids makes the Entities subquery NULL; the
        // document must still carry "Entities": [] rather than lose the key.
        let sql = builder().batch_document(&BatchRange { start: 1, end: 10 });
        assert!(sql.contains("Entities = JSON_QUERY(ISNULL(("));
        assert!(sql.contains("FOR JSON PATH), '[]'))"));
    }

    #[test]
    fn test_distinct_ranges_yield_distinct_text() {
        let a = builder().batch_document(&BatchRange { start: 1, end: 2500 });
        let b = builder().batch_document(&BatchRange {
            start: 2501,
            end: 5000,
        });
        assert_ne!(a, b);
    }

    #[test]
    fn test_max_entity_id_probe() {
        let sql = builder().max_entity_id();
        assert!(sql.contains("SET NOCOUNT ON"));
        assert!(sql.contains("SELECT MAX(EntityId) FROM [PostScript_AllianceMerge]"));
    }

    #[test]
    fn test_literal_escaping() {
        let qb = QueryBuilder::new("Merge]Table", "O'Brien's");
        let sql = qb.batch_document(&BatchRange { start: 1, end: 2 });
        assert!(sql.contains("[Merge]]Table]"));
        assert!(sql.contains("N'O''Brien''s'"));
    }
}
