//! Aggregate statement template
//!
//! Holds the structured parts of a statistics query so each time window can
//! swap the timestamp bounds without touching the SQL text.

use chrono::NaiveDateTime;

use super::aggregate::{AggregateFunction, GroupByField};
use super::period::Window;
use crate::data::filters::flat::{Condition, ConditionKind, flat_conditions, join_conditions};
use crate::data::filters::{FilterError, FlatConditions, FlatFilter, SqlValue};

const SELECT_HEAD: &str = "SELECT min(samples.timestamp) as tsmin, \
     max(samples.timestamp) as tsmax, meters.unit as unit";

const FROM_JOINS: &str = " FROM samples \
     JOIN resources ON samples.resource_id = resources.id \
     JOIN meters ON samples.meter_id = meters.id \
     JOIN sources ON samples.source_id = sources.id \
     LEFT JOIN projects ON samples.project_id = projects.id \
     LEFT JOIN users ON samples.user_id = users.id";

const WINDOW_COLUMN: &str = "samples.timestamp";

/// Executable aggregate statement with `%s` placeholders
#[derive(Debug, Clone, PartialEq)]
pub struct StatsStatement {
    pub sql: String,
    pub params: Vec<SqlValue>,
    pub aggregates: Vec<AggregateFunction>,
    pub groupby: Vec<GroupByField>,
}

/// Aggregate query over a flat filter
#[derive(Debug, Clone)]
pub struct StatsTemplate {
    conditions: Vec<Condition>,
    aggregates: Vec<AggregateFunction>,
    groupby: Vec<GroupByField>,
}

impl StatsTemplate {
    /// Build from a flat filter; the meter is required.
    ///
    /// Returns `None` when the filter can match nothing.
    pub fn from_filter(
        filter: &FlatFilter,
        aggregates: &[AggregateFunction],
        groupby: &[GroupByField],
    ) -> Result<Option<Self>, FilterError> {
        match flat_conditions(filter, true)? {
            FlatConditions::Ready(conditions) => Ok(Some(Self {
                conditions,
                aggregates: aggregates.to_vec(),
                groupby: groupby.to_vec(),
            })),
            FlatConditions::Empty(reason) => {
                tracing::debug!(?reason, "Statistics filter matches nothing");
                Ok(None)
            }
        }
    }

    /// Same filter and aggregates without grouping
    pub fn ungrouped(&self) -> Self {
        Self {
            conditions: self.conditions.clone(),
            aggregates: self.aggregates.clone(),
            groupby: Vec::new(),
        }
    }

    /// Statement over the filter as given
    pub fn unbounded(&self) -> StatsStatement {
        self.render(self.conditions.iter().collect())
    }

    /// Statement restricted to one window.
    ///
    /// Filter-level timestamp bounds are replaced by the window bounds, which
    /// are always the last two parameters.
    pub fn windowed(&self, window: Window) -> StatsStatement {
        let bounds = window_conditions(window.start, window.end);
        let conditions = self
            .conditions
            .iter()
            .filter(|c| !c.is_time_bound())
            .chain(bounds.iter())
            .collect();
        self.render(conditions)
    }

    fn render(&self, conditions: Vec<&Condition>) -> StatsStatement {
        let mut sql = String::from(SELECT_HEAD);
        for aggregate in &self.aggregates {
            sql.push_str(", ");
            sql.push_str(&aggregate.select_sql());
        }
        for field in &self.groupby {
            sql.push_str(", ");
            sql.push_str(&field.select_sql());
        }
        sql.push_str(FROM_JOINS);

        let compiled = join_conditions(conditions);
        sql.push_str(&compiled.where_clause);

        sql.push_str(" GROUP BY meters.unit");
        for field in &self.groupby {
            sql.push_str(", ");
            sql.push_str(field.column());
        }

        StatsStatement {
            sql,
            params: compiled.parameters,
            aggregates: self.aggregates.clone(),
            groupby: self.groupby.clone(),
        }
    }
}

fn window_conditions(start: NaiveDateTime, end: NaiveDateTime) -> [Condition; 2] {
    [
        Condition::compare(
            WINDOW_COLUMN,
            ">=",
            SqlValue::Timestamp(start),
            ConditionKind::TimeStart,
        ),
        Condition::compare(
            WINDOW_COLUMN,
            "<",
            SqlValue::Timestamp(end),
            ConditionKind::TimeEnd,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::filters::Scalar;
    use crate::utils::time::parse_timestamp;
    use std::collections::BTreeMap;

    fn ts(s: &str) -> NaiveDateTime {
        parse_timestamp(s).unwrap()
    }

    fn template(filter: &FlatFilter, groupby: &[GroupByField]) -> StatsTemplate {
        StatsTemplate::from_filter(filter, &[AggregateFunction::Max], groupby)
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_unbounded_statement() {
        let filter = FlatFilter {
            source: Some("openstack".into()),
            ..FlatFilter::for_meter("cpu_util")
        };
        let stmt = template(&filter, &[GroupByField::ResourceId]).unbounded();
        assert_eq!(
            stmt.sql,
            "SELECT min(samples.timestamp) as tsmin, max(samples.timestamp) as tsmax, \
             meters.unit as unit, max(samples.volume) as max, \
             resources.resource_id as resource_id \
             FROM samples \
             JOIN resources ON samples.resource_id = resources.id \
             JOIN meters ON samples.meter_id = meters.id \
             JOIN sources ON samples.source_id = sources.id \
             LEFT JOIN projects ON samples.project_id = projects.id \
             LEFT JOIN users ON samples.user_id = users.id \
             where meters.name = %s and sources.name = %s \
             GROUP BY meters.unit, resources.resource_id"
        );
        assert_eq!(stmt.params.len(), 2);
    }

    #[test]
    fn test_window_replaces_filter_bounds() {
        let filter = FlatFilter {
            start: Some(ts("2015-01-01T00:00:00")),
            start_op: Some("gt".into()),
            end: Some(ts("2015-01-01T00:09:00")),
            end_op: Some("le".into()),
            ..FlatFilter::for_meter("cpu_util")
        };
        let template = template(&filter, &[]);
        let first = template.windowed(Window {
            start: ts("2015-01-01T00:00:00"),
            end: ts("2015-01-01T00:05:00"),
        });
        let second = template.windowed(Window {
            start: ts("2015-01-01T00:05:00"),
            end: ts("2015-01-01T00:09:00"),
        });

        assert_eq!(first.sql, second.sql);
        assert!(first.sql.contains(
            "where meters.name = %s and samples.timestamp >= %s and samples.timestamp < %s GROUP BY"
        ));
        assert!(!first.sql.contains("samples.timestamp > %s"));
        assert!(!first.sql.contains("samples.timestamp <= %s"));
        assert_eq!(first.params[0], second.params[0]);
        assert_eq!(
            second.params[1..],
            [
                SqlValue::Timestamp(ts("2015-01-01T00:05:00")),
                SqlValue::Timestamp(ts("2015-01-01T00:09:00")),
            ]
        );
    }

    #[test]
    fn test_window_keeps_metaquery_order() {
        let filter = FlatFilter {
            user: Some("3d622ea5-a70a-42d3-aae5-49ddfc1ef355".into()),
            metaquery: BTreeMap::from([("metadata.status".to_string(), Scalar::from("active"))]),
            ..FlatFilter::for_meter("cpu_util")
        };
        let stmt = template(&filter, &[]).windowed(Window {
            start: ts("2015-01-01T00:00:00"),
            end: ts("2015-01-01T00:05:00"),
        });
        assert!(stmt.sql.contains(
            "where meters.name = %s and users.uuid = %s and metadata @> %s \
             and samples.timestamp >= %s and samples.timestamp < %s"
        ));
        assert_eq!(stmt.sql.matches("%s").count(), stmt.params.len());
    }

    #[test]
    fn test_meter_is_required() {
        let result = StatsTemplate::from_filter(&FlatFilter::default(), &[], &[]);
        assert!(matches!(
            result,
            Err(FilterError::MissingRequiredField("meter"))
        ));
    }

    #[test]
    fn test_unmatchable_filter() {
        let filter = FlatFilter {
            project: Some("nope".into()),
            ..FlatFilter::for_meter("cpu_util")
        };
        assert!(StatsTemplate::from_filter(&filter, &[], &[]).unwrap().is_none());
    }
}
