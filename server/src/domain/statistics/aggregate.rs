//! Aggregate function and group-by allow-lists

use super::error::StatsError;

/// Aggregate functions computed over `samples.volume`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AggregateFunction {
    Avg,
    Sum,
    Min,
    Max,
    Count,
}

impl AggregateFunction {
    pub const ALL: [Self; 5] = [Self::Avg, Self::Sum, Self::Min, Self::Max, Self::Count];

    pub fn parse(name: &str) -> Result<Self, StatsError> {
        match name.trim().to_lowercase().as_str() {
            "avg" => Ok(Self::Avg),
            "sum" => Ok(Self::Sum),
            "min" => Ok(Self::Min),
            "max" => Ok(Self::Max),
            "count" => Ok(Self::Count),
            _ => Err(StatsError::UnsupportedAggregate(name.to_string())),
        }
    }

    /// Parse a requested list; an empty request selects every function
    pub fn parse_list<S: AsRef<str>>(names: &[S]) -> Result<Vec<Self>, StatsError> {
        if names.is_empty() {
            return Ok(Self::ALL.to_vec());
        }
        let mut functions = Vec::with_capacity(names.len());
        for name in names {
            let function = Self::parse(name.as_ref())?;
            if !functions.contains(&function) {
                functions.push(function);
            }
        }
        Ok(functions)
    }

    /// Result column alias
    pub fn name(&self) -> &'static str {
        match self {
            Self::Avg => "avg",
            Self::Sum => "sum",
            Self::Min => "min",
            Self::Max => "max",
            Self::Count => "count",
        }
    }

    /// Select expression with its alias
    pub fn select_sql(&self) -> String {
        format!("{}(samples.volume) as {}", self.name(), self.name())
    }
}

/// Fields statistics can be grouped by; each resolves to an identifier column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupByField {
    SourceId,
    ProjectId,
    UserId,
    ResourceId,
}

impl GroupByField {
    pub fn parse(name: &str) -> Result<Self, StatsError> {
        match name.trim() {
            "source_id" => Ok(Self::SourceId),
            "project_id" => Ok(Self::ProjectId),
            "user_id" => Ok(Self::UserId),
            "resource_id" => Ok(Self::ResourceId),
            _ => Err(StatsError::UnsupportedGroupBy(name.to_string())),
        }
    }

    pub fn parse_list<S: AsRef<str>>(names: &[S]) -> Result<Vec<Self>, StatsError> {
        let mut fields = Vec::with_capacity(names.len());
        for name in names {
            let field = Self::parse(name.as_ref())?;
            if !fields.contains(&field) {
                fields.push(field);
            }
        }
        Ok(fields)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::SourceId => "source_id",
            Self::ProjectId => "project_id",
            Self::UserId => "user_id",
            Self::ResourceId => "resource_id",
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            Self::SourceId => "sources.name",
            Self::ProjectId => "projects.uuid",
            Self::UserId => "users.uuid",
            Self::ResourceId => "resources.resource_id",
        }
    }

    /// Whether the column holds a UUID rather than text
    pub fn is_uuid(&self) -> bool {
        matches!(self, Self::ProjectId | Self::UserId)
    }

    pub fn select_sql(&self) -> String {
        format!("{} as {}", self.column(), self.name())
    }
}
