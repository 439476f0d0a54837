//! Row types returned by the read paths

use chrono::NaiveDateTime;
use serde::Serialize;
use uuid::Uuid;

// ============================================================================
// Sample types
// ============================================================================

/// Sample row with its meter, resource and owner identities resolved
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleRow {
    pub id: i64,
    pub counter_name: String,
    pub counter_type: Option<String>,
    pub counter_unit: Option<String>,
    pub counter_volume: Option<f64>,
    pub resource_id: Option<String>,
    pub source_id: Option<String>,
    pub user_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub timestamp: Option<NaiveDateTime>,
    pub recorded_at: Option<NaiveDateTime>,
    pub message_id: Option<String>,
    pub message_signature: Option<String>,
    pub resource_metadata: Option<serde_json::Value>,
}

// ============================================================================
// Meter and resource types
// ============================================================================

/// Latest sample of a meter for one resource
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeterRow {
    pub meter_id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub meter_type: Option<String>,
    pub unit: Option<String>,
    pub resource_id: Option<String>,
    pub project_id: Option<Uuid>,
    pub source_id: Option<String>,
    pub user_id: Option<Uuid>,
}

/// Resource with the time span of its matching samples
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceRow {
    pub resource_id: Option<String>,
    pub source: Option<String>,
    pub user_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub first_sample_timestamp: Option<NaiveDateTime>,
    pub last_sample_timestamp: Option<NaiveDateTime>,
}

// ============================================================================
// Alarm types
// ============================================================================

/// Alarm definition row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlarmRow {
    pub alarm_id: i64,
    pub enabled: Option<bool>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub alarm_type: Option<String>,
    pub description: Option<String>,
    pub timestamp: Option<NaiveDateTime>,
    pub user_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub state: Option<String>,
    pub ok_actions: Option<serde_json::Value>,
    pub alarm_actions: Option<serde_json::Value>,
    pub insufficient_data_actions: Option<serde_json::Value>,
    pub repeat_actions: Option<bool>,
    pub rule: Option<serde_json::Value>,
    pub time_constraints: Option<serde_json::Value>,
}

/// Alarm history entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlarmChangeRow {
    pub event_id: i64,
    pub alarm_id: Option<i64>,
    #[serde(rename = "type")]
    pub change_type: Option<String>,
    pub detail: Option<String>,
    pub user_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub on_behalf_of: Option<Uuid>,
    pub timestamp: Option<NaiveDateTime>,
}
