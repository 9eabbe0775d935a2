//! Alert retrieval and creation
//!
//! The Alert field table maps the service's wire properties to domain
//! attribute names; `_`-prefixed attributes are internal and hidden from
//! default listings. [`find_alerts`] compiles filters, fetches through the
//! transport and materializes an [`AlertSet`]; [`create_alert`] validates,
//! posts, and verifies the new record through the read path before returning.

use anyhow::Result;
use once_cell::sync::Lazy;
use serde_json::Value;

use crate::client::Transport;
use crate::entity::{self, Entity, EntitySet};
use crate::error::UnexpectedCreateResult;
use crate::fields::{EntitySchema, Extractor, FieldDescriptor, QueryTransform};
use crate::filters::{FilterSpec, compile_filters};

/// Read endpoint, relative to the read base URL
pub const ALERTS_READ_PATH: &str = "/alerts/odata/v4/Alerts";
/// Write endpoint, relative to the write base URL
pub const ALERTS_WRITE_PATH: &str = "/alerts/v1/Alerts";

pub type Alert = Entity;
pub type AlertSet = EntitySet;

/// The Alert field table, built once and shared by every Alert instance
pub static ALERT_SCHEMA: Lazy<EntitySchema> = Lazy::new(|| {
    EntitySchema::new(
        "Alert",
        "id",
        "type",
        vec![
            FieldDescriptor::new("description", "Description").with_query_name("description"),
            FieldDescriptor::new("severity_code", "SeverityCode")
                .with_query_name("severityCode")
                .mandatory()
                .with_query_transformer(QueryTransform::Double),
            FieldDescriptor::new("category", "Category"),
            FieldDescriptor::new("equipment_name", "EquipmentName"),
            FieldDescriptor::new("model_name", "ModelName"),
            FieldDescriptor::new("indicator_name", "IndicatorName"),
            FieldDescriptor::new("indicator_group_name", "IndicatorGroupName"),
            FieldDescriptor::new("template_name", "TemplateName"),
            FieldDescriptor::new("count", "Count").with_query_transformer(QueryTransform::Double),
            FieldDescriptor::new("status_code", "StatusCode")
                .with_query_transformer(QueryTransform::Double),
            FieldDescriptor::new("triggered_on", "TriggeredOn")
                .with_query_name("triggeredOn")
                .mandatory()
                .with_extractor(Extractor::OdataTimestamp)
                .with_query_transformer(QueryTransform::DatetimeOffset),
            FieldDescriptor::new("last_occured_on", "LastOccuredOn")
                .with_extractor(Extractor::OdataTimestamp)
                .with_query_transformer(QueryTransform::DatetimeOffset),
            FieldDescriptor::new("type_description", "AlertTypeDescription"),
            FieldDescriptor::new("error_code_description", "ErrorCodeDescription"),
            FieldDescriptor::new("type", "AlertType")
                .with_query_name("alertType")
                .mandatory(),
            FieldDescriptor::new("source", "Source").with_query_name("source"),
            FieldDescriptor::new("id", "AlertId"),
            FieldDescriptor::new("equipment_id", "EquipmentID")
                .with_query_name("equipmentId")
                .mandatory(),
            FieldDescriptor::new("model_id", "ModelID"),
            FieldDescriptor::new("template_id", "TemplateID").with_query_name("templateId"),
            FieldDescriptor::new("indicator_id", "IndicatorID").with_query_name("indicatorId"),
            FieldDescriptor::new("indicator_group_id", "IndicatorGroupID")
                .with_query_name("indicatorGroupId"),
            FieldDescriptor::new("notification_id", "NotificationId"),
            FieldDescriptor::new("error_code_id", "ErrorCodeID").with_query_name("errorCodeId"),
            FieldDescriptor::new("_indicator_description", "IndicatorDescription"),
            FieldDescriptor::new("_country_id", "CountryID"),
            FieldDescriptor::new("_functional_location_id", "FunctionalLocationID"),
            FieldDescriptor::new("_maintenance_plant", "MaintenancePlant"),
            FieldDescriptor::new("_functional_location_description", "FunctionalLocationDescription"),
            FieldDescriptor::new("_top_functional_location_name", "TopFunctionalLocationName"),
            FieldDescriptor::new("_planner_group", "PlannerGroup"),
            FieldDescriptor::new("_ref_alert_type_id", "RefAlertTypeId"),
            FieldDescriptor::new("_operator_name", "OperatorName"),
            FieldDescriptor::new("_created_by", "CreatedBy"),
            FieldDescriptor::new("_changed_by", "ChangedBy"),
            FieldDescriptor::new("_serial_number", "SerialNumber"),
            FieldDescriptor::new("_changed_on", "ChangedOn")
                .with_extractor(Extractor::OdataTimestamp)
                .with_query_transformer(QueryTransform::DatetimeOffset),
            FieldDescriptor::new("_processor", "Processor"),
            FieldDescriptor::new("_top_equipment_id", "TopEquipmentID"),
            FieldDescriptor::new("_planning_plant", "PlanningPlant"),
            FieldDescriptor::new("_operator_id", "OperatorID"),
            FieldDescriptor::new("_top_equipment_name", "TopEquipmentName"),
            FieldDescriptor::new("_created_on", "CreatedOn")
                .with_extractor(Extractor::OdataTimestamp)
                .with_query_transformer(QueryTransform::DatetimeOffset),
            FieldDescriptor::new("_model_description", "ModelDescription"),
            FieldDescriptor::new("_top_equipment_description", "TopEquipmentDescription"),
            FieldDescriptor::new("_functional_location_name", "FunctionalLocationName"),
            FieldDescriptor::new("_top_functional_location_description", "TopFunctionalLocationDescription"),
            FieldDescriptor::new("_top_functional_location_id", "TopFunctionalLocationID"),
            FieldDescriptor::new("_equipment_description", "EquipmentDescription"),
        ],
    )
});

/// Fetch alerts matching the given filters
///
/// Results from a breakable-filter fan-out are unioned by the transport;
/// duplicates are dropped here on the identifier, first occurrence winning.
pub async fn find_alerts(transport: &dyn Transport, filters: FilterSpec) -> Result<AlertSet> {
    let clauses = compile_filters(&filters, &ALERT_SCHEMA)?;
    let endpoint_url = format!("{}{}", transport.read_base_url(), ALERTS_READ_PATH);
    let raw_objects = transport
        .fetch(&endpoint_url, &clauses.unbreakable, &clauses.breakable)
        .await?;

    let mut elements: Vec<Entity> = Vec::with_capacity(raw_objects.len());
    for raw in raw_objects {
        let element = Entity::new(&ALERT_SCHEMA, raw);
        let duplicate = element
            .id()
            .is_some_and(|id| elements.iter().any(|existing| existing.id() == Some(id)));
        if !duplicate {
            elements.push(element);
        }
    }
    Ok(EntitySet::new(&ALERT_SCHEMA, elements)?)
}

/// Create one alert and verify it through the read path
///
/// The write endpoint answers with the bare identifier of the new record.
/// Creation only counts as successful once a read filtered by that identifier
/// returns exactly one record; anything else is [`UnexpectedCreateResult`],
/// which must not be silently retried at this layer.
pub async fn create_alert(
    transport: &dyn Transport,
    data: serde_json::Map<String, Value>,
) -> Result<Alert> {
    validate_create_payload(&data)?;
    let url = format!("{}{}", transport.write_base_url(), ALERTS_WRITE_PATH);
    let body = transport
        .issue_request("POST", &url, Some(&Value::Object(data)), &[])
        .await?;
    let id = parse_created_id(&body)?;

    let verification = FilterSpec::new().eq("id", format!("'{}'", id));
    let found = find_alerts(transport, verification).await?;
    if found.len() != 1 {
        return Err(UnexpectedCreateResult {
            id,
            count: found.len(),
        }
        .into());
    }
    let mut elements = found.into_elements();
    Ok(elements.remove(0))
}

/// Check a create payload against the write schema
///
/// Keys are the service's query names; custom `Z_`/`z_` keys pass through.
/// All mandatory fields must be present.
fn validate_create_payload(data: &serde_json::Map<String, Value>) -> Result<()> {
    let writable: Vec<&str> = ALERT_SCHEMA
        .fields()
        .iter()
        .filter(|f| !f.attribute_name().starts_with('_'))
        .map(|f| f.query_name())
        .collect();
    let unknown: Vec<&str> = data
        .keys()
        .map(String::as_str)
        .filter(|key| !writable.contains(key) && !entity::is_custom_key(key))
        .collect();
    if !unknown.is_empty() {
        anyhow::bail!("unknown fields in create request: {}", unknown.join(", "));
    }
    let missing: Vec<&str> = ALERT_SCHEMA
        .fields()
        .iter()
        .filter(|f| f.is_mandatory())
        .map(|f| f.query_name())
        .filter(|key| !data.contains_key(*key))
        .collect();
    if !missing.is_empty() {
        anyhow::bail!("mandatory fields missing from create request: {}", missing.join(", "));
    }
    Ok(())
}

fn parse_created_id(body: &str) -> Result<String> {
    if let Ok(Value::String(id)) = serde_json::from_str::<Value>(body) {
        return Ok(id);
    }
    let trimmed = body.trim().trim_matches(|c| c == '"' || c == '\'');
    if trimmed.is_empty() {
        anyhow::bail!("create response did not contain an identifier: '{}'", body);
    }
    Ok(trimmed.to_string())
}
