//! Filter compilation
//!
//! Translates attribute-keyed equality filters and free-form comparison
//! expressions into the query-string dialect of the remote service. The
//! output is two buckets: unbreakable clauses (AND-ed into every request)
//! and breakable groups (OR-alternatives a transport may split across
//! multiple requests). Pure; no network involvement.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::MalformedExpression;
use crate::fields::{EntitySchema, QueryTransform, QueryValue};
use crate::warnings::{self, Warning};

/// Value side of one attribute filter: equality against one value, or any-of
#[derive(Debug, Clone, PartialEq)]
pub enum FilterArg {
    One(QueryValue),
    Any(Vec<QueryValue>),
}

/// Caller-supplied filter parameters, in insertion order
#[derive(Debug, Clone, Default)]
pub struct FilterSpec {
    entries: Vec<(String, FilterArg)>,
    extended: Vec<String>,
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Equality against a single value
    pub fn eq(mut self, attribute: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.entries
            .push((attribute.into(), FilterArg::One(value.into())));
        self
    }

    /// Equality against any of the given values (one OR-group)
    pub fn any<V: Into<QueryValue>>(
        mut self,
        attribute: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.entries.push((
            attribute.into(),
            FilterArg::Any(values.into_iter().map(Into::into).collect()),
        ));
        self
    }

    /// Free-form `name <op> value` comparison with `<`, `>`, `<=`, `>=`, `==`, `!=`
    pub fn expr(mut self, expression: impl Into<String>) -> Self {
        self.extended.push(expression.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.extended.is_empty()
    }
}

/// Compiled filter clause sets
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterClauses {
    /// AND-ed constraints included as-is in every request
    pub unbreakable: Vec<String>,
    /// One inner list per any-of attribute; OR-alternatives that may be
    /// split across requests
    pub breakable: Vec<Vec<String>>,
}

static EXPRESSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\S+?)\s*(<=|>=|==|!=|<|>)\s*(\S.*?)\s*$").unwrap());

/// Compile filter parameters against a field table
///
/// Attribute keys with no matching descriptor pass through verbatim with an
/// identity transform; all such names are reported in a single
/// not-in-terminology warning per call. Output order follows input order.
pub fn compile_filters(
    spec: &FilterSpec,
    schema: &EntitySchema,
) -> Result<FilterClauses, MalformedExpression> {
    let mut clauses = FilterClauses::default();
    let mut unknown: Vec<String> = Vec::new();

    for (attribute, arg) in &spec.entries {
        let (query_name, transform) = resolve(schema, attribute, &mut unknown);
        match arg {
            FilterArg::One(value) => {
                clauses
                    .unbreakable
                    .push(format!("{} eq {}", query_name, transform.apply(value)));
            }
            FilterArg::Any(values) => {
                clauses.breakable.push(
                    values
                        .iter()
                        .map(|value| format!("{} eq {}", query_name, transform.apply(value)))
                        .collect(),
                );
            }
        }
    }

    for expression in &spec.extended {
        let captures = EXPRESSION
            .captures(expression)
            .ok_or_else(|| MalformedExpression {
                expression: expression.clone(),
            })?;
        let name = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
        let operator = captures.get(2).map(|m| m.as_str()).unwrap_or_default();
        let literal = captures.get(3).map(|m| m.as_str()).unwrap_or_default();
        let odata_operator = match operator {
            "<" => "lt",
            ">" => "gt",
            "<=" => "le",
            ">=" => "ge",
            "==" => "eq",
            "!=" => "ne",
            _ => unreachable!("operator set fixed by the expression regex"),
        };
        let (query_name, transform) = resolve(schema, name, &mut unknown);
        let rendered = transform.apply(&QueryValue::Str(literal.to_string()));
        clauses
            .unbreakable
            .push(format!("{} {} {}", query_name, odata_operator, rendered));
    }

    if !unknown.is_empty() {
        warnings::emit(Warning::UnknownAttributes { names: unknown });
    }
    Ok(clauses)
}

fn resolve(
    schema: &EntitySchema,
    attribute: &str,
    unknown: &mut Vec<String>,
) -> (String, QueryTransform) {
    match schema.field(attribute) {
        Some(field) => (field.query_name().to_string(), field.query_transformer()),
        None => {
            if !unknown.iter().any(|name| name == attribute) {
                unknown.push(attribute.to_string());
            }
            (attribute.to_string(), QueryTransform::Identity)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::FieldDescriptor;
    use crate::warnings::capture;

    fn schema() -> EntitySchema {
        EntitySchema::new(
            "Alert",
            "id",
            "type",
            vec![
                FieldDescriptor::new("id", "AlertId"),
                FieldDescriptor::new("type", "AlertType").with_query_name("alertType"),
                FieldDescriptor::new("severity_code", "SeverityCode")
                    .with_query_name("severityCode")
                    .with_query_transformer(QueryTransform::Double),
            ],
        )
    }

    #[test]
    fn test_unknown_params_pass_through_with_warning() {
        let schema = schema();
        let spec = FilterSpec::new()
            .expr("unknown_integer_param < 10")
            .any("unknown_string_param", ["'Type A'", "'Type F'"]);

        let (clauses, warnings) = capture(|| compile_filters(&spec, &schema).unwrap());

        assert_eq!(clauses.unbreakable, vec!["unknown_integer_param lt 10"]);
        assert_eq!(
            clauses.breakable,
            vec![vec![
                "unknown_string_param eq 'Type A'".to_string(),
                "unknown_string_param eq 'Type F'".to_string(),
            ]]
        );
        assert_eq!(
            warnings,
            vec![Warning::UnknownAttributes {
                names: vec![
                    "unknown_string_param".to_string(),
                    "unknown_integer_param".to_string(),
                ],
            }]
        );
    }

    #[test]
    fn test_known_attribute_uses_query_name_and_transformer() {
        let schema = schema();
        let spec = FilterSpec::new()
            .eq("type", "'MyAlertType'")
            .eq("severity_code", 10);

        let (clauses, warnings) = capture(|| compile_filters(&spec, &schema).unwrap());

        assert_eq!(
            clauses.unbreakable,
            vec!["alertType eq 'MyAlertType'", "severityCode eq 10.0"]
        );
        assert!(clauses.breakable.is_empty());
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_any_of_builds_one_breakable_group_per_attribute() {
        let schema = schema();
        let spec = FilterSpec::new()
            .any("severity_code", [10, 1])
            .any("type", ["'A'", "'B'"]);

        let clauses = compile_filters(&spec, &schema).unwrap();

        assert_eq!(
            clauses.breakable,
            vec![
                vec!["severityCode eq 10.0".to_string(), "severityCode eq 1.0".to_string()],
                vec!["alertType eq 'A'".to_string(), "alertType eq 'B'".to_string()],
            ]
        );
    }

    #[test]
    fn test_extended_filter_resolves_known_names() {
        let schema = schema();
        let spec = FilterSpec::new().expr("severity_code >= 5");

        let clauses = compile_filters(&spec, &schema).unwrap();

        assert_eq!(clauses.unbreakable, vec!["severityCode ge 5.0"]);
    }

    #[test]
    fn test_extended_filter_all_operators() {
        let schema = schema();
        let spec = FilterSpec::new()
            .expr("a < 1")
            .expr("b > 2")
            .expr("c <= 3")
            .expr("d >= 4")
            .expr("e == 5")
            .expr("f != 6");

        let (clauses, _) = capture(|| compile_filters(&spec, &schema).unwrap());

        assert_eq!(
            clauses.unbreakable,
            vec!["a lt 1", "b gt 2", "c le 3", "d ge 4", "e eq 5", "f ne 6"]
        );
    }

    #[test]
    fn test_malformed_expression_is_an_error() {
        let schema = schema();
        let spec = FilterSpec::new().expr("no operator here");
        let (result, _) = capture(|| compile_filters(&spec, &schema));
        assert_eq!(
            result,
            Err(MalformedExpression {
                expression: "no operator here".into()
            })
        );
    }

    #[test]
    fn test_output_preserves_input_order() {
        let schema = schema();
        let spec = FilterSpec::new()
            .any("type", ["'A'"])
            .eq("severity_code", 3)
            .any("id", ["'x'", "'y'"]);

        let clauses = compile_filters(&spec, &schema).unwrap();

        assert_eq!(clauses.unbreakable, vec!["severityCode eq 3.0"]);
        assert_eq!(clauses.breakable.len(), 2);
        assert!(clauses.breakable[0][0].starts_with("alertType"));
        assert!(clauses.breakable[1][0].starts_with("AlertId"));
    }
}
