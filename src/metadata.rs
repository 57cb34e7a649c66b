//! CHUK/CF metadata rules and the JSON form of dataset metadata carried into exported rasters.

use serde_json::{json, Map, Value};

use crate::check::{Issue, IssueCode, Severity};
use crate::dataset::{AttrValue, Attributes, Dataset, Variable};
use crate::error::Result;

/// A rule requiring an attribute to be present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeRule {
    pub name: &'static str,
    pub severity: Severity,
}

const fn warn(name: &'static str) -> AttributeRule {
    AttributeRule {
        name,
        severity: Severity::Warning,
    }
}

/// Global attributes expected on every CHUK product.
pub static GLOBAL_ATTRIBUTE_RULES: &[AttributeRule] = &[
    warn("title"),
    warn("institution"),
    warn("product_version"),
    warn("Conventions"),
    warn("summary"),
    warn("license"),
    warn("history"),
    warn("references"),
    warn("tracking_id"),
    warn("format_version"),
    warn("keywords"),
    warn("id"),
    warn("naming_authority"),
    warn("comment"),
    warn("date_created"),
    warn("creator_url"),
    warn("creator_name"),
    warn("creator_email"),
    warn("project"),
    warn("geospatial_lat_min"),
    warn("geospatial_lat_max"),
    warn("geospatial_lon_min"),
    warn("geospatial_lon_max"),
    warn("geospatial_vertical_min"),
    warn("geospatial_vertical_max"),
    warn("time_coverage_start"),
    warn("time_coverage_end"),
    warn("time_coverage_duration"),
    warn("time_coverage_resolution"),
    warn("platform"),
    warn("sensor"),
    warn("spatial_resolution"),
    warn("geospatial_lat_units"),
    warn("geospatial_lon_units"),
    warn("geospatial_lat_resolution"),
    warn("geospatial_lon_resolution"),
    warn("key_variables"),
];

/// Attributes every data variable should carry.
pub static VARIABLE_ATTRIBUTE_RULES: &[AttributeRule] = &[warn("units")];

/// Checks the global attributes of a dataset against `rules`.
pub fn check_global_attributes(ds: &Dataset, rules: &[AttributeRule]) -> Vec<Issue> {
    let mut issues: Vec<Issue> = rules
        .iter()
        .filter(|rule| !ds.attrs.contains_key(rule.name))
        .map(|rule| {
            Issue::new(
                rule.severity,
                IssueCode::MissingGlobalAttribute,
                rule.name,
                format!("global attribute {} is missing", rule.name),
            )
        })
        .collect();

    if let Some(conventions) = ds.attrs.get("Conventions") {
        let is_cf = conventions
            .as_str()
            .map(|c| c.split([',', ' ']).any(|part| part.trim().starts_with("CF-")))
            .unwrap_or(false);
        if !is_cf {
            issues.push(Issue::warning(
                IssueCode::InvalidAttributeValue,
                "Conventions",
                format!("Conventions \"{conventions}\" does not name a CF version"),
            ));
        }
    }
    issues
}

/// Checks the attributes of one data variable.
pub fn check_variable_attributes(
    ds: &Dataset,
    name: &str,
    var: &Variable,
    rules: &[AttributeRule],
) -> Vec<Issue> {
    let mut issues: Vec<Issue> = rules
        .iter()
        .filter(|rule| !var.attrs.contains_key(rule.name))
        .map(|rule| {
            Issue::new(
                rule.severity,
                IssueCode::MissingVariableAttribute,
                name,
                format!("variable {name} has no {} attribute", rule.name),
            )
        })
        .collect();

    if !var.attrs.contains_key("long_name") && !var.attrs.contains_key("standard_name") {
        issues.push(Issue::warning(
            IssueCode::MissingVariableAttribute,
            name,
            format!("variable {name} has neither long_name nor standard_name"),
        ));
    }

    // a dangling grid_mapping is reported by the CRS check
    match var.attr("grid_mapping") {
        Some(AttrValue::Str(_)) => {}
        Some(other) => issues.push(Issue::error(
            IssueCode::InvalidAttributeValue,
            name,
            format!("variable {name} has a non-string grid_mapping {other}"),
        )),
        None => issues.push(Issue::warning(
            IssueCode::MissingVariableAttribute,
            name,
            format!("variable {name} has no grid_mapping attribute"),
        )),
    }

    if let Some(coordinates) = var.attr_str("coordinates") {
        for c in coordinates.split_whitespace().filter(|c| !ds.contains(c)) {
            issues.push(Issue::warning(
                IssueCode::MissingCoordinate,
                name,
                format!("variable {name} lists coordinate {c} which is not in the dataset"),
            ));
        }
    }

    if var.attrs.contains_key("flag_values") || var.attrs.contains_key("flag_meanings") {
        match flag_table(var) {
            Ok(_) => {}
            Err(message) => issues.push(Issue::error(
                IssueCode::InvalidAttributeValue,
                name,
                format!("variable {name}: {message}"),
            )),
        }
    }
    issues
}

/// The `(meaning, value)` pairs of a categorical variable, from its `flag_meanings` and
/// `flag_values` attributes.
pub fn flag_table(var: &Variable) -> std::result::Result<Vec<(String, f64)>, String> {
    let meanings = var
        .attr_str("flag_meanings")
        .ok_or("flag_meanings is missing or not a string")?;
    let values = var
        .attr("flag_values")
        .and_then(AttrValue::to_f64_vec)
        .ok_or("flag_values is missing or not numeric")?;
    let meanings: Vec<&str> = meanings.split_whitespace().collect();
    if meanings.len() != values.len() {
        return Err(format!(
            "{} flag_meanings but {} flag_values",
            meanings.len(),
            values.len()
        ));
    }
    Ok(meanings
        .into_iter()
        .map(str::to_string)
        .zip(values)
        .collect())
}

fn attrs_to_json(attrs: &Attributes) -> Result<Value> {
    let map: Map<String, Value> = attrs
        .iter()
        .map(|(k, v)| Ok((k.clone(), serde_json::to_value(v)?)))
        .collect::<Result<_>>()?;
    Ok(Value::Object(map))
}

/// Dataset and variable metadata as
/// `{"__variable__": {<variable>: {...}}, "__dataset__": {...}}`.
pub fn to_json(ds: &Dataset, variable: &str) -> Result<Value> {
    let var = ds.require(variable)?;
    let mut variable_metadata = Map::new();
    variable_metadata.insert(variable.to_string(), attrs_to_json(&var.attrs)?);
    Ok(json!({
        "__variable__": Value::Object(variable_metadata),
        "__dataset__": attrs_to_json(&ds.attrs)?,
    }))
}

/// Parses an attribute object produced by [`to_json`] back into attributes.
pub fn attrs_from_json(value: &Value) -> Result<Attributes> {
    Ok(serde_json::from_value(value.clone())?)
}
