use document_store::{Shipment, ShipmentField};
use serde_json::{Map, Value};

use crate::error::DomainError;

/// Top-level keys of a serialized shipment.
const TOP_LEVEL: [&str; 13] = [
    "id",
    "trackingId",
    "user",
    "amount",
    "source",
    "destination",
    "packageDetails",
    "status",
    "updatedStatus",
    "paymentStatus",
    "shipmentType",
    "createdAt",
    "updatedAt",
];

/// Field projection requested with `select`. `id` is always kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Projection {
    #[default]
    All,
    Include(Vec<String>),
    Exclude(Vec<String>),
}

fn is_selectable(path: &str) -> bool {
    TOP_LEVEL.contains(&path)
        || path == "packageDetails.dimensions"
        || path.parse::<ShipmentField>().is_ok()
}

impl Projection {
    /// Parses a comma-separated `select` list. Entries prefixed with `-` are
    /// excluded; mixing both forms is rejected.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let mut include = Vec::new();
        let mut exclude = Vec::new();

        for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (list, path) = match entry.strip_prefix('-') {
                Some(path) => (&mut exclude, path),
                None => (&mut include, entry.strip_prefix('+').unwrap_or(entry)),
            };
            if !is_selectable(path) {
                return Err(DomainError::BadRequest(format!(
                    "Unknown select field `{path}`"
                )));
            }
            list.push(path.to_string());
        }

        match (include.is_empty(), exclude.is_empty()) {
            (true, true) => Ok(Projection::All),
            (false, true) => Ok(Projection::Include(include)),
            (true, false) => Ok(Projection::Exclude(exclude)),
            (false, false) => Err(DomainError::BadRequest(
                "Cannot mix field inclusion and exclusion in select".to_string(),
            )),
        }
    }

    /// Serializes `shipment` and applies the projection.
    pub fn apply(&self, shipment: &Shipment) -> Result<Value, serde_json::Error> {
        let mut value = serde_json::to_value(shipment)?;

        if let Some(object) = value.as_object_mut() {
            match self {
                Projection::All => {}
                Projection::Include(paths) => {
                    let mut projected = Map::new();
                    for path in std::iter::once("id").chain(paths.iter().map(String::as_str)) {
                        if let Some(v) = get_path(object, path) {
                            insert_path(&mut projected, path, v.clone());
                        }
                    }
                    *object = projected;
                }
                Projection::Exclude(paths) => {
                    for path in paths.iter().filter(|p| p.as_str() != "id") {
                        remove_path(object, path);
                    }
                }
            }
        }
        Ok(value)
    }
}

fn get_path<'a>(object: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = object.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn insert_path(object: &mut Map<String, Value>, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            object.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let child = object
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Some(child) = child.as_object_mut() {
                insert_path(child, rest, value);
            }
        }
    }
}

fn remove_path(object: &mut Map<String, Value>, path: &str) {
    match path.split_once('.') {
        None => {
            object.remove(path);
        }
        Some((head, rest)) => {
            if let Some(child) = object.get_mut(head).and_then(Value::as_object_mut) {
                remove_path(child, rest);
            }
        }
    }
}
