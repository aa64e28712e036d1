//! Validation of incoming records.
//!
//! Every write is gated here before anything reaches the store. Validators are
//! pure: they return [`Validation::Accepted`] with the typed record or
//! [`Validation::Rejected`] with every field error found, and never fail for
//! shape violations.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::types::{Character, Disaster, Scene};

/// Outcome of validating one record or collection.
#[derive(Debug, Clone, PartialEq)]
pub enum Validation<T> {
    Accepted(T),
    Rejected(ValidationErrors),
}

impl<T> Validation<T> {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    pub fn errors(&self) -> Option<&ValidationErrors> {
        match self {
            Self::Accepted(_) => None,
            Self::Rejected(errors) => Some(errors),
        }
    }

    /// Convert into a `Result`, rejections becoming `Error::ValidationFailed`.
    pub fn into_result(self) -> Result<T> {
        match self {
            Self::Accepted(value) => Ok(value),
            Self::Rejected(errors) => Err(Error::ValidationFailed(errors)),
        }
    }

    fn from_parts(value: Option<T>, errors: Vec<FieldError>) -> Self {
        match value {
            Some(value) if errors.is_empty() => Self::Accepted(value),
            _ => Self::Rejected(ValidationErrors(errors)),
        }
    }
}

/// Kind of record a field error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Project,
    Character,
    Scene,
    Disaster,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Project => write!(f, "project"),
            Self::Character => write!(f, "character"),
            Self::Scene => write!(f, "scene"),
            Self::Disaster => write!(f, "disaster"),
        }
    }
}

/// The rule a field violated.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum Constraint {
    Required,
    WrongType { expected: &'static str },
    Positive,
    NonEmpty,
    Unique,
    Range { min: i64, max: i64 },
}

/// One violated rule on one field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldError {
    pub entity: EntityKind,
    /// Position in the submitted list, for collection writes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    pub field: String,
    /// The offending value, when one was supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    pub constraint: Constraint,
}

impl FieldError {
    fn new(entity: EntityKind, field: &str, value: Option<&Value>, constraint: Constraint) -> Self {
        Self {
            entity,
            index: None,
            field: field.to_string(),
            value: value.cloned(),
            constraint,
        }
    }

    fn at(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(index) => write!(f, "{} at index {}: ", self.entity, index)?,
            None => write!(f, "{}: ", self.entity)?,
        }

        let field = &self.field;
        let value = self.value.as_ref().unwrap_or(&Value::Null);
        match &self.constraint {
            Constraint::Required => write!(f, "{field} is required"),
            Constraint::WrongType { expected } => {
                write!(f, "{field} must be {expected}, got {}", type_name(value))
            }
            Constraint::Positive => write!(f, "{field} must be a positive integer, got {value}"),
            Constraint::NonEmpty => write!(f, "{field} must not be empty"),
            Constraint::Unique => write!(f, "{field} {value} appears more than once"),
            Constraint::Range { min, max } => {
                write!(f, "{field} must be between {min} and {max}, got {value}")
            }
        }
    }
}

/// All field errors of a rejected record or collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether any error names `field`.
    pub fn has_field(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Projects
// ─────────────────────────────────────────────────────────────────────────────

/// A project title must not be blank. Returns the trimmed title.
pub fn validate_title(title: &str) -> Validation<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        let error = FieldError::new(
            EntityKind::Project,
            "title",
            Some(&Value::from(title)),
            Constraint::NonEmpty,
        );
        return Validation::Rejected(ValidationErrors(vec![error]));
    }
    Validation::Accepted(trimmed.to_string())
}

/// Target word counts must be positive.
pub fn validate_target_word_count(words: u32) -> Validation<u32> {
    if words == 0 {
        let error = FieldError::new(
            EntityKind::Project,
            "targetWordCount",
            Some(&Value::from(words)),
            Constraint::Positive,
        );
        return Validation::Rejected(ValidationErrors(vec![error]));
    }
    Validation::Accepted(words)
}

// ─────────────────────────────────────────────────────────────────────────────
// Characters
// ─────────────────────────────────────────────────────────────────────────────

/// Validate a character record. Only `name` is checked; other attributes are
/// open.
pub fn validate_character(data: &Value) -> Validation<Character> {
    let entity = EntityKind::Character;
    let Some(object) = data.as_object() else {
        let error = FieldError::new(
            entity,
            "record",
            Some(data),
            Constraint::WrongType { expected: "an object" },
        );
        return Validation::Rejected(ValidationErrors(vec![error]));
    };

    let mut errors = Vec::new();
    let name = match object.get("name") {
        None | Some(Value::Null) => {
            errors.push(FieldError::new(entity, "name", None, Constraint::Required));
            None
        }
        Some(Value::String(s)) if s.trim().is_empty() => {
            errors.push(FieldError::new(entity, "name", object.get("name"), Constraint::NonEmpty));
            None
        }
        Some(Value::String(s)) => Some(s.trim().to_string()),
        Some(other) => {
            errors.push(FieldError::new(
                entity,
                "name",
                Some(other),
                Constraint::WrongType { expected: "a string" },
            ));
            None
        }
    };

    let character = name.map(|name| {
        let attributes: Map<String, Value> = object
            .iter()
            .filter(|(key, _)| !matches!(key.as_str(), "name" | "updatedAt" | "updated_at"))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Character {
            name,
            updated_at: None,
            attributes,
        }
    });

    Validation::from_parts(character, errors)
}

// ─────────────────────────────────────────────────────────────────────────────
// Scenes
// ─────────────────────────────────────────────────────────────────────────────

const OPTIONAL_SCENE_FIELDS: [(&str, &str); 5] = [
    ("povCharacter", "pov_character"),
    ("conflict", "conflict"),
    ("disaster", "disaster"),
    ("outcome", "outcome"),
    ("notes", "notes"),
];

/// Remove a field under its canonical name or its alias.
fn take_field(map: &mut Map<String, Value>, name: &str, alias: &str) -> Option<Value> {
    let canonical = map.remove(name);
    let aliased = if alias != name { map.remove(alias) } else { None };
    canonical.or(aliased)
}

/// Validate one scene record.
pub fn validate_scene(data: &Value) -> Validation<Scene> {
    let (scene, errors) = check_scene(data);
    Validation::from_parts(scene, errors)
}

fn check_scene(data: &Value) -> (Option<Scene>, Vec<FieldError>) {
    let entity = EntityKind::Scene;
    let Some(object) = data.as_object() else {
        let error = FieldError::new(
            entity,
            "record",
            Some(data),
            Constraint::WrongType { expected: "an object" },
        );
        return (None, vec![error]);
    };

    let mut map = object.clone();
    let mut errors = Vec::new();

    let scene_number = match take_field(&mut map, "sceneNumber", "scene_number") {
        None | Some(Value::Null) => {
            errors.push(FieldError::new(entity, "sceneNumber", None, Constraint::Required));
            None
        }
        Some(value) => match value.as_i64() {
            Some(n) if n <= 0 => {
                errors.push(FieldError::new(entity, "sceneNumber", Some(&value), Constraint::Positive));
                None
            }
            Some(n) => match u32::try_from(n) {
                Ok(n) => Some(n),
                Err(_) => {
                    errors.push(FieldError::new(
                        entity,
                        "sceneNumber",
                        Some(&value),
                        Constraint::Range {
                            min: 1,
                            max: i64::from(u32::MAX),
                        },
                    ));
                    None
                }
            },
            None if value.is_u64() => {
                errors.push(FieldError::new(
                    entity,
                    "sceneNumber",
                    Some(&value),
                    Constraint::Range {
                        min: 1,
                        max: i64::from(u32::MAX),
                    },
                ));
                None
            }
            None => {
                errors.push(FieldError::new(
                    entity,
                    "sceneNumber",
                    Some(&value),
                    Constraint::WrongType {
                        expected: "a positive integer",
                    },
                ));
                None
            }
        },
    };

    let gist = match map.remove("gist") {
        None | Some(Value::Null) => {
            errors.push(FieldError::new(entity, "gist", None, Constraint::Required));
            None
        }
        Some(Value::String(s)) if s.trim().is_empty() => {
            errors.push(FieldError::new(
                entity,
                "gist",
                Some(&Value::String(s)),
                Constraint::NonEmpty,
            ));
            None
        }
        Some(Value::String(s)) => Some(s),
        Some(other) => {
            errors.push(FieldError::new(
                entity,
                "gist",
                Some(&other),
                Constraint::WrongType { expected: "a string" },
            ));
            None
        }
    };

    let mut optional: BTreeMap<&str, Option<String>> = BTreeMap::new();
    for (name, alias) in OPTIONAL_SCENE_FIELDS {
        let value = match take_field(&mut map, name, alias) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.trim().is_empty() => None,
            Some(Value::String(s)) => Some(s),
            Some(other) => {
                errors.push(FieldError::new(
                    entity,
                    name,
                    Some(&other),
                    Constraint::WrongType { expected: "a string" },
                ));
                None
            }
        };
        optional.insert(name, value);
    }

    let scene = match (scene_number, gist) {
        (Some(scene_number), Some(gist)) => {
            let mut field = |name: &str| optional.remove(name).flatten();
            Some(Scene {
                scene_number,
                gist,
                pov_character: field("povCharacter"),
                conflict: field("conflict"),
                disaster: field("disaster"),
                outcome: field("outcome"),
                notes: field("notes"),
                extra: map,
            })
        }
        _ => None,
    };

    (scene, errors)
}

/// Validate a whole scene list. Any error rejects the entire list; every
/// error is reported with the index of the offending element. Accepted lists
/// are ordered by scene number.
pub fn validate_scene_list(data: &Value) -> Validation<Vec<Scene>> {
    let Some(items) = data.as_array() else {
        let error = FieldError::new(
            EntityKind::Scene,
            "scenes",
            Some(data),
            Constraint::WrongType { expected: "an array" },
        );
        return Validation::Rejected(ValidationErrors(vec![error]));
    };

    let mut errors = Vec::new();
    let mut scenes = Vec::with_capacity(items.len());
    let mut first_index: BTreeMap<u32, usize> = BTreeMap::new();

    for (index, item) in items.iter().enumerate() {
        let (scene, item_errors) = check_scene(item);
        errors.extend(item_errors.into_iter().map(|e| e.at(index)));

        let Some(scene) = scene else { continue };
        if first_index.contains_key(&scene.scene_number) {
            errors.push(
                FieldError::new(
                    EntityKind::Scene,
                    "sceneNumber",
                    Some(&Value::from(scene.scene_number)),
                    Constraint::Unique,
                )
                .at(index),
            );
            continue;
        }
        first_index.insert(scene.scene_number, index);
        scenes.push(scene);
    }

    scenes.sort_by_key(|s| s.scene_number);
    Validation::from_parts(Some(scenes), errors)
}

// ─────────────────────────────────────────────────────────────────────────────
// Disasters
// ─────────────────────────────────────────────────────────────────────────────

/// Validate a disaster entry: level 1 to 3 and a non-empty description.
pub fn validate_disaster(level: i64, description: &str, now: DateTime<Utc>) -> Validation<Disaster> {
    let entity = EntityKind::Disaster;
    let mut errors = Vec::new();

    if !(1..=3).contains(&level) {
        errors.push(FieldError::new(
            entity,
            "level",
            Some(&Value::from(level)),
            Constraint::Range { min: 1, max: 3 },
        ));
    }
    if description.trim().is_empty() {
        errors.push(FieldError::new(
            entity,
            "description",
            Some(&Value::from(description)),
            Constraint::NonEmpty,
        ));
    }

    let disaster = errors.is_empty().then(|| Disaster {
        level: level as u8,
        description: description.trim().to_string(),
        logged_at: now,
    });
    Validation::from_parts(disaster, errors)
}
