//! Document ↔ struct mapping: validation, defaults, auto timestamps,
//! field renaming and hidden-field stripping.

use crate::error::OdmResult;
use crate::fields::FieldDef;
use mongodb::bson::{to_document, Bson, Document};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;

/// A schema's field definitions, keyed by struct field name.
pub type SchemaFields = HashMap<&'static str, FieldDef>;

/// Serializes `inner` and runs it through the schema: missing fields
/// take their defaults (or an auto timestamp), every schema field is
/// validated, renames are applied last.
pub fn to_document_checked<M: Serialize>(
    inner: &M,
    fields: &SchemaFields,
) -> OdmResult<Document> {
    let mut doc = to_document(inner)?;
    for (name, def) in fields {
        let value = doc.remove(*name).unwrap_or(Bson::Null);
        let value = def.validate(name, &value)?;
        doc.insert(def.stored_name(name).to_string(), value);
    }
    Ok(doc)
}

/// Rebuilds a struct from a stored document: renames are reversed,
/// hidden fields dropped, absent schema fields fall back to their
/// declared default on top of the struct's `Default`.
pub fn from_document_cleared<M: Default + Serialize + DeserializeOwned>(
    data: Document,
    fields: &SchemaFields,
    hidden: &[String],
) -> OdmResult<M> {
    let mut base = to_document(&M::default())?;
    for (key, value) in data {
        let name = fields
            .iter()
            .find(|(name, def)| def.stored_name(name) == key)
            .map(|(name, _)| name.to_string())
            .unwrap_or(key);
        if hidden.contains(&name) {
            continue;
        }
        base.insert(name, value);
    }
    for (name, def) in fields {
        if hidden.contains(&name.to_string()) {
            continue;
        }
        if base.get(*name).is_none() || base.get(*name) == Some(&Bson::Null) {
            if let Some(default) = &def.default {
                base.insert(name.to_string(), default.clone());
            }
        }
    }
    Ok(mongodb::bson::from_document(base)?)
}

/// Serializes a value as plain JSON for transport: the value goes
/// through the schema first, so renames and defaults match the wire
/// document, and hidden fields never leak out.
pub fn to_json_value<M: Serialize>(
    inner: &M,
    fields: &SchemaFields,
) -> OdmResult<serde_json::Value> {
    let mut doc = to_document_checked(inner, fields)?;
    for (name, def) in fields {
        if def.hidden {
            doc.remove(def.stored_name(name));
        }
    }
    Ok(Bson::Document(doc).into_relaxed_extjson())
}

/// Rewrites schema renames inside a payload. With `is_operator` set the
/// payload is an update document (`$set`, `$inc`, ...) and the renames
/// apply one level down.
pub fn apply_rename(doc: &mut Document, fields: &SchemaFields, is_operator: bool) {
    for (name, def) in fields {
        let Some(stored) = &def.rename else { continue };
        if is_operator {
            for (_, value) in doc.iter_mut() {
                if let Some(inner) = value.as_document_mut() {
                    if let Some(moved) = inner.remove(*name) {
                        inner.insert(stored.clone(), moved);
                    }
                }
            }
        } else if let Some(moved) = doc.remove(*name) {
            doc.insert(stored.clone(), moved);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::FieldDef;
    use mongodb::bson::doc;
    use serde::Deserialize;

    #[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
    struct User {
        name: String,
        age: i32,
        password: String,
        nickname: Option<String>,
    }

    fn fields() -> SchemaFields {
        [
            ("name", FieldDef::char().max_length(10).required()),
            ("age", FieldDef::integer().default_value(18)),
            ("password", FieldDef::char().blank().hidden().rename("pswd")),
            ("nickname", FieldDef::char()),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn to_document_applies_rename_and_validation() {
        let user = User {
            name: "smko".to_string(),
            age: 3,
            password: "secret".to_string(),
            nickname: None,
        };
        let doc = to_document_checked(&user, &fields()).unwrap();
        assert_eq!(doc.get_str("name").unwrap(), "smko");
        assert_eq!(doc.get_str("pswd").unwrap(), "secret");
        assert!(doc.get("password").is_none());
        assert_eq!(doc.get("nickname"), Some(&Bson::Null));
    }

    #[test]
    fn to_document_rejects_invalid_values() {
        let user = User {
            name: "a name that is far too long".to_string(),
            age: 3,
            password: String::new(),
            nickname: None,
        };
        assert!(to_document_checked(&user, &fields()).is_err());
    }

    #[test]
    fn from_document_reverses_rename_and_strips_hidden() {
        let stored = doc! {"name": "smko", "age": 3, "pswd": "secret"};
        let user: User =
            from_document_cleared(stored, &fields(), &["password".to_string()]).unwrap();
        assert_eq!(user.name, "smko");
        assert_eq!(user.password, "");
        let stored = doc! {"name": "smko", "age": 3, "pswd": "secret"};
        let user: User = from_document_cleared(stored, &fields(), &[]).unwrap();
        assert_eq!(user.password, "secret");
    }

    #[test]
    fn from_document_fills_defaults() {
        let stored = doc! {"name": "smko", "pswd": ""};
        let user: User = from_document_cleared(stored, &fields(), &[]).unwrap();
        assert_eq!(user.age, 18);
    }

    #[test]
    fn json_value_strips_hidden_fields() {
        let user = User {
            name: "smko".to_string(),
            age: 3,
            password: "secret".to_string(),
            nickname: None,
        };
        let json = to_json_value(&user, &fields()).unwrap();
        assert_eq!(json["name"], "smko");
        assert_eq!(json["age"], 3);
        assert!(json.get("pswd").is_none());
        assert!(json.get("password").is_none());
    }

    #[test]
    fn rename_inside_update_operators() {
        let fields = fields();
        let mut payload = doc! {"$set": {"password": "new", "age": 4}};
        apply_rename(&mut payload, &fields, true);
        assert_eq!(
            payload,
            doc! {"$set": {"age": 4, "pswd": "new"}}
        );

        let mut payload = doc! {"password": "new"};
        apply_rename(&mut payload, &fields, false);
        assert_eq!(payload, doc! {"pswd": "new"});
    }

    #[test]
    fn auto_timestamps_fill_missing_values() {
        #[derive(Debug, Default, Serialize, Deserialize)]
        struct Stamped {
            label: String,
            created_at: Option<mongodb::bson::DateTime>,
        }
        let fields: SchemaFields = [
            ("label", FieldDef::char().blank()),
            ("created_at", FieldDef::datetime().auto_now_add()),
        ]
        .into_iter()
        .collect();
        let doc = to_document_checked(&Stamped::default(), &fields).unwrap();
        assert!(matches!(doc.get("created_at"), Some(Bson::DateTime(_))));
    }
}
