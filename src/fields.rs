use crate::error::{OdmError, OdmResult};
use chrono::{NaiveDate, NaiveDateTime};
use mongodb::bson::spec::BinarySubtype;
use mongodb::bson::{Bson, DateTime};

/// The BSON shape a schema field accepts.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    Char { max_length: Option<usize> },
    Integer,
    Float,
    Boolean,
    List,
    Json,
    Uuid,
    Date,
    DateTime { auto_now: bool, auto_now_add: bool },
}

/// A single field of a model schema: its type plus validation and
/// index/projection attributes.
///
/// Built with the chainable constructors:
///
/// ```
/// use mongo_odm::FieldDef;
///
/// let name = FieldDef::char().max_length(60).required();
/// let password = FieldDef::char().hidden().rename("pswd");
/// let created_at = FieldDef::datetime().auto_now_add();
/// ```
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub field_type: FieldType,
    pub required: bool,
    pub blank: bool,
    pub default: Option<Bson>,
    pub unique: bool,
    pub indexed: bool,
    pub descending: bool,
    pub hidden: bool,
    pub rename: Option<String>,
}

impl FieldDef {
    fn new(field_type: FieldType) -> FieldDef {
        FieldDef {
            field_type,
            required: false,
            blank: false,
            default: None,
            unique: false,
            indexed: false,
            descending: false,
            hidden: false,
            rename: None,
        }
    }

    pub fn char() -> FieldDef {
        FieldDef::new(FieldType::Char { max_length: None })
    }
    pub fn integer() -> FieldDef {
        FieldDef::new(FieldType::Integer)
    }
    pub fn float() -> FieldDef {
        FieldDef::new(FieldType::Float)
    }
    pub fn boolean() -> FieldDef {
        FieldDef::new(FieldType::Boolean)
    }
    pub fn list() -> FieldDef {
        FieldDef::new(FieldType::List)
    }
    pub fn json() -> FieldDef {
        FieldDef::new(FieldType::Json)
    }
    pub fn uuid() -> FieldDef {
        FieldDef::new(FieldType::Uuid)
    }
    pub fn date() -> FieldDef {
        FieldDef::new(FieldType::Date)
    }
    pub fn datetime() -> FieldDef {
        FieldDef::new(FieldType::DateTime {
            auto_now: false,
            auto_now_add: false,
        })
    }

    pub fn max_length(mut self, limit: usize) -> FieldDef {
        if let FieldType::Char { max_length } = &mut self.field_type {
            *max_length = Some(limit);
        }
        self
    }
    pub fn required(mut self) -> FieldDef {
        self.required = true;
        self
    }
    pub fn blank(mut self) -> FieldDef {
        self.blank = true;
        self
    }
    pub fn default_value(mut self, value: impl Into<Bson>) -> FieldDef {
        self.default = Some(value.into());
        self
    }
    pub fn auto_now(mut self) -> FieldDef {
        if let FieldType::DateTime { auto_now, .. } = &mut self.field_type {
            *auto_now = true;
        }
        self
    }
    pub fn auto_now_add(mut self) -> FieldDef {
        if let FieldType::DateTime { auto_now_add, .. } = &mut self.field_type {
            *auto_now_add = true;
        }
        self
    }
    pub fn unique(mut self) -> FieldDef {
        self.unique = true;
        self
    }
    pub fn indexed(mut self) -> FieldDef {
        self.indexed = true;
        self
    }
    pub fn descending(mut self) -> FieldDef {
        self.descending = true;
        self
    }
    pub fn hidden(mut self) -> FieldDef {
        self.hidden = true;
        self
    }
    pub fn rename(mut self, name: &str) -> FieldDef {
        self.rename = Some(name.to_string());
        self
    }

    /// Whether this field carries an index attribute.
    pub fn is_index(&self) -> bool {
        self.unique || self.indexed || self.descending
    }

    /// The name the field has on the wire.
    pub fn stored_name<'a>(&'a self, name: &'a str) -> &'a str {
        self.rename.as_deref().unwrap_or(name)
    }

    /// The value to use when the field is absent from a document,
    /// if the definition provides one.
    pub fn fill_missing(&self) -> Option<Bson> {
        if let FieldType::DateTime {
            auto_now,
            auto_now_add,
        } = self.field_type
        {
            if auto_now || auto_now_add {
                return Some(Bson::DateTime(DateTime::now()));
            }
        }
        self.default.clone()
    }

    /// Checks `value` against the definition, returning the possibly
    /// coerced value to store.
    pub fn validate(&self, name: &str, value: &Bson) -> OdmResult<Bson> {
        if let FieldType::DateTime { auto_now: true, .. } = self.field_type {
            return Ok(Bson::DateTime(DateTime::now()));
        }
        if let Bson::Null = value {
            return if let Some(filled) = self.fill_missing() {
                Ok(filled)
            } else if self.required {
                Err(OdmError::validation(name, "this field is required"))
            } else {
                Ok(Bson::Null)
            };
        }

        match &self.field_type {
            FieldType::Char { max_length } => match value {
                Bson::String(s) => {
                    if s.is_empty() && !self.blank {
                        return Err(OdmError::validation(name, "this field cannot be blank"));
                    }
                    if let Some(limit) = max_length {
                        if s.chars().count() > *limit {
                            return Err(OdmError::validation(
                                name,
                                format!("value exceeds max length of {limit}"),
                            ));
                        }
                    }
                    Ok(value.clone())
                }
                _ => Err(OdmError::validation(name, "expected a string")),
            },
            FieldType::Integer => match value {
                Bson::Int32(_) | Bson::Int64(_) => Ok(value.clone()),
                _ => Err(OdmError::validation(name, "expected an integer")),
            },
            FieldType::Float => match value {
                Bson::Double(_) => Ok(value.clone()),
                _ => Err(OdmError::validation(name, "expected a float")),
            },
            FieldType::Boolean => match value {
                Bson::Boolean(_) => Ok(value.clone()),
                _ => Err(OdmError::validation(name, "expected a boolean")),
            },
            FieldType::List => match value {
                Bson::Array(_) => Ok(value.clone()),
                _ => Err(OdmError::validation(name, "expected a list")),
            },
            FieldType::Json => match value {
                Bson::Array(_) | Bson::Document(_) => Ok(value.clone()),
                _ => Err(OdmError::validation(name, "expected a list or document")),
            },
            FieldType::Uuid => match value {
                Bson::Binary(bin) if bin.subtype == BinarySubtype::Uuid => Ok(value.clone()),
                Bson::String(s) => match uuid::Uuid::parse_str(s) {
                    Ok(parsed) => Ok(Bson::String(parsed.hyphenated().to_string())),
                    Err(_) => Err(OdmError::validation(name, "expected a UUID")),
                },
                _ => Err(OdmError::validation(name, "expected a UUID")),
            },
            FieldType::Date => match value {
                Bson::DateTime(_) => Ok(value.clone()),
                Bson::String(s) => match NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                    Ok(date) => {
                        let midnight = date.and_hms_opt(0, 0, 0).unwrap();
                        Ok(Bson::DateTime(DateTime::from_millis(
                            midnight.and_utc().timestamp_millis(),
                        )))
                    }
                    Err(_) => Err(OdmError::validation(
                        name,
                        "expected a valid date string in 'YYYY-MM-DD' format",
                    )),
                },
                _ => Err(OdmError::validation(
                    name,
                    "expected a datetime or a valid date string",
                )),
            },
            FieldType::DateTime { .. } => match value {
                Bson::DateTime(_) => Ok(value.clone()),
                Bson::String(s) => match NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
                    Ok(stamp) => Ok(Bson::DateTime(DateTime::from_millis(
                        stamp.and_utc().timestamp_millis(),
                    ))),
                    Err(_) => Err(OdmError::validation(
                        name,
                        "expected a valid datetime string in 'YYYY-MM-DD HH:MM:SS' format",
                    )),
                },
                _ => Err(OdmError::validation(
                    name,
                    "expected a datetime or a valid datetime string",
                )),
            },
        }
    }
}
