use crate::fields::FieldDef;

/// Binds a plain struct to a collection and a set of field definitions.
///
/// ```
/// use mongo_odm::{FieldDef, Schema};
/// use mongodb::bson::oid::ObjectId;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize, Debug, Default)]
/// struct User {
///     _id: Option<ObjectId>,
///     name: String,
///     age: i32,
/// }
///
/// impl Schema for User {
///     fn collection_name() -> &'static str {
///         "user"
///     }
///     fn fields() -> Vec<(&'static str, FieldDef)> {
///         vec![
///             ("name", FieldDef::char().max_length(60).required()),
///             ("age", FieldDef::integer()),
///         ]
///     }
/// }
/// ```
///
/// `_id` needs no definition; the mapper handles it directly.
pub trait Schema {
    fn collection_name() -> &'static str;

    fn fields() -> Vec<(&'static str, FieldDef)>;
}
