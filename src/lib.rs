//! A lightweight object-document mapper for MongoDB
//!
//! Plain serde structs become models by implementing [`Schema`] (the
//! collection name plus per-field validation rules) and [`Hooks`].
//! On top of that the crate provides CRUD operations, query building,
//! serialization and index management with support for:
//! - Field validation and defaults
//! - Field renaming
//! - Hidden/visible fields
//! - Auto timestamps
//! - Transactions
//! - Aggregation
//!

pub mod client;
pub mod error;
pub mod event;
pub mod fields;
pub mod model;
pub mod query;
pub mod schema;
pub mod serializers;

pub use client::{Client, ClientConfig};
pub use error::{OdmError, OdmResult};
pub use event::Hooks;
pub use fields::{FieldDef, FieldType};
pub use model::Model;
pub use query::QuerySet;
pub use schema::Schema;
