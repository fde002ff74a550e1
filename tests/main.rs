use mongo_odm::{FieldDef, Hooks, Model, OdmError, Schema};
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{doc, DateTime};
use mongodb::{Client, Database};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Default)]
struct User {
    _id: Option<ObjectId>,
    name: String,
    phone: String,
    age: i32,
    password: String,
    block: bool,
    updated_at: Option<DateTime>,
    created_at: Option<DateTime>,
}

impl Schema for User {
    fn collection_name() -> &'static str {
        "user"
    }

    fn fields() -> Vec<(&'static str, FieldDef)> {
        vec![
            ("name", FieldDef::char().max_length(60).required()),
            ("phone", FieldDef::char().blank().unique()),
            ("age", FieldDef::integer().descending()),
            ("password", FieldDef::char().blank().hidden().rename("pswd")),
            ("block", FieldDef::boolean()),
            ("updated_at", FieldDef::datetime().auto_now()),
            ("created_at", FieldDef::datetime().auto_now_add()),
        ]
    }
}

impl Hooks for User {
    type Ctx = bool;
}

#[tokio::test]
async fn update_without_filter_is_rejected() {
    let db = get_db().await;
    let err = Model::<User>::new(&db)
        .update(doc! {"age": 3}, None)
        .await
        .unwrap_err();
    assert!(matches!(err, OdmError::EmptyFilter));
}

#[tokio::test]
async fn delete_unsaved_is_rejected() {
    let db = get_db().await;
    let err = Model::<User>::new(&db).delete(None).await.unwrap_err();
    assert!(matches!(err, OdmError::Unsaved));
}

#[tokio::test]
async fn create_validates_inner() {
    let db = get_db().await;
    let mut user_model = Model::<User>::new(&db);
    user_model.name = "x".repeat(61);
    let err = user_model.create(None).await.unwrap_err();
    assert!(matches!(err, OdmError::Validation { field, .. } if field == "name"));
}

#[tokio::test]
async fn inner_to_doc_applies_schema() {
    let db = get_db().await;
    let mut user_model = Model::<User>::new(&db);
    user_model.name = "Smko".to_string();
    user_model.password = "1234".to_string();
    let doc = user_model.inner_to_doc().unwrap();
    assert_eq!(doc.get_str("name").unwrap(), "Smko");
    assert_eq!(doc.get_str("pswd").unwrap(), "1234");
    assert!(doc.get("password").is_none());
    assert!(doc.get_datetime("created_at").is_ok());
    assert!(doc.get_datetime("updated_at").is_ok());
}

#[tokio::test]
#[ignore = "requires a running mongod"]
async fn test_upsert() {
    let db = get_db().await;

    Model::<User>::new(&db)
        .filter(doc! {"name":"test_upsert"})
        .upsert()
        .update(doc! {}, None)
        .await
        .unwrap();
    let user = Model::<User>::new(&db)
        .filter(doc! {"name":"test_upsert"})
        .first(None)
        .await
        .unwrap()
        .unwrap();

    assert!(user.created_at.is_some());
    assert_eq!(user.name, "test_upsert");
    Model::<User>::new(&db)
        .filter(doc! {"name":"test_upsert"})
        .delete(None)
        .await
        .unwrap();
}

#[tokio::test]
#[ignore = "requires a running mongod"]
async fn save_fill() {
    let db = get_db().await;
    let user = User {
        _id: None,
        name: "smko".to_string(),
        phone: "912".to_string(),
        age: 0,
        password: "".to_string(),
        block: false,
        updated_at: None,
        created_at: None,
    };

    Model::<User>::new(&db).fill(user).create(None).await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running mongod"]
async fn save_assigns_id() {
    let db = get_db().await;
    let mut user_model = Model::<User>::new(&db);
    user_model.name = "Smko".to_string();
    user_model.phone = "123456789".to_string();
    user_model.password = "1234".to_string();
    user_model.save(None).await.unwrap();
    assert!(user_model._id.is_some());

    user_model.age = 4;
    user_model.save(None).await.unwrap();

    let names = Model::<User>::new(&db).distinct("name").await.unwrap();
    assert!(!names.is_empty());
}

#[tokio::test]
#[ignore = "requires a running mongod"]
async fn find_one() {
    let db = get_db().await;
    let mut user_model = Model::<User>::new(&db);

    let founded = user_model
        .filter(doc! {"name":"Smko"})
        .visible(vec!["password"])
        .first(None)
        .await
        .unwrap();
    println!("The founded object {:?} ", founded);
}

#[tokio::test]
#[ignore = "requires a running mongod"]
async fn get_one_missing_is_not_found() {
    let db = get_db().await;
    let err = Model::<User>::new(&db)
        .filter(doc! {"name":"no such user"})
        .get_one(None)
        .await
        .unwrap_err();
    assert!(matches!(err, OdmError::NotFound));
}

#[tokio::test]
#[ignore = "requires a running mongod"]
async fn update() {
    let db = get_db().await;
    let user_model = Model::<User>::new(&db);
    user_model
        .filter(doc! {"name":"Smko"})
        .update(doc! {"age":3}, None)
        .await
        .unwrap();
    let user_model = Model::<User>::new(&db);
    user_model
        .filter(doc! {"name":"Smko"})
        .update(doc! {"$inc":{"age":1}}, None)
        .await
        .unwrap();
}

#[tokio::test]
#[ignore = "requires a running mongod"]
async fn delete() {
    let db = get_db().await;
    let user_model = Model::<User>::new(&db);
    user_model
        .filter(doc! {"name":"Smko"})
        .delete(None)
        .await
        .unwrap();
}

#[tokio::test]
#[ignore = "requires a running mongod"]
async fn find_and_collect() {
    let db = get_db().await;
    let user_model = Model::<User>::new(&db);

    let users = user_model.get(None).await.unwrap();

    println!("The users {:?} ", users.into_vec())
}

#[tokio::test]
#[ignore = "requires a running mongod"]
async fn exclude_is_server_side() {
    let db = get_db().await;
    let excluded = Model::<User>::new(&db)
        .exclude(doc! {"block": true})
        .get(None)
        .await
        .unwrap();
    for user in excluded {
        assert!(!user.block);
    }
}

#[tokio::test]
#[ignore = "requires a running mongod"]
async fn transaction_with_session() {
    let db = get_db().await;
    let mut session = db.client().start_session().await.unwrap();

    session.start_transaction().await.unwrap();

    let mut user_model = Model::<User>::new(&db);
    user_model.name = "TransactionUser".to_string();
    user_model.phone = "987654321".to_string();
    user_model.password = "txn_pass".to_string();
    user_model.create(Some(&mut session)).await.unwrap();

    let mut user_model = Model::<User>::new(&db);
    let user = user_model
        .filter(doc! {"name": "TransactionUser"})
        .first(Some(&mut session))
        .await
        .unwrap();
    assert!(user.is_some(), "User should exist within transaction");

    session.commit_transaction().await.unwrap();

    let mut user_model = Model::<User>::new(&db);
    let user = user_model
        .filter(doc! {"name": "TransactionUser"})
        .first(None)
        .await
        .unwrap();
    assert!(user.is_some(), "User should exist after commit");

    let user_model = Model::<User>::new(&db);
    user_model
        .filter(doc! {"name": "TransactionUser"})
        .delete(None)
        .await
        .unwrap();
}

#[tokio::test]
#[ignore = "requires a running mongod"]
async fn register_indexes() {
    let db = get_db().await;
    let user_model = Model::<User>::new(&db);
    user_model.register_indexes().await;
}

async fn get_db() -> Database {
    Client::with_uri_str("mongodb://localhost:27017")
        .await
        .expect("failed to connect")
        .database("test")
}
