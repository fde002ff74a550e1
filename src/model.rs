use crate::error::{OdmError, OdmResult};
use crate::event::Hooks;
use crate::fields::FieldType;
use crate::query::{QueryBuilder, QuerySet};
use crate::schema::Schema;
use crate::serializers::{self, SchemaFields};
use futures_util::StreamExt;
use log::error;
use mongodb::bson::{doc, to_document, Bson, DateTime, Document};
use mongodb::options::{CountOptions, IndexOptions};
use mongodb::results::InsertOneResult;
use mongodb::{ClientSession, Collection, Database, IndexModel};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A handle binding a schema type `M` to a collection, with chainable
/// query building and CRUD operations on top.
///
/// Dereferences to the inner `M`, so field access and mutation go
/// straight through the model value.
pub struct Model<'a, M>
where
    M: Hooks,
{
    inner: Box<M>,
    ctx: Option<M::Ctx>,
    db: Database,
    collection_name: &'a str,
    columns: SchemaFields,
    query_builder: QueryBuilder,
}

impl<'a, T: 'a + Hooks> std::ops::Deref for Model<'a, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<'a, T: 'a + Hooks> std::ops::DerefMut for Model<'a, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

impl<'a, M> Model<'a, M>
where
    M: Schema,
    M: Hooks,
    M: Default,
    M: Serialize,
    M: DeserializeOwned,
    M: Send,
    M: Sync,
    M: Unpin,
{
    pub fn new(db: &Database) -> Model<'a, M> {
        Model {
            inner: Box::<M>::default(),
            ctx: None,
            db: db.clone(),
            collection_name: M::collection_name(),
            columns: M::fields().into_iter().collect(),
            query_builder: Default::default(),
        }
    }

    /// Attaches request-scoped context, made available to the [`Hooks`].
    pub fn set_context(mut self, ctx: M::Ctx) -> Model<'a, M> {
        self.ctx = Some(ctx);
        self
    }

    /// Gets the collection name
    pub fn collection_name(&self) -> &'a str {
        self.collection_name
    }

    /// Gets a handle to the MongoDB collection
    pub fn collection(&self) -> Collection<M> {
        self.db.collection::<M>(self.collection_name)
    }

    /// Changes the collection name for this model
    pub fn set_collection(mut self, name: &'a str) -> Model<'a, M> {
        self.collection_name = name;
        self
    }

    /// Registers indexes based on the schema's field attributes
    ///
    /// This will:
    /// 1. Check existing indexes
    /// 2. Remove indexes for fields no longer carrying an index attribute
    /// 3. Create indexes for fields that gained one
    pub async fn register_indexes(&self) {
        let coll = self.db.collection::<M>(self.collection_name);

        let mut wanted: Vec<String> = self
            .columns
            .iter()
            .filter(|(_, def)| def.is_index())
            .map(|(name, def)| def.stored_name(name).to_string())
            .collect();

        let mut to_drop = Vec::new();
        match coll.list_indexes().await {
            Ok(mut cursor) => {
                while let Some(existing) = cursor.next().await {
                    match existing {
                        Ok(index_model) => {
                            for (key, _) in index_model.keys.iter() {
                                if key == "_id" {
                                    continue;
                                }
                                if let Some(pos) = wanted.iter().position(|w| w == key) {
                                    wanted.remove(pos);
                                } else if let Some(opts) = &index_model.options {
                                    if let Some(name) = &opts.name {
                                        to_drop.push(name.clone());
                                    }
                                }
                            }
                        }
                        Err(err) => error!("Can't unpack index model {err}"),
                    }
                }
            }
            Err(err) => error!("Can't list indexes : {err:?}"),
        }

        for name in to_drop {
            let _ = coll.drop_index(name).await;
        }

        let indexes = wanted
            .iter()
            .map(|stored| {
                let def = self
                    .columns
                    .iter()
                    .find(|(name, def)| def.stored_name(name) == stored.as_str())
                    .map(|(_, def)| def);
                let (unique, descending) = def
                    .map(|d| (d.unique, d.descending))
                    .unwrap_or((false, false));
                let sort = if descending { -1 } else { 1 };
                let key = stored.to_string();
                let opts = IndexOptions::builder()
                    .unique(unique)
                    .name(key.clone())
                    .build();
                IndexModel::builder()
                    .keys(doc! { key: sort })
                    .options(opts)
                    .build()
            })
            .collect::<Vec<IndexModel>>();

        if !indexes.is_empty() {
            if let Err(err) = coll.create_indexes(indexes).await {
                error!("Can't create indexes : {:?}", err);
            }
        }
    }

    /// Reset all filters
    pub fn reset(mut self) -> Model<'a, M> {
        self.query_builder = Default::default();
        self
    }
    /// Adds a filter condition; multiple calls AND together
    pub fn filter(mut self, criteria: Document) -> Model<'a, M> {
        self.query_builder.filters.push(criteria);
        self
    }
    /// Excludes documents matching all of `criteria` (compiled to `$nor`)
    pub fn exclude(mut self, criteria: Document) -> Model<'a, M> {
        self.query_builder.filters.push(doc! {"$nor": [criteria]});
        self
    }
    /// Sets the number of documents to skip
    pub fn skip(mut self, count: u32) -> Model<'a, M> {
        self.query_builder.skip = count;
        self
    }
    /// Sets the maximum number of documents to return
    pub fn limit(mut self, count: u32) -> Model<'a, M> {
        self.query_builder.limit = count;
        self
    }
    /// Sets the sort order
    pub fn sort(mut self, order: Document) -> Model<'a, M> {
        self.query_builder.sort = order;
        self
    }
    /// Sets whether to affect all matching documents (for update/delete)
    pub fn all(mut self) -> Model<'a, M> {
        self.query_builder.all = true;
        self
    }
    /// Sets the projection (field selection)
    pub fn select(mut self, projection: Document) -> Model<'a, M> {
        self.query_builder.select = Some(projection);
        self
    }
    /// Sets which fields should be visible (overrides hidden fields)
    pub fn visible(mut self, names: Vec<&str>) -> Model<'a, M> {
        self.query_builder.visible_fields = names.iter().map(|a| a.to_string()).collect();
        self
    }
    /// Sets whether to upsert on update
    pub fn upsert(mut self) -> Model<'a, M> {
        self.query_builder.upsert = true;
        self
    }

    /// Gets distinct values for a field
    pub async fn distinct(&self, name: &str) -> OdmResult<Vec<Bson>> {
        let filter = self.query_builder.filter_doc();
        let collection = self.db.collection::<Document>(self.collection_name);
        Ok(collection.distinct(name, filter).await?)
    }

    /// Get Documents count with filters
    pub async fn count_documents(&self) -> OdmResult<u64> {
        let filter = self.query_builder.filter_doc();
        let collection = self.db.collection::<Document>(self.collection_name);

        let options = CountOptions::builder()
            .skip(if self.query_builder.skip > 0 {
                Some(self.query_builder.skip as u64)
            } else {
                None
            })
            .limit(if self.query_builder.limit > 0 {
                Some(self.query_builder.limit as u64)
            } else {
                None
            })
            .build();

        Ok(collection
            .count_documents(filter)
            .with_options(options)
            .await?)
    }

    /// Creates a new document from the inner value
    ///
    /// # Arguments
    /// * `session` - Optional MongoDB transaction session
    ///
    /// # Notes
    /// - The inner value is validated against the schema first
    /// - Auto timestamp fields are stamped when absent
    pub async fn create(&self, session: Option<&mut ClientSession>) -> OdmResult<InsertOneResult> {
        let mut data = serializers::to_document_checked(self.inner.as_ref(), &self.columns)?;
        if data.get_object_id("_id").is_err() {
            data.remove("_id");
        }
        self.insert(data, session).await
    }

    /// Creates a new document from raw BSON, bypassing validation
    pub async fn create_doc(
        &self,
        data: Document,
        session: Option<&mut ClientSession>,
    ) -> OdmResult<InsertOneResult> {
        let mut data = data;
        serializers::apply_rename(&mut data, &self.columns, false);
        for (name, def) in &self.columns {
            if let FieldType::DateTime {
                auto_now,
                auto_now_add,
            } = def.field_type
            {
                let stored = def.stored_name(name);
                if auto_now || (auto_now_add && data.get_datetime(stored).is_err()) {
                    data.insert(stored.to_string(), DateTime::now());
                }
            }
        }
        self.insert(data, session).await
    }

    async fn insert(
        &self,
        data: Document,
        session: Option<&mut ClientSession>,
    ) -> OdmResult<InsertOneResult> {
        let collection = self.db.collection::<Document>(self.collection_name);
        match session {
            None => {
                let r = collection.insert_one(data.clone()).await?;
                self.inner
                    .finish(&self.ctx, "create", Document::new(), data, None)
                    .await;
                Ok(r)
            }
            Some(s) => {
                let r = collection.insert_one(data.clone()).session(&mut *s).await?;
                self.inner
                    .finish(&self.ctx, "create", Document::new(), data, Some(s))
                    .await;
                Ok(r)
            }
        }
    }

    /// Persists the inner value: updates by `_id` when it has one,
    /// otherwise inserts and writes the assigned `_id` back
    pub async fn save(&mut self, session: Option<&mut ClientSession>) -> OdmResult<()> {
        let mut data = serializers::to_document_checked(self.inner.as_ref(), &self.columns)?;
        match data.get_object_id("_id") {
            Ok(id) => {
                data.remove("_id");
                let collection = self.db.collection::<Document>(self.collection_name);
                let update = doc! {"$set": data.clone()};
                match session {
                    None => {
                        collection.update_one(doc! {"_id": id}, update).await?;
                        self.inner
                            .finish(&self.ctx, "save", Document::new(), data, None)
                            .await;
                    }
                    Some(s) => {
                        collection
                            .update_one(doc! {"_id": id}, update)
                            .session(&mut *s)
                            .await?;
                        self.inner
                            .finish(&self.ctx, "save", Document::new(), data, Some(s))
                            .await;
                    }
                }
            }
            Err(_) => {
                data.remove("_id");
                let r = self.insert(data.clone(), session).await?;
                if let Bson::ObjectId(id) = r.inserted_id {
                    data.insert("_id", id);
                }
                *self.inner = serializers::from_document_cleared(data, &self.columns, &[])?;
            }
        }
        Ok(())
    }

    /// Updates documents in the collection
    ///
    /// # Arguments
    /// * `data` - Update operations, or a bare document to `$set`
    /// * `session` - Optional MongoDB transaction session
    ///
    /// # Notes
    /// - Stamps `auto_now` fields; `auto_now_add` fields go into
    ///   `$setOnInsert` when upserting
    /// - Handles both single and multi-document updates based on `all()`
    /// - Errors when no filter was set
    pub async fn update(
        &self,
        data: Document,
        session: Option<&mut ClientSession>,
    ) -> OdmResult<Document> {
        let mut data = data;
        let is_opt = data.keys().any(|key| key.starts_with('$'));
        serializers::apply_rename(&mut data, &self.columns, is_opt);
        if !is_opt {
            data = doc! {"$set": data};
        }
        self.stamp_auto_fields(&mut data);

        if self.query_builder.filters.is_empty() {
            return Err(OdmError::EmptyFilter);
        }
        let filter = self.query_builder.filter_doc();

        let collection = self.db.collection::<Document>(self.collection_name);
        match session {
            None => {
                if self.query_builder.all {
                    let r = collection
                        .update_many(filter, data.clone())
                        .upsert(self.query_builder.upsert)
                        .await?;
                    let res = doc! {"modified_count": r.modified_count.to_string()};
                    self.inner
                        .finish(&self.ctx, "update_many", res.clone(), data, None)
                        .await;
                    Ok(res)
                } else {
                    let r = collection
                        .find_one_and_update(filter, data.clone())
                        .upsert(self.query_builder.upsert)
                        .sort(self.query_builder.sort.clone())
                        .await?;
                    let res = r.unwrap_or_default();
                    self.inner
                        .finish(&self.ctx, "update", res.clone(), data, None)
                        .await;
                    Ok(res)
                }
            }
            Some(s) => {
                if self.query_builder.all {
                    let r = collection
                        .update_many(filter, data.clone())
                        .upsert(self.query_builder.upsert)
                        .session(&mut *s)
                        .await?;
                    let res = doc! {"modified_count": r.modified_count.to_string()};
                    self.inner
                        .finish(&self.ctx, "update_many", res.clone(), data, Some(s))
                        .await;
                    Ok(res)
                } else {
                    let r = collection
                        .find_one_and_update(filter, data.clone())
                        .upsert(self.query_builder.upsert)
                        .sort(self.query_builder.sort.clone())
                        .session(&mut *s)
                        .await?;
                    let res = r.unwrap_or_default();
                    self.inner
                        .finish(&self.ctx, "update", res.clone(), data, Some(s))
                        .await;
                    Ok(res)
                }
            }
        }
    }

    /// Deletes documents from the collection
    ///
    /// # Arguments
    /// * `session` - Optional MongoDB transaction session
    ///
    /// # Notes
    /// - Falls back to the inner value's `_id` when no filter was set
    /// - Handles both single and multi-document deletes based on `all()`
    pub async fn delete(&self, session: Option<&mut ClientSession>) -> OdmResult<Document> {
        let filter = if self.query_builder.filters.is_empty() {
            let data = to_document(self.inner.as_ref())?;
            match data.get_object_id("_id") {
                Ok(id) => doc! {"_id": id},
                Err(_) => return Err(OdmError::Unsaved),
            }
        } else {
            self.query_builder.filter_doc()
        };

        let collection = self.db.collection::<Document>(self.collection_name);
        match session {
            None => {
                if self.query_builder.all {
                    let r = collection.delete_many(filter).await?;
                    let res = doc! {"deleted_count": r.deleted_count.to_string()};
                    self.inner
                        .finish(&self.ctx, "delete_many", res.clone(), doc! {}, None)
                        .await;
                    Ok(res)
                } else {
                    let r = collection
                        .find_one_and_delete(filter)
                        .sort(self.query_builder.sort.clone())
                        .await?;
                    let res = r.unwrap_or_default();
                    self.inner
                        .finish(&self.ctx, "delete", res.clone(), doc! {}, None)
                        .await;
                    Ok(res)
                }
            }
            Some(s) => {
                if self.query_builder.all {
                    let r = collection.delete_many(filter).session(&mut *s).await?;
                    let res = doc! {"deleted_count": r.deleted_count.to_string()};
                    self.inner
                        .finish(&self.ctx, "delete_many", res.clone(), doc! {}, Some(s))
                        .await;
                    Ok(res)
                } else {
                    let r = collection
                        .find_one_and_delete(filter)
                        .sort(self.query_builder.sort.clone())
                        .session(&mut *s)
                        .await?;
                    let res = r.unwrap_or_default();
                    self.inner
                        .finish(&self.ctx, "delete", res.clone(), doc! {}, Some(s))
                        .await;
                    Ok(res)
                }
            }
        }
    }

    /// Queries documents from the collection
    ///
    /// # Arguments
    /// * `session` - Optional MongoDB transaction session
    ///
    /// # Notes
    /// - Respects skip/limit/sort/select settings
    /// - Filters out hidden fields unless explicitly made visible
    pub async fn get(&self, session: Option<&mut ClientSession>) -> OdmResult<QuerySet<M>> {
        let hidden = self.hidden_fields();
        let docs = self.fetch(session).await?;
        let mut items = Vec::with_capacity(docs.len());
        for d in docs {
            items.push(serializers::from_document_cleared(d, &self.columns, &hidden)?);
        }
        Ok(QuerySet::new(items))
    }

    /// Gets the first matching document
    pub async fn first(&mut self, session: Option<&mut ClientSession>) -> OdmResult<Option<M>> {
        self.query_builder.limit = 1;
        Ok(self.get(session).await?.first())
    }

    /// Gets exactly one matching document, erroring when there is none
    pub async fn get_one(&mut self, session: Option<&mut ClientSession>) -> OdmResult<M> {
        self.first(session).await?.ok_or(OdmError::NotFound)
    }

    /// Queries documents and returns raw BSON
    pub async fn get_doc(&self, session: Option<&mut ClientSession>) -> OdmResult<Vec<Document>> {
        self.fetch(session).await
    }

    /// Queries documents and returns first raw BSON
    pub async fn first_doc(
        &mut self,
        session: Option<&mut ClientSession>,
    ) -> OdmResult<Option<Document>> {
        self.query_builder.limit = 1;
        let mut r = self.get_doc(session).await?;
        if r.is_empty() {
            Ok(None)
        } else {
            Ok(Some(r.remove(0)))
        }
    }

    /// Runs an aggregation pipeline
    pub async fn aggregate(
        &self,
        pipeline: impl IntoIterator<Item = Document>,
        session: Option<&mut ClientSession>,
    ) -> OdmResult<QuerySet<M>> {
        let hidden = self.hidden_fields();
        let docs = self.aggregate_doc(pipeline, session).await?;
        let mut items = Vec::with_capacity(docs.len());
        for d in docs {
            items.push(serializers::from_document_cleared(d, &self.columns, &hidden)?);
        }
        Ok(QuerySet::new(items))
    }

    /// Runs an aggregation pipeline and returns raw BSON
    pub async fn aggregate_doc(
        &self,
        pipeline: impl IntoIterator<Item = Document>,
        session: Option<&mut ClientSession>,
    ) -> OdmResult<Vec<Document>> {
        let collection = self.db.collection::<Document>(self.collection_name);
        let res = collection.aggregate(pipeline);
        let mut r = vec![];
        match session {
            None => {
                let mut cursor = res.await?;
                while let Some(d) = cursor.next().await {
                    r.push(M::cast(d?, &self.ctx))
                }
                Ok(r)
            }
            Some(s) => {
                let mut cursor = res.session(&mut *s).await?;
                while let Some(d) = cursor.next(&mut *s).await {
                    r.push(M::cast(d?, &self.ctx))
                }
                Ok(r)
            }
        }
    }

    async fn fetch(&self, session: Option<&mut ClientSession>) -> OdmResult<Vec<Document>> {
        let filter = self.query_builder.filter_doc();
        let collection = self.db.collection::<Document>(self.collection_name);
        let mut find = collection.find(filter);
        find = find.sort(self.query_builder.sort.clone());

        if self.query_builder.skip > 0 {
            find = find.skip(self.query_builder.skip as u64);
        }
        if self.query_builder.limit > 0 {
            find = find.limit(self.query_builder.limit as i64);
        }
        if let Some(select) = self.query_builder.select.clone() {
            find = find.projection(select);
        }

        let mut r = vec![];
        match session {
            None => {
                let mut cursor = find.await?;
                while let Some(d) = cursor.next().await {
                    r.push(M::cast(d?, &self.ctx))
                }
                Ok(r)
            }
            Some(s) => {
                let mut cursor = find.session(&mut *s).await?;
                while let Some(d) = cursor.next(&mut *s).await {
                    r.push(M::cast(d?, &self.ctx))
                }
                Ok(r)
            }
        }
    }

    fn stamp_auto_fields(&self, data: &mut Document) {
        for (name, def) in &self.columns {
            let FieldType::DateTime {
                auto_now,
                auto_now_add,
            } = def.field_type
            else {
                continue;
            };
            let stored = def.stored_name(name).to_string();
            if auto_now {
                if !data.contains_key("$set") {
                    data.insert("$set", doc! {});
                }
                if let Ok(set) = data.get_document_mut("$set") {
                    set.insert(stored.clone(), DateTime::now());
                }
            }
            if auto_now_add && self.query_builder.upsert {
                if !data.contains_key("$setOnInsert") {
                    data.insert("$setOnInsert", doc! {});
                }
                if let Ok(set) = data.get_document_mut("$setOnInsert") {
                    set.insert(stored, DateTime::now());
                }
            }
        }
    }

    fn hidden_fields(&self) -> Vec<String> {
        let mut r = vec![];
        for (name, def) in &self.columns {
            if def.hidden && !self.query_builder.visible_fields.contains(&name.to_string()) {
                r.push(name.to_string())
            }
        }
        r
    }
}

impl<'a, M> Model<'a, M>
where
    M: Schema,
    M: Hooks,
    M: Default,
    M: Serialize,
{
    /// this method takes the inner and gives you ownership of inner then
    /// replace it with default value
    pub fn take_inner(&mut self) -> M {
        std::mem::take(&mut *self.inner)
    }

    pub fn inner_ref(&self) -> &M {
        self.inner.as_ref()
    }

    pub fn inner_mut(&mut self) -> &mut M {
        self.inner.as_mut()
    }

    /// The inner value as a validated, renamed wire document
    pub fn inner_to_doc(&self) -> OdmResult<Document> {
        serializers::to_document_checked(self.inner.as_ref(), &self.columns)
    }

    /// The inner value as plain JSON with hidden fields stripped
    pub fn inner_to_json(&self) -> OdmResult<serde_json::Value> {
        serializers::to_json_value(self.inner.as_ref(), &self.columns)
    }

    pub fn fill(mut self, inner: M) -> Model<'a, M> {
        *self.inner = inner;
        self
    }
}
