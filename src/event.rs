use mongodb::bson::Document;
use mongodb::ClientSession;

/// Lifecycle hooks fired around model operations.
///
/// `Ctx` carries request-scoped context (an authenticated user, a trace
/// id) into the hooks; set it with [`Model::set_context`].
///
/// [`Model::set_context`]: crate::Model::set_context
#[allow(async_fn_in_trait)]
pub trait Hooks {
    type Ctx;

    /// Called after every successful write with the operation name, the
    /// previous document (empty for inserts) and the written payload.
    async fn finish(
        &self,
        _ctx: &Option<Self::Ctx>,
        op: &str,
        old: Document,
        new: Document,
        _session: Option<&mut ClientSession>,
    ) {
        log::debug!("{} operation completed: {:?} => {:?}", op, old, new);
    }

    /// Applied to every raw document read back from the collection.
    fn cast(data: Document, _ctx: &Option<Self::Ctx>) -> Document {
        data
    }
}
