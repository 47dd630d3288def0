use std::future::Future;
use std::pin::Pin;

use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};

use crate::repository::RepositoryError;

/// Boxed unit of work borrowing the transaction.
pub type TxFuture<'c, T> = Pin<Box<dyn Future<Output = Result<T, RepositoryError>> + Send + 'c>>;

/// Runs `work` inside one transaction: commit on `Ok`, rollback on `Err`.
///
/// ```ignore
/// let (chat, message) = with_transaction(&db, |txn| {
///     Box::pin(async move {
///         let chat = pg::create::<chat::Entity, _>(txn, tenant_id, chat_draft).await?;
///         let message = pg::create::<message::Entity, _>(txn, tenant_id, message_draft).await?;
///         Ok((chat, message))
///     })
/// })
/// .await?;
/// ```
pub async fn with_transaction<T, F>(db: &DatabaseConnection, work: F) -> Result<T, RepositoryError>
where
    T: Send,
    F: for<'c> FnOnce(&'c DatabaseTransaction) -> TxFuture<'c, T> + Send,
{
    let txn = db.begin().await?;

    match work(&txn).await {
        Ok(value) => {
            txn.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = txn.rollback().await {
                tracing::warn!(error = %rollback_err, "Transaction rollback failed");
            }
            Err(err)
        }
    }
}
