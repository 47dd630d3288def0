//! SeaORM implementation of [`TenantRepository`].
//!
//! The operations are free functions generic over [`ConnectionTrait`] so the
//! same code runs against a pooled connection or inside a caller's
//! [`DatabaseTransaction`](sea_orm::DatabaseTransaction).
//! [`PgTenantRepository`] binds them to a [`DatabaseConnection`].

use std::marker::PhantomData;
use std::str::FromStr;

use async_trait::async_trait;
use sea_orm::sea_query::{Expr, ExprTrait, Func, OnConflict, Order};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    IdenStatic, IntoActiveModel, Iterable, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    TransactionTrait,
};
use uuid::Uuid;

use super::cursor::{self, CursorPosition};
use super::entity::{EntityMeta, TenantEntity, now_utc};
use super::error::{RepositoryError, RepositoryResult};
use super::filter::{Filters, ListQuery, Predicate, SortDirection};
use super::TenantRepository;

/// The five columns every tenant table carries.
#[derive(Debug, Clone, Copy)]
pub struct MetaColumns<C> {
    pub id: C,
    pub tenant_id: C,
    pub version: C,
    pub created_at: C,
    pub updated_at: C,
}

/// Binds a SeaORM entity to its domain type.
pub trait TenantTable: EntityTrait + Default + Send + Sync + 'static {
    type Domain: TenantEntity;

    fn meta_columns() -> MetaColumns<Self::Column>;

    fn into_domain(model: Self::Model) -> RepositoryResult<Self::Domain>;

    /// Active model with every column set, ready to insert.
    fn draft_into_active(
        meta: &EntityMeta,
        draft: <Self::Domain as TenantEntity>::Draft,
    ) -> RepositoryResult<Self::ActiveModel>;

    /// Active model with only the changed columns set.
    fn changes_into_active(
        changes: <Self::Domain as TenantEntity>::Changes,
    ) -> RepositoryResult<Self::ActiveModel>;
}

fn tenant_condition<E: TenantTable>(tenant_id: Uuid) -> Condition {
    Condition::all().add(E::meta_columns().tenant_id.eq(tenant_id))
}

fn row_condition<E: TenantTable>(tenant_id: Uuid, id: Uuid) -> Condition {
    tenant_condition::<E>(tenant_id).add(E::meta_columns().id.eq(id))
}

/// Translates declarative filters to a SeaORM condition. Unknown fields are
/// skipped; `tenant_id` is never taken from the caller.
pub fn filter_condition<E: TenantTable>(tenant_id: Uuid, filters: &Filters) -> Condition {
    let mut condition = tenant_condition::<E>(tenant_id);

    for field in filters.without_tenant() {
        let Ok(column) = E::Column::from_str(&field.field) else {
            tracing::debug!(field = %field.field, "Ignoring filter on unknown field");
            continue;
        };
        for predicate in &field.predicates {
            condition = condition.add(predicate_expr(column, predicate));
        }
    }
    condition
}

fn predicate_expr<C: ColumnTrait>(column: C, predicate: &Predicate) -> Condition {
    use super::filter::FilterValue;

    fn value(v: &FilterValue) -> sea_orm::Value {
        match v {
            FilterValue::Uuid(id) => (*id).into(),
            FilterValue::Timestamp(ts) => (*ts).into(),
            FilterValue::String(s) => s.clone().into(),
            FilterValue::Int(i) => (*i).into(),
            FilterValue::Float(f) => (*f).into(),
            FilterValue::Bool(b) => (*b).into(),
        }
    }

    let expr = match predicate {
        Predicate::Eq(v) => column.eq(value(v)),
        Predicate::In(values) => column.is_in(values.iter().map(value)),
        Predicate::Gte(v) => column.gte(value(v)),
        Predicate::Lte(v) => column.lte(value(v)),
        Predicate::Gt(v) => column.gt(value(v)),
        Predicate::Lt(v) => column.lt(value(v)),
        Predicate::Like(pattern) => column.like(pattern.as_str()),
        Predicate::Ilike(pattern) => {
            Expr::expr(Func::lower(Expr::col(column))).like(pattern.to_lowercase())
        }
    };
    Condition::all().add(expr)
}

/// `created_at < :ts OR (created_at = :ts AND id < :id)`
fn cursor_condition<E: TenantTable>(position: &CursorPosition) -> Condition {
    let cols = E::meta_columns();
    Condition::any()
        .add(cols.created_at.lt(position.created_at))
        .add(
            Condition::all()
                .add(cols.created_at.eq(position.created_at))
                .add(cols.id.lt(position.id)),
        )
}

pub async fn create<E, C>(
    conn: &C,
    tenant_id: Uuid,
    draft: <E::Domain as TenantEntity>::Draft,
) -> RepositoryResult<E::Domain>
where
    E: TenantTable,
    E::Model: IntoActiveModel<E::ActiveModel> + Send + Sync,
    E::ActiveModel: Send,
    C: ConnectionTrait,
{
    let meta = EntityMeta::new(tenant_id);
    let active = E::draft_into_active(&meta, draft)?;
    let model = active.insert(conn).await?;

    tracing::debug!(table = %E::default().table_name(), tenant_id = %tenant_id, id = %meta.id, "Inserted row");
    E::into_domain(model)
}

pub async fn get_by_id<E, C>(
    conn: &C,
    tenant_id: Uuid,
    id: Uuid,
) -> RepositoryResult<Option<E::Domain>>
where
    E: TenantTable,
    E::Model: Send + Sync,
    C: ConnectionTrait,
{
    E::find()
        .filter(row_condition::<E>(tenant_id, id))
        .one(conn)
        .await?
        .map(E::into_domain)
        .transpose()
}

pub async fn update<E, C>(
    conn: &C,
    tenant_id: Uuid,
    id: Uuid,
    expected_version: Option<i32>,
    changes: <E::Domain as TenantEntity>::Changes,
) -> RepositoryResult<E::Domain>
where
    E: TenantTable,
    E::Model: IntoActiveModel<E::ActiveModel> + Send + Sync,
    E::ActiveModel: Send,
    C: ConnectionTrait,
{
    let cols = E::meta_columns();
    let mut condition = row_condition::<E>(tenant_id, id);
    if let Some(expected) = expected_version {
        condition = condition.add(cols.version.eq(expected));
    }

    let result = E::update_many()
        .set(E::changes_into_active(changes)?)
        .col_expr(cols.version, Expr::col(cols.version).add(1))
        .col_expr(cols.updated_at, Expr::value(now_utc()))
        .filter(condition)
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        // Zero rows under a version check is either a stale version or a
        // missing row; a tenant-scoped lookup tells them apart.
        if let Some(expected) = expected_version
            && exists::<E, C>(conn, tenant_id, id).await?
        {
            return Err(RepositoryError::Concurrency { expected });
        }
        return Err(RepositoryError::NotFound);
    }

    tracing::debug!(table = %E::default().table_name(), tenant_id = %tenant_id, id = %id, "Updated row");
    get_by_id::<E, C>(conn, tenant_id, id)
        .await?
        .ok_or(RepositoryError::NotFound)
}

pub async fn delete<E, C>(conn: &C, tenant_id: Uuid, id: Uuid) -> RepositoryResult<bool>
where
    E: TenantTable,
    C: ConnectionTrait,
{
    let result = E::delete_many()
        .filter(row_condition::<E>(tenant_id, id))
        .exec(conn)
        .await?;
    Ok(result.rows_affected == 1)
}

pub async fn list<E, C>(
    conn: &C,
    tenant_id: Uuid,
    query: ListQuery,
) -> RepositoryResult<super::filter::Page<E::Domain>>
where
    E: TenantTable,
    E::Model: Send + Sync,
    C: ConnectionTrait,
{
    let mut condition = filter_condition::<E>(tenant_id, &query.filters);

    if let Some(raw) = &query.cursor {
        if !query.uses_default_order() {
            return Err(RepositoryError::InvalidCursor(
                "cursors require the default ordering".to_string(),
            ));
        }
        condition = condition.add(cursor_condition::<E>(&cursor::decode(raw)?));
    }

    let limit = query.effective_limit();
    let mut select = E::find().filter(condition);
    for term in query.effective_order() {
        let Ok(column) = E::Column::from_str(&term.field) else {
            continue;
        };
        let order = match term.direction {
            SortDirection::Asc => Order::Asc,
            SortDirection::Desc => Order::Desc,
        };
        select = select.order_by(column, order);
    }

    let models = select.limit(limit + 1).all(conn).await?;
    let has_more = models.len() as u64 > limit;

    let items = models
        .into_iter()
        .take(limit as usize)
        .map(E::into_domain)
        .collect::<RepositoryResult<Vec<_>>>()?;

    let next_cursor = match items.last() {
        Some(last) if has_more && query.uses_default_order() => Some(cursor::encode(last.meta())),
        _ => None,
    };

    Ok(super::filter::Page {
        items,
        next_cursor,
        has_more,
    })
}

pub async fn count<E, C>(conn: &C, tenant_id: Uuid, filters: &Filters) -> RepositoryResult<u64>
where
    E: TenantTable,
    E::Model: Send + Sync,
    C: ConnectionTrait,
{
    Ok(E::find()
        .filter(filter_condition::<E>(tenant_id, filters))
        .count(conn)
        .await?)
}

pub async fn exists<E, C>(conn: &C, tenant_id: Uuid, id: Uuid) -> RepositoryResult<bool>
where
    E: TenantTable,
    E::Model: Send + Sync,
    C: ConnectionTrait,
{
    let matches = E::find()
        .filter(row_condition::<E>(tenant_id, id))
        .count(conn)
        .await?;
    Ok(matches > 0)
}

/// `INSERT ... ON CONFLICT (tenant_id, <unique_fields>) DO UPDATE`.
///
/// Needs a unique index over exactly those columns. The conflicting row keeps
/// its id and `created_at`; its version goes up by one.
pub async fn upsert<E, C>(
    conn: &C,
    tenant_id: Uuid,
    unique_fields: &[&str],
    draft: <E::Domain as TenantEntity>::Draft,
) -> RepositoryResult<E::Domain>
where
    E: TenantTable,
    E::Model: IntoActiveModel<E::ActiveModel> + Send + Sync,
    E::ActiveModel: Send,
    C: ConnectionTrait,
{
    if unique_fields.is_empty() {
        return Err(RepositoryError::InvalidFilter(
            "upsert requires at least one unique field".to_string(),
        ));
    }
    let cols = E::meta_columns();

    let mut target = vec![cols.tenant_id];
    for field in unique_fields {
        let column = E::Column::from_str(field).map_err(|_| {
            RepositoryError::InvalidFilter(format!("unknown upsert key '{}'", field))
        })?;
        target.push(column);
    }

    let fixed = [
        cols.id.as_str(),
        cols.tenant_id.as_str(),
        cols.version.as_str(),
        cols.created_at.as_str(),
    ];
    let replaced: Vec<E::Column> = E::Column::iter()
        .filter(|c| !fixed.contains(&c.as_str()) && !unique_fields.contains(&c.as_str()))
        .collect();

    let on_conflict = OnConflict::columns(target)
        .update_columns(replaced)
        .value(cols.version, Expr::col((E::default(), cols.version)).add(1))
        .to_owned();

    let meta = EntityMeta::new(tenant_id);
    let model = E::insert(E::draft_into_active(&meta, draft)?)
        .on_conflict(on_conflict)
        .exec_with_returning(conn)
        .await?;

    tracing::debug!(table = %E::default().table_name(), tenant_id = %tenant_id, "Upserted row");
    E::into_domain(model)
}

/// Binds the generic operations to a pooled connection.
pub struct PgTenantRepository<E> {
    db: DatabaseConnection,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for PgTenantRepository<E> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E: TenantTable> PgTenantRepository<E> {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            _entity: PhantomData,
        }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}

#[async_trait]
impl<E> TenantRepository<E::Domain> for PgTenantRepository<E>
where
    E: TenantTable,
    E::Model: IntoActiveModel<E::ActiveModel> + Send + Sync,
    E::ActiveModel: Send,
{
    async fn create(
        &self,
        tenant_id: Uuid,
        draft: <E::Domain as TenantEntity>::Draft,
    ) -> RepositoryResult<E::Domain> {
        create::<E, _>(&self.db, tenant_id, draft).await
    }

    async fn get_by_id(&self, tenant_id: Uuid, id: Uuid) -> RepositoryResult<Option<E::Domain>> {
        get_by_id::<E, _>(&self.db, tenant_id, id).await
    }

    async fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        expected_version: Option<i32>,
        changes: <E::Domain as TenantEntity>::Changes,
    ) -> RepositoryResult<E::Domain> {
        update::<E, _>(&self.db, tenant_id, id, expected_version, changes).await
    }

    async fn delete(&self, tenant_id: Uuid, id: Uuid) -> RepositoryResult<bool> {
        delete::<E, _>(&self.db, tenant_id, id).await
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        query: ListQuery,
    ) -> RepositoryResult<super::filter::Page<E::Domain>> {
        list::<E, _>(&self.db, tenant_id, query).await
    }

    async fn count(&self, tenant_id: Uuid, filters: &Filters) -> RepositoryResult<u64> {
        count::<E, _>(&self.db, tenant_id, filters).await
    }

    async fn exists(&self, tenant_id: Uuid, id: Uuid) -> RepositoryResult<bool> {
        exists::<E, _>(&self.db, tenant_id, id).await
    }

    async fn bulk_create(
        &self,
        tenant_id: Uuid,
        drafts: Vec<<E::Domain as TenantEntity>::Draft>,
    ) -> RepositoryResult<Vec<E::Domain>> {
        let txn = self.db.begin().await?;
        let mut created = Vec::with_capacity(drafts.len());
        for draft in drafts {
            // Dropping `txn` on error rolls the batch back.
            created.push(create::<E, _>(&txn, tenant_id, draft).await?);
        }
        txn.commit().await?;
        Ok(created)
    }

    async fn upsert(
        &self,
        tenant_id: Uuid,
        unique_fields: &[&str],
        draft: <E::Domain as TenantEntity>::Draft,
    ) -> RepositoryResult<E::Domain> {
        upsert::<E, _>(&self.db, tenant_id, unique_fields, draft).await
    }
}
