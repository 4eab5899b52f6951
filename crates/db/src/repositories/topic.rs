//! Topic repository.

use std::sync::Arc;

use crate::entities::{Topic, topic, topic_access};
use democrasite_common::{AppError, AppResult, id::is_valid_share_code};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection,
    DatabaseTransaction, EntityTrait, Order, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    TransactionTrait,
    sea_query::{Expr, Func, LikeExpr, Query, SimpleExpr},
};

/// Sort order for topic listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TopicSort {
    /// Most distinct voters first.
    #[default]
    Popular,
    /// Newest first.
    Recent,
    /// Most favorited first.
    Favorites,
    /// Title ascending, case-insensitive.
    Alphabetical,
}

/// Filters for a topic listing.
#[derive(Debug, Clone)]
pub struct TopicSearchQuery {
    /// Restrict to topics this user may see.
    pub viewer_id: String,
    /// Substring matched against title, share code or any tag.
    pub title: Option<String>,
    /// Substrings; a topic matches when any tag contains any of them.
    pub tags: Vec<String>,
    pub sort: TopicSort,
    pub offset: u64,
    pub limit: u64,
}

/// Topic repository for database operations.
#[derive(Clone)]
pub struct TopicRepository {
    db: Arc<DatabaseConnection>,
}

impl TopicRepository {
    /// Create a new topic repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Start a transaction on the underlying connection.
    pub async fn begin(&self) -> AppResult<DatabaseTransaction> {
        self.db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a topic by share code. Malformed codes match nothing.
    pub async fn find_by_share_code(&self, share_code: &str) -> AppResult<Option<topic::Model>> {
        if !is_valid_share_code(share_code) {
            return Ok(None);
        }

        Topic::find()
            .filter(topic::Column::ShareCode.eq(share_code))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a topic by share code, returning an error if not found.
    pub async fn get_by_share_code(&self, share_code: &str) -> AppResult<topic::Model> {
        self.find_by_share_code(share_code)
            .await?
            .ok_or_else(|| AppError::TopicNotFound(share_code.to_string()))
    }

    /// Find topics by IDs.
    pub async fn find_by_ids(&self, ids: &[String]) -> AppResult<Vec<topic::Model>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        Topic::find()
            .filter(topic::Column::Id.is_in(ids.to_vec()))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Read a topic row and lock it until the surrounding transaction ends.
    pub async fn lock<C: ConnectionTrait>(&self, conn: &C, id: &str) -> AppResult<topic::Model> {
        Topic::find_by_id(id)
            .lock_exclusive()
            .one(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .ok_or_else(|| AppError::TopicNotFound(id.to_string()))
    }

    /// Check whether a share code is already taken.
    pub async fn share_code_exists<C: ConnectionTrait>(
        &self,
        conn: &C,
        share_code: &str,
    ) -> AppResult<bool> {
        let count = Topic::find()
            .filter(topic::Column::ShareCode.eq(share_code))
            .count(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(count > 0)
    }

    /// Create a new topic.
    pub async fn create<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: topic::ActiveModel,
    ) -> AppResult<topic::Model> {
        model
            .insert(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a topic.
    pub async fn update<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: topic::ActiveModel,
    ) -> AppResult<topic::Model> {
        model
            .update(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a topic row.
    pub async fn delete<C: ConnectionTrait>(&self, conn: &C, id: &str) -> AppResult<()> {
        Topic::delete_by_id(id)
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Topics created by a user.
    pub async fn find_by_creator<C: ConnectionTrait>(
        &self,
        conn: &C,
        creator_id: &str,
    ) -> AppResult<Vec<topic::Model>> {
        Topic::find()
            .filter(topic::Column::CreatorId.eq(creator_id))
            .order_by_asc(topic::Column::Id)
            .all(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count topics created by a user.
    pub async fn count_by_creator(&self, creator_id: &str) -> AppResult<u64> {
        Topic::find()
            .filter(topic::Column::CreatorId.eq(creator_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Increment vote count atomically (single UPDATE query, no fetch).
    pub async fn increment_vote_count<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &str,
    ) -> AppResult<()> {
        Topic::update_many()
            .col_expr(
                topic::Column::VoteCount,
                Expr::col(topic::Column::VoteCount).add(1),
            )
            .filter(topic::Column::Id.eq(id))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Decrement vote count atomically, never going below zero.
    pub async fn decrement_vote_count<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &str,
    ) -> AppResult<()> {
        Topic::update_many()
            .col_expr(
                topic::Column::VoteCount,
                Expr::cust("CASE WHEN vote_count > 0 THEN vote_count - 1 ELSE 0 END"),
            )
            .filter(topic::Column::Id.eq(id))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Increment favorite count atomically (single UPDATE query, no fetch).
    pub async fn increment_favorite_count<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &str,
    ) -> AppResult<()> {
        Topic::update_many()
            .col_expr(
                topic::Column::FavoriteCount,
                Expr::col(topic::Column::FavoriteCount).add(1),
            )
            .filter(topic::Column::Id.eq(id))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Decrement favorite count atomically, never going below zero.
    pub async fn decrement_favorite_count<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &str,
    ) -> AppResult<()> {
        Topic::update_many()
            .col_expr(
                topic::Column::FavoriteCount,
                Expr::cust("CASE WHEN favorite_count > 0 THEN favorite_count - 1 ELSE 0 END"),
            )
            .filter(topic::Column::Id.eq(id))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Search topics visible to the viewer.
    ///
    /// Returns one page of topics together with the total match count. Pages
    /// past the last match come back empty without a row query.
    pub async fn search(&self, query: &TopicSearchQuery) -> AppResult<(Vec<topic::Model>, u64)> {
        let condition = search_condition(query);

        let total = Topic::find()
            .filter(condition.clone())
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        if query.offset >= total {
            return Ok((Vec::new(), total));
        }

        let mut select = Topic::find().filter(condition);
        select = match query.sort {
            TopicSort::Popular => select.order_by_desc(topic::Column::VoteCount),
            TopicSort::Recent => select.order_by_desc(topic::Column::CreatedAt),
            TopicSort::Favorites => select.order_by_desc(topic::Column::FavoriteCount),
            TopicSort::Alphabetical => select.order_by(lower(topic::Column::Title), Order::Asc),
        };

        let topics = select
            .order_by_asc(topic::Column::Id)
            .offset(query.offset)
            .limit(query.limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok((topics, total))
    }
}

/// Public topics, the viewer's own topics, and topics the viewer was granted.
fn visibility_condition(viewer_id: &str) -> Condition {
    let granted = Query::select()
        .column(topic_access::Column::TopicId)
        .from(topic_access::Entity)
        .and_where(Expr::col(topic_access::Column::UserId).eq(viewer_id))
        .to_owned();

    Condition::any()
        .add(topic::Column::IsPublic.eq(true))
        .add(topic::Column::CreatorId.eq(viewer_id))
        .add(topic::Column::Id.in_subquery(granted))
}

fn search_condition(query: &TopicSearchQuery) -> Condition {
    let mut condition = Condition::all().add(visibility_condition(&query.viewer_id));

    if let Some(title) = query.title.as_deref().filter(|t| !t.is_empty()) {
        let pattern = contains_pattern(title);
        condition = condition.add(
            Condition::any()
                .add(lower_like(topic::Column::Title, &pattern))
                .add(lower_like(topic::Column::ShareCode, &pattern))
                .add(lower_like(topic::Column::SearchTags, &pattern)),
        );
    }

    let tags: Vec<&String> = query.tags.iter().filter(|t| !t.is_empty()).collect();
    if !tags.is_empty() {
        let any_tag = tags.into_iter().fold(Condition::any(), |acc, tag| {
            acc.add(lower_like(topic::Column::SearchTags, &contains_pattern(tag)))
        });
        condition = condition.add(any_tag);
    }

    condition
}

fn lower(column: topic::Column) -> SimpleExpr {
    Func::lower(Expr::col((Topic, column))).into()
}

fn lower_like(column: topic::Column, pattern: &str) -> SimpleExpr {
    Expr::expr(lower(column)).like(LikeExpr::new(pattern).escape('\\'))
}

/// Build a lowercase `%term%` pattern with LIKE metacharacters escaped.
fn contains_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
