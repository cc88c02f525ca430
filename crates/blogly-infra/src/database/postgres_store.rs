//! PostgreSQL implementation of the blog store ports.
//!
//! Every operation is a single transaction. Dependent-row cleanup (join
//! rows, a user's posts) is done with explicit statements inside that
//! transaction rather than left to schema-level cascade rules.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbConn, DbErr, EntityTrait, IntoActiveModel,
    LoaderTrait, ModelTrait, NotSet, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};

use blogly_core::domain::{
    NewPost, NewTag, NewUser, Post, PostId, Tag, TagId, UpdatePost, UpdateTag, UpdateUser, User,
    UserId,
};
use blogly_core::error::{StoreError, StoreResult};
use blogly_core::ports::{PostRepository, TagRepository, UserRepository};

use super::entity::{post, post_tag, tag, user};

/// Blog store backed by a SeaORM PostgreSQL connection.
pub struct PostgresBlogStore {
    db: DbConn,
}

impl PostgresBlogStore {
    pub fn new(db: DbConn) -> Self {
        Self { db }
    }

    /// Attach each post's tag set in one extra round trip.
    async fn with_tag_sets(&self, posts: Vec<post::Model>) -> StoreResult<Vec<Post>> {
        let tag_sets = posts
            .load_many_to_many(tag::Entity, post_tag::Entity, &self.db)
            .await
            .map_err(db_err)?;

        Ok(posts
            .into_iter()
            .zip(tag_sets)
            .map(|(model, tags)| model.into_post(tags))
            .collect())
    }
}

fn db_err(err: DbErr) -> StoreError {
    StoreError::Database(err.to_string())
}

/// Map a unique-index violation on `tags.name` to `Conflict`; anything else
/// stays a backend error.
fn unique_name_violation(err: DbErr, name: &str) -> StoreError {
    let text = err.to_string();
    let lowered = text.to_lowercase();
    if lowered.contains("unique") || lowered.contains("duplicate") {
        StoreError::Conflict(format!("tag name '{name}' is already taken"))
    } else {
        StoreError::Database(text)
    }
}

/// The subset of `tag_ids` that actually exist, as rows. Unknown ids are
/// dropped, not rejected.
async fn existing_tags<C>(db: &C, tag_ids: &[TagId]) -> StoreResult<Vec<tag::Model>>
where
    C: ConnectionTrait,
{
    if tag_ids.is_empty() {
        return Ok(Vec::new());
    }

    tag::Entity::find()
        .filter(tag::Column::Id.is_in(tag_ids.iter().copied()))
        .order_by_asc(tag::Column::Id)
        .all(db)
        .await
        .map_err(db_err)
}

async fn link_tags<C>(db: &C, post_id: PostId, tags: &[tag::Model]) -> StoreResult<()>
where
    C: ConnectionTrait,
{
    if tags.is_empty() {
        return Ok(());
    }

    let rows = tags.iter().map(|tag| post_tag::ActiveModel {
        post_id: Set(post_id),
        tag_id: Set(tag.id),
    });

    post_tag::Entity::insert_many(rows)
        .exec(db)
        .await
        .map_err(db_err)?;

    Ok(())
}

async fn unlink_post<C>(db: &C, post_id: PostId) -> StoreResult<()>
where
    C: ConnectionTrait,
{
    post_tag::Entity::delete_many()
        .filter(post_tag::Column::PostId.eq(post_id))
        .exec(db)
        .await
        .map_err(db_err)?;

    Ok(())
}

#[async_trait]
impl UserRepository for PostgresBlogStore {
    async fn create_user(&self, new_user: NewUser) -> StoreResult<User> {
        new_user.validate()?;

        let model = user::ActiveModel {
            id: NotSet,
            first_name: Set(new_user.first_name),
            last_name: Set(new_user.last_name),
            image_url: Set(new_user.image_url),
        }
        .insert(&self.db)
        .await
        .map_err(db_err)?;

        Ok(model.into())
    }

    async fn get_user(&self, id: UserId) -> StoreResult<User> {
        let model = user::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .ok_or(StoreError::not_found("user", id))?;

        Ok(model.into())
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let models = user::Entity::find()
            .order_by_asc(user::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;

        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn update_user(&self, id: UserId, changes: UpdateUser) -> StoreResult<User> {
        changes.validate()?;

        let model = user::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .ok_or(StoreError::not_found("user", id))?;

        let mut active = model.into_active_model();
        active.first_name = Set(changes.first_name);
        active.last_name = Set(changes.last_name);
        // None clears a stored URL; update is a full replacement.
        active.image_url = Set(changes.image_url);

        let model = active.update(&self.db).await.map_err(db_err)?;
        Ok(model.into())
    }

    async fn delete_user(&self, id: UserId) -> StoreResult<()> {
        let txn = self.db.begin().await.map_err(db_err)?;

        user::Entity::find_by_id(id)
            .one(&txn)
            .await
            .map_err(db_err)?
            .ok_or(StoreError::not_found("user", id))?;

        let post_ids: Vec<PostId> = post::Entity::find()
            .filter(post::Column::UserId.eq(id))
            .all(&txn)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(|model| model.id)
            .collect();

        if !post_ids.is_empty() {
            post_tag::Entity::delete_many()
                .filter(post_tag::Column::PostId.is_in(post_ids.iter().copied()))
                .exec(&txn)
                .await
                .map_err(db_err)?;

            post::Entity::delete_many()
                .filter(post::Column::UserId.eq(id))
                .exec(&txn)
                .await
                .map_err(db_err)?;
        }

        user::Entity::delete_by_id(id)
            .exec(&txn)
            .await
            .map_err(db_err)?;

        txn.commit().await.map_err(db_err)?;

        tracing::debug!(user_id = id, posts = post_ids.len(), "Deleted user");
        Ok(())
    }
}

#[async_trait]
impl PostRepository for PostgresBlogStore {
    async fn create_post(&self, new_post: NewPost) -> StoreResult<Post> {
        new_post.validate()?;

        let txn = self.db.begin().await.map_err(db_err)?;

        user::Entity::find_by_id(new_post.user_id)
            .one(&txn)
            .await
            .map_err(db_err)?
            .ok_or(StoreError::not_found("user", new_post.user_id))?;

        let tags = existing_tags(&txn, &new_post.tag_ids).await?;

        let model = post::ActiveModel {
            id: NotSet,
            title: Set(new_post.title),
            content: Set(new_post.content),
            created_at: Set(Utc::now().into()),
            user_id: Set(new_post.user_id),
        }
        .insert(&txn)
        .await
        .map_err(db_err)?;

        link_tags(&txn, model.id, &tags).await?;

        txn.commit().await.map_err(db_err)?;

        Ok(model.into_post(tags))
    }

    async fn get_post(&self, id: PostId) -> StoreResult<Post> {
        let model = post::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .ok_or(StoreError::not_found("post", id))?;

        let tags = model
            .find_related(tag::Entity)
            .all(&self.db)
            .await
            .map_err(db_err)?;

        Ok(model.into_post(tags))
    }

    async fn update_post(&self, id: PostId, changes: UpdatePost) -> StoreResult<Post> {
        changes.validate()?;

        let txn = self.db.begin().await.map_err(db_err)?;

        let model = post::Entity::find_by_id(id)
            .one(&txn)
            .await
            .map_err(db_err)?
            .ok_or(StoreError::not_found("post", id))?;

        let tags = existing_tags(&txn, &changes.tag_ids).await?;

        // created_at and user_id stay as written at creation time.
        let mut active = model.into_active_model();
        active.title = Set(changes.title);
        active.content = Set(changes.content);
        let model = active.update(&txn).await.map_err(db_err)?;

        unlink_post(&txn, id).await?;
        link_tags(&txn, id, &tags).await?;

        txn.commit().await.map_err(db_err)?;

        Ok(model.into_post(tags))
    }

    async fn delete_post(&self, id: PostId) -> StoreResult<()> {
        let txn = self.db.begin().await.map_err(db_err)?;

        post::Entity::find_by_id(id)
            .one(&txn)
            .await
            .map_err(db_err)?
            .ok_or(StoreError::not_found("post", id))?;

        unlink_post(&txn, id).await?;

        post::Entity::delete_by_id(id)
            .exec(&txn)
            .await
            .map_err(db_err)?;

        txn.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn list_posts_for_user(&self, user_id: UserId) -> StoreResult<Vec<Post>> {
        let models = post::Entity::find()
            .filter(post::Column::UserId.eq(user_id))
            .order_by_asc(post::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;

        self.with_tag_sets(models).await
    }

    async fn list_posts_for_tag(&self, tag_id: TagId) -> StoreResult<Vec<Post>> {
        let post_ids: Vec<PostId> = post_tag::Entity::find()
            .filter(post_tag::Column::TagId.eq(tag_id))
            .all(&self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(|row| row.post_id)
            .collect();

        if post_ids.is_empty() {
            return Ok(Vec::new());
        }

        let models = post::Entity::find()
            .filter(post::Column::Id.is_in(post_ids))
            .order_by_asc(post::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;

        self.with_tag_sets(models).await
    }

    async fn recent_posts(&self, limit: u64) -> StoreResult<Vec<Post>> {
        let models = post::Entity::find()
            .order_by_desc(post::Column::CreatedAt)
            .order_by_desc(post::Column::Id)
            .limit(limit)
            .all(&self.db)
            .await
            .map_err(db_err)?;

        self.with_tag_sets(models).await
    }
}

#[async_trait]
impl TagRepository for PostgresBlogStore {
    async fn create_tag(&self, new_tag: NewTag) -> StoreResult<Tag> {
        new_tag.validate()?;

        // Deterministic Conflict for the common case; the unique index still
        // backs the racy one.
        let taken = tag::Entity::find()
            .filter(tag::Column::Name.eq(new_tag.name.as_str()))
            .one(&self.db)
            .await
            .map_err(db_err)?;
        if taken.is_some() {
            return Err(StoreError::Conflict(format!(
                "tag name '{}' is already taken",
                new_tag.name
            )));
        }

        let model = tag::ActiveModel {
            id: NotSet,
            name: Set(new_tag.name.clone()),
        }
        .insert(&self.db)
        .await
        .map_err(|err| unique_name_violation(err, &new_tag.name))?;

        Ok(model.into())
    }

    async fn get_tag(&self, id: TagId) -> StoreResult<Tag> {
        let model = tag::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .ok_or(StoreError::not_found("tag", id))?;

        Ok(model.into())
    }

    async fn list_tags(&self) -> StoreResult<Vec<Tag>> {
        let models = tag::Entity::find()
            .order_by_asc(tag::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;

        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn update_tag(&self, id: TagId, changes: UpdateTag) -> StoreResult<Tag> {
        changes.validate()?;

        let model = tag::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .ok_or(StoreError::not_found("tag", id))?;

        let taken = tag::Entity::find()
            .filter(tag::Column::Name.eq(changes.name.as_str()))
            .one(&self.db)
            .await
            .map_err(db_err)?;
        if taken.is_some_and(|existing| existing.id != id) {
            return Err(StoreError::Conflict(format!(
                "tag name '{}' is already taken",
                changes.name
            )));
        }

        let mut active = model.into_active_model();
        active.name = Set(changes.name.clone());

        let model = active
            .update(&self.db)
            .await
            .map_err(|err| unique_name_violation(err, &changes.name))?;

        Ok(model.into())
    }

    async fn delete_tag(&self, id: TagId) -> StoreResult<()> {
        let txn = self.db.begin().await.map_err(db_err)?;

        tag::Entity::find_by_id(id)
            .one(&txn)
            .await
            .map_err(db_err)?
            .ok_or(StoreError::not_found("tag", id))?;

        post_tag::Entity::delete_many()
            .filter(post_tag::Column::TagId.eq(id))
            .exec(&txn)
            .await
            .map_err(db_err)?;

        tag::Entity::delete_by_id(id)
            .exec(&txn)
            .await
            .map_err(db_err)?;

        txn.commit().await.map_err(db_err)?;
        Ok(())
    }
}
