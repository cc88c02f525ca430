use async_trait::async_trait;

use crate::domain::{
    NewPost, NewTag, NewUser, Post, PostId, Tag, TagId, UpdatePost, UpdateTag, UpdateUser, User,
    UserId,
};
use crate::error::StoreResult;

/// User operations. Each call is a single atomic transaction against the
/// backing store.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a user. Fails with `Validation` on blank names.
    async fn create_user(&self, new_user: NewUser) -> StoreResult<User>;

    /// Fetch a user by id. Fails with `NotFound` if there is no such row.
    async fn get_user(&self, id: UserId) -> StoreResult<User>;

    /// All users, in ascending id order.
    async fn list_users(&self) -> StoreResult<Vec<User>>;

    /// Replace a user's mutable fields. Same validation as create.
    async fn update_user(&self, id: UserId, changes: UpdateUser) -> StoreResult<User>;

    /// Delete a user together with their posts and those posts' tag
    /// associations. Tags themselves are left untouched.
    async fn delete_user(&self, id: UserId) -> StoreResult<()>;
}

/// Post operations.
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Create a post for an existing user. Fails with `NotFound` if the
    /// user does not exist; unknown tag ids are silently skipped.
    async fn create_post(&self, new_post: NewPost) -> StoreResult<Post>;

    /// Fetch a post and its tag set by id.
    async fn get_post(&self, id: PostId) -> StoreResult<Post>;

    /// Replace a post's title, content and full tag set. `created_at` and
    /// the owning user are untouched.
    async fn update_post(&self, id: PostId, changes: UpdatePost) -> StoreResult<Post>;

    /// Delete a post and its tag associations. Tags remain.
    async fn delete_post(&self, id: PostId) -> StoreResult<()>;

    /// All posts written by the given user, in ascending id order.
    async fn list_posts_for_user(&self, user_id: UserId) -> StoreResult<Vec<Post>>;

    /// All posts carrying the given tag, in ascending id order.
    async fn list_posts_for_tag(&self, tag_id: TagId) -> StoreResult<Vec<Post>>;

    /// The most recently created posts, newest first.
    async fn recent_posts(&self, limit: u64) -> StoreResult<Vec<Post>>;
}

/// Tag operations.
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// Create a tag. Fails with `Conflict` if the name is already taken.
    async fn create_tag(&self, new_tag: NewTag) -> StoreResult<Tag>;

    /// Fetch a tag by id.
    async fn get_tag(&self, id: TagId) -> StoreResult<Tag>;

    /// All tags, in ascending id order.
    async fn list_tags(&self) -> StoreResult<Vec<Tag>>;

    /// Rename a tag. Same validation and conflict rules as create.
    async fn update_tag(&self, id: TagId, changes: UpdateTag) -> StoreResult<Tag>;

    /// Delete a tag and its post associations. Posts remain.
    async fn delete_tag(&self, id: TagId) -> StoreResult<()>;
}

/// The full blog data store, usable as a single `Arc<dyn BlogStore>` handle.
pub trait BlogStore: UserRepository + PostRepository + TagRepository {}

impl<T> BlogStore for T where T: UserRepository + PostRepository + TagRepository {}
