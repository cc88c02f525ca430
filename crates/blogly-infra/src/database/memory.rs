//! In-memory blog store - full store semantics without a database.
//!
//! Used as the fallback when `DATABASE_URL` is not configured, and by tests
//! that want an isolated store per test. Data is lost on process restart.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use blogly_core::domain::{
    NewPost, NewTag, NewUser, Post, PostId, Tag, TagId, UpdatePost, UpdateTag, UpdateUser, User,
    UserId,
};
use blogly_core::error::{StoreError, StoreResult};
use blogly_core::ports::{PostRepository, TagRepository, UserRepository};

/// A post row as stored; the tag set lives in the join set, exactly like
/// the relational schema.
#[derive(Debug, Clone)]
struct PostRow {
    id: PostId,
    user_id: UserId,
    title: String,
    content: String,
    created_at: DateTime<Utc>,
}

#[derive(Default)]
struct Inner {
    users: BTreeMap<UserId, User>,
    posts: BTreeMap<PostId, PostRow>,
    tags: BTreeMap<TagId, Tag>,
    post_tags: BTreeSet<(PostId, TagId)>,
    next_user_id: UserId,
    next_post_id: PostId,
    next_tag_id: TagId,
}

impl Inner {
    fn assemble_post(&self, row: &PostRow) -> Post {
        // The join set is ordered by (post_id, tag_id), so tags come out in
        // tag-id order.
        let tags = self
            .post_tags
            .range((row.id, TagId::MIN)..=(row.id, TagId::MAX))
            .filter_map(|(_, tag_id)| self.tags.get(tag_id).cloned())
            .collect();

        Post {
            id: row.id,
            user_id: row.user_id,
            title: row.title.clone(),
            content: row.content.clone(),
            created_at: row.created_at,
            tags,
        }
    }

    fn link_existing_tags(&mut self, post_id: PostId, tag_ids: &[TagId]) {
        for tag_id in tag_ids {
            if self.tags.contains_key(tag_id) {
                self.post_tags.insert((post_id, *tag_id));
            }
        }
    }

    fn unlink_post(&mut self, post_id: PostId) {
        self.post_tags.retain(|(linked, _)| *linked != post_id);
    }

    fn tag_name_taken(&self, name: &str, exclude: Option<TagId>) -> bool {
        self.tags
            .values()
            .any(|tag| tag.name == name && Some(tag.id) != exclude)
    }
}

/// Blog store holding everything in process memory behind an async lock.
///
/// Each operation takes the lock once, which gives it the same
/// all-or-nothing visibility as a database transaction.
pub struct InMemoryBlogStore {
    inner: RwLock<Inner>,
}

impl InMemoryBlogStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }
}

impl Default for InMemoryBlogStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserRepository for InMemoryBlogStore {
    async fn create_user(&self, new_user: NewUser) -> StoreResult<User> {
        new_user.validate()?;

        let mut inner = self.inner.write().await;
        inner.next_user_id += 1;
        let user = User {
            id: inner.next_user_id,
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            image_url: new_user.image_url,
        };
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: UserId) -> StoreResult<User> {
        let inner = self.inner.read().await;
        inner
            .users
            .get(&id)
            .cloned()
            .ok_or(StoreError::not_found("user", id))
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let inner = self.inner.read().await;
        Ok(inner.users.values().cloned().collect())
    }

    async fn update_user(&self, id: UserId, changes: UpdateUser) -> StoreResult<User> {
        changes.validate()?;

        let mut inner = self.inner.write().await;
        let user = inner
            .users
            .get_mut(&id)
            .ok_or(StoreError::not_found("user", id))?;

        user.first_name = changes.first_name;
        user.last_name = changes.last_name;
        user.image_url = changes.image_url;
        Ok(user.clone())
    }

    async fn delete_user(&self, id: UserId) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner.users.remove(&id).is_none() {
            return Err(StoreError::not_found("user", id));
        }

        let post_ids: Vec<PostId> = inner
            .posts
            .values()
            .filter(|row| row.user_id == id)
            .map(|row| row.id)
            .collect();
        for post_id in post_ids {
            inner.unlink_post(post_id);
            inner.posts.remove(&post_id);
        }
        Ok(())
    }
}

#[async_trait]
impl PostRepository for InMemoryBlogStore {
    async fn create_post(&self, new_post: NewPost) -> StoreResult<Post> {
        new_post.validate()?;

        let mut inner = self.inner.write().await;
        if !inner.users.contains_key(&new_post.user_id) {
            return Err(StoreError::not_found("user", new_post.user_id));
        }

        inner.next_post_id += 1;
        let row = PostRow {
            id: inner.next_post_id,
            user_id: new_post.user_id,
            title: new_post.title,
            content: new_post.content,
            created_at: Utc::now(),
        };
        inner.posts.insert(row.id, row.clone());
        inner.link_existing_tags(row.id, &new_post.tag_ids);
        Ok(inner.assemble_post(&row))
    }

    async fn get_post(&self, id: PostId) -> StoreResult<Post> {
        let inner = self.inner.read().await;
        let row = inner
            .posts
            .get(&id)
            .ok_or(StoreError::not_found("post", id))?;
        Ok(inner.assemble_post(row))
    }

    async fn update_post(&self, id: PostId, changes: UpdatePost) -> StoreResult<Post> {
        changes.validate()?;

        let mut inner = self.inner.write().await;
        let row = inner
            .posts
            .get_mut(&id)
            .ok_or(StoreError::not_found("post", id))?;

        // created_at and user_id stay as written at creation time.
        row.title = changes.title;
        row.content = changes.content;
        let row = row.clone();

        inner.unlink_post(id);
        inner.link_existing_tags(id, &changes.tag_ids);
        Ok(inner.assemble_post(&row))
    }

    async fn delete_post(&self, id: PostId) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner.posts.remove(&id).is_none() {
            return Err(StoreError::not_found("post", id));
        }
        inner.unlink_post(id);
        Ok(())
    }

    async fn list_posts_for_user(&self, user_id: UserId) -> StoreResult<Vec<Post>> {
        let inner = self.inner.read().await;
        Ok(inner
            .posts
            .values()
            .filter(|row| row.user_id == user_id)
            .map(|row| inner.assemble_post(row))
            .collect())
    }

    async fn list_posts_for_tag(&self, tag_id: TagId) -> StoreResult<Vec<Post>> {
        let inner = self.inner.read().await;
        Ok(inner
            .post_tags
            .iter()
            .filter(|(_, linked)| *linked == tag_id)
            .filter_map(|(post_id, _)| inner.posts.get(post_id))
            .map(|row| inner.assemble_post(row))
            .collect())
    }

    async fn recent_posts(&self, limit: u64) -> StoreResult<Vec<Post>> {
        let inner = self.inner.read().await;
        let mut rows: Vec<&PostRow> = inner.posts.values().collect();
        rows.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(rows
            .into_iter()
            .take(limit as usize)
            .map(|row| inner.assemble_post(row))
            .collect())
    }
}

#[async_trait]
impl TagRepository for InMemoryBlogStore {
    async fn create_tag(&self, new_tag: NewTag) -> StoreResult<Tag> {
        new_tag.validate()?;

        let mut inner = self.inner.write().await;
        if inner.tag_name_taken(&new_tag.name, None) {
            return Err(StoreError::Conflict(format!(
                "tag name '{}' is already taken",
                new_tag.name
            )));
        }

        inner.next_tag_id += 1;
        let tag = Tag {
            id: inner.next_tag_id,
            name: new_tag.name,
        };
        inner.tags.insert(tag.id, tag.clone());
        Ok(tag)
    }

    async fn get_tag(&self, id: TagId) -> StoreResult<Tag> {
        let inner = self.inner.read().await;
        inner
            .tags
            .get(&id)
            .cloned()
            .ok_or(StoreError::not_found("tag", id))
    }

    async fn list_tags(&self) -> StoreResult<Vec<Tag>> {
        let inner = self.inner.read().await;
        Ok(inner.tags.values().cloned().collect())
    }

    async fn update_tag(&self, id: TagId, changes: UpdateTag) -> StoreResult<Tag> {
        changes.validate()?;

        let mut inner = self.inner.write().await;
        if !inner.tags.contains_key(&id) {
            return Err(StoreError::not_found("tag", id));
        }
        if inner.tag_name_taken(&changes.name, Some(id)) {
            return Err(StoreError::Conflict(format!(
                "tag name '{}' is already taken",
                changes.name
            )));
        }

        let tag = inner
            .tags
            .get_mut(&id)
            .ok_or(StoreError::not_found("tag", id))?;
        tag.name = changes.name;
        Ok(tag.clone())
    }

    async fn delete_tag(&self, id: TagId) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner.tags.remove(&id).is_none() {
            return Err(StoreError::not_found("tag", id));
        }
        inner.post_tags.retain(|(_, linked)| *linked != id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(first: &str, last: &str) -> NewUser {
        NewUser {
            first_name: first.to_owned(),
            last_name: last.to_owned(),
            image_url: None,
        }
    }

    async fn seed_user(store: &InMemoryBlogStore) -> User {
        store
            .create_user(new_user("Ada", "Lovelace"))
            .await
            .unwrap()
    }

    async fn seed_tag(store: &InMemoryBlogStore, name: &str) -> Tag {
        store
            .create_tag(NewTag {
                name: name.to_owned(),
            })
            .await
            .unwrap()
    }

    async fn seed_post(store: &InMemoryBlogStore, user_id: UserId, tag_ids: Vec<TagId>) -> Post {
        store
            .create_post(NewPost {
                user_id,
                title: "Hello".to_owned(),
                content: "World".to_owned(),
                tag_ids,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn blank_user_names_fail_validation() {
        let store = InMemoryBlogStore::new();

        let err = store.create_user(new_user("", "Lovelace")).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation { .. }));

        let err = store.create_user(new_user("Ada", "  ")).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation { .. }));

        assert!(store.list_users().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn created_user_is_retrievable_by_generated_id() {
        let store = InMemoryBlogStore::new();
        let user = seed_user(&store).await;

        let found = store.get_user(user.id).await.unwrap();
        assert_eq!(found, user);
        assert_eq!(found.full_name(), "Ada Lovelace");
    }

    #[tokio::test]
    async fn deleting_a_user_cascades_to_posts_and_join_rows_but_not_tags() {
        let store = InMemoryBlogStore::new();
        let user = seed_user(&store).await;
        let sql = seed_tag(&store, "sql").await;
        let rust = seed_tag(&store, "rust").await;
        let post = seed_post(&store, user.id, vec![sql.id, rust.id]).await;
        seed_post(&store, user.id, vec![rust.id]).await;

        store.delete_user(user.id).await.unwrap();

        assert!(matches!(
            store.get_post(post.id).await,
            Err(StoreError::NotFound { entity: "post", .. })
        ));
        assert!(store.list_posts_for_tag(sql.id).await.unwrap().is_empty());
        assert!(store.list_posts_for_tag(rust.id).await.unwrap().is_empty());

        // Tags survive their posts.
        assert_eq!(store.get_tag(sql.id).await.unwrap().name, "sql");
        assert_eq!(store.list_tags().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn duplicate_tag_names_conflict() {
        let store = InMemoryBlogStore::new();
        let first = seed_tag(&store, "sql").await;

        let err = store
            .create_tag(NewTag {
                name: "sql".to_owned(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        assert_eq!(store.get_tag(first.id).await.unwrap().name, "sql");
        assert_eq!(store.list_tags().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn post_tag_set_shrinks_when_a_tag_is_deleted() {
        let store = InMemoryBlogStore::new();
        let user = seed_user(&store).await;
        let t1 = seed_tag(&store, "sql").await;
        let t2 = seed_tag(&store, "rust").await;
        let post = seed_post(&store, user.id, vec![t1.id, t2.id]).await;

        let found = store.get_post(post.id).await.unwrap();
        assert_eq!(found.tag_ids(), vec![t1.id, t2.id]);

        store.delete_tag(t1.id).await.unwrap();

        let found = store.get_post(post.id).await.unwrap();
        assert_eq!(found.tag_ids(), vec![t2.id]);
        assert_eq!(found.title, "Hello");
        assert_eq!(found.content, "World");
    }

    #[tokio::test]
    async fn updating_a_post_replaces_the_tag_set() {
        let store = InMemoryBlogStore::new();
        let user = seed_user(&store).await;
        let t1 = seed_tag(&store, "sql").await;
        let t2 = seed_tag(&store, "rust").await;
        let post = seed_post(&store, user.id, vec![t1.id, t2.id]).await;

        let updated = store
            .update_post(
                post.id,
                UpdatePost {
                    title: "New".to_owned(),
                    content: "Body".to_owned(),
                    tag_ids: vec![t2.id],
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.title, "New");
        assert_eq!(updated.content, "Body");
        assert_eq!(updated.tag_ids(), vec![t2.id]);
        assert_eq!(updated.created_at, post.created_at);
    }

    #[tokio::test]
    async fn creating_a_post_for_a_missing_user_fails_and_writes_nothing() {
        let store = InMemoryBlogStore::new();

        let err = store
            .create_post(NewPost {
                user_id: 99,
                title: "Hello".to_owned(),
                content: "World".to_owned(),
                tag_ids: Vec::new(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::NotFound { entity: "user", id: 99 }));
        assert!(store.recent_posts(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_tag_ids_are_silently_skipped() {
        let store = InMemoryBlogStore::new();
        let user = seed_user(&store).await;
        let t1 = seed_tag(&store, "sql").await;

        let post = seed_post(&store, user.id, vec![t1.id, 999]).await;
        assert_eq!(post.tag_ids(), vec![t1.id]);
    }

    #[tokio::test]
    async fn updating_a_user_replaces_all_mutable_fields() {
        let store = InMemoryBlogStore::new();
        let user = store
            .create_user(NewUser {
                first_name: "Ada".to_owned(),
                last_name: "Lovelace".to_owned(),
                image_url: Some("https://example.com/ada.png".to_owned()),
            })
            .await
            .unwrap();

        let updated = store
            .update_user(
                user.id,
                UpdateUser {
                    first_name: "Grace".to_owned(),
                    last_name: "Hopper".to_owned(),
                    image_url: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.full_name(), "Grace Hopper");
        // Omitted image URL clears the stored one.
        assert_eq!(store.get_user(user.id).await.unwrap().image_url, None);
    }

    #[tokio::test]
    async fn renaming_a_tag_to_a_taken_name_conflicts() {
        let store = InMemoryBlogStore::new();
        let sql = seed_tag(&store, "sql").await;
        seed_tag(&store, "rust").await;

        let err = store
            .update_tag(
                sql.id,
                UpdateTag {
                    name: "rust".to_owned(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        // Renaming a tag to its own name is not a conflict.
        let same = store
            .update_tag(
                sql.id,
                UpdateTag {
                    name: "sql".to_owned(),
                },
            )
            .await
            .unwrap();
        assert_eq!(same.name, "sql");
    }

    #[tokio::test]
    async fn missing_ids_are_reported_as_not_found() {
        let store = InMemoryBlogStore::new();

        assert!(matches!(
            store.get_user(1).await,
            Err(StoreError::NotFound { entity: "user", id: 1 })
        ));
        assert!(matches!(
            store.delete_post(2).await,
            Err(StoreError::NotFound { entity: "post", id: 2 })
        ));
        assert!(matches!(
            store.delete_tag(3).await,
            Err(StoreError::NotFound { entity: "tag", id: 3 })
        ));
        assert!(matches!(
            store.delete_user(4).await,
            Err(StoreError::NotFound { entity: "user", id: 4 })
        ));
    }

    #[tokio::test]
    async fn recent_posts_returns_newest_first_up_to_the_limit() {
        let store = InMemoryBlogStore::new();
        let user = seed_user(&store).await;
        let first = seed_post(&store, user.id, Vec::new()).await;
        let second = seed_post(&store, user.id, Vec::new()).await;
        let third = seed_post(&store, user.id, Vec::new()).await;

        let recent = store.recent_posts(2).await.unwrap();
        let ids: Vec<PostId> = recent.iter().map(|post| post.id).collect();
        assert_eq!(ids, vec![third.id, second.id]);

        let all = store.recent_posts(10).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all.last().unwrap().id, first.id);
    }

    #[tokio::test]
    async fn posts_are_listed_per_user() {
        let store = InMemoryBlogStore::new();
        let ada = seed_user(&store).await;
        let grace = store
            .create_user(new_user("Grace", "Hopper"))
            .await
            .unwrap();
        seed_post(&store, ada.id, Vec::new()).await;
        let hers = seed_post(&store, grace.id, Vec::new()).await;

        let posts = store.list_posts_for_user(grace.id).await.unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].id, hers.id);

        // Deleting a post leaves the other user's posts alone.
        store.delete_post(hers.id).await.unwrap();
        assert_eq!(store.list_posts_for_user(ada.id).await.unwrap().len(), 1);
    }
}
