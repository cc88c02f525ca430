use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{PostId, Tag, TagId, UserId, require_non_blank};
use crate::error::StoreResult;

/// Post entity - a blog post written by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub user_id: UserId,
    pub title: String,
    pub content: String,
    /// Set when the post is created, immutable afterwards.
    pub created_at: DateTime<Utc>,
    /// Tag set of this post, ordered by tag id.
    pub tags: Vec<Tag>,
}

impl Post {
    /// Human-readable creation date, e.g. "Aug 6 2026, 1:05 PM".
    pub fn friendly_date(&self) -> String {
        self.created_at.format("%b %-d %Y, %-I:%M %p").to_string()
    }

    /// Ids of the attached tags, in tag-id order.
    pub fn tag_ids(&self) -> Vec<TagId> {
        self.tags.iter().map(|tag| tag.id).collect()
    }
}

/// Input for creating a post.
///
/// `tag_ids` referencing tags that do not exist are ignored rather than
/// rejected; only the existing ones end up attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPost {
    pub user_id: UserId,
    pub title: String,
    pub content: String,
    pub tag_ids: Vec<TagId>,
}

impl NewPost {
    pub fn validate(&self) -> StoreResult<()> {
        require_non_blank("title", &self.title)?;
        require_non_blank("content", &self.content)
    }
}

/// Replacement values for a post's mutable fields. The tag set is replaced
/// wholesale, not merged with the existing one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatePost {
    pub title: String,
    pub content: String,
    pub tag_ids: Vec<TagId>,
}

impl UpdatePost {
    pub fn validate(&self) -> StoreResult<()> {
        require_non_blank("title", &self.title)?;
        require_non_blank("content", &self.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn friendly_date_is_human_readable() {
        let post = Post {
            id: 1,
            user_id: 1,
            title: "Hello".to_owned(),
            content: "World".to_owned(),
            created_at: Utc.with_ymd_and_hms(2026, 8, 6, 13, 5, 0).unwrap(),
            tags: Vec::new(),
        };
        assert_eq!(post.friendly_date(), "Aug 6 2026, 1:05 PM");
    }

    #[test]
    fn blank_title_or_content_is_rejected() {
        let new_post = NewPost {
            user_id: 1,
            title: String::new(),
            content: "body".to_owned(),
            tag_ids: Vec::new(),
        };
        assert!(new_post.validate().is_err());

        let update = UpdatePost {
            title: "title".to_owned(),
            content: "  \n".to_owned(),
            tag_ids: Vec::new(),
        };
        assert!(update.validate().is_err());
    }
}
