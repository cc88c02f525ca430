//! Post entity for SeaORM.

use sea_orm::entity::prelude::*;

use blogly_core::domain::Post;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "posts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(column_type = "Text")]
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub content: String,
    pub created_at: DateTimeWithTimeZone,
    pub user_id: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

/// Posts reach their tags through the `posts_tags` join table.
impl Related<super::tag::Entity> for Entity {
    fn to() -> RelationDef {
        super::post_tag::Relation::Tag.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::post_tag::Relation::Post.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Combine the row with its tag rows into a domain post. The tag set is
    /// ordered by tag id regardless of how the rows came back.
    pub fn into_post(self, tags: Vec<super::tag::Model>) -> Post {
        let mut tags: Vec<blogly_core::domain::Tag> = tags.into_iter().map(Into::into).collect();
        tags.sort_by_key(|tag| tag.id);

        Post {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            content: self.content,
            created_at: self.created_at.into(),
            tags,
        }
    }
}
