use serde::{Deserialize, Serialize};

use crate::domain::{UserId, require_non_blank};
use crate::error::StoreResult;

/// User entity - an author of posts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    /// Absent when the user never supplied one; never an empty string.
    pub image_url: Option<String>,
}

impl User {
    /// First and last name joined for display.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Input for creating a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub image_url: Option<String>,
}

impl NewUser {
    pub fn validate(&self) -> StoreResult<()> {
        require_non_blank("first_name", &self.first_name)?;
        require_non_blank("last_name", &self.last_name)
    }
}

/// Replacement values for a user's mutable fields.
///
/// Updates are full replacements: `image_url: None` clears a stored URL
/// rather than leaving the old value in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateUser {
    pub first_name: String,
    pub last_name: String,
    pub image_url: Option<String>,
}

impl UpdateUser {
    pub fn validate(&self) -> StoreResult<()> {
        require_non_blank("first_name", &self.first_name)?;
        require_non_blank("last_name", &self.last_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;

    #[test]
    fn full_name_joins_first_and_last() {
        let user = User {
            id: 1,
            first_name: "Ada".to_owned(),
            last_name: "Lovelace".to_owned(),
            image_url: None,
        };
        assert_eq!(user.full_name(), "Ada Lovelace");
    }

    #[test]
    fn blank_names_are_rejected() {
        let new_user = NewUser {
            first_name: "   ".to_owned(),
            last_name: "Lovelace".to_owned(),
            image_url: None,
        };
        assert!(matches!(
            new_user.validate(),
            Err(StoreError::Validation {
                field: "first_name"
            })
        ));

        let new_user = NewUser {
            first_name: "Ada".to_owned(),
            last_name: String::new(),
            image_url: None,
        };
        assert!(matches!(
            new_user.validate(),
            Err(StoreError::Validation { field: "last_name" })
        ));
    }

    #[test]
    fn absent_image_url_serializes_as_null() {
        let user = User {
            id: 7,
            first_name: "Ada".to_owned(),
            last_name: "Lovelace".to_owned(),
            image_url: None,
        };
        let value = serde_json::to_value(&user).unwrap();
        assert!(value["image_url"].is_null());
    }
}
