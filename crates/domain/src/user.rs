use crate::value_objects::{PhotoLocator, Timestamp, UserId, Username};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub name: Username,
    pub photo: Option<PhotoLocator>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl User {
    /// 首次登录时注册用户
    pub fn register(id: UserId, name: Username, now: Timestamp) -> Self {
        Self {
            id,
            name,
            photo: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn rename(&mut self, name: Username, now: Timestamp) {
        self.name = name;
        self.updated_at = now;
    }

    pub fn set_photo(&mut self, photo: PhotoLocator, now: Timestamp) {
        self.photo = Some(photo);
        self.updated_at = now;
    }
}
