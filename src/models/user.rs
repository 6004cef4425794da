use diesel::prelude::*;
use serde::{Deserialize, Serialize};

pub const DEFAULT_AVATAR: &str = "/uploads/avatars/mugshot.png";

#[derive(Debug, Clone, Queryable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::users)]
pub struct User {
    pub id: String,
    pub name: Option<String>,
    pub email: String,
    pub avatar_url: Option<String>,
    pub created_at: i64,
}

impl User {
    pub fn avatar(&self) -> &str {
        self.avatar_url.as_deref().unwrap_or(DEFAULT_AVATAR)
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::users)]
pub struct NewUser<'a> {
    pub id: &'a str,
    pub name: Option<&'a str>,
    pub email: &'a str,
    pub avatar_url: Option<&'a str>,
    pub created_at: i64,
}
