use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::schema::*;

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub display_name: Option<String>,
    pub password_hash: String,
    pub role: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl User {
    /// Name shown next to a case in the list view.
    pub fn display(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.username)
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub username: String,
    pub display_name: Option<String>,
    pub password_hash: String,
    pub role: String,
}

/// A case (matter) owned by a user. `input_dir` and `index_dir` start out
/// empty and are assigned exactly once after the row exists, since both
/// paths embed the generated id.
#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = cases)]
#[diesel(belongs_to(User))]
pub struct Case {
    pub id: i32,
    pub user_id: i32,
    pub customer_id: Option<i32>,
    pub name: String,
    pub status: String,
    pub input_dir: String,
    pub index_dir: String,
    pub rag_version: Option<String>,
    pub doc_count: i32,
    pub notes: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = cases)]
pub struct NewCase {
    pub user_id: i32,
    pub customer_id: Option<i32>,
    pub name: String,
    pub status: String,
    pub input_dir: String,
    pub index_dir: String,
    pub rag_version: Option<String>,
    pub notes: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = documents)]
#[diesel(belongs_to(Case))]
pub struct Document {
    pub id: i32,
    pub case_id: i32,
    pub user_id: Option<i32>,
    pub filename: String,
    pub stored_path: String,
    pub mime_type: Option<String>,
    pub size_bytes: Option<i64>,
    pub pages: Option<i32>,
    pub status: String,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = documents)]
pub struct NewDocument {
    pub case_id: i32,
    pub user_id: Option<i32>,
    pub filename: String,
    pub stored_path: String,
    pub mime_type: Option<String>,
    pub size_bytes: Option<i64>,
    pub pages: Option<i32>,
    pub status: String,
    pub notes: Option<String>,
}
