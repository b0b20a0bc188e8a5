use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Named roles a user can hold. A user may hold several.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, sqlx::Type, ToSchema)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    Supervisor,
    Karyawan,
    #[serde(rename = "PIC")]
    Pic,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Admin,
        Role::Manager,
        Role::Supervisor,
        Role::Karyawan,
        Role::Pic,
    ];
}

#[derive(Serialize, Deserialize, Debug, Clone, FromRow, ToSchema)]
pub struct User {
    pub id: i32,
    pub name: String,
    pub username: String,
    pub email: Option<String>,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// User together with the roles assigned to them.
#[derive(Serialize, Debug, ToSchema)]
pub struct UserWithRoles {
    #[serde(flatten)]
    pub user: User,
    pub roles: Vec<Role>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct NewUser {
    pub name: String,
    pub username: String,
    pub email: Option<String>,
    pub password: String,
    pub roles: Vec<Role>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateUser {
    pub name: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>, // Raw password, will be hashed
}

impl UpdateUser {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.username.is_none()
            && self.email.is_none()
            && self.password.is_none()
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateRoles {
    pub roles: Vec<Role>,
}

/// Minimal projection for pickers (e.g. choosing a PIC).
#[derive(Serialize, Debug, FromRow, ToSchema)]
pub struct UserOption {
    pub id: i32,
    pub name: String,
}

#[derive(Deserialize, Serialize, ToSchema)]
pub struct UserInfo {
    pub id: i32,
    pub username: String,
    pub roles: Vec<Role>,
}

#[derive(Debug, Clone, FromRow)]
pub struct UserRoleRow {
    pub user_id: i32,
    pub role: Role,
}
