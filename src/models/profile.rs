use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProfileRole {
    Student,
    Admin,
}

/// Local mirror of a hosted-auth user. `id` is the token's `sub`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub role: ProfileRole,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Profile {
    pub fn is_admin(&self) -> bool {
        self.role == ProfileRole::Admin
    }
}
