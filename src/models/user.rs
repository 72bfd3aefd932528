//! Users, roles and authentication claims
//!
//! Credentials live with the external identity provider; this crate only
//! knows user ids, display data and roles.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::error::AppError;

/// Library roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Librarian,
    Student,
    Professor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Librarian => "librarian",
            Role::Student => "student",
            Role::Professor => "professor",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "librarian" | "bibliotecario" => Ok(Role::Librarian),
            "student" | "estudiante" => Ok(Role::Student),
            "professor" | "profesor" => Ok(Role::Professor),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// Internal row structure for database queries (roles stored as text[])
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    id: i32,
    name: String,
    email: Option<String>,
    roles: Vec<String>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            name: row.name,
            email: row.email,
            roles: row.roles.iter().filter_map(|r| r.parse().ok()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: i32,
    pub name: String,
    pub email: Option<String>,
    pub roles: Vec<Role>,
}

impl User {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Apply the fields present in `update`
    pub fn apply(&mut self, update: UpdateUser) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if update.email.is_some() {
            self.email = update.email;
        }
        if let Some(roles) = update.roles {
            self.roles = roles;
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: Option<String>,
    pub roles: Vec<Role>,
}

/// Update user request; `roles` replaces the whole role set
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateUser {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub roles: Option<Vec<Role>>,
}

/// User search parameters
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct UserQuery {
    /// User id, or a case-insensitive substring of the name or email
    pub search: Option<String>,
}

/// JWT claims issued by the identity provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: String,
    pub user_id: i32,
    pub roles: Vec<Role>,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    pub fn is_librarian(&self) -> bool {
        self.roles.contains(&Role::Librarian)
    }

    pub fn require_librarian(&self) -> Result<(), AppError> {
        if self.is_librarian() {
            Ok(())
        } else {
            Err(AppError::Authorization("Librarian role required".to_string()))
        }
    }

    /// Patrons act for themselves; librarians for anyone
    pub fn require_self_or_librarian(&self, user_id: i32) -> Result<(), AppError> {
        if self.user_id == user_id || self.is_librarian() {
            Ok(())
        } else {
            Err(AppError::Authorization(format!(
                "Not allowed to act on behalf of user {}",
                user_id
            )))
        }
    }

    /// User an action applies to: the requested one, or the caller by default
    pub fn acting_for(&self, requested: Option<i32>) -> Result<i32, AppError> {
        let user_id = requested.unwrap_or(self.user_id);
        self.require_self_or_librarian(user_id)?;
        Ok(user_id)
    }

    /// User filter for listings: librarians see everyone unless they narrow
    /// the query, patrons only ever see their own rows
    pub fn list_scope(&self, requested: Option<i32>) -> Result<Option<i32>, AppError> {
        if self.is_librarian() {
            Ok(requested)
        } else {
            self.acting_for(requested).map(Some)
        }
    }
}
