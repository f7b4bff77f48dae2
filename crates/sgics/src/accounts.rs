//! Back-office user accounts. Authentication is handled outside this service.

use std::sync::Arc;

use axum::Router;
use serde::{Deserialize, Serialize};

use crate::people::Person;
use crate::records::{
    crud_router, ensure_exists, require_text, CrudResource, Record, RecordId, Repository,
    ValidationError,
};

const USERNAME_MAX_LEN: usize = 150;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Administrator,
    Coordinator,
    Instructor,
    Participant,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Role::Administrator => "Administrador",
            Role::Coordinator => "Coordinador",
            Role::Instructor => "Formador",
            Role::Participant => "Participante",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: RecordId,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub full_name: String,
    pub role: Role,
    #[serde(default)]
    pub person_id: Option<RecordId>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Record for User {
    const RESOURCE: &'static str = "user";

    fn id(&self) -> RecordId {
        self.id
    }

    fn set_id(&mut self, id: RecordId) {
        self.id = id;
    }

    fn unique_key(&self) -> Option<String> {
        Some(self.username.clone())
    }

    fn validate(&self) -> Result<(), ValidationError> {
        validate_username(&self.username)?;
        validate_email("email", &self.email)
    }
}

fn validate_username(username: &str) -> Result<(), ValidationError> {
    let length = username.chars().count();
    if !(3..=USERNAME_MAX_LEN).contains(&length) {
        return Err(ValidationError::new(
            "username",
            format!("must have between 3 and {USERNAME_MAX_LEN} characters"),
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
    {
        return Err(ValidationError::new(
            "username",
            "may only contain letters, digits and @/./+/-/_",
        ));
    }
    Ok(())
}

/// Loose `local@domain.tld` shape check shared with people records.
pub(crate) fn validate_email(field: &'static str, email: &str) -> Result<(), ValidationError> {
    require_text(field, email)?;
    let invalid = || ValidationError::new(field, "must be a valid e-mail address");
    let (local, domain) = email.trim().split_once('@').ok_or_else(invalid)?;
    if local.is_empty()
        || domain.contains('@')
        || domain.starts_with('.')
        || domain.ends_with('.')
        || !domain.contains('.')
        || email.chars().any(char::is_whitespace)
    {
        return Err(invalid());
    }
    Ok(())
}

pub fn accounts_router(
    users: Arc<dyn Repository<User>>,
    people: Arc<dyn Repository<Person>>,
) -> Router {
    let resource = CrudResource::new(users).with_cross_check(move |user: &User| {
        ensure_exists(people.as_ref(), "person_id", user.person_id)
    });
    crud_router("/api/v1/users", resource)
}
