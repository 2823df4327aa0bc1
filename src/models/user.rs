use garde::Validate;
use serde::{Deserialize, Serialize};

/// Represents a user in the system.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// The unique identifier for the user.
    pub id: i32,
    /// The user's display name.
    pub name: String,
}

/// The fields a client may set, from either an HTML form or a JSON body.
///
/// An `id` in the body is accepted and ignored; the path wins.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct UserForm {
    #[garde(skip)]
    #[serde(default)]
    pub id: Option<i32>,
    #[garde(length(min = 1, max = 255))]
    pub name: String,
}

impl UserForm {
    /// The validated, trimmed name.
    pub fn into_name(mut self) -> Result<String, garde::Report> {
        self.name = self.name.trim().to_string();
        self.validate()?;
        Ok(self.name)
    }
}
