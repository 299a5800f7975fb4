//! Request and response bodies.

use serde::{Deserialize, Serialize};

use super::validation::{Checker, FieldErrors, Validate};
use crate::{
    auth::{Loginable, NewPassword, ResetRequestable, Resettable},
    store::User,
};

#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize)]
pub struct NewUserForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, rename = "passwordAgain")]
    pub password_again: String,
}

#[derive(Deserialize, Debug)]
pub struct ResetRequestForm {
    #[serde(default)]
    pub email: String,
}

#[derive(Deserialize)]
pub struct ResetPasswordForm {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, rename = "passwordAgain")]
    pub password_again: String,
}

#[derive(Deserialize)]
pub struct ChangePasswordForm {
    #[serde(default)]
    pub password: String,
    #[serde(default, rename = "passwordAgain")]
    pub password_again: String,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct UserOut {
    pub id: u64,
    pub username: String,
    pub email: String,
}

impl From<&User> for UserOut {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
        }
    }
}

impl Validate for LoginForm {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut checker = Checker::default();
        checker.username("username", &self.username, false);
        checker.password("password", &self.password);
        checker.finish()
    }
}

impl Validate for NewUserForm {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut checker = Checker::default();
        checker.username("username", &self.username, true);
        checker.email("email", &self.email);
        checker.password_pair(&self.password, &self.password_again);
        checker.finish()
    }
}

impl Validate for ResetRequestForm {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut checker = Checker::default();
        checker.email("email", &self.email);
        checker.finish()
    }
}

impl Validate for ResetPasswordForm {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut checker = Checker::default();
        checker.required("token", &self.token);
        checker.password_pair(&self.password, &self.password_again);
        checker.finish()
    }
}

impl Validate for ChangePasswordForm {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut checker = Checker::default();
        checker.password_pair(&self.password, &self.password_again);
        checker.finish()
    }
}

impl Loginable for LoginForm {
    fn username(&self) -> &str {
        &self.username
    }

    fn password(&self) -> &str {
        &self.password
    }
}

impl ResetRequestable for ResetRequestForm {
    fn email(&self) -> &str {
        &self.email
    }
}

impl NewPassword for ResetPasswordForm {
    fn password(&self) -> &str {
        &self.password
    }

    fn password_again(&self) -> &str {
        &self.password_again
    }
}

impl Resettable for ResetPasswordForm {
    fn token(&self) -> &str {
        &self.token
    }
}

impl NewPassword for ChangePasswordForm {
    fn password(&self) -> &str {
        &self.password
    }

    fn password_again(&self) -> &str {
        &self.password_again
    }
}
