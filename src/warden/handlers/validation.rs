//! Field checks for request forms. Errors are keyed by the JSON field name.

use regex::Regex;
use std::{collections::BTreeMap, sync::LazyLock};

pub type FieldErrors = BTreeMap<&'static str, String>;

pub trait Validate {
    /// # Errors
    /// Returns every failing field with a human readable message.
    fn validate(&self) -> Result<(), FieldErrors>;
}

const USERNAME_LEN: (usize, usize) = (4, 16);
const PASSWORD_LEN: (usize, usize) = (8, 256);

static EMAIL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok());

#[must_use]
pub fn valid_email(email: &str) -> bool {
    EMAIL.as_ref().is_some_and(|re| re.is_match(email))
}

/// Collects errors for one form, keeping the first error per field.
#[derive(Default)]
pub(crate) struct Checker {
    errors: FieldErrors,
}

impl Checker {
    pub(crate) fn required(&mut self, field: &'static str, value: &str) -> bool {
        if value.is_empty() {
            self.fail(field, "is required");
            return false;
        }
        true
    }

    pub(crate) fn username(&mut self, field: &'static str, value: &str, check_length: bool) {
        if !self.required(field, value) {
            return;
        }
        if check_length && !within(value, USERNAME_LEN) {
            self.fail(field, "must be between 4 and 16 characters");
        } else if !value.chars().all(|c| c.is_ascii_alphanumeric()) {
            self.fail(field, "must be alphanumeric");
        }
    }

    pub(crate) fn email(&mut self, field: &'static str, value: &str) {
        if self.required(field, value) && !valid_email(value) {
            self.fail(field, "must be a valid email address");
        }
    }

    pub(crate) fn password(&mut self, field: &'static str, value: &str) {
        if self.required(field, value) && !within(value, PASSWORD_LEN) {
            self.fail(field, "must be between 8 and 256 characters");
        }
    }

    /// Both password fields are well formed and equal.
    pub(crate) fn password_pair(&mut self, password: &str, password_again: &str) {
        self.password("password", password);
        self.password("passwordAgain", password_again);
        if !self.errors.contains_key("passwordAgain") && password != password_again {
            self.fail("passwordAgain", "passwords do not match");
        }
    }

    pub(crate) fn finish(self) -> Result<(), FieldErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }

    fn fail(&mut self, field: &'static str, message: &str) {
        self.errors
            .entry(field)
            .or_insert_with(|| message.to_string());
    }
}

fn within(value: &str, (min, max): (usize, usize)) -> bool {
    (min..=max).contains(&value.chars().count())
}
