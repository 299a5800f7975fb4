//! Capabilities the auth manager needs from request forms.

pub trait Loginable {
    fn username(&self) -> &str;
    fn password(&self) -> &str;
}

pub trait ResetRequestable {
    fn email(&self) -> &str;
}

pub trait NewPassword {
    fn password(&self) -> &str;
    fn password_again(&self) -> &str;

    /// Both fields must be identical.
    fn passwords_match(&self) -> bool {
        self.password() == self.password_again()
    }
}

pub trait Resettable: NewPassword {
    fn token(&self) -> &str;
}
