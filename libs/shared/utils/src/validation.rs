// Input checks shared by the form-backed endpoints. Everything here runs before
// any store call.

use std::sync::LazyLock;

use regex::Regex;

pub const USERNAME_MIN_LENGTH: usize = 3;
pub const USERNAME_MAX_LENGTH: usize = 30;
pub const PHONE_MIN_LENGTH: usize = 10;
pub const PHONE_MAX_LENGTH: usize = 20;
pub const PASSWORD_MIN_LENGTH: usize = 6;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("email pattern")
});

static USERNAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9][a-z0-9-]*[a-z0-9]$").expect("username pattern")
});

static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\+?[0-9() \-]+$").expect("phone pattern")
});

pub fn is_valid_email(email: &str) -> bool {
    email.len() <= 254 && EMAIL_RE.is_match(email)
}

pub fn validate_username(username: &str) -> Result<(), String> {
    let length = username.chars().count();
    if !(USERNAME_MIN_LENGTH..=USERNAME_MAX_LENGTH).contains(&length) {
        return Err(format!(
            "Username must be between {} and {} characters",
            USERNAME_MIN_LENGTH, USERNAME_MAX_LENGTH
        ));
    }
    if !USERNAME_RE.is_match(username) {
        return Err("Username may only contain lowercase letters, numbers and hyphens, and must start and end with a letter or number".to_string());
    }
    Ok(())
}

pub fn validate_phone(phone: &str) -> Result<(), String> {
    let phone = phone.trim();
    if phone.chars().count() < PHONE_MIN_LENGTH {
        return Err(format!("Phone number must be at least {} characters", PHONE_MIN_LENGTH));
    }
    if phone.chars().count() > PHONE_MAX_LENGTH || !PHONE_RE.is_match(phone) {
        return Err("Please enter a valid phone number".to_string());
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), String> {
    if password.chars().count() < PASSWORD_MIN_LENGTH {
        return Err(format!("Password must be at least {} characters", PASSWORD_MIN_LENGTH));
    }
    Ok(())
}

/// Reduce arbitrary text (an email local part, a display name) to the
/// username alphabet. May return an empty string.
pub fn slugify(seed: &str) -> String {
    let mut slug = String::with_capacity(seed.len());
    for ch in seed.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch);
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}

/// Trimmed optional text, with blank input treated as absent.
pub fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
