//! Password policy.

/// Minimum password length in characters
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum password length in characters
pub const MAX_PASSWORD_LENGTH: usize = 32;

/// Whether `password` satisfies the account password policy
///
/// Between 8 and 32 characters with at least one uppercase letter, one lowercase
/// letter, one digit and one punctuation or symbol character. Whitespace, `#` and
/// `|` are not allowed.
pub fn is_valid_password(password: &str) -> bool {
    let length = password.chars().count();
    if !(MIN_PASSWORD_LENGTH..=MAX_PASSWORD_LENGTH).contains(&length) {
        return false;
    }

    let mut has_upper = false;
    let mut has_lower = false;
    let mut has_digit = false;
    let mut has_symbol = false;

    for c in password.chars() {
        if c.is_whitespace() || c == '#' || c == '|' {
            return false;
        }

        if c.is_uppercase() {
            has_upper = true;
        } else if c.is_lowercase() {
            has_lower = true;
        } else if c.is_numeric() {
            has_digit = true;
        } else if c.is_ascii_punctuation() || !c.is_alphanumeric() {
            has_symbol = true;
        }
    }

    has_upper && has_lower && has_digit && has_symbol
}
