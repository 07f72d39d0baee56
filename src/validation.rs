const MAX_USERNAME_LEN: usize = 64;
const MAX_GROUP_NAME_LEN: usize = 128;
const MAX_APPLICATION_NAME_LEN: usize = 128;

fn is_valid_username_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.'
}

fn validate_display_name(name: &str, entity: &str, max_len: usize) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err(format!("{entity} name cannot be empty"));
    }
    if name.chars().count() > max_len {
        return Err(format!("{entity} name cannot exceed {max_len} characters"));
    }
    if name.chars().any(char::is_control) {
        return Err(format!("{entity} name cannot contain control characters"));
    }
    Ok(())
}

pub fn validate_username(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("Username cannot be empty".to_string());
    }
    if name.len() > MAX_USERNAME_LEN {
        return Err(format!(
            "Username cannot exceed {MAX_USERNAME_LEN} characters"
        ));
    }
    if !name.chars().all(is_valid_username_char) {
        return Err(
            "Username can only contain alphanumeric characters, hyphens, underscores, and periods"
                .to_string(),
        );
    }
    if name.starts_with('-') || name.starts_with('.') {
        return Err("Username cannot start with a hyphen or period".to_string());
    }
    Ok(())
}

pub fn validate_group_name(name: &str) -> Result<(), String> {
    validate_display_name(name, "Group", MAX_GROUP_NAME_LEN)
}

pub fn validate_application_name(name: &str) -> Result<(), String> {
    validate_display_name(name, "Application", MAX_APPLICATION_NAME_LEN)
}

/// Lowercases and trims an email address. Rejects anything without a
/// local part and a domain.
pub fn normalize_email(email: &str) -> Result<String, String> {
    let normalized = email.trim().to_lowercase();
    match normalized.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => {
            Ok(normalized)
        }
        _ => Err(format!("Invalid email address: {email}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_rules() {
        assert!(validate_username("alice.b-c_d").is_ok());
        assert!(validate_username("").is_err());
        assert!(validate_username("-alice").is_err());
        assert!(validate_username("al ice").is_err());
    }

    #[test]
    fn test_group_name_allows_spaces() {
        assert!(validate_group_name("Platform Team").is_ok());
        assert!(validate_group_name("   ").is_err());
        assert!(validate_group_name("bad\nname").is_err());
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(
            normalize_email("  Alice@Example.COM ").unwrap(),
            "alice@example.com"
        );
        assert!(normalize_email("alice").is_err());
        assert!(normalize_email("@example.com").is_err());
        assert!(normalize_email("a@b@c").is_err());
    }
}
