//! Email bodies for the auth flows.
//!
//! Links embed the frontend base URL from configuration; the token is the
//! only dynamic part of the path.

/// Email-verification message: (subject, body).
#[must_use]
pub fn verification_email(frontend_base_url: &str, name: &str, token: &str) -> (String, String) {
    let link = format!("{frontend_base_url}/verify-email?token={token}");
    (
        "Verify your Shelfmark email".to_string(),
        format!(
            "Hi {name},\n\n\
             Welcome to Shelfmark! Please confirm your email address by opening:\n\n\
             {link}\n\n\
             The link is valid for 24 hours. If you did not create this account,\n\
             you can ignore this message.\n"
        ),
    )
}

/// Password-reset message: (subject, body).
#[must_use]
pub fn password_reset_email(frontend_base_url: &str, name: &str, token: &str) -> (String, String) {
    let link = format!("{frontend_base_url}/reset-password?token={token}");
    (
        "Reset your Shelfmark password".to_string(),
        format!(
            "Hi {name},\n\n\
             A password reset was requested for your account. Open this link to\n\
             choose a new password:\n\n\
             {link}\n\n\
             The link is valid for 1 hour. If you did not request a reset, your\n\
             password is unchanged and no action is needed.\n"
        ),
    )
}

/// Post-verification welcome message: (subject, body).
#[must_use]
pub fn welcome_email(frontend_base_url: &str, name: &str) -> (String, String) {
    (
        "Welcome to Shelfmark".to_string(),
        format!(
            "Hi {name},\n\n\
             Your email is verified and your catalog is ready:\n\n\
             {frontend_base_url}\n\n\
             Happy shelving!\n"
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verification_link_embeds_token() {
        let (subject, body) = verification_email("https://app.example.com", "Reader", "tok123");
        assert!(subject.contains("Verify"));
        assert!(body.contains("https://app.example.com/verify-email?token=tok123"));
    }

    #[test]
    fn test_reset_link_embeds_token() {
        let (_, body) = password_reset_email("https://app.example.com", "Reader", "tok456");
        assert!(body.contains("https://app.example.com/reset-password?token=tok456"));
    }

    #[test]
    fn test_welcome_addresses_user() {
        let (_, body) = welcome_email("https://app.example.com", "Reader");
        assert!(body.contains("Hi Reader"));
    }
}
