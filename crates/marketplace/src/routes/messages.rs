//! Text for the `?error=` and `?success=` codes the form handlers redirect with.

/// Describe an error code for display. Unknown codes get a generic message
/// so a hand-edited query string cannot inject text into the page.
#[must_use]
pub fn error_message(code: &str) -> String {
    if let Some(field) = code.strip_prefix("missing_") {
        return format!("{} is required.", capitalize(&field.replace('_', " ")));
    }

    match code {
        "credentials" => "Incorrect email or password.",
        "unconfirmed" => "Please confirm your email address before signing in.",
        "invalid_email" => "Please enter a valid email address.",
        "email_taken" => "An account with this email already exists.",
        "weak_password" => "Please choose a stronger password.",
        "signup_rejected" => "Registration was not accepted. Please check your details.",
        "profile_failed" => {
            "Your account was created but your profile could not be saved. Please contact support."
        }
        "invalid_price" => "Please enter a price of zero or more.",
        "unsupported_image" => "Please upload a JPEG, PNG or other image file.",
        "invalid_upload" => "The upload could not be read.",
        "not_allowed" => "You are not allowed to do that.",
        "unknown_advertisement" => "That advertisement could not be found.",
        "session" => "Your session could not be saved. Please try again.",
        "unavailable" => "The service is temporarily unavailable. Please try again.",
        _ => "Something went wrong. Please try again.",
    }
    .to_owned()
}

/// Describe a success code for display, or `None` for unknown codes.
#[must_use]
pub fn success_message(code: &str) -> Option<&'static str> {
    match code {
        "registered" => Some("Account created. Please sign in."),
        "signed_out" => Some("You have been signed out."),
        "created" => Some("Advertisement published."),
        "uploaded" => Some("Image added."),
        _ => None,
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}
