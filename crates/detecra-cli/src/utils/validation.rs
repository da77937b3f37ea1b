use inquire::validator::{ErrorMessage, Validation};
use lazy_static::lazy_static;
use regex::Regex;

type Error = Box<dyn std::error::Error + Send + Sync + 'static>;

const MIN_FULL_NAME_LEN: usize = 2;
const MIN_PASSWORD_LEN: usize = 6;

lazy_static! {
    static ref EMAIL_PATTERN: Regex =
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("EMAIL_PATTERN should be compiled successfully");
}

/// Accepts `local@domain.tld`: no whitespace, a single `@`, and a dot inside the domain.
pub fn is_valid_email(value: &str) -> bool {
    EMAIL_PATTERN.is_match(value)
}

pub fn validate_email(value: &str) -> Result<Validation, Error> {
    if value.trim().is_empty() {
        Ok(Validation::Invalid("Email is required".into()))
    } else if !is_valid_email(value.trim()) {
        Ok(Validation::Invalid("Please enter a valid email address".into()))
    } else {
        Ok(Validation::Valid)
    }
}

pub fn validate_full_name(value: &str) -> Result<Validation, Error> {
    let value = value.trim();
    if value.is_empty() {
        Ok(Validation::Invalid("Full name is required".into()))
    } else if value.chars().count() < MIN_FULL_NAME_LEN {
        Ok(Validation::Invalid("Full name must be at least 2 characters long".into()))
    } else {
        Ok(Validation::Valid)
    }
}

pub fn validate_new_password(value: &str) -> Result<Validation, Error> {
    if value.is_empty() {
        Ok(Validation::Invalid("Password is required".into()))
    } else if value.chars().count() < MIN_PASSWORD_LEN {
        Ok(Validation::Invalid("Password must be at least 6 characters long".into()))
    } else {
        Ok(Validation::Valid)
    }
}

pub fn validate_password(value: &str) -> Result<Validation, Error> {
    if value.is_empty() {
        Ok(Validation::Invalid("Password is required".into()))
    } else {
        Ok(Validation::Valid)
    }
}

/// Runs `validator` over a value given as a flag instead of a prompt.
pub fn ensure_valid(
    value: &str,
    validator: impl Fn(&str) -> Result<Validation, Error>,
) -> anyhow::Result<()> {
    match validator(value).map_err(|e| anyhow::anyhow!("{e}"))? {
        Validation::Valid => Ok(()),
        Validation::Invalid(ErrorMessage::Custom(message)) => Err(anyhow::anyhow!(message)),
        Validation::Invalid(ErrorMessage::Default) => Err(anyhow::anyhow!("Invalid value")),
    }
}

#[cfg(test)]
mod test {
    use inquire::validator::Validation;

    use super::{
        ensure_valid, is_valid_email, validate_email, validate_full_name, validate_new_password, validate_password,
    };

    #[test]
    fn when_email_has_local_part_and_dotted_domain_then_it_is_valid() {
        assert!(is_valid_email("ada@detecra.ai"));
        assert!(is_valid_email("ada.lovelace+test@mail.example.com"));
    }

    #[test]
    fn when_domain_has_a_dot_followed_by_text_then_trailing_dots_are_accepted() {
        assert!(is_valid_email("a@x.y."));
        assert!(is_valid_email("a@b.c.."));
    }

    #[test]
    fn when_email_is_malformed_then_it_is_rejected() {
        for email in ["ada", "ada@", "@detecra.ai", "ada@detecra", "ada@detecra.", "a da@detecra.ai", "a@b@c.d"] {
            assert!(!is_valid_email(email), "{email} should be rejected");
        }
    }

    #[test]
    fn when_email_is_blank_then_required_message_is_shown() {
        assert_eq!(validate_email("  ").unwrap(), Validation::Invalid("Email is required".into()));
        assert_eq!(validate_email("nope").unwrap(), Validation::Invalid("Please enter a valid email address".into()));
    }

    #[test]
    fn when_full_name_is_shorter_than_two_characters_then_it_is_rejected() {
        assert!(matches!(validate_full_name("A").unwrap(), Validation::Invalid(_)));
        assert!(matches!(validate_full_name(" ").unwrap(), Validation::Invalid(_)));
        assert_eq!(validate_full_name("Al").unwrap(), Validation::Valid);
    }

    #[test]
    fn when_new_password_is_shorter_than_six_characters_then_it_is_rejected() {
        assert!(matches!(validate_new_password("12345").unwrap(), Validation::Invalid(_)));
        assert_eq!(validate_new_password("123456").unwrap(), Validation::Valid);
    }

    #[test]
    fn when_sign_in_password_is_short_then_it_is_still_accepted() {
        assert_eq!(validate_password("1").unwrap(), Validation::Valid);
        assert!(matches!(validate_password("").unwrap(), Validation::Invalid(_)));
    }

    #[test]
    fn when_flag_value_is_invalid_then_validation_message_becomes_the_error() {
        let err = ensure_valid("x", validate_full_name).unwrap_err();

        assert_eq!(err.to_string(), "Full name must be at least 2 characters long");
        assert!(ensure_valid("ada@detecra.ai", validate_email).is_ok());
    }
}
