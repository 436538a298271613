use regex::Regex;
use std::sync::LazyLock;
use validator::ValidationError;

pub static RATING_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(g|pg|r|x)$").unwrap());

pub fn validate_rating(rating: &str) -> Result<(), ValidationError> {
    if !RATING_REGEX.is_match(rating) {
        return Err(ValidationError::new("rating"));
    }

    Ok(())
}
