use crate::model::{Movie, Record};
use serde::{Deserialize, Serialize};
use std::num::IntErrorKind;

pub const MAX_USER_NAME_LEN: usize = 30;
pub const MAX_MOVIE_FIELD_LEN: usize = 60;
pub const MIN_YEAR: i32 = 1900;
pub const MAX_YEAR: i32 = 2025;
pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 10;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("User name is required.")]
    MissingUserName,
    #[error("User name must be {} characters or less.", MAX_USER_NAME_LEN)]
    UserNameTooLong,
    #[error("A user with this name already exists.")]
    DuplicateUser,
    #[error("Movie name is required.")]
    MissingMovieName,
    #[error("Movie name must be {} characters or less.", MAX_MOVIE_FIELD_LEN)]
    MovieNameTooLong,
    #[error("Director name is required.")]
    MissingDirector,
    #[error("Director name must be {} characters or less.", MAX_MOVIE_FIELD_LEN)]
    DirectorTooLong,
    #[error("Please enter a valid year.")]
    InvalidYear,
    #[error("Year must be between {} and {}.", MIN_YEAR, MAX_YEAR)]
    YearOutOfRange,
    #[error("Please enter a valid rating.")]
    InvalidRating,
    #[error("Rating must be between {} and {}.", MIN_RATING, MAX_RATING)]
    RatingOutOfRange,
    #[error("This movie already exists in your collection.")]
    DuplicateMovie,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct UserForm {
    #[serde(default)]
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct MovieForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub director: String,
    #[serde(default)]
    pub year: String,
    #[serde(default)]
    pub rating: String,
}

impl From<&Movie> for MovieForm {
    fn from(movie: &Movie) -> Self {
        MovieForm {
            name: movie.name.clone(),
            director: movie.director.clone(),
            year: movie.year.map(|y| y.to_string()).unwrap_or_default(),
            rating: movie.rating.map(|r| r.to_string()).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieFields {
    pub name: String,
    pub director: String,
    pub year: Option<i32>,
    pub rating: Option<u8>,
}

impl MovieFields {
    pub fn into_movie(self, user_id: u64) -> Movie {
        Movie {
            name: self.name,
            director: self.director,
            year: self.year,
            rating: self.rating,
            user_id,
        }
    }
}

pub fn validate_user_name(name: &str) -> Result<String, ValidationError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::MissingUserName);
    }
    if name.chars().count() > MAX_USER_NAME_LEN {
        return Err(ValidationError::UserNameTooLong);
    }
    Ok(name.to_owned())
}

fn validate_text(
    value: &str,
    missing: ValidationError,
    too_long: ValidationError,
) -> Result<String, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        Err(missing)
    } else if value.chars().count() > MAX_MOVIE_FIELD_LEN {
        Err(too_long)
    } else {
        Ok(value.to_owned())
    }
}

// Any integer outside `min..=max` is out of range, including ones that do not fit
// in an i64; anything that is not an integer at all is invalid.
fn parse_bounded(
    value: &str,
    min: i64,
    max: i64,
    invalid: ValidationError,
    out_of_range: ValidationError,
) -> Result<Option<i64>, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    match value.parse::<i64>() {
        Ok(n) if (min..=max).contains(&n) => Ok(Some(n)),
        Ok(_) => Err(out_of_range),
        Err(err) => match err.kind() {
            IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => Err(out_of_range),
            _ => Err(invalid),
        },
    }
}

pub fn validate_year(year: &str) -> Result<Option<i32>, ValidationError> {
    let year = parse_bounded(
        year,
        i64::from(MIN_YEAR),
        i64::from(MAX_YEAR),
        ValidationError::InvalidYear,
        ValidationError::YearOutOfRange,
    )?;
    Ok(year.map(|y| y as i32))
}

pub fn validate_rating(rating: &str) -> Result<Option<u8>, ValidationError> {
    let rating = parse_bounded(
        rating,
        i64::from(MIN_RATING),
        i64::from(MAX_RATING),
        ValidationError::InvalidRating,
        ValidationError::RatingOutOfRange,
    )?;
    Ok(rating.map(|r| r as u8))
}

pub fn validate_movie_form(form: &MovieForm) -> Result<MovieFields, ValidationError> {
    let name = validate_text(
        &form.name,
        ValidationError::MissingMovieName,
        ValidationError::MovieNameTooLong,
    )?;
    let director = validate_text(
        &form.director,
        ValidationError::MissingDirector,
        ValidationError::DirectorTooLong,
    )?;
    let year = validate_year(&form.year)?;
    let rating = validate_rating(&form.rating)?;
    Ok(MovieFields {
        name,
        director,
        year,
        rating,
    })
}

pub fn check_duplicate_movie(
    fields: &MovieFields,
    existing: &[Record<Movie>],
) -> Result<(), ValidationError> {
    let name = fields.name.to_lowercase();
    let director = fields.director.to_lowercase();
    if existing
        .iter()
        .any(|movie| {
            movie.name.to_lowercase() == name && movie.director.to_lowercase() == director
        })
    {
        return Err(ValidationError::DuplicateMovie);
    }
    Ok(())
}
