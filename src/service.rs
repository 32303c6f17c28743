use crate::database::{DbError, MovieDb, UserDb};
use crate::model::*;
use crate::validation::{self, MovieForm, UserForm, ValidationError};
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use log::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("User not found.")]
    UserNotFound,
    #[error("Movie not found.")]
    MovieNotFound,
    #[error("Access denied.")]
    AccessDenied,
    #[error("Database error")]
    Db(#[from] DbError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Invalid(_) => StatusCode::BAD_REQUEST,
            ServiceError::UserNotFound | ServiceError::MovieNotFound => StatusCode::NOT_FOUND,
            ServiceError::AccessDenied => StatusCode::FORBIDDEN,
            ServiceError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let ServiceError::Db(err) = self {
            debug!("{:?}", err);
        }
        HttpResponse::build(self.status_code())
            .content_type("text/plain; charset=utf-8")
            .body(self.to_string())
    }
}

pub fn user(db: &sled::Db, id: u64) -> ServiceResult<Record<User>> {
    db.get_user(id)?
        .map(|value| Record { id, value })
        .ok_or(ServiceError::UserNotFound)
}

pub fn create_user(db: &sled::Db, form: &UserForm) -> ServiceResult<Record<User>> {
    let user = User {
        name: validation::validate_user_name(&form.name).map_err(invalid)?,
    };
    match db.add_user(&user)? {
        Some(id) => {
            info!("Added user {} ({})", id, user.name);
            Ok(Record { id, value: user })
        }
        None => Err(invalid(ValidationError::DuplicateUser)),
    }
}

pub fn delete_user(db: &sled::Db, id: u64) -> ServiceResult<User> {
    let user = self::user(db, id)?;
    if !db.delete_user(id)? {
        return Err(ServiceError::UserNotFound);
    }
    info!("Deleted user {} ({})", id, user.name);
    Ok(user.value)
}

pub fn create_movie(
    db: &sled::Db,
    user_id: u64,
    form: &MovieForm,
) -> ServiceResult<Record<Movie>> {
    self::user(db, user_id)?;
    let fields = validation::validate_movie_form(form).map_err(invalid)?;
    let existing = db.get_user_movies(user_id)?;
    validation::check_duplicate_movie(&fields, &existing).map_err(invalid)?;
    let movie = fields.into_movie(user_id);
    let id = db.add_movie(&movie)?.ok_or(ServiceError::UserNotFound)?;
    info!("Added movie {} ({}) for user {}", id, movie.name, user_id);
    Ok(Record { id, value: movie })
}

pub fn owned_movie(db: &sled::Db, user_id: u64, movie_id: u64) -> ServiceResult<Record<Movie>> {
    let movie = db.get_movie(movie_id)?.ok_or(ServiceError::MovieNotFound)?;
    if movie.user_id != user_id {
        warn!(
            "Movie {} belongs to user {}, not {}",
            movie_id, movie.user_id, user_id
        );
        return Err(ServiceError::AccessDenied);
    }
    Ok(Record {
        id: movie_id,
        value: movie,
    })
}

/// Overwrites name, director, year and rating. Unlike [`create_movie`] this
/// does not check for duplicates.
pub fn update_movie(
    db: &sled::Db,
    user_id: u64,
    movie_id: u64,
    form: &MovieForm,
) -> ServiceResult<Record<Movie>> {
    owned_movie(db, user_id, movie_id)?;
    let movie = validation::validate_movie_form(form)
        .map_err(invalid)?
        .into_movie(user_id);
    if !db.update_movie(movie_id, &movie)? {
        return Err(ServiceError::MovieNotFound);
    }
    info!("Updated movie {} ({})", movie_id, movie.name);
    Ok(Record {
        id: movie_id,
        value: movie,
    })
}

pub fn delete_movie(db: &sled::Db, user_id: u64, movie_id: u64) -> ServiceResult<Movie> {
    let movie = owned_movie(db, user_id, movie_id)?;
    if !db.delete_movie(movie_id)? {
        return Err(ServiceError::MovieNotFound);
    }
    info!("Deleted movie {} ({})", movie_id, movie.name);
    Ok(movie.value)
}

fn invalid(err: ValidationError) -> ServiceError {
    warn!("Validation failed: {}", err);
    ServiceError::Invalid(err)
}
