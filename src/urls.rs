use std::collections::HashMap;
use std::fmt;
use tera::Value;

/// Named routes. `Display` yields the path used by redirects and by `url_for`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Home,
    ListUsers,
    AddUser,
    DeleteUser { user_id: u64 },
    UserMovies { user_id: u64 },
    AddMovie { user_id: u64 },
    UpdateMovie { user_id: u64, movie_id: u64 },
    DeleteMovie { user_id: u64, movie_id: u64 },
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Home => write!(f, "/"),
            Endpoint::ListUsers => write!(f, "/users"),
            Endpoint::AddUser => write!(f, "/add_user"),
            Endpoint::DeleteUser { user_id } => write!(f, "/users/{}/delete", user_id),
            Endpoint::UserMovies { user_id } => write!(f, "/users/{}", user_id),
            Endpoint::AddMovie { user_id } => write!(f, "/users/{}/add_movie", user_id),
            Endpoint::UpdateMovie { user_id, movie_id } => {
                write!(f, "/users/{}/update_movie/{}", user_id, movie_id)
            }
            Endpoint::DeleteMovie { user_id, movie_id } => {
                write!(f, "/users/{}/delete_movie/{}", user_id, movie_id)
            }
        }
    }
}

fn id_arg(args: &HashMap<String, Value>, name: &str) -> tera::Result<u64> {
    match args.get(name) {
        Some(value) => value.as_u64().ok_or_else(|| {
            tera::Error::msg(format!(
                "url_for: `{}` must be a non-negative integer, got {}",
                name, value
            ))
        }),
        None => Err(tera::Error::msg(format!("url_for: missing `{}`", name))),
    }
}

impl Endpoint {
    pub fn from_args(args: &HashMap<String, Value>) -> tera::Result<Self> {
        let name = args
            .get("endpoint")
            .and_then(Value::as_str)
            .ok_or_else(|| tera::Error::msg("url_for: missing `endpoint`"))?;
        Ok(match name {
            "home" => Endpoint::Home,
            "list_users" => Endpoint::ListUsers,
            "add_user" => Endpoint::AddUser,
            "delete_user" => Endpoint::DeleteUser {
                user_id: id_arg(args, "user_id")?,
            },
            "user_movies" => Endpoint::UserMovies {
                user_id: id_arg(args, "user_id")?,
            },
            "add_movie" => Endpoint::AddMovie {
                user_id: id_arg(args, "user_id")?,
            },
            "update_movie" => Endpoint::UpdateMovie {
                user_id: id_arg(args, "user_id")?,
                movie_id: id_arg(args, "movie_id")?,
            },
            "delete_movie" => Endpoint::DeleteMovie {
                user_id: id_arg(args, "user_id")?,
                movie_id: id_arg(args, "movie_id")?,
            },
            other => {
                return Err(tera::Error::msg(format!(
                    "url_for: unknown endpoint `{}`",
                    other
                )))
            }
        })
    }
}

pub struct UrlFor;

impl tera::Function for UrlFor {
    fn call(&self, args: &HashMap<String, Value>) -> tera::Result<Value> {
        Endpoint::from_args(args).map(|endpoint| Value::String(endpoint.to_string()))
    }

    // Paths are built from integers only, so there is nothing to escape.
    fn is_safe(&self) -> bool {
        true
    }
}
