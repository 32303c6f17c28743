use crate::model::*;
use crate::urls::UrlFor;
use crate::validation::{MovieForm, UserForm};
use serde::Deserialize;

pub const TEMPLATES: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/templates/**/*");

pub fn load(glob: &str) -> tera::Result<tera::Tera> {
    let mut tera = tera::Tera::new(glob)?;
    tera.register_function("url_for", UrlFor);
    Ok(tera)
}

// Passed along as `?notice=` on the redirect after a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    UserAdded,
    UserDeleted,
    MovieAdded,
    MovieUpdated,
    MovieDeleted,
}

impl Notice {
    pub fn as_str(self) -> &'static str {
        match self {
            Notice::UserAdded => "user_added",
            Notice::UserDeleted => "user_deleted",
            Notice::MovieAdded => "movie_added",
            Notice::MovieUpdated => "movie_updated",
            Notice::MovieDeleted => "movie_deleted",
        }
    }

    pub fn parse(s: &str) -> Option<Notice> {
        Some(match s {
            "user_added" => Notice::UserAdded,
            "user_deleted" => Notice::UserDeleted,
            "movie_added" => Notice::MovieAdded,
            "movie_updated" => Notice::MovieUpdated,
            "movie_deleted" => Notice::MovieDeleted,
            _ => return None,
        })
    }

    pub fn message(self) -> &'static str {
        match self {
            Notice::UserAdded => "User added successfully.",
            Notice::UserDeleted => "User deleted.",
            Notice::MovieAdded => "Movie added successfully.",
            Notice::MovieUpdated => "Movie updated successfully.",
            Notice::MovieDeleted => "Movie deleted.",
        }
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct NoticeQuery {
    pub notice: Option<String>,
}

impl NoticeQuery {
    pub fn notice(&self) -> Option<Notice> {
        self.notice.as_deref().and_then(Notice::parse)
    }
}

fn insert_notice(ctx: &mut tera::Context, notice: Option<Notice>) {
    if let Some(notice) = notice {
        ctx.insert("notice", notice.message());
    }
}

pub fn users(users: &[Record<User>], notice: Option<Notice>) -> tera::Context {
    let mut ctx = tera::Context::new();
    ctx.insert("users", users);
    insert_notice(&mut ctx, notice);
    ctx
}

pub fn user_movies(
    user: &Record<User>,
    movies: &[Record<Movie>],
    notice: Option<Notice>,
) -> tera::Context {
    let mut ctx = tera::Context::new();
    ctx.insert("user", user);
    ctx.insert("movies", movies);
    insert_notice(&mut ctx, notice);
    ctx
}

pub fn user_form(form: &UserForm, error: Option<&str>) -> tera::Context {
    let mut ctx = tera::Context::new();
    ctx.insert("form", form);
    if let Some(error) = error {
        ctx.insert("error", error);
    }
    ctx
}

pub fn movie_form(
    user: &Record<User>,
    movie_id: Option<u64>,
    form: &MovieForm,
    error: Option<&str>,
) -> tera::Context {
    let mut ctx = tera::Context::new();
    ctx.insert("user", user);
    ctx.insert("form", form);
    if let Some(movie_id) = movie_id {
        ctx.insert("movie_id", &movie_id);
    }
    if let Some(error) = error {
        ctx.insert("error", error);
    }
    ctx
}
