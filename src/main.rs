mod config;
mod database;
mod model;
mod service;
mod urls;
mod validation;
mod views;

use actix_web::{
    error,
    http::{header, StatusCode},
    middleware::Logger,
    web, App, HttpResponse, HttpServer,
};
use clap::Parser;
use config::Config;
use database::*;
use log::{debug, info};
use service::ServiceError;
use std::io;
use urls::Endpoint;
use validation::{MovieForm, UserForm};
use views::{Notice, NoticeQuery};

type Tera = web::Data<tera::Tera>;
type Db = web::Data<sled::Db>;

fn log_error<E: std::fmt::Debug>(err: E, message: &'static str) -> error::Error {
    debug!("{:?}", err);
    error::ErrorInternalServerError(message)
}

fn render(
    tera: &tera::Tera,
    template: &str,
    ctx: &tera::Context,
    status: StatusCode,
) -> actix_web::Result<HttpResponse> {
    let body = tera
        .render(template, ctx)
        .map_err(|err| log_error(err, "Template error"))?;
    Ok(HttpResponse::build(status)
        .content_type("text/html; charset=utf-8")
        .body(body))
}

fn redirect(endpoint: Endpoint, notice: Notice) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((
            header::LOCATION,
            format!("{}?notice={}", endpoint, notice.as_str()),
        ))
        .finish()
}

async fn home(tera: Tera) -> actix_web::Result<HttpResponse> {
    render(&tera, "home.html", &tera::Context::new(), StatusCode::OK)
}

async fn list_users(
    tera: Tera,
    db: Db,
    query: web::Query<NoticeQuery>,
) -> actix_web::Result<HttpResponse> {
    let users = db.get_all_users().map_err(ServiceError::from)?;
    render(
        &tera,
        "users.html",
        &views::users(&users, query.notice()),
        StatusCode::OK,
    )
}

async fn add_user_form(tera: Tera) -> actix_web::Result<HttpResponse> {
    let ctx = views::user_form(&UserForm::default(), None);
    render(&tera, "add_user.html", &ctx, StatusCode::OK)
}

async fn add_user(
    tera: Tera,
    db: Db,
    form: web::Form<UserForm>,
) -> actix_web::Result<HttpResponse> {
    match service::create_user(&db, &form) {
        Ok(_) => Ok(redirect(Endpoint::ListUsers, Notice::UserAdded)),
        Err(ServiceError::Invalid(err)) => render(
            &tera,
            "add_user.html",
            &views::user_form(&form, Some(&err.to_string())),
            StatusCode::BAD_REQUEST,
        ),
        Err(err) => Err(err.into()),
    }
}

async fn delete_user(db: Db, path: web::Path<u64>) -> actix_web::Result<HttpResponse> {
    service::delete_user(&db, path.into_inner())?;
    Ok(redirect(Endpoint::ListUsers, Notice::UserDeleted))
}

async fn user_movies(
    tera: Tera,
    db: Db,
    path: web::Path<u64>,
    query: web::Query<NoticeQuery>,
) -> actix_web::Result<HttpResponse> {
    let user = service::user(&db, path.into_inner())?;
    let movies = db.get_user_movies(user.id).map_err(ServiceError::from)?;
    render(
        &tera,
        "user_movies.html",
        &views::user_movies(&user, &movies, query.notice()),
        StatusCode::OK,
    )
}

async fn add_movie_form(
    tera: Tera,
    db: Db,
    path: web::Path<u64>,
) -> actix_web::Result<HttpResponse> {
    let user = service::user(&db, path.into_inner())?;
    let ctx = views::movie_form(&user, None, &MovieForm::default(), None);
    render(&tera, "add_movie.html", &ctx, StatusCode::OK)
}

async fn add_movie(
    tera: Tera,
    db: Db,
    path: web::Path<u64>,
    form: web::Form<MovieForm>,
) -> actix_web::Result<HttpResponse> {
    let user_id = path.into_inner();
    match service::create_movie(&db, user_id, &form) {
        Ok(_) => Ok(redirect(Endpoint::UserMovies { user_id }, Notice::MovieAdded)),
        Err(ServiceError::Invalid(err)) => {
            let user = service::user(&db, user_id)?;
            let ctx = views::movie_form(&user, None, &form, Some(&err.to_string()));
            render(&tera, "add_movie.html", &ctx, StatusCode::BAD_REQUEST)
        }
        Err(err) => Err(err.into()),
    }
}

async fn update_movie_form(
    tera: Tera,
    db: Db,
    path: web::Path<(u64, u64)>,
) -> actix_web::Result<HttpResponse> {
    let (user_id, movie_id) = path.into_inner();
    let user = service::user(&db, user_id)?;
    let movie = service::owned_movie(&db, user_id, movie_id)?;
    let ctx = views::movie_form(&user, Some(movie_id), &MovieForm::from(&movie.value), None);
    render(&tera, "update_movie.html", &ctx, StatusCode::OK)
}

async fn update_movie(
    tera: Tera,
    db: Db,
    path: web::Path<(u64, u64)>,
    form: web::Form<MovieForm>,
) -> actix_web::Result<HttpResponse> {
    let (user_id, movie_id) = path.into_inner();
    let user = service::user(&db, user_id)?;
    match service::update_movie(&db, user_id, movie_id, &form) {
        Ok(_) => Ok(redirect(Endpoint::UserMovies { user_id }, Notice::MovieUpdated)),
        Err(ServiceError::Invalid(err)) => {
            let ctx = views::movie_form(&user, Some(movie_id), &form, Some(&err.to_string()));
            render(&tera, "update_movie.html", &ctx, StatusCode::BAD_REQUEST)
        }
        Err(err) => Err(err.into()),
    }
}

async fn delete_movie(db: Db, path: web::Path<(u64, u64)>) -> actix_web::Result<HttpResponse> {
    let (user_id, movie_id) = path.into_inner();
    service::delete_movie(&db, user_id, movie_id)?;
    Ok(redirect(Endpoint::UserMovies { user_id }, Notice::MovieDeleted))
}

fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(home))
        .route("/users", web::get().to(list_users))
        .route("/add_user", web::get().to(add_user_form))
        .route("/add_user", web::post().to(add_user))
        .route("/users/{user_id}", web::get().to(user_movies))
        .route("/users/{user_id}/delete", web::post().to(delete_user))
        .route("/users/{user_id}/add_movie", web::get().to(add_movie_form))
        .route("/users/{user_id}/add_movie", web::post().to(add_movie))
        .route(
            "/users/{user_id}/update_movie/{movie_id}",
            web::get().to(update_movie_form),
        )
        .route(
            "/users/{user_id}/update_movie/{movie_id}",
            web::post().to(update_movie),
        )
        .route(
            "/users/{user_id}/delete_movie/{movie_id}",
            web::post().to(delete_movie),
        );
}

fn seed(db: &sled::Db) -> Result<(), ServiceError> {
    if !db.get_all_users()?.is_empty() {
        return Ok(());
    }
    let user = service::create_user(
        db,
        &UserForm {
            name: "Alice".to_owned(),
        },
    )?;
    service::create_movie(
        db,
        user.id,
        &MovieForm {
            name: "Inception".to_owned(),
            director: "Christopher Nolan".to_owned(),
            year: "2010".to_owned(),
            rating: "9".to_owned(),
        },
    )?;
    info!("Seeded demo user {}", user.id);
    Ok(())
}

fn io_error<E: std::error::Error + Send + Sync + 'static>(err: E) -> io::Error {
    io::Error::new(io::ErrorKind::Other, err)
}

#[actix_rt::main]
async fn main() -> io::Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("moviweb=debug,actix_web=info"),
    )
    .init();

    let config = Config::parse();
    let tera = views::load(&config.templates).map_err(io_error)?;
    let db = config.open_db().map_err(io_error)?;
    if config.seed {
        seed(&db).map_err(io_error)?;
    }

    let tera = web::Data::new(tera);
    let db = web::Data::new(db);
    info!("Listening on {}", config.listen);
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(tera.clone())
            .app_data(db.clone())
            .configure(routes)
    })
    .bind(config.listen.as_str())?
    .run()
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test;

    fn data() -> (Tera, Db) {
        let tera = views::load(views::TEMPLATES).unwrap();
        let db = sled::Config::new().temporary(true).open().unwrap();
        (web::Data::new(tera), web::Data::new(db))
    }

    macro_rules! app {
        ($tera:expr, $db:expr) => {
            test::init_service(
                App::new()
                    .app_data($tera.clone())
                    .app_data($db.clone())
                    .configure(routes),
            )
            .await
        };
    }

    fn location(resp: &actix_web::dev::ServiceResponse) -> &str {
        resp.headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
    }

    fn movie_form(name: &str, director: &str, year: &str, rating: &str) -> MovieForm {
        MovieForm {
            name: name.to_owned(),
            director: director.to_owned(),
            year: year.to_owned(),
            rating: rating.to_owned(),
        }
    }

    fn add_user_directly(db: &sled::Db, name: &str) -> u64 {
        service::create_user(
            db,
            &UserForm {
                name: name.to_owned(),
            },
        )
        .unwrap()
        .id
    }

    async fn body_of(resp: actix_web::dev::ServiceResponse) -> String {
        String::from_utf8(test::read_body(resp).await.to_vec()).unwrap()
    }

    #[actix_rt::test]
    async fn home_page() {
        let (tera, db) = data();
        let app = app!(tera, db);
        let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(body_of(resp).await.contains("href=\"/users\""));
    }

    #[actix_rt::test]
    async fn add_user_then_list() {
        let (tera, db) = data();
        let app = app!(tera, db);

        let req = test::TestRequest::post()
            .uri("/add_user")
            .set_form(&UserForm {
                name: " Alice ".to_owned(),
            })
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(location(&resp), "/users?notice=user_added");

        let req = test::TestRequest::get()
            .uri("/users?notice=user_added")
            .to_request();
        let body = body_of(test::call_service(&app, req).await).await;
        assert!(body.contains(">Alice</a>"));
        assert!(body.contains("User added successfully."));
    }

    #[actix_rt::test]
    async fn add_user_rejects_invalid_names() {
        let (tera, db) = data();
        add_user_directly(&db, "Alice");
        let app = app!(tera, db);

        let req = test::TestRequest::post()
            .uri("/add_user")
            .set_form(&UserForm {
                name: "alice".to_owned(),
            })
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = body_of(resp).await;
        assert!(body.contains("A user with this name already exists."));
        assert!(body.contains("value=\"alice\""));
    }

    #[actix_rt::test]
    async fn movie_list_page() {
        let (tera, db) = data();
        let alice = add_user_directly(&db, "Alice");
        service::create_movie(&db, alice, &movie_form("Inception", "Nolan", "2010", "9")).unwrap();
        service::create_movie(&db, alice, &movie_form("Unknown", "X", "", "")).unwrap();
        let app = app!(tera, db);

        let req = test::TestRequest::get()
            .uri(&format!("/users/{}", alice))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_of(resp).await;
        assert_eq!(body.matches("class=\"movie-card\"").count(), 2);
        assert_eq!(body.matches("Year: ").count(), 1);
        assert!(body.contains("Rating: 9/10"));

        let req = test::TestRequest::get().uri("/users/4242").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_rt::test]
    async fn add_movie_flow() {
        let (tera, db) = data();
        let alice = add_user_directly(&db, "Alice");
        let app = app!(tera, db);
        let uri = format!("/users/{}/add_movie", alice);

        let resp = test::call_service(&app, test::TestRequest::get().uri(&uri).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::post()
            .uri(&uri)
            .set_form(&movie_form("Inception", "Nolan", "1800", ""))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = body_of(resp).await;
        assert!(body.contains("Year must be between 1900 and 2025."));
        assert!(body.contains("value=\"Inception\""));
        assert!(db.get_user_movies(alice).unwrap().is_empty());

        let req = test::TestRequest::post()
            .uri(&uri)
            .set_form(&movie_form("Inception", "Nolan", "2010", "9"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(
            location(&resp),
            format!("/users/{}?notice=movie_added", alice)
        );
        let movies = db.get_user_movies(alice).unwrap();
        assert_eq!(movies.len(), 1);
        assert_eq!(movies[0].year, Some(2010));
    }

    #[actix_rt::test]
    async fn update_movie_flow() {
        let (tera, db) = data();
        let alice = add_user_directly(&db, "Alice");
        let movie = service::create_movie(&db, alice, &movie_form("Inceptoin", "Nolan", "", ""))
            .unwrap()
            .id;
        let app = app!(tera, db);
        let uri = format!("/users/{}/update_movie/{}", alice, movie);

        let resp = test::call_service(&app, test::TestRequest::get().uri(&uri).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(body_of(resp).await.contains("value=\"Inceptoin\""));

        let req = test::TestRequest::post()
            .uri(&uri)
            .set_form(&movie_form("Inception", "Nolan", "2010", "8"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FOUND);
        let stored = db.get_movie(movie).unwrap().unwrap();
        assert_eq!(stored.name, "Inception");
        assert_eq!(stored.rating, Some(8));
    }

    #[actix_rt::test]
    async fn delete_movie_only_through_its_owner() {
        let (tera, db) = data();
        let alice = add_user_directly(&db, "Alice");
        let bob = add_user_directly(&db, "Bob");
        let movie = service::create_movie(&db, alice, &movie_form("Inception", "Nolan", "", ""))
            .unwrap()
            .id;
        let app = app!(tera, db);

        let req = test::TestRequest::post()
            .uri(&format!("/users/{}/delete_movie/{}", bob, movie))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert!(db.get_movie(movie).unwrap().is_some());

        let req = test::TestRequest::post()
            .uri(&format!("/users/{}/delete_movie/{}", alice, movie))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(
            location(&resp),
            format!("/users/{}?notice=movie_deleted", alice)
        );
        assert!(db.get_movie(movie).unwrap().is_none());

        // Deleting is never available through GET.
        let req = test::TestRequest::get()
            .uri(&format!("/users/{}/delete_movie/{}", alice, movie))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_client_error());
    }

    #[actix_rt::test]
    async fn delete_user_removes_movies() {
        let (tera, db) = data();
        let alice = add_user_directly(&db, "Alice");
        let movie = service::create_movie(&db, alice, &movie_form("Inception", "Nolan", "", ""))
            .unwrap()
            .id;
        let app = app!(tera, db);

        let req = test::TestRequest::post()
            .uri(&format!("/users/{}/delete", alice))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(location(&resp), "/users?notice=user_deleted");
        assert!(db.get_user(alice).unwrap().is_none());
        assert!(db.get_movie(movie).unwrap().is_none());
    }

    #[actix_rt::test]
    async fn seed_only_fills_an_empty_store() {
        let db = sled::Config::new().temporary(true).open().unwrap();
        seed(&db).unwrap();
        seed(&db).unwrap();
        let users = db.get_all_users().unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(db.get_user_movies(users[0].id).unwrap().len(), 1);
    }
}
