use axum::{
    body::{Body, Bytes},
    extract::{FromRequest, Path, Request, State},
    http::{header, StatusCode},
    response::Response,
    Extension, Form,
};
use serde::Serialize;

use crate::{
    error::{AppError, Result},
    middleware_layer::{auth::CurrentUser, session::SessionHandle},
    models::user::{User, UserForm},
    negotiate::{ContentType, Negotiated},
    render::{escape, Page},
    state::AppState,
};

#[derive(Serialize)]
struct UserList<'a> {
    users: &'a [User],
}

fn parse_id(raw: &str) -> Result<i32> {
    raw.parse()
        .map_err(|_| AppError::NotFound(format!("User ID {} not found", raw)))
}

fn is_json_body(req: &Request<Body>) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim_start().to_ascii_lowercase().starts_with("application/json"))
        .unwrap_or(false)
}

/// Reads a `UserForm` from a JSON or urlencoded body and returns the
/// validated name.
async fn read_name(state: &AppState, req: Request<Body>) -> Result<String> {
    let form: UserForm = if is_json_body(&req) {
        let body = Bytes::from_request(req, state)
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;
        sonic_rs::from_slice(&body).map_err(|e| AppError::Validation(format!("Invalid JSON: {}", e)))?
    } else {
        let Form(form) = Form::<UserForm>::from_request(req, state)
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;
        form
    };

    form.into_name()
        .map_err(|report| AppError::Validation(report.to_string()))
}

fn user_form(action: &str, submit: &str, name: &str) -> String {
    format!(
        "<form method=\"post\" action=\"{}\">\n\
         <label>Name <input type=\"text\" name=\"name\" value=\"{}\" required></label>\n\
         <button type=\"submit\">{}</button>\n\
         </form>",
        escape(action),
        escape(name),
        escape(submit)
    )
}

/// Handles `GET /users`.
pub async fn index(
    State(state): State<AppState>,
    Negotiated(content_type): Negotiated,
    session: SessionHandle,
) -> Result<Response> {
    let users = state.users.list().await?;

    if content_type == ContentType::Json {
        return Ok(state.render.json(StatusCode::OK, &UserList { users: &users }));
    }

    let items: String = users
        .iter()
        .map(|u| format!("<li><a href=\"/users/{}\">{}</a></li>\n", u.id, escape(&u.name)))
        .collect();
    let body = format!(
        "<h1>Users</h1>\n<ul>\n{}</ul>\n<p><a href=\"/users/new\">New user</a></p>",
        items
    );
    Ok(state.render.html(&session, Page::new("Users", body)).await)
}

/// Handles `GET /users/new`.
pub async fn new_form(
    State(state): State<AppState>,
    Negotiated(content_type): Negotiated,
    session: SessionHandle,
) -> Response {
    if content_type == ContentType::Json {
        return state.render.json(StatusCode::OK, &sonic_rs::json!({ "name": "" }));
    }

    let body = format!("<h1>New user</h1>\n{}", user_form("/users", "Create", ""));
    state.render.html(&session, Page::new("New user", body)).await
}

/// Handles `POST /users`.
pub async fn create(
    State(state): State<AppState>,
    Negotiated(content_type): Negotiated,
    Extension(current): Extension<CurrentUser>,
    session: SessionHandle,
    req: Request<Body>,
) -> Result<Response> {
    let name = read_name(&state, req).await?;
    let user = state.users.create(&name).await?;
    tracing::info!("✅ User created: {} by {}", user.id, current.email);

    if content_type == ContentType::Json {
        return Ok(state.render.json(StatusCode::CREATED, &user));
    }

    session.add_flash("success", "User created").await;
    Ok(state.render.redirect(&format!("/users/{}", user.id)))
}

/// Handles `GET /users/{id}`.
pub async fn show(
    State(state): State<AppState>,
    Negotiated(content_type): Negotiated,
    session: SessionHandle,
    Path(id): Path<String>,
) -> Result<Response> {
    let user = state.users.get(parse_id(&id)?).await?;

    if content_type == ContentType::Json {
        return Ok(state.render.json(StatusCode::OK, &user));
    }

    let body = format!(
        "<h1>{name}</h1>\n\
         <p><a href=\"/users/{id}/edit\">Edit</a></p>\n\
         <form method=\"post\" action=\"/users/{id}/delete\"><button type=\"submit\">Delete</button></form>",
        name = escape(&user.name),
        id = user.id
    );
    Ok(state.render.html(&session, Page::new(user.name.clone(), body)).await)
}

/// Handles `GET /users/{id}/edit`.
pub async fn edit_form(
    State(state): State<AppState>,
    Negotiated(content_type): Negotiated,
    session: SessionHandle,
    Path(id): Path<String>,
) -> Result<Response> {
    let user = state.users.get(parse_id(&id)?).await?;

    if content_type == ContentType::Json {
        return Ok(state.render.json(StatusCode::OK, &user));
    }

    let action = format!("/users/{}/update", user.id);
    let body = format!("<h1>Edit user</h1>\n{}", user_form(&action, "Save", &user.name));
    Ok(state.render.html(&session, Page::new("Edit user", body)).await)
}

/// Handles `PUT /users/{id}` and `POST /users/{id}/update`.
pub async fn update(
    State(state): State<AppState>,
    Negotiated(content_type): Negotiated,
    Extension(current): Extension<CurrentUser>,
    session: SessionHandle,
    Path(id): Path<String>,
    req: Request<Body>,
) -> Result<Response> {
    let id = parse_id(&id)?;
    let name = read_name(&state, req).await?;
    let user: User = state.users.update(id, &name).await?;
    tracing::info!("✏️ User updated: {} by {}", user.id, current.email);

    if content_type == ContentType::Json {
        return Ok(state.render.json(StatusCode::OK, &user));
    }

    session.add_flash("success", "User updated").await;
    Ok(state.render.redirect(&format!("/users/{}", user.id)))
}

/// Handles `DELETE /users/{id}` and `POST /users/{id}/delete`.
pub async fn delete(
    State(state): State<AppState>,
    Negotiated(content_type): Negotiated,
    Extension(current): Extension<CurrentUser>,
    session: SessionHandle,
    Path(id): Path<String>,
) -> Result<Response> {
    let id = parse_id(&id)?;
    state.users.delete(id).await?;
    tracing::info!("🗑️ User deleted: {} by {}", id, current.email);

    if content_type == ContentType::Json {
        return Ok(state.render.json(StatusCode::OK, &sonic_rs::json!({ "deleted": id })));
    }

    session.add_flash("success", "User deleted").await;
    Ok(state.render.redirect("/users"))
}
