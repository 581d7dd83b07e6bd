use axum::{
    Form,
    extract::State,
    response::{Html, IntoResponse},
};
use minijinja::context;
use tracing::info;

use crate::{
    AppState,
    api::{
        handlers::redirect_home,
        models::auth::{LogInForm, SignUpForm},
    },
    auth::{authenticator, session::Session},
    errors::Result,
    types::abbrev_uuid,
    views,
};

/// Render the registration form
#[tracing::instrument(skip_all)]
pub async fn sign_up_form(State(state): State<AppState>) -> Result<Html<String>> {
    state.views.render(views::SIGN_UP, context! {})
}

/// Register a new user. Does not log the user in.
#[tracing::instrument(skip_all, fields(username = %form.username))]
pub async fn sign_up(State(state): State<AppState>, Form(form): Form<SignUpForm>) -> Result<impl IntoResponse> {
    let user = authenticator::register(
        state.users.as_ref(),
        &form.username,
        &form.password,
        state.config.password.argon2_params(),
    )
    .await?;

    info!(user_id = %abbrev_uuid(&user.id), "User registered");
    Ok(redirect_home())
}

/// Check credentials. Either way the client is sent home; a failure (including
/// a missing field) is reported through the flash queue.
#[tracing::instrument(skip_all, fields(username = %form.username))]
pub async fn log_in(State(state): State<AppState>, session: Session, Form(form): Form<LogInForm>) -> Result<impl IntoResponse> {
    match authenticator::authenticate(state.users.as_ref(), &form.username, &form.password).await? {
        Ok(user) => {
            info!(user_id = %abbrev_uuid(&user.id), "User logged in");
            session.log_in(user.id);
        }
        Err(failure) => {
            info!(reason = %failure, "Log-in failed");
            session.push_message(failure.to_string());
        }
    }

    Ok(redirect_home())
}

/// Destroy the whole session
#[tracing::instrument(skip_all)]
pub async fn log_out(session: Session) -> impl IntoResponse {
    session.destroy();
    redirect_home()
}
