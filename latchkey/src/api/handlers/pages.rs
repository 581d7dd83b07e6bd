use axum::{extract::State, response::Html};
use minijinja::context;
use tracing::trace;

use crate::{
    AppState,
    auth::{identity::Identity, session::Session},
    errors::Result,
    views,
};

/// Home page. Drains the flash queue into this render.
#[tracing::instrument(skip_all)]
pub async fn home(State(state): State<AppState>, session: Session, identity: Identity) -> Result<Html<String>> {
    let messages = session.take_messages();
    trace!(count = messages.len(), "Rendering flash messages");

    state.views.render(
        views::INDEX,
        context! {
            current_user => identity.current_user(),
            messages => messages,
        },
    )
}

/// Restricted page, mounted behind [`crate::auth::guard::require_login`].
#[tracing::instrument(skip_all)]
pub async fn restricted(State(state): State<AppState>, session: Session) -> Result<Html<String>> {
    let page_count = session.increment_page_count();

    state.views.render(views::RESTRICTED, context! { page_count => page_count })
}

/// Liveness probe. Touches no store.
pub async fn healthz() -> &'static str {
    "OK"
}
