//! HTML views, rendered with minijinja from templates compiled into the binary.

use axum::response::Html;
use minijinja::Environment;
use serde::Serialize;

use crate::errors::Result;

pub const INDEX: &str = "index.html";
pub const SIGN_UP: &str = "sign_up.html";
pub const RESTRICTED: &str = "restricted.html";

/// Template environment. Autoescaping is on for every template (all are `.html`).
#[derive(Debug)]
pub struct Views {
    env: Environment<'static>,
}

impl Views {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.add_template("layout.html", include_str!("../templates/layout.html"))?;
        env.add_template(INDEX, include_str!("../templates/index.html"))?;
        env.add_template(SIGN_UP, include_str!("../templates/sign_up.html"))?;
        env.add_template(RESTRICTED, include_str!("../templates/restricted.html"))?;
        Ok(Self { env })
    }

    pub fn render<C: Serialize>(&self, name: &str, ctx: C) -> Result<Html<String>> {
        let template = self.env.get_template(name)?;
        Ok(Html(template.render(ctx)?))
    }
}
