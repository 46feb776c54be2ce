//! Minimal trellis example: CRUD-style JSON endpoints with a grouped API.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/users/42
//!   curl -X POST http://localhost:3000/api/users \
//!        -H 'content-type: application/json' \
//!        -d '{"name":"alice"}'
//!   curl -X DELETE http://localhost:3000/users/42

use serde::{Deserialize, Serialize};
use trellis::{Context, Error, Router, Server, middleware};

#[derive(Deserialize, Serialize)]
struct User {
    name: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let app = Router::new();
    app.wrap(middleware::recover());
    app.wrap(middleware::trace());

    app.get("/users/{id}", get_user);
    app.delete("/users/{id}", delete_user);

    // Grouped routes share the matcher but snapshot the middleware stack.
    let api = app.group("/api");
    api.post("/users", create_user);

    Server::bind("0.0.0.0:3000")
        .serve(app)
        .await
        .expect("server error");
}

// GET /users/{id}
async fn get_user(ctx: Context) -> Result<(), Error> {
    let id = ctx.params().int("id").map_err(|e| ctx.error(400, e))?;
    ctx.json(200, &serde_json::json!({ "id": id, "name": "alice" }))
}

// POST /api/users. The binder rejects empty bodies and wrong methods, and
// classifies malformed JSON into 400s.
async fn create_user(ctx: Context) -> Result<(), Error> {
    let user: User = ctx.bind()?;
    ctx.json(201, &user)
}

// DELETE /users/{id} answers 204 No Content.
async fn delete_user(ctx: Context) -> Result<(), Error> {
    ctx.no_content()
}
