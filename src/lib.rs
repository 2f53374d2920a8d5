pub mod cache;
pub mod compiler;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod handlers;
pub mod hasher;
pub mod models;
pub mod normaliser;
pub mod router;
pub mod validator;

use std::sync::Arc;

use engine::Engine;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}
