//! Ordered request pipeline for the backend route.
//!
//! # Data Flow
//! ```text
//! request ─▶ stage 1 ─▶ stage 2 ─▶ ... ─▶ forwarder ─▶ backend
//!              │           │
//!              └─ early response (e.g. 429)
//!
//! response ◀─ stage 1 ◀─ stage 2 ◀─ ... ◀─ forwarder
//! ```
//!
//! Each stage takes the request and either hands it on (`Flow::Continue`) or
//! answers it (`Flow::Respond`). On the way back, `on_response` runs in reverse
//! order for every stage that saw the request, including the one that answered.

use axum::{
    body::Body,
    http::{uri::PathAndQuery, Request},
    response::{IntoResponse, Response},
};

use crate::http::forward::Forwarder;
use crate::http::request::RequestContext;

/// What a stage decided to do with a request.
pub enum Flow {
    /// Pass the (possibly modified) request to the next stage.
    Continue(Request<Body>),
    /// Stop here and send this response.
    Respond(Response),
}

/// A guard or transformer in the pipeline.
pub trait Stage: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    fn on_request(&self, ctx: &mut RequestContext, request: Request<Body>) -> Flow;

    fn on_response(&self, _ctx: &RequestContext, _response: &mut Response) {}
}

/// Stages followed by the forwarder.
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
    forwarder: Forwarder,
}

impl Pipeline {
    pub fn new(forwarder: Forwarder) -> Self {
        Self {
            stages: Vec::new(),
            forwarder,
        }
    }

    /// Append a stage; stages run in insertion order.
    pub fn with_stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run `request` through every stage and forward it to `path` on the backend.
    pub async fn run(&self, mut request: Request<Body>, path: PathAndQuery) -> Response {
        let mut ctx = request
            .extensions_mut()
            .remove::<RequestContext>()
            .unwrap_or_else(|| RequestContext::from_request(&request));

        for (i, stage) in self.stages.iter().enumerate() {
            match stage.on_request(&mut ctx, request) {
                Flow::Continue(next) => request = next,
                Flow::Respond(mut response) => {
                    tracing::debug!(
                        request_id = %ctx.request_id(),
                        stage = stage.name(),
                        status = %response.status(),
                        "Pipeline answered early"
                    );
                    unwind(&self.stages[..=i], &ctx, &mut response);
                    return response;
                }
            }
        }

        let mut response = match self.forwarder.forward(&ctx, request, &path).await {
            Ok(response) => response,
            Err(e) => e.into_response(),
        };
        unwind(&self.stages, &ctx, &mut response);
        response
    }
}

fn unwind(stages: &[Box<dyn Stage>], ctx: &RequestContext, response: &mut Response) {
    for stage in stages.iter().rev() {
        stage.on_response(ctx, response);
    }
}
