//! Global access logger.
//!
//! BEFORE stamps the start instant into the request's scratch store; AFTER
//! logs method, path, status and latency.

use std::time::Instant;

use crate::routing::MiddlewareModule;

const START_KEY: &str = "fsroute.access_log.start";

pub fn access_log() -> MiddlewareModule {
    MiddlewareModule::new()
        .before(|req, _res| {
            Box::pin(async move {
                req.kv_mut().insert(START_KEY, Instant::now());
                Ok(())
            })
        })
        .after(|req, res| {
            Box::pin(async move {
                let elapsed_ms = req
                    .kv()
                    .get::<Instant>(START_KEY)
                    .map(|start| start.elapsed().as_secs_f64() * 1000.0);
                tracing::info!(
                    method = %req.method(),
                    path = %req.path(),
                    status = res.code().as_u16(),
                    elapsed_ms = elapsed_ms.unwrap_or_default(),
                    "Request completed"
                );
                Ok(())
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BodyIngestor;
    use crate::http::{Request, Response};
    use axum::body::Body;

    #[tokio::test]
    async fn test_records_start_instant() {
        let module = access_log();
        let http = axum::http::Request::builder().uri("/x").body(Body::empty()).unwrap();
        let mut req = Request::from_http(http, BodyIngestor::default());
        let mut res = Response::new();

        let before = module.before.as_ref().unwrap();
        before(&mut req, &mut res).await.unwrap();
        assert!(req.kv().get::<Instant>(START_KEY).is_some());

        let after = module.after.as_ref().unwrap();
        after(&mut req, &mut res).await.unwrap();
        assert!(!res.is_sent());
    }
}
