use fsroute::RouteModule;

/// Echo any supported body back as JSON, tagged with its kind.
pub fn module() -> RouteModule {
    RouteModule::new().post(|req, res| {
        Box::pin(async move {
            let body = req.body().await?.clone();
            res.json(&serde_json::json!({ "kind": body.kind(), "body": body }))?;
            Ok(())
        })
    })
}
