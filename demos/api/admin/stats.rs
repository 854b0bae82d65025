use fsroute::RouteModule;

pub fn module() -> RouteModule {
    RouteModule::new().get(|_req, res| {
        Box::pin(async move {
            res.json(&serde_json::json!({ "uptime": "ok" }))?;
            Ok(())
        })
    })
}
