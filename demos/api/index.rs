use fsroute::RouteModule;

pub fn module() -> RouteModule {
    RouteModule::new().get(|req, res| {
        Box::pin(async move {
            res.json(&serde_json::json!({
                "message": "fsroute is running",
                "ip": req.ip().map(|ip| ip.to_string()),
            }))?;
            Ok(())
        })
    })
}
