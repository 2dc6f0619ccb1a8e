use http::StatusCode;
use serde::{Deserialize, Serialize};
use wam::compress::{self, CompressOptions};
use wam::{Application, Body, Flow, PipelineError, Server, endpoint_fn, middleware_fn, router};

#[derive(Deserialize, Debug)]
struct Paging {
    #[serde(default)]
    offset: usize,
    limit: Option<usize>,
}

#[derive(Serialize, Deserialize, Debug)]
struct Item {
    id: usize,
    name: String,
}

// curl -v --compressed 'http://127.0.0.1:8080/items?offset=10&limit=100'
// curl -v -d '{"id":1,"name":"wam"}' http://127.0.0.1:8080/items
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let app = Application::builder()
        .middleware(middleware_fn(|ctx| {
            Box::pin(async move {
                ctx.set("x-powered-by", "wam")?;
                Ok(Flow::Continue)
            })
        }))
        .route(
            "/items",
            router::get(endpoint_fn(|ctx| {
                Box::pin(async move {
                    let paging: Paging = ctx.request().query_as()?;
                    let limit = paging.limit.unwrap_or(50).min(500);
                    let items: Vec<_> = (paging.offset..paging.offset + limit)
                        .map(|id| Item { id, name: format!("item #{id}") })
                        .collect();
                    ctx.set_body(Body::json(&items)?);
                    Ok(())
                })
            })),
        )
        .route(
            "/items",
            router::post(endpoint_fn(|ctx| {
                Box::pin(async move {
                    let Some(body) = ctx.request_mut().take_body() else {
                        return Err(PipelineError::status(StatusCode::BAD_REQUEST, "body already read"));
                    };
                    let bytes = body.collect_bytes().await?;
                    let item: Item = serde_json::from_slice(&bytes)
                        .map_err(|e| PipelineError::status(StatusCode::BAD_REQUEST, e.to_string()))?;

                    ctx.set_status(StatusCode::CREATED);
                    ctx.set_body(Body::json(&item)?);
                    Ok(())
                })
            })),
        )
        .middleware(compress::build(CompressOptions::default()))
        .build()?;

    Server::builder().application(app).bind("127.0.0.1:8080").build()?.start().await?;
    Ok(())
}
