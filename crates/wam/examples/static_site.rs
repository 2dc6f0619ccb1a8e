use wam::static_files::StaticOptions;
use wam::{Application, Body, Environment, Server, endpoint_fn, router};

// serves ./public, e.g.
// curl -v --compressed http://127.0.0.1:8080/index.html
// curl -v http://127.0.0.1:8080/hello/wam
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env = Environment::from_env();
    let root = std::env::args().nth(1).unwrap_or_else(|| "public".to_owned());

    // unknown paths without an extension get the application shell
    let assets = StaticOptions::new()
        .environment(env)
        .fallback(|path: &str| Body::from(format!("<!doctype html><main data-route=\"{path}\"></main>")))
        .build(&root)?;

    let app = Application::builder()
        .environment(env)
        .route(
            "/hello/:name",
            router::get(endpoint_fn(|ctx| {
                Box::pin(async move {
                    let name = ctx.params().get("name").unwrap_or("world").to_owned();
                    ctx.set_body(format!("hello {name}\r\n"));
                    Ok(())
                })
            })),
        )
        .middleware(assets)
        .build()?;

    Server::builder().application(app).bind("127.0.0.1:8080").build()?.start().await?;
    Ok(())
}
