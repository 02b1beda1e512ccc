use std::net::SocketAddr;
use std::sync::Arc;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use jim::router::factory::hyper::serve_hyper;
use jim::{Context, Engine, EngineConfig, HandlerError};
use serde::Serialize;
use tokio::net::TcpListener;

#[jim::handler]
async fn index(ctx: &mut Context) -> Result<(), HandlerError> {
    ctx.html(200, "<h1>Hello jim</h1>");
    Ok(())
}

#[jim::handler]
async fn hello(ctx: &mut Context) -> Result<(), HandlerError> {
    let name = ctx.query("name");
    let body = format!("hello {name}, you're at {}\n", ctx.path());
    ctx.string(200, body);
    Ok(())
}

#[jim::handler]
async fn greet(ctx: &mut Context) -> Result<(), HandlerError> {
    let body = format!("hello {}, you're at {}\n", ctx.param("name"), ctx.path());
    ctx.string(200, body);
    Ok(())
}

#[jim::handler]
async fn assets(ctx: &mut Context) -> Result<(), HandlerError> {
    #[derive(Serialize)]
    struct Asset<'a> {
        filepath: &'a str,
    }

    let asset = Asset {
        filepath: ctx.param("filepath"),
    };
    let body = serde_json::to_vec(&asset).map_err(HandlerError::encode)?;
    ctx.data(200, "application/json", &body);
    Ok(())
}

#[jim::handler]
async fn login(ctx: &mut Context) -> Result<(), HandlerError> {
    let username = ctx.post_form("username");
    if username.is_empty() {
        ctx.abort(400, "username is required");
        return Ok(());
    }
    ctx.json(200, &serde_json::json!({ "username": username }))
}

#[jim::handler]
async fn only_v2(ctx: &mut Context) -> Result<(), HandlerError> {
    log::info!("Request {} entered /v2", ctx.id());
    ctx.next().await
}

fn create_engine(config: EngineConfig) -> Engine {
    let mut engine = Engine::with_config(config);
    engine
        .use_middleware(jim::middleware::logger())
        .use_middleware(jim::middleware::recovery());
    engine.get("/", index());
    engine.get("/hello", hello());
    engine.get("/assets/*filepath", assets());

    let mut v2 = engine.group("/v2");
    v2.use_middleware(only_v2());
    v2.get("/hello/:name", greet());
    v2.post("/login", login());
    engine
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    jim::logger::init(&config)?;

    let engine = Arc::new(create_engine(config));
    let addr = SocketAddr::from(([127, 0, 0, 1], 9999));
    let listener = TcpListener::bind(addr).await?;

    println!("jim server running on http://{}", addr);
    println!("Examples:");
    println!("  curl http://127.0.0.1:9999/hello?name=jim");
    println!("  curl http://127.0.0.1:9999/v2/hello/jim");
    println!("  curl http://127.0.0.1:9999/assets/css/app.css");
    println!("  curl -d 'username=jim' http://127.0.0.1:9999/v2/login");

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let engine = Arc::clone(&engine);

        tokio::task::spawn(async move {
            let service = service_fn(move |req| {
                let engine = Arc::clone(&engine);
                async move { serve_hyper(&engine, req).await }
            });
            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                log::error!("Error serving connection: {:?}", err);
            }
        });
    }
}
