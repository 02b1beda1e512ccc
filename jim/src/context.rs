use crate::handler::{Handler, HandlerError, SharedHandler};
use crate::request::Request;
use crate::response::Response;
use crate::router::trie::Params;
use serde::Serialize;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;
use uuid::Uuid;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

#[derive(Serialize)]
struct MessageBody<'a> {
    message: &'a str,
}

/// Per-request state threaded through a chain of handlers.
///
/// A context owns the request, the bound route parameters, the response under
/// construction and the chain itself. The chain is driven by an index cursor:
/// [`Context::next`] runs the step at the cursor and [`Context::abort`] moves the
/// cursor past the end so nothing further runs.
pub struct Context {
    id: Uuid,
    request: Request,
    params: Params,
    pattern: Option<String>,
    response: Response,
    chain: Vec<SharedHandler>,
    cursor: usize,
    aborted: bool,
    extensions: Extensions,
}

impl Context {
    pub(crate) fn new(request: Request, chain: Vec<SharedHandler>) -> Self {
        Self {
            id: Uuid::new_v4(),
            request,
            params: Params::default(),
            pattern: None,
            response: Response::default(),
            chain,
            cursor: 0,
            aborted: false,
            extensions: Extensions::new(),
        }
    }

    pub(crate) fn set_route(&mut self, pattern: &str, params: Params) {
        self.pattern = Some(pattern.to_string());
        self.params = params;
    }

    pub(crate) fn into_response(self) -> Response {
        self.response
    }

    /// Unique id of this request.
    pub fn id(&self) -> &Uuid {
        &self.id
    }

    pub fn method(&self) -> &str {
        self.request.method()
    }

    pub fn path(&self) -> &str {
        self.request.path()
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.request.header(name)
    }

    /// Value bound to the route parameter `name`, or an empty string when the
    /// matched pattern has no such parameter.
    pub fn param(&self, name: &str) -> &str {
        self.params.get(name).unwrap_or_default()
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// The registered pattern that matched this request, if any.
    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_deref()
    }

    /// First value of `key` in the query string, or an empty string.
    pub fn query(&self, key: &str) -> String {
        self.request
            .query()
            .and_then(|query| form_value(query.as_bytes(), key))
            .unwrap_or_default()
    }

    /// First value of `key` in a url-encoded form body, falling back to the query
    /// string. Returns an empty string when neither carries the key.
    pub fn post_form(&self, key: &str) -> String {
        let is_form = self
            .header("content-type")
            .is_some_and(|value| value.starts_with(FORM_CONTENT_TYPE));
        if is_form {
            if let Some(value) = form_value(self.request.body(), key) {
                return value;
            }
        }
        self.query(key)
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Runs the remainder of the chain starting at the cursor.
    ///
    /// Only the step at the cursor is invoked. That step continues the chain by
    /// calling `next` itself, so whatever it does after the call runs once every
    /// later step has returned. When the cursor is already past the end, for
    /// example after [`Context::abort`], this returns immediately.
    pub async fn next(&mut self) -> Result<(), HandlerError> {
        let Some(step) = self.chain.get(self.cursor).map(Arc::clone) else {
            return Ok(());
        };
        self.cursor += 1;
        log::trace!(
            "Request {} running step {} of {}: {}",
            self.id,
            self.cursor,
            self.chain.len(),
            step.name()
        );
        step.exec(self).await
    }

    /// Stops the chain and answers with `{"message": <message>}` and `code`.
    ///
    /// Anything already written to the response is discarded. Once aborted, later
    /// aborts and response writes are ignored. A `code` outside `100..=999` is
    /// answered with `500`.
    pub fn abort(&mut self, code: u16, message: &str) {
        if self.aborted {
            log::warn!("Request {} already aborted, ignoring abort with {code}", self.id);
            return;
        }
        let code = if Response::is_valid_status(code) {
            code
        } else {
            log::warn!("Request {} aborted with invalid status {code}, using 500", self.id);
            500
        };
        self.cursor = self.chain.len();
        self.response.reset();
        let body = match serde_json::to_vec(&MessageBody { message }) {
            Ok(body) => body,
            Err(err) => {
                log::error!("Failed to encode abort message for request {}: {err}", self.id);
                Vec::new()
            }
        };
        self.response.set_header("Content-Type", "application/json");
        self.response.write_status(code);
        self.response.write(&body);
        self.aborted = true;
    }

    /// Commits the response status. Invalid codes are ignored.
    pub fn status(&mut self, code: u16) {
        if self.aborted || self.response.is_committed() {
            log::warn!(
                "Request {} status {code} ignored, {} already written",
                self.id,
                self.response.status()
            );
        } else if !self.response.write_status(code) {
            log::warn!("Request {} status {code} ignored, not a valid status", self.id);
        }
    }

    /// Sets a response header. Ignored once the status is committed, or when the
    /// name or value could not be sent.
    pub fn set_header(&mut self, name: &str, value: &str) {
        if self.aborted || self.response.is_committed() {
            log::warn!("Request {} header '{name}' ignored, headers already sent", self.id);
        } else if !self.response.set_header(name, value) {
            log::warn!("Request {} header '{name}' ignored, invalid name or value", self.id);
        }
    }

    pub fn data(&mut self, code: u16, content_type: &str, data: &[u8]) {
        if self.aborted {
            log::warn!("Request {} is aborted, dropping {} bytes", self.id, data.len());
            return;
        }
        self.set_header("Content-Type", content_type);
        self.status(code);
        self.response.write(data);
    }

    pub fn string(&mut self, code: u16, text: impl Display) {
        self.data(code, "text/plain", text.to_string().as_bytes());
    }

    /// Serializes `value` as the JSON response body.
    ///
    /// The value is encoded before anything is written, so an encoding error leaves
    /// the response untouched.
    pub fn json<T>(&mut self, code: u16, value: &T) -> Result<(), HandlerError>
    where
        T: Serialize + ?Sized,
    {
        let body = serde_json::to_vec(value).map_err(HandlerError::encode)?;
        self.data(code, "application/json", &body);
        Ok(())
    }

    pub fn html(&mut self, code: u16, html: &str) {
        self.data(code, "text/html", html.as_bytes());
    }

    /// Stores a typed value under `key` for later steps of the chain.
    pub fn set<T>(&mut self, key: impl AsRef<str>, value: T)
    where
        T: Send + Sync + 'static,
    {
        self.extensions.insert(key, value);
    }

    pub fn get<T>(&self, key: impl AsRef<str>) -> Option<&T>
    where
        T: Send + Sync + 'static,
    {
        self.extensions.get(key)
    }

    pub fn get_mut<T>(&mut self, key: impl AsRef<str>) -> Option<&mut T>
    where
        T: Send + Sync + 'static,
    {
        self.extensions.get_mut(key)
    }
}

fn form_value(encoded: &[u8], key: &str) -> Option<String> {
    url::form_urlencoded::parse(encoded)
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.into_owned())
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ExtensionKey {
    name: String,
    type_id: TypeId,
}

impl ExtensionKey {
    fn of<T: 'static>(name: impl AsRef<str>) -> Self {
        Self {
            name: name.as_ref().to_string(),
            type_id: TypeId::of::<T>(),
        }
    }
}

/// Values keyed by name and type, so the same name can hold one value per type.
struct Extensions {
    values: HashMap<ExtensionKey, Box<dyn Any + Send + Sync>, fnv::FnvBuildHasher>,
}

impl Extensions {
    fn new() -> Self {
        Self {
            values: HashMap::with_hasher(fnv::FnvBuildHasher::default()),
        }
    }

    fn insert<T>(&mut self, name: impl AsRef<str>, value: T)
    where
        T: Send + Sync + 'static,
    {
        self.values.insert(ExtensionKey::of::<T>(name), Box::new(value));
    }

    fn get<T>(&self, name: impl AsRef<str>) -> Option<&T>
    where
        T: Send + Sync + 'static,
    {
        self.values
            .get(&ExtensionKey::of::<T>(name))
            .and_then(|value| value.downcast_ref::<T>())
    }

    fn get_mut<T>(&mut self, name: impl AsRef<str>) -> Option<&mut T>
    where
        T: Send + Sync + 'static,
    {
        self.values
            .get_mut(&ExtensionKey::of::<T>(name))
            .and_then(|value| value.downcast_mut::<T>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::handler_fn;

    fn record(ctx: &mut Context, entry: String) {
        if let Some(trace) = ctx.get_mut::<Vec<String>>("trace") {
            trace.push(entry);
        }
    }

    fn trace(ctx: &Context) -> Vec<String> {
        ctx.get::<Vec<String>>("trace").cloned().unwrap_or_default()
    }

    fn step(label: &'static str, call_next: bool) -> SharedHandler {
        Arc::new(handler_fn(move |ctx| {
            Box::pin(async move {
                record(ctx, format!("{label} in"));
                if call_next {
                    ctx.next().await?;
                }
                record(ctx, format!("{label} out"));
                Ok(())
            })
        }))
    }

    fn aborting(code: u16, message: &'static str) -> SharedHandler {
        Arc::new(handler_fn(move |ctx| {
            Box::pin(async move {
                record(ctx, format!("abort {code}"));
                ctx.abort(code, message);
                ctx.next().await
            })
        }))
    }

    fn context(chain: Vec<SharedHandler>) -> Context {
        let mut ctx = Context::new(Request::new("GET", "/"), chain);
        ctx.set("trace", Vec::<String>::new());
        ctx
    }

    #[tokio::test]
    async fn test_onion_order() {
        let mut ctx = context(vec![step("a", true), step("b", true), step("h", false)]);
        ctx.next().await.unwrap();
        assert_eq!(
            trace(&ctx),
            vec!["a in", "b in", "h in", "h out", "b out", "a out"]
        );
    }

    #[tokio::test]
    async fn test_step_without_next_stops_chain() {
        let mut ctx = context(vec![step("a", false), step("h", false)]);
        ctx.next().await.unwrap();
        assert_eq!(trace(&ctx), vec!["a in", "a out"]);
        assert!(!ctx.is_aborted());
    }

    #[tokio::test]
    async fn test_next_past_end_is_noop() {
        let mut ctx = context(Vec::new());
        ctx.next().await.unwrap();
        ctx.next().await.unwrap();
        assert!(trace(&ctx).is_empty());
        assert_eq!(ctx.response().status(), 200);
    }

    #[tokio::test]
    async fn test_abort_skips_remaining_steps() {
        let mut ctx = context(vec![step("a", true), aborting(401, "unauthorized"), step("h", false)]);
        ctx.next().await.unwrap();
        assert_eq!(trace(&ctx), vec!["a in", "abort 401", "a out"]);
        assert!(ctx.is_aborted());
        assert_eq!(ctx.response().status(), 401);
        assert_eq!(ctx.response().header("content-type"), Some("application/json"));
        assert_eq!(ctx.response().body_text(), r#"{"message":"unauthorized"}"#);
    }

    #[tokio::test]
    async fn test_abort_discards_earlier_output_and_later_writes() {
        let mut ctx = context(Vec::new());
        ctx.string(200, "partial");
        ctx.abort(403, "forbidden");
        ctx.string(200, "late");
        ctx.status(204);
        ctx.abort(500, "second");

        let response = ctx.into_response();
        assert_eq!(response.status(), 403);
        assert_eq!(response.body_text(), r#"{"message":"forbidden"}"#);
    }

    #[test]
    fn test_status_and_headers_commit_once() {
        let mut ctx = context(Vec::new());
        ctx.set_header("X-Request", "1");
        ctx.status(201);
        ctx.status(500);
        ctx.set_header("X-Late", "1");
        ctx.string(200, "created");

        let response = ctx.response();
        assert_eq!(response.status(), 201);
        assert_eq!(response.header("x-request"), Some("1"));
        assert_eq!(response.header("x-late"), None);
        assert_eq!(response.body(), b"created");
    }

    #[test]
    fn test_invalid_status_and_header_are_dropped() {
        let mut ctx = context(Vec::new());
        ctx.set_header("X-Split", "a\nb");
        ctx.status(1000);
        ctx.string(201, "created");
        assert_eq!(ctx.response().status(), 201);
        assert_eq!(ctx.response().header("x-split"), None);

        let mut ctx = context(Vec::new());
        ctx.abort(1000, "bad code");
        assert_eq!(ctx.response().status(), 500);
        assert_eq!(ctx.response().body_text(), r#"{"message":"bad code"}"#);
    }

    #[test]
    fn test_json_and_html() {
        #[derive(Serialize)]
        struct User {
            name: &'static str,
        }

        let mut ctx = context(Vec::new());
        ctx.json(200, &User { name: "jim" }).unwrap();
        assert_eq!(ctx.response().header("Content-Type"), Some("application/json"));
        assert_eq!(ctx.response().body_text(), r#"{"name":"jim"}"#);

        let mut ctx = context(Vec::new());
        ctx.html(200, "<h1>jim</h1>");
        assert_eq!(ctx.response().header("Content-Type"), Some("text/html"));
    }

    #[test]
    fn test_params_default_to_empty() {
        let mut ctx = context(Vec::new());
        let mut params = Params::default();
        params.insert("lang", "go");
        ctx.set_route("/p/:lang/doc", params);
        assert_eq!(ctx.param("lang"), "go");
        assert_eq!(ctx.param("missing"), "");
        assert_eq!(ctx.pattern(), Some("/p/:lang/doc"));
    }

    #[test]
    fn test_query_and_post_form() {
        let request = Request::new("POST", "/login?user=query&next=%2Fhome")
            .with_header("Content-Type", "application/x-www-form-urlencoded")
            .with_body("user=form+user&password=s3cret");
        let ctx = Context::new(request, Vec::new());

        assert_eq!(ctx.query("user"), "query");
        assert_eq!(ctx.query("next"), "/home");
        assert_eq!(ctx.query("missing"), "");
        assert_eq!(ctx.post_form("user"), "form user");
        assert_eq!(ctx.post_form("password"), "s3cret");
        assert_eq!(ctx.post_form("next"), "/home");
    }

    #[test]
    fn test_post_form_ignores_other_bodies() {
        let request = Request::new("POST", "/login")
            .with_header("Content-Type", "application/json")
            .with_body("user=form");
        let ctx = Context::new(request, Vec::new());
        assert_eq!(ctx.post_form("user"), "");
    }

    #[test]
    fn test_extensions_keyed_by_name_and_type() {
        let mut ctx = context(Vec::new());
        ctx.set("user", 7u32);
        ctx.set("user", String::from("jim"));

        assert_eq!(ctx.get::<u32>("user"), Some(&7));
        assert_eq!(ctx.get::<String>("user").map(String::as_str), Some("jim"));
        assert_eq!(ctx.get::<u64>("user"), None);

        if let Some(count) = ctx.get_mut::<u32>("user") {
            *count += 1;
        }
        assert_eq!(ctx.get::<u32>("user"), Some(&8));
    }

    #[test]
    fn test_ids_are_unique() {
        let first = context(Vec::new());
        let second = context(Vec::new());
        assert_ne!(first.id(), second.id());
    }
}
