//! Adapters that turn server-specific requests into [`crate::Request`] and back.

#[cfg(feature = "hyper")]
pub mod hyper {
    use crate::request::Request;
    use crate::router::Engine;
    use ::hyper::StatusCode;
    use ::hyper::body::{Body, Bytes};
    use http_body_util::{BodyExt, Full};
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum AdapterError {
        #[error("Failed to read request body. {message}")]
        Body { message: String },
    }

    impl AdapterError {
        #[inline]
        pub(crate) fn body(msg: impl Into<String>) -> Self {
            Self::Body {
                message: msg.into(),
            }
        }
    }

    /// Serves a hyper request through `engine`.
    ///
    /// The body is collected in full before dispatch. Header values that are not
    /// visible ASCII are dropped. If hyper rejects the engine's response, the
    /// client gets a plain `500` instead.
    ///
    /// ```rust,ignore
    /// let engine = Arc::new(engine);
    /// let service = service_fn(move |req| {
    ///     let engine = Arc::clone(&engine);
    ///     async move { serve_hyper(&engine, req).await }
    /// });
    /// ```
    pub async fn serve_hyper<B>(
        engine: &Engine,
        request: ::hyper::Request<B>,
    ) -> Result<::hyper::Response<Full<Bytes>>, AdapterError>
    where
        B: Body + Send,
        B::Data: Send,
        B::Error: std::fmt::Display,
    {
        let (parts, body) = request.into_parts();
        let body = body
            .collect()
            .await
            .map_err(|e| AdapterError::body(e.to_string()))?
            .to_bytes();

        let target = parts
            .uri
            .path_and_query()
            .map(|path_and_query| path_and_query.as_str())
            .unwrap_or_else(|| parts.uri.path());
        let mut request = Request::new(parts.method.as_str(), target);
        for (name, value) in parts.headers.iter() {
            match value.to_str() {
                Ok(value) => request = request.with_header(name.as_str(), value),
                Err(_) => log::debug!("Dropping non-ascii header '{}'", name.as_str()),
            }
        }
        let request = request.with_body(body.to_vec());

        let (status, headers, body) = engine.serve(request).await.into_parts();
        let mut builder = ::hyper::Response::builder().status(status);
        for (name, value) in headers {
            builder = builder.header(name, value);
        }
        match builder.body(Full::new(Bytes::from(body))) {
            Ok(response) => Ok(response),
            Err(err) => {
                log::error!("Failed to build response, answering 500: {err}");
                Ok(internal_server_error())
            }
        }
    }

    fn internal_server_error() -> ::hyper::Response<Full<Bytes>> {
        let mut response =
            ::hyper::Response::new(Full::new(Bytes::from_static(b"Internal Server Error\n")));
        *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        response
    }

}
