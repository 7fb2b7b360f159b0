//! Canonicalizing redirect for discovery documents.
//!
//! Crawlers request the agent card under arbitrary base paths; any request
//! path that ends in a well-known document but is not the canonical path
//! 301-redirects to the canonical one, query string preserved.

use axum::{
    body::Body,
    extract::Request,
    http::{StatusCode, header::LOCATION},
    middleware::Next,
    response::{IntoResponse, Response},
};

const CANONICAL_PATHS: [&str; 2] = ["/.well-known/agent.json", "/.well-known/agent-card.json"];

pub(crate) fn redirect_target(path: &str, query: Option<&str>) -> Option<String> {
    for canonical in CANONICAL_PATHS {
        if path != canonical && path.ends_with(canonical) {
            return Some(match query {
                Some(q) => format!("{canonical}?{q}"),
                None => canonical.to_string(),
            });
        }
    }
    None
}

pub async fn well_known_redirect(request: Request, next: Next) -> Response {
    if let Some(location) = redirect_target(request.uri().path(), request.uri().query()) {
        return Response::builder()
            .status(StatusCode::MOVED_PERMANENTLY)
            .header(LOCATION, location)
            .body(Body::empty())
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response());
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_discovery_paths_redirect_with_query() {
        assert_eq!(
            redirect_target("/foo/bar/.well-known/agent.json", Some("source=crawler&v=1")),
            Some("/.well-known/agent.json?source=crawler&v=1".to_string())
        );
        assert_eq!(
            redirect_target("/x/.well-known/agent-card.json", None),
            Some("/.well-known/agent-card.json".to_string())
        );
    }

    #[test]
    fn canonical_and_unrelated_paths_pass_through() {
        assert_eq!(redirect_target("/.well-known/agent.json", Some("a=1")), None);
        assert_eq!(redirect_target("/.well-known/agent-card.json", None), None);
        assert_eq!(redirect_target("/x.well-known/agent.json", None), None);
        assert_eq!(redirect_target("/rag/search", None), None);
    }
}
