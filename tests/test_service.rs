use hearth::http::request::{Method, Request, RequestBuilder};
use hearth::http::response::{Response, StatusCode};
use hearth::http::service::HttpService;

fn request(method: Method, path: &str) -> Request {
    RequestBuilder::new()
        .method(method)
        .path(path)
        .build()
        .unwrap()
}

#[test]
fn test_exact_route_match() {
    let service = HttpService::new();
    service.get("/users", |_req| Ok(Response::ok("users")));

    let handler = service.resolve(Method::GET, "/users").unwrap();
    let response = handler(&request(Method::GET, "/users")).unwrap();
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body.as_bytes(), b"users");
}

#[test]
fn test_route_is_method_specific() {
    let service = HttpService::new();
    service.route(Method::POST, "/users", |_req| Ok(Response::ok("created")));

    assert!(service.resolve(Method::POST, "/users").is_some());
    // No catch-all: a GET to the same path has no handler
    assert!(service.resolve(Method::GET, "/users").is_none());
}

#[test]
fn test_catch_all_receives_unmatched_requests() {
    let service = HttpService::new();
    service.get("/exact", |_req| Ok(Response::ok("exact")));
    service.set_catch_all(|req| Ok(Response::ok(format!("caught {}", req.path))));

    let handler = service.resolve(Method::GET, "/anything").unwrap();
    let response = handler(&request(Method::GET, "/anything")).unwrap();
    assert_eq!(response.body.as_bytes(), b"caught /anything");
}

#[test]
fn test_exact_route_takes_precedence_over_catch_all() {
    let service = HttpService::new();
    service.get("/exact", |_req| Ok(Response::ok("exact")));
    service.set_catch_all(|_req| Ok(Response::ok("catch-all")));

    let handler = service.resolve(Method::GET, "/exact").unwrap();
    let response = handler(&request(Method::GET, "/exact")).unwrap();
    assert_eq!(response.body.as_bytes(), b"exact");
}

#[test]
fn test_no_route_and_no_catch_all_resolves_nothing() {
    let service = HttpService::new();
    assert!(service.resolve(Method::GET, "/missing").is_none());
    assert!(!service.has_catch_all());
    assert_eq!(service.route_count(), 0);
}

#[test]
fn test_route_replacement_swaps_handler() {
    let service = HttpService::new();
    service.get("/x", |_req| Ok(Response::ok("old")));
    service.get("/x", |_req| Ok(Response::ok("new")));

    assert_eq!(service.route_count(), 1);
    let handler = service.resolve(Method::GET, "/x").unwrap();
    let response = handler(&request(Method::GET, "/x")).unwrap();
    assert_eq!(response.body.as_bytes(), b"new");
}

#[test]
fn test_registration_while_resolving_from_other_threads() {
    use std::sync::Arc;

    let service = Arc::new(HttpService::new());
    service.set_catch_all(|_req| Ok(Response::ok("v0")));

    let resolver = {
        let service = service.clone();
        std::thread::spawn(move || {
            // Dispatch never observes a partially updated table
            for _ in 0..1000 {
                let handler = service.resolve(Method::GET, "/p").unwrap();
                let response = handler(&request(Method::GET, "/p")).unwrap();
                assert_eq!(response.status, StatusCode::OK);
            }
        })
    };

    for i in 0..100 {
        let body = format!("v{i}");
        service.set_catch_all(move |_req| Ok(Response::ok(body.clone())));
        service.get(format!("/route-{i}"), |_req| Ok(Response::ok("r")));
    }

    resolver.join().unwrap();
    assert_eq!(service.route_count(), 100);
}
