//! Loading-state adapters driving requests through a client.

mod common;

use common::{client, Counter, MockTransport, Trace};
use plugfetch::adapters::{SignalAdapter, WatchAdapter};
use plugfetch::plugins::Plugin;
use plugfetch::{ErrorKind, Request, RequestInit};
use serde_json::json;
use std::sync::Arc;

fn user_factory(
    client: plugfetch::Client,
) -> impl Fn(u32, Vec<Arc<dyn Plugin>>) -> Request {
    move |id, plugins| {
        let mut init = RequestInit::new();
        init.plugins = plugins;
        client.get(format!("/users/{}", id), init)
    }
}

#[tokio::test]
async fn loading_follows_the_request() {
    let transport = MockTransport::json(200, json!({"id": 1}));
    let users = WatchAdapter::watch(user_factory(client(transport.clone())));
    let mut rx = users.state().subscribe();

    let call = users.run(1);
    assert!(call.loading());
    assert!(*rx.borrow_and_update());

    assert_eq!(call.json().await.unwrap(), json!({"id": 1}));
    assert!(!users.loading());
    assert!(rx.has_changed().unwrap());
    assert!(!*rx.borrow_and_update());
    assert!(transport.last_call().url.ends_with("/users/1"));
}

#[tokio::test]
async fn cancel_clears_loading_without_reporting() {
    let reported = Counter::default();
    let hits = reported.clone();
    let users = WatchAdapter::watch(user_factory(client(MockTransport::pending())))
        .on_error(move |_| hits.hit());

    let call = users.run(7);
    call.cancel();
    assert!(!users.loading());

    let err = call.json().await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Aborted);
    assert_eq!(reported.get(), 0);
    assert!(!users.loading());
}

#[tokio::test]
async fn failures_reach_the_error_callback() {
    let names = Trace::default();
    let sink = names.clone();
    let users = WatchAdapter::watch(user_factory(client(MockTransport::json(500, json!({})))))
        .on_error(move |e| sink.push(e.name.clone()));

    let err = users.run(1).await.unwrap_err();
    assert_eq!(err.status, 500);
    assert_eq!(names.take(), vec!["FailRequest"]);
    assert!(!users.loading());
}

#[tokio::test]
async fn signal_subscribers_see_each_transition() {
    let transitions = Trace::default();
    let sink = transitions.clone();
    let users = SignalAdapter::signal(user_factory(client(MockTransport::json(200, json!([])))));
    users.state().subscribe(move |loading: &bool| sink.push(loading.to_string()));

    let call = users.run(3);
    assert!(*users.state().get());
    call.text().await.unwrap();

    assert_eq!(transitions.take(), vec!["true", "false"]);
}

#[tokio::test]
async fn each_run_is_an_independent_request() {
    let transport = MockTransport::json(200, json!("ok"));
    let users = SignalAdapter::signal(user_factory(client(transport.clone())));

    let a = users.run(1);
    let b = users.run(2);
    assert_ne!(a.request().id(), b.request().id());
    a.json().await.unwrap();
    b.json().await.unwrap();

    let urls: Vec<String> = transport.calls().into_iter().map(|c| c.url).collect();
    assert_eq!(urls.len(), 2);
    assert!(urls.iter().any(|u| u.ends_with("/users/1")));
    assert!(urls.iter().any(|u| u.ends_with("/users/2")));
}

#[tokio::test]
async fn overlapping_runs_keep_loading_until_the_last_settles() {
    let users = WatchAdapter::watch(user_factory(client(MockTransport::json(200, json!("ok")))));

    let first = users.run(1);
    let second = users.run(2);
    first.json().await.unwrap();
    assert!(users.loading());

    // finalizing again must not release the other run
    first.json().await.unwrap();
    assert!(users.loading());

    second.json().await.unwrap();
    assert!(!users.loading());
}

#[tokio::test]
async fn cancelling_one_run_leaves_the_other_loading() {
    let users = WatchAdapter::watch(user_factory(client(MockTransport::pending())));

    let first = users.run(1);
    let second = users.run(2);
    first.cancel();
    assert!(users.loading());
    assert_eq!(first.json().await.unwrap_err().kind, ErrorKind::Aborted);
    assert!(users.loading());

    second.cancel();
    assert!(!users.loading());
}
