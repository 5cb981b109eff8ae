//! Hook ordering and composition through a real client.

mod common;

use common::{client, MockTransport, Trace};
use plugfetch::{ErrorKind, ErrorOrigin, FnPlugin, Plugin, RequestError, RequestInit};
use serde_json::json;
use std::sync::Arc;

fn recorder(trace: &Trace, name: &str, priority: i32) -> Arc<dyn Plugin> {
    let t = trace.clone();
    let label = name.to_string();
    FnPlugin::new(name)
        .with_priority(priority)
        .before_request(move |cfg| {
            t.push(label.clone());
            Ok(cfg)
        })
        .build()
}

#[tokio::test]
async fn before_request_runs_in_priority_order() {
    let trace = Trace::default();
    let client = client(MockTransport::json(200, json!({})));
    client
        .use_plugin(recorder(&trace, "p5", 5))
        .use_plugin(recorder(&trace, "p1", 1))
        .use_plugin(recorder(&trace, "p3", 3));

    client.get("/x", RequestInit::new()).await.unwrap();
    assert_eq!(trace.take(), vec!["p1", "p3", "p5"]);
}

#[tokio::test]
async fn equal_priorities_keep_registration_order() {
    let trace = Trace::default();
    let client = client(MockTransport::json(200, json!({})));
    client
        .use_plugin(recorder(&trace, "first", 0))
        .use_plugin(recorder(&trace, "second", 0))
        .use_plugin(recorder(&trace, "early", -1));

    client.get("/x", RequestInit::new()).await.unwrap();
    assert_eq!(trace.take(), vec!["early", "first", "second"]);
}

#[tokio::test]
async fn duplicate_names_are_all_retained() {
    let trace = Trace::default();
    let client = client(MockTransport::json(200, json!({})));
    client
        .use_plugin(recorder(&trace, "auth", 0))
        .use_plugin(recorder(&trace, "auth", 0));

    client.get("/x", RequestInit::new()).await.unwrap();
    assert_eq!(trace.take(), vec!["auth", "auth"]);
    assert_eq!(client.plugins().len(), 2);
}

#[tokio::test]
async fn request_plugins_merge_into_the_order() {
    let trace = Trace::default();
    let client = client(MockTransport::json(200, json!({})));
    client
        .use_plugin(recorder(&trace, "shared-0", 0))
        .use_plugin(recorder(&trace, "shared-10", 10));

    client
        .get(
            "/x",
            RequestInit::new()
                .plugin(recorder(&trace, "scoped-5", 5))
                .plugin(recorder(&trace, "scoped-0", 0)),
        )
        .await
        .unwrap();
    assert_eq!(trace.take(), vec!["shared-0", "scoped-0", "scoped-5", "shared-10"]);
}

#[tokio::test]
async fn later_plugins_see_earlier_mutations() {
    let transport = MockTransport::json(200, json!({}));
    let client = client(transport.clone());
    client
        .use_plugin(
            FnPlugin::new("sign")
                .with_priority(10)
                .before_request(|mut cfg| {
                    let token = cfg.header("authorization").unwrap_or("none").to_string();
                    cfg.set_header("x-signature", &format!("signed({})", token))?;
                    Ok(cfg)
                })
                .build(),
        )
        .use_plugin(
            FnPlugin::new("auth")
                .before_request(|mut cfg| {
                    cfg.set_header("authorization", "Bearer t")?;
                    Ok(cfg)
                })
                .build(),
        );

    client.get("/x", RequestInit::new()).await.unwrap();
    let call = transport.last_call();
    assert_eq!(call.headers.get("x-signature").unwrap(), "signed(Bearer t)");
}

#[tokio::test]
async fn on_error_hooks_chain_in_order() {
    let trace = Trace::default();
    let (a, b) = (trace.clone(), trace.clone());
    let client = client(MockTransport::json(401, json!({"error": "expired"})));
    client
        .use_plugin(
            FnPlugin::new("second")
                .with_priority(1)
                .on_error(move |err, _| {
                    b.push(format!("second saw {}", err.name));
                    err
                })
                .build(),
        )
        .use_plugin(
            FnPlugin::new("first")
                .on_error(move |err, _| {
                    a.push(format!("first saw {}", err.name));
                    RequestError::custom("AuthExpired", "please sign in again", err.status)
                })
                .build(),
        );

    let err = client.get("/me", RequestInit::new()).await.unwrap_err();
    assert_eq!(err.name, "AuthExpired");
    assert_eq!(err.status, 401);
    assert_eq!(trace.take(), vec!["first saw FailRequest", "second saw AuthExpired"]);
}

#[tokio::test]
async fn failing_before_request_routes_to_error_path() {
    let transport = MockTransport::json(200, json!({}));
    let errors = Trace::default();
    let e = errors.clone();
    let client = client(transport.clone());
    client
        .use_plugin(
            FnPlugin::new("tagger")
                .before_request(|mut cfg| {
                    cfg.set_header("x-step", "tagged")?;
                    Ok(cfg)
                })
                .build(),
        )
        .use_plugin(
            FnPlugin::new("guard")
                .with_priority(5)
                .before_request(|_| Err(plugfetch::Error::plugin("guard", "blocked")))
                .on_error(move |err, cfg| {
                    e.push(cfg.header("x-step").unwrap_or("-").to_string());
                    err
                })
                .build(),
        );

    let err = client.get("/x", RequestInit::new()).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnknownError);
    assert_eq!(err.origin, ErrorOrigin::Plugin);
    assert!(err.message.contains("blocked"));
    // the error sees the configuration the failing hook received
    assert_eq!(errors.take(), vec!["tagged"]);
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn canonical_errors_from_hooks_skip_on_error() {
    let trace = Trace::default();
    let t = trace.clone();
    let client = client(MockTransport::json(200, json!({})));
    client.use_plugin(
        FnPlugin::new("reject")
            .before_request(|_| Err(RequestError::custom("Forbidden", "no", 403).into()))
            .on_error(move |err, _| {
                t.push("on_error");
                err
            })
            .build(),
    );

    let err = client.get("/x", RequestInit::new()).await.unwrap_err();
    assert_eq!((err.name.as_str(), err.status), ("Forbidden", 403));
    assert!(trace.take().is_empty());
}

#[tokio::test]
async fn every_hook_kind_fires_for_a_stream() {
    use futures::StreamExt;

    let trace = Trace::default();
    let (a, b, c) = (trace.clone(), trace.clone(), trace.clone());
    let client = client(MockTransport::chunks(vec!["one", "two"]));
    client.use_plugin(
        FnPlugin::new("all")
            .before_stream(move |body, _| {
                a.push("before_stream");
                Ok(body)
            })
            .transform_stream_chunk(move |chunk, _| {
                b.push("chunk");
                Ok(chunk)
            })
            .after_response(|_| panic!("streams skip after_response"))
            .on_finally(move |_| c.push("finally"))
            .build(),
    );

    let request = client.get("/s", RequestInit::new());
    let chunks: Vec<_> = request.stream().unwrap().collect().await;
    assert_eq!(chunks.len(), 2);
    assert_eq!(trace.take(), vec!["before_stream", "chunk", "chunk", "finally"]);
}
