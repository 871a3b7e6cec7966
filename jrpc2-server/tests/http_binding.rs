//! HTTP binding behavior: status codes, media-type gating, and the wire
//! documents produced for well-formed, malformed, and notification
//! requests.

use jrpc2_server::{from_method, http, Server};
use tokio::net::TcpListener;

const CONTENT_TYPE: &str = "application/json";

const SUM: &str = r#"{"jsonrpc":"2.0","id":0,"method":"Svc.Sum","params":[3,5]}"#;
const NOTIFY: &str = r#"{"jsonrpc":"2.0","method":"Svc.Sum","params":[3,5]}"#;
const SUM_REPLY: &str = r#"{"jsonrpc":"2.0","id":0,"result":8}"#;
const INVALID_REPLY: &str =
    r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32600,"message":"Invalid request"}}"#;
const PARSE_REPLY: &str =
    r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32700,"message":"Parse error"}}"#;

async fn start_server() -> String {
    let server = Server::new();
    server.register(
        "Svc.Sum",
        from_method(|vals: [i64; 2]| async move { Ok(vals[0] + vals[1]) }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = http::serve(listener, server).await;
    });
    format!("http://{addr}/")
}

struct Case {
    method: &'static str,
    content_type: &'static str,
    accept: &'static str,
    body: &'static str,
    status: u16,
    reply: &'static str,
}

#[tokio::test]
async fn status_and_reply_table() {
    let url = start_server().await;
    let client = reqwest::Client::new();

    let cases = [
        Case { method: "GET", content_type: "", accept: "", body: "", status: 405, reply: "" },
        Case { method: "POST", content_type: CONTENT_TYPE, accept: "", body: SUM, status: 415, reply: "" },
        Case { method: "POST", content_type: "text/json", accept: CONTENT_TYPE, body: SUM, status: 415, reply: "" },
        Case { method: "PUT", content_type: CONTENT_TYPE, accept: CONTENT_TYPE, body: SUM, status: 405, reply: "" },
        Case { method: "POST", content_type: CONTENT_TYPE, accept: CONTENT_TYPE, body: NOTIFY, status: 204, reply: "" },
        Case { method: "POST", content_type: CONTENT_TYPE, accept: CONTENT_TYPE, body: SUM, status: 200, reply: SUM_REPLY },
        Case { method: "POST", content_type: CONTENT_TYPE, accept: CONTENT_TYPE, body: "{}", status: 200, reply: INVALID_REPLY },
        Case { method: "POST", content_type: CONTENT_TYPE, accept: CONTENT_TYPE, body: "", status: 200, reply: PARSE_REPLY },
        Case { method: "POST", content_type: CONTENT_TYPE, accept: CONTENT_TYPE, body: " ", status: 200, reply: PARSE_REPLY },
        Case { method: "POST", content_type: CONTENT_TYPE, accept: CONTENT_TYPE, body: "{", status: 200, reply: PARSE_REPLY },
        Case {
            method: "POST",
            content_type: CONTENT_TYPE,
            accept: CONTENT_TYPE,
            body: r#"{"jsonrpc":"2.0","#,
            status: 200,
            reply: PARSE_REPLY,
        },
        Case {
            method: "POST",
            content_type: "application/json; charset=utf-8",
            accept: CONTENT_TYPE,
            body: SUM,
            status: 200,
            reply: SUM_REPLY,
        },
    ];

    for case in cases {
        let mut req = match case.method {
            "GET" => client.get(&url),
            "PUT" => client.put(&url),
            _ => client.post(&url),
        };
        if !case.content_type.is_empty() {
            req = req.header("Content-Type", case.content_type);
        }
        if !case.accept.is_empty() {
            req = req.header("Accept", case.accept);
        }
        let resp = req.body(case.body).send().await.unwrap();

        let label = format!("{} ct={:?} body={:?}", case.method, case.content_type, case.body);
        assert_eq!(resp.status().as_u16(), case.status, "{label}");
        assert_eq!(
            resp.headers().get("Content-Type").unwrap(),
            CONTENT_TYPE,
            "{label}"
        );

        let got = resp.text().await.unwrap();
        if case.reply.is_empty() {
            assert!(got.is_empty(), "{label}: unexpected body {got:?}");
        } else {
            let got: serde_json::Value = serde_json::from_str(&got).unwrap();
            let want: serde_json::Value = serde_json::from_str(case.reply).unwrap();
            assert_eq!(got, want, "{label}");
        }
    }
}

#[tokio::test]
async fn batch_over_http() {
    let url = start_server().await;
    let client = reqwest::Client::new();

    let batch = r#"[{"jsonrpc":"2.0","id":1,"method":"Svc.Sum","params":[1,2]},
                    {"jsonrpc":"2.0","method":"Svc.Sum","params":[3,4]},
                    {"jsonrpc":"2.0","id":2,"method":"Svc.Sum","params":[5,6]}]"#;
    let resp = client
        .post(&url)
        .header("Content-Type", CONTENT_TYPE)
        .header("Accept", CONTENT_TYPE)
        .body(batch)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let got: serde_json::Value = serde_json::from_str(&resp.text().await.unwrap()).unwrap();
    assert_eq!(
        got,
        serde_json::json!([
            {"jsonrpc": "2.0", "id": 1, "result": 3},
            {"jsonrpc": "2.0", "id": 2, "result": 11},
        ])
    );
}

#[tokio::test]
async fn all_notification_batch_is_no_content() {
    let url = start_server().await;
    let client = reqwest::Client::new();

    let batch = r#"[{"jsonrpc":"2.0","method":"Svc.Sum","params":[1,2]}]"#;
    let resp = client
        .post(&url)
        .header("Content-Type", CONTENT_TYPE)
        .header("Accept", CONTENT_TYPE)
        .body(batch)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 204);
    assert!(resp.text().await.unwrap().is_empty());
}

#[tokio::test]
async fn string_and_null_ids_echo_verbatim() {
    let url = start_server().await;
    let client = reqwest::Client::new();

    for (body, id) in [
        (
            r#"{"jsonrpc":"2.0","id":"k-1","method":"Svc.Sum","params":[2,2]}"#,
            serde_json::json!("k-1"),
        ),
        (
            r#"{"jsonrpc":"2.0","id":null,"method":"Svc.Sum","params":[2,2]}"#,
            serde_json::Value::Null,
        ),
    ] {
        let resp = client
            .post(&url)
            .header("Content-Type", CONTENT_TYPE)
            .header("Accept", CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200);
        let got: serde_json::Value = serde_json::from_str(&resp.text().await.unwrap()).unwrap();
        assert_eq!(got["id"], id);
        assert_eq!(got["result"], 4);
    }
}
