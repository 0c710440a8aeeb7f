//! Integration tests for the interpreter client
//!
//! A small axum app stands in for the interpreter service and answers
//! `/chat` with a canned newline-delimited JSON body.

use std::sync::{Arc, Mutex};

use axum::{http::StatusCode, routing::post, Json, Router};
use futures_util::StreamExt;
use serde_json::Value;

use interpreter_relay::interpreter::{
    Chunk, Interpreter, InterpreterClient, InterpreterConfig, InterpreterError, TranscriptTarget,
    Turn,
};
use interpreter_relay::relay::TranscriptStore;

const TURN_BODY: &str = concat!(
    "{\"start_of_message\": true}\n",
    "{\"message\": \"Computing\"}\n",
    "{\"message\": \" now.\"}\n",
    "{\"end_of_message\": true}\n",
    "{\"language\": \"python\"}\n",
    "{\"code\": \"print(2 + 2)\"}\n",
    "{\"executing\": {\"code\": \"print(2 + 2)\", \"language\": \"python\"}}\n",
    "{\"active_line\": 1}\n",
    "{\"output\": \"4\\n\"}\n",
    "{\"active_line\": null}\n",
    "{\"end_of_execution\": true}\n",
    "{\"message\": \"It is 4.\"}",
);

/// Serve `status` + `body` on `/chat`, recording each request body
async fn spawn_fake_interpreter(
    status: StatusCode,
    body: &'static str,
) -> (String, Arc<Mutex<Vec<Value>>>) {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&requests);

    let app = Router::new().route(
        "/chat",
        post(move |Json(request): Json<Value>| {
            let recorded = Arc::clone(&recorded);
            async move {
                recorded.lock().unwrap().push(request);
                (status, body)
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), requests)
}

#[tokio::test]
async fn test_chat_streams_chunks_and_records_transcript() {
    let (base_url, requests) = spawn_fake_interpreter(StatusCode::OK, TURN_BODY).await;
    let dir = tempfile::tempdir().unwrap();
    let store = TranscriptStore::new(dir.path()).unwrap();
    let path = store.today_path();

    let mut client = InterpreterClient::new(InterpreterConfig {
        base_url,
        system_message: "Use ./workspace".to_string(),
        messages: vec![Turn::user("earlier"), Turn::assistant("noted")],
        transcript: Some(TranscriptTarget {
            store: store.clone(),
            path: path.clone(),
        }),
        ..InterpreterConfig::default()
    });

    let chunks: Vec<Chunk> = {
        let stream = client.chat("what is 2 + 2?").await.unwrap();
        stream.map(|c| c.unwrap()).collect().await
    };

    assert_eq!(chunks.len(), 12);
    assert_eq!(chunks[0], Chunk::StartOfMessage);
    assert_eq!(chunks[1], Chunk::Message("Computing".into()));
    assert_eq!(
        chunks[6],
        Chunk::Executing {
            code: "print(2 + 2)".into(),
            language: "python".into()
        }
    );
    assert_eq!(chunks[9], Chunk::ActiveLine(None));
    assert_eq!(chunks[11], Chunk::Message("It is 4.".into()));

    let request = requests.lock().unwrap()[0].clone();
    assert_eq!(request["message"], "what is 2 + 2?");
    assert_eq!(request["system_message"], "Use ./workspace");
    assert_eq!(request["auto_run"], true);
    assert_eq!(request["messages"].as_array().unwrap().len(), 2);

    let expected = vec![
        Turn::user("earlier"),
        Turn::assistant("noted"),
        Turn::user("what is 2 + 2?"),
        Turn::assistant("Computing now."),
        Turn::code("python", "print(2 + 2)"),
        Turn::console("4\n"),
        Turn::assistant("It is 4."),
    ];
    assert_eq!(client.messages(), expected.as_slice());
    assert_eq!(store.load(&path).unwrap(), expected);
}

#[tokio::test]
async fn test_malformed_chunk_stops_stream() {
    let body = "{\"message\": \"ok\"}\n{\"message\": 7}\n{\"message\": \"unreachable\"}\n";
    let (base_url, _) = spawn_fake_interpreter(StatusCode::OK, body).await;
    let mut client = InterpreterClient::new(InterpreterConfig {
        base_url,
        ..InterpreterConfig::default()
    });

    let items: Vec<_> = client.chat("hi").await.unwrap().collect().await;
    assert_eq!(items.len(), 2);
    assert!(matches!(items[0], Ok(Chunk::Message(_))));
    assert!(matches!(items[1], Err(InterpreterError::Chunk(_))));
    // The failed turn is not added to memory
    assert!(client.messages().is_empty());
}

#[tokio::test]
async fn test_http_error_status() {
    let (base_url, _) =
        spawn_fake_interpreter(StatusCode::INTERNAL_SERVER_ERROR, "model unavailable").await;
    let mut client = InterpreterClient::new(InterpreterConfig {
        base_url,
        ..InterpreterConfig::default()
    });

    match client.chat("hi").await {
        Err(InterpreterError::Status { status, body }) => {
            assert_eq!(status, 500);
            assert_eq!(body, "model unavailable");
        }
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("expected an HTTP status error"),
    };
}
