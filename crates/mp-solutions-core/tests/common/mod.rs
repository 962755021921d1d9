// Shared fixtures: a local asset origin and hand-encoded graph descriptors.
#![allow(dead_code)]

use std::collections::HashMap;
use std::net::TcpListener as StdTcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    extract::State,
    http::{StatusCode, Uri},
    response::IntoResponse,
    Router,
};

type Files = Arc<HashMap<String, Vec<u8>>>;

/// Static file server standing in for the remote asset store.
pub struct Origin {
    pub base_url: String,
    hits: Arc<AtomicUsize>,
}

impl Origin {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn serve_file(
    State((files, hits)): State<(Files, Arc<AtomicUsize>)>,
    uri: Uri,
) -> impl IntoResponse {
    hits.fetch_add(1, Ordering::SeqCst);
    match files.get(uri.path().trim_start_matches('/')) {
        Some(body) => (StatusCode::OK, body.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Serve `files` (logical path -> body) on a background runtime.
pub fn spawn_origin(files: &[(&str, &[u8])]) -> Origin {
    let files: Files = Arc::new(
        files
            .iter()
            .map(|(path, body)| (path.to_string(), body.to_vec()))
            .collect(),
    );
    let hits = Arc::new(AtomicUsize::new(0));

    let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let addr = listener.local_addr().unwrap();

    let state = (files, hits.clone());
    std::thread::spawn(move || {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async move {
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            let app = Router::new().fallback(serve_file).with_state(state);
            axum::serve(listener, app).await.unwrap();
        });
    });

    Origin {
        base_url: format!("http://{addr}/"),
        hits,
    }
}

/// Base URL of a port nothing listens on.
pub fn unreachable_origin() -> String {
    let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/")
}

fn varint(mut value: u64) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return out;
        }
        out.push(byte | 0x80);
    }
}

fn len_field(number: u32, payload: &[u8]) -> Vec<u8> {
    let mut out = varint(u64::from(number) << 3 | 2);
    out.extend(varint(payload.len() as u64));
    out.extend_from_slice(payload);
    out
}

fn node(calculator: &str, wiring: &[(u32, &str)]) -> Vec<u8> {
    let mut out = len_field(2, calculator.as_bytes());
    for (number, entry) in wiring {
        out.extend(len_field(*number, entry.as_bytes()));
    }
    len_field(1, &out)
}

/// Binary descriptor shaped like the desktop audio classification graph.
pub fn audio_classification_graph() -> Vec<u8> {
    [
        node(
            "AudioDecoderCalculator",
            &[
                (4, "AUDIO:audio_matrix"),
                (5, "INPUT_FILE_PATH:input_audio_wav_path"),
            ],
        ),
        node(
            "TfliteTaskAudioClassifierCalculator",
            &[
                (3, "DATA:audio_matrix"),
                (4, "CLASS:audio_class"),
                (5, "MODEL_PATH:yamnet_model_path"),
            ],
        ),
        len_field(15, b"audio_class"),
    ]
    .concat()
}
