use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread;

use sparqled_eval::{Endpoint, EndpointConfig, EndpointError, HttpEndpoint, RdfValue};

/// Serve one request with a canned response; returns the raw request text.
fn serve_once(status: &'static str, body: &'static str) -> (String, thread::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = stream.read(&mut buf).expect("read");
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&request);
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if request.len() >= end + 4 + length {
                    break;
                }
            }
        }
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/sparql-results+json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(response.as_bytes()).expect("write");
        String::from_utf8_lossy(&request).into_owned()
    });
    (format!("http://{addr}/sparql"), handle)
}

fn endpoint(url: String) -> HttpEndpoint {
    HttpEndpoint::new(&EndpointConfig {
        url,
        timeout_secs: 10,
        ..EndpointConfig::default()
    })
    .expect("endpoint")
}

#[test]
fn posts_form_encoded_query_and_decodes_bindings() {
    let (url, server) = serve_once(
        "200 OK",
        r#"{"head":{"vars":["POF"]},"results":{"bindings":[{"POF":{"type":"uri","value":"http://ex.org/a"}}]}}"#,
    );
    let bindings = endpoint(url)
        .select("SELECT ?POF WHERE { ?s ?POF ?o }")
        .expect("select");
    assert_eq!(bindings.len(), 1);
    assert_eq!(bindings[0]["POF"], RdfValue::uri("http://ex.org/a"));

    let request = server.join().expect("server thread");
    assert!(request.starts_with("POST /sparql"));
    let lower = request.to_ascii_lowercase();
    assert!(lower.contains("accept: application/sparql-results+json"));
    assert!(lower.contains("content-type: application/x-www-form-urlencoded"));
    assert!(request.contains("query=SELECT+%3FPOF+WHERE"));
}

#[test]
fn http_errors_become_status_errors() {
    let (url, server) = serve_once("500 Internal Server Error", "boom");
    let err = endpoint(url).select("SELECT * WHERE { ?s ?p ?o }").unwrap_err();
    server.join().expect("server thread");
    match err {
        EndpointError::Status { status, body, .. } => {
            assert_eq!(status, 500);
            assert_eq!(body, "boom");
        }
        other => panic!("expected a status error, got {other:?}"),
    }
}

#[test]
fn malformed_results_are_decode_errors() {
    let (url, server) = serve_once("200 OK", "not json");
    let err = endpoint(url).select("SELECT * WHERE { ?s ?p ?o }").unwrap_err();
    server.join().expect("server thread");
    assert!(matches!(err, EndpointError::Decode { .. }));
    assert!(err.to_string().contains("line 1 column"), "{err}");
}
