use std::fs;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::thread;

fn sparqled() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_sparqled"));
    cmd.env_remove("SPARQLED_ENDPOINT")
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1");
    cmd
}

fn run_with_stdin(mut cmd: Command, stdin: &str) -> Output {
    let mut child = cmd
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn sparqled");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(stdin.as_bytes())
        .expect("write stdin");
    child.wait_with_output().expect("wait")
}

fn write(dir: &Path, name: &str, text: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, text).expect("write file");
    path
}

/// Answer one SPARQL request per body, in order; returns the request texts.
fn serve(bodies: Vec<&'static str>) -> (String, thread::JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let handle = thread::spawn(move || {
        let mut requests = Vec::new();
        for body in bodies {
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
                "HTTP/1.1 200 OK\r\nContent-Type: application/sparql-results+json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).expect("write");
            requests.push(String::from_utf8_lossy(&request).into_owned());
        }
        requests
    });
    (format!("http://{addr}/sparql"), handle)
}

#[test]
fn recommend_reads_query_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let query = write(
        dir.path(),
        "q.rq",
        "SELECT * WHERE { ?s a <http://ex.org/Person> ; < }",
    );

    let output = sparqled()
        .arg("recommend")
        .arg(&query)
        .output()
        .expect("run sparqled");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Recommendation PREDICATE"));
    assert!(stdout.contains("SELECT DISTINCT ?POF"));
    assert!(stdout.contains("?s a <http://ex.org/Person> ."));
    assert!(stdout.contains("?s ?POF ?FillVar ."));
}

#[test]
fn recommend_reads_stdin_and_prints_json() {
    let mut cmd = sparqled();
    cmd.args(["recommend", "--json"]);
    let output = run_with_stdin(cmd, "SELECT * WHERE { ?s a < }");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json output");
    assert_eq!(value["kind"], "CLASS");
    let query = value["query"].as_str().expect("query string");
    assert!(query.contains("?s a ?POF ."));
}

#[test]
fn recommend_uses_template_from_config() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(
        dir.path(),
        "short.hbs",
        "SELECT {{pof}} WHERE { {{#each tps}}{{s}} {{p}} {{o}} .{{/each}} }",
    );
    let config = write(dir.path(), "sparqled.json", r#"{ "template": "short.hbs" }"#);
    let query = write(dir.path(), "q.rq", "SELECT * WHERE { ?s a < }");

    let output = sparqled()
        .arg("--config")
        .arg(&config)
        .args(["recommend", "--json"])
        .arg(&query)
        .output()
        .expect("run sparqled");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json output");
    assert_eq!(value["query"], "SELECT ?POF WHERE { ?s a ?POF . }");
}

#[test]
fn parse_errors_fail_with_position() {
    let mut cmd = sparqled();
    cmd.arg("recommend");
    let output = run_with_stdin(cmd, "SELECT * WHERE {\n  ?s <p> }");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("line 2"), "stderr: {stderr}");
}

#[test]
fn measure_reports_popularity() {
    let (url, server) = serve(vec![
        r#"{"head":{"vars":["POF","count"]},"results":{"bindings":[
            {"POF":{"type":"uri","value":"http://ex.org/Person"},"count":{"type":"typed-literal","value":"3","datatype":"http://www.w3.org/2001/XMLSchema#integer"}},
            {"POF":{"type":"uri","value":"http://ex.org/Place"},"count":{"type":"typed-literal","value":"5","datatype":"http://www.w3.org/2001/XMLSchema#integer"}}
        ]}}"#,
        r#"{"head":{"vars":["POF","count"]},"results":{"bindings":[
            {"POF":{"type":"uri","value":"http://ex.org/Place"},"count":{"type":"literal","value":"7"}},
            {"POF":{"type":"uri","value":"http://ex.org/Person"},"count":{"type":"literal","value":"2"}}
        ]}}"#,
    ]);

    let mut cmd = sparqled();
    cmd.env("SPARQLED_ENDPOINT", &url)
        .args(["measure", "--json", "--graph", "http://ex.org/g"]);
    let output = run_with_stdin(cmd, "SELECT * WHERE { ?s a < }");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json output");
    assert_eq!(value["outcome"], "ranked");
    assert_eq!(value["kind"], "CLASS");
    assert_eq!(value["min"], 2);
    assert_eq!(value["max"], 7);
    assert_eq!(value["top"][0]["value"]["value"], "http://ex.org/Place");
    assert_eq!(value["top"][0]["count"], 5);

    let requests = server.join().expect("server thread");
    assert_eq!(requests.len(), 2);
    assert!(requests[1].contains("FROM+%3Chttp%3A%2F%2Fex.org%2Fg%3E"));
}

#[test]
fn measure_rejects_non_http_endpoint() {
    let mut cmd = sparqled();
    cmd.args(["measure", "--endpoint", "ftp://example.org/sparql"]);
    let output = run_with_stdin(cmd, "SELECT * WHERE { ?s a < }");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unsupported scheme"), "stderr: {stderr}");
}
