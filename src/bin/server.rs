//! HTTP server for the assistant API.
//! Simple HTTP server using tokio and basic HTTP handling.

use coldchain_assistant::config::Settings;
use coldchain_assistant::conversation::{ConversationTurn, Role};
use coldchain_assistant::orchestrator::Orchestrator;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let settings = Settings::from_env();
    if settings.llm_api_key.is_some() {
        info!("LLM API key found - model-backed routing enabled");
    } else {
        info!("LLM API key not found - keyword routing and inline fallbacks");
    }
    if settings.warehouse_url.is_none() {
        info!("WAREHOUSE_URL not set - query execution will report the client as unconfigured");
    }

    let orchestrator = Arc::new(Orchestrator::from_settings(&settings));

    let listener = TcpListener::bind("0.0.0.0:8080").await?;
    info!("Server listening on http://localhost:8080");

    loop {
        let (stream, addr) = listener.accept().await?;
        info!("New connection from: {}", addr);
        let orchestrator = orchestrator.clone();
        tokio::spawn(handle_connection(stream, orchestrator));
    }
}

async fn handle_connection(mut stream: TcpStream, orchestrator: Arc<Orchestrator>) {
    match read_request(&mut stream).await {
        Ok(request) => {
            let response = handle_request(&request, &orchestrator).await;
            if let Err(e) = stream.write_all(response.as_bytes()).await {
                error!("Failed to write response: {}", e);
            }
        }
        Err(e) => {
            error!("Failed to read from stream: {}", e);
        }
    }
}

/// Read one request: headers first, then keep reading until Content-Length
/// bytes of body have arrived.
async fn read_request(stream: &mut TcpStream) -> std::io::Result<String> {
    let mut data = Vec::new();
    let mut buffer = [0u8; 4096];

    loop {
        let size = stream.read(&mut buffer).await?;
        if size == 0 {
            break;
        }
        data.extend_from_slice(&buffer[..size]);

        if let Some(header_end) = find_header_end(&data) {
            let headers = String::from_utf8_lossy(&data[..header_end]);
            let content_length = headers
                .lines()
                .find_map(|line| {
                    let (key, value) = line.split_once(':')?;
                    if key.trim().eq_ignore_ascii_case("content-length") {
                        value.trim().parse::<usize>().ok()
                    } else {
                        None
                    }
                })
                .unwrap_or(0);

            if data.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }

    Ok(String::from_utf8_lossy(&data).to_string())
}

fn find_header_end(data: &[u8]) -> Option<usize> {
    data.windows(4).position(|w| w == b"\r\n\r\n")
}

async fn handle_request(request: &str, orchestrator: &Orchestrator) -> String {
    let request_line = request.lines().next().unwrap_or("");
    let parts: Vec<&str> = request_line.split_whitespace().collect();
    if parts.len() < 2 {
        return create_response(400, "Bad Request", "{}");
    }

    let method = parts[0];
    let mut path = parts[1];
    if let Some(query_start) = path.find('?') {
        path = &path[..query_start];
    }
    let path = path.trim_end_matches('/');
    let path = if path.is_empty() { "/" } else { path };

    info!("Request: {} {}", method, path);

    match (method, path) {
        ("GET", "/api/health") => {
            create_response(200, "OK", r#"{"status":"ok","service":"coldchain-assistant-api"}"#)
        }
        ("POST", "/api/chat") => {
            let body_start = request.find("\r\n\r\n").map(|i| i + 4).unwrap_or(request.len());
            let body = request[body_start..].trim();

            let (question, history) = match parse_chat_request(body) {
                Ok(parsed) => parsed,
                Err(message) => {
                    return create_response(
                        400,
                        "Bad Request",
                        &serde_json::json!({ "error": message }).to_string(),
                    );
                }
            };

            let response = orchestrator.run(&question, &history).await;
            match serde_json::to_string(&response) {
                Ok(json) => create_response(200, "OK", &json),
                Err(e) => {
                    error!("Failed to serialize response: {}", e);
                    create_response(
                        500,
                        "Internal Server Error",
                        r#"{"error":"Failed to serialize response"}"#,
                    )
                }
            }
        }
        ("OPTIONS", _) => create_response(200, "OK", ""),
        _ => create_response(
            404,
            "Not Found",
            &format!(r#"{{"error":"Endpoint not found: {} {}"}}"#, method, path),
        ),
    }
}

/// Validate and split the inbound message list: the last turn must be from
/// the user and becomes the question; everything before it is the history
/// window. Caller-input errors come back as plain text for the 400 body.
fn parse_chat_request(body: &str) -> Result<(String, Vec<ConversationTurn>), String> {
    let json_start = body.find('{').ok_or("Request body must be JSON")?;
    let parsed: serde_json::Value =
        serde_json::from_str(&body[json_start..]).map_err(|_| "Request body must be JSON")?;

    let messages = parsed
        .get("messages")
        .and_then(|m| m.as_array())
        .ok_or("No messages provided")?;
    if messages.is_empty() {
        return Err("No messages provided".to_string());
    }

    let turns: Vec<ConversationTurn> = messages
        .iter()
        .map(|m| {
            let role = match m.get("role").and_then(|r| r.as_str()) {
                Some("user") => Role::User,
                Some("assistant") => Role::Assistant,
                _ => return Err("Message role must be 'user' or 'assistant'".to_string()),
            };
            let content = m
                .get("content")
                .and_then(|c| c.as_str())
                .ok_or("Message content must be a string")?
                .to_string();
            Ok(ConversationTurn { role, content })
        })
        .collect::<Result<_, String>>()?;

    let last = turns.last().expect("non-empty checked above");
    if last.role != Role::User {
        return Err("Last message must be from user".to_string());
    }

    let question = last.content.clone();
    let history = turns[..turns.len() - 1].to_vec();
    Ok((question, history))
}

fn create_response(status: u16, status_text: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {} {}\r\n\
         Content-Type: application/json\r\n\
         Access-Control-Allow-Origin: *\r\n\
         Access-Control-Allow-Methods: GET, POST, OPTIONS\r\n\
         Access-Control-Allow-Headers: Content-Type\r\n\
         Content-Length: {}\r\n\
         \r\n\
         {}",
        status,
        status_text,
        body.len(),
        body
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chat_request_splits_question_and_history() {
        let body = r#"{"messages":[
            {"role":"user","content":"안녕"},
            {"role":"assistant","content":"안녕하세요"},
            {"role":"user","content":"물동량 알려줘"}
        ]}"#;
        let (question, history) = parse_chat_request(body).unwrap();
        assert_eq!(question, "물동량 알려줘");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::User);
    }

    #[test]
    fn test_parse_chat_request_rejects_empty_messages() {
        assert_eq!(
            parse_chat_request(r#"{"messages":[]}"#).unwrap_err(),
            "No messages provided"
        );
        assert_eq!(
            parse_chat_request(r#"{}"#).unwrap_err(),
            "No messages provided"
        );
    }

    #[test]
    fn test_parse_chat_request_rejects_non_user_last_turn() {
        let body = r#"{"messages":[{"role":"assistant","content":"hi"}]}"#;
        assert_eq!(parse_chat_request(body).unwrap_err(), "Last message must be from user");
    }

    #[test]
    fn test_parse_chat_request_rejects_garbage() {
        assert!(parse_chat_request("not json").is_err());
        let body = r#"{"messages":[{"role":"robot","content":"hi"}]}"#;
        assert!(parse_chat_request(body).is_err());
    }

    #[test]
    fn test_find_header_end() {
        assert_eq!(find_header_end(b"GET / HTTP/1.1\r\n\r\nbody"), Some(14));
        assert_eq!(find_header_end(b"partial"), None);
    }
}
