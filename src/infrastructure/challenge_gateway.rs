//! Gateway to the challenge web server
//!
//! Two calls: read the username off the landing page, and upload an image pair
//! to the login endpoint.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use std::path::Path;
use tracing::info;

use crate::infrastructure::config::ChallengeConfig;
use crate::infrastructure::error::{SolverError, SolverResult};
use crate::infrastructure::html_parser::{UsernameExtractor, UsernameExtractorConfig};
use crate::infrastructure::http_client::{HttpClient, HttpClientConfig};

#[async_trait]
pub trait ChallengeGateway: Send + Sync {
    /// Username the server currently expects
    async fn fetch_username(&self) -> SolverResult<String>;

    /// Upload both images and return the raw response body
    async fn submit(&self, first: &Path, second: &Path) -> SolverResult<String>;
}

pub struct HttpChallengeGateway {
    client: HttpClient,
    base_url: String,
    login_url: String,
    usernames: UsernameExtractor,
    first_field: String,
    second_field: String,
}

impl HttpChallengeGateway {
    pub fn new(config: &ChallengeConfig) -> SolverResult<Self> {
        let client = HttpClient::new(HttpClientConfig::from_challenge_config(config))?;
        Self::with_client(client, config)
    }

    pub fn with_client(client: HttpClient, config: &ChallengeConfig) -> SolverResult<Self> {
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            login_url: config.login_url()?,
            usernames: UsernameExtractor::new(UsernameExtractorConfig::from(config))?,
            first_field: config.first_upload_field.clone(),
            second_field: config.second_upload_field.clone(),
        })
    }

    #[must_use]
    pub fn login_url(&self) -> &str {
        &self.login_url
    }
}

async fn png_part(path: &Path) -> SolverResult<Part> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| SolverError::image_io(path, e))?;
    let file_name = path
        .file_name()
        .map_or_else(|| "image.png".to_string(), |n| n.to_string_lossy().into_owned());

    Part::bytes(bytes)
        .file_name(file_name)
        .mime_str("image/png")
        .map_err(|e| SolverError::image_io(path, e))
}

#[async_trait]
impl ChallengeGateway for HttpChallengeGateway {
    async fn fetch_username(&self) -> SolverResult<String> {
        let html = self.client.get_text(&self.base_url).await?;
        let username = self.usernames.extract(&html)?;
        info!("👤 Username: {}", username);
        Ok(username)
    }

    async fn submit(&self, first: &Path, second: &Path) -> SolverResult<String> {
        let form = Form::new()
            .part(self.first_field.clone(), png_part(first).await?)
            .part(self.second_field.clone(), png_part(second).await?);

        info!("📤 Submitting images to {}", self.login_url);
        self.client.post_multipart(&self.login_url, form).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_resolves_login_url() {
        let gateway = HttpChallengeGateway::new(&ChallengeConfig::default()).unwrap();
        assert!(gateway.login_url().ends_with("/login"));
    }

    #[test]
    fn test_gateway_rejects_bad_base_url() {
        let config = ChallengeConfig {
            base_url: "::nope::".to_string(),
            ..ChallengeConfig::default()
        };
        assert!(HttpChallengeGateway::new(&config).is_err());
    }

    #[tokio::test]
    async fn test_png_part_requires_file() {
        let err = png_part(Path::new("/missing/img1.png")).await.unwrap_err();
        assert!(matches!(err, SolverError::ImageIo { .. }));
    }

    #[tokio::test]
    async fn test_png_part_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("img1.png");
        std::fs::write(&path, b"\x89PNG").unwrap();
        assert!(png_part(&path).await.is_ok());
    }

    /// One request read off the wire
    struct Captured {
        request_line: String,
        head: String,
        body: Vec<u8>,
    }

    async fn read_request(stream: &mut tokio::net::TcpStream) -> Captured {
        use tokio::io::AsyncReadExt;

        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        let head_end = loop {
            let n = stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before headers");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
        let content_length = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .map_or(0, |(_, value)| value.trim().parse::<usize>().unwrap());
        let chunked = head.to_ascii_lowercase().contains("transfer-encoding: chunked");

        let done = |buf: &[u8]| {
            if chunked {
                buf[head_end..].ends_with(b"0\r\n\r\n")
            } else {
                buf.len() >= head_end + content_length
            }
        };
        while !done(&buf) {
            let n = stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before body");
            buf.extend_from_slice(&chunk[..n]);
        }

        Captured {
            request_line: head.lines().next().unwrap_or_default().to_string(),
            head,
            body: buf[head_end..].to_vec(),
        }
    }

    async fn respond(stream: &mut tokio::net::TcpStream, body: &str) {
        use tokio::io::AsyncWriteExt;

        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        stream.write_all(response.as_bytes()).await.unwrap();
        stream.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_fetch_and_submit_over_http() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let mut captured = Vec::new();
            let replies = [
                r#"<html><body><h4 class="text-warning"> user2623 </h4></body></html>"#,
                "<p>FCSC{0123456789abcdef}</p>",
            ];
            for reply in replies {
                let (mut stream, _) = listener.accept().await.unwrap();
                captured.push(read_request(&mut stream).await);
                respond(&mut stream, reply).await;
            }
            captured
        });

        let config = ChallengeConfig {
            base_url: format!("http://{addr}/"),
            ..ChallengeConfig::default()
        };
        let gateway = HttpChallengeGateway::new(&config).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("img1.png");
        let second = dir.path().join("img2.png");
        std::fs::write(&first, b"\x89PNG first").unwrap();
        std::fs::write(&second, b"\x89PNG second").unwrap();

        assert_eq!(gateway.fetch_username().await.unwrap(), "user2623");
        let body = gateway.submit(&first, &second).await.unwrap();
        assert!(body.contains("FCSC{0123456789abcdef}"));

        let captured = server.await.unwrap();
        assert!(captured[0].request_line.starts_with("GET / "));

        let post = &captured[1];
        assert!(post.request_line.starts_with("POST /login "));
        assert!(post.head.to_ascii_lowercase().contains("content-type: multipart/form-data"));
        let form = String::from_utf8_lossy(&post.body);
        assert!(form.contains(r#"name="upload1"; filename="img1.png""#));
        assert!(form.contains(r#"name="upload2"; filename="img2.png""#));
        assert_eq!(form.matches("Content-Type: image/png").count(), 2);
        assert!(form.contains("PNG first"));
        assert!(form.contains("PNG second"));
    }
}
