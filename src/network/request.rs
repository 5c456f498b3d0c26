use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::{constants::MAX_REQUEST_SIZE, error::ServerError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
}

pub struct RequestParser;

impl RequestParser {
    /// Reads the request line and headers. Returns `None` on a clean EOF
    /// before any byte was received. Bodies are not read.
    pub async fn read_request<R>(reader: &mut R) -> Result<Option<HttpRequest>, ServerError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut consumed = 0;
        let request_line = match Self::read_line(reader, &mut consumed).await? {
            Some(line) => line,
            None => return Ok(None),
        };

        // skip headers up to the blank line
        loop {
            match Self::read_line(reader, &mut consumed).await? {
                Some(line) if line.is_empty() => break,
                Some(_) => continue,
                None => return Err(ServerError::MalformedRequest("unterminated headers".to_string())),
            }
        }

        Self::parse_request_line(&request_line).map(Some)
    }

    pub fn parse_request_line(line: &str) -> Result<HttpRequest, ServerError> {
        let mut parts = line.split_whitespace();
        let (method, target, version) = match (parts.next(), parts.next(), parts.next()) {
            (Some(m), Some(t), Some(v)) => (m, t, v),
            _ => return Err(ServerError::MalformedRequest(format!("bad request line '{}'", line))),
        };
        if parts.next().is_some() || !version.starts_with("HTTP/1.") {
            return Err(ServerError::MalformedRequest(format!("bad request line '{}'", line)));
        }

        // query strings are ignored
        let path = target.split('?').next().unwrap_or(target);

        Ok(HttpRequest {
            method: method.to_string(),
            path: path.to_string(),
        })
    }

    async fn read_line<R>(reader: &mut R, consumed: &mut usize) -> Result<Option<String>, ServerError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut buffer = Vec::new();
        let remaining = MAX_REQUEST_SIZE.saturating_sub(*consumed);
        let read = (&mut *reader)
            .take(remaining as u64 + 1)
            .read_until(b'\n', &mut buffer)
            .await?;
        if read == 0 {
            return Ok(None);
        }

        *consumed += read;
        if *consumed > MAX_REQUEST_SIZE {
            return Err(ServerError::RequestTooLarge(*consumed));
        }
        if buffer.last() != Some(&b'\n') {
            return Err(ServerError::MalformedRequest("unterminated line".to_string()));
        }

        let line = String::from_utf8(buffer)
            .map_err(|_| ServerError::MalformedRequest("non utf-8 request".to_string()))?;
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }
}
