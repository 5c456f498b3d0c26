use prometheus::TEXT_FORMAT;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StatusCode {
    Ok = 200,
    BadRequest = 400,
    NotFound = 404,
    MethodNotAllowed = 405,
    InternalServerError = 500,
}

impl StatusCode {
    pub fn reason(self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::NotFound => "Not Found",
            StatusCode::MethodNotAllowed => "Method Not Allowed",
            StatusCode::InternalServerError => "Internal Server Error",
        }
    }
}

pub struct ResponseBuilder;

impl ResponseBuilder {
    pub fn build(status: StatusCode, content_type: &str, body: &[u8]) -> Vec<u8> {
        let head = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            status as u16,
            status.reason(),
            content_type,
            body.len()
        );

        let mut response = Vec::with_capacity(head.len() + body.len());
        response.extend_from_slice(head.as_bytes());
        response.extend_from_slice(body);
        response
    }

    pub fn build_metrics_response(exposition: String) -> Vec<u8> {
        Self::build(StatusCode::Ok, TEXT_FORMAT, exposition.as_bytes())
    }

    pub fn build_healthcheck_response() -> Vec<u8> {
        Self::build(StatusCode::Ok, "text/plain", b"Status: Healthy")
    }

    pub fn build_error_response(status: StatusCode) -> Vec<u8> {
        Self::build(status, "text/plain", status.reason().as_bytes())
    }
}
