use bytes::Bytes;
use http::Request;
use http::header::{ACCEPT, ACCEPT_CHARSET, CONTENT_TYPE};
use http_body_util::Full;
use micro_mediatype::{ContentError, ContentHandler, ContentSettings, EncodeError, Value};
use serde::{Deserialize, Serialize};
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

#[derive(Debug, Serialize, Deserialize)]
struct User {
    name: String,
    zip: String,
}

// renders a flat map as a single csv line, keys sorted
fn dump_csv(value: &Value) -> Result<String, EncodeError> {
    let map = value.as_map().ok_or_else(|| EncodeError::unsupported_value(value.kind(), "csv"))?;
    let fields = map
        .values()
        .map(|field| match field.as_array() {
            Some(items) => items.iter().filter_map(Value::as_str).collect::<Vec<_>>().join(";"),
            None => field.as_str().unwrap_or_default().to_string(),
        })
        .map(|field| field.replace(',', " "))
        .collect::<Vec<_>>();
    Ok(fields.join(","))
}

fn settings() -> Result<ContentSettings, ContentError> {
    let mut settings = ContentSettings::standard()?;
    settings.add_text_content_type("text/csv", Some("utf-8"), dump_csv, |text: &str| Ok(Value::from(text)))?;
    Ok(settings)
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::TRACE).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let handler = match settings() {
        Ok(settings) => ContentHandler::new(settings),
        Err(e) => {
            error!(cause = %e, "invalid content settings");
            return;
        }
    };

    // curl -H 'Content-Type: application/x-www-form-urlencoded' -H 'Accept: text/csv, */*;q=0.1' -d 'name=hello&zip=world'
    let request = Request::builder()
        .method("POST")
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header(ACCEPT, "text/csv, */*;q=0.1")
        .body(Full::new(Bytes::from_static(b"name=hello&zip=world")))
        .expect("valid request");
    let headers = request.headers().clone();

    let value = match handler.read_request(request).await {
        Ok(value) => value,
        Err(e) => {
            error!(cause = %e, status = %e.status_code(), "failed to read request");
            return;
        }
    };
    info!(value = ?value, "decoded form body");

    match handler.send_response(&headers, &value) {
        Ok(response) => info!(headers = ?response.headers(), body = ?response.body(), "csv response"),
        Err(e) => error!(cause = %e, "failed to send response"),
    }

    let mut accept_latin1 = headers.clone();
    accept_latin1.insert(ACCEPT, "application/json".parse().expect("valid header"));
    accept_latin1.insert(ACCEPT_CHARSET, "iso-8859-1, utf-8;q=0.5".parse().expect("valid header"));
    let user = User { name: "José".into(), zip: "12345".into() };
    match Value::from_serialize(&user).map_err(ContentError::from).and_then(|value| handler.send_response(&accept_latin1, &value)) {
        Ok(response) => info!(headers = ?response.headers(), body = ?response.body(), "latin1 json response"),
        Err(e) => error!(cause = %e, "failed to send response"),
    }

    match handler.decode_typed::<User>(Some("application/xml"), b"<user/>") {
        Ok(user) => info!(user = ?user, "unexpected success"),
        Err(e) => {
            let response = e.into_response();
            info!(status = %response.status(), body = ?response.body(), "rejected unsupported media type");
        }
    }
}
