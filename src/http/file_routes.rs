use super::AppState;
use crate::error::Error;
use crate::storage::sanitize_filename;
use crate::transport::encode_transfer;
use actix_multipart::Multipart;
use actix_web::{delete, get, post, web, HttpResponse, Responder};
use bytes::{Bytes, BytesMut};
use futures::{StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};

async fn read_multipart_file(mut payload: Multipart) -> Result<(String, Bytes), Error> {
    let mut field = payload
        .try_next()
        .await
        .map_err(|e| Error::InvalidArgument(format!("malformed multipart body: {e}")))?
        .ok_or_else(|| Error::InvalidArgument("multipart body has no file part".into()))?;

    let name = field
        .content_disposition()
        .and_then(|cd| cd.get_filename())
        .ok_or_else(|| Error::InvalidArgument("multipart part has no filename".into()))?
        .to_string();

    let mut data = BytesMut::new();
    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(|e| Error::InvalidArgument(format!("malformed multipart chunk: {e}")))?;
        data.extend_from_slice(&chunk);
    }

    Ok((name, data.freeze()))
}

#[derive(Serialize)]
struct MessageBody {
    message: String,
}

#[post("/files")]
pub async fn upload(state: web::Data<AppState>, payload: Multipart) -> impl Responder {
    let (name, bytes) = match read_multipart_file(payload).await {
        Ok(v) => v,
        Err(e) => return e.to_response(),
    };
    if let Err(e) = sanitize_filename(&name) {
        return e.to_response();
    }
    match state.service.save_file(&name, bytes).await {
        Ok(()) => HttpResponse::Ok().json(MessageBody {
            message: "File uploaded successfully.".to_string(),
        }),
        Err(e) => e.to_response(),
    }
}

#[get("/files/{name}")]
pub async fn download(state: web::Data<AppState>, name: web::Path<String>) -> impl Responder {
    let name = name.into_inner();
    if let Err(e) = sanitize_filename(&name) {
        return e.to_response();
    }
    match state.service.get_file(&name).await {
        Ok(bytes) => HttpResponse::Ok().body(bytes),
        Err(e) => e.to_response(),
    }
}

#[delete("/files/{name}")]
pub async fn delete(state: web::Data<AppState>, name: web::Path<String>) -> impl Responder {
    let name = name.into_inner();
    if let Err(e) = sanitize_filename(&name) {
        return e.to_response();
    }
    match state.service.delete_file(&name).await {
        Ok(true) => HttpResponse::Ok().json(MessageBody {
            message: "File deleted successfully.".to_string(),
        }),
        Ok(false) => Error::NotFound(name).to_response(),
        Err(e) => e.to_response(),
    }
}

#[derive(Serialize)]
struct FilesBody {
    files: Vec<String>,
}

#[get("/files")]
pub async fn list(state: web::Data<AppState>) -> impl Responder {
    match state.service.list_files().await {
        Ok(files) => HttpResponse::Ok().json(FilesBody { files }),
        Err(e) => e.to_response(),
    }
}

/// Peer-to-peer: another node forwards a file it determined we own. Saved
/// directly, without re-checking responsibility (spec §4.6.7).
#[post("/files/forward")]
pub async fn forward(state: web::Data<AppState>, payload: Multipart) -> impl Responder {
    let (name, bytes) = match read_multipart_file(payload).await {
        Ok(v) => v,
        Err(e) => return e.to_response(),
    };
    if let Err(e) = sanitize_filename(&name) {
        return e.to_response();
    }
    match state.service.storage_save_direct(&name, bytes).await {
        Ok(()) => HttpResponse::Ok().json(MessageBody {
            message: "ACK".to_string(),
        }),
        Err(e) => e.to_response(),
    }
}

#[derive(Deserialize)]
struct TransferBody {
    lo: u64,
    hi: u64,
}

/// Peer-to-peer: a newly joined (or otherwise new-predecessor) node pulling
/// the keys it now owns. The scanned files are deleted locally once the
/// response has been built successfully — that completion is the
/// acknowledgment spec §4.6.4 asks for; there is no separate ack RPC.
#[post("/files/transfer")]
pub async fn transfer(state: web::Data<AppState>, body: web::Json<TransferBody>) -> impl Responder {
    match state.service.scan_range(body.lo, body.hi).await {
        Ok(files) => {
            let names: Vec<String> = files.iter().map(|(n, _)| n.clone()).collect();
            let envelope = encode_transfer(files);
            if let Err(e) = state.service.remove_transferred(&names).await {
                return e.to_response();
            }
            HttpResponse::Ok().json(envelope)
        }
        Err(e) => e.to_response(),
    }
}
