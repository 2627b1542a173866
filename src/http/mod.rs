//! The boundary adapter: translates the external/peer HTTP+JSON surface
//! (spec §6) into `NodeService` calls. This is the only layer that formats
//! errors for the wire (spec §7: "the boundary adapter is the only layer
//! that formats errors for the external wire").

mod chord_routes;
mod file_routes;

use crate::error::Error;
use crate::service::NodeService;
use actix_web::{web, App, HttpServer};
use serde::Serialize;
use std::sync::Arc;

pub struct AppState {
    pub service: Arc<NodeService>,
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl Error {
    fn to_response(&self) -> actix_web::HttpResponse {
        let status = actix_web::http::StatusCode::from_u16(self.status_code())
            .unwrap_or(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR);
        actix_web::HttpResponse::build(status).json(ErrorBody {
            message: self.to_string(),
        })
    }
}

pub async fn serve(service: Arc<NodeService>, bind_address: &str) -> std::io::Result<()> {
    let state = web::Data::new(AppState { service });
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .service(chord_routes::find_successor)
            .service(chord_routes::get_predecessor)
            .service(chord_routes::join)
            .service(chord_routes::notify)
            .service(chord_routes::keepalive)
            .service(chord_routes::info)
            .service(file_routes::upload)
            .service(file_routes::download)
            .service(file_routes::delete)
            .service(file_routes::list)
            .service(file_routes::forward)
            .service(file_routes::transfer)
    })
    .bind(bind_address)?
    .run()
    .await
}
