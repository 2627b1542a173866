use super::AppState;
use crate::peer::Peer;
use actix_web::{get, post, web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
struct FindSuccessorBody {
    id: u64,
    requester: String,
}

#[derive(Serialize)]
struct SuccessorBody {
    successor_id: u64,
    successor_addr: String,
}

#[post("/chord/successor")]
pub async fn find_successor(state: web::Data<AppState>, body: web::Json<FindSuccessorBody>) -> impl Responder {
    let result = state
        .service
        .handle_find_successor_rpc(body.id, &body.requester)
        .await;
    HttpResponse::Ok().json(SuccessorBody {
        successor_id: result.id,
        successor_addr: result.address,
    })
}

#[derive(Serialize)]
struct PredecessorBody {
    predecessor_id: u64,
    predecessor_addr: String,
}

#[get("/chord/predecessor")]
pub async fn get_predecessor(state: web::Data<AppState>) -> impl Responder {
    match state.service.get_predecessor().await {
        Some(p) => HttpResponse::Ok().json(PredecessorBody {
            predecessor_id: p.id,
            predecessor_addr: p.address,
        }),
        None => HttpResponse::NoContent().finish(),
    }
}

#[derive(Deserialize)]
struct JoinBody {
    id: u64,
    address: String,
}

#[post("/chord/join")]
pub async fn join(state: web::Data<AppState>, body: web::Json<JoinBody>) -> impl Responder {
    match state
        .service
        .handle_join(Peer::new(body.id, body.address.clone()))
        .await
    {
        Ok(successor) => HttpResponse::Ok().json(SuccessorBody {
            successor_id: successor.id,
            successor_addr: successor.address,
        }),
        Err(e) => e.to_response(),
    }
}

#[derive(Deserialize)]
struct NotifyBody {
    predecessor_id: u64,
    predecessor_addr: String,
}

#[derive(Serialize)]
struct AckBody {
    message: &'static str,
}

#[post("/chord/notify")]
pub async fn notify(state: web::Data<AppState>, body: web::Json<NotifyBody>) -> impl Responder {
    state
        .service
        .handle_notify(Peer::new(body.predecessor_id, body.predecessor_addr.clone()))
        .await;
    HttpResponse::Ok().json(AckBody { message: "ACK" })
}

#[post("/chord/keepalive")]
pub async fn keepalive() -> impl Responder {
    HttpResponse::Ok().json(AckBody { message: "ACK" })
}

#[get("/chord/info")]
pub async fn info(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(state.service.info_snapshot().await)
}
