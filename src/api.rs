//! HTTP control surface for the scheduler: start, stop, status, queue,
//! and the processed-cache reset.

use actix_web::{web, HttpResponse, Responder};
use serde::Serialize;
use std::sync::Arc;

use crate::scheduler::{SchedulerError, TransactionScheduler};

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Serialize)]
struct ClearedResponse {
    cleared: usize,
}

fn scheduler_error_response(e: SchedulerError) -> HttpResponse {
    HttpResponse::Conflict().json(ErrorResponse {
        error: e.to_string(),
    })
}

async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn start(data: web::Data<Arc<TransactionScheduler>>) -> impl Responder {
    match data.start().await {
        Ok(()) => HttpResponse::Ok().json(data.status()),
        Err(e) => scheduler_error_response(e),
    }
}

async fn stop(data: web::Data<Arc<TransactionScheduler>>) -> impl Responder {
    match data.stop() {
        Ok(()) => HttpResponse::Ok().json(data.status()),
        Err(e) => scheduler_error_response(e),
    }
}

async fn status(data: web::Data<Arc<TransactionScheduler>>) -> impl Responder {
    HttpResponse::Ok().json(data.status())
}

async fn queue(data: web::Data<Arc<TransactionScheduler>>) -> impl Responder {
    HttpResponse::Ok().json(data.queue())
}

async fn clear_cache(data: web::Data<Arc<TransactionScheduler>>) -> impl Responder {
    HttpResponse::Ok().json(ClearedResponse {
        cleared: data.clear_processed_cache(),
    })
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/health").route(web::get().to(health_check)))
        .service(web::resource("/scheduler/start").route(web::post().to(start)))
        .service(web::resource("/scheduler/stop").route(web::post().to(stop)))
        .service(web::resource("/scheduler/status").route(web::get().to(status)))
        .service(web::resource("/scheduler/queue").route(web::get().to(queue)))
        .service(web::resource("/scheduler/cache/clear").route(web::post().to(clear_cache)));
}
