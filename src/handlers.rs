use actix_web::{web, HttpResponse, Responder};
use serde_json::json;

use crate::inspect::SchemaProbe;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Shared state for the probe endpoints.
pub struct AppState {
    pub service_name: String,
    pub probe: SchemaProbe,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(root))
        .route("/health", web::get().to(health));
}

async fn root(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(json!({
        "message": format!("TeleHealth {}", state.service_name),
        "health": "/health",
    }))
}

// Handler reporting liveness plus whether the schema still verifies
async fn health(state: web::Data<AppState>) -> impl Responder {
    let probe = state.probe.clone();
    let status = match web::block(move || probe.status()).await {
        Ok(Ok(status)) => status,
        Ok(Err(e)) => {
            tracing::error!("Schema check error: {:?}", e);
            return HttpResponse::ServiceUnavailable().json(json!({
                "status": "unhealthy",
                "service": state.service_name,
                "version": VERSION,
                "schema_ready": false,
                "error": e.to_string(),
            }));
        }
        Err(e) => {
            tracing::error!("Error blocking thread: {:?}", e);
            return HttpResponse::InternalServerError().finish();
        }
    };

    let ready = status.is_ready();
    let body = json!({
        "status": if ready { "healthy" } else { "unhealthy" },
        "service": state.service_name,
        "version": VERSION,
        "schema_ready": ready,
        "schema": status,
    });
    if ready {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, App};

    use crate::config::Config;

    fn state() -> web::Data<AppState> {
        // Nothing listens on port 1, so every probe fails fast.
        let config = Config::from_lookup(|key| match key {
            "DATABASE_URL" => Some("postgres://nobody@127.0.0.1:1/postgres".into()),
            "DB_CONNECT_TIMEOUT_SECS" => Some("1".into()),
            _ => None,
        })
        .unwrap();
        web::Data::new(AppState {
            service_name: "schema-bootstrapper".into(),
            probe: SchemaProbe::new(&config),
        })
    }

    #[actix_web::test]
    async fn root_names_the_service() {
        let app = test::init_service(App::new().app_data(state()).configure(configure)).await;
        let req = test::TestRequest::get().uri("/").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["message"], "TeleHealth schema-bootstrapper");
        assert_eq!(body["health"], "/health");
    }

    #[actix_web::test]
    async fn health_is_unavailable_without_database() {
        let app = test::init_service(App::new().app_data(state()).configure(configure)).await;
        let req = test::TestRequest::get().uri("/health").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::SERVICE_UNAVAILABLE);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "unhealthy");
        assert_eq!(body["schema_ready"], false);
        assert_eq!(body["version"], VERSION);
    }
}
