//! Ledger service routes

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};
use serde_json::json;
use tracing::{error, info};

use crate::{
    error::{ApiError, ApiResult},
    models::{Contribution, GoalResponse, NewGoal, NewTransaction, Summary},
    state::AppState,
};

/// Create the router for the ledger service
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/transactions", get(list_transactions).post(add_transaction))
        .route("/transactions/summary", get(transaction_summary))
        .route("/transactions/:id", delete(delete_transaction))
        .route("/goals", get(list_goals).post(add_goal))
        .route("/goals/:id/contributions", post(contribute_to_goal))
        .with_state(state)
}

fn internal(context: &'static str) -> impl FnOnce(anyhow::Error) -> ApiError {
    move |e| {
        error!("{}: {}", context, e);
        ApiError::InternalServerError
    }
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "ledger-service"
    }))
}

pub async fn list_transactions(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let transactions = state
        .ledger
        .list_transactions()
        .await
        .map_err(internal("Failed to list transactions"))?;

    Ok(Json(transactions))
}

pub async fn add_transaction(
    State(state): State<AppState>,
    Json(payload): Json<NewTransaction>,
) -> ApiResult<impl IntoResponse> {
    payload.validate()?;

    let transaction = state
        .ledger
        .insert_transaction(&payload)
        .await
        .map_err(internal("Failed to add transaction"))?;

    info!(id = transaction.id, kind = %transaction.kind, "Transaction recorded");
    Ok((StatusCode::CREATED, Json(transaction)))
}

pub async fn delete_transaction(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let deleted = state
        .ledger
        .delete_transaction(id)
        .await
        .map_err(internal("Failed to delete transaction"))?;

    if !deleted {
        return Err(ApiError::NotFound("Transaction not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Income, expense and balance totals over every transaction
pub async fn transaction_summary(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let transactions = state
        .ledger
        .list_transactions()
        .await
        .map_err(internal("Failed to summarize transactions"))?;

    Ok(Json(Summary::from_transactions(&transactions)))
}

pub async fn list_goals(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let goals: Vec<GoalResponse> = state
        .ledger
        .list_goals()
        .await
        .map_err(internal("Failed to list goals"))?
        .into_iter()
        .map(GoalResponse::from)
        .collect();

    Ok(Json(goals))
}

pub async fn add_goal(
    State(state): State<AppState>,
    Json(payload): Json<NewGoal>,
) -> ApiResult<impl IntoResponse> {
    payload.validate()?;

    let goal = state
        .ledger
        .insert_goal(&payload)
        .await
        .map_err(internal("Failed to add goal"))?;

    Ok((StatusCode::CREATED, Json(GoalResponse::from(goal))))
}

pub async fn contribute_to_goal(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<Contribution>,
) -> ApiResult<impl IntoResponse> {
    payload.validate()?;

    let goal = state
        .ledger
        .contribute(id, payload.amount)
        .await
        .map_err(internal("Failed to update goal"))?
        .ok_or_else(|| ApiError::NotFound("Goal not found".to_string()))?;

    Ok(Json(GoalResponse::from(goal)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::InMemoryLedger;
    use axum::{
        body::{Body, to_bytes},
        http::Request,
    };
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn router() -> Router {
        create_router(AppState {
            ledger: Arc::new(InMemoryLedger::new()),
        })
    }

    async fn call(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        let request = match body {
            Some(body) => request.body(Body::from(body.to_string())).unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn transactions_are_listed_newest_first() {
        let app = router();
        for (date, amount) in [("2025-01-10", 20.0), ("2025-03-02", 35.5), ("2025-02-14", 12.0)] {
            let (status, _) = call(
                &app,
                "POST",
                "/transactions",
                Some(json!({"type": "expense", "amount": amount, "description": "Lunch", "date": date})),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (_, body) = call(&app, "GET", "/transactions", None).await;

        let dates: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["date"].as_str().unwrap())
            .collect();
        assert_eq!(dates, vec!["2025-03-02", "2025-02-14", "2025-01-10"]);
    }

    #[tokio::test]
    async fn invalid_amount_is_a_bad_request() {
        let app = router();

        let (status, body) = call(
            &app,
            "POST",
            "/transactions",
            Some(json!({"type": "income", "amount": -10.0})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Amount must be greater than zero");
    }

    #[tokio::test]
    async fn summary_and_delete() {
        let app = router();
        let (_, salary) = call(
            &app,
            "POST",
            "/transactions",
            Some(json!({"type": "income", "amount": 3000.0, "description": "Salary"})),
        )
        .await;
        call(
            &app,
            "POST",
            "/transactions",
            Some(json!({"type": "expense", "amount": 1200.0, "description": "Rent"})),
        )
        .await;

        let (_, summary) = call(&app, "GET", "/transactions/summary", None).await;
        assert_eq!(summary, json!({"income": 3000.0, "expenses": 1200.0, "balance": 1800.0}));

        let uri = format!("/transactions/{}", salary["id"]);
        let (status, _) = call(&app, "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = call(&app, "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, summary) = call(&app, "GET", "/transactions/summary", None).await;
        assert_eq!(summary["balance"], -1200.0);
    }

    #[tokio::test]
    async fn contributions_update_goal_progress() {
        let app = router();
        let (status, goal) = call(
            &app,
            "POST",
            "/goals",
            Some(json!({"title": "Vacation", "targetAmount": 2000.0, "deadline": "2025-12-01"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(goal["savedAmount"], 0.0);
        assert_eq!(goal["progress"], 0.0);

        let uri = format!("/goals/{}/contributions", goal["id"]);
        let (_, updated) = call(&app, "POST", &uri, Some(json!({"amount": 500.0}))).await;
        assert_eq!(updated["progress"], 25.0);

        let (_, updated) = call(&app, "POST", &uri, Some(json!({"amount": 2500.0}))).await;
        assert_eq!(updated["progress"], 100.0);
        assert_eq!(updated["completed"], true);

        let (status, _) = call(&app, "POST", "/goals/999/contributions", Some(json!({"amount": 1.0}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn goal_requires_positive_target() {
        let app = router();

        let (status, _) = call(
            &app,
            "POST",
            "/goals",
            Some(json!({"title": "Car", "targetAmount": 0})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
