use crate::{
    entities::return_request,
    errors::ServiceError,
    handlers::Caller,
    services::returns::{CreateReturnRequest, ReturnDetail, UpdateReturnStatusRequest},
    ApiResponse, ApiResult, AppState, ListQuery, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use uuid::Uuid;

pub async fn create_return(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<CreateReturnRequest>,
) -> ApiResult<return_request::Model> {
    let created = state.returns.create_return(caller.user_id, payload).await?;
    Ok(Json(ApiResponse::success(created)))
}

pub async fn list_my_returns(
    State(state): State<AppState>,
    caller: Caller,
) -> ApiResult<Vec<return_request::Model>> {
    let returns = state.returns.list_returns_for_user(caller.user_id).await?;
    Ok(Json(ApiResponse::success(returns)))
}

pub async fn list_returns(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<ListQuery>,
) -> ApiResult<PaginatedResponse<return_request::Model>> {
    caller.require_admin()?;

    let page = query.page.max(1);
    let limit = query.limit.clamp(1, 100);
    let (items, total) = state.returns.list_returns(page, limit).await?;
    let total_pages = (total + limit - 1) / limit;

    Ok(Json(ApiResponse::success(PaginatedResponse {
        items,
        total,
        page,
        limit,
        total_pages,
    })))
}

pub async fn get_return_detail(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<ReturnDetail> {
    caller.require_admin()?;

    match state.returns.get_return_detail(id).await? {
        Some(detail) => Ok(Json(ApiResponse::success(detail))),
        None => Err(ServiceError::NotFound(format!(
            "Return request {} not found",
            id
        ))),
    }
}

pub async fn update_return_status(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateReturnStatusRequest>,
) -> ApiResult<return_request::Model> {
    caller.require_admin()?;

    let updated = state
        .returns
        .update_status(id, payload, caller.user_id)
        .await?;

    Ok(Json(ApiResponse::success(updated)))
}
