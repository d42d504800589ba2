use crate::models::{Account, NewAccount};
use crate::AppState;
use axum::{extract::State, http::StatusCode, Json};
use diesel::prelude::*;

pub async fn list_accounts(
    State(state): State<AppState>,
) -> Result<Json<Vec<Account>>, StatusCode> {
    use crate::schema::accounts::dsl::*;

    let mut conn = state
        .db
        .get()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let results = accounts
        .select(Account::as_select())
        .load(&mut conn)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(results))
}

pub async fn create_account(
    State(state): State<AppState>,
    Json(new_account): Json<NewAccount>,
) -> Result<Json<Account>, StatusCode> {
    use crate::schema::accounts;

    let mut conn = state
        .db
        .get()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    if new_account.name.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let account = diesel::insert_into(accounts::table)
        .values(&new_account)
        .returning(Account::as_select())
        .get_result(&mut conn)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(account))
}
