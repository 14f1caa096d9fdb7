use std::collections::HashMap;

use axum::{
    extract::{Form, Path, Query, State},
    http::{header::LOCATION, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use diesel::{dsl::count_star, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::models::{Case, NewCase, User};
use crate::schema::{cases, documents, users};
use crate::state::AppState;
use crate::storage::remove_case_dirs;

const PAGE_SIZE: i64 = 10;
const MAX_NAME_CHARS: usize = 200;

#[derive(Deserialize)]
pub struct CaseListQuery {
    pub q: Option<String>,
    pub notes_q: Option<String>,
    pub q_id: Option<String>,
    pub page: Option<i64>,
}

#[derive(Deserialize)]
pub struct CreateCaseForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Deserialize)]
pub struct EditCaseForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Deserialize)]
pub struct DeleteCaseForm {
    #[serde(default = "default_true")]
    pub delete_files: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Serialize)]
pub struct CaseDetailResponse {
    pub id: i32,
    pub name: String,
    pub status: String,
    pub doc_count: i64,
    pub input_dir: String,
    pub index_dir: String,
    pub notes: Option<String>,
    pub updated_at: Option<String>,
}

/// One rendered row of the list view.
struct CaseRow {
    id: i32,
    name: String,
    status: StatusBadge,
    doc_count: i64,
    notes: Option<String>,
    owner: Option<String>,
    updated_at: Option<String>,
    can_modify: bool,
}

struct StatusBadge {
    label: &'static str,
    class: &'static str,
}

pub async fn list_cases(
    State(state): State<AppState>,
    Query(params): Query<CaseListQuery>,
    user: AuthenticatedUser,
) -> AppResult<Html<String>> {
    let mut conn = state.db()?;

    let name_filter = non_empty(params.q.as_deref());
    let notes_filter = non_empty(params.notes_q.as_deref());
    // Non-numeric id filters are ignored rather than rejected.
    let id_filter = non_empty(params.q_id.as_deref()).and_then(|raw| raw.parse::<i32>().ok());

    // Boxed queries are single-use; the page query and its count carry the
    // same filter set.
    let mut list_query = cases::table.into_boxed();
    let mut count_query = cases::table.select(count_star()).into_boxed();
    if !user.is_admin() {
        list_query = list_query.filter(cases::user_id.eq(user.user_id));
        count_query = count_query.filter(cases::user_id.eq(user.user_id));
    }
    if let Some(name) = name_filter {
        list_query = list_query.filter(cases::name.ilike(format!("%{name}%")));
        count_query = count_query.filter(cases::name.ilike(format!("%{name}%")));
    }
    if let Some(notes) = notes_filter {
        list_query = list_query.filter(cases::notes.ilike(format!("%{notes}%")));
        count_query = count_query.filter(cases::notes.ilike(format!("%{notes}%")));
    }
    if let Some(id) = id_filter {
        list_query = list_query.filter(cases::id.eq(id));
        count_query = count_query.filter(cases::id.eq(id));
    }

    let total: i64 = count_query.get_result(&mut conn)?;
    let total_pages = ((total + PAGE_SIZE - 1) / PAGE_SIZE).max(1);
    let page = params.page.unwrap_or(1).clamp(1, total_pages);

    let page_cases: Vec<Case> = list_query
        .order(cases::id.desc())
        .offset((page - 1) * PAGE_SIZE)
        .limit(PAGE_SIZE)
        .load(&mut conn)?;

    let case_ids: Vec<i32> = page_cases.iter().map(|c| c.id).collect();
    let doc_counts: HashMap<i32, i64> = documents::table
        .filter(documents::case_id.eq_any(&case_ids))
        .filter(documents::status.ne("deleted"))
        .group_by(documents::case_id)
        .select((documents::case_id, count_star()))
        .load::<(i32, i64)>(&mut conn)?
        .into_iter()
        .collect();

    // Owner column is only shown to admins; everyone else sees just their
    // own cases anyway.
    let owners: HashMap<i32, String> = if user.is_admin() {
        let owner_ids: Vec<i32> = page_cases.iter().map(|c| c.user_id).collect();
        users::table
            .filter(users::id.eq_any(&owner_ids))
            .load::<User>(&mut conn)?
            .into_iter()
            .map(|owner| (owner.id, owner.display().to_owned()))
            .collect()
    } else {
        HashMap::new()
    };

    let rows: Vec<CaseRow> = page_cases
        .into_iter()
        .map(|case| CaseRow {
            id: case.id,
            name: case.name,
            status: status_badge(&case.status),
            doc_count: *doc_counts.get(&case.id).unwrap_or(&0),
            notes: normalize_notes(case.notes),
            owner: owners.get(&case.user_id).cloned(),
            updated_at: case.updated_at.or(case.created_at).map(to_iso),
            can_modify: user.can_modify(case.user_id),
        })
        .collect();

    Ok(Html(render_cases_page(&rows, &user, page, total_pages)))
}

pub async fn create_case(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Form(form): Form<CreateCaseForm>,
) -> AppResult<Response> {
    let mut conn = state.db()?;
    let now = Utc::now().naive_utc();

    let name = match form.name.trim() {
        "" => "Untitled case".to_string(),
        trimmed => truncate_name(trimmed),
    };

    // Directory paths embed the generated id, so the row is inserted with
    // empty dirs first and updated once the id is known.
    let new_case = NewCase {
        user_id: user.user_id,
        customer_id: None,
        name,
        status: "queued".to_string(),
        input_dir: String::new(),
        index_dir: String::new(),
        rag_version: None,
        notes: normalize_notes(Some(form.notes)),
        created_at: Some(now),
        updated_at: Some(now),
    };

    let case_id: i32 = diesel::insert_into(cases::table)
        .values(&new_case)
        .returning(cases::id)
        .get_result(&mut conn)?;

    // Creation failures propagate: a case without its directories is
    // useless, unlike the best-effort cleanup on delete.
    let (input_dir, index_dir) = state.storage.ensure_case_dirs(case_id)?;

    diesel::update(cases::table.find(case_id))
        .set((
            cases::input_dir.eq(input_dir.to_string_lossy().into_owned()),
            cases::index_dir.eq(index_dir.to_string_lossy().into_owned()),
            cases::updated_at.eq(Some(now)),
        ))
        .execute(&mut conn)?;

    info!(case_id, user_id = user.user_id, "created case");
    Ok(found("/cases"))
}

pub async fn delete_case(
    State(state): State<AppState>,
    Path(case_id): Path<i32>,
    user: AuthenticatedUser,
    Form(form): Form<DeleteCaseForm>,
) -> AppResult<Response> {
    let mut conn = state.db()?;

    let case: Case = cases::table
        .find(case_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(AppError::not_found)?;

    if !user.can_modify(case.user_id) {
        return Err(AppError::forbidden());
    }

    diesel::delete(cases::table.find(case_id)).execute(&mut conn)?;

    // Row delete and file delete are independent steps; a crash in between
    // leaves orphaned directories behind. Removal failures are logged and
    // never fail the request.
    if form.delete_files {
        for failure in remove_case_dirs(&case.input_dir, &case.index_dir) {
            warn!(case_id, error = %failure, "failed to remove case files");
        }
    }

    info!(case_id, user_id = user.user_id, delete_files = form.delete_files, "deleted case");
    Ok(found("/cases"))
}

pub async fn case_detail(
    State(state): State<AppState>,
    Path(case_id): Path<i32>,
    user: AuthenticatedUser,
) -> AppResult<Json<CaseDetailResponse>> {
    let mut conn = state.db()?;

    let case: Case = cases::table
        .find(case_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(AppError::not_found)?;

    if !user.can_modify(case.user_id) {
        return Err(AppError::forbidden());
    }

    let doc_count: i64 = documents::table
        .filter(documents::case_id.eq(case_id))
        .filter(documents::status.ne("deleted"))
        .select(count_star())
        .first(&mut conn)?;

    // Cached count drifts as documents come and go; reconcile it here.
    let mut updated_at = case.updated_at;
    if doc_count != i64::from(case.doc_count) {
        let now = Utc::now().naive_utc();
        diesel::update(cases::table.find(case_id))
            .set((
                cases::doc_count.eq(doc_count as i32),
                cases::updated_at.eq(Some(now)),
            ))
            .execute(&mut conn)?;
        updated_at = Some(now);
    }

    Ok(Json(CaseDetailResponse {
        id: case.id,
        name: case.name,
        status: case.status,
        doc_count,
        input_dir: case.input_dir,
        index_dir: case.index_dir,
        notes: normalize_notes(case.notes),
        updated_at: updated_at.or(case.created_at).map(to_iso),
    }))
}

pub async fn edit_case(
    State(state): State<AppState>,
    Path(case_id): Path<i32>,
    user: AuthenticatedUser,
    Form(form): Form<EditCaseForm>,
) -> AppResult<Response> {
    let mut conn = state.db()?;

    let case: Case = cases::table
        .find(case_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(AppError::not_found)?;

    if !user.can_modify(case.user_id) {
        return Err(AppError::forbidden());
    }

    let name = match form.name.trim() {
        "" => case.name,
        trimmed => truncate_name(trimmed),
    };

    diesel::update(cases::table.find(case_id))
        .set((
            cases::name.eq(name),
            cases::notes.eq(normalize_notes(Some(form.notes))),
            cases::updated_at.eq(Some(Utc::now().naive_utc())),
        ))
        .execute(&mut conn)?;

    Ok(found("/cases"))
}

/// No authorization here: the upload view enforces its own.
pub async fn upload_redirect(Path(case_id): Path<i32>) -> Response {
    found(&format!("/upload?selected_case_id={case_id}"))
}

fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(LOCATION, location.to_owned())]).into_response()
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// Whitespace-only notes count as absent.
fn normalize_notes(notes: Option<String>) -> Option<String> {
    notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
}

fn truncate_name(name: &str) -> String {
    name.chars().take(MAX_NAME_CHARS).collect()
}

fn to_iso(dt: NaiveDateTime) -> String {
    DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc).to_rfc3339()
}

fn status_badge(status: &str) -> StatusBadge {
    match status.to_ascii_uppercase().as_str() {
        "QUEUED" => StatusBadge {
            label: "Queued",
            class: "badge-queued",
        },
        "INDEXING" => StatusBadge {
            label: "Indexing",
            class: "badge-indexing",
        },
        "DONE" => StatusBadge {
            label: "Done",
            class: "badge-done",
        },
        "ERROR" => StatusBadge {
            label: "Error",
            class: "badge-error",
        },
        "QUOTED" => StatusBadge {
            label: "Quoted",
            class: "badge-quoted",
        },
        "ARCHIVED" => StatusBadge {
            label: "Archived",
            class: "badge-archived",
        },
        _ => StatusBadge {
            label: "Unknown",
            class: "badge-unknown",
        },
    }
}

fn render_cases_page(
    rows: &[CaseRow],
    user: &AuthenticatedUser,
    page: i64,
    total_pages: i64,
) -> String {
    let mut body = String::with_capacity(2048);
    body.push_str("<!DOCTYPE html><html><head><title>Cases</title></head><body>");
    body.push_str(&format!(
        "<h1>Cases</h1><p>Signed in as {}</p>",
        escape_html(&user.username)
    ));
    body.push_str(
        "<form method=\"get\" action=\"/cases\">\
         <input name=\"q\" placeholder=\"Name\">\
         <input name=\"notes_q\" placeholder=\"Notes\">\
         <input name=\"q_id\" placeholder=\"Id\">\
         <button type=\"submit\">Search</button></form>",
    );
    body.push_str(
        "<form method=\"post\" action=\"/cases/create\">\
         <input name=\"name\" placeholder=\"New case name\">\
         <input name=\"notes\" placeholder=\"Notes\">\
         <button type=\"submit\">Create</button></form>",
    );

    body.push_str(
        "<table><thead><tr><th>Id</th><th>Name</th><th>Status</th>\
         <th>Documents</th><th>Notes</th><th>Owner</th><th>Updated</th><th></th></tr></thead><tbody>",
    );
    for row in rows {
        body.push_str("<tr>");
        body.push_str(&format!("<td>{}</td>", row.id));
        body.push_str(&format!(
            "<td><a href=\"/cases/{}\">{}</a></td>",
            row.id,
            escape_html(&row.name)
        ));
        body.push_str(&format!(
            "<td><span class=\"{}\">{}</span></td>",
            row.status.class, row.status.label
        ));
        body.push_str(&format!("<td>{}</td>", row.doc_count));
        body.push_str(&format!(
            "<td>{}</td>",
            escape_html(row.notes.as_deref().unwrap_or(""))
        ));
        body.push_str(&format!(
            "<td>{}</td>",
            escape_html(row.owner.as_deref().unwrap_or(""))
        ));
        body.push_str(&format!(
            "<td>{}</td>",
            row.updated_at.as_deref().unwrap_or("")
        ));
        if row.can_modify {
            body.push_str(&format!(
                "<td><a href=\"/cases/{id}/upload\">Upload</a> \
                 <form method=\"post\" action=\"/cases/{id}/delete\" style=\"display:inline\">\
                 <button type=\"submit\">Delete</button></form></td>",
                id = row.id
            ));
        } else {
            body.push_str("<td></td>");
        }
        body.push_str("</tr>");
    }
    body.push_str("</tbody></table>");

    body.push_str(&format!("<p>Page {page} of {total_pages}</p>"));
    if page > 1 {
        body.push_str(&format!("<a href=\"/cases?page={}\">Previous</a> ", page - 1));
    }
    if page < total_pages {
        body.push_str(&format!("<a href=\"/cases?page={}\">Next</a>", page + 1));
    }
    body.push_str("</body></html>");
    body
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
