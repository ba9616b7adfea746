use std::{convert::Infallible, time::Duration};

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, patch, post},
    Json, Router,
};
use futures::{stream, Stream};
use tracing::{info, instrument, warn};

use super::{
    dto::{SearchQuery, TrackQuery, ViewSummary},
    listing::{ListingPage, ListingView, StudentListing, VIEWS},
    repo_types::{NewStudent, Student, StudentUpdate},
};
use crate::{
    auth::extractors::Session, error::AppError, events::ChangeSubscription, state::AppState,
};

pub fn student_routes() -> Router<AppState> {
    Router::new()
        .route("/students", get(list_enrolled).post(add_student))
        .route("/students/pending", get(list_pending))
        .route("/students/all", get(list_all))
        .route("/students/:lrn", patch(update_student).delete(delete_student))
        .route("/students/:lrn/approve", post(approve_student))
}

pub fn view_routes() -> Router<AppState> {
    Router::new()
        .route("/views", get(list_views))
        .route("/views/:slug", get(view_listing))
        .route("/views/:slug/events", get(view_events))
}

fn strand_filter(q: &TrackQuery) -> Option<&str> {
    q.strand.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

#[instrument(skip(state, _session))]
pub async fn list_enrolled(
    State(state): State<AppState>,
    _session: Session,
    Query(q): Query<TrackQuery>,
) -> Result<Json<Vec<Student>>, AppError> {
    Ok(Json(state.students.list_enrolled(q.track, strand_filter(&q)).await?))
}

#[instrument(skip(state, _session))]
pub async fn list_pending(
    State(state): State<AppState>,
    _session: Session,
    Query(q): Query<TrackQuery>,
) -> Result<Json<Vec<Student>>, AppError> {
    Ok(Json(state.students.list_pending(q.track, strand_filter(&q)).await?))
}

#[instrument(skip(state, _session))]
pub async fn list_all(
    State(state): State<AppState>,
    _session: Session,
    Query(q): Query<TrackQuery>,
) -> Result<Json<Vec<Student>>, AppError> {
    Ok(Json(state.students.list_all(q.track).await?))
}

#[instrument(skip(state, session, body))]
pub async fn add_student(
    State(state): State<AppState>,
    session: Session,
    Query(q): Query<TrackQuery>,
    Json(body): Json<NewStudent>,
) -> Result<(StatusCode, HeaderMap, Json<Student>), AppError> {
    if [&body.lrn, &body.lname, &body.fname].iter().any(|f| f.trim().is_empty()) {
        warn!("add student with missing fields");
        return Err(AppError::validation("LRN, last name and first name are required."));
    }
    let student = state.students.add(q.track, body).await?;

    let mut headers = HeaderMap::new();
    if let Ok(location) = format!("/api/v1/students/{}", student.lrn).parse::<HeaderValue>() {
        headers.insert(header::LOCATION, location);
    }
    info!(lrn = %student.lrn, track = ?q.track, by = %session.email, "student added as pending");
    Ok((StatusCode::CREATED, headers, Json(student)))
}

#[instrument(skip(state, session))]
pub async fn approve_student(
    State(state): State<AppState>,
    session: Session,
    Path(lrn): Path<String>,
    Query(q): Query<TrackQuery>,
) -> Result<StatusCode, AppError> {
    state.students.approve(q.track, &lrn).await?;
    info!(%lrn, track = ?q.track, by = %session.email, "student enrolled");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, session, update))]
pub async fn update_student(
    State(state): State<AppState>,
    session: Session,
    Path(lrn): Path<String>,
    Query(q): Query<TrackQuery>,
    Json(update): Json<StudentUpdate>,
) -> Result<StatusCode, AppError> {
    if update.is_empty() {
        return Err(AppError::validation("Nothing to update."));
    }
    if !q.track.has_strand() && update.strand.is_some() {
        return Err(AppError::validation("ALS students have no strand."));
    }
    state.students.update(q.track, &lrn, &update).await?;
    info!(%lrn, track = ?q.track, by = %session.email, "student updated");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, session))]
pub async fn delete_student(
    State(state): State<AppState>,
    session: Session,
    Path(lrn): Path<String>,
    Query(q): Query<TrackQuery>,
) -> Result<StatusCode, AppError> {
    state.students.delete(q.track, &lrn).await?;
    info!(%lrn, track = ?q.track, by = %session.email, "student deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_views(_session: Session) -> Json<Vec<ViewSummary>> {
    Json(VIEWS.iter().map(ViewSummary::from).collect())
}

fn find_view(slug: &str) -> Result<&'static ListingView, AppError> {
    ListingView::by_slug(slug).ok_or_else(|| AppError::NotFound(format!("No view named {slug}")))
}

#[instrument(skip(state, _session))]
pub async fn view_listing(
    State(state): State<AppState>,
    _session: Session,
    Path(slug): Path<String>,
    Query(search): Query<SearchQuery>,
) -> Result<Json<ListingPage>, AppError> {
    let listing = StudentListing::new(find_view(&slug)?, state.students.clone());
    Ok(Json(listing.render(&search.q).await?))
}

fn listing_event(page: &ListingPage) -> Event {
    Event::default()
        .event("listing")
        .json_data(page)
        .unwrap_or_else(|e| Event::default().event("error").data(e.to_string()))
}

struct Feed {
    first: Option<ListingPage>,
    changes: ChangeSubscription,
    listing: StudentListing,
    query: String,
}

/// Server-sent listing that is re-fetched in full whenever the view's table changes.
/// A client that goes away drops the stream along with any re-fetch still in flight.
#[instrument(skip(state, _session))]
pub async fn view_events(
    State(state): State<AppState>,
    _session: Session,
    Path(slug): Path<String>,
    Query(search): Query<SearchQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let view = find_view(&slug)?;
    // Subscribe before the first fetch so no change slips between the two.
    let changes = state.changes.subscribe(view.scope);
    let listing = StudentListing::new(view, state.students.clone());
    let first = listing.render(&search.q).await?;

    let feed = Feed {
        first: Some(first),
        changes,
        listing,
        query: search.q,
    };
    let events = stream::unfold(feed, |mut feed| async move {
        if let Some(page) = feed.first.take() {
            return Some((Ok::<_, Infallible>(listing_event(&page)), feed));
        }
        let change = feed.changes.next().await?;
        let event = match feed.listing.render(&feed.query).await {
            Ok(page) => listing_event(&page),
            Err(e) => {
                warn!(error = %e, view = feed.listing.view().slug, ?change, "listing refresh failed");
                Event::default().event("error").data(e.to_string())
            }
        };
        Some((Ok::<_, Infallible>(event), feed))
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}
