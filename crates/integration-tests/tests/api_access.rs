//! Route access levels: admin-only, owner-or-admin and signed-in gates.

mod support;

use axum::http::StatusCode;
use chrono::Utc;
use sl_core::models::{Project, ProjectKind};
use support::*;
use uuid::Uuid;

async fn seed_project(h: &Harness, user_id: Uuid) -> Project {
    let project = Project {
        id: Uuid::new_v4(),
        address: "12 Oak St".into(),
        description: String::new(),
        phase_name: "Framing".into(),
        current_phase: 2,
        kind: ProjectKind::Residential,
        user_id,
        created_at: Utc::now(),
    };
    h.state.projects.create(&project).await.expect("project");
    project
}

#[tokio::test]
async fn non_admin_gets_forbidden_on_admin_routes() {
    let h = Harness::new().await;
    let project = seed_project(&h, h.client.id).await;
    let cookie = h.cookie_for(h.client.id);

    // The project edit form is admin-only even for the project's owner.
    let path = format!("/users/{}/project/{}/update", h.client.id, project.id);
    let response = h.send(get(&path, Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // And nothing changed underneath.
    let unchanged = h
        .state
        .projects
        .get(project.id)
        .await
        .unwrap()
        .expect("project still there");
    assert_eq!(unchanged.phase_name, "Framing");

    let response = h.send(get("/users", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn owner_reads_own_project_but_not_anothers() {
    let h = Harness::new().await;
    let own = seed_project(&h, h.client.id).await;
    let admins = seed_project(&h, h.admin.id).await;
    let cookie = h.cookie_for(h.client.id);

    let response = h
        .send(get(
            &format!("/users/{}/project/{}", h.client.id, own.id),
            Some(&cookie),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(body.contains("12 Oak St"));

    let response = h
        .send(get(
            &format!("/users/{}/project/{}", h.admin.id, admins.id),
            Some(&cookie),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_reads_any_project() {
    let h = Harness::new().await;
    let project = seed_project(&h, h.client.id).await;
    let cookie = h.cookie_for(h.admin.id);

    let response = h
        .send(get(
            &format!("/users/{}/project/{}", h.client.id, project.id),
            Some(&cookie),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn signed_out_users_are_redirected_not_erred() {
    let h = Harness::new().await;
    let project = seed_project(&h, h.client.id).await;

    for path in [
        "/".to_string(),
        format!("/users/{}", h.client.id),
        format!("/users/{}/project/{}", h.client.id, project.id),
    ] {
        let response = h.send(get(&path, None)).await;
        assert_redirect(&response, "/auth/sign-in");
    }
}

#[tokio::test]
async fn mismatched_project_owner_pair_reads_as_missing() {
    let h = Harness::new().await;
    let project = seed_project(&h, h.client.id).await;
    let cookie = h.cookie_for(h.admin.id);

    // Right project, wrong user in the path.
    let response = h
        .send(get(
            &format!("/users/{}/project/{}", h.admin.id, project.id),
            Some(&cookie),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
