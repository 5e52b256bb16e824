mod common;

use common::{drain_events, QuestionSpec, TestApp};
use hirebot_backend::{
    error::Error,
    models::{
        candidate::{CandidateStatus, ProfilePatch},
        event::BroadcastEvent,
        job::Job,
    },
    repository::Repository,
};
use uuid::Uuid;

async fn screening_job(app: &TestApp) -> Job {
    let job = app.add_job("Support agent").await;
    app.add_question(&job, 0, QuestionSpec::text("Name").field("fullName"))
        .await;
    job
}

async fn column_names(app: &TestApp) -> Vec<String> {
    app.state
        .pipeline_service
        .list_columns(false)
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect()
}

#[tokio::test]
async fn archiving_a_column_archives_its_active_candidates_and_restore_reverses_it() {
    let app = TestApp::new().await;
    let job = screening_job(&app).await;
    let pipeline = &app.state.pipeline_service;
    let column = app.column("Interview").await;

    let mut members = Vec::new();
    for user in ["1", "2", "3"] {
        let candidate = app.active_candidate(&job, user).await;
        pipeline
            .move_column(candidate.id, Some(column.id))
            .await
            .unwrap();
        members.push(candidate.id);
    }
    let bystander = app.active_candidate(&job, "4").await;

    let archived = pipeline.archive_column(column.id).await.unwrap();
    assert!(archived.column.is_archived);
    assert_eq!(archived.affected.len(), 3);
    for id in &members {
        let c = app.repo.get_candidate(*id).await.unwrap().unwrap();
        assert_eq!(c.status, CandidateStatus::Archived);
        assert_eq!(c.column_id, Some(column.id));
    }
    let untouched = app.repo.get_candidate(bystander.id).await.unwrap().unwrap();
    assert_eq!(untouched.status, CandidateStatus::Active);

    let restored = pipeline.restore_column(column.id).await.unwrap();
    assert!(!restored.column.is_archived);
    let mut restored_ids: Vec<Uuid> = restored.affected.iter().map(|c| c.id).collect();
    restored_ids.sort();
    members.sort();
    assert_eq!(restored_ids, members);
    for id in &members {
        let c = app.repo.get_candidate(*id).await.unwrap().unwrap();
        assert_eq!(c.status, CandidateStatus::Active);
        assert_eq!(c.column_id, Some(column.id));
    }
}

#[tokio::test]
async fn individually_restored_candidate_lands_in_the_default_lane() {
    let app = TestApp::new().await;
    let job = screening_job(&app).await;
    let pipeline = &app.state.pipeline_service;
    let column = app.column("Offer").await;
    let candidate = app.active_candidate(&job, "21").await;
    pipeline
        .move_column(candidate.id, Some(column.id))
        .await
        .unwrap();
    pipeline.archive_column(column.id).await.unwrap();

    let mut events = app.listen();
    let restored = pipeline
        .change_status(candidate.id, CandidateStatus::Active)
        .await
        .unwrap();
    assert_eq!(restored.status, CandidateStatus::Active);
    assert_eq!(restored.column_id, None);

    let events = drain_events(&mut events);
    assert!(events.iter().any(|e| matches!(
        e,
        BroadcastEvent::StatusChange(p) if p.candidate_id == candidate.id && p.status == CandidateStatus::Active
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        BroadcastEvent::CandidateUpdate(c) if c.id == candidate.id && c.column_id.is_none()
    )));
}

#[tokio::test]
async fn status_rules_guard_the_survey_and_columns() {
    let app = TestApp::new().await;
    let job = screening_job(&app).await;
    let pipeline = &app.state.pipeline_service;

    let fresh = app
        .state
        .survey_service
        .start_or_resume(app.bot.id, job.id, &app.user("31"), "en")
        .await
        .unwrap()
        .candidate;
    assert!(matches!(
        pipeline.change_status(fresh.id, CandidateStatus::Hired).await,
        Err(Error::BadRequest(_))
    ));

    let column = app.column("Phone screen").await;
    assert!(matches!(
        pipeline.move_column(fresh.id, Some(column.id)).await,
        Err(Error::BadRequest(_))
    ));

    let done = app.active_candidate(&job, "32").await;
    assert!(matches!(
        pipeline.change_status(done.id, CandidateStatus::Incomplete).await,
        Err(Error::BadRequest(_))
    ));
    assert!(matches!(
        pipeline.move_column(done.id, Some(Uuid::new_v4())).await,
        Err(Error::NotFound(_))
    ));

    pipeline
        .move_column(done.id, Some(column.id))
        .await
        .unwrap();
    let hired = pipeline
        .change_status(done.id, CandidateStatus::Hired)
        .await
        .unwrap();
    assert_eq!(hired.column_id, None);

    let archived_column = app.column("Old").await;
    pipeline.archive_column(archived_column.id).await.unwrap();
    let other = app.active_candidate(&job, "33").await;
    assert!(matches!(
        pipeline.move_column(other.id, Some(archived_column.id)).await,
        Err(Error::BadRequest(_))
    ));
}

#[tokio::test]
async fn deleting_an_archived_column_deletes_its_candidates() {
    let app = TestApp::new().await;
    let job = screening_job(&app).await;
    let pipeline = &app.state.pipeline_service;
    let column = app.column("Rejected").await;

    let a = app.active_candidate(&job, "41").await;
    let b = app.active_candidate(&job, "42").await;
    for id in [a.id, b.id] {
        pipeline.move_column(id, Some(column.id)).await.unwrap();
    }
    pipeline.archive_column(column.id).await.unwrap();

    let outcome = pipeline.delete_column(column.id).await.unwrap();
    assert_eq!(outcome.deleted_candidates, 2);
    assert!(outcome.unassigned.is_empty());
    assert!(app.repo.get_candidate(a.id).await.unwrap().is_none());
    assert!(app.repo.get_candidate(b.id).await.unwrap().is_none());
    assert!(app.repo.get_column(column.id).await.unwrap().is_none());
}

#[tokio::test]
async fn deleting_an_active_column_returns_candidates_to_the_default_lane() {
    let app = TestApp::new().await;
    let job = screening_job(&app).await;
    let pipeline = &app.state.pipeline_service;
    let column = app.column("Technical").await;
    let candidate = app.active_candidate(&job, "51").await;
    pipeline
        .move_column(candidate.id, Some(column.id))
        .await
        .unwrap();

    let outcome = pipeline.delete_column(column.id).await.unwrap();
    assert_eq!(outcome.deleted_candidates, 0);
    assert_eq!(outcome.unassigned.len(), 1);

    let stored = app.repo.get_candidate(candidate.id).await.unwrap().unwrap();
    assert_eq!(stored.status, CandidateStatus::Active);
    assert_eq!(stored.column_id, None);
}

#[tokio::test]
async fn only_archived_candidates_can_be_deleted() {
    let app = TestApp::new().await;
    let job = screening_job(&app).await;
    let pipeline = &app.state.pipeline_service;
    let candidate = app.active_candidate(&job, "61").await;

    assert!(matches!(
        pipeline.delete_candidate(candidate.id).await,
        Err(Error::BadRequest(_))
    ));

    pipeline
        .change_status(candidate.id, CandidateStatus::Archived)
        .await
        .unwrap();
    pipeline.delete_candidate(candidate.id).await.unwrap();
    assert!(app.repo.get_candidate(candidate.id).await.unwrap().is_none());

    assert!(matches!(
        pipeline.delete_candidate(candidate.id).await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn profile_edit_changes_only_the_given_fields() {
    let app = TestApp::new().await;
    let job = screening_job(&app).await;
    let pipeline = &app.state.pipeline_service;
    let candidate = app.active_candidate(&job, "71").await;
    let mut events = app.listen();

    let edited = pipeline
        .update_profile(
            candidate.id,
            ProfilePatch {
                email: Some(" jane@example.com ".into()),
                phone: Some("+992 900 000 000".into()),
                ..ProfilePatch::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(edited.full_name.as_deref(), Some("answer"));
    assert_eq!(edited.email.as_deref(), Some("jane@example.com"));
    assert_eq!(edited.status, CandidateStatus::Active);
    assert!(drain_events(&mut events)
        .iter()
        .any(|e| matches!(e, BroadcastEvent::CandidateUpdate(c) if c.id == candidate.id)));

    let cleared = pipeline
        .update_profile(
            candidate.id,
            ProfilePatch {
                phone: Some(String::new()),
                ..ProfilePatch::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(cleared.phone, None);
    assert_eq!(cleared.email.as_deref(), Some("jane@example.com"));

    assert!(matches!(
        pipeline
            .update_profile(Uuid::new_v4(), ProfilePatch::default())
            .await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn comments_belong_to_one_candidate() {
    let app = TestApp::new().await;
    let job = screening_job(&app).await;
    let pipeline = &app.state.pipeline_service;
    let operator = app.operator().await;
    let a = app.active_candidate(&job, "81").await;
    let b = app.active_candidate(&job, "82").await;

    let note = pipeline
        .add_comment(a.id, operator.id, "  Strong portfolio  ")
        .await
        .unwrap();
    assert_eq!(note.text, "Strong portfolio");
    assert_eq!(note.operator_name.as_deref(), Some("HR"));
    assert!(matches!(
        pipeline.add_comment(a.id, operator.id, "   ").await,
        Err(Error::BadRequest(_))
    ));
    assert!(matches!(
        pipeline.add_comment(Uuid::new_v4(), operator.id, "lost").await,
        Err(Error::NotFound(_))
    ));

    assert!(matches!(
        pipeline.delete_comment(b.id, note.id).await,
        Err(Error::NotFound(_))
    ));
    assert_eq!(pipeline.list_comments(a.id).await.unwrap(), vec![note.clone()]);
    assert!(pipeline.list_comments(b.id).await.unwrap().is_empty());

    pipeline.delete_comment(a.id, note.id).await.unwrap();
    assert!(pipeline.list_comments(a.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn reordering_columns_is_all_or_nothing() {
    let app = TestApp::new().await;
    let pipeline = &app.state.pipeline_service;
    let screen = app.column("Screen").await;
    let interview = app.column("Interview").await;
    let offer = app.column("Offer").await;

    pipeline
        .reorder_columns(&[(offer.id, 0), (screen.id, 1), (interview.id, 2)])
        .await
        .unwrap();
    assert_eq!(column_names(&app).await, ["Offer", "Screen", "Interview"]);

    assert!(matches!(
        pipeline
            .reorder_columns(&[(screen.id, 0), (screen.id, 1)])
            .await,
        Err(Error::BadRequest(_))
    ));
    assert!(matches!(
        pipeline
            .reorder_columns(&[(interview.id, 0), (Uuid::new_v4(), 1)])
            .await,
        Err(Error::NotFound(_))
    ));
    assert_eq!(column_names(&app).await, ["Offer", "Screen", "Interview"]);
}
