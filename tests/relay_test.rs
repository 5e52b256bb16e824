mod common;

use common::{drain_events, QuestionSpec, Sent, TestApp};
use hirebot_backend::{
    channel::{MediaKind, MediaRef},
    error::Error,
    models::{
        event::BroadcastEvent,
        job::Job,
        message::{MessageDirection, MessageType},
    },
    repository::Repository,
    services::message_service::OutboundMessage,
};
use uuid::Uuid;

async fn short_job(app: &TestApp) -> Job {
    let job = app.add_job("Courier").await;
    app.add_question(&job, 0, QuestionSpec::text("Name")).await;
    job
}

#[tokio::test]
async fn operator_message_is_delivered_stored_and_broadcast() {
    let app = TestApp::new().await;
    let job = short_job(&app).await;
    let candidate = app.active_candidate(&job, "501").await;
    let operator = app.operator().await;
    app.transport.take_sent();
    let mut events = app.listen();

    let outcome = app
        .state
        .message_service
        .send_outbound(candidate.id, operator.id, OutboundMessage::text("Can you come on Monday?"))
        .await
        .unwrap();

    assert!(outcome.delivered);
    assert_eq!(outcome.message.direction, MessageDirection::Outbound);
    assert_eq!(outcome.message.operator_id, Some(operator.id));
    assert!(outcome.message.channel_message_id.is_some());
    assert_eq!(
        app.transport.last(),
        Some(Sent::Text {
            chat_id: "501".into(),
            text: "Can you come on Monday?".into()
        })
    );

    let events = drain_events(&mut events);
    assert!(events.iter().any(|e| matches!(
        e,
        BroadcastEvent::NewMessage(p)
            if p.candidate_id == candidate.id && p.direction == MessageDirection::Outbound
    )));
}

#[tokio::test]
async fn failed_delivery_is_still_recorded() {
    let app = TestApp::new().await;
    let job = short_job(&app).await;
    let candidate = app.active_candidate(&job, "502").await;
    let operator = app.operator().await;
    app.transport.fail_sends(true);
    let mut events = app.listen();

    let outcome = app
        .state
        .message_service
        .send_outbound(candidate.id, operator.id, OutboundMessage::text("Hello"))
        .await
        .unwrap();

    assert!(!outcome.delivered);
    assert_eq!(outcome.message.channel_message_id, None);
    let stored = app.repo.list_messages(candidate.id).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].text.as_deref(), Some("Hello"));
    assert_eq!(drain_events(&mut events).len(), 1);
}

#[tokio::test]
async fn stopped_bot_leaves_message_undelivered() {
    let app = TestApp::new().await;
    let job = short_job(&app).await;
    let candidate = app.active_candidate(&job, "503").await;
    let operator = app.operator().await;
    app.state.bots.stop_bot(app.bot.id);

    let outcome = app
        .state
        .message_service
        .send_outbound(candidate.id, operator.id, OutboundMessage::text("ping"))
        .await
        .unwrap();
    assert!(!outcome.delivered);
}

#[tokio::test]
async fn outbound_requires_a_finished_survey_and_content() {
    let app = TestApp::new().await;
    let job = short_job(&app).await;
    let operator = app.operator().await;
    let relay = &app.state.message_service;

    let fresh = app
        .state
        .survey_service
        .start_or_resume(app.bot.id, job.id, &app.user("504"), "en")
        .await
        .unwrap()
        .candidate;
    assert!(matches!(
        relay
            .send_outbound(fresh.id, operator.id, OutboundMessage::text("hi"))
            .await,
        Err(Error::BadRequest(_))
    ));

    assert!(matches!(
        relay
            .send_outbound(Uuid::new_v4(), operator.id, OutboundMessage::text("hi"))
            .await,
        Err(Error::NotFound(_))
    ));

    let done = app.active_candidate(&job, "505").await;
    assert!(matches!(
        relay
            .send_outbound(done.id, operator.id, OutboundMessage::text("   "))
            .await,
        Err(Error::BadRequest(_))
    ));

    let file_without_path = OutboundMessage {
        message_type: MessageType::Document,
        text: None,
        local_path: None,
        file_name: Some("offer.pdf".into()),
        mime_type: Some("application/pdf".into()),
    };
    assert!(matches!(
        relay.send_outbound(done.id, operator.id, file_without_path).await,
        Err(Error::BadRequest(_))
    ));
}

#[tokio::test]
async fn outbound_file_goes_through_send_media() {
    let app = TestApp::new().await;
    let job = short_job(&app).await;
    let candidate = app.active_candidate(&job, "506").await;
    let operator = app.operator().await;

    let outcome = app
        .state
        .message_service
        .send_outbound(
            candidate.id,
            operator.id,
            OutboundMessage {
                message_type: MessageType::Document,
                text: Some("Our offer".into()),
                local_path: Some("/tmp/offer.pdf".into()),
                file_name: Some("offer.pdf".into()),
                mime_type: Some("application/pdf".into()),
            },
        )
        .await
        .unwrap();

    assert!(outcome.delivered);
    assert_eq!(
        app.transport.last(),
        Some(Sent::Media {
            chat_id: "506".into(),
            kind: MediaKind::Document,
            path: "/tmp/offer.pdf".into(),
            caption: Some("Our offer".into()),
        })
    );
}

#[tokio::test]
async fn inbound_messages_count_as_unread_until_marked_read() {
    let app = TestApp::new().await;
    let job = short_job(&app).await;
    let candidate = app.active_candidate(&job, "507").await;
    let relay = &app.state.message_service;
    let mut events = app.listen();

    relay
        .record_inbound(&candidate, Some(900), Some("When is the interview?".into()), None)
        .await
        .unwrap();
    let voice = MediaRef {
        kind: MediaKind::Voice,
        file_ref: "AwACAgIAAxkBAAID".into(),
        file_name: None,
        mime_type: None,
    };
    let stored = relay
        .record_inbound(&candidate, Some(901), None, Some(&voice))
        .await
        .unwrap();
    assert_eq!(stored.message_type, MessageType::Voice);
    assert_eq!(stored.file_name.as_deref(), Some("voice.ogg"));
    assert!(stored.local_path.is_some());

    assert_eq!(app.repo.unread_count(candidate.id).await.unwrap(), 2);
    assert_eq!(relay.unread_total().await.unwrap(), 2);

    let events_seen = drain_events(&mut events);
    let unread: Vec<Option<i64>> = events_seen
        .iter()
        .filter_map(|e| match e {
            BroadcastEvent::NewMessage(p) => Some(p.unread_count),
            _ => None,
        })
        .collect();
    assert_eq!(unread, vec![Some(1), Some(2)]);

    assert_eq!(relay.mark_read(candidate.id).await.unwrap(), 2);
    assert_eq!(relay.unread_total().await.unwrap(), 0);
    assert!(drain_events(&mut events).iter().any(|e| matches!(
        e,
        BroadcastEvent::MessagesRead(p) if p.candidate_id == candidate.id && p.unread_count == 0
    )));

    assert!(matches!(
        relay.mark_read(Uuid::new_v4()).await,
        Err(Error::NotFound(_))
    ));
}
