//! 门面层测试：端到端场景、取消、存储错误透传

use std::sync::Arc;

use chrono::Utc;
use domain::{
    ConversationId, ConversationKind, DomainError, ErrorKind, Message, MessageContent, MessageId,
    PhotoLocator, RepositoryError,
};
use tokio_util::sync::CancellationToken;

use crate::{
    error::ApplicationError,
    memory::InMemoryStore,
    repository::{ConversationRepository, MockMessageRepository, MockUserRepository},
    services::{
        test_support::{dependencies, open, register, Harness},
        CreateConversationRequest, MessagingService, SendTextMessageRequest,
    },
};

fn say(conversation: ConversationId, content: &str) -> SendTextMessageRequest {
    SendTextMessageRequest {
        conversation_id: conversation,
        content: content.to_owned(),
        reply_to: None,
    }
}

#[tokio::test]
async fn direct_conversation_scenario() {
    let h = Harness::new();
    let alice = h.login("alice").await;
    let bob = h.login("bob").await;

    let created = h
        .service
        .create_conversation(
            alice,
            CreateConversationRequest {
                kind: ConversationKind::Direct,
                participants: vec![bob],
                name: None,
            },
            &h.cancel,
        )
        .await
        .unwrap();
    assert_eq!(created.kind, "direct");
    assert_eq!(created.name, "bob");
    assert_eq!(created.participants.len(), 2);
    let conversation = ConversationId::from(created.id);

    let sent = h
        .service
        .send_text_message(alice, say(conversation, "hello bob"), &h.cancel)
        .await
        .unwrap();
    h.service
        .add_reaction(bob, MessageId::from(sent.id), "👋".to_owned(), &h.cancel)
        .await
        .unwrap();

    let seen_by_bob = h
        .service
        .get_conversation(bob, conversation, &h.cancel)
        .await
        .unwrap();
    assert_eq!(seen_by_bob.name, "alice");
    let messages = seen_by_bob.messages.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].content, "hello bob");
    assert_eq!(messages[0].reactions.len(), 1);
    assert_eq!(
        seen_by_bob.last_message.map(|m| m.id),
        Some(sent.id)
    );

    let listed = h.service.get_conversations(alice, &h.cancel).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert!(listed[0].messages.is_none());
}

#[tokio::test]
async fn group_membership_scenario() {
    let h = Harness::new();
    let alice = h.login("alice").await;
    let bob = h.login("bob").await;
    let carol = h.login("carol").await;

    let group = h
        .service
        .create_conversation(
            alice,
            CreateConversationRequest {
                kind: ConversationKind::Group,
                participants: vec![bob],
                name: Some("friends".to_owned()),
            },
            &h.cancel,
        )
        .await
        .unwrap();
    let group = ConversationId::from(group.id);

    h.service.add_to_group(bob, group, carol, &h.cancel).await.unwrap();
    h.service
        .send_text_message(carol, say(group, "thanks for the invite"), &h.cancel)
        .await
        .unwrap();

    h.service.leave_group(carol, group, &h.cancel).await.unwrap();
    let err = h
        .service
        .send_text_message(carol, say(group, "still here?"), &h.cancel)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);

    h.service
        .set_group_name(alice, group, "old friends".to_owned(), &h.cancel)
        .await
        .unwrap();
    let view = h.service.get_conversation(bob, group, &h.cancel).await.unwrap();
    assert_eq!(view.name, "old friends");
    assert_eq!(view.participants.len(), 2);
}

#[tokio::test]
async fn non_member_cannot_read_conversation() {
    let h = Harness::new();
    let alice = h.login("alice").await;
    let bob = h.login("bob").await;
    let eve = h.login("eve").await;

    let created = h
        .service
        .create_conversation(
            alice,
            CreateConversationRequest {
                kind: ConversationKind::Direct,
                participants: vec![bob],
                name: None,
            },
            &h.cancel,
        )
        .await
        .unwrap();

    let err = h
        .service
        .get_conversation(eve, ConversationId::from(created.id), &h.cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, ApplicationError::Domain(DomainError::NotParticipant)));
}

#[tokio::test]
async fn message_type_tag_is_parsed_at_the_boundary() {
    let h = Harness::new();
    let alice = h.login("alice").await;
    let bob = register(&h.store, "bob").await;
    let direct = open(&h.store, ConversationKind::Direct, alice, &[bob]).await;

    let err = h
        .service
        .send_message(alice, direct.id, "video", "clip.mp4".to_owned(), None, &h.cancel)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ApplicationError::Domain(DomainError::UnknownMessageKind(tag)) if tag == "video"
    ));

    let err = h
        .service
        .send_message(alice, direct.id, "photo", "/photos/cat.png".to_owned(), None, &h.cancel)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(h.store.message_count().await, 0);

    let text = h
        .service
        .send_message(alice, direct.id, "text", "hi".to_owned(), None, &h.cancel)
        .await
        .unwrap();
    assert_eq!(text.kind, "text");
    assert_eq!(h.store.message_count().await, 1);
}

#[tokio::test]
async fn photo_messages_carry_the_stored_locator() {
    let h = Harness::new();
    let alice = h.login("alice").await;
    let bob = register(&h.store, "bob").await;
    let eve = register(&h.store, "eve").await;
    let direct = open(&h.store, ConversationKind::Direct, alice, &[bob]).await;

    h.service
        .authorize_message_send(alice, direct.id, &h.cancel)
        .await
        .unwrap();
    let err = h
        .service
        .authorize_message_send(eve, direct.id, &h.cancel)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);
    let err = h
        .service
        .authorize_message_send(alice, ConversationId::generate(), &h.cancel)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let locator = PhotoLocator::new("/photos/conversation-cat.png").unwrap();
    let photo = h
        .service
        .send_photo_message(alice, direct.id, locator, None, &h.cancel)
        .await
        .unwrap();
    assert_eq!(photo.kind, "photo");
    assert_eq!(photo.content, "/photos/conversation-cat.png");
}

#[tokio::test]
async fn status_tag_is_validated() {
    let h = Harness::new();
    let alice = h.login("alice").await;
    let bob = h.login("bob").await;
    let direct = open(&h.store, ConversationKind::Direct, alice, &[bob]).await;
    let sent = h
        .service
        .send_text_message(alice, say(direct.id, "hi"), &h.cancel)
        .await
        .unwrap();
    let id = MessageId::from(sent.id);

    let received = h
        .service
        .update_message_status(bob, id, "received", &h.cancel)
        .await
        .unwrap();
    assert_eq!(received.status, "received");

    let err = h
        .service
        .update_message_status(bob, id, "delivered", &h.cancel)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = h
        .service
        .update_message_status(bob, id, "sent", &h.cancel)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn cancelled_call_writes_nothing() {
    let h = Harness::new();
    let alice = h.login("alice").await;
    let bob = h.login("bob").await;
    let direct = open(&h.store, ConversationKind::Direct, alice, &[bob]).await;

    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = h
        .service
        .send_text_message(alice, say(direct.id, "too late"), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, ApplicationError::Cancelled));
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_eq!(h.store.message_count().await, 0);

    let err = h.service.login("carol".to_owned(), &cancel).await.unwrap_err();
    assert!(matches!(err, ApplicationError::Cancelled));
}

#[tokio::test]
async fn storage_failure_surfaces_unchanged() {
    let store = InMemoryStore::new();
    let alice = register(&store, "alice").await;
    let bob = register(&store, "bob").await;
    let direct = open(&store, ConversationKind::Direct, alice, &[bob]).await;

    let mut messages = MockMessageRepository::new();
    messages
        .expect_insert()
        .times(1)
        .returning(|_, _| Err(RepositoryError::storage("disk full")));

    let mut deps = dependencies(&store);
    deps.message_repository = Arc::new(messages);
    let service = MessagingService::new(deps);

    let err = service
        .send_text_message(alice, say(direct.id, "hello"), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        &err,
        ApplicationError::Repository(RepositoryError::Storage { message }) if message == "disk full"
    ));
    assert_eq!(err.kind(), ErrorKind::Storage);

    let unchanged = ConversationRepository::find_by_id(&store, direct.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(unchanged.last_message, None);
}

#[tokio::test]
async fn rejected_reply_never_reaches_storage() {
    let store = InMemoryStore::new();
    let alice = register(&store, "alice").await;
    let bob = register(&store, "bob").await;
    let direct = open(&store, ConversationKind::Direct, alice, &[bob]).await;

    let elsewhere = Message::new(
        MessageId::generate(),
        ConversationId::generate(),
        alice,
        MessageContent::text("other room").unwrap(),
        None,
        Utc::now(),
    );
    let target = elsewhere.id;

    let mut messages = MockMessageRepository::new();
    messages
        .expect_find_by_id()
        .returning(move |_| Ok(Some(elsewhere.clone())));
    messages.expect_insert().times(0);

    let mut deps = dependencies(&store);
    deps.message_repository = Arc::new(messages);
    let service = MessagingService::new(deps);

    let request = SendTextMessageRequest {
        conversation_id: direct.id,
        content: "reply".to_owned(),
        reply_to: Some(target),
    };
    let err = service
        .send_text_message(alice, request, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn user_lookup_failure_is_reported_as_storage() {
    let store = InMemoryStore::new();
    let mut users = MockUserRepository::new();
    users
        .expect_find_by_name()
        .returning(|_| Err(RepositoryError::storage("connection reset")));
    users.expect_save().times(0);

    let mut deps = dependencies(&store);
    deps.user_repository = Arc::new(users);
    let service = MessagingService::new(deps);

    let err = service
        .login("alice".to_owned(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Storage);
}
